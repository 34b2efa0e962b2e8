//! CPU状态管理
//!
//! 单线程的执行器：按调度器选出的顺序轮询进程的 future。

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefMut;
use core::future::Future;
use core::task::{Context, Poll, Waker};

use block_dev::BlockDevice;
use vfs::Error;
use xv6fs::MountError;

use super::{Channel, Entry, KernelCell, Pid, ProcFuture, ProcState, ProgramTable};
use crate::config::{Config, NPAGES};
use crate::fs::{Console, FileKind};
use crate::machine::Kernel;
use crate::sync::UpCell;
use crate::syscall::Sys;

/// [`Processor::run`] 停下的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// init 退出，附带其退出码
    Halted(i32),
    /// 没有就绪的进程，等待外部事件
    Idle,
}

struct Task {
    /// 槽位被重用后，旧的 future 作废
    pid: Pid,
    future: ProcFuture,
}

pub struct Processor {
    kernel: KernelCell,
    tasks: Vec<Option<Task>>,
}

impl Processor {
    pub fn new(
        device: Arc<dyn BlockDevice>,
        config: Config,
        console: Box<dyn Console>,
        programs: ProgramTable,
    ) -> Result<Self, MountError> {
        let nproc = config.nproc;
        let kernel = Kernel::new(device, config, console, programs)?;
        Ok(Self {
            kernel: Rc::new(UpCell::new(kernel)),
            tasks: (0..nproc).map(|_| None).collect(),
        })
    }

    /// 创建 init 进程并令其执行`/bin/init`
    pub fn boot(&mut self) -> Result<Pid, Error> {
        self.spawn_init(|sys: Sys| async move {
            let Err(err) = sys.exec("/bin/init", &["/bin/init"]).await;
            log::error!("[kernel] exec /bin/init: {err}");
            1
        })
    }

    /// 创建 init 进程，从`main`开始执行
    ///
    /// init 的标准输入输出都是控制台，工作目录为根目录。
    pub fn spawn_init<F, Fut>(&mut self, main: F) -> Result<Pid, Error>
    where
        F: FnOnce(Sys) -> Fut + 'static,
        Fut: Future<Output = i32> + 'static,
    {
        let entry: Entry = Box::new(move |sys: Sys| Box::pin(main(sys)) as ProcFuture);
        self.kernel.exclusive_session(|k| k.user_init(entry))
    }

    /// 轮流运行就绪的进程，直到停机或全部阻塞
    pub fn run(&mut self) -> Outcome {
        let mut cx = Context::from_waker(Waker::noop());
        loop {
            let slot = {
                let mut kernel = self.kernel.exclusive_access();
                if let Some(status) = kernel.halted {
                    return Outcome::Halted(status);
                }
                let Some(slot) = kernel.schedule() else {
                    log::trace!("idle");
                    return Outcome::Idle;
                };
                slot
            };
            self.run_slot(slot, &mut cx);
            self.reap();
        }
    }

    fn run_slot(&mut self, slot: usize, cx: &mut Context<'_>) {
        loop {
            let pid = self.kernel.exclusive_access().procs[slot].pid;
            if self.tasks[slot].as_ref().is_none_or(|task| task.pid != pid) {
                let entry = self.kernel.exclusive_access().procs[slot].entry.take();
                let Some(entry) = entry else {
                    panic!("pid {pid} has nothing to run");
                };
                let future = entry(Sys::new(self.kernel.clone()));
                self.tasks[slot] = Some(Task { pid, future });
            }

            let Some(task) = self.tasks[slot].as_mut() else {
                unreachable!()
            };
            let poll = task.future.as_mut().poll(cx);

            let mut kernel = self.kernel.exclusive_access();
            let p = &mut kernel.procs[slot];
            match poll {
                Poll::Ready(status) => {
                    self.tasks[slot] = None;
                    if p.pid == pid && p.state == ProcState::Running {
                        kernel.exit_proc(slot, status);
                    }
                    return;
                }
                Poll::Pending if p.reload => {
                    // exec 换了入口，立即从新入口开始
                    p.reload = false;
                    self.tasks[slot] = None;
                }
                Poll::Pending => {
                    if p.state == ProcState::Running {
                        p.state = ProcState::Runnable;
                    }
                    return;
                }
            }
        }
    }

    /// 丢弃已退出进程的 future
    fn reap(&mut self) {
        let kernel = self.kernel.exclusive_access();
        for (slot, task) in self.tasks.iter_mut().enumerate() {
            let alive = task.as_ref().is_some_and(|task| {
                let p = &kernel.procs[slot];
                p.pid == task.pid && !matches!(p.state, ProcState::Zombie | ProcState::Unused)
            });
            if !alive {
                *task = None;
            }
        }
    }

    /// 控制台有输入到达
    pub fn console_interrupt(&self) {
        self.kernel.exclusive_session(|k| k.wakeup(Channel::Console));
    }

    /// 检视内核状态，不可在进程运行中调用
    pub fn kernel(&self) -> RefMut<'_, Kernel> {
        self.kernel.exclusive_access()
    }
}

impl Kernel {
    fn user_init(&mut self, entry: Entry) -> Result<Pid, Error> {
        if self.initproc.is_some() {
            return Err(Error::AlreadyExists);
        }
        let slot = self.alloc_proc()?;

        let mut frames = [None; NPAGES];
        for frame in &mut frames {
            let Some(allocated) = self.alloc_frame() else {
                panic!("user_init: out of page frames");
            };
            *frame = Some(allocated);
        }
        let cwd = self.fs.root();

        let p = &mut self.procs[slot];
        p.frames = frames;
        p.cwd = Some(cwd);
        p.name = String::from("init");
        p.entry = Some(entry);
        for _ in 0..3 {
            let file = self.files.alloc(FileKind::Console, true, true)?;
            p.fdalloc(file)?;
        }
        p.state = ProcState::Runnable;
        self.initproc = Some(slot);
        log::info!("[kernel] init is pid {}", p.pid);
        Ok(p.pid)
    }
}
