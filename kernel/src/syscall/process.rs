use alloc::boxed::Box;
use core::convert::Infallible;
use core::future::{Future, pending};

use vfs::Error;

use super::Sys;
use crate::memory::AddressSpace;
use crate::task::{self, Entry, Pid, ProcFuture};

impl Sys {
    pub fn getpid(&self) -> Pid {
        self.kernel.exclusive_session(|k| k.current_proc().pid)
    }

    /// 复制当前进程，子进程从`child`开始执行
    ///
    /// 子进程继承父进程的内存、文件描述符与工作目录。
    pub fn fork<F, Fut>(&self, child: F) -> Result<Pid, Error>
    where
        F: FnOnce(Sys) -> Fut + 'static,
        Fut: Future<Output = i32> + 'static,
    {
        let entry: Entry = Box::new(move |sys: Sys| Box::pin(child(sys)) as ProcFuture);
        self.syscall(|k| k.fork(entry))
    }

    /// 以`path`处的映像替换当前进程，成功时不返回
    pub async fn exec(&self, path: &str, argv: &[&str]) -> Result<Infallible, Error> {
        self.syscall(|k| k.exec(path, argv))?;
        pending().await
    }

    pub async fn exit(&self, status: i32) -> Infallible {
        self.kernel.exclusive_session(|k| {
            let slot = k.current_slot();
            k.exit_proc(slot, status);
        });
        pending().await
    }

    /// 等待一个子进程退出，返回其进程号与退出状态
    pub async fn wait(&self) -> Result<(Pid, i32), Error> {
        loop {
            match self.syscall(|k| k.try_wait())? {
                Some(reaped) => return Ok(reaped),
                None => task::suspend().await,
            }
        }
    }

    /// 杀死`pid`，杀死自己时不返回
    pub async fn kill(&self, pid: Pid) -> Result<(), Error> {
        if self.syscall(|k| k.kill(pid))? {
            pending::<()>().await;
        }
        Ok(())
    }

    /// 从自己的地址空间读
    pub fn load(&self, vaddr: u16, buf: &mut [u8]) -> Result<(), Error> {
        self.syscall(|k| AddressSpace::new(&k.cpu.mmu, &mut k.memory).read(vaddr, buf))
    }

    /// 写入自己的地址空间
    pub fn store(&self, vaddr: u16, data: &[u8]) -> Result<(), Error> {
        self.syscall(|k| AddressSpace::new(&k.cpu.mmu, &mut k.memory).write(vaddr, data))
    }

    /// 当前的用户栈指针
    pub fn stack_pointer(&self) -> u16 {
        self.kernel.exclusive_session(|k| k.cpu.sp)
    }
}
