//! 进程表：分配、调度、睡眠与唤醒、fork、退出与回收

use vfs::Error;

use super::{Channel, Entry, Pid, ProcState, Process};
use crate::config::NPAGES;
use crate::machine::Kernel;
use crate::memory::FrameAllocator;

/// 处理器上正在运行的进程
#[derive(Debug, Default)]
pub struct Cpu {
    /// 当前进程的槽位
    pub(crate) current: Option<usize>,
    /// 装入的帧表
    pub(crate) mmu: crate::memory::FrameTable,
    pub(crate) sp: u16,
}

impl Kernel {
    /// 当前进程的槽位，无当前进程时 panic
    #[track_caller]
    pub(crate) fn current_slot(&self) -> usize {
        match self.cpu.current {
            Some(slot) => slot,
            None => panic!("no current process"),
        }
    }

    #[inline]
    #[track_caller]
    pub(crate) fn current_proc(&self) -> &Process {
        &self.procs[self.current_slot()]
    }

    #[inline]
    #[track_caller]
    pub(crate) fn current_proc_mut(&mut self) -> &mut Process {
        let slot = self.current_slot();
        &mut self.procs[slot]
    }

    /// 占用一个空槽位，分配新的进程号
    pub(crate) fn alloc_proc(&mut self) -> Result<usize, Error> {
        let Some(slot) = self
            .procs
            .iter()
            .position(|p| p.state == ProcState::Unused)
        else {
            log::debug!("process table full");
            return Err(Error::TryAgain);
        };

        let pid = self.next_pid;
        self.next_pid += 1;
        let p = &mut self.procs[slot];
        *p = Process::new(self.config.nofile);
        p.state = ProcState::Embryo;
        p.pid = pid;
        Ok(slot)
    }

    /// 当前进程睡在`chan`上，让出后由 [`wakeup`](Self::wakeup) 唤醒
    pub(crate) fn sleep(&mut self, chan: Channel) {
        let p = self.current_proc_mut();
        p.chan = Some(chan);
        p.state = ProcState::Sleeping;
        log::trace!("pid {} sleeps on {chan:?}", p.pid);
    }

    /// 唤醒所有睡在`chan`上的进程
    pub(crate) fn wakeup(&mut self, chan: Channel) {
        for p in &mut self.procs {
            if p.state == ProcState::Sleeping && p.chan == Some(chan) {
                p.state = ProcState::Runnable;
                p.chan = None;
            }
        }
    }

    /// 从当前进程的下一个槽位起轮询，切换到第一个就绪的进程
    pub(crate) fn schedule(&mut self) -> Option<usize> {
        let n = self.procs.len();
        let start = self.cpu.current.map_or(0, |slot| slot + 1);
        let slot = (0..n)
            .map(|i| (start + i) % n)
            .find(|&slot| self.procs[slot].state == ProcState::Runnable)?;
        self.switch_to(slot);
        Some(slot)
    }

    fn switch_to(&mut self, slot: usize) {
        if let Some(prev) = self.cpu.current {
            let prev = &mut self.procs[prev];
            if !matches!(prev.state, ProcState::Unused | ProcState::Zombie) {
                prev.usersp = self.cpu.sp;
            }
        }

        let p = &mut self.procs[slot];
        p.state = ProcState::Running;
        self.cpu.current = Some(slot);
        self.cpu.mmu = p.frames;
        self.cpu.sp = p.usersp;
        log::trace!("switch to pid {}", p.pid);
    }

    /// 复制当前进程：帧表、文件描述符、工作目录
    ///
    /// 子进程从`entry`开始执行。页帧不足时撤销已分配的一切。
    pub(crate) fn fork(&mut self, entry: Entry) -> Result<Pid, Error> {
        let parent = self.current_slot();
        let child = self.alloc_proc()?;

        let mut frames = [None; NPAGES];
        for page in 0..NPAGES {
            let Some(src) = self.procs[parent].frames[page] else {
                continue;
            };
            let Some(dst) = self.frames.alloc() else {
                log::debug!("fork: out of page frames");
                for frame in frames.into_iter().flatten() {
                    self.frames.dealloc(frame);
                }
                self.procs[child] = Process::new(self.config.nofile);
                return Err(Error::OutOfMemory);
            };
            self.memory.copy_frame(src, dst);
            frames[page] = Some(dst);
        }

        for fd in 0..self.config.nofile {
            if let Some(file) = self.procs[parent].ofile[fd] {
                self.procs[child].ofile[fd] = Some(self.files.dup(file));
            }
        }
        let cwd = self.procs[parent].cwd.map(|cwd| self.fs.idup(cwd));

        let ppid = self.procs[parent].pid;
        let name = self.procs[parent].name.clone();
        let sp = self.cpu.sp;
        let p = &mut self.procs[child];
        p.frames = frames;
        p.usersp = sp;
        p.parent = Some(parent);
        p.cwd = cwd;
        p.name = name;
        p.entry = Some(entry);
        p.state = ProcState::Runnable;
        log::debug!("fork: pid {ppid} -> {}", p.pid);
        Ok(p.pid)
    }

    /// 终止`slot`上的进程
    ///
    /// 释放页帧、文件与工作目录，成为僵尸并唤醒父进程，子进程过继给 init。
    /// init 退出则停机。
    pub(crate) fn exit_proc(&mut self, slot: usize, status: i32) {
        if self.initproc == Some(slot) {
            log::info!("[kernel] init exited with {status}, halting");
            self.halted = Some(status);
            return;
        }

        let p = &mut self.procs[slot];
        p.exitstatus = status & 0xff;
        let frames = core::mem::take(&mut p.frames);
        let files: alloc::vec::Vec<_> = p.ofile.iter_mut().filter_map(Option::take).collect();
        let cwd = p.cwd.take();
        let parent = p.parent;
        log::debug!("pid {} exited with {}", p.pid, p.exitstatus);

        for frame in frames.into_iter().flatten() {
            self.frames.dealloc(frame);
        }
        for file in files {
            self.fileclose(file);
        }
        if let Some(cwd) = cwd {
            self.fs.iput(cwd);
        }
        if self.cpu.current == Some(slot) {
            self.cpu.mmu = [None; NPAGES];
        }

        let p = &mut self.procs[slot];
        p.state = ProcState::Zombie;
        p.chan = None;
        p.entry = None;
        if let Some(parent) = parent {
            self.wakeup(Channel::Proc(parent));
        }

        let init = self.initproc;
        let mut orphan_zombie = false;
        for q in &mut self.procs {
            if q.state != ProcState::Unused && q.parent == Some(slot) {
                q.parent = init;
                orphan_zombie |= q.state == ProcState::Zombie;
            }
        }
        if let (true, Some(init)) = (orphan_zombie, init) {
            self.wakeup(Channel::Proc(init));
        }
    }

    /// 回收一个僵尸子进程，返回其进程号与退出状态
    ///
    /// 被杀死的子进程的状态带上 0x100。
    /// 有子进程但都未退出时睡眠并返回空。
    pub(crate) fn try_wait(&mut self) -> Result<Option<(Pid, i32)>, Error> {
        let me = self.current_slot();
        let mut havekids = false;

        for q in &mut self.procs {
            if q.state == ProcState::Unused || q.parent != Some(me) {
                continue;
            }
            havekids = true;
            if q.state == ProcState::Zombie {
                let pid = q.pid;
                let status = q.exitstatus | if q.killed { 0x100 } else { 0 };
                *q = Process::new(self.config.nofile);
                return Ok(Some((pid, status)));
            }
        }

        if !havekids {
            return Err(Error::NoChildren);
        }
        self.sleep(Channel::Proc(me));
        Ok(None)
    }

    /// 杀死`pid`，目标立即以状态 1 退出
    ///
    /// 睡眠中的目标不会再被轮询，阻塞的调用随之作废。
    /// 返回被杀的是否为当前进程。已是僵尸的进程不受影响。
    pub(crate) fn kill(&mut self, pid: Pid) -> Result<bool, Error> {
        let Some(slot) = self
            .procs
            .iter()
            .position(|p| p.pid == pid && p.state != ProcState::Unused)
        else {
            return Err(Error::NoSuchProcess);
        };

        if self.procs[slot].state != ProcState::Zombie {
            log::debug!("kill pid {pid}");
            self.procs[slot].killed = true;
            self.exit_proc(slot, 1);
        }
        Ok(self.cpu.current == Some(slot))
    }
}
