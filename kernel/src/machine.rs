//! 内核的全部可变状态
//!
//! 启动时显式构造，之后由 [`Processor`](crate::Processor) 独占持有，
//! 进程通过系统调用句柄访问。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use xv6fs::{FileSystem, MountError};

use crate::config::Config;
use crate::fs::{Console, FileTable, PipePool};
use crate::memory::{FrameAllocator, FrameNo, LinearFrameAllocator, PhysMemory};
use crate::task::{Cpu, Pid, ProcState, Process, ProgramTable};

pub struct Kernel {
    pub(crate) config: Config,
    pub(crate) fs: FileSystem,
    pub(crate) files: FileTable,
    pub(crate) pipes: PipePool,
    pub(crate) procs: Vec<Process>,
    pub(crate) frames: LinearFrameAllocator,
    pub(crate) memory: PhysMemory,
    pub(crate) cpu: Cpu,
    pub(crate) console: Box<dyn Console>,
    pub(crate) programs: ProgramTable,
    /// init 进程在进程表中的下标
    pub(crate) initproc: Option<usize>,
    pub(crate) next_pid: Pid,
    /// init 退出后停机，记录其退出码
    pub(crate) halted: Option<i32>,
}

impl Kernel {
    pub fn new(
        device: Arc<dyn BlockDevice>,
        config: Config,
        console: Box<dyn Console>,
        programs: ProgramTable,
    ) -> Result<Self, MountError> {
        let fs = FileSystem::mount(device, config.cache)?;
        log::info!(
            "[kernel] {} processes, {} frames, {} files, {} pipes",
            config.nproc,
            config.nframes,
            config.nfile,
            config.npipe,
        );

        Ok(Self {
            files: FileTable::new(config.nfile),
            pipes: PipePool::new(config.npipe),
            procs: (0..config.nproc).map(|_| Process::new(config.nofile)).collect(),
            frames: LinearFrameAllocator::new(config.nframes),
            memory: PhysMemory::new(config.nframes),
            cpu: Cpu::default(),
            console,
            programs,
            initproc: None,
            next_pid: 1,
            halted: None,
            fs,
            config,
        })
    }

    #[inline]
    pub fn fs(&mut self) -> &mut FileSystem {
        &mut self.fs
    }

    #[inline]
    pub fn free_frames(&self) -> usize {
        self.frames.free_count()
    }

    #[inline]
    pub fn open_files(&self) -> usize {
        self.files.in_use()
    }

    #[inline]
    pub fn pipes_in_use(&self) -> usize {
        self.pipes.in_use()
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.procs
            .iter()
            .find(|p| p.pid == pid && p.state != ProcState::Unused)
    }

    /// 分配一个清零的页帧
    pub(crate) fn alloc_frame(&mut self) -> Option<FrameNo> {
        let frame = self.frames.alloc()?;
        self.memory.frame_mut(frame).fill(0);
        Some(frame)
    }
}
