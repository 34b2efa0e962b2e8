use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use vfs::Error;
use xv6fs::InodeRef;

use super::Entry;
use crate::config::NPAGES;
use crate::fs::{FileId, PipeId};
use crate::memory::FrameTable;

pub type Pid = u32;

/// 文件描述符
pub type Fd = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Unused,
    /// 槽位已占用，尚未就绪
    Embryo,
    Sleeping,
    Runnable,
    Running,
    Zombie,
}

/// 睡眠的事由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// 等待管道中有数据
    PipeRead(PipeId),
    /// 等待管道中有空位
    PipeWrite(PipeId),
    /// 等待该槽位上进程的子进程退出
    Proc(usize),
    /// 等待控制台输入
    Console,
}

/// 进程控制块
pub struct Process {
    pub(crate) state: ProcState,
    pub(crate) pid: Pid,
    /// 父进程在进程表中的槽位
    pub(crate) parent: Option<usize>,
    pub(crate) frames: FrameTable,
    /// 被换下时保存的用户栈指针
    pub(crate) usersp: u16,
    pub(crate) killed: bool,
    pub(crate) exitstatus: i32,
    pub(crate) chan: Option<Channel>,
    /// **文件描述符表**
    pub(crate) ofile: Vec<Option<FileId>>,
    pub(crate) cwd: Option<InodeRef>,
    pub(crate) name: String,
    /// 最近一次失败的系统调用
    pub(crate) errno: Option<Error>,
    /// 尚未开始执行的入口
    pub(crate) entry: Option<Entry>,
    /// exec 替换了入口，执行器应丢弃旧的控制流
    pub(crate) reload: bool,
}

impl Process {
    pub(crate) fn new(nofile: usize) -> Self {
        Self {
            state: ProcState::Unused,
            pid: 0,
            parent: None,
            frames: [None; NPAGES],
            usersp: 0,
            killed: false,
            exitstatus: 0,
            chan: None,
            ofile: vec![None; nofile],
            cwd: None,
            name: String::new(),
            errno: None,
            entry: None,
            reload: false,
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn state(&self) -> ProcState {
        self.state
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn killed(&self) -> bool {
        self.killed
    }

    #[inline]
    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    /// 占用的文件描述符个数
    pub fn open_fds(&self) -> usize {
        self.ofile.iter().filter(|fd| fd.is_some()).count()
    }

    /// 分配最小的空闲描述符
    pub(crate) fn fdalloc(&mut self, file: FileId) -> Result<Fd, Error> {
        let Some(fd) = self.ofile.iter().position(Option::is_none) else {
            return Err(Error::TooManyOpenFiles);
        };
        self.ofile[fd] = Some(file);
        Ok(fd)
    }

    pub(crate) fn argfd(&self, fd: Fd) -> Result<FileId, Error> {
        self.ofile
            .get(fd)
            .copied()
            .flatten()
            .ok_or(Error::BadDescriptor)
    }
}
