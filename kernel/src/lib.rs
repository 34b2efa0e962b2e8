//! 16 位教学内核的核心
//!
//! 处理器与用户程序由宿主提供：用户程序以原生 future 的形式运行，
//! 通过 [`Sys`] 发起系统调用，在阻塞点让出处理器。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod fs;
mod machine;
pub mod memory;
mod sync;
mod syscall;
pub mod task;

pub use vfs::{Error, InodeType, OpenFlag, Stat, Whence};

pub use self::{
    config::Config,
    fs::{BufferConsole, Console},
    machine::Kernel,
    syscall::Sys,
    task::{Fd, Outcome, Pid, ProcState, Process, Processor, ProgramTable},
};
