//! 进程相关的结构体
//!
//! 每个进程是一个由 [`Processor`] 轮流轮询的 future。
//! 系统调用阻塞时先在内核中登记睡眠，再 [`suspend`] 让出，
//! 被 [`wakeup`](Kernel::wakeup) 置为就绪后由调度器重新轮询。

mod manager;
mod process;
mod processor;
mod program;

pub use self::{
    manager::Cpu,
    process::{Channel, Fd, Pid, ProcState, Process},
    processor::{Outcome, Processor},
    program::ProgramTable,
};

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use crate::machine::Kernel;
use crate::sync::UpCell;
use crate::syscall::Sys;

pub(crate) type KernelCell = Rc<UpCell<Kernel>>;

/// 进程的控制流
pub type ProcFuture = Pin<Box<dyn Future<Output = i32>>>;

/// 进程的入口，拿到系统调用句柄后开始执行
pub(crate) type Entry = Box<dyn FnOnce(Sys) -> ProcFuture>;

/// 让出处理器一次
pub(crate) fn suspend() -> Suspend {
    Suspend { yielded: false }
}

pub(crate) struct Suspend {
    yielded: bool,
}

impl Future for Suspend {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            Poll::Pending
        }
    }
}
