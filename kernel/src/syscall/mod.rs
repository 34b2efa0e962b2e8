//! 系统调用
//!
//! 进程通过 [`Sys`] 进入内核。失败的调用既返回错误，
//! 也记在进程的`errno`里。

mod fs;
mod process;

use vfs::Error;

use crate::machine::Kernel;
use crate::task::KernelCell;

/// 当前进程的系统调用句柄
#[derive(Clone)]
pub struct Sys {
    kernel: KernelCell,
}

impl Sys {
    pub(crate) fn new(kernel: KernelCell) -> Self {
        Self { kernel }
    }

    /// 在内核中原子地执行一段不会阻塞的调用
    fn syscall<T>(&self, f: impl FnOnce(&mut Kernel) -> Result<T, Error>) -> Result<T, Error> {
        self.kernel.exclusive_session(|k| {
            let result = f(k);
            if let Err(err) = &result {
                k.set_errno(*err);
            }
            result
        })
    }

    /// 记录阻塞调用的结果
    fn record<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(err) = &result {
            self.kernel.exclusive_session(|k| k.set_errno(*err));
        }
        result
    }

    /// 最近一次失败的系统调用的错误
    pub fn errno(&self) -> Option<Error> {
        self.kernel.exclusive_session(|k| k.current_proc().errno)
    }
}

impl Kernel {
    fn set_errno(&mut self, err: Error) {
        let p = self.current_proc_mut();
        log::debug!("pid {}: {err} (errno {})", p.pid, err.errno());
        p.errno = Some(err);
    }
}
