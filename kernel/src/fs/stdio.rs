//! 控制台
//!
//! 以控制台前缀打开的文件不经过文件系统，
//! 逐字节地通过字符设备读写。

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use vfs::Error;

use crate::task::{self, Channel, KernelCell};

/// 字符设备
pub trait Console {
    /// 取一个输入字符，没有输入时返回空
    fn getc(&mut self) -> Option<u8>;

    fn putc(&mut self, byte: u8);
}

/// 内存中的控制台，克隆体共享同一对缓冲区
#[derive(Debug, Clone, Default)]
pub struct BufferConsole {
    inner: Rc<RefCell<ConsoleBuffers>>,
}

#[derive(Debug, Default)]
struct ConsoleBuffers {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl BufferConsole {
    /// 追加输入，之后应通知内核有输入到达
    pub fn feed(&self, bytes: &[u8]) {
        self.inner.borrow_mut().input.extend(bytes);
    }

    /// 取走目前为止的输出
    pub fn take_output(&self) -> Vec<u8> {
        core::mem::take(&mut self.inner.borrow_mut().output)
    }
}

impl Console for BufferConsole {
    fn getc(&mut self) -> Option<u8> {
        self.inner.borrow_mut().input.pop_front()
    }

    fn putc(&mut self, byte: u8) {
        self.inner.borrow_mut().output.push(byte);
    }
}

/// 每次至多读一个字符，没有输入时睡在 [`Channel::Console`] 上
pub async fn read(kernel: &KernelCell, dst: &mut [u8]) -> Result<usize, Error> {
    if dst.is_empty() {
        return Ok(0);
    }
    loop {
        let byte = kernel.exclusive_session(|k| {
            if let Some(byte) = k.console.getc() {
                return Some(byte);
            }
            k.sleep(Channel::Console);
            None
        });
        if let Some(byte) = byte {
            dst[0] = byte;
            return Ok(1);
        }
        task::suspend().await;
    }
}

pub fn write(kernel: &KernelCell, src: &[u8]) -> usize {
    kernel.exclusive_session(|k| {
        for &byte in src {
            k.console.putc(byte);
        }
    });
    src.len()
}
