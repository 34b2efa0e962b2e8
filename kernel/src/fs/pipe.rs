//! 管道
//!
//! 固定容量的环形缓冲区。读写计数单调递增，取模得到下标，
//! `nwrite == nread + PIPE_SIZE`时为满。
//!
//! 写者在缓冲区满时睡在 [`Channel::PipeWrite`] 上，
//! 读者在缓冲区空时睡在 [`Channel::PipeRead`] 上。

use alloc::vec::Vec;

use derive_more::{From, Into};
use vfs::Error;

use crate::config::PIPE_SIZE;
use crate::task::{self, Channel, KernelCell};

/// 管道池的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, From, Into)]
pub struct PipeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeEnd {
    Read,
    Write,
}

#[derive(Debug)]
pub struct Pipe {
    data: [u8; PIPE_SIZE],
    /// 已读字节数
    nread: u32,
    /// 已写字节数
    nwrite: u32,
    readopen: bool,
    writeopen: bool,
}

impl Pipe {
    fn new() -> Self {
        Self {
            data: [0; PIPE_SIZE],
            nread: 0,
            nwrite: 0,
            readopen: true,
            writeopen: true,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nwrite.wrapping_sub(self.nread) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nread == self.nwrite
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == PIPE_SIZE
    }

    fn push(&mut self, byte: u8) {
        debug_assert!(!self.is_full());
        self.data[self.nwrite as usize % PIPE_SIZE] = byte;
        self.nwrite = self.nwrite.wrapping_add(1);
    }

    fn pop(&mut self) -> u8 {
        debug_assert!(!self.is_empty());
        let byte = self.data[self.nread as usize % PIPE_SIZE];
        self.nread = self.nread.wrapping_add(1);
        byte
    }
}

/// 管道池
#[derive(Debug)]
pub struct PipePool {
    pipes: Vec<Option<Pipe>>,
}

impl PipePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            pipes: (0..capacity).map(|_| None).collect(),
        }
    }

    /// 取一个未使用的管道，两端都处于打开状态
    pub fn alloc(&mut self) -> Result<PipeId, Error> {
        let Some(index) = self.pipes.iter().position(Option::is_none) else {
            log::debug!("pipe pool exhausted");
            return Err(Error::FileTableOverflow);
        };
        self.pipes[index] = Some(Pipe::new());
        Ok(PipeId(index))
    }

    pub fn get(&self, id: PipeId) -> &Pipe {
        match &self.pipes[id.0] {
            Some(pipe) => pipe,
            None => panic!("pipe {} is not allocated", id.0),
        }
    }

    fn get_mut(&mut self, id: PipeId) -> &mut Pipe {
        match &mut self.pipes[id.0] {
            Some(pipe) => pipe,
            None => panic!("pipe {} is not allocated", id.0),
        }
    }

    /// 关闭一端，两端都关闭后归还管道池
    pub fn close(&mut self, id: PipeId, end: PipeEnd) {
        let pipe = self.get_mut(id);
        match end {
            PipeEnd::Read => pipe.readopen = false,
            PipeEnd::Write => pipe.writeopen = false,
        }
        if !pipe.readopen && !pipe.writeopen {
            self.pipes[id.0] = None;
        }
    }

    pub fn in_use(&self) -> usize {
        self.pipes.iter().filter(|pipe| pipe.is_some()).count()
    }
}

/// 逐字节写入，缓冲区满时唤醒读者并睡眠
///
/// 读端关闭时失败。被杀死的进程立即成为僵尸，不会再从睡眠中返回。
pub async fn write(kernel: &KernelCell, id: PipeId, src: &[u8]) -> Result<usize, Error> {
    for &byte in src {
        loop {
            let blocked = kernel.exclusive_session(|k| {
                if !k.pipes.get(id).readopen {
                    return Err(Error::BrokenPipe);
                }
                if !k.pipes.get(id).is_full() {
                    k.pipes.get_mut(id).push(byte);
                    return Ok(false);
                }
                k.wakeup(Channel::PipeRead(id));
                k.sleep(Channel::PipeWrite(id));
                Ok(true)
            })?;
            if !blocked {
                break;
            }
            task::suspend().await;
        }
    }

    kernel.exclusive_session(|k| k.wakeup(Channel::PipeRead(id)));
    Ok(src.len())
}

/// 缓冲区空且写端仍打开时睡眠，否则读出现有的数据
///
/// 写端已关闭且无数据时返回 0。
pub async fn read(kernel: &KernelCell, id: PipeId, dst: &mut [u8]) -> Result<usize, Error> {
    loop {
        let ready = kernel.exclusive_session(|k| {
            let pipe = k.pipes.get(id);
            if !pipe.is_empty() || !pipe.writeopen {
                return true;
            }
            k.sleep(Channel::PipeRead(id));
            false
        });
        if ready {
            break;
        }
        task::suspend().await;
    }

    Ok(kernel.exclusive_session(|k| {
        let pipe = k.pipes.get_mut(id);
        let mut n = 0;
        while n < dst.len() && !pipe.is_empty() {
            dst[n] = pipe.pop();
            n += 1;
        }
        k.wakeup(Channel::PipeWrite(id));
        n
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_wraps_around() {
        let mut pipe = Pipe::new();
        for round in 0..3u8 {
            for i in 0..PIPE_SIZE as u8 {
                pipe.push(round + i);
            }
            assert!(pipe.is_full());
            for i in 0..PIPE_SIZE as u8 {
                assert_eq!(pipe.pop(), round + i);
            }
            assert!(pipe.is_empty());
        }
    }

    #[test]
    fn freed_only_when_both_ends_close() {
        let mut pool = PipePool::new(1);
        let id = pool.alloc().unwrap();
        assert_eq!(pool.alloc(), Err(Error::FileTableOverflow));
        pool.close(id, PipeEnd::Write);
        assert_eq!(pool.in_use(), 1);
        assert!(!pool.get(id).writeopen);
        pool.close(id, PipeEnd::Read);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.alloc(), Ok(id));
    }
}
