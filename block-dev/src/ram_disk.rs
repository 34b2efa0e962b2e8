use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use crate::{BLOCK_SIZE, BlockDevice, IoError};

/// 内存盘，测试与宿主工具使用
#[derive(Debug)]
pub struct RamDisk {
    blocks: Mutex<Vec<[u8; BLOCK_SIZE]>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl RamDisk {
    pub fn new(num_blocks: usize) -> Self {
        Self {
            blocks: Mutex::new(vec![[0; BLOCK_SIZE]; num_blocks]),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// 设备累计完成的读次数
    #[inline]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// 设备累计完成的写次数
    #[inline]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), IoError> {
        let blocks = self.blocks.lock();
        let block = blocks.get(block_id).ok_or(IoError { block_id })?;
        buf.copy_from_slice(block);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), IoError> {
        let mut blocks = self.blocks.lock();
        let block = blocks.get_mut(block_id).ok_or(IoError { block_id })?;
        block.copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    #[inline]
    fn num_blocks(&self) -> usize {
        self.blocks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_block_is_an_error() {
        let disk = RamDisk::new(4);
        let mut buf = [0; BLOCK_SIZE];
        let err = disk.read_block(4, &mut buf).unwrap_err();
        assert_eq!(err, IoError { block_id: 4 });
        assert_eq!(err.to_string(), "I/O error on block 4");
        assert!(disk.write_block(3, &[7; BLOCK_SIZE]).is_ok());
        disk.read_block(3, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 7));
        assert_eq!((disk.reads(), disk.writes()), (1, 1));
    }
}
