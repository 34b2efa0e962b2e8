//! 块设备接口
//!
//! 文件系统只通过 [`BlockDevice`] 以块为单位读写存储设备，
//! 具体的驱动（U盘、镜像文件、内存盘）由使用者提供。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod ram_disk;

use core::any::Any;

use derive_more::Display;

pub use self::ram_disk::RamDisk;

/// 块大小
pub const BLOCK_SIZE: usize = 512;

/// 块设备驱动报告的读写失败
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[display(fmt = "I/O error on block {}", block_id)]
pub struct IoError {
    pub block_id: usize,
}

pub trait BlockDevice: Send + Sync + Any {
    /// 将编号为`block_id`的块读入`buf`，`buf`的长度恰为[`BLOCK_SIZE`]
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), IoError>;

    /// 将`buf`写入编号为`block_id`的块
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), IoError>;

    /// 设备的总块数
    fn num_blocks(&self) -> usize;
}
