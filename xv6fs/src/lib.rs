#![cfg_attr(not(test), no_std)]

extern crate alloc;

/* xv6fs 的整体架构，自上而下 */

// 目录与路径层：逐级解析路径，维护目录项
mod dir;
mod path;

// 索引节点层：分配、读写磁盘索引节点及其数据
mod inode;

// 文件系统：超级块、位图、格式化
mod config;
mod fs;
mod mkfs;

// 磁盘数据结构层
pub mod layout;

// 块缓存层：内存上的磁盘块数据缓存
mod block_cache;

pub use block_dev::{BLOCK_SIZE, BlockDevice};

pub use self::{
    block_cache::{BufId, BufferCache},
    config::{CacheConfig, Geometry},
    fs::{FileSystem, MountError},
    mkfs::GeometryError,
    inode::{Inode, InodeRef},
    layout::FileName,
    path::skipelem,
};

/// 块编号
pub type BlockNo = u16;

/// 根目录所在的设备
pub const ROOT_DEV: u16 = 1;
/// 根目录的索引节点编号
pub const ROOT_INO: u16 = 1;

/// 直接索引块数
pub const NDIRECT: usize = 27;
/// 间接索引块可容纳的块编号数，按 32 位偏移量计算容量，块的后一半不使用
pub const NINDIRECT: usize = BLOCK_SIZE / 4;
/// 文件最多占用的块数
pub const MAXFILE: usize = NDIRECT + NINDIRECT;

/// 目录项中文件名的长度
pub const DIRSIZ: usize = 14;

/// 每块容纳的磁盘索引节点数
pub const IPB: usize = BLOCK_SIZE / core::mem::size_of::<layout::DiskInode>();
/// 每块位图可指示的块数
pub const BPB: usize = BLOCK_SIZE * 8;
