//! 磁盘数据结构层
//!
//! 卷的布局：
//!
//! | 引导块 | 超级块 | 日志区 | 索引节点区 | 位图区 | 数据区 |
//!
//! 所有字段按本机字节序存放。

mod bitmap;
mod dir_entry;
mod inode;
mod super_block;

pub use self::{
    bitmap::Bitmap,
    dir_entry::{DirEntry, FileName},
    inode::{DiskInode, IndirectBlock},
    super_block::SuperBlock,
};
