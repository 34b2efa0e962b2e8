use crate::{BlockNo, NDIRECT, NINDIRECT};

/// 磁盘上的索引节点
///
/// `addrs`前[`NDIRECT`]项为直接索引，最后一项指向间接索引块，
/// 块编号 0 表示尚未分配。
#[derive(Debug, Default, Clone, Copy)]
#[repr(C)]
pub struct DiskInode {
    /// 类型，0 表示空闲
    pub kind: i16,
    /// 硬链接个数
    pub nlink: i16,
    // 不用usize是为了严控布局
    pub size: u32,
    pub addrs: [BlockNo; NDIRECT + 1],
}

/// 间接索引块
pub type IndirectBlock = [BlockNo; NINDIRECT];
