use crate::{BPB, BlockNo, IPB};

/// 超级块，位于 1 号块，挂载时读入后不再改变
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SuperBlock {
    /// 卷的总块数
    pub size: u16,
    /// 数据块数
    pub nblocks: u16,
    /// 索引节点数
    pub ninodes: u16,
    /// 日志块数
    pub nlog: u16,
    /// 首个日志块
    pub logstart: u16,
    /// 首个索引节点块
    pub inodestart: u16,
    /// 首个位图块
    pub bmapstart: u16,
}

impl SuperBlock {
    /// 超级块所在的块
    pub const BLOCK: BlockNo = 1;

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.ninodes > 0 && self.inodestart < self.bmapstart && self.bmapstart < self.size
    }

    /// 存放索引节点`inum`的块
    #[inline]
    pub fn iblock(&self, inum: u16) -> BlockNo {
        inum / IPB as u16 + self.inodestart
    }

    /// 记录块`b`分配情况的位图块
    #[inline]
    pub fn bblock(&self, b: BlockNo) -> BlockNo {
        b / BPB as u16 + self.bmapstart
    }
}
