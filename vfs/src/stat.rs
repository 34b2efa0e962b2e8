/// 索引节点的类型，取值与磁盘上的`type`字段一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i16)]
pub enum InodeType {
    #[default]
    Free = 0,
    Directory = 1,
    File = 2,
    Device = 3,
}

impl InodeType {
    /// 磁盘上出现未知类型时返回空
    pub fn from_raw(raw: i16) -> Option<Self> {
        match raw {
            0 => Some(Self::Free),
            1 => Some(Self::Directory),
            2 => Some(Self::File),
            3 => Some(Self::Device),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// 所在设备号
    pub dev: u16,
    /// Inode number
    pub ino: u16,
    pub kind: InodeType,
    /// 硬链接数
    pub nlink: i16,
    /// File size
    pub size: u32,
}
