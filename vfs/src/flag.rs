use enumflags2::{BitFlags, bitflags};

#[rustfmt::skip]
#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFlag {
    /// 只写
    WRONLY = 0b0000_0000_0001,
    /// 读写兼备
    RDWR   = 0b0000_0000_0010,
    /// 打开后偏移量置于文件末尾
    APPEND = 0b0000_0000_1000,
    /// 文件不存在则创建
    CREATE = 0b0010_0000_0000,
    /// 先清空文件，再交给用户
    TRUNC  = 0b0100_0000_0000,
}

impl OpenFlag {
    // enumflags2拒绝值为0的标志
    /// 只读
    pub const RDONLY: u32 = 0b0000_0000_0000;

    #[inline]
    pub fn read_only() -> BitFlags<OpenFlag> {
        BitFlags::from_bits_truncate(Self::RDONLY)
    }

    /// 由打开方式得出 `[readable, writable]`
    pub fn access(flags: BitFlags<OpenFlag>) -> [bool; 2] {
        if flags.contains(OpenFlag::WRONLY) {
            [false, true]
        } else if flags.contains(OpenFlag::RDWR) {
            [true, true]
        } else {
            [true, false]
        }
    }
}

/// `lseek`的基准位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Whence {
    Set = 0,
    Cur = 1,
    End = 2,
}

impl TryFrom<u8> for Whence {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Set),
            1 => Ok(Self::Cur),
            2 => Ok(Self::End),
            _ => Err(crate::Error::InvalidArgument),
        }
    }
}
