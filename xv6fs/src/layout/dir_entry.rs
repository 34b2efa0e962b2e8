use core::fmt;
use core::mem;
use core::slice;

use crate::DIRSIZ;

/// 定长文件名，超出[`DIRSIZ`]的部分被截去，不足的部分以 0 填充
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct FileName([u8; DIRSIZ]);

impl FileName {
    pub fn new(name: &[u8]) -> Self {
        let mut bytes = [0; DIRSIZ];
        let len = name.len().min(DIRSIZ);
        bytes[..len].copy_from_slice(&name[..len]);
        Self(bytes)
    }

    /// 去掉填充后的文件名
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(DIRSIZ);
        &self.0[..len]
    }

    #[inline]
    pub fn is_dot(&self) -> bool {
        matches!(self.as_bytes(), b"." | b"..")
    }
}

impl From<&str> for FileName {
    #[inline]
    fn from(name: &str) -> Self {
        Self::new(name.as_bytes())
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", core::str::from_utf8(self.as_bytes()).unwrap_or("<bin>"))
    }
}

/// 目录项，索引节点编号为 0 的是空位
#[derive(Debug, Default, Clone, Copy)]
#[repr(C)]
pub struct DirEntry {
    pub inum: u16,
    pub name: FileName,
}

impl DirEntry {
    pub const SIZE: usize = mem::size_of::<Self>();

    #[inline]
    pub fn new(inum: u16, name: FileName) -> Self {
        Self { inum, name }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts((self as *const Self).cast(), Self::SIZE) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut((self as *mut Self).cast(), Self::SIZE) }
    }
}
