//! 路径解析

use crate::fs::FileSystem;
use crate::inode::InodeRef;
use crate::layout::FileName;
use crate::ROOT_INO;

/// 取出路径的第一个分量，返回它与剩余部分，剩余部分不含前导`/`
///
/// 路径中没有分量时返回空。超长的分量被截断而不报错。
///
/// ```
/// use xv6fs::{FileName, skipelem};
///
/// assert_eq!(skipelem(b"a/bb/c"), Some((FileName::from("a"), &b"bb/c"[..])));
/// assert_eq!(skipelem(b"///a//bb"), Some((FileName::from("a"), &b"bb"[..])));
/// assert_eq!(skipelem(b"a"), Some((FileName::from("a"), &b""[..])));
/// assert_eq!(skipelem(b""), None);
/// assert_eq!(skipelem(b"////"), None);
/// ```
pub fn skipelem(path: &[u8]) -> Option<(FileName, &[u8])> {
    let path = trim_slashes(path);
    if path.is_empty() {
        return None;
    }
    let end = path.iter().position(|&b| b == b'/').unwrap_or(path.len());
    Some((FileName::new(&path[..end]), trim_slashes(&path[end..])))
}

#[inline]
fn trim_slashes(path: &[u8]) -> &[u8] {
    let start = path.iter().position(|&b| b != b'/').unwrap_or(path.len());
    &path[start..]
}

impl FileSystem {
    /// 逐级查找路径
    ///
    /// `parent`为真时在最后一个分量之前停下，返回父目录与最后一个分量。
    /// 每前进一级都先释放上一级目录的引用。
    fn namex(&mut self, path: &[u8], parent: bool, cwd: InodeRef) -> Option<(InodeRef, FileName)> {
        let mut ip = if path.first() == Some(&b'/') {
            self.iget(ROOT_INO)
        } else {
            self.idup(cwd)
        };

        let mut rest = path;
        let mut name = FileName::default();
        while let Some((elem, next)) = skipelem(rest) {
            name = elem;
            rest = next;

            self.ilock(ip);
            if !self.inode(ip).is_dir() {
                self.iput(ip);
                return None;
            }
            if parent && rest.is_empty() {
                // 提前一级停下
                self.iunlock(ip);
                return Some((ip, name));
            }
            let Some((next, _)) = self.dirlookup(ip, &name) else {
                self.iput(ip);
                return None;
            };
            self.iput(ip);
            ip = next;
        }

        if parent {
            self.iput(ip);
            return None;
        }
        Some((ip, name))
    }

    /// 路径对应的索引节点，未锁定
    #[inline]
    pub fn namei(&mut self, path: &[u8], cwd: InodeRef) -> Option<InodeRef> {
        self.namex(path, false, cwd).map(|(ip, _)| ip)
    }

    /// 路径的父目录与最后一个分量
    #[inline]
    pub fn nameiparent(&mut self, path: &[u8], cwd: InodeRef) -> Option<(InodeRef, FileName)> {
        self.namex(path, true, cwd)
    }

    /// 根目录的一个新引用
    #[inline]
    pub fn root(&mut self) -> InodeRef {
        self.iget(ROOT_INO)
    }
}
