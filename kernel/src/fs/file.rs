use alloc::vec::Vec;

use derive_more::{From, Into};
use vfs::Error;
use xv6fs::InodeRef;

use super::PipeId;

/// 系统打开文件表的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, From, Into)]
pub struct FileId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Console,
    Pipe(PipeId),
    Inode {
        ip: InodeRef,
        /// **文件**内的偏移量
        off: u32,
    },
}

/// 打开的文件
#[derive(Debug)]
pub struct OpenFile {
    refcnt: usize,
    pub readable: bool,
    pub writable: bool,
    pub kind: FileKind,
}

/// 系统打开文件表
#[derive(Debug)]
pub struct FileTable {
    files: Vec<Option<OpenFile>>,
}

impl FileTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            files: (0..capacity).map(|_| None).collect(),
        }
    }

    /// 占用一个空位
    pub fn alloc(&mut self, kind: FileKind, readable: bool, writable: bool) -> Result<FileId, Error> {
        let Some(index) = self.files.iter().position(Option::is_none) else {
            log::debug!("file table overflow");
            return Err(Error::FileTableOverflow);
        };
        self.files[index] = Some(OpenFile {
            refcnt: 1,
            readable,
            writable,
            kind,
        });
        Ok(FileId(index))
    }

    pub fn dup(&mut self, id: FileId) -> FileId {
        let file = self.get_mut(id);
        file.refcnt += 1;
        id
    }

    /// 释放一个引用，最后一个引用释放时取出文件，由调用者关闭其底层对象
    pub fn put(&mut self, id: FileId) -> Option<OpenFile> {
        let file = self.get_mut(id);
        file.refcnt -= 1;
        if file.refcnt > 0 {
            return None;
        }
        self.files[id.0].take()
    }

    pub fn get(&self, id: FileId) -> &OpenFile {
        match &self.files[id.0] {
            Some(file) => file,
            None => panic!("file {} is not open", id.0),
        }
    }

    pub fn get_mut(&mut self, id: FileId) -> &mut OpenFile {
        match &mut self.files[id.0] {
            Some(file) => file,
            None => panic!("file {} is not open", id.0),
        }
    }

    #[inline]
    pub fn refcnt(&self, id: FileId) -> usize {
        self.files[id.0].as_ref().map_or(0, |file| file.refcnt)
    }

    /// 正在使用的表项数
    pub fn in_use(&self) -> usize {
        self.files.iter().filter(|file| file.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_put_hands_back_the_file() {
        let mut files = FileTable::new(2);
        let a = files.alloc(FileKind::Console, true, false).unwrap();
        files.dup(a);
        assert_eq!(files.refcnt(a), 2);
        assert!(files.put(a).is_none());
        let file = files.put(a).unwrap();
        assert_eq!(file.kind, FileKind::Console);
        assert_eq!(files.in_use(), 0);
    }

    #[test]
    fn overflow_is_recoverable() {
        let mut files = FileTable::new(1);
        files.alloc(FileKind::Console, true, true).unwrap();
        assert_eq!(
            files.alloc(FileKind::Console, true, true).unwrap_err(),
            Error::FileTableOverflow
        );
    }
}
