//! 目录层
//!
//! 目录的数据是一串定长的 [`DirEntry`]，索引节点编号为 0 的是空位。
//! 每个目录的前两项是`.`与`..`。
//! 新目录的`.`不增加自身的链接数，否则链接数永远无法归零。

use vfs::{Error, InodeType};

use crate::fs::FileSystem;
use crate::inode::InodeRef;
use crate::layout::{DirEntry, FileName};

impl FileSystem {
    fn read_dirent(&mut self, dp: InodeRef, off: u32) -> DirEntry {
        let mut de = DirEntry::default();
        if self.readi(dp, de.as_bytes_mut(), off) != Ok(DirEntry::SIZE) {
            panic!("dirent: short read at {off} in inode {}", self.inode(dp).inum());
        }
        de
    }

    fn write_dirent(&mut self, dp: InodeRef, off: u32, de: &DirEntry) -> Result<(), Error> {
        match self.writei(dp, de.as_bytes(), off)? {
            DirEntry::SIZE => Ok(()),
            n => panic!("dirent: short write of {n} bytes"),
        }
    }

    /// 在目录中查找`name`，返回其索引节点与目录项所在的偏移
    pub fn dirlookup(&mut self, dp: InodeRef, name: &FileName) -> Option<(InodeRef, u32)> {
        if !self.inode(dp).is_dir() {
            panic!("dirlookup: inode {} is not a directory", self.inode(dp).inum());
        }

        let size = self.inode(dp).size();
        for off in (0..size).step_by(DirEntry::SIZE) {
            let de = self.read_dirent(dp, off);
            if de.inum != 0 && de.name.as_bytes() == name.as_bytes() {
                return Some((self.iget(de.inum), off));
            }
        }
        None
    }

    /// 在目录中加入`name -> inum`，优先填入空位
    pub fn dirlink(&mut self, dp: InodeRef, name: &FileName, inum: u16) -> Result<(), Error> {
        if let Some((ip, _)) = self.dirlookup(dp, name) {
            self.iput(ip);
            return Err(Error::AlreadyExists);
        }

        let size = self.inode(dp).size();
        let mut off = size;
        for slot in (0..size).step_by(DirEntry::SIZE) {
            if self.read_dirent(dp, slot).inum == 0 {
                off = slot;
                break;
            }
        }

        self.write_dirent(dp, off, &DirEntry::new(inum, *name))
    }

    /// 目录中除`.`与`..`外没有别的项
    pub fn isdirempty(&mut self, dp: InodeRef) -> bool {
        let size = self.inode(dp).size();
        (2 * DirEntry::SIZE as u32..size)
            .step_by(DirEntry::SIZE)
            .all(|off| self.read_dirent(dp, off).inum == 0)
    }

    /// 列出目录中的有效项
    pub fn dirents(&mut self, dp: InodeRef) -> alloc::vec::Vec<DirEntry> {
        let size = self.inode(dp).size();
        (0..size)
            .step_by(DirEntry::SIZE)
            .map(|off| self.read_dirent(dp, off))
            .filter(|de| de.inum != 0)
            .collect()
    }

    /// 创建`path`，返回已锁定的索引节点
    ///
    /// 以普通文件方式创建一个已存在的普通文件时，返回该文件而非报错。
    pub fn create(&mut self, path: &[u8], kind: InodeType, cwd: InodeRef) -> Result<InodeRef, Error> {
        let (dp, name) = self.nameiparent(path, cwd).ok_or(Error::NotFound)?;
        self.ilock(dp);

        if let Some((ip, _)) = self.dirlookup(dp, &name) {
            self.iput(dp);
            self.ilock(ip);
            if kind == InodeType::File && self.inode(ip).kind() == InodeType::File {
                return Ok(ip);
            }
            self.iput(ip);
            return Err(Error::AlreadyExists);
        }

        let ip = match self.ialloc(kind) {
            Ok(ip) => ip,
            Err(err) => {
                self.iput(dp);
                return Err(err);
            }
        };
        self.ilock(ip);
        self.inode_mut(ip).nlink = 1;
        self.iupdate(ip);

        let inum = self.inode(ip).inum();
        let parent = self.inode(dp).inum();
        if kind == InodeType::Directory {
            // `..`
            self.inode_mut(dp).nlink += 1;
            self.iupdate(dp);
            if self.dirlink(ip, &FileName::from("."), inum).is_err()
                || self.dirlink(ip, &FileName::from(".."), parent).is_err()
            {
                panic!("create: dots of inode {inum}");
            }
        }

        if let Err(err) = self.dirlink(dp, &name, inum) {
            // 撤销：释放新索引节点
            if kind == InodeType::Directory {
                self.inode_mut(dp).nlink -= 1;
                self.iupdate(dp);
            }
            self.inode_mut(ip).nlink = 0;
            self.iupdate(ip);
            self.iput(ip);
            self.iput(dp);
            return Err(err);
        }

        log::debug!("create: {name:?} as inode {inum} in {parent}");
        self.iput(dp);
        Ok(ip)
    }

    /// 为`old`建立新名字`new`，目录不能被链接
    pub fn link(&mut self, old: &[u8], new: &[u8], cwd: InodeRef) -> Result<(), Error> {
        let ip = self.namei(old, cwd).ok_or(Error::NotFound)?;
        self.ilock(ip);
        if self.inode(ip).is_dir() {
            self.iput(ip);
            return Err(Error::PermissionDenied);
        }

        self.inode_mut(ip).nlink += 1;
        self.iupdate(ip);

        let inum = self.inode(ip).inum();
        let linked = match self.nameiparent(new, cwd) {
            Some((dp, name)) => {
                self.ilock(dp);
                let linked = self.dirlink(dp, &name, inum);
                self.iput(dp);
                linked
            }
            None => Err(Error::NotFound),
        };

        if linked.is_err() {
            self.inode_mut(ip).nlink -= 1;
            self.iupdate(ip);
        }
        self.iput(ip);
        linked
    }

    /// 删除目录项`path`，`.`与`..`不可删除，非空目录不可删除
    pub fn unlink(&mut self, path: &[u8], cwd: InodeRef) -> Result<(), Error> {
        let (dp, name) = self.nameiparent(path, cwd).ok_or(Error::NotFound)?;
        self.ilock(dp);

        if name.is_dot() {
            self.iput(dp);
            return Err(Error::PermissionDenied);
        }
        let Some((ip, off)) = self.dirlookup(dp, &name) else {
            self.iput(dp);
            return Err(Error::NotFound);
        };
        self.ilock(ip);

        if self.inode(ip).nlink() < 1 {
            panic!("unlink: inode {} has no links", self.inode(ip).inum());
        }
        let is_dir = self.inode(ip).is_dir();
        if is_dir && !self.isdirempty(ip) {
            self.iput(ip);
            self.iput(dp);
            return Err(Error::DirectoryNotEmpty);
        }

        if self.write_dirent(dp, off, &DirEntry::default()).is_err() {
            panic!("unlink: clearing {name:?}");
        }
        if is_dir {
            // 子目录的`..`
            self.inode_mut(dp).nlink -= 1;
            self.iupdate(dp);
        }
        self.iput(dp);

        self.inode_mut(ip).nlink -= 1;
        self.iupdate(ip);
        self.iput(ip);
        Ok(())
    }
}
