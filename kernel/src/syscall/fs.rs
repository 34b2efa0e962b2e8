//! File and filesystem-related syscalls

use enumflags2::BitFlags;
use vfs::{Error, InodeType, OpenFlag, Stat, Whence};
use xv6fs::{BLOCK_SIZE, InodeRef, MAXFILE};

use super::Sys;
use crate::fs::{FileId, FileKind, PipeEnd, pipe, stdio};
use crate::machine::Kernel;
use crate::task::{Channel, Fd};

/// 单次写入文件系统的最大字节数
const MAX_WRITE_CHUNK: usize = BLOCK_SIZE;

impl Kernel {
    /// 释放一个引用，最后一个引用释放时关闭底层对象
    pub(crate) fn fileclose(&mut self, file: FileId) {
        let Some(file) = self.files.put(file) else {
            return;
        };
        match file.kind {
            FileKind::Console => {}
            FileKind::Pipe(id) => {
                if file.writable {
                    self.pipes.close(id, PipeEnd::Write);
                    self.wakeup(Channel::PipeRead(id));
                } else {
                    self.pipes.close(id, PipeEnd::Read);
                    self.wakeup(Channel::PipeWrite(id));
                }
            }
            FileKind::Inode { ip, .. } => self.fs.iput(ip),
        }
    }

    /// 为打开的文件分配描述符，失败时关闭文件
    fn install(&mut self, file: FileId) -> Result<Fd, Error> {
        let fd = self.current_proc_mut().fdalloc(file);
        if fd.is_err() {
            self.fileclose(file);
        }
        fd
    }

    fn argfd(&self, fd: Fd) -> Result<FileId, Error> {
        self.current_proc().argfd(fd)
    }

    fn current_cwd(&self) -> InodeRef {
        self.cwd(self.current_slot())
    }

    fn open(&mut self, path: &str, flags: BitFlags<OpenFlag>) -> Result<Fd, Error> {
        let [readable, writable] = OpenFlag::access(flags);
        if path.starts_with(self.config.console_prefix) {
            let file = self.files.alloc(FileKind::Console, readable, writable)?;
            return self.install(file);
        }

        let cwd = self.current_cwd();
        let ip = if flags.contains(OpenFlag::CREATE) {
            self.fs.create(path.as_bytes(), InodeType::File, cwd)?
        } else {
            let ip = self.fs.namei(path.as_bytes(), cwd).ok_or(Error::NotFound)?;
            self.fs.ilock(ip);
            if self.fs.inode(ip).is_dir() && writable {
                self.fs.iput(ip);
                return Err(Error::IsADirectory);
            }
            ip
        };

        if flags.contains(OpenFlag::TRUNC) && self.fs.inode(ip).kind() == InodeType::File {
            self.fs.itrunc(ip);
        }
        let off = if flags.contains(OpenFlag::APPEND) {
            self.fs.inode(ip).size()
        } else {
            0
        };

        match self.files.alloc(FileKind::Inode { ip, off }, readable, writable) {
            Ok(file) => self.install(file),
            Err(err) => {
                self.fs.iput(ip);
                Err(err)
            }
        }
    }

    fn close(&mut self, fd: Fd) -> Result<(), Error> {
        let file = self.argfd(fd)?;
        self.current_proc_mut().ofile[fd] = None;
        self.fileclose(file);
        Ok(())
    }

    fn dup(&mut self, fd: Fd) -> Result<Fd, Error> {
        let file = self.argfd(fd)?;
        let file = self.files.dup(file);
        self.install(file)
    }

    fn fstat(&mut self, fd: Fd) -> Result<Stat, Error> {
        let file = self.argfd(fd)?;
        match self.files.get(file).kind {
            FileKind::Console => Ok(Stat {
                dev: 0,
                ino: 0,
                kind: InodeType::Device,
                nlink: 1,
                size: 0,
            }),
            FileKind::Pipe(_) => Err(Error::InvalidArgument),
            FileKind::Inode { ip, .. } => {
                self.fs.ilock(ip);
                Ok(self.fs.stati(ip))
            }
        }
    }

    fn inode_read(&mut self, file: FileId, dst: &mut [u8]) -> Result<usize, Error> {
        let FileKind::Inode { ip, off } = self.files.get(file).kind else {
            panic!("inode_read: file {file:?} is not an inode");
        };
        self.fs.ilock(ip);
        let n = self.fs.readi(ip, dst, off)?;
        self.advance(file, n);
        Ok(n)
    }

    /// 分块写入，写入量超过文件上限时整体失败
    fn inode_write(&mut self, file: FileId, src: &[u8]) -> Result<usize, Error> {
        let FileKind::Inode { ip, off } = self.files.get(file).kind else {
            panic!("inode_write: file {file:?} is not an inode");
        };
        if off as usize + src.len() > MAXFILE * BLOCK_SIZE {
            return Err(Error::FileTooLarge);
        }

        self.fs.ilock(ip);
        for chunk in src.chunks(MAX_WRITE_CHUNK) {
            let FileKind::Inode { off, .. } = self.files.get(file).kind else {
                unreachable!()
            };
            let n = self.fs.writei(ip, chunk, off)?;
            if n != chunk.len() {
                panic!("short filewrite");
            }
            self.advance(file, n);
        }
        Ok(src.len())
    }

    fn advance(&mut self, file: FileId, n: usize) {
        if let FileKind::Inode { off, .. } = &mut self.files.get_mut(file).kind {
            *off += n as u32;
        }
    }

    /// 移动偏移量，越过文件末尾时以零填充
    fn lseek(&mut self, fd: Fd, offset: i32, whence: Whence) -> Result<u32, Error> {
        let file = self.argfd(fd)?;
        let FileKind::Inode { ip, off } = self.files.get(file).kind else {
            return Err(Error::IllegalSeek);
        };
        self.fs.ilock(ip);
        let size = self.fs.inode(ip).size();

        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => off as i64,
            Whence::End => size as i64,
        };
        let target = base + offset as i64;
        if !(0..=(MAXFILE * BLOCK_SIZE) as i64).contains(&target) {
            return Err(Error::InvalidArgument);
        }
        let target = target as u32;

        if target > size {
            if !self.files.get(file).writable {
                return Err(Error::InvalidArgument);
            }
            let zeros = [0; BLOCK_SIZE];
            let mut end = size;
            while end < target {
                let len = ((target - end) as usize).min(BLOCK_SIZE);
                end += self.fs.writei(ip, &zeros[..len], end)? as u32;
            }
        }

        if let FileKind::Inode { off, .. } = &mut self.files.get_mut(file).kind {
            *off = target;
        }
        Ok(target)
    }

    fn link(&mut self, old: &str, new: &str) -> Result<(), Error> {
        let cwd = self.current_cwd();
        self.fs.link(old.as_bytes(), new.as_bytes(), cwd)
    }

    fn unlink(&mut self, path: &str) -> Result<(), Error> {
        let cwd = self.current_cwd();
        self.fs.unlink(path.as_bytes(), cwd)
    }

    fn mkdir(&mut self, path: &str) -> Result<(), Error> {
        let cwd = self.current_cwd();
        let ip = self.fs.create(path.as_bytes(), InodeType::Directory, cwd)?;
        self.fs.iput(ip);
        Ok(())
    }

    fn chdir(&mut self, path: &str) -> Result<(), Error> {
        let cwd = self.current_cwd();
        let ip = self.fs.namei(path.as_bytes(), cwd).ok_or(Error::NotFound)?;
        self.fs.ilock(ip);
        if !self.fs.inode(ip).is_dir() {
            self.fs.iput(ip);
            return Err(Error::NotADirectory);
        }
        self.fs.iput(cwd);
        self.current_proc_mut().cwd = Some(ip);
        Ok(())
    }

    fn pipe(&mut self) -> Result<[Fd; 2], Error> {
        let id = self.pipes.alloc()?;
        let rf = match self.files.alloc(FileKind::Pipe(id), true, false) {
            Ok(rf) => rf,
            Err(err) => {
                self.pipes.close(id, PipeEnd::Read);
                self.pipes.close(id, PipeEnd::Write);
                return Err(err);
            }
        };
        let wf = match self.files.alloc(FileKind::Pipe(id), false, true) {
            Ok(wf) => wf,
            Err(err) => {
                self.fileclose(rf);
                self.pipes.close(id, PipeEnd::Write);
                return Err(err);
            }
        };

        let Ok(fd0) = self.install(rf) else {
            self.fileclose(wf);
            return Err(Error::TooManyOpenFiles);
        };
        let Ok(fd1) = self.install(wf) else {
            self.current_proc_mut().ofile[fd0] = None;
            self.fileclose(rf);
            return Err(Error::TooManyOpenFiles);
        };
        Ok([fd0, fd1])
    }
}

impl Sys {
    /// 打开文件，以控制台前缀开头的路径是控制台
    pub fn open(&self, path: &str, flags: impl Into<BitFlags<OpenFlag>>) -> Result<Fd, Error> {
        let flags = flags.into();
        self.syscall(|k| k.open(path, flags))
    }

    pub fn close(&self, fd: Fd) -> Result<(), Error> {
        self.syscall(|k| k.close(fd))
    }

    pub fn dup(&self, fd: Fd) -> Result<Fd, Error> {
        self.syscall(|k| k.dup(fd))
    }

    pub fn fstat(&self, fd: Fd) -> Result<Stat, Error> {
        self.syscall(|k| k.fstat(fd))
    }

    pub fn lseek(&self, fd: Fd, offset: i32, whence: Whence) -> Result<u32, Error> {
        self.syscall(|k| k.lseek(fd, offset, whence))
    }

    pub fn link(&self, old: &str, new: &str) -> Result<(), Error> {
        self.syscall(|k| k.link(old, new))
    }

    pub fn unlink(&self, path: &str) -> Result<(), Error> {
        self.syscall(|k| k.unlink(path))
    }

    pub fn mkdir(&self, path: &str) -> Result<(), Error> {
        self.syscall(|k| k.mkdir(path))
    }

    pub fn chdir(&self, path: &str) -> Result<(), Error> {
        self.syscall(|k| k.chdir(path))
    }

    /// 返回`[读端, 写端]`
    pub fn pipe(&self) -> Result<[Fd; 2], Error> {
        self.syscall(|k| k.pipe())
    }

    /// 读入`buf`，管道空或控制台无输入时阻塞
    pub async fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize, Error> {
        let result = self.read_file(fd, buf).await;
        self.record(result)
    }

    /// 写出`buf`，管道满时阻塞
    pub async fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize, Error> {
        let result = self.write_file(fd, buf).await;
        self.record(result)
    }

    async fn read_file(&self, fd: Fd, buf: &mut [u8]) -> Result<usize, Error> {
        let (file, kind) = self.kernel.exclusive_session(|k| {
            let file = k.argfd(fd)?;
            let opened = k.files.get(file);
            if !opened.readable {
                return Err(Error::BadDescriptor);
            }
            Ok((file, opened.kind))
        })?;

        match kind {
            FileKind::Console => stdio::read(&self.kernel, buf).await,
            FileKind::Pipe(id) => pipe::read(&self.kernel, id, buf).await,
            FileKind::Inode { .. } => self.kernel.exclusive_session(|k| k.inode_read(file, buf)),
        }
    }

    async fn write_file(&self, fd: Fd, buf: &[u8]) -> Result<usize, Error> {
        let (file, kind) = self.kernel.exclusive_session(|k| {
            let file = k.argfd(fd)?;
            let opened = k.files.get(file);
            if !opened.writable {
                return Err(Error::BadDescriptor);
            }
            Ok((file, opened.kind))
        })?;

        match kind {
            FileKind::Console => Ok(stdio::write(&self.kernel, buf)),
            FileKind::Pipe(id) => pipe::write(&self.kernel, id, buf).await,
            FileKind::Inode { .. } => self.kernel.exclusive_session(|k| k.inode_write(file, buf)),
        }
    }
}
