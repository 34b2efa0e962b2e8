//! # 索引节点层
//!
//! 内存中的索引节点表缓存被引用的索引节点，
//! 同一编号在引用计数大于 0 的表项中至多出现一次。
//!
//! - [`FileSystem::iget`] 只占用表项，不读盘
//! - [`FileSystem::ilock`] 在首次使用时从磁盘读入
//! - [`FileSystem::iupdate`] 把内存中的修改写回磁盘
//! - [`FileSystem::iput`] 释放最后一个引用时，若已无硬链接，则截断并释放索引节点
//!
//! 调度是协作式的，锁定区间内不会切换进程，所以`ilock`不需要真正的互斥。

use vfs::{Error, InodeType, Stat};

use crate::fs::FileSystem;
use crate::layout::{DiskInode, IndirectBlock};
use crate::{BLOCK_SIZE, BlockNo, IPB, MAXFILE, NDIRECT, NINDIRECT, ROOT_DEV};

/// 内存索引节点表的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeRef(usize);

/// 内存中的索引节点
#[derive(Debug, Clone, Default)]
pub struct Inode {
    inum: u16,
    refcnt: usize,
    /// 已从磁盘读入
    valid: bool,

    pub(crate) kind: InodeType,
    pub(crate) nlink: i16,
    pub(crate) size: u32,
    /// 空缺表示尚未分配的块
    addrs: [Option<BlockNo>; NDIRECT + 1],
}

impl Inode {
    #[inline]
    pub fn inum(&self) -> u16 {
        self.inum
    }

    #[inline]
    pub fn kind(&self) -> InodeType {
        self.kind
    }

    #[inline]
    pub fn nlink(&self) -> i16 {
        self.nlink
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn refcnt(&self) -> usize {
        self.refcnt
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == InodeType::Directory
    }
}

impl FileSystem {
    #[inline]
    pub fn inode(&self, ip: InodeRef) -> &Inode {
        &self.inodes[ip.0]
    }

    #[inline]
    pub(crate) fn inode_mut(&mut self, ip: InodeRef) -> &mut Inode {
        &mut self.inodes[ip.0]
    }

    /// 磁盘索引节点`inum`在块内的偏移
    #[inline]
    fn dinode_offset(inum: u16) -> usize {
        inum as usize % IPB * core::mem::size_of::<DiskInode>()
    }

    /// 在磁盘上找一个空闲的索引节点并标记为`kind`
    pub fn ialloc(&mut self, kind: InodeType) -> Result<InodeRef, Error> {
        for inum in 1..self.sb.ninodes {
            let block = self.sb.iblock(inum);
            let offset = Self::dinode_offset(inum);
            let id = self.cache.read(block);
            let claimed = self.cache.map_mut(id, offset, |dinode: &mut DiskInode| {
                if dinode.kind != InodeType::Free as i16 {
                    return false;
                }
                *dinode = DiskInode {
                    kind: kind as i16,
                    ..Default::default()
                };
                true
            });
            if claimed {
                self.cache.write(id);
            }
            self.cache.release(id);

            if claimed {
                log::debug!("ialloc: inode {inum} as {kind:?}");
                return Ok(self.iget(inum));
            }
        }

        log::warn!("ialloc: no free inodes");
        Err(Error::NoSpace)
    }

    /// 把内存中的字段写回磁盘
    pub fn iupdate(&mut self, ip: InodeRef) {
        let inode = &self.inodes[ip.0];
        let mut addrs = [0; NDIRECT + 1];
        for (addr, slot) in addrs.iter_mut().zip(&inode.addrs) {
            *addr = slot.unwrap_or(0);
        }
        let dinode = DiskInode {
            kind: inode.kind as i16,
            nlink: inode.nlink,
            size: inode.size,
            addrs,
        };
        let block = self.sb.iblock(inode.inum);
        self.cache
            .update_with(block, Self::dinode_offset(inode.inum), |d: &mut DiskInode| {
                *d = dinode
            });
    }

    /// 取得索引节点`inum`的表项，不读盘
    pub fn iget(&mut self, inum: u16) -> InodeRef {
        let mut empty = None;
        for (i, inode) in self.inodes.iter_mut().enumerate() {
            if inode.refcnt > 0 && inode.inum == inum {
                inode.refcnt += 1;
                return InodeRef(i);
            }
            if empty.is_none() && inode.refcnt == 0 {
                empty = Some(i);
            }
        }

        let Some(i) = empty else {
            panic!("iget: no inodes");
        };
        self.inodes[i] = Inode {
            inum,
            refcnt: 1,
            ..Default::default()
        };
        InodeRef(i)
    }

    /// 增加引用
    #[inline]
    pub fn idup(&mut self, ip: InodeRef) -> InodeRef {
        self.inodes[ip.0].refcnt += 1;
        ip
    }

    /// 确保表项反映磁盘内容
    pub fn ilock(&mut self, ip: InodeRef) {
        let inode = &self.inodes[ip.0];
        if inode.refcnt < 1 {
            panic!("ilock: inode {} not referenced", inode.inum);
        }
        if inode.valid {
            return;
        }

        let inum = inode.inum;
        let dinode = self
            .cache
            .read_with(self.sb.iblock(inum), Self::dinode_offset(inum), |d: &DiskInode| *d);
        let Some(kind) = InodeType::from_raw(dinode.kind).filter(|&k| k != InodeType::Free) else {
            panic!("ilock: inode {inum} has no type");
        };

        let inode = &mut self.inodes[ip.0];
        inode.kind = kind;
        inode.nlink = dinode.nlink;
        inode.size = dinode.size;
        for (slot, &addr) in inode.addrs.iter_mut().zip(&dinode.addrs) {
            *slot = (addr != 0).then_some(addr);
        }
        inode.valid = true;
    }

    pub fn iunlock(&self, ip: InodeRef) {
        let inode = &self.inodes[ip.0];
        if inode.refcnt < 1 || !inode.valid {
            panic!("iunlock: inode {} not locked", inode.inum);
        }
    }

    /// 释放引用，最后一个引用释放且没有硬链接时回收索引节点
    pub fn iput(&mut self, ip: InodeRef) {
        let inode = &self.inodes[ip.0];
        assert!(inode.refcnt > 0, "iput: inode {} not referenced", inode.inum);
        if inode.refcnt == 1 && inode.valid && inode.nlink == 0 {
            log::debug!("iput: free inode {}", inode.inum);
            self.itrunc(ip);
            self.inodes[ip.0].kind = InodeType::Free;
            self.iupdate(ip);
            self.inodes[ip.0].valid = false;
        }
        self.inodes[ip.0].refcnt -= 1;
    }

    /// 返回文件第`bn`块的块编号，按需分配
    pub fn bmap(&mut self, ip: InodeRef, bn: usize) -> BlockNo {
        if bn < NDIRECT {
            if let Some(addr) = self.inodes[ip.0].addrs[bn] {
                return addr;
            }
            let addr = self.balloc();
            self.inodes[ip.0].addrs[bn] = Some(addr);
            return addr;
        }

        let bn = bn - NDIRECT;
        if bn >= NINDIRECT {
            panic!("bmap: block {} out of range", bn + NDIRECT);
        }

        let indirect = match self.inodes[ip.0].addrs[NDIRECT] {
            Some(addr) => addr,
            None => {
                let addr = self.balloc();
                self.inodes[ip.0].addrs[NDIRECT] = Some(addr);
                addr
            }
        };
        let id = self.cache.read(indirect);
        let mut addr = self.cache.map(id, 0, |block: &IndirectBlock| block[bn]);
        if addr == 0 {
            addr = self.balloc();
            self.cache
                .map_mut(id, 0, |block: &mut IndirectBlock| block[bn] = addr);
            self.cache.write(id);
        }
        self.cache.release(id);
        addr
    }

    /// 释放文件的全部数据块
    pub fn itrunc(&mut self, ip: InodeRef) {
        for bn in 0..NDIRECT {
            if let Some(addr) = self.inodes[ip.0].addrs[bn].take() {
                self.bfree(addr);
            }
        }

        if let Some(indirect) = self.inodes[ip.0].addrs[NDIRECT].take() {
            let block = self
                .cache
                .read_with(indirect, 0, |block: &IndirectBlock| *block);
            for addr in block.into_iter().filter(|&addr| addr != 0) {
                self.bfree(addr);
            }
            self.bfree(indirect);
        }

        self.inodes[ip.0].size = 0;
        self.iupdate(ip);
    }

    pub fn stati(&self, ip: InodeRef) -> Stat {
        let inode = &self.inodes[ip.0];
        Stat {
            dev: ROOT_DEV,
            ino: inode.inum,
            kind: inode.kind,
            nlink: inode.nlink,
            size: inode.size,
        }
    }

    /// 从偏移`off`读数据，读到文件末尾为止
    pub fn readi(&mut self, ip: InodeRef, dst: &mut [u8], off: u32) -> Result<usize, Error> {
        debug_assert!(self.inodes[ip.0].valid);
        let size = self.inodes[ip.0].size;
        if off > size {
            return Err(Error::InvalidArgument);
        }

        let n = dst.len().min((size - off) as usize);
        let mut off = off as usize;
        let mut total = 0;
        while total < n {
            let addr = self.bmap(ip, off / BLOCK_SIZE);
            let start = off % BLOCK_SIZE;
            let len = (n - total).min(BLOCK_SIZE - start);
            let id = self.cache.read(addr);
            dst[total..total + len].copy_from_slice(&self.cache.data(id)[start..start + len]);
            self.cache.release(id);
            total += len;
            off += len;
        }

        Ok(n)
    }

    /// 从偏移`off`写数据，超出当前大小的部分扩展文件
    ///
    /// 写入要么全部完成，要么在动手之前失败。
    pub fn writei(&mut self, ip: InodeRef, src: &[u8], off: u32) -> Result<usize, Error> {
        debug_assert!(self.inodes[ip.0].valid);
        if off > self.inodes[ip.0].size {
            return Err(Error::InvalidArgument);
        }
        if off as usize + src.len() > MAXFILE * BLOCK_SIZE {
            return Err(Error::FileTooLarge);
        }

        let mut off = off as usize;
        let mut total = 0;
        while total < src.len() {
            let addr = self.bmap(ip, off / BLOCK_SIZE);
            let start = off % BLOCK_SIZE;
            let len = (src.len() - total).min(BLOCK_SIZE - start);
            let id = self.cache.read(addr);
            self.cache.data_mut(id)[start..start + len].copy_from_slice(&src[total..total + len]);
            self.cache.write(id);
            self.cache.release(id);
            total += len;
            off += len;
        }

        if total > 0 {
            let inode = &mut self.inodes[ip.0];
            inode.size = inode.size.max(off as u32);
            // bmap 可能分配了新块
            self.iupdate(ip);
        }

        Ok(total)
    }
}
