//! 文件系统总体结构：超级块、块分配与索引节点表

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use derive_more::Display;

use crate::block_cache::BufferCache;
use crate::config::CacheConfig;
use crate::inode::Inode;
use crate::layout::{Bitmap, SuperBlock};
use crate::BlockNo;

#[derive(Debug, Display)]
pub enum MountError {
    #[display(fmt = "corrupted superblock: {:?}", _0)]
    Corrupted(SuperBlock),
    #[display(fmt = "volume of {} blocks exceeds the {}-block device", _0, _1)]
    TooLarge(u16, usize),
}

pub struct FileSystem {
    pub(crate) cache: BufferCache,
    pub(crate) sb: SuperBlock,
    pub(crate) bitmap: Bitmap,
    /// 内存索引节点表
    pub(crate) inodes: Vec<Inode>,
}

impl FileSystem {
    /// 读出并检查超级块
    pub fn mount(device: Arc<dyn BlockDevice>, config: CacheConfig) -> Result<Self, MountError> {
        let num_blocks = device.num_blocks();
        let mut cache = BufferCache::new(device, config.buffers);
        let sb = cache.read_with(SuperBlock::BLOCK, 0, |sb: &SuperBlock| *sb);
        if !sb.is_valid() {
            return Err(MountError::Corrupted(sb));
        }
        if sb.size as usize > num_blocks {
            return Err(MountError::TooLarge(sb.size, num_blocks));
        }
        log::info!(
            "xv6fs: size {} nblocks {} ninodes {} nlog {} logstart {} inodestart {} bmapstart {}",
            sb.size,
            sb.nblocks,
            sb.ninodes,
            sb.nlog,
            sb.logstart,
            sb.inodestart,
            sb.bmapstart,
        );

        Ok(Self::with_superblock(cache, sb, config))
    }

    pub(crate) fn with_superblock(cache: BufferCache, sb: SuperBlock, config: CacheConfig) -> Self {
        Self {
            cache,
            bitmap: Bitmap::new(sb.bmapstart, sb.size),
            sb,
            inodes: vec![Inode::default(); config.inodes],
        }
    }

    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.sb
    }

    #[inline]
    pub fn cache(&mut self) -> &mut BufferCache {
        &mut self.cache
    }

    /// 分配一个清零的数据块，卷空间用尽是致命错误
    pub fn balloc(&mut self) -> BlockNo {
        let Some(b) = self.bitmap.alloc(&mut self.cache) else {
            panic!("balloc: out of blocks");
        };
        let id = self.cache.get(b);
        self.cache.data_mut(id).fill(0);
        self.cache.write(id);
        self.cache.release(id);
        log::debug!("balloc: block {b}");
        b
    }

    pub fn bfree(&mut self, b: BlockNo) {
        if !self.bitmap.dealloc(&mut self.cache, b) {
            panic!("freeing free block {b}");
        }
        log::debug!("bfree: block {b}");
    }

    /// 空闲数据块数
    pub fn free_blocks(&mut self) -> usize {
        self.bitmap.count_free(&mut self.cache)
    }
}
