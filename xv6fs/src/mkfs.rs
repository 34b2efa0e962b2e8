use alloc::sync::Arc;

use block_dev::BlockDevice;
use derive_more::Display;
use vfs::InodeType;

use crate::block_cache::BufferCache;
use crate::config::{CacheConfig, Geometry};
use crate::fs::FileSystem;
use crate::layout::{FileName, SuperBlock};
use crate::{BPB, IPB, ROOT_INO};

/// 布局参数构不成一个卷
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[display(fmt = "{} blocks leave no data block after {} metadata blocks", _0, _1)]
    TooSmall(u16, u16),
    /// 0 号索引节点不用，根目录占 1 号
    #[display(fmt = "{} inodes leave none for the root directory", _0)]
    TooFewInodes(u16),
}

impl Geometry {
    /// 检查布局参数并计算超级块
    pub fn check(&self) -> Result<SuperBlock, GeometryError> {
        if (self.ninodes as usize) <= ROOT_INO as usize {
            return Err(GeometryError::TooFewInodes(self.ninodes));
        }
        let nbitmap = self.size / BPB as u16 + 1;
        let ninodeblocks = self.ninodes / IPB as u16 + 1;
        let nmeta = 2 + self.nlog + ninodeblocks + nbitmap;
        if nmeta >= self.size {
            return Err(GeometryError::TooSmall(self.size, nmeta));
        }

        Ok(SuperBlock {
            size: self.size,
            nblocks: self.size - nmeta,
            ninodes: self.ninodes,
            nlog: self.nlog,
            logstart: 2,
            inodestart: 2 + self.nlog,
            bmapstart: 2 + self.nlog + ninodeblocks,
        })
    }

    /// 按布局参数计算超级块，参数不合法时 panic
    pub fn superblock(&self) -> SuperBlock {
        match self.check() {
            Ok(sb) => sb,
            Err(err) => panic!("bad geometry: {err}"),
        }
    }
}

impl FileSystem {
    /// 在设备上建立一个只含根目录的空卷，并挂载它
    pub fn format(device: Arc<dyn BlockDevice>, geometry: Geometry, config: CacheConfig) -> Self {
        assert!(
            geometry.size as usize <= device.num_blocks(),
            "volume larger than device"
        );
        let sb = geometry.superblock();
        let nmeta = sb.size - sb.nblocks;
        log::info!(
            "format: nmeta {nmeta} (boot, super, log blocks {} inode blocks {}, bitmap blocks {}) blocks {} total {}",
            sb.nlog,
            sb.bmapstart - sb.inodestart,
            nmeta - sb.bmapstart,
            sb.nblocks,
            sb.size,
        );

        let mut cache = BufferCache::new(device, config.buffers);
        for blockno in 0..sb.size {
            let id = cache.get(blockno);
            cache.data_mut(id).fill(0);
            cache.write(id);
            cache.release(id);
        }
        cache.update_with(SuperBlock::BLOCK, 0, |disk: &mut SuperBlock| *disk = sb);

        let mut fs = FileSystem::with_superblock(cache, sb, config);
        fs.bitmap.reserve(&mut fs.cache, nmeta);

        let Ok(root) = fs.ialloc(InodeType::Directory) else {
            panic!("format: no inode for root");
        };
        fs.ilock(root);
        assert_eq!(fs.inode(root).inum(), ROOT_INO);
        fs.inode_mut(root).nlink = 1;
        fs.iupdate(root);
        for name in [".", ".."] {
            if fs.dirlink(root, &FileName::from(name), ROOT_INO).is_err() {
                panic!("format: root {name:?}");
            }
        }
        fs.iput(root);

        fs
    }
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;

    use super::*;

    #[test]
    fn default_layout() {
        let sb = Geometry::default().superblock();
        assert_eq!(
            sb,
            SuperBlock {
                size: 1000,
                nblocks: 965,
                ninodes: 200,
                nlog: 6,
                logstart: 2,
                inodestart: 8,
                bmapstart: 34,
            }
        );
        assert!(sb.is_valid());
        assert_eq!(sb.iblock(1), 8);
        assert_eq!(sb.bblock(999), 34);
    }

    #[test]
    fn bad_geometry_is_reported() {
        let tiny = Geometry {
            size: 20,
            ..Geometry::default()
        };
        // 2 + 6 + 26 + 1
        assert_eq!(tiny.check(), Err(GeometryError::TooSmall(20, 35)));

        for ninodes in [0, 1] {
            let geometry = Geometry {
                ninodes,
                ..Geometry::default()
            };
            assert_eq!(geometry.check(), Err(GeometryError::TooFewInodes(ninodes)));
        }

        let smallest = Geometry {
            size: 11,
            ninodes: 2,
            nlog: 6,
        };
        assert_eq!(smallest.check().map(|sb| sb.nblocks), Ok(1));
        let disk = Arc::new(RamDisk::new(11));
        let mut fs = FileSystem::format(disk, smallest, CacheConfig::default());
        assert_eq!(fs.free_blocks(), 0);
    }

    #[test]
    #[should_panic(expected = "bad geometry")]
    fn format_refuses_bad_geometry() {
        let disk = Arc::new(RamDisk::new(1000));
        let geometry = Geometry {
            ninodes: 0,
            ..Geometry::default()
        };
        FileSystem::format(disk, geometry, CacheConfig::default());
    }

    #[test]
    fn format_then_mount() {
        let disk = Arc::new(RamDisk::new(1000));
        let mut fs = FileSystem::format(disk.clone(), Geometry::default(), CacheConfig::default());
        // 根目录占一个数据块
        assert_eq!(fs.free_blocks(), 965 - 1);

        let mut fs = FileSystem::mount(disk, CacheConfig::default()).unwrap();
        assert_eq!(*fs.superblock(), Geometry::default().superblock());
        let root = fs.root();
        fs.ilock(root);
        let stat = fs.stati(root);
        assert_eq!((stat.ino, stat.kind, stat.nlink, stat.size), (1, InodeType::Directory, 1, 32));
        assert!(fs.isdirempty(root));
        fs.iput(root);
    }

    #[test]
    fn mount_rejects_blank_device() {
        let disk = Arc::new(RamDisk::new(16));
        assert!(FileSystem::mount(disk, CacheConfig::default()).is_err());
    }
}
