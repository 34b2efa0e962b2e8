use crate::block_cache::BufferCache;
use crate::{BLOCK_SIZE, BPB, BlockNo};

/// 位图区域内块的结构
type BitmapBlock = [u8; BLOCK_SIZE];

/// 位图区域，记录整个卷的块分配情况
///
/// 块`b`对应第`b / 8`字节的第`b % 8`位。
#[derive(Debug, Clone, Copy)]
pub struct Bitmap {
    /// 位图的起始块
    start: BlockNo,
    /// 位图所指示的总块数
    size: u16,
}

impl Bitmap {
    #[inline]
    pub fn new(start: BlockNo, size: u16) -> Self {
        Self { start, size }
    }

    /// 分配编号最小的空闲块，位图用尽则返回空
    pub fn alloc(&self, cache: &mut BufferCache) -> Option<BlockNo> {
        for base in (0..self.size as usize).step_by(BPB) {
            let id = cache.read(self.start + (base / BPB) as u16);
            let found = cache.map_mut(id, 0, |bits: &mut BitmapBlock| {
                let bi = (0..BPB.min(self.size as usize - base))
                    .find(|bi| bits[bi / 8] & (1 << (bi % 8)) == 0)?;
                bits[bi / 8] |= 1 << (bi % 8);
                Some(bi)
            });
            if let Some(bi) = found {
                cache.write(id);
                cache.release(id);
                return Some((base + bi) as BlockNo);
            }
            cache.release(id);
        }
        None
    }

    /// 回收块`b`，返回它之前是否已被分配
    pub fn dealloc(&self, cache: &mut BufferCache, b: BlockNo) -> bool {
        let bi = b as usize % BPB;
        cache.update_with(self.start + b / BPB as u16, 0, |bits: &mut BitmapBlock| {
            let allocated = bits[bi / 8] & (1 << (bi % 8)) != 0;
            bits[bi / 8] &= !(1 << (bi % 8));
            allocated
        })
    }

    /// 把`[0, count)`标记为已分配，格式化时用于元数据区
    pub fn reserve(&self, cache: &mut BufferCache, count: u16) {
        for b in 0..count {
            let bi = b as usize % BPB;
            cache.update_with(self.start + b / BPB as u16, 0, |bits: &mut BitmapBlock| {
                bits[bi / 8] |= 1 << (bi % 8);
            });
        }
    }

    /// 空闲块数
    pub fn count_free(&self, cache: &mut BufferCache) -> usize {
        let mut free = 0;
        for base in (0..self.size as usize).step_by(BPB) {
            let bits = BPB.min(self.size as usize - base);
            free += cache.read_with(
                self.start + (base / BPB) as u16,
                0,
                |block: &BitmapBlock| {
                    (0..bits)
                        .filter(|bi| block[bi / 8] & (1 << (bi % 8)) == 0)
                        .count()
                },
            );
        }
        free
    }
}
