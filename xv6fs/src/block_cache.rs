//! # 块缓存层
//!
//! 块设备读写速度一般慢于内存读写速度，因此我们在内存中开辟固定数量的缓冲区，
//! 把即将操作的块复制到内存中。使用者对块设备的操作都经过块缓存层，
//! 且**操作块时一定在缓冲区当中**。
//!
//! 缓冲区按最近使用顺序串成双向链表：
//! 查找时从表头（最近使用）开始，回收时从表尾（最久未用）开始，
//! 只回收引用计数为 0 且不脏的缓冲区。
//! 写操作立即落盘，没有延迟写。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use block_dev::BlockDevice;

use crate::{BLOCK_SIZE, BlockNo};

/// 缓冲区句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufId(usize);

/// 缓存的数据，按 8 字节对齐以便直接映射磁盘结构
#[repr(C, align(8))]
struct BlockData([u8; BLOCK_SIZE]);

struct Buffer {
    /// 对应的块编号
    blockno: BlockNo,
    data: BlockData,
    /// 数据已从磁盘读入
    valid: bool,
    /// 是否为脏块
    dirty: bool,
    refcnt: usize,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    prev: usize,
    next: usize,
}

pub struct BufferCache {
    device: Arc<dyn BlockDevice>,
    buffers: Vec<Buffer>,
    /// 最近使用链表，下标`buffers.len()`是表头哨兵
    links: Vec<Link>,
}

impl BufferCache {
    pub fn new(device: Arc<dyn BlockDevice>, capacity: usize) -> Self {
        assert!(capacity > 0);
        let head = capacity;
        let buffers = (0..capacity)
            .map(|_| Buffer {
                blockno: 0,
                data: BlockData([0; BLOCK_SIZE]),
                valid: false,
                dirty: false,
                refcnt: 0,
            })
            .collect();
        // 哨兵 <-> 0 <-> 1 <-> ... <-> capacity-1 <-> 哨兵
        let links = (0..=capacity)
            .map(|i| Link {
                prev: if i == 0 { head } else { i - 1 },
                next: if i == head { 0 } else { i + 1 },
            })
            .collect();

        Self {
            device,
            buffers,
            links,
        }
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.device
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffers.len()
    }

    /// 返回持有块`blockno`的缓冲区，内容保证与磁盘一致
    pub fn read(&mut self, blockno: BlockNo) -> BufId {
        let id = self.get(blockno);
        let buf = &mut self.buffers[id.0];
        if !buf.valid {
            if let Err(err) = self.device.read_block(blockno as usize, &mut buf.data.0) {
                panic!("bread: {err}");
            }
            buf.valid = true;
        }
        id
    }

    /// 立即将缓冲区写回磁盘
    pub fn write(&mut self, id: BufId) {
        let buf = &mut self.buffers[id.0];
        assert!(buf.refcnt > 0, "bwrite: buffer not held");
        buf.dirty = true;
        if let Err(err) = self.device.write_block(buf.blockno as usize, &buf.data.0) {
            panic!("bwrite: {err}");
        }
        buf.dirty = false;
        buf.valid = true;
    }

    /// 放弃对缓冲区的持有，最后一个持有者放弃时移到表头
    pub fn release(&mut self, id: BufId) {
        let buf = &mut self.buffers[id.0];
        assert!(buf.refcnt > 0, "brelse: buffer not held");
        buf.refcnt -= 1;
        if buf.refcnt == 0 {
            self.unlink(id.0);
            self.push_front(id.0);
        }
    }

    /// 取得块`blockno`的缓冲区但不读盘，用于整块覆盖写
    pub fn get(&mut self, blockno: BlockNo) -> BufId {
        let head = self.head();

        // 已缓存？
        let mut i = self.links[head].next;
        while i != head {
            let buf = &mut self.buffers[i];
            if buf.blockno == blockno && (buf.valid || buf.refcnt > 0) {
                buf.refcnt += 1;
                log::trace!("bget: hit block {blockno} in buffer {i}");
                return BufId(i);
            }
            i = self.links[i].next;
        }

        // 从最久未用的一端回收
        let mut i = self.links[head].prev;
        while i != head {
            let buf = &mut self.buffers[i];
            if buf.refcnt == 0 && !buf.dirty {
                log::trace!("bget: recycle buffer {i} for block {blockno}");
                buf.blockno = blockno;
                buf.valid = false;
                buf.refcnt = 1;
                return BufId(i);
            }
            i = self.links[i].prev;
        }

        panic!("bget: no buffers");
    }

    #[inline]
    pub fn blockno(&self, id: BufId) -> BlockNo {
        self.buffers[id.0].blockno
    }

    #[inline]
    pub fn data(&self, id: BufId) -> &[u8; BLOCK_SIZE] {
        &self.buffers[id.0].data.0
    }

    #[inline]
    pub fn data_mut(&mut self, id: BufId) -> &mut [u8; BLOCK_SIZE] {
        let buf = &mut self.buffers[id.0];
        buf.valid = true;
        &mut buf.data.0
    }

    /// `T`必须是只含整数字段的`repr(C)`结构
    pub fn get_ref<T: Sized>(&self, id: BufId, offset: usize) -> &T {
        Self::check_layout::<T>(offset);
        let addr = self.data(id)[offset..].as_ptr().cast::<T>();
        unsafe { &*addr }
    }

    pub fn get_mut<T: Sized>(&mut self, id: BufId, offset: usize) -> &mut T {
        Self::check_layout::<T>(offset);
        let addr = self.data_mut(id)[offset..].as_mut_ptr().cast::<T>();
        unsafe { &mut *addr }
    }

    #[inline]
    pub fn map<T: Sized, V>(&self, id: BufId, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get_ref(id, offset))
    }

    #[inline]
    pub fn map_mut<T: Sized, V>(
        &mut self,
        id: BufId,
        offset: usize,
        f: impl FnOnce(&mut T) -> V,
    ) -> V {
        f(self.get_mut(id, offset))
    }

    /// 读块、访问、释放
    pub fn read_with<T: Sized, V>(
        &mut self,
        blockno: BlockNo,
        offset: usize,
        f: impl FnOnce(&T) -> V,
    ) -> V {
        let id = self.read(blockno);
        let value = self.map(id, offset, f);
        self.release(id);
        value
    }

    /// 读块、修改、写回、释放
    pub fn update_with<T: Sized, V>(
        &mut self,
        blockno: BlockNo,
        offset: usize,
        f: impl FnOnce(&mut T) -> V,
    ) -> V {
        let id = self.read(blockno);
        let value = self.map_mut(id, offset, f);
        self.write(id);
        self.release(id);
        value
    }
}

impl BufferCache {
    #[inline]
    fn head(&self) -> usize {
        self.buffers.len()
    }

    fn check_layout<T>(offset: usize) {
        assert!(mem::size_of::<T>() + offset <= BLOCK_SIZE);
        assert_eq!(offset % mem::align_of::<T>(), 0, "misaligned block access");
    }

    fn unlink(&mut self, i: usize) {
        let Link { prev, next } = self.links[i];
        self.links[prev].next = next;
        self.links[next].prev = prev;
    }

    fn push_front(&mut self, i: usize) {
        let head = self.head();
        let first = self.links[head].next;
        self.links[i] = Link {
            prev: head,
            next: first,
        };
        self.links[first].prev = i;
        self.links[head].next = i;
    }
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;

    use super::*;

    fn cache(capacity: usize) -> (Arc<RamDisk>, BufferCache) {
        let disk = Arc::new(RamDisk::new(64));
        let cache = BufferCache::new(disk.clone(), capacity);
        (disk, cache)
    }

    #[test]
    fn hit_does_not_touch_device() {
        let (disk, mut cache) = cache(3);
        let a = cache.read(5);
        cache.release(a);
        let b = cache.read(5);
        assert_eq!(a, b);
        assert_eq!(disk.reads(), 1);
        cache.release(b);
    }

    #[test]
    fn write_goes_straight_to_disk() {
        let (disk, mut cache) = cache(2);
        let id = cache.read(7);
        cache.data_mut(id)[..4].copy_from_slice(b"xv6!");
        cache.write(id);
        cache.release(id);
        assert_eq!(disk.writes(), 1);

        let mut raw = [0; BLOCK_SIZE];
        disk.read_block(7, &mut raw).unwrap();
        assert_eq!(&raw[..4], b"xv6!");
    }

    #[test]
    fn evicts_least_recently_used() {
        let (disk, mut cache) = cache(2);
        for blockno in [1, 2] {
            let id = cache.read(blockno);
            cache.release(id);
        }
        // 2 最近使用，1 最久未用
        let id = cache.read(3);
        cache.release(id);
        assert_eq!(disk.reads(), 3);

        let id = cache.read(2);
        cache.release(id);
        assert_eq!(disk.reads(), 3, "block 2 should still be cached");
        let id = cache.read(1);
        cache.release(id);
        assert_eq!(disk.reads(), 4, "block 1 should have been evicted");
    }

    #[test]
    fn held_buffers_are_never_recycled() {
        let (_disk, mut cache) = cache(2);
        let held = cache.read(1);
        let other = cache.read(2);
        cache.release(other);
        let id = cache.read(3);
        assert_ne!(id, held);
        assert_eq!(cache.blockno(held), 1);
        cache.release(id);
        cache.release(held);
    }

    #[test]
    #[should_panic(expected = "bget: no buffers")]
    fn exhaustion_is_fatal() {
        let (_disk, mut cache) = cache(2);
        let _a = cache.read(1);
        let _b = cache.read(2);
        cache.read(3);
    }

    #[test]
    fn typed_access() {
        let (_disk, mut cache) = cache(1);
        cache.update_with(9, 8, |pair: &mut [u16; 2]| *pair = [0x1234, 0xabcd]);
        let pair = cache.read_with(9, 8, |pair: &[u16; 2]| *pair);
        assert_eq!(pair, [0x1234, 0xabcd]);
    }
}
