use alloc::vec;
use alloc::vec::Vec;

use super::FrameNo;

/// 物理页帧分配器
pub trait FrameAllocator {
    fn alloc(&mut self) -> Option<FrameNo>;
    fn dealloc(&mut self, frame: FrameNo);
}

/// 线性扫描的页帧分配器，总是分配编号最小的空闲帧
///
/// 0 号帧属于内核，永不分配。
#[derive(Debug)]
pub struct LinearFrameAllocator {
    inuse: Vec<bool>,
}

impl LinearFrameAllocator {
    pub fn new(nframes: usize) -> Self {
        assert!(nframes > 1 && nframes <= u8::MAX as usize + 1);
        let mut inuse = vec![false; nframes];
        inuse[0] = true;
        Self { inuse }
    }

    /// 空闲帧数
    pub fn free_count(&self) -> usize {
        self.inuse.iter().filter(|&&used| !used).count()
    }
}

impl FrameAllocator for LinearFrameAllocator {
    fn alloc(&mut self) -> Option<FrameNo> {
        let index = self.inuse.iter().position(|&used| !used)?;
        self.inuse[index] = true;
        Some(FrameNo::from(index as u8))
    }

    /// 回收页帧
    ///
    /// 合法的被回收帧之前一定被分配出去过，且不是 0 号帧
    fn dealloc(&mut self, frame: FrameNo) {
        let index = frame.index();
        if index == 0 || index >= self.inuse.len() {
            panic!("bad frame {index} in dealloc");
        }
        if !self.inuse[index] {
            panic!("Frame {index} has not been allocated!");
        }
        self.inuse[index] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_free_first_and_kernel_frame_reserved() {
        let mut frames = LinearFrameAllocator::new(4);
        assert_eq!(frames.free_count(), 3);
        let a = frames.alloc().unwrap();
        let b = frames.alloc().unwrap();
        assert_eq!((a.index(), b.index()), (1, 2));
        frames.dealloc(a);
        assert_eq!(frames.alloc(), Some(a));
        assert_eq!(frames.alloc().map(FrameNo::index), Some(3));
        assert_eq!(frames.alloc(), None);
    }

    #[test]
    #[should_panic(expected = "has not been allocated")]
    fn double_free_is_fatal() {
        let mut frames = LinearFrameAllocator::new(4);
        let a = frames.alloc().unwrap();
        frames.dealloc(a);
        frames.dealloc(a);
    }
}
