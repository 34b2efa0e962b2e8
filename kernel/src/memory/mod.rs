//! 物理内存与进程地址空间
//!
//! 16 位地址空间分为 [`NPAGES`](crate::config::NPAGES) 页，
//! 每个进程的帧表把逻辑页映射到物理页帧。

mod address_space;
mod frame_allocator;

use alloc::boxed::Box;
use alloc::vec::Vec;

use derive_more::{From, Into};

pub use self::{
    address_space::AddressSpace,
    frame_allocator::{FrameAllocator, LinearFrameAllocator},
};
use crate::config::PAGE_SIZE;

/// 物理页帧号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct FrameNo(u8);

impl FrameNo {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 进程的帧表，空缺表示该页未映射
pub type FrameTable = [Option<FrameNo>; crate::config::NPAGES];

type Page = [u8; PAGE_SIZE];

/// 物理内存，按页帧划分
pub struct PhysMemory {
    frames: Vec<Box<Page>>,
}

impl PhysMemory {
    pub fn new(nframes: usize) -> Self {
        assert!(nframes <= u8::MAX as usize + 1, "too many page frames");
        Self {
            frames: (0..nframes).map(|_| Box::new([0; PAGE_SIZE])).collect(),
        }
    }

    #[inline]
    pub fn frame(&self, frame: FrameNo) -> &Page {
        &self.frames[frame.index()]
    }

    #[inline]
    pub fn frame_mut(&mut self, frame: FrameNo) -> &mut Page {
        &mut self.frames[frame.index()]
    }

    /// 复制整个页帧
    pub fn copy_frame(&mut self, from: FrameNo, to: FrameNo) {
        let page = *self.frame(from);
        self.frame_mut(to).copy_from_slice(&page);
    }
}
