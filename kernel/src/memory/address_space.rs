use alloc::vec::Vec;

use vfs::Error;

use super::{FrameTable, PhysMemory};
use crate::config::{PAGE_SIZE, PAGE_SIZE_BITS};

/// 按页切分`[vaddr, vaddr + len)`，给出每段的页号、页内偏移与长度
fn page_chunks(vaddr: u16, len: usize) -> Result<impl Iterator<Item = (usize, usize, usize)>, Error> {
    let start = vaddr as usize;
    let end = start + len;
    if end > 1 << 16 {
        return Err(Error::BadAddress);
    }
    Ok(core::iter::successors(
        (start < end).then_some(start),
        move |&addr| {
            let next = (addr & !(PAGE_SIZE - 1)) + PAGE_SIZE;
            (next < end).then_some(next)
        },
    )
    .map(move |addr| {
        let offset = addr & (PAGE_SIZE - 1);
        let len = (PAGE_SIZE - offset).min(end - addr);
        (addr >> PAGE_SIZE_BITS, offset, len)
    }))
}

/// 通过帧表访问的 16 位地址空间
pub struct AddressSpace<'a> {
    table: &'a FrameTable,
    memory: &'a mut PhysMemory,
}

impl<'a> AddressSpace<'a> {
    #[inline]
    pub fn new(table: &'a FrameTable, memory: &'a mut PhysMemory) -> Self {
        Self { table, memory }
    }

    pub fn read(&self, vaddr: u16, buf: &mut [u8]) -> Result<(), Error> {
        let mut done = 0;
        for (page, offset, len) in page_chunks(vaddr, buf.len())? {
            let frame = self.table[page].ok_or(Error::BadAddress)?;
            buf[done..done + len].copy_from_slice(&self.memory.frame(frame)[offset..offset + len]);
            done += len;
        }
        Ok(())
    }

    pub fn write(&mut self, vaddr: u16, data: &[u8]) -> Result<(), Error> {
        // 先检查整段都已映射，不做部分写入
        for (page, _, _) in page_chunks(vaddr, data.len())? {
            self.table[page].ok_or(Error::BadAddress)?;
        }
        let mut done = 0;
        for (page, offset, len) in page_chunks(vaddr, data.len())? {
            let frame = self.table[page].ok_or(Error::BadAddress)?;
            self.memory.frame_mut(frame)[offset..offset + len]
                .copy_from_slice(&data[done..done + len]);
            done += len;
        }
        Ok(())
    }

    /// 大端序的 16 位字
    pub fn read_u16(&self, vaddr: u16) -> Result<u16, Error> {
        let mut bytes = [0; 2];
        self.read(vaddr, &mut bytes)?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// 以 NUL 结尾的字符串，不含 NUL，最长`max`字节
    pub fn read_cstr(&self, vaddr: u16, max: usize) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::new();
        let mut addr = vaddr;
        loop {
            let mut byte = [0];
            self.read(addr, &mut byte)?;
            if byte[0] == 0 {
                return Ok(bytes);
            }
            if bytes.len() == max {
                return Err(Error::ArgumentListTooLong);
            }
            bytes.push(byte[0]);
            addr = addr.checked_add(1).ok_or(Error::BadAddress)?;
        }
    }
}
