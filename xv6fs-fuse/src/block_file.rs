use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use block_dev::{BLOCK_SIZE, BlockDevice, IoError};
use send_wrapper::SendWrapper;

/// 以主机上的镜像文件充当块设备
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
    num_blocks: usize,
}

impl BlockFile {
    pub fn new(fd: File) -> io::Result<Self> {
        let num_blocks = (fd.metadata()?.len() / BLOCK_SIZE as u64) as usize;
        Ok(Self {
            inner: SendWrapper::new(RefCell::new(fd)),
            num_blocks,
        })
    }

    fn seek(file: &mut File, block_id: usize) -> Result<(), IoError> {
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .map(drop)
            .map_err(|err| {
                log::error!("seeking to block {block_id}: {err}");
                IoError { block_id }
            })
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), IoError> {
        let mut file = self.inner.borrow_mut();
        Self::seek(&mut file, block_id)?;
        file.read_exact(buf).map_err(|err| {
            log::error!("reading block {block_id}: {err}");
            IoError { block_id }
        })
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), IoError> {
        let mut file = self.inner.borrow_mut();
        Self::seek(&mut file, block_id)?;
        file.write_all(buf).map_err(|err| {
            log::error!("writing block {block_id}: {err}");
            IoError { block_id }
        })
    }

    fn num_blocks(&self) -> usize {
        self.num_blocks
    }
}
