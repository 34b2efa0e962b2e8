//! 在主机上制作 xv6fs 镜像

mod block_file;

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;

use block_dev::{BLOCK_SIZE, BlockDevice};
use vfs::{Error, InodeType};
use xv6fs::{CacheConfig, FileSystem, Geometry, InodeRef};

pub use self::block_file::BlockFile;

fn fs_error(err: Error) -> io::Error {
    io::Error::other(err.to_string())
}

/// 在`out`处新建镜像文件并格式化，布局参数不合法时不创建文件
pub fn create_image(out: &Path, geometry: Geometry) -> io::Result<FileSystem> {
    geometry
        .check()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(out)?;
    fd.set_len(geometry.size as u64 * BLOCK_SIZE as u64)?;

    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd)?);
    Ok(FileSystem::format(block_dev, geometry, CacheConfig::default()))
}

/// 把主机目录`src`下的文件树逐级复制到镜像的目录`dir`，返回复制的普通文件数
pub fn pack(fs: &mut FileSystem, src: &Path, dir: &str) -> io::Result<usize> {
    let root = fs.root();
    let copied = pack_dir(fs, root, src, dir);
    fs.iput(root);
    copied
}

fn pack_dir(fs: &mut FileSystem, root: InodeRef, src: &Path, dir: &str) -> io::Result<usize> {
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            log::warn!("skipping non-UTF-8 name {:?}", entry.file_name());
            continue;
        };
        let path = format!("{}/{name}", dir.trim_end_matches('/'));

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            let ip = fs
                .create(path.as_bytes(), InodeType::Directory, root)
                .map_err(fs_error)?;
            fs.iput(ip);
            log::info!("dir: {path}");
            copied += pack_dir(fs, root, &entry.path(), &path)?;
        } else if file_type.is_file() {
            let data = fs::read(entry.path())?;
            let ip = fs
                .create(path.as_bytes(), InodeType::File, root)
                .map_err(fs_error)?;
            let written = fs.writei(ip, &data, 0);
            fs.iput(ip);
            written.map_err(fs_error)?;
            log::info!("file: {path} ({} bytes)", data.len());
            copied += 1;
        }
    }

    Ok(copied)
}
