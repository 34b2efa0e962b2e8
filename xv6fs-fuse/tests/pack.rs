use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use block_dev::BLOCK_SIZE;
use xv6fs::{CacheConfig, FileSystem, Geometry};
use xv6fs_fuse::{BlockFile, create_image, pack};

fn scratch(name: &str) -> PathBuf {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = std::env::temp_dir().join(format!("xv6fs-pack-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn read_file(fs: &mut FileSystem, path: &str) -> Vec<u8> {
    let root = fs.root();
    let ip = fs.namei(path.as_bytes(), root).unwrap();
    fs.ilock(ip);
    let mut data = vec![0; fs.inode(ip).size() as usize];
    fs.readi(ip, &mut data, 0).unwrap();
    fs.iput(ip);
    fs.iput(root);
    data
}

#[test]
fn packed_tree_survives_remount() {
    let dir = scratch("tree");
    let src = dir.join("src");
    fs::create_dir_all(src.join("bin")).unwrap();
    fs::write(src.join("README"), b"xv6").unwrap();
    let big: Vec<u8> = (0..20_000).map(|i| (i % 253) as u8).collect();
    fs::write(src.join("bin").join("big"), &big).unwrap();

    let image = dir.join("fs.img");
    {
        let mut fs = create_image(&image, Geometry::default()).unwrap();
        assert_eq!(pack(&mut fs, &src, "/").unwrap(), 2);
    }

    let fd = OpenOptions::new().read(true).write(true).open(&image).unwrap();
    let disk = Arc::new(BlockFile::new(fd).unwrap());
    let mut fs = FileSystem::mount(disk, CacheConfig::default()).unwrap();
    assert_eq!(read_file(&mut fs, "/README"), b"xv6");
    assert_eq!(read_file(&mut fs, "/bin/big"), big);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn short_image_reports_io_errors() {
    use block_dev::BlockDevice;

    let dir = scratch("short");
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(dir.join("fs.img"))
        .unwrap();
    fd.set_len(4 * BLOCK_SIZE as u64).unwrap();

    let disk = BlockFile::new(fd).unwrap();
    assert_eq!(disk.num_blocks(), 4);
    let mut buf = [0; BLOCK_SIZE];
    assert!(disk.read_block(3, &mut buf).is_ok());
    assert_eq!(disk.read_block(9, &mut buf).map_err(|e| e.block_id), Err(9));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn bad_geometry_is_refused_before_touching_the_host() {
    let dir = scratch("geometry");
    let image = dir.join("fs.img");

    for geometry in [
        Geometry {
            size: 20,
            ..Geometry::default()
        },
        Geometry {
            ninodes: 1,
            ..Geometry::default()
        },
    ] {
        let err = create_image(&image, geometry).err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        assert!(!image.exists());
    }

    fs::remove_dir_all(&dir).unwrap();
}
