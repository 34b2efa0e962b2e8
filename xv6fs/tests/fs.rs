use std::sync::Arc;

use block_dev::RamDisk;
use vfs::{Error, InodeType};
use xv6fs::{BLOCK_SIZE, CacheConfig, FileName, FileSystem, Geometry, InodeRef, MAXFILE, NDIRECT};

fn fresh() -> (FileSystem, InodeRef) {
    let _ = env_logger::builder().is_test(true).try_init();
    let disk = Arc::new(RamDisk::new(1000));
    let mut fs = FileSystem::format(disk, Geometry::default(), CacheConfig::default());
    let root = fs.root();
    (fs, root)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

fn write_file(fs: &mut FileSystem, cwd: InodeRef, path: &str, data: &[u8]) {
    let ip = fs.create(path.as_bytes(), InodeType::File, cwd).unwrap();
    assert_eq!(fs.writei(ip, data, 0), Ok(data.len()));
    fs.iput(ip);
}

fn read_file(fs: &mut FileSystem, cwd: InodeRef, path: &str) -> Option<Vec<u8>> {
    let ip = fs.namei(path.as_bytes(), cwd)?;
    fs.ilock(ip);
    let mut data = vec![0; fs.inode(ip).size() as usize];
    let n = fs.readi(ip, &mut data, 0).unwrap();
    assert_eq!(n, data.len());
    fs.iput(ip);
    Some(data)
}

#[test]
fn round_trip_sizes() {
    let (mut fs, root) = fresh();
    for (i, len) in [
        0,
        100,
        BLOCK_SIZE,
        NDIRECT * BLOCK_SIZE - 1,
        NDIRECT * BLOCK_SIZE + 1,
        MAXFILE * BLOCK_SIZE,
    ]
    .into_iter()
    .enumerate()
    {
        let path = format!("f{i}");
        let data = pattern(len);
        write_file(&mut fs, root, &path, &data);
        assert_eq!(read_file(&mut fs, root, &path), Some(data), "len={len}");
        fs.unlink(path.as_bytes(), root).unwrap();
    }
}

#[test]
fn writes_past_max_file_fail_whole() {
    let (mut fs, root) = fresh();
    let ip = fs.create(b"big", InodeType::File, root).unwrap();
    let free = fs.free_blocks();
    assert_eq!(
        fs.writei(ip, &pattern(MAXFILE * BLOCK_SIZE + 1), 0),
        Err(Error::FileTooLarge)
    );
    assert_eq!(fs.inode(ip).size(), 0);
    assert_eq!(fs.free_blocks(), free);
    assert_eq!(fs.writei(ip, b"x", 1), Err(Error::InvalidArgument));
    fs.iput(ip);
}

#[test]
fn reads_are_clamped_at_eof() {
    let (mut fs, root) = fresh();
    write_file(&mut fs, root, "small", b"0123456789");
    let ip = fs.namei(b"small", root).unwrap();
    fs.ilock(ip);
    let mut buf = [0; 64];
    assert_eq!(fs.readi(ip, &mut buf, 4), Ok(6));
    assert_eq!(&buf[..6], b"456789");
    assert_eq!(fs.readi(ip, &mut buf, 10), Ok(0));
    assert_eq!(fs.readi(ip, &mut buf, 11), Err(Error::InvalidArgument));
    fs.iput(ip);
}

#[test]
fn unlinked_inode_survives_until_last_reference() {
    let (mut fs, root) = fresh();
    let free = fs.free_blocks();
    write_file(&mut fs, root, "unlinkread", b"hello");

    let held = fs.namei(b"unlinkread", root).unwrap();
    fs.ilock(held);
    fs.unlink(b"unlinkread", root).unwrap();
    assert_eq!(fs.namei(b"unlinkread", root), None);

    write_file(&mut fs, root, "unlinkread", b"yyy");
    let mut buf = [0; 16];
    assert_eq!(fs.readi(held, &mut buf, 0), Ok(5));
    assert_eq!(&buf[..5], b"hello");
    assert_eq!(fs.inode(held).nlink(), 0);
    fs.iput(held);

    fs.unlink(b"unlinkread", root).unwrap();
    assert_eq!(fs.free_blocks(), free);
}

#[test]
fn link_rules() {
    let (mut fs, root) = fresh();
    write_file(&mut fs, root, "lf1", b"hello");

    assert_eq!(fs.link(b"lf1", b"lf1", root), Err(Error::AlreadyExists));
    assert_eq!(fs.link(b"lf1", b"nodir/x", root), Err(Error::NotFound));
    assert_eq!(fs.link(b".", b"lf2", root), Err(Error::PermissionDenied));
    assert_eq!(fs.link(b"nothere", b"lf2", root), Err(Error::NotFound));

    fs.link(b"lf1", b"lf2", root).unwrap();
    fs.unlink(b"lf1", root).unwrap();
    assert_eq!(read_file(&mut fs, root, "lf1"), None);
    assert_eq!(read_file(&mut fs, root, "lf2"), Some(b"hello".to_vec()));

    let ip = fs.namei(b"lf2", root).unwrap();
    fs.ilock(ip);
    assert_eq!(fs.inode(ip).nlink(), 1);
    fs.iput(ip);
}

#[test]
fn directories() {
    let (mut fs, root) = fresh();
    let dd = fs.create(b"dd", InodeType::Directory, root).unwrap();
    fs.iput(dd);
    assert_eq!(
        fs.create(b"dd", InodeType::Directory, root),
        Err(Error::AlreadyExists)
    );
    assert_eq!(
        fs.create(b"dd", InodeType::File, root),
        Err(Error::AlreadyExists)
    );

    write_file(&mut fs, root, "/dd/ff", b"ff");
    assert_eq!(fs.unlink(b"dd", root), Err(Error::DirectoryNotEmpty));
    assert_eq!(fs.unlink(b"dd/.", root), Err(Error::PermissionDenied));
    assert_eq!(fs.unlink(b"dd/..", root), Err(Error::PermissionDenied));
    assert_eq!(read_file(&mut fs, root, "dd/../dd/ff"), Some(b"ff".to_vec()));

    // 普通文件不能充当目录
    assert_eq!(fs.namei(b"dd/ff/x", root), None);
    assert_eq!(
        fs.create(b"dd/ff/x", InodeType::File, root),
        Err(Error::NotFound)
    );

    fs.unlink(b"dd/ff", root).unwrap();
    fs.unlink(b"dd", root).unwrap();
    assert_eq!(fs.namei(b"dd", root), None);

    fs.ilock(root);
    assert_eq!(fs.inode(root).nlink(), 1);
    let names: Vec<_> = fs.dirents(root).iter().map(|de| de.name).collect();
    assert_eq!(names, [FileName::from("."), FileName::from("..")]);
}

#[test]
fn relative_lookup_and_parent_link_counts() {
    let (mut fs, root) = fresh();
    let a = fs.create(b"/a", InodeType::Directory, root).unwrap();
    let b = fs.create(b"b", InodeType::Directory, a).unwrap();
    fs.iput(b);
    write_file(&mut fs, a, "b/c", b"deep");

    assert_eq!(read_file(&mut fs, root, "a/b/c"), Some(b"deep".to_vec()));
    assert_eq!(read_file(&mut fs, a, "b/../b/c"), Some(b"deep".to_vec()));
    assert_eq!(read_file(&mut fs, a, "/a/b/c"), Some(b"deep".to_vec()));

    // 子目录的`..`计入父目录的链接数
    assert_eq!(fs.inode(a).nlink(), 2);
    fs.iput(a);
}

#[test]
fn long_names_are_truncated() {
    let (mut fs, root) = fresh();
    let d = fs.create(b"12345678901234", InodeType::Directory, root).unwrap();
    fs.iput(d);
    write_file(&mut fs, root, "123456789012345/123456789012345", b"x");
    assert_eq!(
        read_file(&mut fs, root, "12345678901234/12345678901234"),
        Some(b"x".to_vec())
    );
    assert_eq!(
        fs.create(b"12345678901234/123456789012345", InodeType::Directory, root),
        Err(Error::AlreadyExists)
    );
}

#[test]
fn free_slots_are_reused() {
    let (mut fs, root) = fresh();
    for name in ["a", "b", "c"] {
        write_file(&mut fs, root, name, name.as_bytes());
    }
    fs.ilock(root);
    let size = fs.inode(root).size();
    fs.unlink(b"b", root).unwrap();
    write_file(&mut fs, root, "d", b"d");
    assert_eq!(fs.inode(root).size(), size);
}

#[test]
fn inode_references_do_not_leak() {
    let (mut fs, root) = fresh();
    let before = fs.inode(root).refcnt();
    for i in 0..40 {
        let name = format!("irefd{i}");
        let d = fs.create(name.as_bytes(), InodeType::Directory, root).unwrap();
        fs.iput(d);
        write_file(&mut fs, root, &format!("{name}/f"), b"");
        assert!(fs.namei(format!("{name}/missing/x").as_bytes(), root).is_none());
        fs.unlink(format!("{name}/f").as_bytes(), root).unwrap();
        fs.unlink(name.as_bytes(), root).unwrap();
    }
    assert_eq!(fs.inode(root).refcnt(), before);
}

#[test]
fn big_directory() {
    let (mut fs, root) = fresh();
    let ip = fs.create(b"bd", InodeType::File, root).unwrap();
    fs.iput(ip);
    for i in 0..150 {
        let name = format!("x{i:03}");
        fs.link(b"bd", name.as_bytes(), root).unwrap();
    }
    for i in 0..150 {
        let name = format!("x{i:03}");
        fs.unlink(name.as_bytes(), root).unwrap();
    }
    let ip = fs.namei(b"bd", root).unwrap();
    fs.ilock(ip);
    assert_eq!(fs.inode(ip).nlink(), 1);
    fs.iput(ip);
}

#[test]
fn data_persists_across_mounts() {
    let disk = Arc::new(RamDisk::new(1000));
    let mut fs = FileSystem::format(disk.clone(), Geometry::default(), CacheConfig::default());
    let root = fs.root();
    write_file(&mut fs, root, "persist", b"still here");
    drop(fs);

    let mut fs = FileSystem::mount(disk, CacheConfig::default()).unwrap();
    let root = fs.root();
    assert_eq!(read_file(&mut fs, root, "persist"), Some(b"still here".to_vec()));
}

#[test]
#[should_panic(expected = "freeing free block")]
fn double_free_is_fatal() {
    let (mut fs, _root) = fresh();
    let b = fs.balloc();
    fs.bfree(b);
    fs.bfree(b);
}
