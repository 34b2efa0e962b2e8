#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;

use block_dev::RamDisk;
use kernel::{BufferConsole, Config, InodeType, Outcome, Processor, ProgramTable, Sys};
use xv6fs::{CacheConfig, FileSystem, Geometry};

pub fn disk() -> Arc<RamDisk> {
    let _ = env_logger::builder().is_test(true).try_init();
    let disk = Arc::new(RamDisk::new(1000));
    FileSystem::format(disk.clone(), Geometry::default(), CacheConfig::default());
    disk
}

/// 在格式化好的盘上放一个文件，缺失的目录逐级创建
pub fn install(disk: &Arc<RamDisk>, path: &str, data: &[u8]) {
    let mut fs = FileSystem::mount(disk.clone(), CacheConfig::default()).unwrap();
    let root = fs.root();
    let mut prefix = String::new();
    let (dirs, _) = path.rsplit_once('/').unwrap_or(("", path));
    for dir in dirs.split('/').filter(|d| !d.is_empty()) {
        prefix.push('/');
        prefix.push_str(dir);
        if let Ok(ip) = fs.create(prefix.as_bytes(), InodeType::Directory, root) {
            fs.iput(ip);
        }
    }
    let ip = fs.create(path.as_bytes(), InodeType::File, root).unwrap();
    assert_eq!(fs.writei(ip, data, 0), Ok(data.len()));
    fs.iput(ip);
}

pub struct Machine {
    pub cpu: Processor,
    pub console: BufferConsole,
}

pub fn machine_with(disk: Arc<RamDisk>, config: Config, programs: ProgramTable) -> Machine {
    let console = BufferConsole::default();
    let cpu = Processor::new(disk, config, Box::new(console.clone()), programs).unwrap();
    Machine { cpu, console }
}

/// 以`main`为 init 运行到停机，返回 init 的退出码
pub fn run_init<F, Fut>(main: F) -> i32
where
    F: FnOnce(Sys) -> Fut + 'static,
    Fut: Future<Output = i32> + 'static,
{
    let mut machine = machine_with(disk(), Config::default(), ProgramTable::new());
    machine.cpu.spawn_init(main).unwrap();
    match machine.cpu.run() {
        Outcome::Halted(status) => status,
        Outcome::Idle => panic!("all processes blocked"),
    }
}

pub async fn read_all(sys: &Sys, fd: usize) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0; 64];
    loop {
        let n = sys.read(fd, &mut buf).await.unwrap();
        if n == 0 {
            return data;
        }
        data.extend_from_slice(&buf[..n]);
    }
}
