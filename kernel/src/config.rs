//! Constants used in the kernel

use xv6fs::CacheConfig;

/// 每个进程的页数，即帧表的项数
pub const NPAGES: usize = 8;
/// 页大小，十六进制表示方便地址转页号的计算
pub const PAGE_SIZE: usize = 0x2000;
/// 页内寻址的位数
pub const PAGE_SIZE_BITS: usize = 13;

/// 用户代码的起始地址
pub const USERCODE: u16 = 0x0002;
/// 用户数据的起始地址，也是第 1 页的起始
pub const USERDATA: u16 = 0x2000;
/// 用户栈顶
pub const STACKTOP: u16 = 0xFDFD;
/// exec 参数区的容量
pub const ARG_MAX: usize = 512;

/// 管道环形缓冲区的容量
pub const PIPE_SIZE: usize = 32;

/// 内核的规模参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// 进程表大小
    pub nproc: usize,
    /// 每个进程的文件描述符个数
    pub nofile: usize,
    /// 系统打开文件表大小
    pub nfile: usize,
    /// 物理页帧数，0 号帧归内核
    pub nframes: usize,
    /// 管道池大小
    pub npipe: usize,
    /// 以此为前缀的路径是控制台
    pub console_prefix: &'static str,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nproc: 8,
            nofile: 16,
            nfile: 16,
            nframes: 64,
            npipe: 16,
            console_prefix: "/tty",
            cache: CacheConfig::default(),
        }
    }
}
