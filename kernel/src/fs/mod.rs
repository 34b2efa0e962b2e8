//! # 内核文件系统
//!
//! ## 分层（自上而下）
//!
//! 1. 系统调用层
//! 2. 文件描述符层：进程的描述符表只存系统打开文件表的下标
//! 3. 打开文件层：控制台、管道或索引节点，带引用计数
//! 4. 文件系统层（xv6fs）
//! 5. 块设备驱动层

mod file;
pub mod pipe;
pub mod stdio;

pub use self::{
    file::{FileId, FileKind, FileTable, OpenFile},
    pipe::{Pipe, PipeEnd, PipeId, PipePool},
    stdio::{BufferConsole, Console},
};
