use derive_more::Display;

/// 可恢复的错误，由系统调用报告给用户进程
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[display(fmt = "operation not permitted")]
    PermissionDenied,
    #[display(fmt = "no such file or directory")]
    NotFound,
    #[display(fmt = "no such process")]
    NoSuchProcess,
    /// 阻塞中的进程被杀死
    #[display(fmt = "interrupted")]
    Interrupted,
    #[display(fmt = "argument list too long")]
    ArgumentListTooLong,
    #[display(fmt = "exec format error")]
    ExecFormat,
    #[display(fmt = "bad file descriptor")]
    BadDescriptor,
    #[display(fmt = "no child processes")]
    NoChildren,
    /// 进程表已满
    #[display(fmt = "resource temporarily unavailable")]
    TryAgain,
    #[display(fmt = "out of memory")]
    OutOfMemory,
    #[display(fmt = "bad address")]
    BadAddress,
    #[display(fmt = "file exists")]
    AlreadyExists,
    #[display(fmt = "not a directory")]
    NotADirectory,
    #[display(fmt = "is a directory")]
    IsADirectory,
    #[display(fmt = "invalid argument")]
    InvalidArgument,
    /// 系统打开文件表已满
    #[display(fmt = "file table overflow")]
    FileTableOverflow,
    /// 进程的文件描述符用尽
    #[display(fmt = "too many open files")]
    TooManyOpenFiles,
    #[display(fmt = "file too large")]
    FileTooLarge,
    #[display(fmt = "no space left on device")]
    NoSpace,
    #[display(fmt = "illegal seek")]
    IllegalSeek,
    #[display(fmt = "broken pipe")]
    BrokenPipe,
    #[display(fmt = "directory not empty")]
    DirectoryNotEmpty,
}

impl Error {
    /// 对应的错误码
    pub fn errno(self) -> i32 {
        match self {
            Self::PermissionDenied => 1,
            Self::NotFound => 2,
            Self::NoSuchProcess => 3,
            Self::Interrupted => 4,
            Self::ArgumentListTooLong => 7,
            Self::ExecFormat => 8,
            Self::BadDescriptor => 9,
            Self::NoChildren => 10,
            Self::TryAgain => 11,
            Self::OutOfMemory => 12,
            Self::BadAddress => 14,
            Self::AlreadyExists => 17,
            Self::NotADirectory => 20,
            Self::IsADirectory => 21,
            Self::InvalidArgument => 22,
            Self::FileTableOverflow => 23,
            Self::TooManyOpenFiles => 24,
            Self::FileTooLarge => 27,
            Self::NoSpace => 28,
            Self::IllegalSeek => 29,
            Self::BrokenPipe => 32,
            Self::DirectoryNotEmpty => 39,
        }
    }
}
