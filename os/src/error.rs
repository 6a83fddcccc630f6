//! # 内核错误类型
//!
//! 内核内部以类型化的 [`KernError`] 传播可恢复错误，系统调用边界
//! 将其转换为小的负整数返回给用户程序。结构性错误（物理内存耗尽、
//! 释放未持有的锁等）不走这条路径，直接 panic 停机。

/// 可恢复的内核错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernError {
    /// 参数无效：空缓冲区、越界下标、格式不对的请求
    InvalidArgument,
    /// 文件描述符越界或未打开
    BadDescriptor,
    /// 描述符表或文件句柄表已满
    TooManyOpen,
    /// 请求的描述符已被占用，或设备已被打开
    Busy,
    /// 块设备报告错误状态、短读或寻址失败
    IoError,
    /// 未知的系统调用、未知的 ioctl、未对齐的块请求
    Unsupported,
    /// 目录中不存在该名字的文件
    NotFound,
    /// 用户指针校验失败，或 ELF 头无效
    BadFormat,
}

impl KernError {
    /// 系统调用边界上的负错误码
    pub fn code(self) -> isize {
        -(match self {
            KernError::InvalidArgument => 1,
            KernError::BadDescriptor => 2,
            KernError::TooManyOpen => 3,
            KernError::Busy => 4,
            KernError::IoError => 5,
            KernError::Unsupported => 6,
            KernError::NotFound => 7,
            KernError::BadFormat => 8,
        })
    }
}

pub type KernResult<T> = Result<T, KernError>;
