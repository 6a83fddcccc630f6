//! # I/O 能力接口
//!
//! 文件、块设备和内存缓冲区共用同一组操作：`read`/`write`/`ioctl`，
//! 关闭语义由 `Drop` 承担。句柄以 `Arc<dyn Io>` 的形式在进程间共享，
//! fork 复制描述符表时克隆 `Arc` 即是引用计数加一；最后一个引用
//! 释放时底层对象的关闭逻辑才真正执行。

use crate::error::{KernError, KernResult};
use crate::sync::UPIntrFreeCell;
use alloc::boxed::Box;

/// ioctl 命令号
pub mod ioctl {
    /// 取长度（字节），写出到 arg
    pub const GETLEN: usize = 1;
    /// 取当前读写位置，写出到 arg
    pub const GETPOS: usize = 2;
    /// 设置读写位置，从 arg 读入
    pub const SETPOS: usize = 3;
    /// 取块大小，写出到 arg
    pub const GETBLKSZ: usize = 4;
    /// 设置长度（仅内存缓冲区支持），从 arg 读入
    pub const SETLEN: usize = 5;
}

/// 统一的 I/O 能力接口
///
/// 缺省实现一律返回 [`KernError::Unsupported`]，实现者只补齐自己
/// 支持的操作。
pub trait Io: Send + Sync {
    fn read(&self, _buf: &mut [u8]) -> KernResult<usize> {
        Err(KernError::Unsupported)
    }

    fn write(&self, _buf: &[u8]) -> KernResult<usize> {
        Err(KernError::Unsupported)
    }

    /// 设备相关控制操作，返回值通过 `arg` 带回
    fn ioctl(&self, _cmd: usize, _arg: &mut u64) -> KernResult<()> {
        Err(KernError::Unsupported)
    }
}

/// 循环读直到填满缓冲区或读到尾部
///
/// 装载器和文件系统用它消化底层可能的短读。
pub fn read_full(io: &dyn Io, buf: &mut [u8]) -> KernResult<usize> {
    let mut acc = 0;
    while acc < buf.len() {
        let cnt = io.read(&mut buf[acc..])?;
        if cnt == 0 {
            break;
        }
        acc += cnt;
    }
    Ok(acc)
}

struct IoLitInner {
    buf: Box<[u8]>,
    size: usize,
    pos: usize,
}

/// 内存字面量 I/O
///
/// 把一段内核缓冲区当作可寻址的"设备"使用，实现与文件/块设备相同
/// 的操作。文件系统可以直接挂载在它上面：启动自检就是经由它从
/// 内存镜像挂载并做读写回环的（`fs::self_test`）。
pub struct IoLit {
    inner: UPIntrFreeCell<IoLitInner>,
}

impl IoLit {
    pub fn new(buf: Box<[u8]>) -> Self {
        let size = buf.len();
        Self {
            inner: unsafe { UPIntrFreeCell::new(IoLitInner { buf, size, pos: 0 }) },
        }
    }
}

impl Io for IoLit {
    fn read(&self, buf: &mut [u8]) -> KernResult<usize> {
        self.inner.exclusive_session(|lit| {
            let remaining = lit.size - lit.pos;
            let n = buf.len().min(remaining);
            buf[..n].copy_from_slice(&lit.buf[lit.pos..lit.pos + n]);
            lit.pos += n;
            Ok(n)
        })
    }

    fn write(&self, buf: &[u8]) -> KernResult<usize> {
        self.inner.exclusive_session(|lit| {
            let remaining = lit.size - lit.pos;
            let n = buf.len().min(remaining);
            let pos = lit.pos;
            lit.buf[pos..pos + n].copy_from_slice(&buf[..n]);
            lit.pos += n;
            Ok(n)
        })
    }

    fn ioctl(&self, cmd: usize, arg: &mut u64) -> KernResult<()> {
        self.inner.exclusive_session(|lit| match cmd {
            ioctl::GETLEN => {
                *arg = lit.size as u64;
                Ok(())
            }
            ioctl::GETPOS => {
                *arg = lit.pos as u64;
                Ok(())
            }
            ioctl::SETPOS => {
                if *arg > lit.size as u64 {
                    return Err(KernError::InvalidArgument);
                }
                lit.pos = *arg as usize;
                Ok(())
            }
            ioctl::SETLEN => {
                if *arg > lit.buf.len() as u64 {
                    return Err(KernError::InvalidArgument);
                }
                lit.size = *arg as usize;
                Ok(())
            }
            _ => Err(KernError::Unsupported),
        })
    }
}
