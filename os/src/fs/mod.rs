//! # 文件系统接入层
//!
//! 把 `flat-fs` 挂载到块设备能力句柄上，并把打开的文件包装成
//! [`Io`] 能力。所有文件系统内存元数据都在一把全局睡眠锁之后，
//! 文件读写在持锁期间通过块设备句柄分块搬运。
//!
//! 文件能力的关闭走 `Drop`：fork 共享的描述符最后一个引用释放时
//! 才归还句柄槽位。

mod selftest;

pub use selftest::run as self_test;

use crate::error::{KernError, KernResult};
use crate::io::{Io, ioctl, read_full};
use crate::sync::SleepLock;
use alloc::sync::Arc;
use flat_fs::{BLOCK_SZ, BlockDevice, FlatFs, FsError};
use lazy_static::lazy_static;

fn map_err(e: FsError) -> KernError {
    match e {
        FsError::NotFound => KernError::NotFound,
        FsError::NoFreeHandle => KernError::Busy,
        FsError::BadHandle => KernError::BadDescriptor,
        FsError::InvalidArgument => KernError::InvalidArgument,
        FsError::Io => KernError::IoError,
    }
}

/// 把块设备能力句柄适配成 flat-fs 的块访问接口
///
/// 按块号寻址转换为 SETPOS + 整块读写；独占使用由文件系统的全局
/// 锁保证，设备自身的请求锁只负责单个请求的原子性。
struct DiskAdapter {
    io: Arc<dyn Io>,
}

impl BlockDevice for DiskAdapter {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), FsError> {
        let mut pos = (block_id * BLOCK_SZ) as u64;
        self.io
            .ioctl(ioctl::SETPOS, &mut pos)
            .map_err(|_| FsError::Io)?;
        match read_full(self.io.as_ref(), buf) {
            Ok(n) if n == BLOCK_SZ => Ok(()),
            _ => Err(FsError::Io),
        }
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), FsError> {
        let mut pos = (block_id * BLOCK_SZ) as u64;
        self.io
            .ioctl(ioctl::SETPOS, &mut pos)
            .map_err(|_| FsError::Io)?;
        match self.io.write(buf) {
            Ok(n) if n == BLOCK_SZ => Ok(()),
            _ => Err(FsError::Io),
        }
    }
}

lazy_static! {
    static ref FS: SleepLock<Option<FlatFs>> = SleepLock::new(None);
}

/// 挂载文件系统
///
/// `io` 通常来自 vioblk 设备；也可以是内存字面量——启动自检
/// （[`self_test`]）就经由 [`crate::io::IoLit`] 挂载一个内存镜像。
/// 重复挂载会替换当前实例，调用者保证此时没有存活的文件句柄。
pub fn mount(io: Arc<dyn Io>) -> KernResult<()> {
    let fs = FlatFs::mount(Arc::new(DiskAdapter { io })).map_err(map_err)?;
    *FS.lock() = Some(fs);
    Ok(())
}

/// 一个打开文件的 I/O 能力
///
/// 只记句柄号；状态（位置、inode 副本）都在文件系统侧的句柄表里。
pub struct FsFile {
    handle: usize,
}

/// 打开命名文件
pub fn open(name: &str) -> KernResult<Arc<FsFile>> {
    let mut guard = FS.lock();
    let fs = guard.as_mut().ok_or(KernError::IoError)?;
    let handle = fs.open(name).map_err(map_err)?;
    Ok(Arc::new(FsFile { handle }))
}

impl Io for FsFile {
    fn read(&self, buf: &mut [u8]) -> KernResult<usize> {
        let mut guard = FS.lock();
        let fs = guard.as_mut().ok_or(KernError::IoError)?;
        fs.read(self.handle, buf).map_err(map_err)
    }

    fn write(&self, buf: &[u8]) -> KernResult<usize> {
        let mut guard = FS.lock();
        let fs = guard.as_mut().ok_or(KernError::IoError)?;
        fs.write(self.handle, buf).map_err(map_err)
    }

    fn ioctl(&self, cmd: usize, arg: &mut u64) -> KernResult<()> {
        let mut guard = FS.lock();
        let fs = guard.as_mut().ok_or(KernError::IoError)?;
        match cmd {
            ioctl::GETLEN => {
                *arg = fs.len(self.handle).map_err(map_err)? as u64;
                Ok(())
            }
            ioctl::GETPOS => {
                *arg = fs.pos(self.handle).map_err(map_err)? as u64;
                Ok(())
            }
            ioctl::SETPOS => {
                if *arg > u32::MAX as u64 {
                    return Err(KernError::InvalidArgument);
                }
                fs.set_pos(self.handle, *arg as u32).map_err(map_err)
            }
            ioctl::GETBLKSZ => {
                *arg = BLOCK_SZ as u64;
                Ok(())
            }
            _ => Err(KernError::Unsupported),
        }
    }
}

impl Drop for FsFile {
    fn drop(&mut self) {
        if let Some(fs) = FS.lock().as_mut() {
            let _ = fs.close(self.handle);
        }
    }
}
