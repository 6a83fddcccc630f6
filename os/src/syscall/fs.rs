//! 文件与设备相关的系统调用

use crate::config::PROC_IOMAX;
use crate::drivers::device;
use crate::error::{KernError, KernResult};
use crate::io::{Io, ioctl};
use crate::mm::{PTEFlags, validate_user_range, validate_user_str};
use crate::process::current_process;
use crate::{fs, println, task};
use alloc::sync::Arc;

const USER_R: PTEFlags = PTEFlags::U.union(PTEFlags::R);
const USER_W: PTEFlags = PTEFlags::U.union(PTEFlags::W);

/// 把能力装进描述符表
///
/// `req >= 0` 要求精确槽位（被占用报 [`KernError::BadDescriptor`]），
/// 负数自动分配最小空闲槽位。
fn install_fd(req: isize, io: Arc<dyn Io>) -> KernResult<isize> {
    let proc = current_process();
    let mut inner = proc.inner_exclusive_access();
    let fd = if req >= 0 {
        let fd = req as usize;
        if fd >= PROC_IOMAX {
            return Err(KernError::TooManyOpen);
        }
        if inner.iotab[fd].is_some() {
            return Err(KernError::BadDescriptor);
        }
        fd
    } else {
        inner
            .iotab
            .iter()
            .position(|s| s.is_none())
            .ok_or(KernError::TooManyOpen)?
    };
    inner.iotab[fd] = Some(io);
    Ok(fd as isize)
}

/// 取出描述符对应的能力句柄
///
/// 克隆 `Arc` 后立即归还进程借用：实际 I/O 可能睡眠，不能抱着
/// 进程内部状态等设备。
fn fd_io(fd: isize) -> KernResult<Arc<dyn Io>> {
    if fd < 0 || fd as usize >= PROC_IOMAX {
        return Err(KernError::BadDescriptor);
    }
    current_process()
        .inner_exclusive_access()
        .iotab[fd as usize]
        .clone()
        .ok_or(KernError::BadDescriptor)
}

pub fn sys_devopen(fd: isize, name_ptr: usize, instno: usize) -> KernResult<isize> {
    let name = validate_user_str(name_ptr, USER_R)?;
    let io = device::open(name, instno)?;
    install_fd(fd, io)
}

pub fn sys_fsopen(fd: isize, name_ptr: usize) -> KernResult<isize> {
    let name = validate_user_str(name_ptr, USER_R)?;
    let io = fs::open(name)?;
    install_fd(fd, io)
}

pub fn sys_close(fd: isize) -> KernResult<isize> {
    if fd < 0 || fd as usize >= PROC_IOMAX {
        return Err(KernError::BadDescriptor);
    }
    let proc = current_process();
    let mut inner = proc.inner_exclusive_access();
    if inner.iotab[fd as usize].take().is_none() {
        return Err(KernError::BadDescriptor);
    }
    Ok(0)
}

pub fn sys_read(fd: isize, buf: usize, len: usize) -> KernResult<isize> {
    let io = fd_io(fd)?;
    validate_user_range(buf, len, USER_W)?;
    let slice = unsafe { core::slice::from_raw_parts_mut(buf as *mut u8, len) };
    Ok(io.read(slice)? as isize)
}

pub fn sys_write(fd: isize, buf: usize, len: usize) -> KernResult<isize> {
    let io = fd_io(fd)?;
    validate_user_range(buf, len, USER_R)?;
    let slice = unsafe { core::slice::from_raw_parts(buf as *const u8, len) };
    Ok(io.write(slice)? as isize)
}

/// ioctl：参数是指向 u64 的用户指针，方向由命令决定
pub fn sys_ioctl(fd: isize, cmd: usize, arg_ptr: usize) -> KernResult<isize> {
    let io = fd_io(fd)?;
    // 用户指针不保证对齐
    let mut arg: u64 = match cmd {
        ioctl::SETPOS | ioctl::SETLEN => {
            validate_user_range(arg_ptr, size_of::<u64>(), USER_R)?;
            unsafe { (arg_ptr as *const u64).read_unaligned() }
        }
        ioctl::GETLEN | ioctl::GETPOS | ioctl::GETBLKSZ => {
            validate_user_range(arg_ptr, size_of::<u64>(), USER_W)?;
            0
        }
        _ => return Err(KernError::Unsupported),
    };
    io.ioctl(cmd, &mut arg)?;
    if matches!(cmd, ioctl::GETLEN | ioctl::GETPOS | ioctl::GETBLKSZ) {
        unsafe { (arg_ptr as *mut u64).write_unaligned(arg) };
    }
    Ok(0)
}

/// 打印每个打开描述符的引用计数
pub fn sys_pioref() -> KernResult<isize> {
    let proc = current_process();
    let inner = proc.inner_exclusive_access();
    for (fd, slot) in inner.iotab.iter().enumerate() {
        if let Some(io) = slot {
            println!(
                "<pid {} tid {}> fd {}: refcnt = {}",
                proc.pid,
                task::current_tid(),
                fd,
                Arc::strong_count(io)
            );
        }
    }
    Ok(0)
}
