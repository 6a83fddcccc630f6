//! 进程生命周期相关的系统调用

use crate::config::PROC_IOMAX;
use crate::error::{KernError, KernResult};
use crate::mm::{PTEFlags, validate_user_str};
use crate::process::{self, current_process};
use crate::trap::TrapFrame;
use crate::{println, task, timer};

pub fn sys_exit() -> KernResult<isize> {
    process::exit_current()
}

/// 把用户字符串打印到控制台
pub fn sys_msgout(msg_ptr: usize) -> KernResult<isize> {
    let msg = validate_user_str(msg_ptr, PTEFlags::U | PTEFlags::R)?;
    let proc = current_process();
    println!("<pid {} tid {}> says: {}", proc.pid, task::current_tid(), msg);
    Ok(0)
}

/// 执行 fd 指向的程序，成功不返回
///
/// 描述符槽位先清空：无论成功失败，能力都被本次 exec 消耗。
pub fn sys_exec(fd: isize) -> KernResult<isize> {
    if fd < 0 || fd as usize >= PROC_IOMAX {
        return Err(KernError::BadDescriptor);
    }
    let io = {
        let proc = current_process();
        let mut inner = proc.inner_exclusive_access();
        inner.iotab[fd as usize]
            .take()
            .ok_or(KernError::BadDescriptor)?
    };
    process::exec(io)?;
    unreachable!("exec returned on success")
}

pub fn sys_fork(cx: &TrapFrame) -> KernResult<isize> {
    Ok(process::fork(cx)? as isize)
}

/// 等待 fork 出的子线程退出；`tid == 0` 表示任意一个
pub fn sys_wait(tid: usize) -> KernResult<isize> {
    let exited = if tid == 0 {
        task::join_any()?
    } else {
        task::join(tid)?
    };
    Ok(exited as isize)
}

pub fn sys_usleep(us: usize) -> KernResult<isize> {
    timer::usleep(us);
    Ok(0)
}
