//! # 系统调用
//!
//! 调用号在 `a7`，参数 `a0..a2`，返回值写回 `a0`；错误以负数错误码
//! 返回。涉及用户指针的调用先经虚存层校验再访问。

use crate::trap::TrapFrame;
use fs::*;
use process::*;

mod fs;
mod process;

const SYSCALL_EXIT: usize = 0;
const SYSCALL_MSGOUT: usize = 1;
const SYSCALL_DEVOPEN: usize = 2;
const SYSCALL_FSOPEN: usize = 3;
const SYSCALL_CLOSE: usize = 4;
const SYSCALL_READ: usize = 5;
const SYSCALL_WRITE: usize = 6;
const SYSCALL_IOCTL: usize = 7;
const SYSCALL_EXEC: usize = 8;
const SYSCALL_FORK: usize = 9;
const SYSCALL_WAIT: usize = 10;
const SYSCALL_USLEEP: usize = 11;
const SYSCALL_PIOREF: usize = 12;

/// 系统调用分发
pub fn syscall(syscall_id: usize, args: [usize; 3], cx: &TrapFrame) -> isize {
    let result = match syscall_id {
        SYSCALL_EXIT => sys_exit(),
        SYSCALL_MSGOUT => sys_msgout(args[0]),
        SYSCALL_DEVOPEN => sys_devopen(args[0] as isize, args[1], args[2]),
        SYSCALL_FSOPEN => sys_fsopen(args[0] as isize, args[1]),
        SYSCALL_CLOSE => sys_close(args[0] as isize),
        SYSCALL_READ => sys_read(args[0] as isize, args[1], args[2]),
        SYSCALL_WRITE => sys_write(args[0] as isize, args[1], args[2]),
        SYSCALL_IOCTL => sys_ioctl(args[0] as isize, args[1], args[2]),
        SYSCALL_EXEC => sys_exec(args[0] as isize),
        SYSCALL_FORK => sys_fork(cx),
        SYSCALL_WAIT => sys_wait(args[0]),
        SYSCALL_USLEEP => sys_usleep(args[0]),
        SYSCALL_PIOREF => sys_pioref(),
        _ => Err(crate::error::KernError::Unsupported),
    };
    match result {
        Ok(v) => v,
        Err(e) => e.code(),
    }
}
