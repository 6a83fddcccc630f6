#![allow(unused)]
//! # SBI (Supervisor Binary Interface) 封装
//!
//! 基于 `sbi-rt` 提供与 RISC-V SBI 固件的交互接口。该模块对常用功能
//! 进行轻量封装，屏蔽底层调用细节，便于在内核中直接使用。

/// 控制台输出单个字符
///
/// 通过 SBI legacy 控制台接口输出一个字符。此调用为同步输出，
/// 直至固件接受该字符。
pub fn console_putchar(c: usize) {
    #[allow(deprecated)]
    sbi_rt::legacy::console_putchar(c);
}

/// 控制台读取单个字符（非阻塞）
///
/// 无字符可读时的返回值依赖固件实现，QEMU 环境下为 `0`。
pub fn console_getchar() -> usize {
    #[allow(deprecated)]
    sbi_rt::legacy::console_getchar()
}

/// 设置时钟中断触发时间（绝对 timebase 计数）
pub fn set_timer(timer: usize) {
    sbi_rt::set_timer(timer as _);
}

/// 关闭（或复位）系统
///
/// ## Arguments
/// * `failure` - 是否因为系统故障而关闭
///   - `false`：`NoReason`
///   - `true`：`SystemFailure`
pub fn shutdown(failure: bool) -> ! {
    use sbi_rt::{NoReason, Shutdown, SystemFailure, system_reset};
    if !failure {
        system_reset(Shutdown, NoReason);
    } else {
        system_reset(Shutdown, SystemFailure);
    }
    unreachable!()
}
