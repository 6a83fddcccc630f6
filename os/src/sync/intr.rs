//! # S 态中断开关
//!
//! 对 `sstatus.SIE` 的薄封装。空闲页链表、就绪队列等会同时被线程和
//! 中断处理路径操作的状态，都要求在关中断临界区内访问；阻塞原语
//! 则要求从入队到上下文切换的整个窗口保持关中断，否则会丢失唤醒。

use riscv::register::sstatus;

/// 关闭 S 态中断，返回之前的使能状态
#[inline]
pub fn intr_off() -> bool {
    let was = sstatus::read().sie();
    unsafe { sstatus::clear_sie() };
    was
}

/// 恢复到 `intr_off` 之前的使能状态
#[inline]
pub fn intr_restore(was: bool) {
    if was {
        unsafe { sstatus::set_sie() };
    }
}

/// 打开 S 态中断
#[inline]
pub fn intr_on() {
    unsafe { sstatus::set_sie() };
}
