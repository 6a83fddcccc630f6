//! # PLIC (platform-level interrupt controller)
//!
//! 单 hart 使用：hart 0 的 S 态对应上下文 1。只提供本内核需要的
//! 最小操作集：源优先级、使能、阈值与 claim/complete。

use crate::board::PLIC_BASE;

/// hart 0 S 态上下文
const CTX_S0: usize = 1;

const PRIORITY_OFFSET: usize = 0x0000;
const ENABLE_OFFSET: usize = 0x2000;
const ENABLE_STRIDE: usize = 0x80;
const THRESHOLD_OFFSET: usize = 0x20_0000;
const CLAIM_OFFSET: usize = 0x20_0004;
const CTX_STRIDE: usize = 0x1000;

#[inline]
unsafe fn write_u32(addr: usize, val: u32) {
    unsafe { (addr as *mut u32).write_volatile(val) };
}

#[inline]
unsafe fn read_u32(addr: usize) -> u32 {
    unsafe { (addr as *const u32).read_volatile() }
}

/// 初始化：S 态上下文阈值清零，所有源默认关闭
pub fn init() {
    unsafe { write_u32(PLIC_BASE + THRESHOLD_OFFSET + CTX_S0 * CTX_STRIDE, 0) };
}

/// 使能一个中断源并给它非零优先级
pub fn enable_irq(src: usize) {
    unsafe {
        write_u32(PLIC_BASE + PRIORITY_OFFSET + 4 * src, 1);
        let addr = PLIC_BASE + ENABLE_OFFSET + ENABLE_STRIDE * CTX_S0 + (src / 32) * 4;
        write_u32(addr, read_u32(addr) | 1 << (src % 32));
    }
}

/// 认领当前最高优先级的挂起中断，无挂起返回 0
pub fn claim() -> u32 {
    unsafe { read_u32(PLIC_BASE + CLAIM_OFFSET + CTX_S0 * CTX_STRIDE) }
}

/// 宣告一次中断处理完成
pub fn complete(src: u32) {
    unsafe { write_u32(PLIC_BASE + CLAIM_OFFSET + CTX_S0 * CTX_STRIDE, src) };
}
