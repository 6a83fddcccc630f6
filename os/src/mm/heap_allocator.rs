//! # 内核堆分配器
//!
//! 基于伙伴系统的小对象分配器，堆区是 `.bss` 中的一块有界静态数组，
//! 位于空闲页池之下。页表、页帧等以整页为单位的内存不从这里分配。

use crate::config::KERNEL_HEAP_SIZE;
use buddy_system_allocator::LockedHeap;

#[global_allocator]
static HEAP_ALLOCATOR: LockedHeap<32> = LockedHeap::empty();

static mut HEAP_SPACE: [u8; KERNEL_HEAP_SIZE] = [0; KERNEL_HEAP_SIZE];

/// 初始化内核堆
pub fn init_heap() {
    unsafe {
        HEAP_ALLOCATOR
            .lock()
            .init(&raw mut HEAP_SPACE as usize, KERNEL_HEAP_SIZE);
    }
}
