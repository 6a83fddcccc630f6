//! # 物理页帧分配器
//!
//! 管理内核镜像之后到物理内存末尾的全部 4KB 页帧。空闲页帧用各自
//! 开头 8 字节串成一条单向链表，后进先出：最近释放的页帧最先被再次
//! 分配。分配出的页帧总是清零后交付，防止上一个使用者的数据泄漏到
//! 新的用户映射中。
//!
//! 分配和释放既发生在内核线程中，也发生在缺页异常处理路径中，
//! 因此链表操作处于 [`UPIntrFreeCell`] 的关中断临界区内。
//!
//! 物理内存耗尽是结构性错误：[`frame_alloc`] 直接 panic，没有等待
//! 或回收机制。

use super::address::PhysPageNum;
use crate::config::PAGE_SIZE;
use crate::println;
use crate::sync::UPIntrFreeCell;
use lazy_static::lazy_static;

/// 空闲链表式页帧分配器
///
/// `head` 保存链表头页帧的物理地址（0 表示空）；每个空闲页帧的前
/// 8 字节存放下一个空闲页帧的物理地址。释放未曾分配过的页帧属于
/// 未定义行为，这里不做防护。
pub struct FreeListFrameAllocator {
    head: usize,
    free: usize,
}

impl FreeListFrameAllocator {
    const fn new() -> Self {
        Self { head: 0, free: 0 }
    }

    /// 把 `[l, r)` 范围内的页帧全部挂上空闲链表
    fn init(&mut self, l: PhysPageNum, r: PhysPageNum) {
        for ppn in (l.0..r.0).rev() {
            self.push(ppn << 12);
        }
    }

    fn push(&mut self, pa: usize) {
        unsafe { (pa as *mut usize).write(self.head) };
        self.head = pa;
        self.free += 1;
    }

    fn pop(&mut self) -> Option<usize> {
        if self.head == 0 {
            return None;
        }
        let pa = self.head;
        self.head = unsafe { (pa as *const usize).read() };
        self.free -= 1;
        Some(pa)
    }
}

lazy_static! {
    static ref FRAME_ALLOCATOR: UPIntrFreeCell<FreeListFrameAllocator> =
        unsafe { UPIntrFreeCell::new(FreeListFrameAllocator::new()) };
}

/// 初始化页帧分配器，范围 `[l, r)`
pub fn init_frame_allocator(l: PhysPageNum, r: PhysPageNum) {
    FRAME_ALLOCATOR.exclusive_session(|fa| fa.init(l, r));
    println!(
        "frame allocator: [{:#x}, {:#x}): {} pages free",
        l.0 << 12,
        r.0 << 12,
        r.0 - l.0
    );
}

/// 分配一个清零的物理页帧
///
/// ## Panics
///
/// 物理内存耗尽时 panic。
pub fn frame_alloc() -> PhysPageNum {
    let pa = FRAME_ALLOCATOR
        .exclusive_session(|fa| fa.pop())
        .expect("out of physical frames");
    unsafe { core::ptr::write_bytes(pa as *mut u8, 0, PAGE_SIZE) };
    PhysPageNum(pa >> 12)
}

/// 归还一个页帧到空闲链表头部
pub fn frame_dealloc(ppn: PhysPageNum) {
    FRAME_ALLOCATOR.exclusive_session(|fa| fa.push(ppn.0 << 12));
}

/// 当前空闲页帧数，用于泄漏检查
#[allow(unused)]
pub fn free_frame_count() -> usize {
    FRAME_ALLOCATOR.exclusive_session(|fa| fa.free)
}
