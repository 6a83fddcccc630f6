//! 线程号分配与内核栈

use crate::config::KERNEL_STACK_SIZE;
use crate::sync::UPIntrFreeCell;
use alloc::alloc::{alloc_zeroed, dealloc};
use alloc::vec::Vec;
use core::alloc::Layout;
use lazy_static::lazy_static;

pub type Tid = usize;

struct TidAllocator {
    current: Tid,
    recycled: Vec<Tid>,
}

lazy_static! {
    static ref TID_ALLOCATOR: UPIntrFreeCell<TidAllocator> = unsafe {
        UPIntrFreeCell::new(TidAllocator {
            current: 0,
            recycled: Vec::new(),
        })
    };
}

pub fn tid_alloc() -> Tid {
    TID_ALLOCATOR.exclusive_session(|a| {
        if let Some(tid) = a.recycled.pop() {
            tid
        } else {
            a.current += 1;
            a.current - 1
        }
    })
}

pub fn tid_dealloc(tid: Tid) {
    TID_ALLOCATOR.exclusive_session(|a| a.recycled.push(tid));
}

/// 一个线程的内核栈
///
/// 普通线程的栈从内核堆分配；启动线程和空闲线程使用链接期就存在的
/// 静态栈，此时只记录栈顶不负责释放。
pub struct KernelStack {
    base: usize,
    owned: bool,
}

impl KernelStack {
    fn layout() -> Layout {
        Layout::from_size_align(KERNEL_STACK_SIZE, 16).unwrap()
    }

    pub fn new() -> Self {
        let base = unsafe { alloc_zeroed(Self::layout()) } as usize;
        assert!(base != 0, "kernel stack allocation failed");
        Self { base, owned: true }
    }

    /// 包装一个已存在的栈，`top` 为栈顶地址
    pub fn from_raw_top(top: usize) -> Self {
        Self {
            base: top - KERNEL_STACK_SIZE,
            owned: false,
        }
    }

    pub fn top(&self) -> usize {
        self.base + KERNEL_STACK_SIZE
    }
}

impl Drop for KernelStack {
    fn drop(&mut self) {
        if self.owned {
            unsafe { dealloc(self.base as *mut u8, Self::layout()) };
        }
    }
}
