//! # 单处理器安全单元
//!
//! 提供在单处理器环境下的线程安全共享可变数据结构。
//!
//! 内核开启了时钟抢占，且部分共享状态会在中断处理路径中被访问，
//! 因此独占访问期间必须屏蔽 S 态中断：[`UPIntrFreeCell`] 在借用期间
//! 关闭 `sstatus.SIE`，守卫释放时恢复原状态。

use super::intr::{intr_off, intr_restore};
use core::cell::{RefCell, RefMut};
use core::ops::{Deref, DerefMut};

/// 单处理器关中断安全单元
///
/// `RefCell<T>` 的封装：独占借用自动伴随一个关中断窗口，保证数据
/// 不会在借用中途被中断处理程序或被抢占后的其他线程再次借用。
///
/// ## Safety
///
/// 该结构体实现了 `Sync`，调用者需保证只在单处理器环境下使用。
pub struct UPIntrFreeCell<T> {
    inner: RefCell<T>,
}

unsafe impl<T> Sync for UPIntrFreeCell<T> {}

/// 独占访问守卫，持有期间 S 态中断保持关闭
pub struct UPIntrRefMut<'a, T> {
    value: Option<RefMut<'a, T>>,
    intr_was_on: bool,
}

impl<T> UPIntrFreeCell<T> {
    /// ## Safety
    ///
    /// 调用者必须确保在单处理器环境下使用。
    pub unsafe fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    /// 获取对内部数据的独占可变引用，借用期间关中断
    ///
    /// ## Panics
    ///
    /// 如果内部数据已经被借用，此方法会 panic。
    pub fn exclusive_access(&self) -> UPIntrRefMut<'_, T> {
        let intr_was_on = intr_off();
        UPIntrRefMut {
            value: Some(self.inner.borrow_mut()),
            intr_was_on,
        }
    }

    /// 在一个短临界区内访问内部数据
    pub fn exclusive_session<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.exclusive_access();
        f(guard.deref_mut())
    }
}

impl<T> Deref for UPIntrRefMut<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.value.as_ref().unwrap()
    }
}

impl<T> DerefMut for UPIntrRefMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().unwrap()
    }
}

impl<T> Drop for UPIntrRefMut<'_, T> {
    fn drop(&mut self) {
        // 先归还借用再恢复中断
        self.value.take();
        intr_restore(self.intr_was_on);
    }
}
