//! # 睡眠锁
//!
//! 保护可能长时间持有的资源（块设备请求环、文件系统元数据）。
//! 竞争失败的线程在条件变量上睡眠而不是自旋，由释放者广播唤醒。
//! 不允许重入。

use super::condvar::Condition;
use super::intr::{intr_off, intr_restore};
use super::up::UPIntrFreeCell;
use crate::task::{self, Tid};
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

/// 携带数据的睡眠锁
///
/// `{条件变量, 持有者 tid}`；测试与占有必须处于同一个关中断窗口内，
/// 否则两个线程可能同时观察到锁空闲。
pub struct SleepLock<T> {
    cond: Condition,
    holder: UPIntrFreeCell<Option<Tid>>,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for SleepLock<T> {}
unsafe impl<T: Send> Send for SleepLock<T> {}

pub struct SleepLockGuard<'a, T> {
    lock: &'a SleepLock<T>,
}

impl<T> SleepLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            cond: Condition::new(),
            holder: unsafe { UPIntrFreeCell::new(None) },
            data: UnsafeCell::new(data),
        }
    }

    /// 获取锁，必要时睡眠等待
    ///
    /// 测试失败后在同一个关中断窗口内进入等待，持有者的释放广播
    /// 不会落在测试与入队之间。
    pub fn lock(&self) -> SleepLockGuard<'_, T> {
        loop {
            let was = intr_off();
            let claimed = self.holder.exclusive_session(|h| {
                if h.is_none() {
                    *h = Some(task::current_tid());
                    true
                } else {
                    false
                }
            });
            if claimed {
                intr_restore(was);
                return SleepLockGuard { lock: self };
            }
            self.cond.wait();
            intr_restore(was);
        }
    }
}

impl<T> Deref for SleepLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SleepLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SleepLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.holder.exclusive_session(|h| {
            assert_eq!(
                *h,
                Some(task::current_tid()),
                "sleep lock released by non-holder"
            );
            *h = None;
        });
        self.lock.cond.broadcast();
    }
}
