//! # 条件变量
//!
//! 内核线程间的等待/唤醒原语。等待者按 FIFO 顺序排队，
//! [`Condition::broadcast`] 按入队顺序将所有等待者移回就绪队列，
//! 保证公平性。
//!
//! 与阻塞相关的窗口必须关中断：等待者从挂入队列到完成上下文切换
//! 之间若被中断处理程序抢先 `broadcast`，唤醒会丢失。

use super::intr::{intr_off, intr_restore};
use super::up::UPIntrFreeCell;
use crate::task::{self, Tid};
use alloc::collections::VecDeque;

/// 条件变量：有序的等待线程队列
pub struct Condition {
    waiters: UPIntrFreeCell<VecDeque<Tid>>,
}

impl Condition {
    pub fn new() -> Self {
        Self {
            waiters: unsafe { UPIntrFreeCell::new(VecDeque::new()) },
        }
    }

    /// 阻塞当前线程，直到某次 [`broadcast`](Condition::broadcast) 将其唤醒
    ///
    /// 条件变量本身不携带谓词，典型用法是在循环中重查条件。
    /// 入队和切换处于同一个关中断窗口内。
    pub fn wait(&self) {
        let was = intr_off();
        self.waiters
            .exclusive_session(|q| q.push_back(task::current_tid()));
        task::block_current_and_run_next();
        intr_restore(was);
    }

    /// 将所有等待者按入队顺序移回就绪队列
    ///
    /// 可以在中断处理路径中调用。
    pub fn broadcast(&self) {
        loop {
            let tid = self.waiters.exclusive_session(|q| q.pop_front());
            match tid {
                Some(tid) => task::wakeup(tid),
                None => break,
            }
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::new()
    }
}
