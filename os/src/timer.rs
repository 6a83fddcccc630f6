//! # 定时器
//!
//! SBI 定时器驱动的 10ms tick。每次时钟中断重设下一次触发点，并
//! 唤醒睡眠到期的线程。`usleep` 是内核里唯一的超时原语。

use crate::config::{CLOCK_FREQ, TICKS_PER_SEC};
use crate::sbi::set_timer;
use crate::sync::{UPIntrFreeCell, intr_off, intr_restore};
use crate::task::{self, Tid};
use alloc::vec::Vec;
use lazy_static::lazy_static;
use riscv::register::time;

/// 当前 timebase 计数
pub fn get_time() -> usize {
    time::read()
}

/// 设置下一次时钟中断
pub fn next_trigger() {
    set_timer(get_time() + CLOCK_FREQ / TICKS_PER_SEC);
}

struct Sleeper {
    wake_at: usize,
    tid: Tid,
}

lazy_static! {
    static ref SLEEPERS: UPIntrFreeCell<Vec<Sleeper>> =
        unsafe { UPIntrFreeCell::new(Vec::new()) };
}

/// 时钟中断处理：重设触发点并唤醒到期的睡眠者
pub fn tick() {
    next_trigger();
    let now = get_time();
    loop {
        let expired = SLEEPERS.exclusive_session(|sleepers| {
            let idx = sleepers.iter().position(|s| s.wake_at <= now)?;
            Some(sleepers.swap_remove(idx).tid)
        });
        match expired {
            Some(tid) => task::wakeup(tid),
            None => break,
        }
    }
}

/// 睡眠指定的微秒数
///
/// 挂入睡眠列表和阻塞处于同一关中断窗口，时钟中断不会在两者之间
/// 抢先唤醒。
pub fn usleep(us: usize) {
    let wake_at = get_time() + us * CLOCK_FREQ / 1_000_000;
    let was = intr_off();
    SLEEPERS.exclusive_session(|sleepers| {
        sleepers.push(Sleeper {
            wake_at,
            tid: task::current_tid(),
        })
    });
    task::block_current_and_run_next();
    intr_restore(was);
}
