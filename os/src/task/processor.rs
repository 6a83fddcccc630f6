use super::tcb::TaskControlBlock;
use super::tid::Tid;
use crate::sync::UPIntrFreeCell;
use crate::trap::TrapFrame;
use alloc::sync::Arc;
use lazy_static::lazy_static;

/// 单个 hart 的执行现场：当前线程与空闲线程
pub struct Processor {
    pub current: Option<Arc<TaskControlBlock>>,
    pub idle: Option<Arc<TaskControlBlock>>,
}

lazy_static! {
    pub static ref PROCESSOR: UPIntrFreeCell<Processor> = unsafe {
        UPIntrFreeCell::new(Processor {
            current: None,
            idle: None,
        })
    };
}

pub fn current_task() -> Arc<TaskControlBlock> {
    PROCESSOR.exclusive_session(|p| p.current.clone()).unwrap()
}

pub fn current_tid() -> Tid {
    current_task().tid
}

pub fn current_is_idle() -> bool {
    PROCESSOR.exclusive_session(|p| {
        match (&p.current, &p.idle) {
            (Some(c), Some(i)) => c.tid == i.tid,
            _ => false,
        }
    })
}

/// 当前线程的陷阱帧（内核栈顶之下的固定位置）
pub fn current_trap_cx() -> &'static mut TrapFrame {
    current_task().trap_cx()
}
