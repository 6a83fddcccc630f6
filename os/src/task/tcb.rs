use super::context::TaskContext;
use super::tid::{KernelStack, Tid};
use crate::sync::{Condition, UPIntrFreeCell};
use crate::trap::TrapFrame;
use core::mem::size_of;
use core::ops::DerefMut;

/// 线程状态
///
/// 每个时刻恰有一个线程处于 `Running`。
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TaskStatus {
    Ready,
    Running,
    Blocked,
    Exited,
}

/// 线程控制块
pub struct TaskControlBlock {
    pub tid: Tid,
    pub kstack: KernelStack,
    /// 等待本线程退出的 join 者
    pub exit_cond: Condition,
    /// 任一子线程退出时被广播，join_any 在此等待
    pub child_cond: Condition,
    inner: UPIntrFreeCell<TaskInner>,
}

pub struct TaskInner {
    pub status: TaskStatus,
    pub task_cx: TaskContext,
    /// 线程运行所在地址空间的 satp 值，调度时切换
    pub mtag: usize,
    /// 所属进程的 pid，纯内核线程为 None
    pub process: Option<usize>,
    pub parent: Option<Tid>,
}

impl TaskControlBlock {
    pub fn new(
        tid: Tid,
        kstack: KernelStack,
        task_cx: TaskContext,
        status: TaskStatus,
        mtag: usize,
        parent: Option<Tid>,
    ) -> Self {
        Self {
            tid,
            kstack,
            exit_cond: Condition::new(),
            child_cond: Condition::new(),
            inner: unsafe {
                UPIntrFreeCell::new(TaskInner {
                    status,
                    task_cx,
                    mtag,
                    process: None,
                    parent,
                })
            },
        }
    }

    pub fn inner_exclusive_access(&self) -> impl DerefMut<Target = TaskInner> + '_ {
        self.inner.exclusive_access()
    }

    /// 本线程陷阱帧的固定位置：内核栈顶之下
    pub fn trap_cx_bottom(&self) -> usize {
        self.kstack.top() - size_of::<TrapFrame>()
    }

    pub fn trap_cx(&self) -> &'static mut TrapFrame {
        unsafe { &mut *(self.trap_cx_bottom() as *mut TrapFrame) }
    }
}
