//! # 线程内核
//!
//! 抢占式调度的内核线程层。每个线程有独立的内核栈和被调用者寄存器
//! 上下文，切换由 `__switch` 完成；就绪队列 FIFO。没有就绪线程时
//! 运行使用静态栈的空闲线程。
//!
//! 挂起点只有四处：时钟中断、条件变量等待、调度器内部的主动让出、
//! 以及 `sret` 回用户态。页帧分配器、页表遍历和调度器核心自身绝不
//! 挂起。
//!
//! 所有发生切换的路径都要求全程关中断；新线程通过启动垫片或
//! `sret` 重新打开中断。

mod context;
mod manager;
mod processor;
mod switch;
mod tcb;
mod tid;

use crate::error::{KernError, KernResult};
use crate::mm;
use crate::sync::{intr_off, intr_restore};
use crate::trap::TrapFrame;
use alloc::sync::Arc;
use core::mem::size_of;
use switch::__switch;

pub use context::TaskContext;
pub use processor::{PROCESSOR, current_is_idle, current_task, current_tid, current_trap_cx};
pub use tcb::{TaskControlBlock, TaskStatus};
pub use tid::{KernelStack, Tid, tid_alloc};

/// 初始化线程层
///
/// 把正在运行的启动线程登记为 0 号线程（它随后成为 init 进程的
/// 线程），并创建空闲线程。空闲线程不进就绪队列，调度器在队列为
/// 空时选中它。
pub fn init() {
    unsafe extern "C" {
        safe fn boot_stack_top();
    }
    let boot_tid = tid_alloc();
    let boot = Arc::new(TaskControlBlock::new(
        boot_tid,
        KernelStack::from_raw_top(boot_stack_top as usize),
        TaskContext::zero_init(),
        TaskStatus::Running,
        mm::main_mtag(),
        None,
    ));
    manager::add(boot.clone());

    let idle_tid = tid_alloc();
    let idle_top = idle_stack_top();
    let idle = Arc::new(TaskControlBlock::new(
        idle_tid,
        KernelStack::from_raw_top(idle_top),
        TaskContext::new_kernel(idle_main as usize, 0, idle_top),
        TaskStatus::Ready,
        mm::main_mtag(),
        None,
    ));
    manager::add(idle.clone());

    PROCESSOR.exclusive_session(|p| {
        p.current = Some(boot);
        p.idle = Some(idle);
    });
}

/// 空闲线程的静态栈
fn idle_stack_top() -> usize {
    #[repr(C, align(16))]
    struct IdleStack([u8; crate::config::KERNEL_STACK_SIZE]);
    static mut IDLE_STACK: IdleStack = IdleStack([0; crate::config::KERNEL_STACK_SIZE]);
    unsafe { (&raw mut IDLE_STACK) as usize + crate::config::KERNEL_STACK_SIZE }
}

extern "C" fn idle_main(_arg: usize) {
    loop {
        crate::sync::intr_on();
        unsafe { core::arch::asm!("wfi") };
    }
}

/// 内核线程入口正常返回后的终点，由启动垫片设置为返回地址
#[unsafe(no_mangle)]
extern "C" fn kthread_exit() -> ! {
    exit_current_and_run_next()
}

/// 创建 fork 出的子线程
///
/// 把父线程的陷阱帧快照进子线程内核栈顶的固定位置，子线程返回值
/// 清零；首次调度时经 `fork_return` 直接 `sret` 回用户态。
pub fn spawn_forked(parent_cx: &TrapFrame, mtag: usize, pid: usize, parent: Tid) -> Tid {
    let tid = tid_alloc();
    let kstack = KernelStack::new();
    let frame_bottom = kstack.top() - size_of::<TrapFrame>();
    let tcb = Arc::new(TaskControlBlock::new(
        tid,
        kstack,
        TaskContext::goto_fork_return(frame_bottom),
        TaskStatus::Ready,
        mtag,
        Some(parent),
    ));
    let child_cx = tcb.trap_cx();
    *child_cx = parent_cx.clone();
    child_cx.x[10] = 0;
    tcb.inner_exclusive_access().process = Some(pid);
    manager::add(tcb);
    tid
}

/// 把新线程挂上就绪队列
///
/// 与 [`spawn_forked`] 分离：进程层先把进程表项建好，再允许子线程
/// 被调度。
pub fn make_ready(tid: Tid) {
    manager::push_ready(tid);
}

/// 把当前线程移到就绪队列尾并让出处理器
pub fn suspend_current_and_run_next() {
    let was = intr_off();
    let cur = current_task();
    let cx_ptr = {
        let mut inner = cur.inner_exclusive_access();
        inner.status = TaskStatus::Ready;
        &mut inner.task_cx as *mut TaskContext
    };
    if !current_is_idle() {
        manager::push_ready(cur.tid);
    }
    drop(cur);
    schedule(cx_ptr);
    intr_restore(was);
}

/// 阻塞当前线程并让出处理器
///
/// 调用者负责先把自己挂到某个唤醒来源（条件变量、定时器）上，
/// 并保证从挂入到这里的切换全程关中断。
pub fn block_current_and_run_next() {
    let cur = current_task();
    let cx_ptr = {
        let mut inner = cur.inner_exclusive_access();
        inner.status = TaskStatus::Blocked;
        &mut inner.task_cx as *mut TaskContext
    };
    drop(cur);
    schedule(cx_ptr);
}

/// 唤醒一个阻塞中的线程
///
/// 可以在中断处理路径中调用。对非阻塞状态的线程是空操作。
pub fn wakeup(tid: Tid) {
    if let Some(task) = manager::get(tid) {
        let mut inner = task.inner_exclusive_access();
        if inner.status == TaskStatus::Blocked {
            inner.status = TaskStatus::Ready;
            drop(inner);
            manager::push_ready(tid);
        }
    }
}

/// 终止当前线程
///
/// 控制块保留在线程表中直到被 join 回收；先唤醒 join 者，再唤醒
/// 等待任意子线程退出的父线程。
pub fn exit_current_and_run_next() -> ! {
    intr_off();
    let cur = current_task();
    let parent = {
        let mut inner = cur.inner_exclusive_access();
        inner.status = TaskStatus::Exited;
        inner.parent
    };
    cur.exit_cond.broadcast();
    if let Some(ptid) = parent {
        if let Some(parent_task) = manager::get(ptid) {
            parent_task.child_cond.broadcast();
        }
    }
    drop(cur);
    let mut unused = TaskContext::zero_init();
    schedule(&mut unused as *mut TaskContext);
    unreachable!("exited thread rescheduled")
}

/// 等待指定子线程退出并回收它，返回其 tid
pub fn join(tid: Tid) -> KernResult<Tid> {
    let me = current_tid();
    loop {
        let target = manager::get(tid).ok_or(KernError::InvalidArgument)?;
        let was = intr_off();
        let (is_child, exited) = {
            let inner = target.inner_exclusive_access();
            (inner.parent == Some(me), inner.status == TaskStatus::Exited)
        };
        if !is_child {
            intr_restore(was);
            return Err(KernError::InvalidArgument);
        }
        if exited {
            intr_restore(was);
            manager::remove(tid);
            return Ok(tid);
        }
        // 检查与入队处于同一关中断窗口，退出广播不会丢失
        target.exit_cond.wait();
        intr_restore(was);
    }
}

/// 等待任意一个子线程退出并回收它，返回其 tid
pub fn join_any() -> KernResult<Tid> {
    let me = current_tid();
    loop {
        let was = intr_off();
        let (exited, has_children) = manager::scan_children(me);
        if let Some(tid) = exited {
            intr_restore(was);
            manager::remove(tid);
            return Ok(tid);
        }
        if !has_children {
            intr_restore(was);
            return Err(KernError::InvalidArgument);
        }
        current_task().child_cond.wait();
        intr_restore(was);
    }
}

/// 当前线程所属进程迁移地址空间后（exec）同步调度信息
pub fn set_current_mtag(mtag: usize) {
    current_task().inner_exclusive_access().mtag = mtag;
}

/// 选出下一个线程并切换过去
///
/// 必须在关中断状态下调用。就绪队列为空时选空闲线程；选中自己时
/// 直接返回。按需切换地址空间后执行 `__switch`。
fn schedule(switch_out: *mut TaskContext) {
    let next = match manager::fetch_ready() {
        Some(tid) => manager::get(tid).expect("ready thread vanished"),
        None => PROCESSOR.exclusive_session(|p| p.idle.clone()).unwrap(),
    };
    let cur_tid = PROCESSOR.exclusive_session(|p| p.current.as_ref().map(|t| t.tid));
    if Some(next.tid) == cur_tid {
        next.inner_exclusive_access().status = TaskStatus::Running;
        return;
    }
    let next_cx = {
        let mut inner = next.inner_exclusive_access();
        inner.status = TaskStatus::Running;
        if inner.mtag != mm::active_mtag() {
            mm::switch_space(inner.mtag);
        }
        &inner.task_cx as *const TaskContext
    };
    PROCESSOR.exclusive_session(|p| p.current = Some(next));
    unsafe { __switch(switch_out, next_cx) };
}
