//! # 进程管理
//!
//! 进程与内核线程 1:1。进程表定长 16 项，pid 0 是 init：启动线程在
//! 完成内核初始化后登记为 0 号进程，再 exec 进文件系统里的 "init"
//! 程序。
//!
//! fork/exec/exit 建立在虚存层和线程层之上：
//! - fork 深拷贝用户半区、逐槽克隆描述符表（引用计数随 `Arc` 克隆
//!   增加），子线程从父线程的陷阱帧快照继续，返回值为 0
//! - exec 先读入并校验镜像，再拆旧空间、建新空间、装段、`sret` 进
//!   用户态，成功不返回
//! - exit 回收用户空间（内核半区共享不动，线程落回主空间）、逐槽
//!   释放描述符（引用计数归零才触发底层关闭）、清空进程表项、终止
//!   线程

mod process;

pub use process::{Process, ProcessInner};

use crate::config::{NPROC, USER_STACK_VMA};
use crate::error::{KernError, KernResult};
use crate::io::Io;
use crate::mm::AddressSpace;
use crate::sync::UPIntrFreeCell;
use crate::trap::{TrapFrame, trap_return};
use crate::{elf, task};
use alloc::sync::Arc;
use lazy_static::lazy_static;

lazy_static! {
    static ref PROC_TABLE: UPIntrFreeCell<[Option<Arc<Process>>; NPROC]> =
        unsafe { UPIntrFreeCell::new([const { None }; NPROC]) };
    static ref PID_USED: UPIntrFreeCell<[bool; NPROC]> =
        unsafe { UPIntrFreeCell::new([false; NPROC]) };
}

/// 原子地占一个空闲 pid
///
/// fork 可能被抢占，槽位查找和占用必须一步完成，否则并发的 fork
/// 会拿到同一个 pid。
fn pid_alloc() -> Option<usize> {
    PID_USED.exclusive_session(|used| {
        let pid = used.iter().position(|u| !u)?;
        used[pid] = true;
        Some(pid)
    })
}

fn pid_free(pid: usize) {
    PID_USED.exclusive_session(|used| used[pid] = false);
}

/// 把当前运行的启动线程登记为 0 号进程
pub fn init() {
    let pid = pid_alloc().unwrap();
    assert_eq!(pid, 0, "init must be pid 0");
    let tid = task::current_tid();
    let proc = Arc::new(Process::new(0, tid));
    PROC_TABLE.exclusive_session(|t| t[0] = Some(proc));
    task::current_task().inner_exclusive_access().process = Some(0);
}

/// 当前线程所属的进程
pub fn current_process() -> Arc<Process> {
    let pid = task::current_task()
        .inner_exclusive_access()
        .process
        .expect("thread has no process");
    PROC_TABLE
        .exclusive_session(|t| t[pid].clone())
        .expect("process table entry vanished")
}

/// fork 当前进程
///
/// 找空槽、克隆激活空间、复制描述符表，然后由线程层按父线程的
/// 陷阱帧孵化子线程。父进程得到子线程的 tid。
pub fn fork(parent_cx: &TrapFrame) -> KernResult<usize> {
    let parent = current_process();
    let pid = pid_alloc().ok_or(KernError::Busy)?;

    let space = AddressSpace::clone_active(pid as u16);
    let mtag = space.mtag();
    let child_tid = task::spawn_forked(parent_cx, mtag, pid, task::current_tid());

    let child = Arc::new(Process::new(pid, child_tid));
    {
        let parent_inner = parent.inner_exclusive_access();
        let mut child_inner = child.inner_exclusive_access();
        child_inner.space = Some(space);
        for (i, slot) in parent_inner.iotab.iter().enumerate() {
            child_inner.iotab[i] = slot.clone();
        }
    }
    PROC_TABLE.exclusive_session(|t| t[pid] = Some(child));
    task::make_ready(child_tid);
    Ok(child_tid)
}

/// 用 `io` 指向的程序替换当前进程映像，成功时不返回
pub fn exec(io: Arc<dyn Io>) -> KernResult<()> {
    // 镜像先读进内核内存并通过校验，之后才允许破坏旧映像
    let image = elf::read_image(&io)?;
    drop(io);

    let proc = current_process();
    let new_space = {
        let mut inner = proc.inner_exclusive_access();
        if let Some(old) = inner.space.take() {
            old.reclaim();
        }
        let space = AddressSpace::new_user(proc.pid as u16);
        space.activate();
        let mtag = space.mtag();
        inner.space = Some(space);
        mtag
    };
    task::set_current_mtag(new_space);

    let entry = elf::load_into_active(&image);
    drop(image);

    let cx = task::current_trap_cx();
    *cx = TrapFrame::app_init_context(entry, USER_STACK_VMA);
    trap_return(cx)
}

/// 终止当前进程，回收全部资源
pub fn exit_current() -> ! {
    let proc = current_process();
    {
        let mut inner = proc.inner_exclusive_access();
        if let Some(space) = inner.space.take() {
            space.reclaim();
        }
        for slot in inner.iotab.iter_mut() {
            *slot = None;
        }
    }
    task::set_current_mtag(crate::mm::main_mtag());
    PROC_TABLE.exclusive_session(|t| t[proc.pid] = None);
    pid_free(proc.pid);
    drop(proc);
    task::exit_current_and_run_next()
}
