use super::tcb::{TaskControlBlock, TaskStatus};
use super::tid::Tid;
use crate::sync::UPIntrFreeCell;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;
use lazy_static::lazy_static;

/// 就绪队列（FIFO）与全体线程表
///
/// 已退出但尚未被 join 回收的线程仍留在 `tasks` 中。
pub struct TaskManager {
    ready: VecDeque<Tid>,
    tasks: BTreeMap<Tid, Arc<TaskControlBlock>>,
}

lazy_static! {
    static ref TASK_MANAGER: UPIntrFreeCell<TaskManager> = unsafe {
        UPIntrFreeCell::new(TaskManager {
            ready: VecDeque::new(),
            tasks: BTreeMap::new(),
        })
    };
}

pub fn add(task: Arc<TaskControlBlock>) {
    TASK_MANAGER.exclusive_session(|m| {
        m.tasks.insert(task.tid, task);
    });
}

pub fn remove(tid: Tid) -> Option<Arc<TaskControlBlock>> {
    TASK_MANAGER.exclusive_session(|m| m.tasks.remove(&tid))
}

pub fn get(tid: Tid) -> Option<Arc<TaskControlBlock>> {
    TASK_MANAGER.exclusive_session(|m| m.tasks.get(&tid).cloned())
}

pub fn push_ready(tid: Tid) {
    TASK_MANAGER.exclusive_session(|m| m.ready.push_back(tid));
}

pub fn fetch_ready() -> Option<Tid> {
    TASK_MANAGER.exclusive_session(|m| m.ready.pop_front())
}

/// 在 `parent` 的子线程中找一个已退出的；同时报告它是否还有子线程
pub fn scan_children(parent: Tid) -> (Option<Tid>, bool) {
    TASK_MANAGER.exclusive_session(|m| {
        let mut has_children = false;
        let mut exited = None;
        for (tid, task) in m.tasks.iter() {
            let inner = task.inner_exclusive_access();
            if inner.parent == Some(parent) {
                has_children = true;
                if exited.is_none() && inner.status == TaskStatus::Exited {
                    exited = Some(*tid);
                }
            }
        }
        (exited, has_children)
    })
}
