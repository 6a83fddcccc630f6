use crate::config::PROC_IOMAX;
use crate::io::Io;
use crate::mm::AddressSpace;
use crate::sync::UPIntrFreeCell;
use alloc::sync::Arc;
use core::ops::DerefMut;

/// 进程控制块
///
/// `space` 为 `None` 表示进程仍运行在主（纯内核）空间上——只有
/// 0 号进程在首次 exec 之前处于这个状态。
pub struct Process {
    pub pid: usize,
    pub tid: usize,
    inner: UPIntrFreeCell<ProcessInner>,
}

pub struct ProcessInner {
    pub space: Option<AddressSpace>,
    /// 描述符表：小整数描述符到 I/O 能力句柄
    pub iotab: [Option<Arc<dyn Io>>; PROC_IOMAX],
}

impl Process {
    pub fn new(pid: usize, tid: usize) -> Self {
        Self {
            pid,
            tid,
            inner: unsafe {
                UPIntrFreeCell::new(ProcessInner {
                    space: None,
                    iotab: [const { None }; PROC_IOMAX],
                })
            },
        }
    }

    pub fn inner_exclusive_access(&self) -> impl DerefMut<Target = ProcessInner> + '_ {
        self.inner.exclusive_access()
    }
}
