//! # 设备注册表
//!
//! 驱动初始化时以（名字，实例号）登记设备，`devopen` 系统调用据此
//! 打开并获得 I/O 能力句柄。

use crate::error::{KernError, KernResult};
use crate::io::Io;
use crate::sync::UPIntrFreeCell;
use alloc::sync::Arc;
use alloc::vec::Vec;
use lazy_static::lazy_static;

/// 可被按名打开的设备
pub trait Device: Send + Sync {
    fn open_io(self: Arc<Self>) -> KernResult<Arc<dyn Io>>;
}

struct Entry {
    name: &'static str,
    instno: usize,
    dev: Arc<dyn Device>,
}

lazy_static! {
    static ref DEVICES: UPIntrFreeCell<Vec<Entry>> = unsafe { UPIntrFreeCell::new(Vec::new()) };
}

pub fn register(name: &'static str, instno: usize, dev: Arc<dyn Device>) {
    DEVICES.exclusive_session(|devs| devs.push(Entry { name, instno, dev }));
}

/// 按名字和实例号打开设备
pub fn open(name: &str, instno: usize) -> KernResult<Arc<dyn Io>> {
    let dev = DEVICES.exclusive_session(|devs| {
        devs.iter()
            .find(|e| e.name == name && e.instno == instno)
            .map(|e| Arc::clone(&e.dev))
    });
    match dev {
        Some(dev) => dev.open_io(),
        None => Err(KernError::NotFound),
    }
}
