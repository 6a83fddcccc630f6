//! # 设备驱动
//!
//! PLIC、virtio-mmio 块设备与设备注册表。初始化时扫描全部
//! virtio-mmio 槽位，每找到一个块设备就登记为 `("blk", i)` 并使能
//! 它的中断线。

pub mod block;
pub mod device;
pub mod plic;

use crate::config::{VIRTIO_MMIO_BASE, VIRTIO_MMIO_SLOTS, VIRTIO_MMIO_STRIDE};
use crate::error::KernResult;
use crate::io::Io;
use crate::sync::UPIntrFreeCell;
use alloc::sync::Arc;
use alloc::vec::Vec;
use block::VirtIoBlock;
use lazy_static::lazy_static;
use log::info;

lazy_static! {
    static ref BLOCK_DEVS: UPIntrFreeCell<Vec<Arc<VirtIoBlock>>> =
        unsafe { UPIntrFreeCell::new(Vec::new()) };
}

impl device::Device for VirtIoBlock {
    fn open_io(self: Arc<Self>) -> KernResult<Arc<dyn Io>> {
        let handle: Arc<dyn Io> = self.open()?;
        Ok(handle)
    }
}

/// 探测并初始化全部设备
pub fn init() {
    plic::init();
    let mut instno = 0;
    for slot in 0..VIRTIO_MMIO_SLOTS {
        let base = VIRTIO_MMIO_BASE + slot * VIRTIO_MMIO_STRIDE;
        let irq = slot + 1;
        if let Some(dev) = VirtIoBlock::attach(base, irq) {
            info!(
                "virtio-blk{} @ {:#x}, irq {}, block size {}",
                instno,
                base,
                irq,
                dev.block_size()
            );
            plic::enable_irq(irq);
            device::register("blk", instno, dev.clone());
            BLOCK_DEVS.exclusive_session(|devs| devs.push(dev));
            instno += 1;
        }
    }
}

/// 外部中断分发：认领、找到对应设备的 ISR、宣告完成
pub fn irq_dispatch() {
    let irq = plic::claim();
    if irq == 0 {
        return;
    }
    let dev = BLOCK_DEVS.exclusive_session(|devs| {
        devs.iter().find(|d| d.irq == irq as usize).cloned()
    });
    match dev {
        Some(dev) => dev.handle_irq(),
        None => crate::println!("[kernel] spurious external irq {}", irq),
    }
    plic::complete(irq);
}

/// 打开编号实例的块设备（文件系统挂载用）
pub fn open_block(instno: usize) -> KernResult<Arc<dyn Io>> {
    device::open("blk", instno)
}
