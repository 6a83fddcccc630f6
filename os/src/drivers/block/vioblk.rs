//! # virtio-blk 驱动
//!
//! 每个探测到的 virtio-mmio 块设备一个实例。请求队列长度为 1，唯一
//! 的直接描述符指向一张三项间接表 `[请求头 | 数据 | 状态字节]`，
//! 任一时刻至多一个在途请求，由设备级睡眠锁串行化。
//!
//! 提交一个请求后，发起线程在 `used_updated` 条件上睡眠；设备完成
//! 时的外部中断由 ISR 认领并广播该条件。从通知设备到挂入等待队列
//! 必须关中断，否则完成中断可能抢在等待之前把唤醒丢掉。

use super::virtio::*;
use crate::error::{KernError, KernResult};
use crate::io::{Io, ioctl};
use crate::sync::{Condition, SleepLock, UPIntrFreeCell};
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use core::sync::atomic::{Ordering, fence};

/// 请求类型：读
const VIRTIO_BLK_T_IN: u32 = 0;
/// 请求类型：写
const VIRTIO_BLK_T_OUT: u32 = 1;
/// 状态字节：成功
const VIRTIO_BLK_S_OK: u8 = 0;

/// virtio-blk 请求头，设备只读
#[repr(C)]
struct BlkReqHeader {
    type_: u32,
    reserved: u32,
    sector: u64,
}

/// 一次请求用到的全部环形内存，整体放在堆上保持地址稳定
///
/// `desc[0]` 是挂进可用环的间接描述符；间接表里依次是请求头、
/// 数据缓冲和状态字节。
#[repr(C)]
struct VirtQ {
    desc: [VirtqDesc; 1],
    indirect: [VirtqDesc; 3],
    avail: VirtqAvail,
    used: VirtqUsed,
    header: BlkReqHeader,
    status: u8,
}

struct BlkState {
    pos: u64,
    opened: bool,
    vq: Box<VirtQ>,
    /// 单块数据缓冲，间接表的数据描述符固定指向这里
    blkbuf: Box<[u8]>,
}

pub struct VirtIoBlock {
    mmio: VirtioMmio,
    /// 本设备的 PLIC 中断号
    pub irq: usize,
    blksz: usize,
    /// 设备容量（字节）
    size: u64,
    state: UPIntrFreeCell<BlkState>,
    used_updated: Condition,
    op_lock: SleepLock<()>,
}

impl VirtIoBlock {
    /// 探测并初始化一个 virtio-mmio 槽位上的块设备
    ///
    /// 按规范顺序：复位、ACKNOWLEDGE、DRIVER、特性协商（必需
    /// RING_RESET 与 INDIRECT_DESC，期望 BLK_SIZE 与 TOPOLOGY）、
    /// 队列编程、DRIVER_OK。槽位上不是块设备时返回 `None`。
    pub fn attach(base: usize, irq: usize) -> Option<Arc<Self>> {
        let mmio = VirtioMmio::new(base);
        if mmio.magic() != MMIO_MAGIC || mmio.version() != 2 || mmio.device_id() != DEVICE_ID_BLOCK
        {
            return None;
        }

        mmio.set_status(0);
        mmio.or_status(STATUS_ACKNOWLEDGE);
        mmio.or_status(STATUS_DRIVER);
        fence(Ordering::SeqCst);

        let needed = F_RING_RESET | F_INDIRECT_DESC | F_VERSION_1;
        let wanted = BLK_F_BLK_SIZE | BLK_F_TOPOLOGY;
        let enabled = match mmio.negotiate_features(needed, wanted) {
            Ok(f) => f,
            Err(()) => {
                crate::println!("virtio-blk @ {:#x}: feature negotiation failed", base);
                return None;
            }
        };

        // 设备给出块大小就用它，否则 512
        let blksz = if enabled & BLK_F_BLK_SIZE != 0 {
            mmio.config_u32(20) as usize
        } else {
            512
        };
        let capacity = mmio.config_u64(0); // 512 字节扇区数
        let size = capacity * 512;

        let mut vq = Box::new(VirtQ {
            desc: [VirtqDesc::default(); 1],
            indirect: [VirtqDesc::default(); 3],
            avail: VirtqAvail {
                flags: 0,
                idx: 0,
                ring: [0; 1],
            },
            used: VirtqUsed {
                flags: 0,
                idx: 0,
                ring: [VirtqUsedElem::default(); 1],
            },
            header: BlkReqHeader {
                type_: 0,
                reserved: 0,
                sector: 0,
            },
            status: 0,
        });
        let blkbuf = vec![0u8; blksz].into_boxed_slice();

        // 内核半区恒等映射，内核指针就是物理地址
        vq.desc[0] = VirtqDesc {
            addr: vq.indirect.as_ptr() as u64,
            len: (3 * size_of::<VirtqDesc>()) as u32,
            flags: VIRTQ_DESC_F_INDIRECT,
            next: 0,
        };
        vq.indirect[0] = VirtqDesc {
            addr: &vq.header as *const BlkReqHeader as u64,
            len: size_of::<BlkReqHeader>() as u32,
            flags: VIRTQ_DESC_F_NEXT,
            next: 1,
        };
        vq.indirect[1] = VirtqDesc {
            addr: blkbuf.as_ptr() as u64,
            len: blksz as u32,
            flags: VIRTQ_DESC_F_NEXT,
            next: 2,
        };
        vq.indirect[2] = VirtqDesc {
            addr: &vq.status as *const u8 as u64,
            len: 1,
            flags: VIRTQ_DESC_F_WRITE,
            next: 0,
        };

        mmio.setup_queue(
            1,
            vq.desc.as_ptr() as usize,
            &vq.avail as *const VirtqAvail as usize,
            &vq.used as *const VirtqUsed as usize,
        )
        .ok()?;

        mmio.or_status(STATUS_DRIVER_OK);
        fence(Ordering::SeqCst);

        Some(Arc::new(Self {
            mmio,
            irq,
            blksz,
            size,
            state: unsafe {
                UPIntrFreeCell::new(BlkState {
                    pos: 0,
                    opened: false,
                    vq,
                    blkbuf,
                })
            },
            used_updated: Condition::new(),
            op_lock: SleepLock::new(()),
        }))
    }

    pub fn block_size(&self) -> usize {
        self.blksz
    }

    /// 打开设备，返回能力句柄；已打开时返回忙
    pub fn open(self: &Arc<Self>) -> KernResult<Arc<BlkHandle>> {
        let claimed = self.state.exclusive_session(|st| {
            if st.opened {
                false
            } else {
                st.opened = true;
                st.pos = 0;
                true
            }
        });
        if !claimed {
            return Err(KernError::Busy);
        }
        self.mmio.set_queue_ready(true);
        Ok(Arc::new(BlkHandle {
            dev: Arc::clone(self),
        }))
    }

    fn close(&self) {
        self.mmio.set_queue_ready(false);
        self.state.exclusive_session(|st| st.opened = false);
    }

    /// 中断服务：已用环更新则广播唤醒，随后回写应答
    pub fn handle_irq(&self) {
        let status = self.mmio.interrupt_status();
        if status & 1 != 0 {
            self.used_updated.broadcast();
        }
        self.mmio.interrupt_ack(status);
    }

    /// 提交一个单块请求并睡眠等待完成
    ///
    /// 调用者持有 `op_lock`。状态借用（连带关中断）覆盖从填环、
    /// 通知到挂入等待的整个窗口；ISR 只碰 MMIO 和条件变量，不会
    /// 与这里的借用冲突。
    fn op_single(&self, sector: u64, type_: u32) -> KernResult<()> {
        let mut st = self.state.exclusive_access();
        let vq = &mut *st.vq;
        vq.header.type_ = type_;
        vq.header.reserved = 0;
        vq.header.sector = sector;
        unsafe { (&mut vq.status as *mut u8).write_volatile(0) };
        vq.avail.flags = 0;
        vq.indirect[1].flags = VIRTQ_DESC_F_NEXT
            | if type_ == VIRTIO_BLK_T_IN {
                VIRTQ_DESC_F_WRITE
            } else {
                0
            };

        let idx = vq.avail.idx;
        vq.avail.ring[idx as usize % 1] = 0;
        fence(Ordering::SeqCst);
        unsafe { (&mut vq.avail.idx as *mut u16).write_volatile(idx.wrapping_add(1)) };
        fence(Ordering::SeqCst);

        self.mmio.notify(0);
        self.used_updated.wait();

        let ok = unsafe { (&vq.status as *const u8).read_volatile() } == VIRTIO_BLK_S_OK;
        drop(st);
        if ok { Ok(()) } else { Err(KernError::IoError) }
    }
}

/// 已打开设备的能力句柄
///
/// fork 通过克隆 `Arc` 共享；最后一个引用释放时设备关闭。
pub struct BlkHandle {
    dev: Arc<VirtIoBlock>,
}

impl Io for BlkHandle {
    fn read(&self, buf: &mut [u8]) -> KernResult<usize> {
        let dev = &self.dev;
        if buf.is_empty() {
            return Ok(0);
        }
        if buf.len() % dev.blksz != 0 {
            return Err(KernError::Unsupported);
        }
        let _guard = dev.op_lock.lock();
        let mut done = 0;
        while done < buf.len() {
            let sector = dev.state.exclusive_session(|st| st.pos / 512);
            dev.op_single(sector, VIRTIO_BLK_T_IN)?;
            dev.state.exclusive_session(|st| {
                buf[done..done + dev.blksz].copy_from_slice(&st.blkbuf);
                st.pos += dev.blksz as u64;
            });
            done += dev.blksz;
        }
        Ok(done)
    }

    fn write(&self, buf: &[u8]) -> KernResult<usize> {
        let dev = &self.dev;
        if buf.is_empty() {
            return Ok(0);
        }
        if buf.len() % dev.blksz != 0 {
            return Err(KernError::Unsupported);
        }
        let _guard = dev.op_lock.lock();
        let mut done = 0;
        while done < buf.len() {
            let sector = dev.state.exclusive_session(|st| {
                st.blkbuf.copy_from_slice(&buf[done..done + dev.blksz]);
                st.pos / 512
            });
            dev.op_single(sector, VIRTIO_BLK_T_OUT)?;
            dev.state.exclusive_session(|st| st.pos += dev.blksz as u64);
            done += dev.blksz;
        }
        Ok(done)
    }

    fn ioctl(&self, cmd: usize, arg: &mut u64) -> KernResult<()> {
        let dev = &self.dev;
        match cmd {
            ioctl::GETLEN => {
                *arg = dev.size;
                Ok(())
            }
            ioctl::GETPOS => {
                // 与在途请求互斥：请求提交期间状态处于独占借用中
                let _guard = dev.op_lock.lock();
                *arg = dev.state.exclusive_session(|st| st.pos);
                Ok(())
            }
            ioctl::SETPOS => {
                let _guard = dev.op_lock.lock();
                dev.state.exclusive_session(|st| st.pos = *arg);
                Ok(())
            }
            ioctl::GETBLKSZ => {
                *arg = dev.blksz as u64;
                Ok(())
            }
            _ => Err(KernError::Unsupported),
        }
    }
}

impl Drop for BlkHandle {
    fn drop(&mut self) {
        self.dev.close();
    }
}
