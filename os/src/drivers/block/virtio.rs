//! # virtio-mmio 寄存器与 virtqueue 结构
//!
//! 现代接口（版本 2）：描述符表、可用环、已用环的物理地址分别编程，
//! 队列通过 QueueReady 使能。特性协商需要接受 `VERSION_1`。

/// "virt" 魔数
pub const MMIO_MAGIC: u32 = 0x7472_6976;
/// 块设备的 device id
pub const DEVICE_ID_BLOCK: u32 = 2;

// 设备状态位
pub const STATUS_ACKNOWLEDGE: u32 = 1;
pub const STATUS_DRIVER: u32 = 2;
pub const STATUS_DRIVER_OK: u32 = 4;
pub const STATUS_FEATURES_OK: u32 = 8;

// 特性位（位号作掩码用）
pub const F_INDIRECT_DESC: u64 = 1 << 28;
pub const F_VERSION_1: u64 = 1 << 32;
pub const F_RING_RESET: u64 = 1 << 40;
pub const BLK_F_BLK_SIZE: u64 = 1 << 6;
pub const BLK_F_TOPOLOGY: u64 = 1 << 10;

// 寄存器偏移
const MAGIC_VALUE: usize = 0x000;
const VERSION: usize = 0x004;
const DEVICE_ID: usize = 0x008;
const DEVICE_FEATURES: usize = 0x010;
const DEVICE_FEATURES_SEL: usize = 0x014;
const DRIVER_FEATURES: usize = 0x020;
const DRIVER_FEATURES_SEL: usize = 0x024;
const QUEUE_SEL: usize = 0x030;
const QUEUE_NUM_MAX: usize = 0x034;
const QUEUE_NUM: usize = 0x038;
const QUEUE_READY: usize = 0x044;
const QUEUE_NOTIFY: usize = 0x050;
const INTERRUPT_STATUS: usize = 0x060;
const INTERRUPT_ACK: usize = 0x064;
const STATUS: usize = 0x070;
const QUEUE_DESC_LOW: usize = 0x080;
const QUEUE_DESC_HIGH: usize = 0x084;
const QUEUE_DRIVER_LOW: usize = 0x090;
const QUEUE_DRIVER_HIGH: usize = 0x094;
const QUEUE_DEVICE_LOW: usize = 0x0a0;
const QUEUE_DEVICE_HIGH: usize = 0x0a4;
const CONFIG: usize = 0x100;

/// 一个 virtio-mmio 槽位的寄存器窗口
#[derive(Copy, Clone)]
pub struct VirtioMmio {
    base: usize,
}

impl VirtioMmio {
    pub fn new(base: usize) -> Self {
        Self { base }
    }

    #[inline]
    fn read(&self, off: usize) -> u32 {
        unsafe { ((self.base + off) as *const u32).read_volatile() }
    }

    #[inline]
    fn write(&self, off: usize, val: u32) {
        unsafe { ((self.base + off) as *mut u32).write_volatile(val) };
    }

    pub fn magic(&self) -> u32 {
        self.read(MAGIC_VALUE)
    }
    pub fn version(&self) -> u32 {
        self.read(VERSION)
    }
    pub fn device_id(&self) -> u32 {
        self.read(DEVICE_ID)
    }

    pub fn set_status(&self, val: u32) {
        self.write(STATUS, val);
    }
    pub fn status(&self) -> u32 {
        self.read(STATUS)
    }
    pub fn or_status(&self, bits: u32) {
        self.set_status(self.status() | bits);
    }

    pub fn device_features(&self) -> u64 {
        self.write(DEVICE_FEATURES_SEL, 0);
        let low = self.read(DEVICE_FEATURES) as u64;
        self.write(DEVICE_FEATURES_SEL, 1);
        let high = self.read(DEVICE_FEATURES) as u64;
        high << 32 | low
    }

    pub fn set_driver_features(&self, features: u64) {
        self.write(DRIVER_FEATURES_SEL, 0);
        self.write(DRIVER_FEATURES, features as u32);
        self.write(DRIVER_FEATURES_SEL, 1);
        self.write(DRIVER_FEATURES, (features >> 32) as u32);
    }

    /// 特性协商
    ///
    /// `needed` 缺一不可，`wanted` 尽力而为；随后置 FEATURES_OK 并
    /// 回读确认设备接受。返回最终生效的特性集。
    pub fn negotiate_features(&self, needed: u64, wanted: u64) -> Result<u64, ()> {
        let offered = self.device_features();
        if offered & needed != needed {
            return Err(());
        }
        let accepted = needed | (wanted & offered);
        self.set_driver_features(accepted);
        self.or_status(STATUS_FEATURES_OK);
        if self.status() & STATUS_FEATURES_OK == 0 {
            return Err(());
        }
        Ok(accepted)
    }

    /// 编程 0 号队列：队列长度与三块环形内存的物理地址
    pub fn setup_queue(&self, size: u32, desc: usize, avail: usize, used: usize) -> Result<(), ()> {
        self.write(QUEUE_SEL, 0);
        if self.read(QUEUE_NUM_MAX) < size {
            return Err(());
        }
        self.write(QUEUE_NUM, size);
        self.write(QUEUE_DESC_LOW, desc as u32);
        self.write(QUEUE_DESC_HIGH, (desc >> 32) as u32);
        self.write(QUEUE_DRIVER_LOW, avail as u32);
        self.write(QUEUE_DRIVER_HIGH, (avail >> 32) as u32);
        self.write(QUEUE_DEVICE_LOW, used as u32);
        self.write(QUEUE_DEVICE_HIGH, (used >> 32) as u32);
        Ok(())
    }

    pub fn set_queue_ready(&self, ready: bool) {
        self.write(QUEUE_SEL, 0);
        self.write(QUEUE_READY, ready as u32);
    }

    pub fn notify(&self, queue: u32) {
        self.write(QUEUE_NOTIFY, queue);
    }

    pub fn interrupt_status(&self) -> u32 {
        self.read(INTERRUPT_STATUS)
    }

    pub fn interrupt_ack(&self, bits: u32) {
        self.write(INTERRUPT_ACK, bits);
    }

    /// 读设备配置空间中的 u32
    pub fn config_u32(&self, off: usize) -> u32 {
        self.read(CONFIG + off)
    }

    /// 读设备配置空间中的 u64
    pub fn config_u64(&self, off: usize) -> u64 {
        let low = self.config_u32(off) as u64;
        let high = self.config_u32(off + 4) as u64;
        high << 32 | low
    }
}

pub const VIRTQ_DESC_F_NEXT: u16 = 1;
pub const VIRTQ_DESC_F_WRITE: u16 = 2;
pub const VIRTQ_DESC_F_INDIRECT: u16 = 4;

/// 描述符
#[repr(C, align(16))]
#[derive(Copy, Clone, Default)]
pub struct VirtqDesc {
    pub addr: u64,
    pub len: u32,
    pub flags: u16,
    pub next: u16,
}

/// 可用环（队列长度 1）
#[repr(C, align(2))]
pub struct VirtqAvail {
    pub flags: u16,
    pub idx: u16,
    pub ring: [u16; 1],
}

#[repr(C)]
#[derive(Copy, Clone, Default)]
pub struct VirtqUsedElem {
    pub id: u32,
    pub len: u32,
}

/// 已用环（队列长度 1），由设备写入
#[repr(C, align(4))]
pub struct VirtqUsed {
    pub flags: u16,
    pub idx: u16,
    pub ring: [VirtqUsedElem; 1],
}
