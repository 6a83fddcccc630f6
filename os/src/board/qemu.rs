//! QEMU virt 平台参数

/// 时钟计数频率 (12.5MHz)
pub const CLOCK_FREQ: usize = 12_500_000;

/// 物理内存终点 (128MB)
pub const MEMORY_END: usize = 0x8800_0000;

/// 平台 MMIO 区域（基址，长度）
pub const MMIO: &[(usize, usize)] = &[
    (0x0c00_0000, 0x40_0000), // PLIC
    (0x1000_1000, 0x8000),    // virtio-mmio 槽位
];

/// virtio-mmio 槽位基址
pub const VIRTIO_MMIO_BASE: usize = 0x1000_1000;

/// virtio-mmio 槽位数量，第 i 个槽位对应外部中断号 i + 1
pub const VIRTIO_MMIO_SLOTS: usize = 8;

/// virtio-mmio 槽位间距
pub const VIRTIO_MMIO_STRIDE: usize = 0x1000;

/// PLIC 基址
pub const PLIC_BASE: usize = 0x0c00_0000;
