//! # 地址空间管理
//!
//! 内核主空间在初始化时一次建成：低 2GB 以恒等巨页映射（覆盖全部
//! MMIO），第三个 GB 内按区域权限映射内核镜像（代码 R|X、只读数据 R、
//! 数据 R|W，页粒度），其余 RAM 以 R|W 大页映射。内核半区叶子全部
//! 带 `G` 位。
//!
//! 进程空间通过复制主空间根页表中内核半区的表项来共享内核映射，
//! 主页表本身从不被修改。用户半区 `[USER_START_VMA, USER_END_VMA)`
//! 的页按需分配：fork 时深拷贝，exec 时由装载器建立，其余由缺页
//! 异常补齐。
//!
//! 这里的遍历/校验操作都针对"当前激活空间"（satp 指向的空间），
//! 与异常处理路径共用，一律不可睡眠。

use super::address::{PhysPageNum, VirtAddr};
use super::frame_allocator::{frame_alloc, frame_dealloc};
use super::page_table::{PTEFlags, PageTable, PageTableEntry};
use crate::config::{
    GIGA_SIZE, MEGA_SIZE, MEMORY_END, PAGE_SIZE, RAM_START, USER_END_VMA, USER_START_VMA,
};
use crate::error::{KernError, KernResult};
use crate::println;
use core::arch::asm;
use core::sync::atomic::{AtomicUsize, Ordering};
use riscv::register::{satp, sstatus};

/// 主（纯内核）空间的 mtag，`init_kernel` 之后有效
static MAIN_MTAG: AtomicUsize = AtomicUsize::new(0);

const KERNEL_FLAGS: PTEFlags = PTEFlags::V
    .union(PTEFlags::A)
    .union(PTEFlags::D)
    .union(PTEFlags::G);

#[inline]
fn sfence_vma() {
    unsafe { asm!("sfence.vma", options(nostack)) };
}

/// 当前激活空间的 satp 值
#[inline]
pub fn active_mtag() -> usize {
    satp::read().bits()
}

/// 当前激活空间的根页表页号
#[inline]
fn active_root() -> PhysPageNum {
    PhysPageNum(satp::read().bits() & ((1 << 44) - 1))
}

/// 主空间的 mtag
pub fn main_mtag() -> usize {
    MAIN_MTAG.load(Ordering::Relaxed)
}

/// 切换激活空间并刷新非全局 TLB 项
pub fn switch_space(mtag: usize) {
    unsafe { satp::write(mtag) };
    sfence_vma();
}

/// 在 `table` 的 `level`（2=巨页，1=大页）层直接写一个恒等叶子项
fn map_huge_leaf(table: PhysPageNum, level: usize, pa: usize, flags: PTEFlags) {
    let idx = (pa >> (12 + 9 * level)) & 0x1ff;
    table.get_pte_array()[idx] = PageTableEntry::new(PhysPageNum(pa >> 12), flags | KERNEL_FLAGS);
}

/// 建立并激活内核主空间
pub fn init_kernel() {
    unsafe extern "C" {
        safe fn stext();
        safe fn etext();
        safe fn erodata();
        safe fn ekernel();
    }
    let text_end = etext as usize;
    let rodata_end = erodata as usize;
    let kimg_end = ekernel as usize;
    let kimg_mega_end = (kimg_end + MEGA_SIZE - 1) / MEGA_SIZE * MEGA_SIZE;

    let root = frame_alloc();

    // 低 2GB：恒等巨页，覆盖 MMIO
    let mut pma = 0usize;
    while pma < RAM_START {
        map_huge_leaf(root, 2, pma, PTEFlags::R | PTEFlags::W);
        pma += GIGA_SIZE;
    }

    // 第三个 GB 挂二级页表
    let pt1 = frame_alloc();
    root.get_pte_array()[(RAM_START >> 30) & 0x1ff] =
        PageTableEntry::new(pt1, PTEFlags::V | PTEFlags::G);

    // SBI 保留区（RAM 起点到内核镜像基址）：R|W 大页
    let kimg_base = stext as usize;
    let mut pp = RAM_START;
    while pp < kimg_base {
        map_huge_leaf(pt1, 1, pp, PTEFlags::R | PTEFlags::W);
        pp += MEGA_SIZE;
    }

    // 内核镜像所在的大页范围：页粒度，按区域设置权限
    while pp < kimg_mega_end {
        let pt0 = frame_alloc();
        pt1.get_pte_array()[(pp >> 21) & 0x1ff] =
            PageTableEntry::new(pt0, PTEFlags::V | PTEFlags::G);
        let mut page = pp;
        while page < pp + MEGA_SIZE {
            let flags = if page < text_end {
                PTEFlags::R | PTEFlags::X
            } else if page < rodata_end {
                PTEFlags::R
            } else {
                PTEFlags::R | PTEFlags::W
            };
            pt0.get_pte_array()[(page >> 12) & 0x1ff] =
                PageTableEntry::new(PhysPageNum(page >> 12), flags | KERNEL_FLAGS);
            page += PAGE_SIZE;
        }
        pp += MEGA_SIZE;
    }

    // 其余 RAM：R|W 大页（空闲页池）
    while pp < MEMORY_END {
        map_huge_leaf(pt1, 1, pp, PTEFlags::R | PTEFlags::W);
        pp += MEGA_SIZE;
    }

    println!(".text   [{:#x}, {:#x})", kimg_base, text_end);
    println!(".rodata [{:#x}, {:#x})", text_end, rodata_end);
    println!(".data   [{:#x}, {:#x})", rodata_end, kimg_end);

    let mtag = 8usize << 60 | root.0;
    MAIN_MTAG.store(mtag, Ordering::Relaxed);
    switch_space(mtag);

    // 允许 S 态访问 U 页：用户指针先经校验再直接解引用
    unsafe { sstatus::set_sum() };
}

/// 一个进程的地址空间
///
/// 只记录 ASID 和根页号；页表节点与用户页帧的归属关系由页表结构
/// 自身承载，回收时整体遍历释放。
pub struct AddressSpace {
    asid: u16,
    root: PhysPageNum,
}

impl AddressSpace {
    /// 创建空的进程空间：共享内核半区，没有任何用户映射
    pub fn new_user(asid: u16) -> Self {
        let root = frame_alloc();
        let main_root = PhysPageNum(main_mtag() & ((1 << 44) - 1));
        let src = main_root.get_pte_array();
        let dst = root.get_pte_array();
        for idx in 0..(USER_START_VMA >> 30) {
            dst[idx] = src[idx];
        }
        Self { asid, root }
    }

    /// 深拷贝当前激活空间的用户半区到一个新空间
    ///
    /// 逐页走查 `[USER_START_VMA, USER_END_VMA)`：有效且 U 位置位的
    /// 叶子才复制，内核可见但用户不可见的页不会进入子空间。
    pub fn clone_active(asid: u16) -> Self {
        let new_space = Self::new_user(asid);
        let parent = PageTable::from_root(active_root());
        let mut child = PageTable::from_root(new_space.root);
        let mut va = USER_START_VMA;
        while va < USER_END_VMA {
            let vpn = VirtAddr(va).floor();
            if let Some(pte) = parent.translate(vpn) {
                if pte.is_valid() && pte.flags().contains(PTEFlags::U) {
                    let frame = frame_alloc();
                    frame
                        .get_bytes_array()
                        .copy_from_slice(pte.ppn().get_bytes_array());
                    let perm = pte.flags()
                        & (PTEFlags::R | PTEFlags::W | PTEFlags::X | PTEFlags::U);
                    child.map(vpn, frame, perm);
                }
            }
            va += PAGE_SIZE;
        }
        new_space
    }

    pub fn mtag(&self) -> usize {
        8usize << 60 | (self.asid as usize) << 44 | self.root.0
    }

    pub fn activate(&self) {
        switch_space(self.mtag());
    }

    /// 回收整个空间：释放用户半区的页帧和页表节点，切回主空间
    ///
    /// 先完成挂起的页表更新并切换到主空间，再遍历释放——硬件绝不会
    /// 走到正在被释放的表上。内核半区是共享的，不动。
    pub fn reclaim(self) {
        sfence_vma();
        switch_space(main_mtag());
        let root_arr = self.root.get_pte_array();
        for idx2 in (USER_START_VMA >> 30)..((USER_END_VMA + GIGA_SIZE - 1) >> 30) {
            let pte2 = root_arr[idx2 & 0x1ff];
            if !pte2.is_valid() {
                continue;
            }
            for pte1 in pte2.ppn().get_pte_array().iter() {
                if !pte1.is_valid() {
                    continue;
                }
                for pte0 in pte1.ppn().get_pte_array().iter() {
                    if pte0.is_valid() && pte0.flags().contains(PTEFlags::U) {
                        frame_dealloc(pte0.ppn());
                    }
                }
                frame_dealloc(pte1.ppn());
            }
            frame_dealloc(pte2.ppn());
            root_arr[idx2 & 0x1ff] = PageTableEntry::empty();
        }
        frame_dealloc(self.root);
    }
}

/// 在当前激活空间分配并映射一个页
pub fn alloc_and_map_page(vma: usize, flags: PTEFlags) {
    let frame = frame_alloc();
    let mut pt = PageTable::from_root(active_root());
    pt.map(VirtAddr(vma).floor(), frame, flags);
    sfence_vma();
}

/// 对页对齐的区间逐页分配映射，已映射的页保持原样
///
/// 装载器用它铺设段区间；相邻段共享一页时不会重复分配。
pub fn alloc_and_map_range(vma: usize, size: usize, flags: PTEFlags) {
    assert!(size % PAGE_SIZE == 0, "unaligned map range");
    let pt = PageTable::from_root(active_root());
    let mut va = vma;
    while va < vma + size {
        let mapped = pt
            .translate(VirtAddr(va).floor())
            .map(|pte| pte.is_valid())
            .unwrap_or(false);
        if !mapped {
            alloc_and_map_page(va, flags);
        }
        va += PAGE_SIZE;
    }
}

/// 重写区间内每一页的权限位，保持 V/A/D
pub fn set_range_flags(vma: usize, size: usize, flags: PTEFlags) {
    assert!(size % PAGE_SIZE == 0, "unaligned flag range");
    let mut pt = PageTable::from_root(active_root());
    let mut va = vma;
    while va < vma + size {
        pt.set_flags(VirtAddr(va).floor(), flags);
        va += PAGE_SIZE;
    }
    sfence_vma();
}

/// 用户态缺页处理：窗口内按需补页，窗口外报错由上层终止进程
pub fn handle_page_fault(va: usize) -> KernResult<()> {
    let page = va & !(PAGE_SIZE - 1);
    if page < USER_START_VMA || page >= USER_END_VMA {
        return Err(KernError::BadFormat);
    }
    alloc_and_map_page(page, PTEFlags::R | PTEFlags::W | PTEFlags::U);
    Ok(())
}

/// 校验一段用户缓冲区
///
/// 区间必须完全落在用户窗口内；每一页要么已按至少 `flags` 的权限
/// 映射（按位包含判断），要么尚未映射——此时按需补一个 R|W|U 页，
/// 与缺页路径的行为一致。对权限不足的已映射页（比如向代码段写入）
/// 返回 [`KernError::BadFormat`]。
pub fn validate_user_range(va: usize, len: usize, flags: PTEFlags) -> KernResult<()> {
    if len == 0 {
        return Ok(());
    }
    let end = va.checked_add(len).ok_or(KernError::BadFormat)?;
    if va < USER_START_VMA || end > USER_END_VMA {
        return Err(KernError::BadFormat);
    }
    let pt = PageTable::from_root(active_root());
    let mut page = va & !(PAGE_SIZE - 1);
    while page < end {
        match pt.translate(VirtAddr(page).floor()) {
            Some(pte) if pte.is_valid() => {
                if !pte.flags().contains(flags) {
                    return Err(KernError::BadFormat);
                }
            }
            _ => {
                if !(PTEFlags::R | PTEFlags::W | PTEFlags::U).contains(flags) {
                    return Err(KernError::BadFormat);
                }
                alloc_and_map_page(page, PTEFlags::R | PTEFlags::W | PTEFlags::U);
            }
        }
        page += PAGE_SIZE;
    }
    Ok(())
}

/// 校验一个以 NUL 结尾的用户字符串并借出为 `&str`
///
/// 逐页检查映射与权限，在已映射区域内找到第一个 0 字节即停止。
pub fn validate_user_str(va: usize, flags: PTEFlags) -> KernResult<&'static str> {
    if va < USER_START_VMA || va >= USER_END_VMA {
        return Err(KernError::BadFormat);
    }
    let pt = PageTable::from_root(active_root());
    let mut len = 0usize;
    let mut cursor = va;
    'scan: while cursor < USER_END_VMA {
        let pte = pt
            .translate(VirtAddr(cursor).floor())
            .filter(|pte| pte.is_valid())
            .ok_or(KernError::BadFormat)?;
        if !pte.flags().contains(flags) {
            return Err(KernError::BadFormat);
        }
        let page_end = (cursor & !(PAGE_SIZE - 1)) + PAGE_SIZE;
        while cursor < page_end {
            let byte = unsafe { (cursor as *const u8).read() };
            if byte == 0 {
                break 'scan;
            }
            len += 1;
            cursor += 1;
        }
    }
    if cursor >= USER_END_VMA {
        return Err(KernError::BadFormat);
    }
    let bytes = unsafe { core::slice::from_raw_parts(va as *const u8, len) };
    core::str::from_utf8(bytes).map_err(|_| KernError::BadFormat)
}
