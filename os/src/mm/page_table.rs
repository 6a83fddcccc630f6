//! # Sv39 页表
//!
//! 三级页表的构建与查询。中间节点只置 `V` 位（R=W=X=0 表示指向下一级
//! 页表）；叶子项除调用者给出的权限位外总是附带 `V|A|D`，Sv39 允许
//! 硬件要求 A/D 预置。内核半区的叶子都带 `G` 位，地址空间切换时
//! 无需失效这些 TLB 项。
//!
//! 页表节点页帧来自空闲页链表，归属关系记录在页表结构本身里：
//! 回收地址空间就是遍历页表释放可达页帧（见 `space` 模块）。

use super::address::{PhysPageNum, VirtPageNum};
use super::frame_allocator::frame_alloc;
use bitflags::bitflags;

bitflags! {
    /// 页表项标志位
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct PTEFlags: u8 {
        /// Valid - 页表项有效
        const V = 1 << 0;
        /// Read - 可读
        const R = 1 << 1;
        /// Write - 可写
        const W = 1 << 2;
        /// Execute - 可执行
        const X = 1 << 3;
        /// User - 用户态可访问
        const U = 1 << 4;
        /// Global - 全局页，切换地址空间时不刷新
        const G = 1 << 5;
        /// Accessed - 已访问
        const A = 1 << 6;
        /// Dirty - 已写入
        const D = 1 << 7;
    }
}

/// 页表项
///
/// 低 8 位是标志位，位 53:10 是物理页号。
#[repr(C)]
#[derive(Copy, Clone)]
pub struct PageTableEntry {
    pub bits: usize,
}

impl PageTableEntry {
    pub fn new(ppn: PhysPageNum, flags: PTEFlags) -> Self {
        PageTableEntry {
            bits: ppn.0 << 10 | flags.bits() as usize,
        }
    }

    pub fn empty() -> Self {
        PageTableEntry { bits: 0 }
    }

    pub fn ppn(&self) -> PhysPageNum {
        (self.bits >> 10 & ((1usize << 44) - 1)).into()
    }

    pub fn flags(&self) -> PTEFlags {
        PTEFlags::from_bits_truncate(self.bits as u8)
    }

    pub fn is_valid(&self) -> bool {
        self.flags().contains(PTEFlags::V)
    }

    /// 叶子项：R/W/X 至少有一位
    pub fn is_leaf(&self) -> bool {
        self.flags()
            .intersects(PTEFlags::R | PTEFlags::W | PTEFlags::X)
    }
}

/// 一个以 `root_ppn` 为根的三级页表视图
///
/// 不拥有页帧：节点和叶子页帧的生命周期由地址空间的回收遍历管理。
#[derive(Copy, Clone)]
pub struct PageTable {
    root_ppn: PhysPageNum,
}

impl PageTable {
    pub fn from_root(root_ppn: PhysPageNum) -> Self {
        Self { root_ppn }
    }

    pub fn root_ppn(&self) -> PhysPageNum {
        self.root_ppn
    }

    /// 查找页表项，按需创建中间页表
    ///
    /// 新建的中间节点只置 `V` 位。返回的是三级页表中的目标项，
    /// 其内容由调用者填写。
    fn find_pte_create(&mut self, vpn: VirtPageNum) -> &'static mut PageTableEntry {
        let idxs = vpn.indexes();
        let mut ppn = self.root_ppn;
        for (i, idx) in idxs.iter().enumerate() {
            let pte = &mut ppn.get_pte_array()[*idx];
            if i == 2 {
                return pte;
            }
            if !pte.is_valid() {
                let frame = frame_alloc();
                *pte = PageTableEntry::new(frame, PTEFlags::V);
            }
            ppn = pte.ppn();
        }
        unreachable!()
    }

    /// 只读查找，不创建任何中间页表
    ///
    /// 中间节点缺失时返回 `None`。对已映射地址的查找没有副作用，
    /// 与 `create` 路径返回同一个页表项。
    fn find_pte(&self, vpn: VirtPageNum) -> Option<&'static mut PageTableEntry> {
        let idxs = vpn.indexes();
        let mut ppn = self.root_ppn;
        for (i, idx) in idxs.iter().enumerate() {
            let pte = &mut ppn.get_pte_array()[*idx];
            if i == 2 {
                return Some(pte);
            }
            if !pte.is_valid() {
                return None;
            }
            ppn = pte.ppn();
        }
        unreachable!()
    }

    /// 建立 `vpn -> ppn` 的叶子映射
    ///
    /// ## Panics
    ///
    /// 虚拟页已被映射时 panic。
    pub fn map(&mut self, vpn: VirtPageNum, ppn: PhysPageNum, flags: PTEFlags) {
        let pte = self.find_pte_create(vpn);
        assert!(!pte.is_valid(), "vpn {:#x} is mapped before mapping", vpn.0);
        *pte = PageTableEntry::new(ppn, flags | PTEFlags::V | PTEFlags::A | PTEFlags::D);
    }

    /// 取消映射，不释放页帧
    #[allow(unused)]
    pub fn unmap(&mut self, vpn: VirtPageNum) {
        let pte = self.find_pte(vpn).unwrap();
        assert!(pte.is_valid(), "vpn {:#x} is not mapped", vpn.0);
        *pte = PageTableEntry::empty();
    }

    /// 重写已映射页的权限位，保持 V/A/D
    pub fn set_flags(&mut self, vpn: VirtPageNum, flags: PTEFlags) {
        let pte = self
            .find_pte(vpn)
            .filter(|pte| pte.is_valid())
            .expect("set_flags on unmapped page");
        *pte = PageTableEntry::new(
            pte.ppn(),
            flags | PTEFlags::V | PTEFlags::A | PTEFlags::D,
        );
    }

    pub fn translate(&self, vpn: VirtPageNum) -> Option<PageTableEntry> {
        self.find_pte(vpn).map(|pte| *pte)
    }

    /// satp 令牌：Sv39 模式 + ASID + 根页号
    pub fn token(&self, asid: u16) -> usize {
        8usize << 60 | (asid as usize) << 44 | self.root_ppn.0
    }
}
