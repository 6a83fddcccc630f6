//! # 内存管理
//!
//! 自底向上：内核堆（伙伴分配器）→ 物理页池（空闲链表）→ Sv39 页表
//! 与地址空间。初始化顺序同样如此：堆和页池先于主页表建立——恒等
//! 布局下启用分页之前物理地址就是可用地址。

mod address;
mod frame_allocator;
mod heap_allocator;
mod page_table;
mod space;

pub use address::{PhysAddr, PhysPageNum, VirtAddr, VirtPageNum};
pub use frame_allocator::{frame_alloc, frame_dealloc, free_frame_count};
pub use page_table::{PTEFlags, PageTable, PageTableEntry};
pub use space::{
    AddressSpace, active_mtag, alloc_and_map_page, alloc_and_map_range, handle_page_fault,
    main_mtag, set_range_flags, switch_space, validate_user_range, validate_user_str,
};

/// 初始化内存管理子系统
pub fn init() {
    unsafe extern "C" {
        safe fn ekernel();
    }
    heap_allocator::init_heap();
    frame_allocator::init_frame_allocator(
        PhysAddr(ekernel as usize).ceil(),
        PhysAddr(crate::config::MEMORY_END).floor(),
    );
    space::init_kernel();
}
