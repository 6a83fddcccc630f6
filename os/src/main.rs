//! # MallornOS 内核
//!
//! RISC-V Sv39 单 hart 监督态内核：抢占式内核线程、按需分页的用户
//! 进程、virtio-blk 上的扁平文件系统。启动流程自底向上初始化各层，
//! 最后把启动线程变成 0 号进程并 exec 文件系统里的 "init"。

#![no_std]
#![no_main]

#[macro_use]
mod console;

mod config;
mod drivers;
mod elf;
mod error;
mod fs;
mod io;
mod lang_items;
mod logging;
mod mm;
mod process;
mod sbi;
mod sync;
mod syscall;
mod task;
mod timer;
mod trap;

#[cfg(feature = "board_qemu")]
#[path = "board/qemu.rs"]
mod board;

extern crate alloc;

use core::arch::global_asm;
use log::info;

global_asm!(include_str!("entry.asm"));

#[unsafe(no_mangle)]
pub fn rust_main() -> ! {
    clear_bss();
    logging::init();
    info!("[kernel] MallornOS booting");

    mm::init();
    trap::init();
    task::init();
    process::init();

    // 先在内存镜像上自检整条文件 I/O 链路，再碰真实磁盘
    fs::self_test();

    drivers::init();

    let disk = drivers::open_block(0).expect("no block device attached");
    fs::mount(disk).expect("mounting root file system failed");
    info!("[kernel] file system mounted");

    let init = fs::open("init").expect("no init program on disk");
    if let Err(e) = process::exec(init) {
        panic!("exec init failed: {:?}", e);
    }
    unreachable!()
}

fn clear_bss() {
    unsafe extern "C" {
        safe fn sbss();
        safe fn ebss();
    }
    (sbss as usize..ebss as usize).for_each(|a| unsafe {
        (a as *mut u8).write_volatile(0);
    });
}
