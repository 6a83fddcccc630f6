//! # 陷阱和中断处理模块
//!
//! 处理从用户态进入内核的所有陷阱（系统调用、异常、中断），以及
//! 内核态被时钟/外部中断打断的情形。
//!
//! 进程空间共享内核半区，U 态陷入后可以直接在内核地址上执行，
//! 不需要跳板页：`__trap_from_user` 从 `sscratch` 取回本线程的内核
//! 栈锚点，在栈顶压下陷阱帧后进入 Rust 处理函数。
//!
//! ## 寄存器使用
//!
//! - `stvec`: U 态期间指向 `__trap_from_user`，内核期间指向
//!   `__trap_from_kernel`
//! - `sscratch`: U 态期间保存线程内核栈锚点
//! - `scause`/`stval`: 陷阱原因与相关地址

use crate::sync::{intr_off, intr_on};
use crate::{println, process, syscall, task, timer};
use core::arch::global_asm;
use riscv::register::{
    mtvec::TrapMode,
    scause::{self, Exception, Interrupt, Trap},
    sie, stval, stvec,
};

pub use context::TrapFrame;

mod context;

global_asm!(include_str!("trap.S"));

unsafe extern "C" {
    safe fn __trap_from_user();
    safe fn __trap_from_kernel();
    fn __restore(cx: *mut TrapFrame) -> !;
}

/// 初始化陷阱处理：设置内核陷阱入口并使能时钟/外部中断
pub fn init() {
    set_kernel_trap_entry();
    unsafe {
        sie::set_stimer();
        sie::set_sext();
    }
    timer::next_trigger();
}

fn set_kernel_trap_entry() {
    unsafe {
        stvec::write(__trap_from_kernel as usize, TrapMode::Direct);
    }
}

fn set_user_trap_entry() {
    unsafe {
        stvec::write(__trap_from_user as usize, TrapMode::Direct);
    }
}

/// U 态陷阱统一入口
///
/// - 系统调用：`sepc` 前移 4 跳过 `ecall`，开中断后分发，返回值写回
///   `a0`
/// - 读写缺页：交给虚存层按需补页，窗口外的访问终止进程
/// - 取指缺页与其它异常：终止进程（装载器已显式设好执行权限，
///   取指缺页没有合法来源）
/// - 时钟/外部中断：推进定时器或分发设备中断，必要时让出
#[unsafe(no_mangle)]
pub extern "C" fn trap_handler(cx: &mut TrapFrame) -> ! {
    set_kernel_trap_entry();
    let scause = scause::read();
    let stval = stval::read();
    match scause.cause() {
        Trap::Exception(Exception::UserEnvCall) => {
            cx.sepc += 4;
            intr_on();
            let ret = syscall::syscall(cx.x[17], [cx.x[10], cx.x[11], cx.x[12]], cx);
            intr_off();
            cx.x[10] = ret as usize;
        }
        Trap::Exception(Exception::StorePageFault) | Trap::Exception(Exception::LoadPageFault) => {
            if crate::mm::handle_page_fault(stval).is_err() {
                println!(
                    "[kernel] page fault at {:#x} outside user range, sepc = {:#x}, kernel killed it.",
                    stval, cx.sepc
                );
                process::exit_current();
            }
        }
        Trap::Interrupt(Interrupt::SupervisorTimer) => {
            timer::tick();
            task::suspend_current_and_run_next();
        }
        Trap::Interrupt(Interrupt::SupervisorExternal) => {
            crate::drivers::irq_dispatch();
        }
        _ => {
            println!(
                "[kernel] {:?} in application, stval = {:#x}, sepc = {:#x}, kernel killed it.",
                scause.cause(),
                stval,
                cx.sepc
            );
            process::exit_current();
        }
    }
    trap_return(cx)
}

/// 内核态陷阱处理
///
/// 时钟中断让出当前线程（内核抢占），外部中断走 PLIC 分发；
/// 内核态异常没有恢复手段，直接停机。
#[unsafe(no_mangle)]
pub extern "C" fn kernel_trap_handler(cx: &mut TrapFrame) {
    let scause = scause::read();
    match scause.cause() {
        Trap::Interrupt(Interrupt::SupervisorTimer) => {
            timer::tick();
            task::suspend_current_and_run_next();
        }
        Trap::Interrupt(Interrupt::SupervisorExternal) => {
            crate::drivers::irq_dispatch();
            // 空闲线程被设备中断打断时立即改选，缩短唤醒延迟
            if task::current_is_idle() {
                task::suspend_current_and_run_next();
            }
        }
        _ => {
            panic!(
                "trap {:?} from kernel, stval = {:#x}, sepc = {:#x}",
                scause.cause(),
                stval::read(),
                cx.sepc
            );
        }
    }
}

/// 回到用户态
///
/// 先关中断再把 `stvec` 指向用户入口：这一窗口内若来内核陷阱，
/// 会错走用户入口路径。随后从陷阱帧恢复现场并 `sret`。
pub fn trap_return(cx: &mut TrapFrame) -> ! {
    intr_off();
    set_user_trap_entry();
    unsafe { __restore(cx as *mut TrapFrame) }
}

/// fork 出的子线程首次被调度后的继续点
///
/// 子线程的陷阱帧已在创建时填好（父帧快照 + 返回值清零），
/// 直接走常规返回路径。
pub extern "C" fn fork_return() -> ! {
    trap_return(task::current_trap_cx())
}
