use super::switch::__thread_start;
use crate::trap::fork_return;

/// 内核线程上下文
///
/// 只保存被调用者负责的寄存器：`__switch` 在这里存取 ra/sp/s0..s11，
/// 足以恢复一段内核态计算。
#[repr(C)]
#[derive(Copy, Clone)]
pub struct TaskContext {
    /// return address
    ra: usize,
    /// stack pointer
    sp: usize,
    /// callee saved registers
    s: [usize; 12],
}

impl TaskContext {
    pub fn zero_init() -> Self {
        Self {
            ra: 0,
            sp: 0,
            s: [0; 12],
        }
    }

    /// 新内核线程的初始上下文
    ///
    /// 首次被 `__switch` 选中时落入 `__thread_start`：入口和参数预存在
    /// s1/s0 中，由垫片搬回参数寄存器后跳转，不需要伪造栈帧。
    pub fn new_kernel(entry: usize, arg: usize, kstack_top: usize) -> Self {
        let mut s = [0; 12];
        s[0] = arg;
        s[1] = entry;
        Self {
            ra: __thread_start as usize,
            sp: kstack_top,
            s,
        }
    }

    /// fork 出的子线程的初始上下文
    ///
    /// 首次运行直接进入 [`fork_return`]，从快照的陷阱帧 `sret` 回用户态。
    /// `sp` 停在陷阱帧之下，帧内容不会被内核代码压栈破坏。
    pub fn goto_fork_return(frame_bottom: usize) -> Self {
        Self {
            ra: fork_return as usize,
            sp: frame_bottom,
            s: [0; 12],
        }
    }
}
