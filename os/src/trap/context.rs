/// 陷阱帧
///
/// 每次从 U 态进入内核时压在线程内核栈顶：全部通用寄存器加上
/// `sstatus` 与 `sepc`。`x[0]` 恒零，占位不用；`x[2]` 是用户栈指针。
#[repr(C)]
#[derive(Clone)]
pub struct TrapFrame {
    pub x: [usize; 32],
    pub sstatus: usize,
    pub sepc: usize,
}

/// sstatus.SPIE：sret 后的中断使能
const SSTATUS_SPIE: usize = 1 << 5;
/// sstatus.SUM：S 态访问 U 页
const SSTATUS_SUM: usize = 1 << 18;

impl TrapFrame {
    /// 首次进入用户态的陷阱帧
    ///
    /// SPP=0 回到 U 态，SPIE=1 让 sret 打开中断；SUM 保持置位，
    /// 之后内核路径才能继续直接访问已校验的用户内存。
    pub fn app_init_context(entry: usize, user_sp: usize) -> Self {
        let mut cx = TrapFrame {
            x: [0; 32],
            sstatus: SSTATUS_SPIE | SSTATUS_SUM,
            sepc: entry,
        };
        cx.x[2] = user_sp;
        cx
    }
}
