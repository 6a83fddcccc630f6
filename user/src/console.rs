//! 用户态控制台输出：格式化到栈缓冲后经 msgout 系统调用打印

use crate::syscall::sys_msgout;
use core::fmt::{self, Write};

struct MsgBuf {
    buf: [u8; 256],
    len: usize,
}

impl Write for MsgBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // 留一个字节给 NUL，超长截断
        let room = self.buf.len() - 1 - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

pub fn print(args: fmt::Arguments) {
    let mut out = MsgBuf {
        buf: [0; 256],
        len: 0,
    };
    out.write_fmt(args).unwrap();
    sys_msgout(out.buf.as_ptr());
}

#[macro_export]
macro_rules! println {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::print(format_args!($fmt $(, $($arg)+)?))
    };
}
