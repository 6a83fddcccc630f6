//! # 控制台输出模块
//!
//! 提供格式化文本输出功能，实现类似标准库的 `print!` 和 `println!` 宏。
//! 通过 SBI 接口与底层硬件交互，将文本输出到控制台。

use crate::sbi::console_putchar;
use core::fmt::{self, Write};

/// 标准输出结构体
///
/// 实现了 `Write` trait，将格式化的文本通过 SBI 接口输出到控制台。
/// 这是一个零大小类型 (ZST)，不占用内存空间。
struct Stdout;

impl Write for Stdout {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            console_putchar(c as usize);
        }
        Ok(())
    }
}

/// 格式化输出函数
///
/// 接受格式化参数并输出到控制台，是 `print!` 和 `println!` 宏的底层实现。
pub fn print(args: fmt::Arguments) {
    Stdout.write_fmt(args).unwrap();
}

/// 格式化打印宏（不换行）
#[macro_export]
macro_rules! print {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::print(format_args!($fmt $(, $($arg)+)?))
    };
}

/// 格式化打印宏（换行）
#[macro_export]
macro_rules! println {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::print(format_args!(concat!($fmt, "\n") $(, $($arg)+)?))
    };
}
