#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{close, fsopen, ioctl, read};

#[unsafe(no_mangle)]
pub fn main() -> i32 {
    println!("Hello, world from user mode!");

    // 从文件系统读一个短文件并回显
    let fd = fsopen(0, "hello.txt");
    if fd < 0 {
        println!("hello: open failed ({})", fd);
        return -1;
    }
    let mut len: u64 = 0;
    ioctl(fd, user_lib::ioctl::GETLEN, &mut len);
    let mut buf = [0u8; 64];
    let n = read(fd, &mut buf);
    if n >= 0 {
        if let Ok(text) = core::str::from_utf8(&buf[..n as usize]) {
            println!("hello.txt ({} bytes): {}", len, text);
        }
    }
    close(fd);
    0
}
