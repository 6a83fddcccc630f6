//! 写回测试：整块写入、重新打开后读回比对，文件长度保持不变

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::ioctl::{GETLEN, SETPOS};
use user_lib::{close, fsopen, ioctl, read, write};

const BLK: usize = 4096;

static mut PATTERN: [u8; BLK] = [0xAB; BLK];
static mut BACK: [u8; BLK] = [0; BLK];

#[unsafe(no_mangle)]
pub fn main() -> i32 {
    let fd = fsopen(0, "scratch.bin");
    if fd < 0 {
        println!("write_back: open failed ({})", fd);
        return -1;
    }
    let mut len_before: u64 = 0;
    ioctl(fd, GETLEN, &mut len_before);

    let pattern = unsafe { &*(&raw const PATTERN) };
    let n = write(fd, pattern);
    if n != BLK as isize {
        println!("write_back: wrote {} (expected {})", n, BLK);
        return -1;
    }
    close(fd);

    let fd = fsopen(0, "scratch.bin");
    if fd < 0 {
        println!("write_back: reopen failed ({})", fd);
        return -1;
    }
    let mut len_after: u64 = 0;
    ioctl(fd, GETLEN, &mut len_after);
    if len_after != len_before {
        println!("write_back: length changed {} -> {}", len_before, len_after);
        return -1;
    }
    let mut pos: u64 = 0;
    ioctl(fd, SETPOS, &mut pos);
    let back = unsafe { &mut *(&raw mut BACK) };
    let n = read(fd, back);
    if n != BLK as isize {
        println!("write_back: read {} (expected {})", n, BLK);
        return -1;
    }
    if back.iter().any(|&b| b != 0xAB) {
        println!("write_back: data mismatch");
        return -1;
    }
    close(fd);
    println!("write_back: ok");
    0
}
