//! 引用计数测试
//!
//! 1. 打开一个文件
//! 2. fork 成父子两个进程
//! 3. 父进程关闭文件并等待子进程——关闭不影响子进程的副本
//! 4. 子进程继续读该文件，然后关闭并退出
//! 5. 父进程收到子进程的 tid 后退出

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{close, fork, fsopen, ioctl, pioref, read, wait};

#[unsafe(no_mangle)]
pub fn main() -> i32 {
    println!("ref_test: before fsopen (nothing should print):");
    pioref();
    if fsopen(0, "test.txt") < 0 {
        println!("ref_test: open failed");
        return -1;
    }
    println!("ref_test: after fsopen:");
    pioref();

    let tid = fork();
    if tid != 0 {
        println!("ref_test: parent after fork:");
        pioref();
        close(0);
        println!("ref_test: parent waiting...");
        let joined = wait(tid as usize);
        if joined != tid {
            println!("ref_test: wait returned {} (expected {})", joined, tid);
            return -1;
        }
        println!("ref_test: ok");
        0
    } else {
        println!("ref_test: child after fork:");
        pioref();
        let mut len: u64 = 0;
        ioctl(0, user_lib::ioctl::GETLEN, &mut len);
        let mut buf = [0u8; 256];
        let n = read(0, &mut buf[..len.min(255) as usize]);
        if n < 0 {
            println!("ref_test: child read failed ({})", n);
            return -1;
        }
        if let Ok(text) = core::str::from_utf8(&buf[..n as usize]) {
            println!("ref_test: file contents: {}", text);
        }
        close(0);
        println!("ref_test: child after close (nothing should print):");
        pioref();
        0
    }
}
