//! 0 号进程：依次 fork + exec 磁盘上的各个测试程序并等待

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{exec, fork, fsopen, wait};

const PROGRAMS: &[&str] = &["hello", "ref_test", "write_back", "sleep_test"];

#[unsafe(no_mangle)]
pub fn main() -> i32 {
    println!("init: starting");
    for prog in PROGRAMS {
        let tid = fork();
        if tid == 0 {
            let fd = fsopen(-1, prog);
            if fd < 0 {
                println!("init: cannot open {} ({})", prog, fd);
                return -1;
            }
            exec(fd);
            println!("init: exec {} failed", prog);
            return -1;
        }
        let joined = wait(tid as usize);
        println!("init: {} done (tid {})", prog, joined);
    }
    println!("init: all tests finished");
    0
}
