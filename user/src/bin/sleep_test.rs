#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::usleep;

#[unsafe(no_mangle)]
pub fn main() -> i32 {
    println!("sleep_test: sleeping 100ms");
    usleep(100_000);
    println!("sleep_test: awake");
    0
}
