//! # ELF 装载器
//!
//! 从一个 I/O 能力读入整个镜像，校验 ELF64 头后把 PT_LOAD 段装进
//! 当前激活的用户空间。段先按 R|W|U 映射以便拷贝和清零，拷贝完成后
//! 再按段头的权限位收紧，代码段由此获得执行权限——取指缺页因此
//! 没有合法来源。

use crate::error::{KernError, KernResult};
use crate::io::{Io, ioctl, read_full};
use crate::mm::{self, PTEFlags};
use crate::config::{PAGE_SIZE, USER_END_VMA, USER_START_VMA};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use xmas_elf::header::{self, HeaderPt2, Machine};
use xmas_elf::{ElfFile, program};

/// 读入并校验一个 ELF 镜像
///
/// 失败时进程状态尚未被破坏，调用者可以把错误原样返回给用户。
pub fn read_image(io: &Arc<dyn Io>) -> KernResult<Vec<u8>> {
    let mut len: u64 = 0;
    io.ioctl(ioctl::GETLEN, &mut len)?;
    let mut pos: u64 = 0;
    io.ioctl(ioctl::SETPOS, &mut pos)?;
    let mut data = vec![0u8; len as usize];
    if read_full(io.as_ref(), &mut data)? != data.len() {
        return Err(KernError::IoError);
    }
    // 先整体校验，确认无误后才允许上层拆除旧空间
    check(&ElfFile::new(&data).map_err(|_| KernError::BadFormat)?)?;
    Ok(data)
}

fn check(elf: &ElfFile) -> KernResult<()> {
    let pt1 = &elf.header.pt1;
    if pt1.magic != [0x7f, b'E', b'L', b'F'] {
        return Err(KernError::BadFormat);
    }
    if pt1.class() != header::Class::SixtyFour || pt1.data() != header::Data::LittleEndian {
        return Err(KernError::BadFormat);
    }
    match elf.header.pt2 {
        HeaderPt2::Header64(pt2)
            if pt2.type_.as_type() == header::Type::Executable
                && pt2.machine.as_machine() == Machine::RISC_V => {}
        _ => return Err(KernError::BadFormat),
    }
    for ph in elf.program_iter() {
        if matches!(ph.get_type(), Ok(program::Type::Load)) {
            let start = ph.virtual_addr() as usize;
            let end = start + ph.mem_size() as usize;
            if start < USER_START_VMA || end > USER_END_VMA || ph.file_size() > ph.mem_size() {
                return Err(KernError::BadFormat);
            }
        }
    }
    Ok(())
}

/// 把已校验镜像的 PT_LOAD 段装入当前激活空间，返回入口地址
///
/// 页帧分配来自清零页，`mem_size > file_size` 的尾部天然为零。
pub fn load_into_active(data: &[u8]) -> usize {
    let elf = ElfFile::new(data).expect("image was validated");
    for ph in elf.program_iter() {
        if !matches!(ph.get_type(), Ok(program::Type::Load)) {
            continue;
        }
        let vaddr = ph.virtual_addr() as usize;
        let start = vaddr & !(PAGE_SIZE - 1);
        let end = (vaddr + ph.mem_size() as usize + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        mm::alloc_and_map_range(
            start,
            end - start,
            PTEFlags::R | PTEFlags::W | PTEFlags::U,
        );
        let src = &data[ph.offset() as usize..(ph.offset() + ph.file_size()) as usize];
        unsafe {
            core::ptr::copy_nonoverlapping(src.as_ptr(), vaddr as *mut u8, src.len());
        }
        let mut flags = PTEFlags::U;
        if ph.flags().is_read() {
            flags |= PTEFlags::R;
        }
        if ph.flags().is_write() {
            flags |= PTEFlags::W;
        }
        if ph.flags().is_execute() {
            flags |= PTEFlags::X;
        }
        mm::set_range_flags(start, end - start, flags);
    }
    elf.header.pt2.entry_point() as usize
}
