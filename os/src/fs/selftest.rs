//! # 文件系统自检
//!
//! 启动时在内存镜像上把 I/O 能力、块适配和文件系统的整条链路走一遍：
//! 先直接校验内存字面量的读/写/ioctl（含只有字面量支持的 SETLEN），
//! 再把一个最小的扁平镜像经 [`IoLit`] 挂载成文件系统做读写回环。
//! 全部通过后主流程才挂载真实磁盘；任何一条断言失败都意味着结构性
//! 错误，直接 panic 停机。

use crate::io::{Io, IoLit, ioctl};
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use flat_fs::{BLOCK_SZ, BLOCKS_PER_INODE, BootBlock, Dentry, Inode};
use log::info;

pub fn run() {
    literal_roundtrip();
    mounted_roundtrip();
    info!("[kernel] file system self-test passed");
}

/// 单文件镜像：`hello.txt`，长度跨两个数据块
///
/// 布局：`[ 引导块 | inode 0 | 数据块 0 | 数据块 1 ]`。
fn build_image() -> Box<[u8]> {
    const CONTENT: &[u8] = b"Hello, World!";
    let mut boot = BootBlock::empty();
    boot.num_dentry = 1;
    boot.num_inodes = 1;
    boot.num_data = 2;
    boot.dentries[0] = Dentry::new("hello.txt", 0);

    let mut inode = Inode {
        byte_len: (BLOCK_SZ + CONTENT.len()) as u32,
        blocks: [0; BLOCKS_PER_INODE],
    };
    inode.blocks[0] = 0;
    inode.blocks[1] = 1;

    let mut image = vec![0u8; 4 * BLOCK_SZ];
    image[..BLOCK_SZ].copy_from_slice(boot.as_bytes());
    image[BLOCK_SZ..2 * BLOCK_SZ].copy_from_slice(inode.as_bytes());
    image[2 * BLOCK_SZ..2 * BLOCK_SZ + CONTENT.len()].copy_from_slice(CONTENT);
    image.into_boxed_slice()
}

/// 内存字面量自身的四个操作
fn literal_roundtrip() {
    let lit = IoLit::new(vec![0u8; 64].into_boxed_slice());
    let mut v: u64 = 0;
    lit.ioctl(ioctl::GETLEN, &mut v).unwrap();
    assert_eq!(v, 64);

    assert_eq!(lit.write(b"abc").unwrap(), 3);
    lit.ioctl(ioctl::GETPOS, &mut v).unwrap();
    assert_eq!(v, 3);
    v = 0;
    lit.ioctl(ioctl::SETPOS, &mut v).unwrap();
    let mut buf = [0u8; 3];
    assert_eq!(lit.read(&mut buf).unwrap(), 3);
    assert_eq!(&buf, b"abc");

    // 字面量特有：SETLEN 收缩后读写都以新长度为界
    v = 16;
    lit.ioctl(ioctl::SETLEN, &mut v).unwrap();
    lit.ioctl(ioctl::GETLEN, &mut v).unwrap();
    assert_eq!(v, 16);
    v = 10;
    lit.ioctl(ioctl::SETPOS, &mut v).unwrap();
    let mut tail = [0u8; 32];
    assert_eq!(lit.read(&mut tail).unwrap(), 6);
    assert!(lit.ioctl(ioctl::GETBLKSZ, &mut v).is_err(), "字面量没有块大小");
}

/// 从内存镜像挂载文件系统并做读写回环
fn mounted_roundtrip() {
    let image: Arc<dyn Io> = Arc::new(IoLit::new(build_image()));
    super::mount(image).expect("mounting self-test image failed");
    // 句柄必须在真实磁盘挂载之前归还，作用域兜底
    {
        let f = super::open("hello.txt").unwrap();
        let mut v: u64 = 0;
        f.ioctl(ioctl::GETBLKSZ, &mut v).unwrap();
        assert_eq!(v as usize, BLOCK_SZ);
        f.ioctl(ioctl::GETLEN, &mut v).unwrap();
        assert_eq!(v as usize, BLOCK_SZ + 13);

        let mut head = [0u8; 20];
        assert_eq!(f.read(&mut head).unwrap(), 20);
        assert_eq!(&head[..13], b"Hello, World!");

        // 定位读
        v = 7;
        f.ioctl(ioctl::SETPOS, &mut v).unwrap();
        let mut word = [0u8; 6];
        assert_eq!(f.read(&mut word).unwrap(), 6);
        assert_eq!(&word, b"World!");

        // 跨数据块边界的写入再读回
        v = (BLOCK_SZ - 8) as u64;
        f.ioctl(ioctl::SETPOS, &mut v).unwrap();
        assert_eq!(f.write(&[0xA5; 16]).unwrap(), 16);
        v = (BLOCK_SZ - 8) as u64;
        f.ioctl(ioctl::SETPOS, &mut v).unwrap();
        let mut back = [0u8; 16];
        assert_eq!(f.read(&mut back).unwrap(), 16);
        assert!(back.iter().all(|&b| b == 0xA5));

        // 写入不改变文件长度
        f.ioctl(ioctl::GETLEN, &mut v).unwrap();
        assert_eq!(v as usize, BLOCK_SZ + 13);

        assert!(super::open("nope.txt").is_err());
    }
}
