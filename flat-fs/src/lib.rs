//! # 扁平文件系统
//!
//! 单层命名空间的定长布局文件系统：
//!
//! ```text
//! [ 引导块 | inode 0 | inode 1 | … | 数据块 0 | 数据块 1 | … ]
//! ```
//!
//! 每个元素恰好 4KB。引导块记录目录项、inode 与数据块数量；每个
//! inode 记录文件字节长度和至多 1023 个数据块索引。没有目录层级、
//! 空闲位图和文件增长：文件的容量在制作镜像时就确定了。
//!
//! 本 crate 不含同步：内核把 [`FlatFs`] 整个放在一把全局睡眠锁
//! 之后。块访问通过 [`BlockDevice`] 抽象，宿主机测试用内存盘
//! 替代真实块设备。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod fs;
mod layout;

pub use fs::{FlatFs, MAX_OPEN_FILES};
pub use layout::{BLOCK_SZ, BLOCKS_PER_INODE, BootBlock, Dentry, Inode, MAX_DENTRY, NAME_LEN};

/// 文件系统层错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// 目录中没有这个名字
    NotFound,
    /// 句柄表已满
    NoFreeHandle,
    /// 句柄号越界或未打开
    BadHandle,
    /// 参数越界（如 setpos 超过文件长度）
    InvalidArgument,
    /// 底层块设备错误，或磁盘上的索引超出布局范围
    Io,
}

/// 以 4KB 块为单位寻址的块设备
///
/// `buf` 的长度必须等于 [`BLOCK_SZ`]。
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), FsError>;
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), FsError>;
}
