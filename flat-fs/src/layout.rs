//! 磁盘布局类型，字段全部小端，与磁盘字节逐一对应

/// 块大小
pub const BLOCK_SZ: usize = 4096;
/// 文件名长度上限
pub const NAME_LEN: usize = 32;
/// 目录项数量上限：4KB 引导块 = 64B 头部 + 63 * 64B 目录项
pub const MAX_DENTRY: usize = 63;
/// 每个 inode 的数据块索引上限，受块大小限制
pub const BLOCKS_PER_INODE: usize = 1023;

/// 目录项：定长 64 字节
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Dentry {
    pub name: [u8; NAME_LEN],
    pub inode: u32,
    reserved: [u8; 28],
}

/// 引导块（0 号块）
#[repr(C)]
pub struct BootBlock {
    pub num_dentry: u32,
    pub num_inodes: u32,
    pub num_data: u32,
    reserved: [u8; 52],
    pub dentries: [Dentry; MAX_DENTRY],
}

/// inode 块：文件长度 + 数据块索引表
#[repr(C)]
pub struct Inode {
    pub byte_len: u32,
    pub blocks: [u32; BLOCKS_PER_INODE],
}

const _: () = assert!(core::mem::size_of::<Dentry>() == 64);
const _: () = assert!(core::mem::size_of::<BootBlock>() == BLOCK_SZ);
const _: () = assert!(core::mem::size_of::<Inode>() == BLOCK_SZ);

impl Dentry {
    /// 与 NUL 填充的定长名字比较，长度按 32 字节截断
    pub fn name_matches(&self, name: &str) -> bool {
        let bytes = name.as_bytes();
        if bytes.len() > NAME_LEN {
            return false;
        }
        if self.name[..bytes.len()] != *bytes {
            return false;
        }
        bytes.len() == NAME_LEN || self.name[bytes.len()] == 0
    }

    /// 构建镜像用：名字截断到 32 字节，NUL 填充
    pub fn new(name: &str, inode: u32) -> Self {
        let mut d = Dentry {
            name: [0; NAME_LEN],
            inode,
            reserved: [0; 28],
        };
        let n = name.len().min(NAME_LEN);
        d.name[..n].copy_from_slice(&name.as_bytes()[..n]);
        d
    }
}

impl BootBlock {
    /// 从一个块的原始字节解码
    pub fn from_block(buf: &[u8]) -> Self {
        assert_eq!(buf.len(), BLOCK_SZ);
        unsafe { core::ptr::read_unaligned(buf.as_ptr() as *const BootBlock) }
    }

    /// 构建镜像用：三个计数全零、目录全空的引导块
    pub fn empty() -> Self {
        BootBlock {
            num_dentry: 0,
            num_inodes: 0,
            num_data: 0,
            reserved: [0; 52],
            dentries: [Dentry::new("", 0); MAX_DENTRY],
        }
    }

    /// 磁盘字节视图，恰好一个块
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self as *const _ as *const u8, BLOCK_SZ) }
    }
}

impl Inode {
    pub fn from_block(buf: &[u8]) -> Self {
        assert_eq!(buf.len(), BLOCK_SZ);
        unsafe { core::ptr::read_unaligned(buf.as_ptr() as *const Inode) }
    }

    /// 该文件已分配的数据块数（按长度向上取整）
    pub fn allocated_blocks(&self) -> usize {
        (self.byte_len as usize + BLOCK_SZ - 1) / BLOCK_SZ
    }

    /// 磁盘字节视图，恰好一个块
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self as *const _ as *const u8, BLOCK_SZ) }
    }
}
