//! 挂载后的文件系统与打开文件句柄表

use crate::layout::{BLOCK_SZ, BLOCKS_PER_INODE, BootBlock, Inode};
use crate::{BlockDevice, FsError};
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

/// 同时打开文件数上限
pub const MAX_OPEN_FILES: usize = 32;

/// 一个打开的文件
///
/// 每个句柄自带 inode 副本和私有的块缓冲：并发打开的文件互不
/// 串扰，元数据的一致性由调用者的外层锁保证。
struct OpenFile {
    inode_no: u32,
    pos: u32,
    size: u32,
    inode: Box<Inode>,
    buf: Box<[u8]>,
}

/// 挂载在一个块设备上的扁平文件系统
///
/// 方法都要求 `&mut self`：本类型不做内部同步，内核侧以一把全局
/// 睡眠锁独占整个实例。
pub struct FlatFs {
    device: Arc<dyn BlockDevice>,
    boot: Box<BootBlock>,
    handles: Vec<Option<OpenFile>>,
}

impl FlatFs {
    /// 读入引导块并建立空的句柄表
    pub fn mount(device: Arc<dyn BlockDevice>) -> Result<Self, FsError> {
        let mut buf = vec![0u8; BLOCK_SZ];
        device.read_block(0, &mut buf)?;
        let boot = Box::new(BootBlock::from_block(&buf));
        if boot.num_dentry as usize > crate::MAX_DENTRY {
            return Err(FsError::Io);
        }
        let mut handles = Vec::new();
        handles.resize_with(MAX_OPEN_FILES, || None);
        Ok(Self {
            device,
            boot,
            handles,
        })
    }

    #[inline]
    fn inode_block(inode_no: u32) -> usize {
        1 + inode_no as usize
    }

    #[inline]
    fn data_block(&self, index: u32) -> usize {
        1 + self.boot.num_inodes as usize + index as usize
    }

    /// 打开命名文件，返回句柄号
    ///
    /// 线性扫描目录；命中后把 inode 读进句柄私有的副本，读写位置
    /// 归零。句柄表满时返回 [`FsError::NoFreeHandle`]。
    pub fn open(&mut self, name: &str) -> Result<usize, FsError> {
        let n = self.boot.num_dentry as usize;
        let inode_no = self.boot.dentries[..n]
            .iter()
            .find(|d| d.name_matches(name))
            .map(|d| d.inode)
            .ok_or(FsError::NotFound)?;
        if inode_no >= self.boot.num_inodes {
            return Err(FsError::Io);
        }
        let mut buf = vec![0u8; BLOCK_SZ].into_boxed_slice();
        self.device
            .read_block(Self::inode_block(inode_no), &mut buf)?;
        let inode = Box::new(Inode::from_block(&buf));
        let slot = self
            .handles
            .iter()
            .position(|h| h.is_none())
            .ok_or(FsError::NoFreeHandle)?;
        self.handles[slot] = Some(OpenFile {
            inode_no,
            pos: 0,
            size: inode.byte_len,
            inode,
            buf,
        });
        Ok(slot)
    }

    /// 释放句柄
    pub fn close(&mut self, handle: usize) -> Result<(), FsError> {
        let slot = self
            .handles
            .get_mut(handle)
            .ok_or(FsError::BadHandle)?
            .take();
        if slot.is_none() {
            return Err(FsError::BadHandle);
        }
        Ok(())
    }

    fn slot_mut(&mut self, handle: usize) -> Result<&mut OpenFile, FsError> {
        self.handles
            .get_mut(handle)
            .and_then(|h| h.as_mut())
            .ok_or(FsError::BadHandle)
    }

    /// 从当前位置读，返回实际读到的字节数（文件尾为 0）
    pub fn read(&mut self, handle: usize, out: &mut [u8]) -> Result<usize, FsError> {
        let data_base = 1 + self.boot.num_inodes as usize;
        let num_data = self.boot.num_data;
        let device = self.device.clone();
        let file = self.slot_mut(handle)?;

        if file.pos >= file.size {
            return Ok(0);
        }
        let total = out.len().min((file.size - file.pos) as usize);
        let mut done = 0;
        while done < total {
            let offset = file.pos as usize;
            let block_idx = offset / BLOCK_SZ;
            let block_off = offset % BLOCK_SZ;
            if block_idx >= file.inode.allocated_blocks() || block_idx >= BLOCKS_PER_INODE {
                return Err(FsError::Io);
            }
            let db = file.inode.blocks[block_idx];
            if db >= num_data {
                return Err(FsError::Io);
            }
            device.read_block(data_base + db as usize, &mut file.buf)?;
            let chunk = (BLOCK_SZ - block_off).min(total - done);
            out[done..done + chunk].copy_from_slice(&file.buf[block_off..block_off + chunk]);
            done += chunk;
            file.pos += chunk as u32;
        }
        Ok(done)
    }

    /// 向当前位置写，返回实际写入的字节数
    ///
    /// 写入以文件已分配的数据块为界：容量耗尽时提前停止，可能少于
    /// 请求量。文件长度不会增长，inode 不需要回写。非整块的写走
    /// 读-改-写。
    pub fn write(&mut self, handle: usize, data: &[u8]) -> Result<usize, FsError> {
        let data_base = 1 + self.boot.num_inodes as usize;
        let num_data = self.boot.num_data;
        let device = self.device.clone();
        let file = self.slot_mut(handle)?;

        let allocated = file.inode.allocated_blocks();
        let mut done = 0;
        while done < data.len() {
            let offset = file.pos as usize;
            let block_idx = offset / BLOCK_SZ;
            let block_off = offset % BLOCK_SZ;
            if block_idx >= allocated || block_idx >= BLOCKS_PER_INODE {
                break;
            }
            let db = file.inode.blocks[block_idx];
            if db >= num_data {
                return Err(FsError::Io);
            }
            let chunk = (BLOCK_SZ - block_off).min(data.len() - done);
            if chunk < BLOCK_SZ {
                device.read_block(data_base + db as usize, &mut file.buf)?;
            }
            file.buf[block_off..block_off + chunk].copy_from_slice(&data[done..done + chunk]);
            device.write_block(data_base + db as usize, &file.buf)?;
            done += chunk;
            file.pos += chunk as u32;
        }
        Ok(done)
    }

    /// 设置读写位置，`0 <= pos <= 文件长度`
    pub fn set_pos(&mut self, handle: usize, pos: u32) -> Result<(), FsError> {
        let file = self.slot_mut(handle)?;
        if pos > file.size {
            return Err(FsError::InvalidArgument);
        }
        file.pos = pos;
        Ok(())
    }

    pub fn pos(&mut self, handle: usize) -> Result<u32, FsError> {
        Ok(self.slot_mut(handle)?.pos)
    }

    pub fn len(&mut self, handle: usize) -> Result<u32, FsError> {
        Ok(self.slot_mut(handle)?.size)
    }

    /// 打开文件的 inode 号（测试与诊断用）
    #[allow(unused)]
    pub fn inode_no(&mut self, handle: usize) -> Result<u32, FsError> {
        Ok(self.slot_mut(handle)?.inode_no)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Dentry, NAME_LEN};
    use spin::Mutex;

    /// 内存盘：测试替身
    struct MemDisk {
        data: Mutex<Vec<u8>>,
    }

    impl BlockDevice for MemDisk {
        fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), FsError> {
            let data = self.data.lock();
            let start = block_id * BLOCK_SZ;
            if start + BLOCK_SZ > data.len() {
                return Err(FsError::Io);
            }
            buf.copy_from_slice(&data[start..start + BLOCK_SZ]);
            Ok(())
        }

        fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), FsError> {
            let mut data = self.data.lock();
            let start = block_id * BLOCK_SZ;
            if start + BLOCK_SZ > data.len() {
                return Err(FsError::Io);
            }
            data[start..start + BLOCK_SZ].copy_from_slice(buf);
            Ok(())
        }
    }

    /// 按布局拼一个镜像：每项是（文件名，内容，字节长度）
    ///
    /// `byte_len` 可以大于内容长度，以制造"已分配但未写满"的容量。
    fn build_disk(files: &[(&str, &[u8], u32)]) -> Arc<MemDisk> {
        let mut boot = BootBlock::empty();
        boot.num_dentry = files.len() as u32;
        boot.num_inodes = files.len() as u32;

        let mut inodes = Vec::new();
        let mut data_area: Vec<u8> = Vec::new();
        let mut next_db = 0u32;
        for (i, (name, content, byte_len)) in files.iter().enumerate() {
            assert!(content.len() <= *byte_len as usize);
            assert!(name.len() <= NAME_LEN);
            boot.dentries[i] = Dentry::new(name, i as u32);
            let nblocks = (*byte_len as usize + BLOCK_SZ - 1) / BLOCK_SZ;
            let mut inode = Inode {
                byte_len: *byte_len,
                blocks: [0; BLOCKS_PER_INODE],
            };
            for b in 0..nblocks {
                inode.blocks[b] = next_db;
                next_db += 1;
            }
            inodes.push(inode);
            let mut blob = content.to_vec();
            blob.resize(nblocks * BLOCK_SZ, 0);
            data_area.extend_from_slice(&blob);
        }
        boot.num_data = next_db;

        let mut image = Vec::new();
        image.extend_from_slice(boot.as_bytes());
        for inode in &inodes {
            image.extend_from_slice(inode.as_bytes());
        }
        image.extend_from_slice(&data_area);
        Arc::new(MemDisk {
            data: Mutex::new(image),
        })
    }

    #[test]
    fn open_and_read_short_file() {
        let disk = build_disk(&[("hello", b"Hello, World!", 13)]);
        let mut fs = FlatFs::mount(disk).unwrap();
        let h = fs.open("hello").unwrap();
        let mut buf = [0u8; 20];
        let n = fs.read(h, &mut buf).unwrap();
        assert_eq!(n, 13);
        assert_eq!(&buf[..13], b"Hello, World!");
        // 已到文件尾
        assert_eq!(fs.read(h, &mut buf).unwrap(), 0);
    }

    #[test]
    fn set_pos_then_read() {
        let disk = build_disk(&[("hello", b"Hello, World!", 13)]);
        let mut fs = FlatFs::mount(disk).unwrap();
        let h = fs.open("hello").unwrap();
        fs.set_pos(h, 7).unwrap();
        let mut buf = [0u8; 6];
        assert_eq!(fs.read(h, &mut buf).unwrap(), 6);
        assert_eq!(&buf, b"World!");
    }

    #[test]
    fn set_pos_past_end_rejected() {
        let disk = build_disk(&[("hello", b"Hello, World!", 13)]);
        let mut fs = FlatFs::mount(disk).unwrap();
        let h = fs.open("hello").unwrap();
        assert_eq!(fs.set_pos(h, 13), Ok(()));
        assert_eq!(fs.set_pos(h, 14), Err(FsError::InvalidArgument));
    }

    #[test]
    fn write_full_block_and_reopen() {
        let content = vec![0u8; 8192];
        let disk = build_disk(&[("scratch", &content, 8192)]);
        let mut fs = FlatFs::mount(disk).unwrap();
        let h = fs.open("scratch").unwrap();
        let payload = vec![0xABu8; 4096];
        assert_eq!(fs.write(h, &payload).unwrap(), 4096);
        fs.close(h).unwrap();

        let h = fs.open("scratch").unwrap();
        assert_eq!(fs.len(h).unwrap(), 8192, "写入不改变文件长度");
        let mut back = vec![0u8; 4096];
        assert_eq!(fs.read(h, &mut back).unwrap(), 4096);
        assert!(back.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn write_is_bounded_by_capacity() {
        let disk = build_disk(&[("small", b"xyz", 3)]);
        let mut fs = FlatFs::mount(disk).unwrap();
        let h = fs.open("small").unwrap();
        // 1 个已分配数据块，越过它的部分被截断
        let payload = vec![0x5Au8; 2 * BLOCK_SZ];
        assert_eq!(fs.write(h, &payload).unwrap(), BLOCK_SZ);
        assert_eq!(fs.len(h).unwrap(), 3);
    }

    #[test]
    fn partial_write_preserves_rest_of_block() {
        let disk = build_disk(&[("file", b"AAAABBBBCCCC", 12)]);
        let mut fs = FlatFs::mount(disk).unwrap();
        let h = fs.open("file").unwrap();
        fs.set_pos(h, 4).unwrap();
        assert_eq!(fs.write(h, b"XXXX").unwrap(), 4);
        fs.set_pos(h, 0).unwrap();
        let mut buf = [0u8; 12];
        assert_eq!(fs.read(h, &mut buf).unwrap(), 12);
        assert_eq!(&buf, b"AAAAXXXXCCCC");
    }

    #[test]
    fn read_crosses_block_boundary() {
        let mut content = vec![0x11u8; BLOCK_SZ];
        content.extend_from_slice(&[0x22u8; 16]);
        let disk = build_disk(&[("two", &content, (BLOCK_SZ + 16) as u32)]);
        let mut fs = FlatFs::mount(disk).unwrap();
        let h = fs.open("two").unwrap();
        fs.set_pos(h, (BLOCK_SZ - 8) as u32).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(fs.read(h, &mut buf).unwrap(), 16);
        assert_eq!(&buf[..8], &[0x11; 8]);
        assert_eq!(&buf[8..], &[0x22; 8]);
    }

    #[test]
    fn missing_file() {
        let disk = build_disk(&[("hello", b"hi", 2)]);
        let mut fs = FlatFs::mount(disk).unwrap();
        assert_eq!(fs.open("nope"), Err(FsError::NotFound));
        // 名字是精确匹配而不是前缀匹配
        assert_eq!(fs.open("hell"), Err(FsError::NotFound));
        assert_eq!(fs.open("hello2"), Err(FsError::NotFound));
    }

    #[test]
    fn handle_table_fills_up() {
        let disk = build_disk(&[("hello", b"hi", 2)]);
        let mut fs = FlatFs::mount(disk).unwrap();
        let handles: Vec<_> = (0..MAX_OPEN_FILES).map(|_| fs.open("hello").unwrap()).collect();
        assert_eq!(fs.open("hello"), Err(FsError::NoFreeHandle));
        fs.close(handles[5]).unwrap();
        assert_eq!(fs.open("hello").unwrap(), 5, "复用最小的空闲槽位");
    }

    #[test]
    fn independent_positions_per_handle() {
        let disk = build_disk(&[("hello", b"Hello, World!", 13)]);
        let mut fs = FlatFs::mount(disk).unwrap();
        let a = fs.open("hello").unwrap();
        let b = fs.open("hello").unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(a, &mut buf).unwrap(), 5);
        assert_eq!(fs.pos(a).unwrap(), 5);
        assert_eq!(fs.pos(b).unwrap(), 0, "句柄各自维护读写位置");
    }

    #[test]
    fn bad_handles_rejected() {
        let disk = build_disk(&[("hello", b"hi", 2)]);
        let mut fs = FlatFs::mount(disk).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(fs.close(MAX_OPEN_FILES), Err(FsError::BadHandle));
        assert_eq!(fs.read(3, &mut buf), Err(FsError::BadHandle));
        let h = fs.open("hello").unwrap();
        fs.close(h).unwrap();
        assert_eq!(fs.close(h), Err(FsError::BadHandle), "重复关闭");
    }
}
