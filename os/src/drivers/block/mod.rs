mod vioblk;
mod virtio;

pub use vioblk::{BlkHandle, VirtIoBlock};
