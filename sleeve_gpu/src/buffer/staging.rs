/// Per-frame staging arena
///
/// One persistently mapped, host-visible buffer per frame slot, managed by a
/// free list that is wholesale reset when the slot becomes current again.
/// Reset is only valid once the slot's fences have been waited: until then
/// the previous transfer submission may still be reading from the arena.

use crate::allocator::{align_up, FreeList};
use crate::device::{BufferDesc, BufferHandle, BufferUsage, GpuDevice, MemoryLocation};
use crate::error::{Error, Result};

/// Alignment of every staged range
pub const STAGING_ALIGNMENT: u64 = 16;

pub struct StagingArena {
    buffer: BufferHandle,
    free_list: FreeList,
}

impl StagingArena {
    pub fn new<D: GpuDevice + ?Sized>(device: &mut D, slot: usize, size: u64) -> Result<Self> {
        let buffer = device.create_buffer(&BufferDesc {
            name: format!("staging_{}", slot),
            size,
            usage: BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST,
            location: MemoryLocation::HostVisible,
        })?;
        Ok(Self { buffer, free_list: FreeList::new(size) })
    }

    /// Forget every staged range
    pub fn reset(&mut self) {
        self.free_list.reset();
    }

    /// Reserve `size` bytes without writing them (target of a device copy)
    pub fn reserve(&mut self, size: u64) -> Result<u64> {
        let aligned = align_up(size, STAGING_ALIGNMENT).ok_or(Error::OutOfMemory)?;
        self.free_list.allocate(aligned).ok_or(Error::StagingExhausted {
            requested: size,
            available: self.free_list.largest_free_block(),
        })
    }

    /// Copy `bytes` into the arena and return their offset
    pub fn stage<D: GpuDevice + ?Sized>(&mut self, device: &mut D, bytes: &[u8]) -> Result<u64> {
        if bytes.is_empty() {
            return Err(Error::InvalidResource("cannot stage zero bytes".to_string()));
        }
        let offset = self.reserve(bytes.len() as u64)?;
        device.write_buffer(self.buffer, offset, bytes)?;
        Ok(offset)
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn capacity(&self) -> u64 {
        self.free_list.capacity()
    }

    pub fn used(&self) -> u64 {
        self.free_list.used_bytes()
    }

    pub fn destroy<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        device.destroy_buffer(self.buffer);
    }
}

#[cfg(test)]
#[path = "staging_tests.rs"]
mod tests;
