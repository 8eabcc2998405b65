/// Growable shared buffer
///
/// Many small vertex or index regions suballocated from one device-local
/// buffer. Device buffers cannot be resized in place, so when an allocation
/// does not fit the buffer is replaced by one of doubled capacity (doubling
/// repeats until the request fits). The old contents migrate through the
/// staging arena inside the current frame's transfer batch, and the old
/// buffer is retired to the current slot: it is destroyed only after the
/// frame's fence proves the GPU is done with it.
///
/// Offsets survive growth: live regions keep their offset and the free list
/// keeps its holes, with the new tail appended as free space.

use crate::allocator::{align_up, FreeList};
use crate::device::{BufferCopy, BufferDesc, BufferHandle, GpuDevice, MemoryLocation};
use crate::error::{Error, Result};
use crate::frame::{StagedBytes, UploadContext};
use crate::{engine_debug, engine_info};
use super::BufferKind;

pub struct SharedBuffer {
    kind: BufferKind,
    buffer: BufferHandle,
    free_list: FreeList,
    alignment: u64,
    /// Bytes per element, 0 for byte-addressed buffers
    stride: u32,
    growths: u32,
}

impl SharedBuffer {
    /// Create the backing buffer with `size` bytes (rounded up to `alignment`)
    pub fn new<D: GpuDevice + ?Sized>(
        device: &mut D,
        kind: BufferKind,
        size: u64,
        alignment: u64,
        stride: u32,
    ) -> Result<Self> {
        let capacity = align_up(size, alignment).ok_or(Error::OutOfMemory)?;
        let buffer = device.create_buffer(&Self::desc(kind, capacity, 0))?;
        engine_debug!("sleeve::buffer", "Created shared {} buffer ({} bytes)", kind.name(), capacity);
        Ok(Self {
            kind,
            buffer,
            free_list: FreeList::new(capacity),
            alignment,
            stride,
            growths: 0,
        })
    }

    fn desc(kind: BufferKind, size: u64, generation: u32) -> BufferDesc {
        BufferDesc {
            name: format!("shared_{}_{}", kind.name(), generation),
            size,
            usage: kind.usage(),
            location: MemoryLocation::DeviceLocal,
        }
    }

    /// Allocated size of a region holding `len` bytes
    pub fn region_size(&self, len: usize) -> Result<u64> {
        align_up(len as u64, self.alignment).ok_or(Error::OutOfMemory)
    }

    /// Stage `bytes`, allocate a region (growing if needed) and record the
    /// upload. Returns `(offset, allocated size)`.
    pub fn acquire<D: GpuDevice + ?Sized>(
        &mut self,
        bytes: &[u8],
        ctx: &mut UploadContext<'_, D>,
    ) -> Result<(u64, u64)> {
        let size = self.region_size(bytes.len())?;
        let staged: StagedBytes = ctx.stage(bytes)?;
        let offset = self.allocate(size, ctx)?;
        ctx.copy_staged(staged, self.buffer, offset);
        Ok((offset, size))
    }

    /// Allocate `size` bytes, growing the buffer when no free block fits
    pub fn allocate<D: GpuDevice + ?Sized>(&mut self, size: u64, ctx: &mut UploadContext<'_, D>) -> Result<u64> {
        if let Some(offset) = self.free_list.allocate(size) {
            return Ok(offset);
        }
        self.grow(size, ctx)?;
        self.free_list.allocate(size).ok_or(Error::OutOfMemory)
    }

    /// Overwrite bytes of a live region
    pub fn write<D: GpuDevice + ?Sized>(
        &self,
        offset: u64,
        bytes: &[u8],
        ctx: &mut UploadContext<'_, D>,
    ) -> Result<()> {
        ctx.upload(self.buffer, offset, bytes)
    }

    /// Make a range reusable. Called once the GPU can no longer read it.
    pub fn release(&mut self, offset: u64, size: u64) -> Result<()> {
        self.free_list.free(offset, size)
    }

    fn grow<D: GpuDevice + ?Sized>(&mut self, required: u64, ctx: &mut UploadContext<'_, D>) -> Result<()> {
        let old_capacity = self.capacity();
        let new_capacity = grown_capacity(old_capacity, self.free_list.tail_free(), required)?;

        // Reserve staging before creating anything so exhaustion leaves the buffer untouched
        let staging_offset = ctx.staging.reserve(old_capacity)?;
        let new_buffer = ctx.device.create_buffer(&Self::desc(self.kind, new_capacity, self.growths + 1))?;

        let staging = ctx.staging.buffer();
        ctx.copy(BufferCopy {
            src: self.buffer,
            src_offset: 0,
            dst: staging,
            dst_offset: staging_offset,
            size: old_capacity,
        });
        ctx.copy(BufferCopy {
            src: staging,
            src_offset: staging_offset,
            dst: new_buffer,
            dst_offset: 0,
            size: old_capacity,
        });

        ctx.retired.retire_buffer(self.buffer);
        self.free_list.grow(new_capacity)?;
        self.buffer = new_buffer;
        self.growths += 1;
        ctx.stats.buffer_growths += 1;

        engine_info!(
            "sleeve::buffer",
            "Grew shared {} buffer {} -> {} bytes",
            self.kind.name(), old_capacity, new_capacity
        );
        Ok(())
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn capacity(&self) -> u64 {
        self.free_list.capacity()
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn growths(&self) -> u32 {
        self.growths
    }

    pub fn free_list(&self) -> &FreeList {
        &self.free_list
    }

    /// Destroy the current backing buffer (retired ones are owned by the retirement queues)
    pub fn destroy<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        device.destroy_buffer(self.buffer);
    }
}

/// Capacity after doubling `capacity` until the tail free space fits `required`
pub fn grown_capacity(capacity: u64, tail_free: u64, required: u64) -> Result<u64> {
    let mut new_capacity = capacity.max(1);
    loop {
        new_capacity = new_capacity.checked_mul(2).ok_or(Error::OutOfMemory)?;
        if new_capacity - capacity + tail_free >= required {
            return Ok(new_capacity);
        }
    }
}

#[cfg(test)]
#[path = "shared_buffer_tests.rs"]
mod tests;
