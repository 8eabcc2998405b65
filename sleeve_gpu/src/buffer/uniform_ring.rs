/// Uniform ring: one uniform buffer per frame slot
///
/// Uniform data changes every frame, so each frame slot owns its own
/// device-local copy of the uniform buffer and every uniform region is
/// allocated at the same offset in all of them. An upload only ever writes
/// the copy of the slot being recorded (whose previous frame has completed);
/// the other slots are marked stale and receive the latest bytes from a CPU
/// shadow when they next become current. In-flight frames therefore never
/// observe a write.
///
/// Growth replaces all copies at once: the current slot's new buffer is
/// re-uploaded from the shadows immediately, the others are marked fully
/// stale.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::allocator::{align_up, FreeList};
use crate::device::{BufferDesc, BufferHandle, GpuDevice, MemoryLocation};
use crate::error::{Error, Result};
use crate::frame::UploadContext;
use crate::engine_info;
use super::shared_buffer::grown_capacity;
use super::BufferKind;

pub struct UniformRing {
    buffers: Vec<BufferHandle>,
    free_list: FreeList,
    alignment: u64,
    /// Latest bytes of every live region, keyed by offset
    shadows: FxHashMap<u64, Vec<u8>>,
    /// Offsets each slot must refresh before its next frame
    stale: Vec<FxHashSet<u64>>,
    growths: u32,
}

impl UniformRing {
    pub fn new<D: GpuDevice + ?Sized>(
        device: &mut D,
        frames_in_flight: usize,
        size: u64,
        alignment: u64,
    ) -> Result<Self> {
        let capacity = align_up(size, alignment).ok_or(Error::OutOfMemory)?;
        let buffers = create_buffers(device, frames_in_flight, capacity, 0)?;
        Ok(Self {
            buffers,
            free_list: FreeList::new(capacity),
            alignment,
            shadows: FxHashMap::default(),
            stale: vec![FxHashSet::default(); frames_in_flight],
            growths: 0,
        })
    }

    /// Allocated size of a region holding `len` bytes
    pub fn region_size(&self, len: usize) -> Result<u64> {
        align_up(len as u64, self.alignment).ok_or(Error::OutOfMemory)
    }

    /// Allocate a region for `bytes` and upload it to `slot`'s buffer.
    /// Returns `(offset, allocated size)`.
    pub fn acquire<D: GpuDevice + ?Sized>(
        &mut self,
        bytes: &[u8],
        slot: usize,
        ctx: &mut UploadContext<'_, D>,
    ) -> Result<(u64, u64)> {
        let size = self.region_size(bytes.len())?;
        let staged = ctx.stage(bytes)?;
        let offset = match self.free_list.allocate(size) {
            Some(offset) => offset,
            None => {
                self.grow(size, slot, ctx)?;
                self.free_list.allocate(size).ok_or(Error::OutOfMemory)?
            }
        };
        ctx.copy_staged(staged, self.buffers[slot], offset);
        self.shadows.insert(offset, bytes.to_vec());
        self.mark_stale_except(offset, slot);
        Ok((offset, size))
    }

    /// Overwrite the start of a live region
    pub fn update<D: GpuDevice + ?Sized>(
        &mut self,
        offset: u64,
        bytes: &[u8],
        slot: usize,
        ctx: &mut UploadContext<'_, D>,
    ) -> Result<()> {
        let shadow = self
            .shadows
            .get_mut(&offset)
            .ok_or_else(|| Error::InvalidResource(format!("no uniform region at offset {}", offset)))?;
        if bytes.len() > shadow.len() {
            shadow.resize(bytes.len(), 0);
        }
        shadow[..bytes.len()].copy_from_slice(bytes);
        ctx.upload(self.buffers[slot], offset, bytes)?;
        self.mark_stale_except(offset, slot);
        Ok(())
    }

    /// Forget a region's contents. Its range is returned later through `release`.
    pub fn forget(&mut self, offset: u64) {
        self.shadows.remove(&offset);
        for stale in &mut self.stale {
            stale.remove(&offset);
        }
    }

    /// Make a range reusable. Called once no in-flight frame can read it.
    pub fn release(&mut self, offset: u64, size: u64) -> Result<()> {
        self.free_list.free(offset, size)
    }

    /// Bring `slot`'s buffer up to date. Returns the number of regions uploaded.
    pub fn refresh_slot<D: GpuDevice + ?Sized>(&mut self, slot: usize, ctx: &mut UploadContext<'_, D>) -> Result<usize> {
        let mut offsets: Vec<u64> = self.stale[slot].drain().collect();
        offsets.sort_unstable();
        for (index, offset) in offsets.iter().enumerate() {
            let Some(shadow) = self.shadows.get(offset) else {
                continue;
            };
            if let Err(e) = ctx.upload(self.buffers[slot], *offset, shadow) {
                self.stale[slot].extend(offsets[index..].iter().copied());
                return Err(e);
            }
        }
        Ok(offsets.len())
    }

    fn mark_stale_except(&mut self, offset: u64, slot: usize) {
        for (index, stale) in self.stale.iter_mut().enumerate() {
            if index != slot {
                stale.insert(offset);
            }
        }
    }

    fn grow<D: GpuDevice + ?Sized>(&mut self, required: u64, slot: usize, ctx: &mut UploadContext<'_, D>) -> Result<()> {
        let old_capacity = self.capacity();
        let new_capacity = grown_capacity(old_capacity, self.free_list.tail_free(), required)?;

        // The current slot is re-uploaded right away; make sure the arena can hold it
        let live_bytes: u64 = self.shadows.values().map(|s| s.len() as u64).sum();
        let staging_needed = self.shadows.len() as u64 * super::STAGING_ALIGNMENT + live_bytes;
        let staging_free = ctx.staging.capacity() - ctx.staging.used();
        if staging_needed > staging_free {
            return Err(Error::StagingExhausted { requested: staging_needed, available: staging_free });
        }

        let new_buffers = create_buffers(&mut *ctx.device, self.buffers.len(), new_capacity, self.growths + 1)?;
        for old in std::mem::replace(&mut self.buffers, new_buffers) {
            ctx.retired.retire_buffer(old);
        }
        self.free_list.grow(new_capacity)?;
        self.growths += 1;
        ctx.stats.buffer_growths += 1;

        let mut offsets: Vec<u64> = self.shadows.keys().copied().collect();
        offsets.sort_unstable();
        for (index, stale) in self.stale.iter_mut().enumerate() {
            stale.clear();
            if index != slot {
                stale.extend(offsets.iter().copied());
            }
        }
        for offset in offsets {
            if let Some(shadow) = self.shadows.get(&offset) {
                ctx.upload(self.buffers[slot], offset, shadow)?;
            }
        }

        engine_info!(
            "sleeve::buffer",
            "Grew uniform ring {} -> {} bytes per slot",
            old_capacity, new_capacity
        );
        Ok(())
    }

    /// Buffer backing `slot`
    pub fn buffer(&self, slot: usize) -> BufferHandle {
        self.buffers[slot]
    }

    pub fn capacity(&self) -> u64 {
        self.free_list.capacity()
    }

    pub fn growths(&self) -> u32 {
        self.growths
    }

    pub fn stale_count(&self, slot: usize) -> usize {
        self.stale[slot].len()
    }

    pub fn live_regions(&self) -> usize {
        self.shadows.len()
    }

    pub fn free_list(&self) -> &FreeList {
        &self.free_list
    }

    pub fn destroy<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        for buffer in self.buffers.drain(..) {
            device.destroy_buffer(buffer);
        }
    }
}

fn create_buffers<D: GpuDevice + ?Sized>(
    device: &mut D,
    count: usize,
    capacity: u64,
    generation: u32,
) -> Result<Vec<BufferHandle>> {
    let mut buffers = Vec::with_capacity(count);
    for slot in 0..count {
        let desc = BufferDesc {
            name: format!("uniform_ring_{}_{}", generation, slot),
            size: capacity,
            usage: BufferKind::Uniform.usage(),
            location: MemoryLocation::DeviceLocal,
        };
        match device.create_buffer(&desc) {
            Ok(buffer) => buffers.push(buffer),
            Err(e) => {
                for buffer in buffers {
                    device.destroy_buffer(buffer);
                }
                return Err(e);
            }
        }
    }
    Ok(buffers)
}

#[cfg(test)]
#[path = "uniform_ring_tests.rs"]
mod tests;
