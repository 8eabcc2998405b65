/// Upload context: everything an upload needs for the current frame
///
/// Borrowed from the frame pipeline for the duration of one acquire, update
/// or refresh: the device, the current slot's staging arena and retirement
/// queue, the frame's transfer batch and statistics.

use crate::buffer::StagingArena;
use crate::device::{BufferCopy, BufferHandle, GpuDevice};
use crate::error::Result;
use super::retirement::RetirementQueue;
use super::stats::FrameStats;
use super::transfer::TransferBatch;

/// Bytes already written into the staging arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedBytes {
    pub offset: u64,
    pub size: u64,
}

pub struct UploadContext<'a, D: GpuDevice + ?Sized> {
    pub device: &'a mut D,
    pub staging: &'a mut StagingArena,
    pub transfers: &'a mut TransferBatch,
    pub retired: &'a mut RetirementQueue,
    pub stats: &'a mut FrameStats,
}

impl<'a, D: GpuDevice + ?Sized> UploadContext<'a, D> {
    /// Copy `bytes` into the staging arena
    pub fn stage(&mut self, bytes: &[u8]) -> Result<StagedBytes> {
        let offset = self.staging.stage(&mut *self.device, bytes)?;
        self.stats.bytes_staged += bytes.len() as u64;
        Ok(StagedBytes { offset, size: bytes.len() as u64 })
    }

    /// Record a copy of staged bytes into `dst`
    pub fn copy_staged(&mut self, staged: StagedBytes, dst: BufferHandle, dst_offset: u64) {
        self.copy(BufferCopy {
            src: self.staging.buffer(),
            src_offset: staged.offset,
            dst,
            dst_offset,
            size: staged.size,
        });
    }

    /// Stage `bytes` and record their copy into `dst`
    pub fn upload(&mut self, dst: BufferHandle, dst_offset: u64, bytes: &[u8]) -> Result<()> {
        let staged = self.stage(bytes)?;
        self.copy_staged(staged, dst, dst_offset);
        Ok(())
    }

    /// Record a raw copy, tracking hazards
    pub fn copy(&mut self, copy: BufferCopy) {
        let barriers = self.transfers.barrier_count();
        self.transfers.copy(copy);
        self.stats.copies += 1;
        self.stats.barriers += self.transfers.barrier_count() - barriers;
    }
}
