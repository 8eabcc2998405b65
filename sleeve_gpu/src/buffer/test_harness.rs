/// Upload harness for buffer tests: a mock device plus one frame's worth of
/// staging, transfer batch and retirement queue.

use std::time::Duration;

use crate::device::mock_device::MockDevice;
use crate::device::{GpuDevice, QueueKind, SubmitInfo};
use crate::frame::{FrameStats, RetirementQueue, Retired, TransferBatch, UploadContext};
use super::StagingArena;

pub struct UploadHarness {
    pub device: MockDevice,
    pub staging: StagingArena,
    pub transfers: TransferBatch,
    pub retired: RetirementQueue,
    pub stats: FrameStats,
}

impl UploadHarness {
    pub fn new(staging_size: u64) -> Self {
        let mut device = MockDevice::new();
        let staging = StagingArena::new(&mut device, 0, staging_size).unwrap();
        Self {
            device,
            staging,
            transfers: TransferBatch::new(),
            retired: RetirementQueue::new(),
            stats: FrameStats::default(),
        }
    }

    pub fn ctx(&mut self) -> UploadContext<'_, MockDevice> {
        UploadContext {
            device: &mut self.device,
            staging: &mut self.staging,
            transfers: &mut self.transfers,
            retired: &mut self.retired,
            stats: &mut self.stats,
        }
    }

    /// Submit the recorded copies, wait for them and reset the arena
    pub fn flush(&mut self) {
        let commands = self.transfers.take();
        let cmd = self.device.allocate_command_buffer(QueueKind::Transfer).unwrap();
        self.device.record_transfer(cmd, &commands).unwrap();
        let fence = self.device.create_fence(false).unwrap();
        self.device
            .submit(
                QueueKind::Transfer,
                &SubmitInfo { command_buffers: &[cmd], wait: &[], signal: &[], fence: Some(fence) },
            )
            .unwrap();
        self.device.wait_fences(&[fence], Duration::from_secs(1)).unwrap();
        self.device.free_command_buffer(cmd);
        self.device.destroy_fence(fence);
        self.staging.reset();
    }

    /// Destroy retired buffers, returning the retired ranges
    pub fn reclaim(&mut self) -> Vec<Retired> {
        let mut ranges = Vec::new();
        for entry in self.retired.take() {
            match entry {
                Retired::Buffer(buffer) => self.device.destroy_buffer(buffer),
                range => ranges.push(range),
            }
        }
        ranges
    }
}
