/// Frame slot: the per-frame resources reused every N frames
///
/// Created at startup and reused forever. A slot's resources may only be
/// touched again once both of its fences (graphics and transfer) report the
/// frame that last used it as complete.

use crate::buffer::StagingArena;
use crate::device::{CommandBufferHandle, FenceHandle, GpuDevice, QueueKind, SemaphoreHandle};
use crate::error::Result;
use super::retirement::RetirementQueue;

pub struct FrameSlot {
    pub index: usize,
    pub graphics_commands: CommandBufferHandle,
    pub transfer_commands: CommandBufferHandle,
    /// Signaled by acquire, waited by the graphics submit
    pub image_available: SemaphoreHandle,
    /// Signaled by the transfer submit, waited by the graphics submit
    pub transfer_complete: SemaphoreHandle,
    /// Signaled by the graphics submit, waited by present
    pub render_finished: SemaphoreHandle,
    pub in_flight: FenceHandle,
    pub transfer_fence: FenceHandle,
    pub staging: StagingArena,
    pub retired: RetirementQueue,
    /// Frame index last submitted from this slot
    pub submitted_frame: Option<u64>,
}

impl FrameSlot {
    pub fn new<D: GpuDevice + ?Sized>(device: &mut D, index: usize, staging_size: u64) -> Result<Self> {
        // Fences start signaled so the first wait on a fresh slot returns at once
        Ok(Self {
            index,
            graphics_commands: device.allocate_command_buffer(QueueKind::Graphics)?,
            transfer_commands: device.allocate_command_buffer(QueueKind::Transfer)?,
            image_available: device.create_semaphore()?,
            transfer_complete: device.create_semaphore()?,
            render_finished: device.create_semaphore()?,
            in_flight: device.create_fence(true)?,
            transfer_fence: device.create_fence(true)?,
            staging: StagingArena::new(device, index, staging_size)?,
            retired: RetirementQueue::new(),
            submitted_frame: None,
        })
    }

    pub fn fences(&self) -> [FenceHandle; 2] {
        [self.in_flight, self.transfer_fence]
    }

    /// Destroy the slot's own resources. Retired entries must be flushed first.
    pub fn destroy<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        self.staging.destroy(device);
        device.free_command_buffer(self.graphics_commands);
        device.free_command_buffer(self.transfer_commands);
        device.destroy_semaphore(self.image_available);
        device.destroy_semaphore(self.transfer_complete);
        device.destroy_semaphore(self.render_finished);
        device.destroy_fence(self.in_flight);
        device.destroy_fence(self.transfer_fence);
    }
}
