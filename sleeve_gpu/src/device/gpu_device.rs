/// GpuDevice trait: the downward interface of the suballocation layer
///
/// Everything above this trait (allocators, staging, descriptor pools, frame
/// pipeline) is backend-neutral. A backend implements buffer management,
/// synchronization primitives, command recording and submission, descriptor
/// pools and swapchain presentation.
///
/// All methods take `&mut self`: the frame pipeline drives the device from a
/// single submission thread.

use std::time::Duration;
use crate::error::Result;
use super::handles::*;
use super::types::*;

pub trait GpuDevice: Send {
    // ===== BUFFERS =====

    /// Create a buffer. Host-visible buffers are persistently mapped.
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle>;

    /// Destroy a buffer. The caller guarantees no pending GPU work references it.
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Write bytes through the persistent mapping of a host-visible buffer
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle>;

    fn destroy_fence(&mut self, fence: FenceHandle);

    /// Wait until every fence is signaled
    ///
    /// Returns `Error::Timeout` when `timeout` expires first.
    fn wait_fences(&mut self, fences: &[FenceHandle], timeout: Duration) -> Result<()>;

    fn reset_fences(&mut self, fences: &[FenceHandle]) -> Result<()>;

    /// Non-blocking fence query
    fn fence_status(&mut self, fence: FenceHandle) -> Result<bool>;

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle>;

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle);

    // ===== COMMANDS =====

    fn allocate_command_buffer(&mut self, queue: QueueKind) -> Result<CommandBufferHandle>;

    fn free_command_buffer(&mut self, command_buffer: CommandBufferHandle);

    fn reset_command_buffer(&mut self, command_buffer: CommandBufferHandle) -> Result<()>;

    /// Record copies and barriers, replacing the buffer's previous content
    fn record_transfer(
        &mut self,
        command_buffer: CommandBufferHandle,
        commands: &[TransferCommand],
    ) -> Result<()>;

    /// Record a render pass targeting swapchain image `image_index`
    fn record_graphics(
        &mut self,
        command_buffer: CommandBufferHandle,
        image_index: u32,
        commands: &[GraphicsCommand],
    ) -> Result<()>;

    fn submit(&mut self, queue: QueueKind, info: &SubmitInfo<'_>) -> Result<()>;

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&mut self, shape: PoolShape, max_sets: u32) -> Result<DescriptorPoolHandle>;

    /// Free every set allocated from the pool
    fn reset_descriptor_pool(&mut self, pool: DescriptorPoolHandle) -> Result<()>;

    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolHandle);

    /// Returns `Error::DescriptorPoolExhausted` when the pool is full
    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle>;

    fn write_descriptor_set(&mut self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()>;

    // ===== PRESENTATION =====

    /// Acquire the next presentable image, signaling `signal` when it is ready
    fn acquire_next_image(&mut self, signal: SemaphoreHandle, timeout: Duration) -> Result<AcquireOutcome>;

    /// Queue image `image_index` for presentation once `wait` is signaled
    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentOutcome>;

    /// Rebuild the swapchain and everything that depends on it
    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<()>;

    /// Current swapchain extent
    fn extent(&self) -> Extent2D;

    /// Block until the device is idle
    fn wait_idle(&mut self) -> Result<()>;
}
