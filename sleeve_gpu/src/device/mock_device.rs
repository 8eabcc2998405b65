/// Mock GpuDevice for unit tests (no GPU required)
///
/// Simulates device memory, a single in-order queue timeline shared by the
/// graphics and transfer queues, fences, descriptor pool capacity and a
/// swapchain. Submitted batches stay pending until a fence that covers them
/// is waited (or `complete_all` is called); only then are their copies
/// executed and their draws appended to `executed_graphics`.
///
/// The mock panics on misuse a real driver would turn into corruption:
/// destroying a buffer still referenced by pending work, writing host memory
/// that pending copies read, resetting a descriptor pool or command buffer
/// that is still in flight. Unsynchronized overlapping copies inside one
/// transfer recording are rejected with `Error::BackendError`.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{Error, Result};
use super::gpu_device::GpuDevice;
use super::handles::*;
use super::types::*;

/// Device calls observed by the mock, in call order
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    CreateBuffer { buffer: BufferHandle, size: u64 },
    DestroyBuffer(BufferHandle),
    WriteBuffer { buffer: BufferHandle, offset: u64, len: u64 },
    WaitFences(Vec<FenceHandle>),
    ResetFences(Vec<FenceHandle>),
    Submit {
        queue: QueueKind,
        fence: Option<FenceHandle>,
        wait: Vec<(SemaphoreHandle, WaitStage)>,
        signal: Vec<SemaphoreHandle>,
    },
    CreateDescriptorPool(DescriptorPoolHandle),
    ResetDescriptorPool(DescriptorPoolHandle),
    AcquireImage(u32),
    Present(u32),
    RecreateSwapchain(Extent2D),
    WaitIdle,
}

struct MockBuffer {
    desc: BufferDesc,
    data: Vec<u8>,
}

struct MockCommandBuffer {
    queue: QueueKind,
    transfer: Vec<TransferCommand>,
    graphics: Vec<GraphicsCommand>,
}

struct PendingBatch {
    command_buffers: Vec<CommandBufferHandle>,
    transfer: Vec<TransferCommand>,
    graphics: Vec<GraphicsCommand>,
    fence: Option<FenceHandle>,
}

struct MockPool {
    max_sets: u32,
    allocated: u32,
}

fn ranges_overlap(a_offset: u64, a_size: u64, b_offset: u64, b_size: u64) -> bool {
    a_offset < b_offset + b_size && b_offset < a_offset + a_size
}

pub struct MockDevice {
    next_id: u64,
    buffers: FxHashMap<BufferHandle, MockBuffer>,
    fences: FxHashMap<FenceHandle, bool>,
    semaphores: FxHashSet<SemaphoreHandle>,
    command_buffers: FxHashMap<CommandBufferHandle, MockCommandBuffer>,
    pools: FxHashMap<DescriptorPoolHandle, MockPool>,
    set_pools: FxHashMap<DescriptorSetHandle, DescriptorPoolHandle>,
    descriptor_writes: FxHashMap<DescriptorSetHandle, Vec<DescriptorWrite>>,
    pending: VecDeque<PendingBatch>,
    executed_graphics: Vec<GraphicsCommand>,
    events: Vec<MockEvent>,
    extent: Extent2D,
    image_count: u32,
    next_image: u32,
    out_of_date_acquires: u32,
    out_of_date_presents: u32,
    empty_surface_recreates: u32,
    swapchain_recreations: u32,
    hung: bool,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            buffers: FxHashMap::default(),
            fences: FxHashMap::default(),
            semaphores: FxHashSet::default(),
            command_buffers: FxHashMap::default(),
            pools: FxHashMap::default(),
            set_pools: FxHashMap::default(),
            descriptor_writes: FxHashMap::default(),
            pending: VecDeque::new(),
            executed_graphics: Vec::new(),
            events: Vec::new(),
            extent: Extent2D::new(800, 600),
            image_count: 3,
            next_image: 0,
            out_of_date_acquires: 0,
            out_of_date_presents: 0,
            empty_surface_recreates: 0,
            swapchain_recreations: 0,
            hung: false,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ===== TEST CONTROLS =====

    /// Make every wait on unsignaled work time out
    pub fn set_hung(&mut self, hung: bool) {
        self.hung = hung;
    }

    /// The next `count` acquires report an out-of-date swapchain
    pub fn inject_out_of_date_acquires(&mut self, count: u32) {
        self.out_of_date_acquires = count;
    }

    /// The next `count` presents report an out-of-date swapchain
    pub fn inject_out_of_date_presents(&mut self, count: u32) {
        self.out_of_date_presents = count;
    }

    /// The next `count` swapchain recreations find a zero-sized surface
    pub fn inject_empty_surface(&mut self, count: u32) {
        self.empty_surface_recreates = count;
    }

    /// Execute every pending batch
    pub fn complete_all(&mut self) {
        while let Some(batch) = self.pending.pop_front() {
            self.execute(batch);
        }
    }

    // ===== INSPECTION =====

    pub fn read_buffer(&self, buffer: BufferHandle, offset: u64, len: u64) -> Vec<u8> {
        let data = &self.buffers[&buffer].data;
        data[offset as usize..(offset + len) as usize].to_vec()
    }

    pub fn buffer_desc(&self, buffer: BufferHandle) -> Option<&BufferDesc> {
        self.buffers.get(&buffer).map(|b| &b.desc)
    }

    pub fn is_buffer_alive(&self, buffer: BufferHandle) -> bool {
        self.buffers.contains_key(&buffer)
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_fence_count(&self) -> usize {
        self.fences.len()
    }

    pub fn live_semaphore_count(&self) -> usize {
        self.semaphores.len()
    }

    pub fn live_command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    pub fn live_pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn pending_batch_count(&self) -> usize {
        self.pending.len()
    }

    pub fn fence_signaled(&self, fence: FenceHandle) -> bool {
        self.fences.get(&fence).copied().unwrap_or(false)
    }

    pub fn events(&self) -> &[MockEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Graphics commands of every completed batch, in execution order
    pub fn executed_graphics(&self) -> &[GraphicsCommand] {
        &self.executed_graphics
    }

    pub fn descriptor_writes(&self, set: DescriptorSetHandle) -> &[DescriptorWrite] {
        self.descriptor_writes.get(&set).map(|w| w.as_slice()).unwrap_or(&[])
    }

    pub fn swapchain_recreations(&self) -> u32 {
        self.swapchain_recreations
    }

    // ===== SIMULATION =====

    fn execute(&mut self, batch: PendingBatch) {
        for command in &batch.transfer {
            if let TransferCommand::Copy(copy) = command {
                let src = &self.buffers[&copy.src].data;
                let bytes = src[copy.src_offset as usize..(copy.src_offset + copy.size) as usize].to_vec();
                let dst = &mut self
                    .buffers
                    .get_mut(&copy.dst)
                    .unwrap_or_else(|| panic!("copy into destroyed buffer {:?}", copy.dst))
                    .data;
                dst[copy.dst_offset as usize..(copy.dst_offset + copy.size) as usize].copy_from_slice(&bytes);
            }
        }
        self.executed_graphics.extend(batch.graphics);
        if let Some(fence) = batch.fence {
            self.fences.insert(fence, true);
        }
    }

    fn set_buffers(&self, set: DescriptorSetHandle) -> impl Iterator<Item = BufferHandle> + '_ {
        self.descriptor_writes(set).iter().filter_map(|w| match w {
            DescriptorWrite::UniformBuffer { buffer, .. } => Some(*buffer),
            DescriptorWrite::Texture { .. } => None,
        })
    }

    fn batch_references_buffer(&self, batch: &PendingBatch, buffer: BufferHandle) -> bool {
        let in_transfer = batch.transfer.iter().any(|c| match c {
            TransferCommand::Copy(copy) => copy.src == buffer || copy.dst == buffer,
            TransferCommand::Barrier => false,
        });
        let in_graphics = batch.graphics.iter().any(|g| match g {
            GraphicsCommand::BindVertexBuffer { buffer: b, .. } => *b == buffer,
            GraphicsCommand::BindIndexBuffer { buffer: b, .. } => *b == buffer,
            GraphicsCommand::BindDescriptorSet { set, .. } => self.set_buffers(*set).any(|b| b == buffer),
            _ => false,
        });
        in_transfer || in_graphics
    }

    fn pending_reads_range(&self, buffer: BufferHandle, offset: u64, len: u64) -> bool {
        self.pending.iter().any(|batch| {
            batch.transfer.iter().any(|c| match c {
                TransferCommand::Copy(copy) => {
                    copy.src == buffer && ranges_overlap(copy.src_offset, copy.size, offset, len)
                }
                TransferCommand::Barrier => false,
            })
        })
    }

    fn is_command_buffer_pending(&self, command_buffer: CommandBufferHandle) -> bool {
        self.pending.iter().any(|b| b.command_buffers.contains(&command_buffer))
    }

    fn check_copy_bounds(&self, copy: &BufferCopy) -> Result<()> {
        let src = self.buffers.get(&copy.src).ok_or_else(|| {
            Error::BackendError(format!("copy source {:?} does not exist", copy.src))
        })?;
        let dst = self.buffers.get(&copy.dst).ok_or_else(|| {
            Error::BackendError(format!("copy destination {:?} does not exist", copy.dst))
        })?;
        if copy.size == 0
            || copy.src_offset + copy.size > src.desc.size
            || copy.dst_offset + copy.size > dst.desc.size
        {
            return Err(Error::BackendError(format!("copy out of bounds: {:?}", copy)));
        }
        Ok(())
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for MockDevice {
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("zero-sized buffer".to_string()));
        }
        let buffer = BufferHandle::from_raw(self.next_id());
        self.buffers.insert(
            buffer,
            MockBuffer { desc: desc.clone(), data: vec![0; desc.size as usize] },
        );
        self.events.push(MockEvent::CreateBuffer { buffer, size: desc.size });
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.pending.iter().any(|b| self.batch_references_buffer(b, buffer)) {
            panic!("buffer {:?} destroyed while pending GPU work references it", buffer);
        }
        self.buffers.remove(&buffer);
        self.events.push(MockEvent::DestroyBuffer(buffer));
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let len = data.len() as u64;
        if self.pending_reads_range(buffer, offset, len) {
            panic!(
                "host write to {:?} [{}, {}) while pending GPU work reads it",
                buffer, offset, offset + len
            );
        }
        let target = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| Error::InvalidResource(format!("buffer {:?} does not exist", buffer)))?;
        if target.desc.location != MemoryLocation::HostVisible {
            return Err(Error::InvalidResource("buffer is not host visible".to_string()));
        }
        if offset + len > target.desc.size {
            return Err(Error::InvalidResource("write out of bounds".to_string()));
        }
        target.data[offset as usize..(offset + len) as usize].copy_from_slice(data);
        self.events.push(MockEvent::WriteBuffer { buffer, offset, len });
        Ok(())
    }

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle> {
        let fence = FenceHandle::from_raw(self.next_id());
        self.fences.insert(fence, signaled);
        Ok(fence)
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        if self.pending.iter().any(|b| b.fence == Some(fence)) {
            panic!("fence {:?} destroyed while pending", fence);
        }
        self.fences.remove(&fence);
    }

    fn wait_fences(&mut self, fences: &[FenceHandle], _timeout: Duration) -> Result<()> {
        self.events.push(MockEvent::WaitFences(fences.to_vec()));
        for &fence in fences {
            match self.fences.get(&fence).copied() {
                None => return Err(Error::InvalidResource(format!("fence {:?} does not exist", fence))),
                Some(true) => continue,
                Some(false) => {}
            }
            if self.hung {
                return Err(Error::Timeout);
            }
            match self.pending.iter().rposition(|b| b.fence == Some(fence)) {
                Some(index) => {
                    for _ in 0..=index {
                        if let Some(batch) = self.pending.pop_front() {
                            self.execute(batch);
                        }
                    }
                }
                // Nothing will ever signal it
                None => return Err(Error::Timeout),
            }
        }
        Ok(())
    }

    fn reset_fences(&mut self, fences: &[FenceHandle]) -> Result<()> {
        for fence in fences {
            if self.pending.iter().any(|b| b.fence == Some(*fence)) {
                panic!("fence {:?} reset while pending", fence);
            }
            let state = self
                .fences
                .get_mut(fence)
                .ok_or_else(|| Error::InvalidResource(format!("fence {:?} does not exist", fence)))?;
            *state = false;
        }
        self.events.push(MockEvent::ResetFences(fences.to_vec()));
        Ok(())
    }

    fn fence_status(&mut self, fence: FenceHandle) -> Result<bool> {
        self.fences
            .get(&fence)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("fence {:?} does not exist", fence)))
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle> {
        let semaphore = SemaphoreHandle::from_raw(self.next_id());
        self.semaphores.insert(semaphore);
        Ok(semaphore)
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        self.semaphores.remove(&semaphore);
    }

    fn allocate_command_buffer(&mut self, queue: QueueKind) -> Result<CommandBufferHandle> {
        let command_buffer = CommandBufferHandle::from_raw(self.next_id());
        self.command_buffers.insert(
            command_buffer,
            MockCommandBuffer { queue, transfer: Vec::new(), graphics: Vec::new() },
        );
        Ok(command_buffer)
    }

    fn free_command_buffer(&mut self, command_buffer: CommandBufferHandle) {
        if self.is_command_buffer_pending(command_buffer) {
            panic!("command buffer {:?} freed while pending", command_buffer);
        }
        self.command_buffers.remove(&command_buffer);
    }

    fn reset_command_buffer(&mut self, command_buffer: CommandBufferHandle) -> Result<()> {
        if self.is_command_buffer_pending(command_buffer) {
            panic!("command buffer {:?} reset while pending", command_buffer);
        }
        let cmd = self
            .command_buffers
            .get_mut(&command_buffer)
            .ok_or_else(|| Error::InvalidResource("unknown command buffer".to_string()))?;
        cmd.transfer.clear();
        cmd.graphics.clear();
        Ok(())
    }

    fn record_transfer(
        &mut self,
        command_buffer: CommandBufferHandle,
        commands: &[TransferCommand],
    ) -> Result<()> {
        if self.is_command_buffer_pending(command_buffer) {
            panic!("command buffer {:?} recorded while pending", command_buffer);
        }
        let mut written: Vec<(BufferHandle, u64, u64)> = Vec::new();
        let mut read: Vec<(BufferHandle, u64, u64)> = Vec::new();
        for command in commands {
            match command {
                TransferCommand::Barrier => {
                    written.clear();
                    read.clear();
                }
                TransferCommand::Copy(copy) => {
                    self.check_copy_bounds(copy)?;
                    let hazard = written.iter().any(|&(b, o, s)| {
                        (b == copy.src && ranges_overlap(o, s, copy.src_offset, copy.size))
                            || (b == copy.dst && ranges_overlap(o, s, copy.dst_offset, copy.size))
                    }) || read.iter().any(|&(b, o, s)| {
                        b == copy.dst && ranges_overlap(o, s, copy.dst_offset, copy.size)
                    });
                    if hazard {
                        return Err(Error::BackendError(format!(
                            "unsynchronized transfer hazard: {:?}",
                            copy
                        )));
                    }
                    read.push((copy.src, copy.src_offset, copy.size));
                    written.push((copy.dst, copy.dst_offset, copy.size));
                }
            }
        }
        let cmd = self
            .command_buffers
            .get_mut(&command_buffer)
            .ok_or_else(|| Error::InvalidResource("unknown command buffer".to_string()))?;
        if cmd.queue != QueueKind::Transfer {
            return Err(Error::InvalidResource("transfer commands on a graphics command buffer".to_string()));
        }
        cmd.transfer = commands.to_vec();
        Ok(())
    }

    fn record_graphics(
        &mut self,
        command_buffer: CommandBufferHandle,
        image_index: u32,
        commands: &[GraphicsCommand],
    ) -> Result<()> {
        if self.is_command_buffer_pending(command_buffer) {
            panic!("command buffer {:?} recorded while pending", command_buffer);
        }
        if image_index >= self.image_count {
            return Err(Error::InvalidResource(format!("image index {} out of range", image_index)));
        }
        let well_formed = matches!(commands.first(), Some(GraphicsCommand::BeginRenderPass { .. }))
            && matches!(commands.last(), Some(GraphicsCommand::EndRenderPass));
        if !well_formed {
            return Err(Error::BackendError("graphics commands outside a render pass".to_string()));
        }
        for command in commands {
            match command {
                GraphicsCommand::BindVertexBuffer { buffer, .. }
                | GraphicsCommand::BindIndexBuffer { buffer, .. } => {
                    if !self.buffers.contains_key(buffer) {
                        return Err(Error::BackendError(format!("bound buffer {:?} does not exist", buffer)));
                    }
                }
                GraphicsCommand::BindDescriptorSet { set, .. } => {
                    if !self.set_pools.contains_key(set) {
                        return Err(Error::BackendError(format!("descriptor set {:?} is not live", set)));
                    }
                }
                _ => {}
            }
        }
        let cmd = self
            .command_buffers
            .get_mut(&command_buffer)
            .ok_or_else(|| Error::InvalidResource("unknown command buffer".to_string()))?;
        if cmd.queue != QueueKind::Graphics {
            return Err(Error::InvalidResource("graphics commands on a transfer command buffer".to_string()));
        }
        cmd.graphics = commands.to_vec();
        Ok(())
    }

    fn submit(&mut self, queue: QueueKind, info: &SubmitInfo<'_>) -> Result<()> {
        let mut batch = PendingBatch {
            command_buffers: info.command_buffers.to_vec(),
            transfer: Vec::new(),
            graphics: Vec::new(),
            fence: info.fence,
        };
        for handle in info.command_buffers {
            if self.is_command_buffer_pending(*handle) {
                panic!("command buffer {:?} submitted twice", handle);
            }
            let cmd = self
                .command_buffers
                .get(handle)
                .ok_or_else(|| Error::InvalidResource("unknown command buffer".to_string()))?;
            if cmd.queue != queue {
                return Err(Error::InvalidResource("command buffer submitted to the wrong queue".to_string()));
            }
            batch.transfer.extend_from_slice(&cmd.transfer);
            batch.graphics.extend_from_slice(&cmd.graphics);
        }
        for (semaphore, _) in info.wait {
            if !self.semaphores.contains(semaphore) {
                return Err(Error::InvalidResource("wait on unknown semaphore".to_string()));
            }
        }
        if let Some(fence) = info.fence {
            if self.fences.get(&fence) != Some(&false) {
                return Err(Error::InvalidResource("submit with a signaled or unknown fence".to_string()));
            }
        }
        self.events.push(MockEvent::Submit {
            queue,
            fence: info.fence,
            wait: info.wait.to_vec(),
            signal: info.signal.to_vec(),
        });
        self.pending.push_back(batch);
        Ok(())
    }

    fn create_descriptor_pool(&mut self, _shape: PoolShape, max_sets: u32) -> Result<DescriptorPoolHandle> {
        let pool = DescriptorPoolHandle::from_raw(self.next_id());
        self.pools.insert(pool, MockPool { max_sets, allocated: 0 });
        self.events.push(MockEvent::CreateDescriptorPool(pool));
        Ok(pool)
    }

    fn reset_descriptor_pool(&mut self, pool: DescriptorPoolHandle) -> Result<()> {
        let in_flight = self.pending.iter().any(|batch| {
            batch.graphics.iter().any(|g| match g {
                GraphicsCommand::BindDescriptorSet { set, .. } => self.set_pools.get(set) == Some(&pool),
                _ => false,
            })
        });
        if in_flight {
            panic!("descriptor pool {:?} reset while its sets are in flight", pool);
        }
        let state = self
            .pools
            .get_mut(&pool)
            .ok_or_else(|| Error::InvalidResource("unknown descriptor pool".to_string()))?;
        state.allocated = 0;
        let freed: Vec<DescriptorSetHandle> = self
            .set_pools
            .iter()
            .filter(|(_, p)| **p == pool)
            .map(|(s, _)| *s)
            .collect();
        for set in freed {
            self.set_pools.remove(&set);
            self.descriptor_writes.remove(&set);
        }
        self.events.push(MockEvent::ResetDescriptorPool(pool));
        Ok(())
    }

    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolHandle) {
        self.set_pools.retain(|_, p| *p != pool);
        self.pools.remove(&pool);
    }

    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        _layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let state = self
            .pools
            .get_mut(&pool)
            .ok_or_else(|| Error::InvalidResource("unknown descriptor pool".to_string()))?;
        if state.allocated >= state.max_sets {
            return Err(Error::DescriptorPoolExhausted);
        }
        state.allocated += 1;
        let set = DescriptorSetHandle::from_raw(self.next_id());
        self.set_pools.insert(set, pool);
        Ok(set)
    }

    fn write_descriptor_set(&mut self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()> {
        if !self.set_pools.contains_key(&set) {
            return Err(Error::InvalidResource("write to a freed descriptor set".to_string()));
        }
        for write in writes {
            if let DescriptorWrite::UniformBuffer { buffer, offset, range, .. } = write {
                let desc = &self
                    .buffers
                    .get(buffer)
                    .ok_or_else(|| Error::InvalidResource("descriptor references a dead buffer".to_string()))?
                    .desc;
                if offset + range > desc.size {
                    return Err(Error::InvalidResource("descriptor range out of bounds".to_string()));
                }
            }
        }
        self.descriptor_writes.insert(set, writes.to_vec());
        Ok(())
    }

    fn acquire_next_image(&mut self, _signal: SemaphoreHandle, _timeout: Duration) -> Result<AcquireOutcome> {
        if self.out_of_date_acquires > 0 {
            self.out_of_date_acquires -= 1;
            return Ok(AcquireOutcome::OutOfDate);
        }
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        self.events.push(MockEvent::AcquireImage(index));
        Ok(AcquireOutcome::Image { index, suboptimal: false })
    }

    fn present(&mut self, image_index: u32, _wait: SemaphoreHandle) -> Result<PresentOutcome> {
        self.events.push(MockEvent::Present(image_index));
        if self.out_of_date_presents > 0 {
            self.out_of_date_presents -= 1;
            return Ok(PresentOutcome::OutOfDate);
        }
        Ok(PresentOutcome::Presented)
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        if self.empty_surface_recreates > 0 {
            self.empty_surface_recreates -= 1;
            return Err(Error::SwapchainOutOfDate);
        }
        self.extent = Extent2D::new(width, height);
        self.swapchain_recreations += 1;
        self.events.push(MockEvent::RecreateSwapchain(self.extent));
        Ok(())
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.events.push(MockEvent::WaitIdle);
        if self.hung && !self.pending.is_empty() {
            return Err(Error::Timeout);
        }
        self.complete_all();
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_device_tests.rs"]
mod tests;
