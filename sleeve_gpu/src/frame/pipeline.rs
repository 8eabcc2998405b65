/// Frame pipeline controller
///
/// Owns the device, the frame slots, the shared vertex and index buffers,
/// the uniform ring, the region table, the dedicated buffers and the
/// descriptor pools. Game code holds only bindings and drives everything
/// through one `&mut FramePipeline`.
///
/// Per frame:
/// 1. `begin_frame` waits (bounded) for the slot's graphics and transfer
///    fences, flushes the slot's retirement queue, acquires a swapchain image
///    (out of date: recreate and skip the frame), then resets the fences,
///    command buffers, staging arena and descriptor pools of the slot.
/// 2. acquire / update / draw / return calls record copies into the frame's
///    transfer batch and draws into its graphics command list.
/// 3. `end_frame` submits the copies on the transfer queue, then the draws on
///    the graphics queue waiting for both the image and the copies, presents,
///    recreates the swapchain when needed and advances to the next slot.

use slotmap::SlotMap;

use crate::buffer::binding::Region;
use crate::buffer::dedicated::{dedicated_desc, DedicatedBuffer};
use crate::buffer::{
    Binding, BufferKind, DedicatedBinding, DedicatedKey, IndexBufferBinding, RegionInfo, RegionKey, SharedBuffer,
    UniformBufferBinding, UniformRing, VertexBufferBinding,
};
use crate::config::GpuConfig;
use crate::descriptor::DescriptorManager;
use crate::device::{
    AcquireOutcome, BufferCopy, BufferHandle, DescriptorSetLayoutHandle, DescriptorWrite, Extent2D, GpuDevice,
    GraphicsCommand, PipelineHandle, PoolShape, QueueKind, SubmitInfo, TextureHandle, WaitStage,
};
use crate::error::{Error, Result};
use crate::{engine_debug, engine_error, engine_info, engine_warn};
use super::frame_slot::FrameSlot;
use super::retirement::Retired;
use super::stats::FrameStats;
use super::transfer::TransferBatch;
use super::upload::UploadContext;

/// Offset alignment of vertex and index regions
pub const GEOMETRY_ALIGNMENT: u64 = 4;

/// A graphics pipeline together with the descriptor layout its draws use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderPipeline {
    pub pipeline: PipelineHandle,
    pub set_layout: DescriptorSetLayoutHandle,
    pub shape: PoolShape,
}

/// Result of `begin_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginFrame {
    /// Recording into swapchain image `image_index`
    Recording { image_index: u32 },
    /// The swapchain was out of date and has been recreated; record nothing
    Skipped,
}

struct ActiveFrame {
    image_index: u32,
    suboptimal: bool,
    transfers: TransferBatch,
    commands: Vec<GraphicsCommand>,
    pipeline: Option<ShaderPipeline>,
}

fn no_frame() -> Error {
    Error::InvalidResource("no frame is being recorded".to_string())
}

fn upload_context<'a, D: GpuDevice>(
    device: &'a mut D,
    slot: &'a mut FrameSlot,
    frame: &'a mut ActiveFrame,
    stats: &'a mut FrameStats,
) -> UploadContext<'a, D> {
    UploadContext {
        device,
        staging: &mut slot.staging,
        transfers: &mut frame.transfers,
        retired: &mut slot.retired,
        stats,
    }
}

fn element_count(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::InvalidResource(format!("{} elements exceed u32", len)))
}

fn dedicated_entry(
    table: &SlotMap<DedicatedKey, DedicatedBuffer>,
    binding: &DedicatedBinding,
    kind: BufferKind,
) -> Result<DedicatedBuffer> {
    let entry = *table.get(binding.key()).ok_or(Error::StaleBinding)?;
    if entry.kind != kind {
        return Err(Error::InvalidResource(format!(
            "expected a dedicated {} buffer, got {}",
            kind.name(),
            entry.kind.name()
        )));
    }
    Ok(entry)
}

pub struct FramePipeline<D: GpuDevice> {
    device: D,
    config: GpuConfig,
    slots: Vec<FrameSlot>,
    current_slot: usize,
    frame_index: u64,
    vertices: SharedBuffer,
    indices: SharedBuffer,
    uniforms: UniformRing,
    regions: SlotMap<RegionKey, Region>,
    dedicated: SlotMap<DedicatedKey, DedicatedBuffer>,
    descriptors: DescriptorManager,
    frame: Option<ActiveFrame>,
    resize_pending: Option<Extent2D>,
    stats: FrameStats,
    last_stats: FrameStats,
    shut_down: bool,
}

impl<D: GpuDevice> FramePipeline<D> {
    /// Create frame slots, shared buffers and the uniform ring on `device`
    pub fn new(mut device: D, config: GpuConfig) -> Result<Self> {
        config.validate()?;

        let frames = config.frames_in_flight;
        let mut slots = Vec::with_capacity(frames);
        for index in 0..frames {
            slots.push(FrameSlot::new(&mut device, index, config.staging_buffer_size)?);
        }
        let vertices = SharedBuffer::new(
            &mut device,
            BufferKind::Vertex,
            config.vertex_buffer_size,
            GEOMETRY_ALIGNMENT,
            config.vertex_stride,
        )?;
        let indices = SharedBuffer::new(
            &mut device,
            BufferKind::Index,
            config.index_buffer_size,
            GEOMETRY_ALIGNMENT,
            config.index_type.size_bytes() as u32,
        )?;
        let uniforms = UniformRing::new(&mut device, frames, config.uniform_buffer_size, config.uniform_alignment)?;
        let descriptors = DescriptorManager::new(frames, config.max_descriptor_sets_per_pool);

        engine_info!(
            "sleeve::pipeline",
            "Frame pipeline ready: {} frames in flight, {} MB staging per slot",
            frames,
            config.staging_buffer_size / 1_000_000
        );

        Ok(Self {
            device,
            config,
            slots,
            current_slot: 0,
            frame_index: 0,
            vertices,
            indices,
            uniforms,
            regions: SlotMap::with_key(),
            dedicated: SlotMap::with_key(),
            descriptors,
            frame: None,
            resize_pending: None,
            stats: FrameStats::default(),
            last_stats: FrameStats::default(),
            shut_down: false,
        })
    }

    // ===== FRAME LIFECYCLE =====

    /// Start recording the next frame
    pub fn begin_frame(&mut self) -> Result<BeginFrame> {
        if self.shut_down {
            return Err(Error::InvalidResource("frame pipeline is shut down".to_string()));
        }
        if self.frame.is_some() {
            return Err(Error::InvalidResource("begin_frame called while a frame is being recorded".to_string()));
        }

        self.stats = FrameStats { frame_index: self.frame_index, ..FrameStats::default() };
        let slot_index = self.current_slot;
        let timeout = self.config.fence_timeout;
        let fences = self.slots[slot_index].fences();

        if let Err(e) = self.device.wait_fences(&fences, timeout) {
            engine_error!("sleeve::pipeline", "Waiting for frame slot {} failed: {}", slot_index, e);
            return Err(e);
        }
        self.reclaim_slot(slot_index)?;

        let image_available = self.slots[slot_index].image_available;
        let (image_index, suboptimal) = match self.device.acquire_next_image(image_available, timeout)? {
            AcquireOutcome::Image { index, suboptimal } => (index, suboptimal),
            AcquireOutcome::OutOfDate => {
                // Fences stay signaled: nothing was submitted for this slot
                engine_warn!("sleeve::pipeline", "Swapchain out of date on acquire, recreating");
                self.recreate_swapchain()?;
                return Ok(BeginFrame::Skipped);
            }
        };

        self.device.reset_fences(&fences)?;
        let slot = &mut self.slots[slot_index];
        self.device.reset_command_buffer(slot.graphics_commands)?;
        self.device.reset_command_buffer(slot.transfer_commands)?;
        slot.staging.reset();
        self.descriptors.reset_slot(&mut self.device, slot_index)?;

        let extent = self.device.extent();
        let mut frame = ActiveFrame {
            image_index,
            suboptimal,
            transfers: TransferBatch::new(),
            commands: vec![
                GraphicsCommand::BeginRenderPass { clear_color: self.config.clear_color },
                GraphicsCommand::SetViewport(extent),
            ],
            pipeline: None,
        };

        let refreshed = {
            let mut ctx = upload_context(&mut self.device, &mut self.slots[slot_index], &mut frame, &mut self.stats);
            self.uniforms.refresh_slot(slot_index, &mut ctx)?
        };
        if refreshed > 0 {
            engine_debug!("sleeve::pipeline", "Refreshed {} uniform regions in slot {}", refreshed, slot_index);
        }

        self.frame = Some(frame);
        Ok(BeginFrame::Recording { image_index })
    }

    /// Submit the recorded frame, present it and advance to the next slot
    pub fn end_frame(&mut self) -> Result<()> {
        let mut frame = self.frame.take().ok_or_else(no_frame)?;
        let slot_index = self.current_slot;
        let slot = &self.slots[slot_index];
        let transfer_commands = slot.transfer_commands;
        let graphics_commands = slot.graphics_commands;
        let image_available = slot.image_available;
        let transfer_complete = slot.transfer_complete;
        let render_finished = slot.render_finished;
        let in_flight = slot.in_flight;
        let transfer_fence = slot.transfer_fence;

        let copies = frame.transfers.take();
        self.device.record_transfer(transfer_commands, &copies)?;
        self.device.submit(
            QueueKind::Transfer,
            &SubmitInfo {
                command_buffers: &[transfer_commands],
                wait: &[],
                signal: &[transfer_complete],
                fence: Some(transfer_fence),
            },
        )?;

        frame.commands.push(GraphicsCommand::EndRenderPass);
        self.device.record_graphics(graphics_commands, frame.image_index, &frame.commands)?;
        self.device.submit(
            QueueKind::Graphics,
            &SubmitInfo {
                command_buffers: &[graphics_commands],
                wait: &[
                    (image_available, WaitStage::ColorAttachmentOutput),
                    (transfer_complete, WaitStage::VertexInput),
                ],
                signal: &[render_finished],
                fence: Some(in_flight),
            },
        )?;
        self.slots[slot_index].submitted_frame = Some(self.frame_index);

        let presented = self.device.present(frame.image_index, render_finished)?;
        if presented.needs_recreate() || frame.suboptimal || self.resize_pending.is_some() {
            engine_warn!("sleeve::pipeline", "Recreating swapchain after present ({:?})", presented);
            self.recreate_swapchain()?;
        }

        let next_slot = (slot_index + 1) % self.slots.len();
        self.reclaim_if_complete(next_slot)?;

        self.last_stats = self.stats;
        self.frame_index += 1;
        self.current_slot = next_slot;
        Ok(())
    }

    /// Force swapchain recreation at the next present
    pub fn notify_resized(&mut self, width: u32, height: u32) {
        self.resize_pending = Some(Extent2D::new(width, height));
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        let extent = self.resize_pending.unwrap_or_else(|| self.device.extent());
        if extent.is_empty() {
            // Minimized: keep the request until the surface has a size again
            engine_debug!("sleeve::pipeline", "Skipping swapchain recreation for empty extent");
            return Ok(());
        }
        self.device.wait_idle()?;
        match self.device.recreate_swapchain(extent.width, extent.height) {
            Ok(()) => {}
            Err(Error::SwapchainOutOfDate) => {
                // The surface itself is still empty; retry at the next present
                engine_debug!("sleeve::pipeline", "Surface not ready, swapchain recreation deferred");
                self.resize_pending = Some(extent);
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        self.resize_pending = None;
        self.stats.swapchain_recreations += 1;
        engine_info!("sleeve::pipeline", "Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(())
    }

    // ===== RECLAMATION =====

    /// Flush a slot's retirement queue. The slot's fences must be signaled.
    ///
    /// Every entry is processed even when a release fails; the first error
    /// is returned afterwards.
    fn reclaim_slot(&mut self, slot_index: usize) -> Result<()> {
        let mut first_error = None;
        for entry in self.slots[slot_index].retired.take() {
            let reclaimed = match entry {
                Retired::Buffer(buffer) => {
                    self.device.destroy_buffer(buffer);
                    Ok(())
                }
                Retired::Range { kind, offset, size } => match kind {
                    BufferKind::Vertex => self.vertices.release(offset, size),
                    BufferKind::Index => self.indices.release(offset, size),
                    BufferKind::Uniform => self.uniforms.release(offset, size),
                },
            };
            match reclaimed {
                Ok(()) => self.stats.reclaimed += 1,
                Err(e) => {
                    engine_error!("sleeve::pipeline", "Reclaiming slot {} entry failed: {}", slot_index, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Flush a slot's retirement queue early if its fences already signaled
    fn reclaim_if_complete(&mut self, slot_index: usize) -> Result<()> {
        if self.slots[slot_index].retired.is_empty() {
            return Ok(());
        }
        let [in_flight, transfer] = self.slots[slot_index].fences();
        if self.device.fence_status(in_flight)? && self.device.fence_status(transfer)? {
            self.reclaim_slot(slot_index)?;
        }
        Ok(())
    }

    /// Wait for every submitted frame and flush all retirement queues
    pub fn wait_for_cleanup(&mut self) -> Result<()> {
        if self.frame.is_some() {
            return Err(Error::InvalidResource("wait_for_cleanup called while recording".to_string()));
        }
        let timeout = self.config.fence_timeout;
        for index in 0..self.slots.len() {
            let fences = self.slots[index].fences();
            self.device.wait_fences(&fences, timeout)?;
        }
        self.device.wait_idle()?;
        for index in 0..self.slots.len() {
            self.reclaim_slot(index)?;
        }
        Ok(())
    }

    /// Wait for the GPU and destroy every resource owned by the pipeline
    ///
    /// A frame still being recorded is abandoned. Called automatically on drop.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        let abandoned = self.frame.take().map(|_| self.current_slot);
        if abandoned.is_some() {
            engine_warn!("sleeve::pipeline", "Shutting down with an unsubmitted frame");
        }

        let timeout = self.config.fence_timeout;
        for index in 0..self.slots.len() {
            if Some(index) == abandoned {
                continue;
            }
            let fences = self.slots[index].fences();
            self.device.wait_fences(&fences, timeout)?;
        }
        self.device.wait_idle()?;
        self.shut_down = true;

        for slot in &mut self.slots {
            for entry in slot.retired.take() {
                if let Retired::Buffer(buffer) = entry {
                    self.device.destroy_buffer(buffer);
                }
            }
        }
        for (_, dedicated) in self.dedicated.drain() {
            self.device.destroy_buffer(dedicated.buffer);
        }
        self.regions.clear();
        self.descriptors.destroy(&mut self.device);
        self.vertices.destroy(&mut self.device);
        self.indices.destroy(&mut self.device);
        self.uniforms.destroy(&mut self.device);
        for slot in &mut self.slots {
            slot.destroy(&mut self.device);
        }

        engine_info!("sleeve::pipeline", "Frame pipeline shut down after {} frames", self.frame_index);
        Ok(())
    }

    // ===== REGIONS =====

    /// Reject element counts that would make a draw read past `len` bytes
    fn check_element_count(&self, kind: BufferKind, len: usize, element_count: u32) -> Result<()> {
        let stride = match kind {
            BufferKind::Vertex => u64::from(self.vertices.stride()),
            BufferKind::Index => u64::from(self.indices.stride()),
            BufferKind::Uniform => return Ok(()),
        };
        let required = u64::from(element_count) * stride;
        if required > len as u64 {
            return Err(Error::InvalidResource(format!(
                "{} {} elements of {} bytes need {} bytes, got {}",
                element_count,
                kind.name(),
                stride,
                required,
                len
            )));
        }
        Ok(())
    }

    /// Allocate a region of `kind` holding `bytes` and upload them this frame
    ///
    /// `element_count` elements of the configured vertex stride or index size
    /// must fit in `bytes`.
    pub fn acquire_region(&mut self, kind: BufferKind, bytes: &[u8], element_count: u32) -> Result<Binding> {
        if bytes.is_empty() {
            return Err(Error::InvalidResource("cannot acquire an empty region".to_string()));
        }
        self.check_element_count(kind, bytes.len(), element_count)?;
        let slot_index = self.current_slot;
        let frame = self.frame.as_mut().ok_or_else(no_frame)?;
        let mut ctx = upload_context(&mut self.device, &mut self.slots[slot_index], frame, &mut self.stats);

        let (offset, size) = match kind {
            BufferKind::Vertex => self.vertices.acquire(bytes, &mut ctx)?,
            BufferKind::Index => self.indices.acquire(bytes, &mut ctx)?,
            BufferKind::Uniform => self.uniforms.acquire(bytes, slot_index, &mut ctx)?,
        };
        let key = self.regions.insert(Region {
            kind,
            offset,
            size,
            element_count,
            last_read_frame: None,
        });
        Ok(Binding::new(key, kind, element_count))
    }

    /// Acquire a vertex region; the vertex size must match the configured stride
    pub fn acquire_vertices<T: bytemuck::Pod>(&mut self, vertices: &[T]) -> Result<VertexBufferBinding> {
        self.check_vertex_type::<T>()?;
        let count = element_count(vertices.len())?;
        let binding = self.acquire_region(BufferKind::Vertex, bytemuck::cast_slice(vertices), count)?;
        VertexBufferBinding::try_from(binding)
    }

    /// Acquire an index region; the element type must match the configured index type
    pub fn acquire_indices<T: bytemuck::Pod>(&mut self, indices: &[T]) -> Result<IndexBufferBinding> {
        self.check_index_type::<T>()?;
        let count = element_count(indices.len())?;
        let binding = self.acquire_region(BufferKind::Index, bytemuck::cast_slice(indices), count)?;
        IndexBufferBinding::try_from(binding)
    }

    fn check_vertex_type<T>(&self) -> Result<()> {
        if std::mem::size_of::<T>() != self.config.vertex_stride as usize {
            return Err(Error::InvalidResource(format!(
                "vertex of {} bytes does not match stride {}",
                std::mem::size_of::<T>(),
                self.config.vertex_stride
            )));
        }
        Ok(())
    }

    fn check_index_type<T>(&self) -> Result<()> {
        if std::mem::size_of::<T>() as u64 != self.config.index_type.size_bytes() {
            return Err(Error::InvalidResource(format!(
                "index element of {} bytes does not match {:?}",
                std::mem::size_of::<T>(),
                self.config.index_type
            )));
        }
        Ok(())
    }

    /// Acquire a uniform region holding `value`
    pub fn acquire_uniform<T: bytemuck::Pod>(&mut self, value: &T) -> Result<UniformBufferBinding> {
        let binding = self.acquire_region(BufferKind::Uniform, bytemuck::bytes_of(value), 1)?;
        UniformBufferBinding::try_from(binding)
    }

    /// Overwrite the start of a region with `bytes`
    ///
    /// Vertex and index regions that an in-flight frame may still read are
    /// relocated: the bytes go to a fresh range, the untouched tail is copied
    /// over on the GPU and the old range is retired with this frame.
    pub fn update_region(&mut self, binding: impl Into<Binding>, bytes: &[u8]) -> Result<()> {
        let binding = binding.into();
        if bytes.is_empty() {
            return Err(Error::InvalidResource("cannot update with zero bytes".to_string()));
        }
        let slot_index = self.current_slot;
        let frames = self.slots.len() as u64;
        let frame_index = self.frame_index;
        let frame = self.frame.as_mut().ok_or_else(no_frame)?;
        let region = self.regions.get_mut(binding.key()).ok_or(Error::StaleBinding)?;
        let len = bytes.len() as u64;
        if len > region.size {
            return Err(Error::InvalidResource(format!(
                "update of {} bytes exceeds region of {} bytes",
                len, region.size
            )));
        }
        let mut ctx = upload_context(&mut self.device, &mut self.slots[slot_index], frame, &mut self.stats);

        let shared = match region.kind {
            BufferKind::Uniform => return self.uniforms.update(region.offset, bytes, slot_index, &mut ctx),
            BufferKind::Vertex => &mut self.vertices,
            BufferKind::Index => &mut self.indices,
        };

        let read_in_flight = region.last_read_frame.map_or(false, |read| read + frames > frame_index);
        if !read_in_flight {
            return shared.write(region.offset, bytes, &mut ctx);
        }

        let staged = ctx.stage(bytes)?;
        let offset = shared.allocate(region.size, &mut ctx)?;
        let buffer = shared.buffer();
        ctx.copy_staged(staged, buffer, offset);
        if len < region.size {
            ctx.copy(BufferCopy {
                src: buffer,
                src_offset: region.offset + len,
                dst: buffer,
                dst_offset: offset + len,
                size: region.size - len,
            });
        }
        ctx.retired.retire_range(region.kind, region.offset, region.size);
        region.offset = offset;
        region.last_read_frame = None;
        Ok(())
    }

    /// Give a region back. Its range is reused once the GPU can no longer read it.
    pub fn return_region(&mut self, binding: impl Into<Binding>) -> Result<()> {
        let binding = binding.into();
        let region = self.regions.remove(binding.key()).ok_or(Error::StaleBinding)?;
        let slot_index = self.retirement_slot();
        if region.kind == BufferKind::Uniform {
            self.uniforms.forget(region.offset);
        }
        self.slots[slot_index].retired.retire_range(region.kind, region.offset, region.size);
        Ok(())
    }

    /// Slot whose fences cover every frame recorded so far: the frame being
    /// recorded, or the last submitted one
    fn retirement_slot(&self) -> usize {
        let frames = self.slots.len();
        if self.frame.is_some() {
            self.current_slot
        } else {
            (self.current_slot + frames - 1) % frames
        }
    }

    /// Where a region currently lives
    pub fn region_info(&self, binding: impl Into<Binding>) -> Result<RegionInfo> {
        let region = self.regions.get(binding.into().key()).ok_or(Error::StaleBinding)?;
        Ok(RegionInfo {
            kind: region.kind,
            offset: region.offset,
            size: region.size,
            element_count: region.element_count,
        })
    }

    /// Device buffer a region is read from in the current slot
    pub fn region_buffer(&self, binding: impl Into<Binding>) -> Result<BufferHandle> {
        let region = self.regions.get(binding.into().key()).ok_or(Error::StaleBinding)?;
        Ok(match region.kind {
            BufferKind::Vertex => self.vertices.buffer(),
            BufferKind::Index => self.indices.buffer(),
            BufferKind::Uniform => self.uniforms.buffer(self.current_slot),
        })
    }

    pub fn live_regions(&self) -> usize {
        self.regions.len()
    }

    // ===== DEDICATED BUFFERS =====

    /// Create a device buffer of its own holding `bytes`, uploaded through
    /// this frame's staging arena
    ///
    /// Only vertex and index buffers can be dedicated; uniforms always live
    /// in the uniform ring.
    pub fn create_dedicated_buffer(
        &mut self,
        kind: BufferKind,
        bytes: &[u8],
        element_count: u32,
    ) -> Result<DedicatedBinding> {
        if kind == BufferKind::Uniform {
            return Err(Error::InvalidResource("uniforms cannot use a dedicated buffer".to_string()));
        }
        if bytes.is_empty() {
            return Err(Error::InvalidResource("cannot create an empty dedicated buffer".to_string()));
        }
        self.check_element_count(kind, bytes.len(), element_count)?;
        let slot_index = self.current_slot;
        let frame_index = self.frame_index;
        let frame = self.frame.as_mut().ok_or_else(no_frame)?;
        let mut ctx = upload_context(&mut self.device, &mut self.slots[slot_index], frame, &mut self.stats);

        let size = bytes.len() as u64;
        let staged = ctx.stage(bytes)?;
        let buffer = ctx.device.create_buffer(&dedicated_desc(kind, size, frame_index))?;
        ctx.copy_staged(staged, buffer, 0);

        let key = self.dedicated.insert(DedicatedBuffer { kind, buffer, size, element_count });
        engine_debug!("sleeve::buffer", "Created dedicated {} buffer of {} bytes", kind.name(), size);
        Ok(DedicatedBinding::new(key, kind, element_count))
    }

    /// Create a dedicated vertex buffer; the vertex size must match the configured stride
    pub fn create_dedicated_vertices<T: bytemuck::Pod>(&mut self, vertices: &[T]) -> Result<DedicatedBinding> {
        self.check_vertex_type::<T>()?;
        let count = element_count(vertices.len())?;
        self.create_dedicated_buffer(BufferKind::Vertex, bytemuck::cast_slice(vertices), count)
    }

    /// Create a dedicated index buffer of the configured index type
    pub fn create_dedicated_indices<T: bytemuck::Pod>(&mut self, indices: &[T]) -> Result<DedicatedBinding> {
        self.check_index_type::<T>()?;
        let count = element_count(indices.len())?;
        self.create_dedicated_buffer(BufferKind::Index, bytemuck::cast_slice(indices), count)
    }

    /// Destroy a dedicated buffer once the GPU can no longer read it
    pub fn destroy_dedicated(&mut self, binding: DedicatedBinding) -> Result<()> {
        let dedicated = self.dedicated.remove(binding.key()).ok_or(Error::StaleBinding)?;
        let slot_index = self.retirement_slot();
        self.slots[slot_index].retired.retire_buffer(dedicated.buffer);
        engine_debug!(
            "sleeve::buffer",
            "Dedicated {} buffer of {} bytes retired to slot {}",
            dedicated.kind.name(),
            dedicated.size,
            slot_index
        );
        Ok(())
    }

    /// Device buffer behind a dedicated binding
    pub fn dedicated_buffer(&self, binding: &DedicatedBinding) -> Result<BufferHandle> {
        self.dedicated.get(binding.key()).map(|d| d.buffer).ok_or(Error::StaleBinding)
    }

    pub fn live_dedicated_buffers(&self) -> usize {
        self.dedicated.len()
    }

    // ===== DRAWING =====

    /// Bind a graphics pipeline for the following draws
    pub fn bind_pipeline(&mut self, pipeline: &ShaderPipeline) -> Result<()> {
        let frame = self.frame.as_mut().ok_or_else(no_frame)?;
        frame.pipeline = Some(*pipeline);
        frame.commands.push(GraphicsCommand::BindPipeline(pipeline.pipeline));
        Ok(())
    }

    /// Allocate and bind a descriptor set for the bound pipeline
    ///
    /// Uniforms take bindings `0..uniforms.len()`, textures follow.
    pub fn bind_uniforms(&mut self, uniforms: &[UniformBufferBinding], textures: &[TextureHandle]) -> Result<()> {
        let slot_index = self.current_slot;
        let frame = self.frame.as_mut().ok_or_else(no_frame)?;
        let pipeline = frame
            .pipeline
            .ok_or_else(|| Error::InvalidResource("bind_uniforms without a bound pipeline".to_string()))?;
        if uniforms.len() != pipeline.shape.uniform_buffers as usize || textures.len() != pipeline.shape.samplers as usize {
            return Err(Error::InvalidResource(format!(
                "{} uniforms and {} textures do not match {:?}",
                uniforms.len(),
                textures.len(),
                pipeline.shape
            )));
        }

        let uniform_buffer = self.uniforms.buffer(slot_index);
        let mut writes = Vec::with_capacity(uniforms.len() + textures.len());
        for (binding, uniform) in uniforms.iter().enumerate() {
            let region = self.regions.get(uniform.binding().key()).ok_or(Error::StaleBinding)?;
            writes.push(DescriptorWrite::UniformBuffer {
                binding: binding as u32,
                buffer: uniform_buffer,
                offset: region.offset,
                range: region.size,
            });
        }
        for (index, texture) in textures.iter().enumerate() {
            writes.push(DescriptorWrite::Texture { binding: (uniforms.len() + index) as u32, texture: *texture });
        }

        let (set, created_pool) =
            self.descriptors.acquire(&mut self.device, pipeline.shape, slot_index, pipeline.set_layout)?;
        self.device.write_descriptor_set(set, &writes)?;
        frame.commands.push(GraphicsCommand::BindDescriptorSet { pipeline: pipeline.pipeline, set });

        self.stats.descriptor_sets += 1;
        if created_pool {
            self.stats.descriptor_pools_created += 1;
        }
        Ok(())
    }

    /// Draw a non-indexed vertex region
    pub fn draw(&mut self, vertices: &VertexBufferBinding) -> Result<()> {
        let frame_index = self.frame_index;
        let frame = self.frame.as_mut().ok_or_else(no_frame)?;
        if frame.pipeline.is_none() {
            return Err(Error::InvalidResource("draw without a bound pipeline".to_string()));
        }
        let region = self.regions.get_mut(vertices.binding().key()).ok_or(Error::StaleBinding)?;
        region.last_read_frame = Some(frame_index);

        frame.commands.push(GraphicsCommand::BindVertexBuffer {
            buffer: self.vertices.buffer(),
            offset: region.offset,
        });
        frame.commands.push(GraphicsCommand::Draw { vertex_count: region.element_count, first_vertex: 0 });
        self.stats.draw_calls += 1;
        Ok(())
    }

    /// Draw an indexed vertex region
    pub fn draw_indexed(&mut self, vertices: &VertexBufferBinding, indices: &IndexBufferBinding) -> Result<()> {
        let frame_index = self.frame_index;
        let frame = self.frame.as_mut().ok_or_else(no_frame)?;
        if frame.pipeline.is_none() {
            return Err(Error::InvalidResource("draw without a bound pipeline".to_string()));
        }
        if !self.regions.contains_key(vertices.binding().key()) || !self.regions.contains_key(indices.binding().key()) {
            return Err(Error::StaleBinding);
        }

        let mut bind = |key: RegionKey| -> (u64, u32) {
            let region = &mut self.regions[key];
            region.last_read_frame = Some(frame_index);
            (region.offset, region.element_count)
        };
        let (vertex_offset, _) = bind(vertices.binding().key());
        let (index_offset, index_count) = bind(indices.binding().key());

        frame.commands.push(GraphicsCommand::BindVertexBuffer { buffer: self.vertices.buffer(), offset: vertex_offset });
        frame.commands.push(GraphicsCommand::BindIndexBuffer {
            buffer: self.indices.buffer(),
            offset: index_offset,
            index_type: self.config.index_type,
        });
        frame.commands.push(GraphicsCommand::DrawIndexed { index_count, first_index: 0, vertex_offset: 0 });
        self.stats.draw_calls += 1;
        Ok(())
    }

    /// Draw a dedicated vertex buffer
    pub fn draw_dedicated(&mut self, vertices: &DedicatedBinding) -> Result<()> {
        let frame = self.frame.as_mut().ok_or_else(no_frame)?;
        if frame.pipeline.is_none() {
            return Err(Error::InvalidResource("draw without a bound pipeline".to_string()));
        }
        let vertices = dedicated_entry(&self.dedicated, vertices, BufferKind::Vertex)?;

        frame.commands.push(GraphicsCommand::BindVertexBuffer { buffer: vertices.buffer, offset: 0 });
        frame.commands.push(GraphicsCommand::Draw { vertex_count: vertices.element_count, first_vertex: 0 });
        self.stats.draw_calls += 1;
        Ok(())
    }

    /// Draw a dedicated vertex buffer with a dedicated index buffer
    pub fn draw_indexed_dedicated(&mut self, vertices: &DedicatedBinding, indices: &DedicatedBinding) -> Result<()> {
        let frame = self.frame.as_mut().ok_or_else(no_frame)?;
        if frame.pipeline.is_none() {
            return Err(Error::InvalidResource("draw without a bound pipeline".to_string()));
        }
        let vertices = dedicated_entry(&self.dedicated, vertices, BufferKind::Vertex)?;
        let indices = dedicated_entry(&self.dedicated, indices, BufferKind::Index)?;

        frame.commands.push(GraphicsCommand::BindVertexBuffer { buffer: vertices.buffer, offset: 0 });
        frame.commands.push(GraphicsCommand::BindIndexBuffer {
            buffer: indices.buffer,
            offset: 0,
            index_type: self.config.index_type,
        });
        frame.commands.push(GraphicsCommand::DrawIndexed {
            index_count: indices.element_count,
            first_index: 0,
            vertex_offset: 0,
        });
        self.stats.draw_calls += 1;
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &GpuConfig {
        &self.config
    }

    /// Index of the next frame to begin, or of the frame being recorded
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    pub fn is_recording(&self) -> bool {
        self.frame.is_some()
    }

    /// Statistics of the last submitted frame
    pub fn stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Statistics of the frame being recorded
    pub fn current_stats(&self) -> FrameStats {
        self.stats
    }

    pub fn vertex_buffer(&self) -> &SharedBuffer {
        &self.vertices
    }

    pub fn index_buffer(&self) -> &SharedBuffer {
        &self.indices
    }

    pub fn uniform_ring(&self) -> &UniformRing {
        &self.uniforms
    }

    pub fn descriptors(&self) -> &DescriptorManager {
        &self.descriptors
    }
}

impl<D: GpuDevice> Drop for FramePipeline<D> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            engine_error!("sleeve::pipeline", "Frame pipeline shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
