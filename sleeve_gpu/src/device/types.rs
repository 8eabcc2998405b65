/// Plain data exchanged with a `GpuDevice`
///
/// These types describe buffers, recorded commands and submissions in a
/// backend-neutral way. The Vulkan backend converts them to `ash` structures;
/// the mock device interprets them directly.

use bitflags::bitflags;
use std::time::Duration;
use super::handles::*;

// ============================================================================
// Buffers
// ============================================================================

bitflags! {
    /// How a buffer is used by the GPU
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const TRANSFER_SRC = 1 << 3;
        const TRANSFER_DST = 1 << 4;
    }
}

/// Where a buffer's memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// GPU-only memory, written through transfer copies
    DeviceLocal,
    /// Persistently mapped, host-coherent memory
    HostVisible,
}

/// Buffer creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    /// Debug name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
    pub location: MemoryLocation,
}

// ============================================================================
// Commands
// ============================================================================

/// Hardware queue a command buffer is submitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Graphics,
    Transfer,
}

/// One buffer-to-buffer copy region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src: BufferHandle,
    pub src_offset: u64,
    pub dst: BufferHandle,
    pub dst_offset: u64,
    pub size: u64,
}

/// Command recorded into a transfer command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferCommand {
    Copy(BufferCopy),
    /// Transfer-write to transfer-read/write memory barrier
    Barrier,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size of one index in bytes
    pub fn size_bytes(&self) -> u64 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Swapchain dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero-sized surface
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Command recorded into a graphics command buffer
///
/// The list handed to `record_graphics` starts with `BeginRenderPass` and
/// ends with `EndRenderPass`; everything in between is replayed in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphicsCommand {
    BeginRenderPass {
        clear_color: [f32; 4],
    },
    /// Full-extent viewport and scissor
    SetViewport(Extent2D),
    BindPipeline(PipelineHandle),
    BindDescriptorSet {
        pipeline: PipelineHandle,
        set: DescriptorSetHandle,
    },
    BindVertexBuffer {
        buffer: BufferHandle,
        offset: u64,
    },
    BindIndexBuffer {
        buffer: BufferHandle,
        offset: u64,
        index_type: IndexType,
    },
    Draw {
        vertex_count: u32,
        first_vertex: u32,
    },
    DrawIndexed {
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    },
    EndRenderPass,
}

// ============================================================================
// Submission
// ============================================================================

/// Pipeline stage a semaphore wait blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitStage {
    Transfer,
    VertexInput,
    ColorAttachmentOutput,
}

/// One queue submission
#[derive(Debug, Clone, Copy)]
pub struct SubmitInfo<'a> {
    pub command_buffers: &'a [CommandBufferHandle],
    pub wait: &'a [(SemaphoreHandle, WaitStage)],
    pub signal: &'a [SemaphoreHandle],
    /// Fence signaled once every command buffer has completed
    pub fence: Option<FenceHandle>,
}

// ============================================================================
// Descriptors
// ============================================================================

/// Descriptor pool shape: how many uniform buffers and samplers each set holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolShape {
    pub uniform_buffers: u8,
    pub samplers: u8,
}

impl PoolShape {
    pub fn new(uniform_buffers: u8, samplers: u8) -> Self {
        Self { uniform_buffers, samplers }
    }

    /// Packed map key: uniform count in the high byte, sampler count in the low byte
    pub fn key(&self) -> u16 {
        ((self.uniform_buffers as u16) << 8) | self.samplers as u16
    }
}

/// One descriptor update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorWrite {
    UniformBuffer {
        binding: u32,
        buffer: BufferHandle,
        offset: u64,
        range: u64,
    },
    Texture {
        binding: u32,
        texture: TextureHandle,
    },
}

// ============================================================================
// Presentation
// ============================================================================

/// Result of acquiring the next swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Image { index: u32, suboptimal: bool },
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    /// Whether the swapchain must be recreated before the next frame
    pub fn needs_recreate(&self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// Convert a bounded wait to the nanosecond count backends expect
pub fn timeout_nanos(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}
