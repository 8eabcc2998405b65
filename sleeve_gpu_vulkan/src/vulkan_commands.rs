/// Conversions from backend-neutral device types to Vulkan
///
/// Everything here is pure: no device, no allocator. `VulkanDevice` uses
/// these helpers while recording and submitting.

use sleeve_gpu::sleeve::device::{
    BufferHandle, BufferUsage, IndexType, MemoryLocation, PoolShape, TransferCommand, WaitStage,
};
use ash::vk;

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::VERTEX) { flags |= vk::BufferUsageFlags::VERTEX_BUFFER; }
    if usage.contains(BufferUsage::INDEX) { flags |= vk::BufferUsageFlags::INDEX_BUFFER; }
    if usage.contains(BufferUsage::UNIFORM) { flags |= vk::BufferUsageFlags::UNIFORM_BUFFER; }
    if usage.contains(BufferUsage::TRANSFER_SRC) { flags |= vk::BufferUsageFlags::TRANSFER_SRC; }
    if usage.contains(BufferUsage::TRANSFER_DST) { flags |= vk::BufferUsageFlags::TRANSFER_DST; }
    flags
}

pub fn memory_location_to_gpu_allocator(location: MemoryLocation) -> gpu_allocator::MemoryLocation {
    match location {
        MemoryLocation::DeviceLocal => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryLocation::HostVisible => gpu_allocator::MemoryLocation::CpuToGpu,
    }
}

/// Stages blocked by a semaphore wait
///
/// Geometry copied on the transfer queue is consumed by vertex input, and
/// uniform ring growth copies are read by both shader stages.
pub fn wait_stage_to_vk(stage: WaitStage) -> vk::PipelineStageFlags {
    match stage {
        WaitStage::Transfer => vk::PipelineStageFlags::TRANSFER,
        WaitStage::VertexInput => {
            vk::PipelineStageFlags::VERTEX_INPUT
                | vk::PipelineStageFlags::VERTEX_SHADER
                | vk::PipelineStageFlags::FRAGMENT_SHADER
        }
        WaitStage::ColorAttachmentOutput => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    }
}

pub fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

/// Descriptor counts for a pool of `max_sets` sets of one shape
///
/// A shape with no descriptors still gets one uniform slot per set, since
/// Vulkan rejects a pool without sizes.
pub fn pool_sizes(shape: PoolShape, max_sets: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes = Vec::with_capacity(2);
    if shape.uniform_buffers > 0 {
        sizes.push(vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: shape.uniform_buffers as u32 * max_sets,
        });
    }
    if shape.samplers > 0 {
        sizes.push(vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: shape.samplers as u32 * max_sets,
        });
    }
    if sizes.is_empty() {
        sizes.push(vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: max_sets,
        });
    }
    sizes
}

/// One recorded transfer operation after grouping
#[derive(Debug, Clone)]
pub enum TransferStep {
    /// A single `vkCmdCopyBuffer` with one or more regions
    Copy {
        src: BufferHandle,
        dst: BufferHandle,
        regions: Vec<vk::BufferCopy>,
    },
    Barrier,
}

/// Merge consecutive copies between the same pair of buffers
///
/// Order is preserved; a barrier always closes the current group.
pub fn group_transfer_commands(commands: &[TransferCommand]) -> Vec<TransferStep> {
    let mut steps: Vec<TransferStep> = Vec::new();
    for command in commands {
        match command {
            TransferCommand::Barrier => steps.push(TransferStep::Barrier),
            TransferCommand::Copy(copy) => {
                let region = vk::BufferCopy {
                    src_offset: copy.src_offset,
                    dst_offset: copy.dst_offset,
                    size: copy.size,
                };
                match steps.last_mut() {
                    Some(TransferStep::Copy { src, dst, regions }) if *src == copy.src && *dst == copy.dst => {
                        regions.push(region);
                    }
                    _ => steps.push(TransferStep::Copy {
                        src: copy.src,
                        dst: copy.dst,
                        regions: vec![region],
                    }),
                }
            }
        }
    }
    steps
}

/// Transfer-write to transfer-read/write dependency on the transfer queue
pub fn transfer_barrier() -> vk::MemoryBarrier<'static> {
    vk::MemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::TRANSFER_READ | vk::AccessFlags::TRANSFER_WRITE)
}

/// Viewport covering the whole extent
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Distinct queue family indices, in first-seen order
pub fn unique_families(families: &[u32]) -> Vec<u32> {
    let mut unique = Vec::with_capacity(families.len());
    for &family in families {
        if !unique.contains(&family) {
            unique.push(family);
        }
    }
    unique
}

#[cfg(test)]
#[path = "vulkan_commands_tests.rs"]
mod tests;
