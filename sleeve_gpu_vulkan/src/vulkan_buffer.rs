/// VulkanBuffer - a `vk::Buffer` with its gpu-allocator allocation
///
/// Host-visible buffers are persistently mapped by gpu-allocator; writes go
/// straight through the mapping. Device-local buffers are only reachable
/// through transfer copies.

use sleeve_gpu::sleeve::{Error, Result};
use sleeve_gpu::sleeve::device::{BufferDesc, MemoryLocation};
use sleeve_gpu::{engine_error, engine_err};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};

use crate::vulkan_commands::{buffer_usage_to_vk, memory_location_to_gpu_allocator};

pub(crate) struct VulkanBuffer {
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    pub(crate) size: u64,
    location: MemoryLocation,
}

impl VulkanBuffer {
    /// Create and bind a buffer
    ///
    /// `queue_families` lists every family that touches the buffer; more than
    /// one distinct family selects concurrent sharing.
    pub(crate) fn new(
        device: &ash::Device,
        allocator: &mut Allocator,
        desc: &BufferDesc,
        queue_families: &[u32],
    ) -> Result<Self> {
        let create_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(buffer_usage_to_vk(desc.usage));
        let create_info = if queue_families.len() > 1 {
            create_info
                .sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(queue_families)
        } else {
            create_info.sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        unsafe {
            let buffer = device.create_buffer(&create_info, None)
                .map_err(|e| engine_err!("sleeve::vulkan",
                    "Failed to create buffer '{}' of size {} bytes: {:?}", desc.name, desc.size, e))?;

            let requirements = device.get_buffer_memory_requirements(buffer);
            let allocation = match allocator.allocate(&AllocationCreateDesc {
                name: &desc.name,
                requirements,
                location: memory_location_to_gpu_allocator(desc.location),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_buffer(buffer, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("sleeve::vulkan",
                        "Out of GPU memory for buffer '{}' (required: {:.2} MB): {:?}", desc.name, size_mb, e);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                allocator.free(allocation).ok();
                device.destroy_buffer(buffer, None);
                return Err(engine_err!("sleeve::vulkan", "Failed to bind buffer memory: {:?}", e));
            }

            Ok(Self {
                buffer,
                allocation: Some(allocation),
                size: desc.size,
                location: desc.location,
            })
        }
    }

    /// Copy `data` into the persistent mapping at `offset`
    pub(crate) fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if self.location != MemoryLocation::HostVisible {
            return Err(Error::InvalidResource("write to a device-local buffer".to_string()));
        }
        let end = offset.checked_add(data.len() as u64).filter(|&end| end <= self.size).ok_or_else(|| {
            Error::InvalidResource(format!(
                "write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(), offset, self.size
            ))
        })?;

        let mapped = self.allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| engine_err!("sleeve::vulkan", "Buffer is not CPU-accessible"))?;
        mapped[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    /// Free the memory and destroy the buffer
    pub(crate) fn destroy(mut self, device: &ash::Device, allocator: &mut Allocator) {
        if let Some(allocation) = self.allocation.take() {
            allocator.free(allocation).ok();
        }
        unsafe {
            device.destroy_buffer(self.buffer, None);
        }
    }
}
