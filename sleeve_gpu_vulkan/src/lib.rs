/*!
# Sleeve GPU - Vulkan Backend

Vulkan implementation of the `sleeve_gpu::sleeve::device::GpuDevice` trait,
built on Ash for the bindings and gpu-allocator for device memory.

```no_run
# fn run(window: &winit::window::Window) -> sleeve_gpu::sleeve::Result<()> {
use sleeve_gpu::sleeve::{FramePipeline, GpuConfig};
use sleeve_gpu_vulkan::{VulkanConfig, VulkanDevice};

let config = GpuConfig::default();
let device = VulkanDevice::new(window, 1280, 720, &config, VulkanConfig::default())?;
let config = device.fit_config(&config);
let mut pipeline = FramePipeline::new(device, config)?;
# let _ = &mut pipeline;
# Ok(())
# }
```

Validation layers and the debug messenger are compiled in only with the
`vulkan-validation` feature.
*/

mod vulkan_context;
#[cfg(feature = "vulkan-validation")]
mod debug;
mod vulkan_buffer;
mod vulkan_commands;
mod vulkan_swapchain;
mod vulkan_device;

pub use vulkan_device::{device_type_rank, QueueFamilies, VulkanDevice};
pub use vulkan_context::{DebugMessageFilter, DebugOutput, DebugSeverity, ValidationStats, VulkanConfig};

#[cfg(feature = "vulkan-validation")]
pub use debug::{get_validation_stats, print_validation_stats_report};
