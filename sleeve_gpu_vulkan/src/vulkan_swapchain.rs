/// Swapchain - presentation surface, depth target, render pass and framebuffers
///
/// The render pass is created once and survives recreation, so pipelines
/// built against it stay valid after a resize. Everything sized by the
/// surface (images, views, depth target, framebuffers) is rebuilt by
/// `recreate`.

use sleeve_gpu::sleeve::{Error, Result};
use sleeve_gpu::sleeve::device::{AcquireOutcome, PresentOutcome};
use sleeve_gpu::{engine_debug, engine_error, engine_err, engine_warn};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};

const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Surface extent to build the swapchain with
///
/// `current_extent` is authoritative unless the surface reports the special
/// `u32::MAX` width, in which case the requested size is clamped.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
            height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
        }
    }
}

/// One more image than the minimum, bounded by the maximum (0 = unbounded)
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// FIFO with vsync; otherwise MAILBOX, then IMMEDIATE, then FIFO
pub fn choose_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// sRGB 8-bit BGRA/RGBA when offered, else the first reported format
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            (f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB)
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

struct DepthTarget {
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
}

pub(crate) struct Swapchain {
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    physical_device: vk::PhysicalDevice,
    swapchain: vk::SwapchainKHR,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    depth_format: vk::Format,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    depth: Option<DepthTarget>,
    pub(crate) render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    /// Graphics and present families; two entries select concurrent sharing
    queue_families: Vec<u32>,
}

impl Swapchain {
    /// Create the swapchain for `surface`, taking ownership of the surface
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        instance: &ash::Instance,
        device: &ash::Device,
        allocator: &mut Allocator,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        queue_families: Vec<u32>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self> {
        unsafe {
            let formats = surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to query surface formats: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
                })?;
            let surface_format = choose_surface_format(&formats).ok_or_else(|| {
                engine_error!("sleeve::vulkan", "Surface reports no formats");
                Error::InitializationFailed("Surface reports no formats".to_string())
            })?;

            let present_modes = surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to query present modes: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get present modes: {:?}", e))
                })?;
            let present_mode = choose_present_mode(&present_modes, vsync);

            let depth_format = DEPTH_FORMAT_CANDIDATES
                .into_iter()
                .find(|&format| {
                    instance
                        .get_physical_device_format_properties(physical_device, format)
                        .optimal_tiling_features
                        .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
                })
                .ok_or_else(|| {
                    engine_error!("sleeve::vulkan", "No supported depth format");
                    Error::InitializationFailed("No supported depth format".to_string())
                })?;

            let render_pass = create_render_pass(device, surface_format.format, depth_format)?;

            let mut swapchain = Self {
                surface,
                surface_loader,
                swapchain_loader: ash::khr::swapchain::Device::new(instance, device),
                physical_device,
                swapchain: vk::SwapchainKHR::null(),
                surface_format,
                present_mode,
                depth_format,
                extent: vk::Extent2D::default(),
                images: Vec::new(),
                views: Vec::new(),
                depth: None,
                render_pass,
                framebuffers: Vec::new(),
                queue_families,
            };

            let built = swapchain
                .surface_extent(width, height)
                .and_then(|(capabilities, extent)| swapchain.build(device, allocator, &capabilities, extent));
            if let Err(e) = built {
                swapchain.destroy(device, allocator);
                return Err(e);
            }
            Ok(swapchain)
        }
    }

    pub(crate) fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub(crate) fn framebuffer(&self, image_index: u32) -> Result<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied().ok_or_else(|| {
            Error::InvalidResource(format!(
                "swapchain image {} out of range (count: {})",
                image_index, self.framebuffers.len()
            ))
        })
    }

    pub(crate) fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Rebuild every surface-sized object. The caller waits for the device first.
    pub(crate) fn recreate(
        &mut self,
        device: &ash::Device,
        allocator: &mut Allocator,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let (capabilities, extent) = self.surface_extent(width, height)?;
        self.destroy_targets(device, allocator);
        self.build(device, allocator, &capabilities, extent)
    }

    pub(crate) fn acquire(&mut self, signal: vk::Semaphore, timeout: u64) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(self.swapchain, timeout, signal, vk::Fence::null())
        };
        match result {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Image { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Err(Error::Timeout),
            Err(e) => Err(engine_err!("sleeve::vulkan", "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    pub(crate) fn present(&mut self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> Result<PresentOutcome> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(engine_err!("sleeve::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }

    /// Destroy everything, including the render pass and the surface
    pub(crate) fn destroy(&mut self, device: &ash::Device, allocator: &mut Allocator) {
        self.destroy_targets(device, allocator);
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
            if self.render_pass != vk::RenderPass::null() {
                device.destroy_render_pass(self.render_pass, None);
                self.render_pass = vk::RenderPass::null();
            }
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
                self.surface = vk::SurfaceKHR::null();
            }
        }
    }

    /// Current surface capabilities and the extent to build with
    ///
    /// A minimized surface has a zero extent and yields `SwapchainOutOfDate`.
    fn surface_extent(&self, width: u32, height: u32) -> Result<(vk::SurfaceCapabilitiesKHR, vk::Extent2D)> {
        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to get surface capabilities: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
                })?
        };
        let extent = choose_extent(&capabilities, width, height);
        if extent.width == 0 || extent.height == 0 {
            engine_warn!("sleeve::vulkan", "Surface has a zero extent, swapchain not rebuilt");
            return Err(Error::SwapchainOutOfDate);
        }
        Ok((capabilities, extent))
    }

    fn build(
        &mut self,
        device: &ash::Device,
        allocator: &mut Allocator,
        capabilities: &vk::SurfaceCapabilitiesKHR,
        extent: vk::Extent2D,
    ) -> Result<()> {
        unsafe {
            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(choose_image_count(capabilities))
                .image_format(self.surface_format.format)
                .image_color_space(self.surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(self.present_mode)
                .clipped(true)
                .old_swapchain(old_swapchain);
            let create_info = if self.queue_families.len() > 1 {
                create_info
                    .image_sharing_mode(vk::SharingMode::CONCURRENT)
                    .queue_family_indices(&self.queue_families)
            } else {
                create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            };

            let swapchain = self.swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to create swapchain: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
                })?;
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;

            self.images = self.swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to get swapchain images: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e))
                })?;

            for &image in &self.images {
                let view = create_view(device, image, self.surface_format.format, vk::ImageAspectFlags::COLOR)?;
                self.views.push(view);
            }

            let depth = create_depth_target(device, allocator, self.depth_format, extent)?;
            let depth_view = depth.view;
            self.depth = Some(depth);

            for &view in &self.views {
                let attachments = [view, depth_view];
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(self.render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);
                let framebuffer = device.create_framebuffer(&framebuffer_info, None)
                    .map_err(|e| engine_err!("sleeve::vulkan", "Failed to create framebuffer: {:?}", e))?;
                self.framebuffers.push(framebuffer);
            }

            engine_debug!("sleeve::vulkan",
                "Swapchain built: {}x{}, {} images, {:?}, {:?}",
                extent.width, extent.height, self.images.len(), self.surface_format.format, self.present_mode);
            Ok(())
        }
    }

    fn destroy_targets(&mut self, device: &ash::Device, allocator: &mut Allocator) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
            if let Some(mut depth) = self.depth.take() {
                device.destroy_image_view(depth.view, None);
                if let Some(allocation) = depth.allocation.take() {
                    allocator.free(allocation).ok();
                }
                device.destroy_image(depth.image, None);
            }
            for view in self.views.drain(..) {
                device.destroy_image_view(view, None);
            }
        }
        self.images.clear();
    }
}

fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    unsafe {
        device.create_image_view(&create_info, None)
            .map_err(|e| engine_err!("sleeve::vulkan", "Failed to create image view: {:?}", e))
    }
}

fn create_depth_target(
    device: &ash::Device,
    allocator: &mut Allocator,
    format: vk::Format,
    extent: vk::Extent2D,
) -> Result<DepthTarget> {
    unsafe {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = device.create_image(&image_info, None)
            .map_err(|e| engine_err!("sleeve::vulkan", "Failed to create depth image: {:?}", e))?;

        let requirements = device.get_image_memory_requirements(image);
        let allocation = match allocator.allocate(&AllocationCreateDesc {
            name: "depth_target",
            requirements,
            location: gpu_allocator::MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        }) {
            Ok(allocation) => allocation,
            Err(e) => {
                device.destroy_image(image, None);
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("sleeve::vulkan",
                    "Out of GPU memory for depth target (required: {:.2} MB): {:?}", size_mb, e);
                return Err(Error::OutOfMemory);
            }
        };

        let mut target = DepthTarget { image, view: vk::ImageView::null(), allocation: None };
        let bound = device.bind_image_memory(image, allocation.memory(), allocation.offset());
        target.allocation = Some(allocation);
        let view = bound
            .map_err(|e| engine_err!("sleeve::vulkan", "Failed to bind depth image memory: {:?}", e))
            .and_then(|_| create_view(device, image, format, vk::ImageAspectFlags::DEPTH));
        match view {
            Ok(view) => {
                target.view = view;
                Ok(target)
            }
            Err(e) => {
                if let Some(allocation) = target.allocation.take() {
                    allocator.free(allocation).ok();
                }
                device.destroy_image(image, None);
                Err(e)
            }
        }
    }
}

/// Single-subpass pass: cleared color presented at the end, cleared depth discarded
fn create_render_pass(device: &ash::Device, color_format: vk::Format, depth_format: vk::Format) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];

    let color_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
    let depth_ref = vk::AttachmentReference::default()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref);

    // The depth target is shared by every frame in flight
    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        );

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(std::slice::from_ref(&dependency));

    unsafe {
        device.create_render_pass(&render_pass_info, None)
            .map_err(|e| engine_err!("sleeve::vulkan", "Failed to create render pass: {:?}", e))
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
