/// VulkanDevice - Vulkan implementation of the `GpuDevice` trait
///
/// Owns the instance, the logical device, the graphics / present / transfer
/// queues, the gpu-allocator heap, one command pool per queue and the
/// swapchain. Objects handed to the suballocation layer are kept in handle
/// tables keyed by the opaque `sleeve_gpu` handles.
///
/// Pipelines, descriptor set layouts and textures are created by the
/// application against `raw_device()` / `render_pass()` and registered here;
/// registration does not transfer ownership. Pipelines must declare viewport
/// and scissor as dynamic state.

use sleeve_gpu::sleeve::{Error, GpuConfig, Result};
use sleeve_gpu::sleeve::device::{
    timeout_nanos, AcquireOutcome, BufferDesc, BufferHandle, CommandBufferHandle, DescriptorPoolHandle,
    DescriptorSetHandle, DescriptorSetLayoutHandle, DescriptorWrite, Extent2D, FenceHandle, GpuDevice,
    GraphicsCommand, PipelineHandle, PoolShape, PresentOutcome, QueueKind, SemaphoreHandle, SubmitInfo,
    TextureHandle, TransferCommand,
};
use sleeve_gpu::{engine_debug, engine_error, engine_err, engine_info, engine_warn};
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::time::Duration;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_commands::{
    full_viewport, group_transfer_commands, index_type_to_vk, pool_sizes, transfer_barrier, unique_families,
    wait_stage_to_vk, TransferStep,
};
use crate::vulkan_context::VulkanConfig;
use crate::vulkan_swapchain::Swapchain;

/// Queue family indices used by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
    pub transfer: u32,
}

impl QueueFamilies {
    /// Pick the graphics, present and transfer families
    ///
    /// Present prefers the graphics family. Transfer prefers a family with
    /// neither graphics nor compute (a DMA queue), then any non-graphics
    /// family with transfer, then falls back to graphics.
    pub fn select(
        properties: &[vk::QueueFamilyProperties],
        supports_present: impl Fn(u32) -> bool,
    ) -> Option<Self> {
        let indexed = || properties.iter().enumerate().map(|(i, p)| (i as u32, p.queue_flags));

        let graphics = indexed()
            .find(|(_, flags)| flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|(i, _)| i)?;

        let present = if supports_present(graphics) {
            graphics
        } else {
            (0..properties.len() as u32).find(|&i| supports_present(i))?
        };

        let dedicated = indexed()
            .find(|(_, flags)| {
                flags.contains(vk::QueueFlags::TRANSFER)
                    && !flags.intersects(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
            })
            .or_else(|| {
                indexed().find(|(_, flags)| {
                    flags.contains(vk::QueueFlags::TRANSFER) && !flags.contains(vk::QueueFlags::GRAPHICS)
                })
            })
            .map(|(i, _)| i);

        Some(Self {
            graphics,
            present,
            transfer: dedicated.unwrap_or(graphics),
        })
    }

    /// Distinct families, graphics first
    pub fn unique(&self) -> Vec<u32> {
        unique_families(&[self.graphics, self.present, self.transfer])
    }
}

/// Physical device preference: discrete, integrated, virtual, anything else
pub fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    }
}

pub struct VulkanDevice {
    _entry: ash::Entry,
    instance: ash::Instance,
    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,

    families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_queue: vk::Queue,
    /// Families that share every buffer (graphics + transfer)
    buffer_families: Vec<u32>,

    /// Dropped manually before the device is destroyed
    allocator: ManuallyDrop<Allocator>,

    graphics_command_pool: vk::CommandPool,
    transfer_command_pool: vk::CommandPool,

    swapchain: Swapchain,
    min_uniform_alignment: u64,

    next_handle: u64,
    buffers: FxHashMap<BufferHandle, VulkanBuffer>,
    fences: FxHashMap<FenceHandle, vk::Fence>,
    semaphores: FxHashMap<SemaphoreHandle, vk::Semaphore>,
    command_buffers: FxHashMap<CommandBufferHandle, (vk::CommandBuffer, QueueKind)>,
    descriptor_pools: FxHashMap<DescriptorPoolHandle, vk::DescriptorPool>,
    descriptor_sets: FxHashMap<DescriptorSetHandle, (vk::DescriptorSet, DescriptorPoolHandle)>,
    set_layouts: FxHashMap<DescriptorSetLayoutHandle, vk::DescriptorSetLayout>,
    pipelines: FxHashMap<PipelineHandle, (vk::Pipeline, vk::PipelineLayout)>,
    textures: FxHashMap<TextureHandle, (vk::ImageView, vk::Sampler)>,
}

impl VulkanDevice {
    /// Create a Vulkan device presenting to `window`
    ///
    /// # Arguments
    ///
    /// * `window` - Window for surface creation
    /// * `width`, `height` - Initial surface size (used when the surface does not dictate one)
    /// * `config` - Layer configuration (application name, validation request)
    /// * `vulkan_config` - Debug messenger and presentation options
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        width: u32,
        height: u32,
        config: &GpuConfig,
        vulkan_config: VulkanConfig,
    ) -> Result<Self> {
        let validation = config.enable_validation && cfg!(feature = "vulkan-validation");
        if config.enable_validation && !validation {
            engine_warn!("sleeve::vulkan",
                "Validation requested but the crate was built without the `vulkan-validation` feature");
        }

        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
                })?;

            let app_name = CString::new(config.app_name.as_str()).unwrap_or_default();
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Sleeve")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let display_handle = window.display_handle()
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to get display handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get display handle: {}", e))
                })?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to get required extensions: {}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                })?
                .to_vec();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to create Vulkan instance: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
                })?;

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = if validation {
                Some(create_debug_messenger(&entry, &instance, &vulkan_config)?)
            } else {
                None
            };

            let window_handle = window.window_handle()
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to get window handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get window handle: {}", e))
                })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!("sleeve::vulkan", "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to enumerate physical devices: {:?}", e);
                    Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
                })?;

            let (physical_device, families) = physical_devices
                .into_iter()
                .filter_map(|candidate| {
                    let properties = instance.get_physical_device_queue_family_properties(candidate);
                    QueueFamilies::select(&properties, |family| {
                        surface_loader
                            .get_physical_device_surface_support(candidate, family, surface)
                            .unwrap_or(false)
                    })
                    .map(|families| (candidate, families))
                })
                .max_by_key(|(candidate, _)| {
                    device_type_rank(instance.get_physical_device_properties(*candidate).device_type)
                })
                .ok_or_else(|| {
                    engine_error!("sleeve::vulkan", "No Vulkan GPU with graphics and present support found");
                    Error::InitializationFailed("No suitable Vulkan GPU found".to_string())
                })?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            let queue_priorities = [1.0];
            let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = families
                .unique()
                .into_iter()
                .map(|family| {
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(family)
                        .queue_priorities(&queue_priorities)
                })
                .collect();
            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names);
            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!("sleeve::vulkan", "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let graphics_queue = device.get_device_queue(families.graphics, 0);
            let present_queue = device.get_device_queue(families.present, 0);
            let transfer_queue = device.get_device_queue(families.transfer, 0);

            let mut allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!("sleeve::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let graphics_command_pool = create_command_pool(&device, families.graphics)?;
            let transfer_command_pool = create_command_pool(&device, families.transfer)?;

            let swapchain = Swapchain::new(
                &instance,
                &device,
                &mut allocator,
                physical_device,
                surface,
                surface_loader,
                unique_families(&[families.graphics, families.present]),
                width,
                height,
                vulkan_config.vsync,
            )?;

            engine_info!("sleeve::vulkan",
                "Vulkan device ready: {} (graphics family {}, present family {}, transfer family {}, {} swapchain images)",
                device_name, families.graphics, families.present, families.transfer, swapchain.image_count());
            if families.transfer == families.graphics {
                engine_debug!("sleeve::vulkan", "No dedicated transfer family, copies share the graphics queue");
            }

            Ok(Self {
                _entry: entry,
                instance,
                #[cfg(feature = "vulkan-validation")]
                debug_messenger,
                physical_device,
                device,
                families,
                graphics_queue,
                present_queue,
                transfer_queue,
                buffer_families: unique_families(&[families.graphics, families.transfer]),
                allocator: ManuallyDrop::new(allocator),
                graphics_command_pool,
                transfer_command_pool,
                swapchain,
                min_uniform_alignment: properties.limits.min_uniform_buffer_offset_alignment,
                next_handle: 0,
                buffers: FxHashMap::default(),
                fences: FxHashMap::default(),
                semaphores: FxHashMap::default(),
                command_buffers: FxHashMap::default(),
                descriptor_pools: FxHashMap::default(),
                descriptor_sets: FxHashMap::default(),
                set_layouts: FxHashMap::default(),
                pipelines: FxHashMap::default(),
                textures: FxHashMap::default(),
            })
        }
    }

    // ===== VULKAN ACCESS =====

    /// Logical device, for creating pipelines, layouts and textures
    pub fn raw_device(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Render pass every frame is recorded in (color + depth, one subpass)
    pub fn render_pass(&self) -> vk::RenderPass {
        self.swapchain.render_pass
    }

    pub fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    /// minUniformBufferOffsetAlignment of the physical device
    pub fn min_uniform_buffer_offset_alignment(&self) -> u64 {
        self.min_uniform_alignment
    }

    /// Raise `uniform_alignment` to what this device requires
    pub fn fit_config(&self, config: &GpuConfig) -> GpuConfig {
        GpuConfig {
            uniform_alignment: config.uniform_alignment.max(self.min_uniform_alignment),
            ..config.clone()
        }
    }

    // ===== REGISTRATION =====

    pub fn register_pipeline(&mut self, pipeline: vk::Pipeline, layout: vk::PipelineLayout) -> PipelineHandle {
        let handle = PipelineHandle::from_raw(self.next_handle());
        self.pipelines.insert(handle, (pipeline, layout));
        handle
    }

    pub fn unregister_pipeline(&mut self, handle: PipelineHandle) -> Option<(vk::Pipeline, vk::PipelineLayout)> {
        self.pipelines.remove(&handle)
    }

    pub fn register_descriptor_set_layout(&mut self, layout: vk::DescriptorSetLayout) -> DescriptorSetLayoutHandle {
        let handle = DescriptorSetLayoutHandle::from_raw(self.next_handle());
        self.set_layouts.insert(handle, layout);
        handle
    }

    pub fn unregister_descriptor_set_layout(
        &mut self,
        handle: DescriptorSetLayoutHandle,
    ) -> Option<vk::DescriptorSetLayout> {
        self.set_layouts.remove(&handle)
    }

    /// Register a sampled texture; the view must be in SHADER_READ_ONLY_OPTIMAL when drawn
    pub fn register_texture(&mut self, view: vk::ImageView, sampler: vk::Sampler) -> TextureHandle {
        let handle = TextureHandle::from_raw(self.next_handle());
        self.textures.insert(handle, (view, sampler));
        handle
    }

    pub fn unregister_texture(&mut self, handle: TextureHandle) -> Option<(vk::ImageView, vk::Sampler)> {
        self.textures.remove(&handle)
    }

    // ===== HANDLE TABLES =====

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn vk_buffer(&self, handle: BufferHandle) -> Result<vk::Buffer> {
        self.buffers
            .get(&handle)
            .map(|buffer| buffer.buffer)
            .ok_or_else(|| Error::InvalidResource(format!("unknown buffer {:?}", handle)))
    }

    fn vk_fence(&self, handle: FenceHandle) -> Result<vk::Fence> {
        self.fences
            .get(&handle)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("unknown fence {:?}", handle)))
    }

    fn vk_semaphore(&self, handle: SemaphoreHandle) -> Result<vk::Semaphore> {
        self.semaphores
            .get(&handle)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("unknown semaphore {:?}", handle)))
    }

    fn vk_command_buffer(&self, handle: CommandBufferHandle) -> Result<(vk::CommandBuffer, QueueKind)> {
        self.command_buffers
            .get(&handle)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("unknown command buffer {:?}", handle)))
    }

    fn vk_descriptor_pool(&self, handle: DescriptorPoolHandle) -> Result<vk::DescriptorPool> {
        self.descriptor_pools
            .get(&handle)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("unknown descriptor pool {:?}", handle)))
    }

    fn vk_descriptor_set(&self, handle: DescriptorSetHandle) -> Result<vk::DescriptorSet> {
        self.descriptor_sets
            .get(&handle)
            .map(|(set, _)| *set)
            .ok_or_else(|| Error::InvalidResource(format!("unknown descriptor set {:?}", handle)))
    }

    fn vk_pipeline(&self, handle: PipelineHandle) -> Result<(vk::Pipeline, vk::PipelineLayout)> {
        self.pipelines
            .get(&handle)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("unregistered pipeline {:?}", handle)))
    }

    fn vk_fences(&self, fences: &[FenceHandle]) -> Result<Vec<vk::Fence>> {
        fences.iter().map(|&fence| self.vk_fence(fence)).collect()
    }

    fn begin_recording(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device.begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to begin command buffer: {:?}", e))
        }
    }

    fn end_recording(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        unsafe {
            self.device.end_command_buffer(command_buffer)
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to end command buffer: {:?}", e))
        }
    }

    fn record_graphics_command(&self, command_buffer: vk::CommandBuffer, framebuffer: vk::Framebuffer, command: &GraphicsCommand) -> Result<()> {
        unsafe {
            match *command {
                GraphicsCommand::BeginRenderPass { clear_color } => {
                    let clear_values = [
                        vk::ClearValue { color: vk::ClearColorValue { float32: clear_color } },
                        vk::ClearValue {
                            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
                        },
                    ];
                    let begin_info = vk::RenderPassBeginInfo::default()
                        .render_pass(self.swapchain.render_pass)
                        .framebuffer(framebuffer)
                        .render_area(vk::Rect2D {
                            offset: vk::Offset2D { x: 0, y: 0 },
                            extent: self.swapchain.extent(),
                        })
                        .clear_values(&clear_values);
                    self.device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
                }
                GraphicsCommand::SetViewport(extent) => {
                    let extent = vk::Extent2D { width: extent.width, height: extent.height };
                    self.device.cmd_set_viewport(command_buffer, 0, &[full_viewport(extent)]);
                    self.device.cmd_set_scissor(command_buffer, 0, &[vk::Rect2D {
                        offset: vk::Offset2D { x: 0, y: 0 },
                        extent,
                    }]);
                }
                GraphicsCommand::BindPipeline(pipeline) => {
                    let (pipeline, _) = self.vk_pipeline(pipeline)?;
                    self.device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
                }
                GraphicsCommand::BindDescriptorSet { pipeline, set } => {
                    let (_, layout) = self.vk_pipeline(pipeline)?;
                    let set = self.vk_descriptor_set(set)?;
                    self.device.cmd_bind_descriptor_sets(
                        command_buffer,
                        vk::PipelineBindPoint::GRAPHICS,
                        layout,
                        0,
                        &[set],
                        &[],
                    );
                }
                GraphicsCommand::BindVertexBuffer { buffer, offset } => {
                    let buffer = self.vk_buffer(buffer)?;
                    self.device.cmd_bind_vertex_buffers(command_buffer, 0, &[buffer], &[offset]);
                }
                GraphicsCommand::BindIndexBuffer { buffer, offset, index_type } => {
                    let buffer = self.vk_buffer(buffer)?;
                    self.device.cmd_bind_index_buffer(command_buffer, buffer, offset, index_type_to_vk(index_type));
                }
                GraphicsCommand::Draw { vertex_count, first_vertex } => {
                    self.device.cmd_draw(command_buffer, vertex_count, 1, first_vertex, 0);
                }
                GraphicsCommand::DrawIndexed { index_count, first_index, vertex_offset } => {
                    self.device.cmd_draw_indexed(command_buffer, index_count, 1, first_index, vertex_offset, 0);
                }
                GraphicsCommand::EndRenderPass => {
                    self.device.cmd_end_render_pass(command_buffer);
                }
            }
        }
        Ok(())
    }
}

impl GpuDevice for VulkanDevice {
    // ===== BUFFERS =====

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle> {
        let buffer = VulkanBuffer::new(&self.device, &mut self.allocator, desc, &self.buffer_families)?;
        let handle = BufferHandle::from_raw(self.next_handle());
        engine_debug!("sleeve::vulkan", "Created buffer '{}' ({} bytes) as {:?}", desc.name, desc.size, handle);
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.remove(&buffer) {
            Some(vk_buffer) => vk_buffer.destroy(&self.device, &mut self.allocator),
            None => engine_warn!("sleeve::vulkan", "destroy_buffer: unknown buffer {:?}", buffer),
        }
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        self.buffers
            .get_mut(&buffer)
            .ok_or_else(|| Error::InvalidResource(format!("unknown buffer {:?}", buffer)))?
            .write(offset, data)
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe {
            self.device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to create fence: {:?}", e))?
        };
        let handle = FenceHandle::from_raw(self.next_handle());
        self.fences.insert(handle, fence);
        Ok(handle)
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        if let Some(vk_fence) = self.fences.remove(&fence) {
            unsafe { self.device.destroy_fence(vk_fence, None) };
        }
    }

    fn wait_fences(&mut self, fences: &[FenceHandle], timeout: Duration) -> Result<()> {
        if fences.is_empty() {
            return Ok(());
        }
        let vk_fences = self.vk_fences(fences)?;
        match unsafe { self.device.wait_for_fences(&vk_fences, true, timeout_nanos(timeout)) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(Error::Timeout),
            Err(e) => Err(engine_err!("sleeve::vulkan", "Failed to wait for fences: {:?}", e)),
        }
    }

    fn reset_fences(&mut self, fences: &[FenceHandle]) -> Result<()> {
        if fences.is_empty() {
            return Ok(());
        }
        let vk_fences = self.vk_fences(fences)?;
        unsafe {
            self.device.reset_fences(&vk_fences)
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to reset fences: {:?}", e))
        }
    }

    fn fence_status(&mut self, fence: FenceHandle) -> Result<bool> {
        let vk_fence = self.vk_fence(fence)?;
        unsafe {
            self.device.get_fence_status(vk_fence)
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to query fence status: {:?}", e))
        }
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle> {
        let semaphore = unsafe {
            self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to create semaphore: {:?}", e))?
        };
        let handle = SemaphoreHandle::from_raw(self.next_handle());
        self.semaphores.insert(handle, semaphore);
        Ok(handle)
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        if let Some(vk_semaphore) = self.semaphores.remove(&semaphore) {
            unsafe { self.device.destroy_semaphore(vk_semaphore, None) };
        }
    }

    // ===== COMMANDS =====

    fn allocate_command_buffer(&mut self, queue: QueueKind) -> Result<CommandBufferHandle> {
        let pool = match queue {
            QueueKind::Graphics => self.graphics_command_pool,
            QueueKind::Transfer => self.transfer_command_pool,
        };
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe {
            self.device.allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to allocate {:?} command buffer: {:?}", queue, e))?
                .into_iter()
                .next()
                .ok_or_else(|| engine_err!("sleeve::vulkan", "Driver returned no command buffer"))?
        };
        let handle = CommandBufferHandle::from_raw(self.next_handle());
        self.command_buffers.insert(handle, (command_buffer, queue));
        Ok(handle)
    }

    fn free_command_buffer(&mut self, command_buffer: CommandBufferHandle) {
        if let Some((vk_command_buffer, queue)) = self.command_buffers.remove(&command_buffer) {
            let pool = match queue {
                QueueKind::Graphics => self.graphics_command_pool,
                QueueKind::Transfer => self.transfer_command_pool,
            };
            unsafe { self.device.free_command_buffers(pool, &[vk_command_buffer]) };
        }
    }

    fn reset_command_buffer(&mut self, command_buffer: CommandBufferHandle) -> Result<()> {
        let (vk_command_buffer, _) = self.vk_command_buffer(command_buffer)?;
        unsafe {
            self.device.reset_command_buffer(vk_command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to reset command buffer: {:?}", e))
        }
    }

    fn record_transfer(&mut self, command_buffer: CommandBufferHandle, commands: &[TransferCommand]) -> Result<()> {
        let (cb, _) = self.vk_command_buffer(command_buffer)?;
        self.begin_recording(cb)?;

        // Earlier transfer submissions on this queue may still write what we read
        unsafe {
            self.device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[transfer_barrier()],
                &[],
                &[],
            );
        }

        for step in group_transfer_commands(commands) {
            match step {
                TransferStep::Copy { src, dst, regions } => {
                    let src = self.vk_buffer(src)?;
                    let dst = self.vk_buffer(dst)?;
                    unsafe { self.device.cmd_copy_buffer(cb, src, dst, &regions) };
                }
                TransferStep::Barrier => unsafe {
                    self.device.cmd_pipeline_barrier(
                        cb,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::DependencyFlags::empty(),
                        &[transfer_barrier()],
                        &[],
                        &[],
                    );
                },
            }
        }

        self.end_recording(cb)
    }

    fn record_graphics(
        &mut self,
        command_buffer: CommandBufferHandle,
        image_index: u32,
        commands: &[GraphicsCommand],
    ) -> Result<()> {
        let (cb, _) = self.vk_command_buffer(command_buffer)?;
        let framebuffer = self.swapchain.framebuffer(image_index)?;
        self.begin_recording(cb)?;
        for command in commands {
            self.record_graphics_command(cb, framebuffer, command)?;
        }
        self.end_recording(cb)
    }

    fn submit(&mut self, queue: QueueKind, info: &SubmitInfo<'_>) -> Result<()> {
        let vk_queue = match queue {
            QueueKind::Graphics => self.graphics_queue,
            QueueKind::Transfer => self.transfer_queue,
        };
        let command_buffers = info.command_buffers
            .iter()
            .map(|&cb| self.vk_command_buffer(cb).map(|(cb, _)| cb))
            .collect::<Result<Vec<_>>>()?;
        let wait_semaphores = info.wait
            .iter()
            .map(|&(semaphore, _)| self.vk_semaphore(semaphore))
            .collect::<Result<Vec<_>>>()?;
        let wait_stages: Vec<vk::PipelineStageFlags> = info.wait
            .iter()
            .map(|&(_, stage)| wait_stage_to_vk(stage))
            .collect();
        let signal_semaphores = info.signal
            .iter()
            .map(|&semaphore| self.vk_semaphore(semaphore))
            .collect::<Result<Vec<_>>>()?;
        let fence = match info.fence {
            Some(fence) => self.vk_fence(fence)?,
            None => vk::Fence::null(),
        };

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            self.device.queue_submit(vk_queue, &[submit_info], fence)
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to submit to the {:?} queue: {:?}", queue, e))
        }
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&mut self, shape: PoolShape, max_sets: u32) -> Result<DescriptorPoolHandle> {
        let sizes = pool_sizes(shape, max_sets);
        let info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&sizes)
            .max_sets(max_sets);
        let pool = unsafe {
            self.device.create_descriptor_pool(&info, None)
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to create descriptor pool for {:?}: {:?}", shape, e))?
        };
        let handle = DescriptorPoolHandle::from_raw(self.next_handle());
        self.descriptor_pools.insert(handle, pool);
        Ok(handle)
    }

    fn reset_descriptor_pool(&mut self, pool: DescriptorPoolHandle) -> Result<()> {
        let vk_pool = self.vk_descriptor_pool(pool)?;
        unsafe {
            self.device.reset_descriptor_pool(vk_pool, vk::DescriptorPoolResetFlags::empty())
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to reset descriptor pool: {:?}", e))?;
        }
        self.descriptor_sets.retain(|_, (_, owner)| *owner != pool);
        Ok(())
    }

    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolHandle) {
        if let Some(vk_pool) = self.descriptor_pools.remove(&pool) {
            unsafe { self.device.destroy_descriptor_pool(vk_pool, None) };
            self.descriptor_sets.retain(|_, (_, owner)| *owner != pool);
        }
    }

    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let vk_pool = self.vk_descriptor_pool(pool)?;
        let vk_layout = self.set_layouts
            .get(&layout)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("unregistered descriptor set layout {:?}", layout)))?;

        let layouts = [vk_layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(vk_pool)
            .set_layouts(&layouts);
        let set = match unsafe { self.device.allocate_descriptor_sets(&allocate_info) } {
            Ok(sets) => sets
                .into_iter()
                .next()
                .ok_or_else(|| engine_err!("sleeve::vulkan", "Driver returned no descriptor set"))?,
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                return Err(Error::DescriptorPoolExhausted);
            }
            Err(e) => return Err(engine_err!("sleeve::vulkan", "Failed to allocate descriptor set: {:?}", e)),
        };

        let handle = DescriptorSetHandle::from_raw(self.next_handle());
        self.descriptor_sets.insert(handle, (set, pool));
        Ok(handle)
    }

    fn write_descriptor_set(&mut self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()> {
        let vk_set = self.vk_descriptor_set(set)?;

        // Resolve everything first: the write structs borrow these infos
        let mut buffer_infos = Vec::new();
        let mut image_infos = Vec::new();
        for write in writes {
            match *write {
                DescriptorWrite::UniformBuffer { buffer, offset, range, .. } => {
                    buffer_infos.push(vk::DescriptorBufferInfo {
                        buffer: self.vk_buffer(buffer)?,
                        offset,
                        range,
                    });
                }
                DescriptorWrite::Texture { texture, .. } => {
                    let (view, sampler) = self.textures
                        .get(&texture)
                        .copied()
                        .ok_or_else(|| Error::InvalidResource(format!("unregistered texture {:?}", texture)))?;
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler,
                        image_view: view,
                        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    });
                }
            }
        }

        let mut buffer_infos = buffer_infos.iter();
        let mut image_infos = image_infos.iter();
        let mut vk_writes = Vec::with_capacity(writes.len());
        for write in writes {
            let vk_write = vk::WriteDescriptorSet::default().dst_set(vk_set).dst_array_element(0);
            match *write {
                DescriptorWrite::UniformBuffer { binding, .. } => {
                    if let Some(info) = buffer_infos.next() {
                        vk_writes.push(
                            vk_write
                                .dst_binding(binding)
                                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                                .buffer_info(std::slice::from_ref(info)),
                        );
                    }
                }
                DescriptorWrite::Texture { binding, .. } => {
                    if let Some(info) = image_infos.next() {
                        vk_writes.push(
                            vk_write
                                .dst_binding(binding)
                                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                                .image_info(std::slice::from_ref(info)),
                        );
                    }
                }
            }
        }

        unsafe { self.device.update_descriptor_sets(&vk_writes, &[]) };
        Ok(())
    }

    // ===== PRESENTATION =====

    fn acquire_next_image(&mut self, signal: SemaphoreHandle, timeout: Duration) -> Result<AcquireOutcome> {
        let semaphore = self.vk_semaphore(signal)?;
        self.swapchain.acquire(semaphore, timeout_nanos(timeout))
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentOutcome> {
        let semaphore = self.vk_semaphore(wait)?;
        self.swapchain.present(self.present_queue, image_index, semaphore)
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to wait idle before swapchain recreate: {:?}", e))?;
        }
        self.swapchain.recreate(&self.device, &mut self.allocator, width, height)
    }

    fn extent(&self) -> Extent2D {
        let extent = self.swapchain.extent();
        Extent2D::new(extent.width, extent.height)
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()
                .map_err(|e| engine_err!("sleeve::vulkan", "Failed to wait for device idle: {:?}", e))
        }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            if !self.buffers.is_empty() {
                engine_warn!("sleeve::vulkan", "{} buffer(s) still alive at device drop", self.buffers.len());
            }

            // 1. Objects handed out through handles
            for (_, buffer) in self.buffers.drain() {
                buffer.destroy(&self.device, &mut self.allocator);
            }
            for (_, fence) in self.fences.drain() {
                self.device.destroy_fence(fence, None);
            }
            for (_, semaphore) in self.semaphores.drain() {
                self.device.destroy_semaphore(semaphore, None);
            }
            self.descriptor_sets.clear();
            for (_, pool) in self.descriptor_pools.drain() {
                self.device.destroy_descriptor_pool(pool, None);
            }

            // 2. Command pools free their command buffers
            self.command_buffers.clear();
            self.device.destroy_command_pool(self.graphics_command_pool, None);
            self.device.destroy_command_pool(self.transfer_command_pool, None);

            // 3. Swapchain, depth target, render pass and surface
            self.swapchain.destroy(&self.device, &mut self.allocator);

            // 4. Allocator frees its memory blocks BEFORE the device goes away
            ManuallyDrop::drop(&mut self.allocator);

            // 5. Debug messenger BEFORE device and instance
            #[cfg(feature = "vulkan-validation")]
            {
                crate::debug::cleanup_debug_config();
                if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                    debug_utils.destroy_debug_utils_messenger(messenger, None);
                }
            }

            // 6. Device, then instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

fn create_command_pool(device: &ash::Device, family: u32) -> Result<vk::CommandPool> {
    let info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(family)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
    unsafe {
        device.create_command_pool(&info, None)
            .map_err(|e| {
                engine_error!("sleeve::vulkan", "Failed to create command pool for family {}: {:?}", family, e);
                Error::InitializationFailed(format!("Failed to create command pool: {:?}", e))
            })
    }
}

#[cfg(feature = "vulkan-validation")]
fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    vulkan_config: &VulkanConfig,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
    crate::debug::init_debug_config(crate::debug::Config::from(vulkan_config));

    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(crate::debug::severity_flags(vulkan_config.debug_severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

    let messenger = unsafe {
        debug_utils
            .create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| {
                engine_error!("sleeve::vulkan", "Failed to create debug messenger: {:?}", e);
                Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
            })?
    };
    Ok((debug_utils, messenger))
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;
