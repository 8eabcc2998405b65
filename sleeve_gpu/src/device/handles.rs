/// Opaque device handles
///
/// Handles are plain `Copy` ids issued by a `GpuDevice`. They carry no
/// lifetime; the owner (shared buffer, frame slot, pool set) is responsible
/// for destroying them through the device that created them.

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a backend id
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Backend id
            pub fn raw(&self) -> u64 {
                self.0
            }
        }
    };
}

device_handle!(
    /// Device buffer (shared buffer, staging arena, uniform ring slot)
    BufferHandle
);
device_handle!(
    /// CPU-waitable fence
    FenceHandle
);
device_handle!(
    /// GPU-GPU semaphore
    SemaphoreHandle
);
device_handle!(
    /// Command buffer bound to one queue family
    CommandBufferHandle
);
device_handle!(DescriptorPoolHandle);
device_handle!(DescriptorSetHandle);
device_handle!(
    /// Descriptor set layout registered with the backend
    DescriptorSetLayoutHandle
);
device_handle!(
    /// Graphics pipeline registered with the backend
    PipelineHandle
);
device_handle!(
    /// Sampled texture (image view + sampler) registered with the backend
    TextureHandle
);
