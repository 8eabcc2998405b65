/// Per-frame counters, reset at every `begin_frame`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame these counters belong to
    pub frame_index: u64,
    /// Draw and indexed-draw calls recorded
    pub draw_calls: u32,
    /// Transfer copies recorded (uploads and migrations)
    pub copies: u32,
    /// Transfer barriers inserted between overlapping copies
    pub barriers: u32,
    /// Bytes written into the staging arena
    pub bytes_staged: u64,
    /// Shared buffer and uniform ring growths
    pub buffer_growths: u32,
    /// Descriptor sets allocated
    pub descriptor_sets: u32,
    /// Descriptor pools created beyond the initial ones
    pub descriptor_pools_created: u32,
    /// Retired buffers destroyed and ranges returned
    pub reclaimed: u32,
    /// Swapchain recreations triggered during the frame
    pub swapchain_recreations: u32,
}
