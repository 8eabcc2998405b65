//! Configuration of the suballocation layer
//!
//! `GpuConfig::default()` carries the reference sizes: two frames in flight,
//! a 1 MB vertex buffer, a 100 KB index buffer, 64 x 16 KB of uniforms, a
//! 64 MB staging arena per frame slot and 1024 descriptor sets per pool.

use std::time::Duration;
use crate::device::IndexType;
use crate::error::{Error, Result};

/// Upper bound on frames in flight
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct GpuConfig {
    /// Application name reported to the backend
    pub app_name: String,

    /// Number of frames the CPU may record ahead of the GPU (N)
    pub frames_in_flight: usize,

    /// Initial size of the shared vertex buffer in bytes
    pub vertex_buffer_size: u64,

    /// Initial size of the shared index buffer in bytes
    pub index_buffer_size: u64,

    /// Initial size of each uniform ring buffer in bytes
    pub uniform_buffer_size: u64,

    /// Size of the staging arena of each frame slot in bytes
    pub staging_buffer_size: u64,

    /// Descriptor sets per descriptor pool
    pub max_descriptor_sets_per_pool: u32,

    /// Bound on every fence and acquire wait
    pub fence_timeout: Duration,

    /// Offset alignment of uniform regions (minUniformBufferOffsetAlignment)
    pub uniform_alignment: u64,

    /// Bytes per vertex
    pub vertex_stride: u32,

    pub index_type: IndexType,

    /// Request validation layers from the backend
    pub enable_validation: bool,

    /// Clear color of the main render pass
    pub clear_color: [f32; 4],
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            app_name: "Sleeve".to_string(),
            frames_in_flight: 2,
            vertex_buffer_size: 1_000_000,
            index_buffer_size: 100_000,
            uniform_buffer_size: 64 * 16_384,
            staging_buffer_size: 64_000_000,
            max_descriptor_sets_per_pool: 1024,
            fence_timeout: Duration::from_secs(5),
            uniform_alignment: 256,
            vertex_stride: 24,
            index_type: IndexType::U16,
            enable_validation: cfg!(debug_assertions),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl GpuConfig {
    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::InitializationFailed(msg));

        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return fail(format!(
                "frames_in_flight must be in 1..={}, got {}",
                MAX_FRAMES_IN_FLIGHT, self.frames_in_flight
            ));
        }
        for (name, size) in [
            ("vertex_buffer_size", self.vertex_buffer_size),
            ("index_buffer_size", self.index_buffer_size),
            ("uniform_buffer_size", self.uniform_buffer_size),
            ("staging_buffer_size", self.staging_buffer_size),
        ] {
            if size == 0 {
                return fail(format!("{} must be non-zero", name));
            }
        }
        if !self.uniform_alignment.is_power_of_two() {
            return fail(format!(
                "uniform_alignment must be a power of two, got {}",
                self.uniform_alignment
            ));
        }
        if self.max_descriptor_sets_per_pool == 0 {
            return fail("max_descriptor_sets_per_pool must be non-zero".to_string());
        }
        if self.vertex_stride == 0 {
            return fail("vertex_stride must be non-zero".to_string());
        }
        if self.fence_timeout.is_zero() {
            return fail("fence_timeout must be non-zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
