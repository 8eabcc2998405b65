//! Error types for the Sleeve GPU layer
//!
//! Every fallible operation of the allocator, the shared buffers, the
//! staging arenas, the descriptor pools and the frame pipeline returns
//! this single error type. Device failures are fatal and surface as
//! `BackendError`; capacity and contract violations have dedicated variants
//! so callers can react to them.

use std::fmt;

/// Result type for Sleeve GPU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sleeve GPU errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan device failure, lost device, ...)
    BackendError(String),

    /// Out of GPU memory, or a requested size that cannot be represented
    OutOfMemory,

    /// Invalid resource or invalid call for the current state
    InvalidResource(String),

    /// Initialization failed (device, swapchain, configuration)
    InitializationFailed(String),

    /// The current frame's staging arena cannot hold the requested bytes
    StagingExhausted {
        /// Bytes the caller tried to stage
        requested: u64,
        /// Largest contiguous range still free in the arena
        available: u64,
    },

    /// A descriptor set could not be allocated even after adding a pool
    DescriptorPoolExhausted,

    /// A binding was used after it was returned, or returned twice
    StaleBinding,

    /// A bounded fence wait expired
    Timeout,

    /// The swapchain no longer matches the surface
    SwapchainOutOfDate,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::StagingExhausted { requested, available } => write!(
                f,
                "Staging arena exhausted: requested {} bytes, {} available",
                requested, available
            ),
            Error::DescriptorPoolExhausted => write!(f, "Descriptor pool exhausted"),
            Error::StaleBinding => write!(f, "Stale binding (already returned)"),
            Error::Timeout => write!(f, "Timed out waiting for the GPU"),
            Error::SwapchainOutOfDate => write!(f, "Swapchain out of date"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
