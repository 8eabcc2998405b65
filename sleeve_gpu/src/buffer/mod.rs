/// Buffer module - shared device buffers, staging arenas, the uniform ring
/// and the bindings handed to game code

pub mod binding;
pub mod dedicated;
pub mod staging;
pub mod shared_buffer;
pub mod uniform_ring;
pub mod vertex;

pub use binding::*;
pub use dedicated::{DedicatedBinding, DedicatedKey};
pub use staging::*;
pub use shared_buffer::*;
pub use uniform_ring::*;
pub use vertex::*;

use crate::device::BufferUsage;

/// Which shared buffer a region lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
}

impl BufferKind {
    /// Usage flags of the backing device buffer
    ///
    /// Shared buffers are also a transfer source so growth can migrate them.
    pub fn usage(&self) -> BufferUsage {
        let role = match self {
            BufferKind::Vertex => BufferUsage::VERTEX,
            BufferKind::Index => BufferUsage::INDEX,
            BufferKind::Uniform => BufferUsage::UNIFORM,
        };
        role | BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST
    }

    pub fn name(&self) -> &'static str {
        match self {
            BufferKind::Vertex => "vertex",
            BufferKind::Index => "index",
            BufferKind::Uniform => "uniform",
        }
    }
}

#[cfg(test)]
pub(crate) mod test_harness;
