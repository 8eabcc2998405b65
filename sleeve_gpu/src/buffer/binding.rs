/// Bindings: the non-owning handles game code holds for its regions
///
/// A binding names a region through a generation-checked slotmap key. Once
/// the region is returned the key goes stale: any further use, including a
/// second return, is rejected with `Error::StaleBinding`.

use slotmap::new_key_type;
use crate::error::{Error, Result};
use super::BufferKind;

new_key_type! {
    /// Key of a live region in the frame pipeline's region table
    pub struct RegionKey;
}

/// Region handed out by `acquire_region`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binding {
    key: RegionKey,
    kind: BufferKind,
    element_count: u32,
}

impl Binding {
    pub(crate) fn new(key: RegionKey, kind: BufferKind, element_count: u32) -> Self {
        Self { key, kind, element_count }
    }

    pub fn key(&self) -> RegionKey {
        self.key
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Vertex count, index count, or 1 for uniforms
    pub fn element_count(&self) -> u32 {
        self.element_count
    }
}

macro_rules! typed_binding {
    ($(#[$meta:meta])* $name:ident, $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Binding);

        impl $name {
            pub fn binding(&self) -> Binding {
                self.0
            }

            pub fn element_count(&self) -> u32 {
                self.0.element_count
            }
        }

        impl From<$name> for Binding {
            fn from(typed: $name) -> Binding {
                typed.0
            }
        }

        impl TryFrom<Binding> for $name {
            type Error = Error;

            fn try_from(binding: Binding) -> Result<Self> {
                if binding.kind == BufferKind::$kind {
                    Ok(Self(binding))
                } else {
                    Err(Error::InvalidResource(format!(
                        "expected a {} binding, got {}",
                        BufferKind::$kind.name(),
                        binding.kind.name()
                    )))
                }
            }
        }
    };
}

typed_binding!(
    /// Range of the shared vertex buffer
    VertexBufferBinding, Vertex
);
typed_binding!(
    /// Range of the shared index buffer
    IndexBufferBinding, Index
);
typed_binding!(
    /// Range of the uniform ring, present at the same offset in every slot
    UniformBufferBinding, Uniform
);

/// Bookkeeping of one live region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
    pub kind: BufferKind,
    pub offset: u64,
    /// Allocated size (aligned)
    pub size: u64,
    pub element_count: u32,
    /// Last frame that recorded a read of this region
    pub last_read_frame: Option<u64>,
}

/// Where a region currently lives, for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    pub kind: BufferKind,
    pub offset: u64,
    pub size: u64,
    pub element_count: u32,
}
