/// Dedicated buffers: one device buffer per binding, outside the shared
/// vertex and index buffers
///
/// Meant for long-lived meshes owned by a single object (text meshes,
/// static geometry). Destruction is deferred through the frame slots'
/// retirement queues like every other resource.

use slotmap::new_key_type;
use crate::device::{BufferDesc, BufferHandle, MemoryLocation};
use super::BufferKind;

new_key_type! {
    /// Key of a live dedicated buffer in the frame pipeline
    pub struct DedicatedKey;
}

/// Handle to a buffer created by `create_dedicated_buffer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedicatedBinding {
    key: DedicatedKey,
    kind: BufferKind,
    element_count: u32,
}

impl DedicatedBinding {
    pub(crate) fn new(key: DedicatedKey, kind: BufferKind, element_count: u32) -> Self {
        Self { key, kind, element_count }
    }

    pub fn key(&self) -> DedicatedKey {
        self.key
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }
}

/// Bookkeeping of one live dedicated buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DedicatedBuffer {
    pub kind: BufferKind,
    pub buffer: BufferHandle,
    pub size: u64,
    pub element_count: u32,
}

/// Descriptor of a dedicated buffer created during frame `frame_index`
pub(crate) fn dedicated_desc(kind: BufferKind, size: u64, frame_index: u64) -> BufferDesc {
    BufferDesc {
        name: format!("dedicated_{}_f{}", kind.name(), frame_index),
        size,
        usage: kind.usage(),
        location: MemoryLocation::DeviceLocal,
    }
}
