/*!
# Sleeve GPU

GPU suballocation and frame pipelining for a 2D/3D renderer.

Game code never sees a device buffer: it acquires small regions of a few
large shared buffers, draws them, updates them and returns them. The layer
streams every upload through a per-frame staging arena on a dedicated
transfer queue and keeps up to N frames in flight without the CPU ever
touching memory the GPU may still be reading.

## Architecture

- **GpuDevice**: backend trait (Vulkan lives in `sleeve_gpu_vulkan`)
- **FreeList**: first-fit offset allocator with neighbour merging
- **SharedBuffer**: growable device-local vertex / index buffer
- **UniformRing**: one uniform buffer per frame slot, refreshed from CPU shadows
- **StagingArena**: host-visible upload space, reset every N frames
- **DescriptorManager**: per-shape, per-slot descriptor pools
- **FramePipeline**: owns all of the above and drives begin / end frame
*/

// Internal modules
mod error;
pub mod log;
pub mod config;
pub mod device;
pub mod allocator;
pub mod buffer;
pub mod frame;
pub mod descriptor;

// Main sleeve namespace module
pub mod sleeve {
    // Error types
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::{GpuConfig, MAX_FRAMES_IN_FLIGHT};

    // Frame pipeline controller
    pub use crate::frame::{BeginFrame, FramePipeline, FrameStats, ShaderPipeline};

    // Bindings handed to game code
    pub use crate::buffer::{
        Binding, BufferKind, DedicatedBinding, IndexBufferBinding, RegionInfo, UniformBufferBinding,
        VertexBufferBinding, VertexPcu,
    };

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Backend interface sub-module
    pub mod device {
        pub use crate::device::*;
    }

    // Allocation building blocks
    pub mod alloc {
        pub use crate::allocator::*;
        pub use crate::buffer::{SharedBuffer, StagingArena, UniformRing};
        pub use crate::descriptor::*;
    }
}
