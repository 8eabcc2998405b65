/// Frame module - frame slots, transfer batches, deferred reclamation and
/// the frame pipeline controller

pub mod stats;
pub mod retirement;
pub mod transfer;
pub mod upload;
pub mod frame_slot;
pub mod pipeline;

pub use stats::*;
pub use retirement::*;
pub use transfer::*;
pub use upload::*;
pub use frame_slot::*;
pub use pipeline::*;
