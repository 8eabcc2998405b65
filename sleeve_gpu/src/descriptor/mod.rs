/// Descriptor module - per-shape, per-frame-slot pools of descriptor pools

pub mod pool_set;
pub mod descriptor_manager;

pub use pool_set::*;
pub use descriptor_manager::*;
