/// Device module - the backend interface and its plain data types

pub mod handles;
pub mod types;
pub mod gpu_device;

pub use handles::*;
pub use types::*;
pub use gpu_device::*;

// In-memory device for tests (no GPU required)
#[cfg(test)]
pub mod mock_device;
