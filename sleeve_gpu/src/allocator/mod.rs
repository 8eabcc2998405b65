/// Allocator module - offset-space suballocation

pub mod free_list;

pub use free_list::*;
