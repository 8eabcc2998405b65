/// Deferred reclamation
///
/// Each frame slot owns a `RetirementQueue`. Replaced or destroyed buffers
/// and returned ranges are pushed onto the queue of the slot that was
/// recording (or last submitted) when they were retired. The queue is
/// flushed only once that slot's fences are known to be signaled, so the
/// GPU can no longer read anything in it.

use crate::buffer::BufferKind;
use crate::device::BufferHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retired {
    /// Whole device buffer, destroyed on flush
    Buffer(BufferHandle),
    /// Suballocated range, returned to its allocator on flush
    Range { kind: BufferKind, offset: u64, size: u64 },
}

#[derive(Debug, Default)]
pub struct RetirementQueue {
    entries: Vec<Retired>,
}

impl RetirementQueue {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn retire_buffer(&mut self, buffer: BufferHandle) {
        self.entries.push(Retired::Buffer(buffer));
    }

    pub fn retire_range(&mut self, kind: BufferKind, offset: u64, size: u64) {
        self.entries.push(Retired::Range { kind, offset, size });
    }

    /// Take every entry, leaving the queue empty
    pub fn take(&mut self) -> Vec<Retired> {
        std::mem::take(&mut self.entries)
    }

    pub fn entries(&self) -> &[Retired] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "retirement_tests.rs"]
mod tests;
