/// Transfer batch: copies recorded during one frame
///
/// Copies are appended in call order. Whenever a copy touches bytes that an
/// earlier copy of the batch wrote (read-after-write, write-after-write) or
/// writes bytes an earlier copy read (write-after-read), a transfer barrier
/// is inserted first so later writes win and reads see completed writes.

use crate::device::{BufferCopy, BufferHandle, TransferCommand};

#[derive(Debug, Clone, Copy)]
struct Span {
    buffer: BufferHandle,
    offset: u64,
    size: u64,
}

impl Span {
    fn overlaps(&self, buffer: BufferHandle, offset: u64, size: u64) -> bool {
        self.buffer == buffer && self.offset < offset + size && offset < self.offset + self.size
    }
}

#[derive(Debug, Default)]
pub struct TransferBatch {
    commands: Vec<TransferCommand>,
    reads: Vec<Span>,
    writes: Vec<Span>,
    copies: u32,
    barriers: u32,
    bytes: u64,
}

impl TransferBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a copy, preceded by a barrier if it conflicts with earlier copies
    pub fn copy(&mut self, copy: BufferCopy) {
        let hazard = self.writes.iter().any(|w| {
            w.overlaps(copy.src, copy.src_offset, copy.size) || w.overlaps(copy.dst, copy.dst_offset, copy.size)
        }) || self.reads.iter().any(|r| r.overlaps(copy.dst, copy.dst_offset, copy.size));

        if hazard {
            self.commands.push(TransferCommand::Barrier);
            self.reads.clear();
            self.writes.clear();
            self.barriers += 1;
        }

        self.reads.push(Span { buffer: copy.src, offset: copy.src_offset, size: copy.size });
        self.writes.push(Span { buffer: copy.dst, offset: copy.dst_offset, size: copy.size });
        self.commands.push(TransferCommand::Copy(copy));
        self.copies += 1;
        self.bytes += copy.size;
    }

    pub fn commands(&self) -> &[TransferCommand] {
        &self.commands
    }

    /// Take the recorded commands and start a new batch
    pub fn take(&mut self) -> Vec<TransferCommand> {
        let commands = std::mem::take(&mut self.commands);
        *self = Self::default();
        commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn copy_count(&self) -> u32 {
        self.copies
    }

    pub fn barrier_count(&self) -> u32 {
        self.barriers
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
