/// First-fit free-list allocator over a flat offset space
///
/// Tracks the free ranges of one buffer as an offset-ordered list of
/// `MemoryBlock`s. Allocation takes the first block large enough and carves
/// the request from its start; freeing inserts the range back in order and
/// merges it with both neighbours, so adjacent free ranges are always
/// coalesced.
///
/// Invariant: blocks are sorted, never overlap, never touch, and together
/// with the live allocations exactly cover `[0, capacity)`.
///
/// # Example
///
/// ```ignore
/// let mut list = FreeList::new(1000);
/// let a = list.allocate(100); // Some(0)
/// list.free(0, 100)?;         // blocks == [(0, 1000)]
/// ```

use crate::error::{Error, Result};

/// A free contiguous range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBlock {
    pub start_offset: u64,
    pub size: u64,
}

impl MemoryBlock {
    pub fn new(start_offset: u64, size: u64) -> Self {
        Self { start_offset, size }
    }

    /// One past the last byte
    pub fn end(&self) -> u64 {
        self.start_offset + self.size
    }
}

#[derive(Debug, Clone)]
pub struct FreeList {
    blocks: Vec<MemoryBlock>,
    capacity: u64,
}

impl FreeList {
    /// Create an allocator with a single free block covering `[0, capacity)`
    pub fn new(capacity: u64) -> Self {
        let mut list = Self { blocks: Vec::new(), capacity };
        list.reset();
        list
    }

    /// Mark the whole range free again
    pub fn reset(&mut self) {
        self.blocks.clear();
        if self.capacity > 0 {
            self.blocks.push(MemoryBlock::new(0, self.capacity));
        }
    }

    /// First-fit allocation. Returns `None` when no block is large enough
    /// (or `size` is zero); the caller decides whether to grow.
    pub fn allocate(&mut self, size: u64) -> Option<u64> {
        if size == 0 {
            return None;
        }
        let index = self.blocks.iter().position(|block| block.size >= size)?;
        let block = &mut self.blocks[index];
        let offset = block.start_offset;
        if block.size == size {
            self.blocks.remove(index);
        } else {
            block.start_offset += size;
            block.size -= size;
        }
        Some(offset)
    }

    /// Return `[offset, offset + size)` to the free list
    ///
    /// Rejects ranges outside the capacity and ranges that overlap memory
    /// already free (double free).
    pub fn free(&mut self, offset: u64, size: u64) -> Result<()> {
        let end = offset.checked_add(size).ok_or_else(|| {
            Error::InvalidResource(format!("free of {} bytes at {} overflows", size, offset))
        })?;
        if size == 0 || end > self.capacity {
            return Err(Error::InvalidResource(format!(
                "free of [{}, {}) outside capacity {}",
                offset, end, self.capacity
            )));
        }

        let index = self.blocks.partition_point(|block| block.start_offset < offset);
        let overlaps_prev = index > 0 && self.blocks[index - 1].end() > offset;
        let overlaps_next = index < self.blocks.len() && self.blocks[index].start_offset < end;
        if overlaps_prev || overlaps_next {
            return Err(Error::InvalidResource(format!(
                "free of [{}, {}) overlaps free memory",
                offset, end
            )));
        }

        let merge_prev = index > 0 && self.blocks[index - 1].end() == offset;
        let merge_next = index < self.blocks.len() && self.blocks[index].start_offset == end;
        match (merge_prev, merge_next) {
            (true, true) => {
                let next = self.blocks.remove(index);
                self.blocks[index - 1].size += size + next.size;
            }
            (true, false) => self.blocks[index - 1].size += size,
            (false, true) => {
                let next = &mut self.blocks[index];
                next.start_offset = offset;
                next.size += size;
            }
            (false, false) => self.blocks.insert(index, MemoryBlock::new(offset, size)),
        }
        Ok(())
    }

    /// Extend the offset space to `new_capacity`, appending the new tail as free
    pub fn grow(&mut self, new_capacity: u64) -> Result<()> {
        if new_capacity < self.capacity {
            return Err(Error::InvalidResource(format!(
                "cannot shrink free list from {} to {}",
                self.capacity, new_capacity
            )));
        }
        let added = new_capacity - self.capacity;
        if added == 0 {
            return Ok(());
        }
        match self.blocks.last_mut() {
            Some(last) if last.end() == self.capacity => last.size += added,
            _ => self.blocks.push(MemoryBlock::new(self.capacity, added)),
        }
        self.capacity = new_capacity;
        Ok(())
    }

    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Total free bytes
    pub fn free_bytes(&self) -> u64 {
        self.blocks.iter().map(|block| block.size).sum()
    }

    /// Total allocated bytes
    pub fn used_bytes(&self) -> u64 {
        self.capacity - self.free_bytes()
    }

    /// Largest request that would currently succeed
    pub fn largest_free_block(&self) -> u64 {
        self.blocks.iter().map(|block| block.size).max().unwrap_or(0)
    }

    /// Size of the free block that ends at the capacity, if any
    pub fn tail_free(&self) -> u64 {
        match self.blocks.last() {
            Some(last) if last.end() == self.capacity => last.size,
            _ => 0,
        }
    }
}

/// Round `value` up to a multiple of `alignment` (a power of two)
pub fn align_up(value: u64, alignment: u64) -> Option<u64> {
    debug_assert!(alignment.is_power_of_two());
    value.checked_add(alignment - 1).map(|v| v & !(alignment - 1))
}

#[cfg(test)]
#[path = "free_list_tests.rs"]
mod tests;
