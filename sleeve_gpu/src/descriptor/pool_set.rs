/// Descriptor pool set for one pool shape
///
/// Per frame slot, a growable list of fixed-capacity descriptor pools. Sets
/// are allocated from the slot's current pool; when it is full the next
/// pool is used (an existing one if a previous frame already added it,
/// otherwise a newly created one) and the allocation is retried exactly
/// once. Resetting a slot resets all of its pools and rewinds to the first.

use crate::device::{DescriptorPoolHandle, DescriptorSetHandle, DescriptorSetLayoutHandle, GpuDevice, PoolShape};
use crate::error::{Error, Result};
use crate::engine_debug;

#[derive(Debug, Default)]
struct SlotPools {
    pools: Vec<DescriptorPoolHandle>,
    current: usize,
}

/// Outcome of one set allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredSet {
    pub set: DescriptorSetHandle,
    /// Whether a new pool had to be created
    pub created_pool: bool,
}

pub struct DescriptorPoolSet {
    shape: PoolShape,
    max_sets: u32,
    slots: Vec<SlotPools>,
}

impl DescriptorPoolSet {
    /// Create one pool per frame slot
    pub fn new<D: GpuDevice + ?Sized>(
        device: &mut D,
        shape: PoolShape,
        frames_in_flight: usize,
        max_sets: u32,
    ) -> Result<Self> {
        let mut pool_set = Self {
            shape,
            max_sets,
            slots: (0..frames_in_flight).map(|_| SlotPools::default()).collect(),
        };
        for slot in 0..frames_in_flight {
            match device.create_descriptor_pool(shape, max_sets) {
                Ok(pool) => pool_set.slots[slot].pools.push(pool),
                Err(e) => {
                    pool_set.destroy(device);
                    return Err(e);
                }
            }
        }
        Ok(pool_set)
    }

    /// Reset every pool of `slot`. Only valid once the slot's fences were waited.
    pub fn reset<D: GpuDevice + ?Sized>(&mut self, device: &mut D, slot: usize) -> Result<()> {
        let slot_pools = &mut self.slots[slot];
        for pool in &slot_pools.pools {
            device.reset_descriptor_pool(*pool)?;
        }
        slot_pools.current = 0;
        Ok(())
    }

    /// Allocate a set from `slot`'s pools
    pub fn acquire<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        slot: usize,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<AcquiredSet> {
        let slot_pools = &mut self.slots[slot];
        let pool = slot_pools.pools[slot_pools.current];
        match device.allocate_descriptor_set(pool, layout) {
            Ok(set) => return Ok(AcquiredSet { set, created_pool: false }),
            Err(Error::DescriptorPoolExhausted) => {}
            Err(e) => return Err(e),
        }

        let mut created_pool = false;
        slot_pools.current += 1;
        if slot_pools.current == slot_pools.pools.len() {
            let pool = device.create_descriptor_pool(self.shape, self.max_sets)?;
            slot_pools.pools.push(pool);
            created_pool = true;
            engine_debug!(
                "sleeve::descriptor",
                "Added descriptor pool #{} for shape {:?} in slot {}",
                slot_pools.pools.len(), self.shape, slot
            );
        }

        let pool = slot_pools.pools[slot_pools.current];
        let set = device.allocate_descriptor_set(pool, layout)?;
        Ok(AcquiredSet { set, created_pool })
    }

    pub fn shape(&self) -> PoolShape {
        self.shape
    }

    /// Number of pools owned by `slot`
    pub fn pool_count(&self, slot: usize) -> usize {
        self.slots[slot].pools.len()
    }

    pub fn destroy<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        for slot_pools in &mut self.slots {
            for pool in slot_pools.pools.drain(..) {
                device.destroy_descriptor_pool(pool);
            }
            slot_pools.current = 0;
        }
    }
}
