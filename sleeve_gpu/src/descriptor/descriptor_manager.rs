/// Descriptor manager: pool sets keyed by shape
///
/// Pool sets are created lazily the first time a shape is requested and
/// live until shutdown.

use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;

use crate::device::{DescriptorSetHandle, DescriptorSetLayoutHandle, GpuDevice, PoolShape};
use crate::error::Result;
use super::pool_set::DescriptorPoolSet;

pub struct DescriptorManager {
    pool_sets: FxHashMap<u16, DescriptorPoolSet>,
    frames_in_flight: usize,
    max_sets_per_pool: u32,
    pools_created: u32,
}

impl DescriptorManager {
    pub fn new(frames_in_flight: usize, max_sets_per_pool: u32) -> Self {
        Self {
            pool_sets: FxHashMap::default(),
            frames_in_flight,
            max_sets_per_pool,
            pools_created: 0,
        }
    }

    /// Pool set for `shape`, created on first use
    pub fn get_or_create_pool_set<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        shape: PoolShape,
    ) -> Result<&mut DescriptorPoolSet> {
        let pool_set = match self.pool_sets.entry(shape.key()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(DescriptorPoolSet::new(
                device,
                shape,
                self.frames_in_flight,
                self.max_sets_per_pool,
            )?),
        };
        Ok(pool_set)
    }

    /// Reset the pools of `slot` in every pool set
    pub fn reset_slot<D: GpuDevice + ?Sized>(&mut self, device: &mut D, slot: usize) -> Result<()> {
        for pool_set in self.pool_sets.values_mut() {
            pool_set.reset(device, slot)?;
        }
        Ok(())
    }

    /// Allocate a set of `shape` for the frame recorded in `slot`
    pub fn acquire<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        shape: PoolShape,
        slot: usize,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<(DescriptorSetHandle, bool)> {
        let acquired = self.get_or_create_pool_set(device, shape)?.acquire(device, slot, layout)?;
        if acquired.created_pool {
            self.pools_created += 1;
        }
        Ok((acquired.set, acquired.created_pool))
    }

    pub fn pool_set(&self, shape: PoolShape) -> Option<&DescriptorPoolSet> {
        self.pool_sets.get(&shape.key())
    }

    pub fn pool_set_count(&self) -> usize {
        self.pool_sets.len()
    }

    /// Pools created on exhaustion since startup
    pub fn pools_created(&self) -> u32 {
        self.pools_created
    }

    pub fn destroy<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        for (_, mut pool_set) in self.pool_sets.drain() {
            pool_set.destroy(device);
        }
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
