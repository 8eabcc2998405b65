use super::*;
use crate::device::mock_device::{MockDevice, MockEvent};
use crate::error::Error;

const LAYOUT: DescriptorSetLayoutHandle = DescriptorSetLayoutHandle::from_raw(1000);

fn created_pools(device: &MockDevice) -> usize {
    device
        .events()
        .iter()
        .filter(|e| matches!(e, MockEvent::CreateDescriptorPool(_)))
        .count()
}

// ============================================================================
// POOL KEYS
// ============================================================================

#[test]
fn test_pool_shape_key() {
    assert_eq!(PoolShape::new(1, 1).key(), 0x0101);
    assert_eq!(PoolShape::new(2, 0).key(), 0x0200);
    assert_ne!(PoolShape::new(1, 2).key(), PoolShape::new(2, 1).key());
}

#[test]
fn test_pool_sets_created_lazily_per_shape() {
    let mut device = MockDevice::new();
    let mut manager = DescriptorManager::new(2, 4);
    assert_eq!(manager.pool_set_count(), 0);

    manager.acquire(&mut device, PoolShape::new(1, 0), 0, LAYOUT).unwrap();
    manager.acquire(&mut device, PoolShape::new(1, 0), 1, LAYOUT).unwrap();
    manager.acquire(&mut device, PoolShape::new(1, 1), 0, LAYOUT).unwrap();

    assert_eq!(manager.pool_set_count(), 2);
    // one pool per slot per shape
    assert_eq!(device.live_pool_count(), 4);
}

// ============================================================================
// EXHAUSTION
// ============================================================================

#[test]
fn test_one_more_set_than_capacity_adds_pool() {
    let mut device = MockDevice::new();
    let mut manager = DescriptorManager::new(2, 3);
    let shape = PoolShape::new(1, 0);

    for _ in 0..3 {
        let (_, created) = manager.acquire(&mut device, shape, 0, LAYOUT).unwrap();
        assert!(!created);
    }
    let (_, created) = manager.acquire(&mut device, shape, 0, LAYOUT).unwrap();
    assert!(created);
    assert_eq!(manager.pool_set(shape).unwrap().pool_count(0), 2);
    assert_eq!(manager.pool_set(shape).unwrap().pool_count(1), 1);
    assert_eq!(manager.pools_created(), 1);
}

#[test]
fn test_reset_reuses_existing_pools() {
    let mut device = MockDevice::new();
    let mut manager = DescriptorManager::new(2, 2);
    let shape = PoolShape::new(1, 0);

    for _ in 0..5 {
        manager.acquire(&mut device, shape, 0, LAYOUT).unwrap();
    }
    assert_eq!(manager.pool_set(shape).unwrap().pool_count(0), 3);
    let pools_before = created_pools(&device);

    manager.reset_slot(&mut device, 0).unwrap();
    for _ in 0..5 {
        let (_, created) = manager.acquire(&mut device, shape, 0, LAYOUT).unwrap();
        assert!(!created);
    }
    assert_eq!(created_pools(&device), pools_before);
    assert_eq!(manager.pool_set(shape).unwrap().pool_count(0), 3);
}

#[test]
fn test_second_failure_is_explicit_error() {
    let mut device = MockDevice::new();
    let mut manager = DescriptorManager::new(1, 0);
    let shape = PoolShape::new(1, 0);
    assert_eq!(
        manager.acquire(&mut device, shape, 0, LAYOUT),
        Err(Error::DescriptorPoolExhausted)
    );
    assert_eq!(manager.pool_set(shape).unwrap().pool_count(0), 2);
}

#[test]
fn test_destroy_releases_every_pool() {
    let mut device = MockDevice::new();
    let mut manager = DescriptorManager::new(2, 1);
    manager.acquire(&mut device, PoolShape::new(1, 0), 0, LAYOUT).unwrap();
    manager.acquire(&mut device, PoolShape::new(1, 0), 0, LAYOUT).unwrap();
    manager.acquire(&mut device, PoolShape::new(0, 1), 1, LAYOUT).unwrap();
    assert_eq!(device.live_pool_count(), 5);

    manager.destroy(&mut device);
    assert_eq!(device.live_pool_count(), 0);
    assert_eq!(manager.pool_set_count(), 0);
}
