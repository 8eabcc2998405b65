use super::*;
use crate::buffer::test_harness::UploadHarness;

fn bytes(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

fn vertex_buffer(harness: &mut UploadHarness, size: u64) -> SharedBuffer {
    SharedBuffer::new(&mut harness.device, BufferKind::Vertex, size, 4, 24).unwrap()
}

// ============================================================================
// ACQUIRE / RELEASE
// ============================================================================

#[test]
fn test_acquire_uploads_bytes() {
    let mut harness = UploadHarness::new(4096);
    let mut shared = vertex_buffer(&mut harness, 1000);
    let data = bytes(1, 100);

    let (offset, size) = shared.acquire(&data, &mut harness.ctx()).unwrap();
    assert_eq!((offset, size), (0, 100));
    harness.flush();

    assert_eq!(harness.device.read_buffer(shared.buffer(), 0, 100), data);
    assert_eq!(harness.stats.bytes_staged, 100);
    assert_eq!(harness.stats.copies, 1);
}

#[test]
fn test_region_size_is_aligned() {
    let mut harness = UploadHarness::new(4096);
    let mut shared = vertex_buffer(&mut harness, 1000);
    let (offset_a, size_a) = shared.acquire(&[1; 6], &mut harness.ctx()).unwrap();
    let (offset_b, _) = shared.acquire(&[2; 4], &mut harness.ctx()).unwrap();
    assert_eq!((offset_a, size_a), (0, 8));
    assert_eq!(offset_b, 8);
}

#[test]
fn test_release_makes_range_reusable() {
    let mut harness = UploadHarness::new(4096);
    let mut shared = vertex_buffer(&mut harness, 1000);
    let (offset, size) = shared.acquire(&[1; 200], &mut harness.ctx()).unwrap();
    shared.release(offset, size).unwrap();
    assert_eq!(shared.free_list().free_bytes(), 1000);
    assert!(shared.release(offset, size).is_err());
}

// ============================================================================
// GROWTH
// ============================================================================

#[test]
fn test_growth_doubles_and_preserves_data() {
    let mut harness = UploadHarness::new(4096);
    let mut shared = vertex_buffer(&mut harness, 1000);
    let first = bytes(10, 600);
    let second = bytes(99, 600);

    let (a, _) = shared.acquire(&first, &mut harness.ctx()).unwrap();
    let old_buffer = shared.buffer();
    let (b, _) = shared.acquire(&second, &mut harness.ctx()).unwrap();

    assert_eq!(shared.capacity(), 2000);
    assert_eq!((a, b), (0, 600));
    assert_ne!(shared.buffer(), old_buffer);
    assert_eq!(harness.retired.len(), 1);
    assert_eq!(harness.stats.buffer_growths, 1);

    harness.flush();
    harness.reclaim();
    assert!(!harness.device.is_buffer_alive(old_buffer));
    assert_eq!(harness.device.read_buffer(shared.buffer(), 0, 600), first);
    assert_eq!(harness.device.read_buffer(shared.buffer(), 600, 600), second);
}

#[test]
fn test_growth_repeats_doubling_until_fit() {
    let mut harness = UploadHarness::new(16384);
    let mut shared = vertex_buffer(&mut harness, 1000);
    let (offset, _) = shared.acquire(&bytes(3, 5000), &mut harness.ctx()).unwrap();
    assert_eq!(offset, 0);
    assert_eq!(shared.capacity(), 8000);
    assert_eq!(shared.growths(), 1);
}

#[test]
fn test_growth_keeps_holes_and_offsets() {
    let mut harness = UploadHarness::new(8192);
    let mut shared = vertex_buffer(&mut harness, 1000);
    let a = bytes(1, 100);
    let c = bytes(50, 800);
    let (offset_a, _) = shared.acquire(&a, &mut harness.ctx()).unwrap();
    let (offset_b, size_b) = shared.acquire(&[7; 100], &mut harness.ctx()).unwrap();
    let (offset_c, _) = shared.acquire(&c, &mut harness.ctx()).unwrap();
    harness.flush();
    shared.release(offset_b, size_b).unwrap();

    let (offset_d, _) = shared.acquire(&[4; 300], &mut harness.ctx()).unwrap();
    assert_eq!(offset_d, 1000);
    assert_eq!(shared.free_list().blocks()[0], crate::allocator::MemoryBlock::new(100, 100));

    harness.flush();
    harness.reclaim();
    assert_eq!(harness.device.read_buffer(shared.buffer(), offset_a, 100), a);
    assert_eq!(harness.device.read_buffer(shared.buffer(), offset_c, 800), c);
    assert_eq!(harness.device.read_buffer(shared.buffer(), 1000, 300), vec![4; 300]);
}

#[test]
fn test_growth_staging_exhaustion_leaves_buffer_intact() {
    let mut harness = UploadHarness::new(2000);
    let mut shared = vertex_buffer(&mut harness, 1000);
    shared.acquire(&[1; 600], &mut harness.ctx()).unwrap();
    let buffer = shared.buffer();

    let err = shared.acquire(&[2; 600], &mut harness.ctx()).unwrap_err();
    assert!(matches!(err, Error::StagingExhausted { requested: 1000, .. }));
    assert_eq!(shared.buffer(), buffer);
    assert_eq!(shared.capacity(), 1000);
    assert!(harness.retired.is_empty());
}

#[test]
fn test_grown_capacity() {
    assert_eq!(grown_capacity(1000, 400, 600), Ok(2000));
    assert_eq!(grown_capacity(1000, 0, 5000), Ok(8000));
    assert_eq!(grown_capacity(1 << 63, 0, u64::MAX), Err(Error::OutOfMemory));
}
