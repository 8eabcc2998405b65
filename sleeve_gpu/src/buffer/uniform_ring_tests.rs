use super::*;
use crate::buffer::test_harness::UploadHarness;

fn ring(harness: &mut UploadHarness, size: u64) -> UniformRing {
    UniformRing::new(&mut harness.device, 2, size, 256).unwrap()
}

#[test]
fn test_acquire_writes_current_slot_and_marks_others_stale() {
    let mut harness = UploadHarness::new(8192);
    let mut ring = ring(&mut harness, 1024);

    let (offset, size) = ring.acquire(&[1; 64], 0, &mut harness.ctx()).unwrap();
    assert_eq!((offset, size), (0, 256));
    harness.flush();

    assert_eq!(harness.device.read_buffer(ring.buffer(0), 0, 64), vec![1; 64]);
    assert_eq!(harness.device.read_buffer(ring.buffer(1), 0, 64), vec![0; 64]);
    assert_eq!(ring.stale_count(0), 0);
    assert_eq!(ring.stale_count(1), 1);
}

#[test]
fn test_refresh_slot_uploads_shadow() {
    let mut harness = UploadHarness::new(8192);
    let mut ring = ring(&mut harness, 1024);
    ring.acquire(&[5; 32], 0, &mut harness.ctx()).unwrap();
    harness.flush();

    assert_eq!(ring.refresh_slot(1, &mut harness.ctx()).unwrap(), 1);
    harness.flush();
    assert_eq!(harness.device.read_buffer(ring.buffer(1), 0, 32), vec![5; 32]);
    assert_eq!(ring.stale_count(1), 0);
    assert_eq!(ring.refresh_slot(1, &mut harness.ctx()).unwrap(), 0);
}

#[test]
fn test_update_writes_only_current_slot() {
    let mut harness = UploadHarness::new(8192);
    let mut ring = ring(&mut harness, 1024);
    let (offset, _) = ring.acquire(&[1; 16], 0, &mut harness.ctx()).unwrap();
    ring.refresh_slot(1, &mut harness.ctx()).unwrap();
    harness.flush();

    ring.update(offset, &[2; 16], 1, &mut harness.ctx()).unwrap();
    harness.flush();
    assert_eq!(harness.device.read_buffer(ring.buffer(1), offset, 16), vec![2; 16]);
    assert_eq!(harness.device.read_buffer(ring.buffer(0), offset, 16), vec![1; 16]);
    assert_eq!(ring.stale_count(0), 1);

    ring.refresh_slot(0, &mut harness.ctx()).unwrap();
    harness.flush();
    assert_eq!(harness.device.read_buffer(ring.buffer(0), offset, 16), vec![2; 16]);
}

#[test]
fn test_update_unknown_offset_rejected() {
    let mut harness = UploadHarness::new(8192);
    let mut ring = ring(&mut harness, 1024);
    assert!(matches!(
        ring.update(256, &[1], 0, &mut harness.ctx()),
        Err(Error::InvalidResource(_))
    ));
}

#[test]
fn test_forget_and_release() {
    let mut harness = UploadHarness::new(8192);
    let mut ring = ring(&mut harness, 1024);
    let (offset, size) = ring.acquire(&[1; 16], 0, &mut harness.ctx()).unwrap();
    ring.forget(offset);
    assert_eq!(ring.stale_count(1), 0);
    assert_eq!(ring.live_regions(), 0);

    ring.release(offset, size).unwrap();
    assert_eq!(ring.free_list().free_bytes(), 1024);
}

#[test]
fn test_growth_replaces_every_slot_buffer() {
    let mut harness = UploadHarness::new(8192);
    let mut ring = ring(&mut harness, 512);
    ring.acquire(&[1; 16], 0, &mut harness.ctx()).unwrap();
    ring.acquire(&[2; 16], 0, &mut harness.ctx()).unwrap();
    harness.flush();
    let old = [ring.buffer(0), ring.buffer(1)];

    let (offset, _) = ring.acquire(&[3; 16], 0, &mut harness.ctx()).unwrap();
    assert_eq!(offset, 512);
    assert_eq!(ring.capacity(), 1024);
    assert_eq!(ring.growths(), 1);
    assert!(old.iter().all(|b| *b != ring.buffer(0) && *b != ring.buffer(1)));
    assert_eq!(harness.retired.len(), 2);

    harness.flush();
    harness.reclaim();
    assert_eq!(harness.device.read_buffer(ring.buffer(0), 0, 16), vec![1; 16]);
    assert_eq!(harness.device.read_buffer(ring.buffer(0), 256, 16), vec![2; 16]);
    assert_eq!(harness.device.read_buffer(ring.buffer(0), 512, 16), vec![3; 16]);
    assert_eq!(ring.stale_count(1), 3);
}

#[test]
fn test_destroy_releases_all_slots() {
    let mut harness = UploadHarness::new(1024);
    let mut ring = ring(&mut harness, 512);
    // staging arena + 2 ring buffers
    assert_eq!(harness.device.live_buffer_count(), 3);
    ring.destroy(&mut harness.device);
    assert_eq!(harness.device.live_buffer_count(), 1);
}
