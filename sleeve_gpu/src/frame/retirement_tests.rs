use super::*;

#[test]
fn test_take_preserves_order_and_empties() {
    let mut queue = RetirementQueue::new();
    queue.retire_buffer(BufferHandle::from_raw(7));
    queue.retire_range(BufferKind::Vertex, 64, 32);
    assert_eq!(queue.len(), 2);

    let taken = queue.take();
    assert_eq!(
        taken,
        vec![
            Retired::Buffer(BufferHandle::from_raw(7)),
            Retired::Range { kind: BufferKind::Vertex, offset: 64, size: 32 },
        ]
    );
    assert!(queue.is_empty());
}

#[test]
fn test_take_on_empty_queue() {
    let mut queue = RetirementQueue::default();
    assert!(queue.take().is_empty());
    assert!(queue.entries().is_empty());
}
