use super::*;

#[test]
fn test_copy_in_get() {
    let mut arena = Arena::new(64);
    let a = arena.copy_in(b"hello");
    let b = arena.copy_in(b"world");
    assert_eq!(arena.get(a), b"hello");
    assert_eq!(arena.get(b), b"world");
    assert_eq!(arena.len(), 10);
}

#[test]
fn test_block_rollover() {
    let mut arena = Arena::new(16);
    let mut refs = vec![];
    for i in 0..10 {
        refs.push((i, arena.copy_in(&[i as u8; 7])));
    }
    for (i, aref) in refs.into_iter() {
        assert_eq!(arena.get(aref), &[i as u8; 7]);
    }
    assert_eq!(arena.len(), 70);
}

#[test]
fn test_oversize_payload() {
    let mut arena = Arena::new(16);
    let big = vec![7_u8; 100];
    let aref = arena.copy_in(&big);
    assert_eq!(arena.get(aref), big.as_slice());
}

#[test]
fn test_reset_rewinds_without_freeing() {
    let mut arena = Arena::new(32);
    for _ in 0..8 {
        arena.copy_in(&[0; 20]);
    }
    let reserved = arena.footprint();
    assert!(reserved >= 32);

    arena.reset();
    assert!(arena.is_empty());
    // the first block keeps its capacity.
    assert!(arena.footprint() >= 32);

    let aref = arena.copy_in(b"fresh");
    assert_eq!(arena.get(aref), b"fresh");
}
