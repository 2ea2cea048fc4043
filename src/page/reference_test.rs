use super::*;

#[test]
fn test_wire_round_trip() {
    let mut reference = PageRef::new();
    assert!(!reference.is_resolved());

    reference.resolve(3, 4096, vec![0xAB; 16]);
    reference.resolve(5, 8192, vec![0xCD; 16]);

    let mut buf = vec![];
    reference.encode(&mut buf);
    let back = PageRef::decode(&mut buf.as_slice()).unwrap();

    assert_eq!(back.key, 8192);
    assert_eq!(back.hash, vec![0xCD; 16]);
    assert_eq!(back.fragments, vec![(3, 4096), (5, 8192)]);
    assert_eq!(back.log_key, None);
    assert_eq!(back, reference);
}

#[test]
fn test_wire_layout() {
    let mut reference = PageRef::with_offset(0x10);
    reference.hash = vec![0xFF];
    reference.fragments = vec![(2, 0x20)];

    let mut buf = vec![];
    reference.encode(&mut buf);
    // u64 offset || u8 hash_len || hash || u16 count || (u32, u64).
    assert_eq!(buf.len(), 8 + 1 + 1 + 2 + 12);
    assert_eq!(&buf[..8], &[0, 0, 0, 0, 0, 0, 0, 0x10]);
    assert_eq!(buf[8], 1);
    assert_eq!(buf[9], 0xFF);
    assert_eq!(&buf[10..12], &[0, 1]);
}

#[test]
fn test_prune_fragments() {
    let mut reference = PageRef::new();
    for revision in 1..=5 {
        reference.resolve(revision, u64::from(revision) * 100, vec![]);
    }

    reference.prune_fragments(4);
    assert_eq!(reference.fragments, vec![(4, 400), (5, 500)]);

    // the latest fragment survives any watermark.
    reference.prune_fragments(100);
    assert_eq!(reference.fragments, vec![(5, 500)]);
}

#[test]
fn test_log_key_is_transient() {
    let mut reference = PageRef::with_offset(64);
    reference.log_key = Some(9);
    let mut buf = vec![];
    reference.encode(&mut buf);
    let back = PageRef::decode(&mut buf.as_slice()).unwrap();
    assert_eq!(back.log_key, None);
}
