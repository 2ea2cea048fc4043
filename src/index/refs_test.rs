use super::*;

#[test]
fn test_add_remove_contains() {
    let mut refs = NodeReferences::new();
    assert!(refs.is_empty());

    refs.add(3);
    refs.add(1_000_000_000_000);
    refs.add(3);
    assert_eq!(refs.len(), 2);
    assert!(refs.contains(3));
    assert!(refs.contains(1_000_000_000_000));
    assert!(!refs.contains(4));

    assert!(refs.remove(3));
    assert!(!refs.remove(3));
    assert_eq!(refs.to_keys(), vec![1_000_000_000_000]);
}

#[test]
fn test_keys_are_sorted() {
    let mut refs = NodeReferences::new();
    for key in [9_i64, 2, 7, 2, 100].iter() {
        refs.add(*key);
    }
    assert_eq!(refs.to_keys(), vec![2, 7, 9, 100]);
}

#[test]
fn test_encode_decode() {
    let mut refs = NodeReferences::new();
    for key in 0..1000_i64 {
        refs.add(key * 3);
    }
    let mut buf = vec![];
    refs.encode(&mut buf);
    let back = NodeReferences::decode(&mut buf.as_slice()).unwrap();
    assert_eq!(back, refs);
    assert_eq!(back.len(), 1000);
}

#[test]
fn test_empty_encode_decode() {
    let refs = NodeReferences::new();
    let mut buf = vec![];
    refs.encode(&mut buf);
    let back = NodeReferences::decode(&mut buf.as_slice()).unwrap();
    assert!(back.is_empty());
}
