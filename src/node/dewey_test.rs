use super::*;

#[test]
fn test_root_and_first_child() {
    let root = DeweyId::root();
    assert_eq!(root.as_divisions(), &[1]);
    assert_eq!(root.level(), 1);

    let child = root.first_child();
    assert_eq!(child.as_divisions(), &[1, 3]);
    assert!(root.is_ancestor_of(&child));
    assert!(!child.is_ancestor_of(&root));
    assert!(root < child);
}

#[test]
fn test_sibling_append() {
    let root = DeweyId::root();
    let a = root.first_child();
    let b = DeweyId::between(&root, Some(&a), None).unwrap();
    let c = DeweyId::between(&root, Some(&b), None).unwrap();
    assert!(a < b && b < c);
    assert!(root.is_ancestor_of(&b) && root.is_ancestor_of(&c));
}

#[test]
fn test_between_with_room() {
    let root = DeweyId::root();
    let a = root.first_child();
    let c = DeweyId::between(&root, Some(&a), None).unwrap();
    let b = DeweyId::between(&root, Some(&a), Some(&c)).unwrap();
    assert!(a < b && b < c);
    // midpoints stay odd.
    assert_eq!(b.as_divisions().last().unwrap() % 2, 1);
}

#[test]
fn test_between_adjacent_splices_caret() {
    let root = DeweyId::root();
    let a = root.first_child(); // [1, 3]
    let b = DeweyId::from_divisions(vec![1, 5]);
    let m = DeweyId::between(&root, Some(&a), Some(&b)).unwrap();
    assert!(a < m && m < b);
    // caret depth does not change the real level.
    assert_eq!(m.level(), a.level());
}

#[test]
fn test_before_first() {
    let root = DeweyId::root();
    let a = DeweyId::from_divisions(vec![1, 9]);
    let m = DeweyId::between(&root, None, Some(&a)).unwrap();
    assert!(m < a);
    assert!(root.is_ancestor_of(&m));
}

#[test]
fn test_many_inserts_stay_ordered() {
    let root = DeweyId::root();
    let mut ids = vec![root.first_child()];
    // repeatedly insert before the smallest sibling.
    for _ in 0..30 {
        let id = DeweyId::between(&root, None, Some(&ids[0])).unwrap();
        assert!(id < ids[0]);
        ids.insert(0, id);
    }
    for window in ids.windows(2) {
        assert!(window[0] < window[1]);
    }
}

#[test]
fn test_bytes_round_trip() {
    let ids = vec![
        DeweyId::root(),
        DeweyId::from_divisions(vec![1, 3, 5, 7]),
        DeweyId::from_divisions(vec![1, 200, 300_000]),
    ];
    for id in ids.into_iter() {
        let bytes = id.to_bytes();
        assert_eq!(DeweyId::from_bytes(&bytes).unwrap(), id);
    }
}

#[test]
fn test_decode_failures() {
    assert!(DeweyId::from_bytes(&[]).is_err());
    assert!(DeweyId::from_bytes(&[0x80]).is_err());
}
