use super::*;

use rand::{rngs::SmallRng, Rng, SeedableRng};

#[test]
fn test_set_get_reference() {
    let mut page = IndirectPage::new();
    assert!(page.get_reference(0).is_none());

    page.set_reference(10, PageRef::with_offset(100));
    page.set_reference(3, PageRef::with_offset(30));
    page.set_reference(512, PageRef::with_offset(5000));

    assert_eq!(page.cardinality(), 3);
    assert_eq!(page.get_reference(3).unwrap().key, 30);
    assert_eq!(page.get_reference(10).unwrap().key, 100);
    assert_eq!(page.get_reference(512).unwrap().key, 5000);
    assert!(page.get_reference(4).is_none());

    // overwrite keeps cardinality.
    page.set_reference(10, PageRef::with_offset(101));
    assert_eq!(page.cardinality(), 3);
    assert_eq!(page.get_reference(10).unwrap().key, 101);
}

#[test]
fn test_index_is_rank() {
    let mut page = IndirectPage::new();
    let offsets = [1_usize, 7, 63, 64, 65, 130, 1000];
    for (n, offset) in offsets.iter().enumerate() {
        page.set_reference(*offset, PageRef::with_offset(n as u64 + 1));
    }
    assert_eq!(page.index(0), 0);
    assert_eq!(page.index(1), 0);
    assert_eq!(page.index(2), 1);
    assert_eq!(page.index(64), 3);
    assert_eq!(page.index(65), 4);
    assert_eq!(page.index(1001), 7);
}

#[test]
fn test_index_matches_bitmap_after_shadow_invalidation() {
    let seed: u64 = rand::random();
    println!("test_index_matches seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let mut page = IndirectPage::new();
    let mut offsets = vec![];
    for _ in 0..200 {
        let offset = rng.gen::<usize>() % INP_REFERENCE_COUNT;
        page.set_reference(offset, PageRef::with_offset(1));
        offsets.push(offset);
    }

    let with_shadow: Vec<usize> = (0..INP_REFERENCE_COUNT).map(|o| page.index(o)).collect();
    page.invalidate_shadow();
    assert!(page.shadow_words().is_none());
    let without: Vec<usize> = (0..INP_REFERENCE_COUNT).map(|o| page.index(o)).collect();
    assert_eq!(with_shadow, without);

    page.ensure_shadow();
    // rebuilt shadow equals the bitmap.
    let rebuilt: Vec<usize> = (0..INP_REFERENCE_COUNT).map(|o| page.index(o)).collect();
    assert_eq!(with_shadow, rebuilt);
}

#[test]
fn test_full_signal() {
    let mut page = IndirectPage::new();
    let mut full = false;
    for offset in 0..INP_REFERENCE_COUNT - 16 {
        full = page.set_reference(offset, PageRef::with_offset(offset as u64 + 1));
    }
    assert!(full, "full-signal at {} references", page.cardinality());

    let mut page = IndirectPage::new();
    for offset in 0..INP_REFERENCE_COUNT - 17 {
        assert!(!page.set_reference(offset, PageRef::with_offset(1)));
    }
}

#[test]
fn test_encode_forms() {
    // dense form.
    let mut dense = IndirectPage::new();
    dense.set_reference(9, PageRef::with_offset(90));
    dense.set_reference(400, PageRef::with_offset(4000));
    round_trip(&dense);

    // bitmap form.
    let mut bitmap = IndirectPage::new();
    for offset in (0..300).step_by(3) {
        bitmap.set_reference(offset, PageRef::with_offset(offset as u64 + 7));
    }
    round_trip(&bitmap);

    // full form.
    let mut full = IndirectPage::new();
    for offset in 0..INP_REFERENCE_COUNT {
        full.set_reference(offset, PageRef::with_offset(offset as u64 + 1));
    }
    round_trip(&full);
}

fn round_trip(page: &IndirectPage) {
    let mut buf = vec![];
    page.encode(&mut buf);
    let back = IndirectPage::decode(&mut buf.as_slice()).unwrap();
    assert_eq!(&back, page);
}
