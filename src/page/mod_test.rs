use super::*;

#[test]
fn test_alignment_constants() {
    assert_eq!(FIRST_BEACON, 2 * UBER_PAGE_BYTE_ALIGN);
    assert!(REVISION_ROOT_PAGE_BYTE_ALIGN.is_power_of_two());
    assert!(PAGE_FRAGMENT_BYTE_ALIGN.is_power_of_two());
    assert!(UBER_PAGE_BYTE_ALIGN.is_power_of_two());
    assert_eq!(1 << INP_LEVEL_BITS, INP_REFERENCE_COUNT as u32);
}

#[test]
fn test_page_alignment_by_kind() {
    let uber = Page::Uber(UberPage::bootstrap());
    let root = Page::RevisionRoot(RevisionRootPage::bootstrap());
    let indirect = Page::Indirect(IndirectPage::new());
    assert_eq!(uber.alignment(), UBER_PAGE_BYTE_ALIGN);
    assert_eq!(root.alignment(), REVISION_ROOT_PAGE_BYTE_ALIGN);
    assert_eq!(indirect.alignment(), PAGE_FRAGMENT_BYTE_ALIGN);
}

#[test]
fn test_index_type_tags() {
    for it in [
        IndexType::Document,
        IndexType::PathSummary,
        IndexType::Path,
        IndexType::Cas,
        IndexType::Name,
        IndexType::RevisionRoots,
    ]
    .iter()
    {
        assert_eq!(IndexType::from_u8(*it as u8).unwrap(), *it);
    }
    assert!(IndexType::from_u8(77).is_err());
}

#[test]
fn test_subtree_refs() {
    let mut root = RevisionRootPage::bootstrap();
    *root.subtree_ref_mut(IndexType::Cas) = PageRef::with_offset(808);
    assert_eq!(root.subtree_ref(IndexType::Cas).key, 808);
    assert_eq!(root.cas_index.key, 808);
    assert!(!root.subtree_ref(IndexType::Document).is_resolved());
}

#[test]
fn test_index_root_meta_index_type() {
    assert_eq!(
        IndexRootMeta::new(0, 0).index_type().unwrap(),
        IndexType::Name
    );
    assert_eq!(
        IndexRootMeta::new(1, 0).index_type().unwrap(),
        IndexType::Path
    );
    assert_eq!(
        IndexRootMeta::new(2, 0).index_type().unwrap(),
        IndexType::Cas
    );
    assert!(IndexRootMeta::new(9, 0).index_type().is_err());
}
