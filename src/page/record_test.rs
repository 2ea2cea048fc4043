use super::*;

use crate::node::{Node, NodeHeader, Payload, StructDelegate, ValueDelegate};

fn string_node(key: i64) -> Record {
    Record::Node(Node::new(
        NodeHeader {
            node_key: key,
            parent_key: 0,
            hash: 7,
            previous_revision: 1,
            last_modified_revision: 1,
        },
        Payload::StringValue {
            st: StructDelegate::default(),
            value: ValueDelegate {
                value: format!("value-{}", key).into_bytes(),
            },
            in_object: false,
        },
    ))
}

#[test]
fn test_set_get_record() {
    let mut page = RecordPage::new(0, IndexType::Document, 1, 64);
    assert!(page.get_record(5).unwrap().is_none());

    page.set_record(5, string_node(5)).unwrap();
    page.set_record(9, string_node(9)).unwrap();

    let record = page.get_record(5).unwrap().unwrap();
    assert_eq!(record.key(), 5);
    // cached decode returns the same record.
    assert_eq!(page.get_record(5).unwrap().unwrap(), record);

    assert_eq!(page.occupied(), vec![5, 9]);
    assert!(page.get_record(64).is_err());
}

#[test]
fn test_slots_and_clear() {
    let mut page = RecordPage::new(2, IndexType::Document, 1, 16);
    page.set_record(3, string_node(3 + 2 * 16)).unwrap();
    match page.get_slot(3).unwrap().unwrap() {
        Slot::Bytes(data) => assert!(!data.is_empty()),
        Slot::Overflow => panic!("unexpected overflow"),
    }

    page.clear_slot(3).unwrap();
    assert!(page.get_slot(3).unwrap().is_none());
    assert!(page.get_record(3).unwrap().is_none());
    assert!(page.is_empty());
}

#[test]
fn test_dewey_side_table() {
    let mut page = RecordPage::new(0, IndexType::Document, 1, 16);
    page.set_dewey_id(4, vec![1, 3, 5]).unwrap();
    assert_eq!(page.get_dewey_id(4).unwrap(), Some(&[1_u8, 3, 5][..]));
    assert_eq!(page.get_dewey_id(5).unwrap(), None);
}

#[test]
fn test_overflow_reference() {
    let mut page = RecordPage::new(0, IndexType::Document, 1, 16);
    page.set_slot(7, Slot::Overflow).unwrap();
    page.set_page_reference(7, PageRef::with_offset(7777));

    // raw get_record cannot resolve an overflow slot.
    assert!(page.get_record(7).is_err());
    assert_eq!(page.get_page_reference(7).unwrap().key, 7777);
}

#[test]
fn test_pin_count() {
    let page = RecordPage::new(0, IndexType::Document, 1, 16);
    assert_eq!(page.pin_count(), 0);
    assert_eq!(page.pin(), 1);
    assert_eq!(page.pin(), 2);
    assert_eq!(page.unpin(), 1);
}

#[test]
fn test_encode_decode() {
    let mut page = RecordPage::new(11, IndexType::Document, 4, 32);
    page.set_record(0, string_node(11 * 32)).unwrap();
    page.set_record(31, string_node(11 * 32 + 31)).unwrap();
    page.set_dewey_id(0, vec![1, 3]).unwrap();
    page.set_slot(2, Slot::Overflow).unwrap();
    page.set_page_reference(11 * 32 + 2, PageRef::with_offset(999));

    let mut buf = vec![];
    page.encode(&mut buf);
    let back = RecordPage::decode(&mut buf.as_slice()).unwrap();

    assert_eq!(back, page);
    assert_eq!(back.page_key(), 11);
    assert_eq!(back.index_type(), IndexType::Document);
    assert_eq!(back.revision(), 4);
    assert_eq!(back.capacity(), 32);
    assert_eq!(back.get_record(31).unwrap().unwrap().key(), 11 * 32 + 31);
}
