use super::*;

fn header(key: i64) -> NodeHeader {
    NodeHeader {
        node_key: key,
        parent_key: key - 1,
        hash: 0xFEED_F00D,
        previous_revision: 1,
        last_modified_revision: 2,
    }
}

fn st() -> StructDelegate {
    StructDelegate {
        first_child: 10,
        last_child: 12,
        left_sibling: 4,
        right_sibling: 6,
        child_count: 3,
        descendant_count: 9,
    }
}

fn name() -> NameDelegate {
    NameDelegate {
        uri_key: 1,
        prefix_key: -1,
        local_name_key: 2,
        path_node_key: 7,
    }
}

fn every_variant() -> Vec<Node> {
    vec![
        Node::new(header(0), Payload::XmlDocument { st: StructDelegate::default() }),
        Node::new(
            header(1),
            Payload::Element {
                st: st(),
                name: name(),
                attribute_keys: vec![21, 22],
                namespace_keys: vec![23],
            },
        ),
        Node::new(
            header(2),
            Payload::Attribute {
                name: name(),
                value: ValueDelegate { value: b"attr".to_vec() },
            },
        ),
        Node::new(header(3), Payload::Namespace { name: name() }),
        Node::new(
            header(4),
            Payload::Text {
                st: st(),
                value: ValueDelegate { value: b"text".to_vec() },
            },
        ),
        Node::new(
            header(5),
            Payload::Comment {
                st: st(),
                value: ValueDelegate { value: b"note".to_vec() },
            },
        ),
        Node::new(
            header(6),
            Payload::ProcessingInstruction {
                st: st(),
                name: name(),
                value: ValueDelegate { value: b"pi".to_vec() },
            },
        ),
        Node::new(header(7), Payload::JsonDocument { st: StructDelegate::default() }),
        Node::new(header(8), Payload::Object { st: st() }),
        Node::new(
            header(9),
            Payload::ObjectKey {
                st: st(),
                name_key: 11,
                path_node_key: 3,
            },
        ),
        Node::new(header(10), Payload::Array { st: st() }),
        Node::new(
            header(11),
            Payload::StringValue {
                st: st(),
                value: ValueDelegate { value: b"x".to_vec() },
                in_object: true,
            },
        ),
        Node::new(
            header(12),
            Payload::StringValue {
                st: st(),
                value: ValueDelegate { value: b"y".to_vec() },
                in_object: false,
            },
        ),
        Node::new(
            header(13),
            Payload::BooleanValue {
                st: st(),
                value: true,
                in_object: false,
            },
        ),
        Node::new(
            header(14),
            Payload::NumberValue {
                st: st(),
                value: Number::Integer(-12),
                in_object: true,
            },
        ),
        Node::new(
            header(15),
            Payload::NumberValue {
                st: st(),
                value: Number::Double(2.5),
                in_object: false,
            },
        ),
        Node::new(
            header(16),
            Payload::NullValue {
                st: st(),
                in_object: true,
            },
        ),
    ]
}

#[test]
fn test_encode_decode_every_variant() {
    for node in every_variant().into_iter() {
        let mut buf = vec![];
        node.encode(&mut buf);
        let back = Node::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(back, node, "{:?}", node.kind());
    }
}

#[test]
fn test_kind_tags_round_trip() {
    for node in every_variant().into_iter() {
        let kind = node.kind();
        assert_eq!(NodeKind::from_u8(kind as u8).unwrap(), kind);
    }
}

#[test]
fn test_object_value_kinds() {
    let nodes = every_variant();
    assert_eq!(nodes[11].kind(), NodeKind::ObjectStringValue);
    assert_eq!(nodes[12].kind(), NodeKind::StringValue);
    assert_eq!(nodes[14].kind(), NodeKind::ObjectNumberValue);
    assert_eq!(nodes[16].kind(), NodeKind::ObjectNullValue);
}

#[test]
fn test_structural_accessors() {
    let element = &every_variant()[1];
    assert_eq!(element.first_child_key(), 10);
    assert_eq!(element.last_child_key(), 12);
    assert_eq!(element.left_sibling_key(), 4);
    assert_eq!(element.right_sibling_key(), 6);
    assert_eq!(element.child_count(), 3);
    assert_eq!(element.descendant_count(), 9);

    let attribute = &every_variant()[2];
    assert_eq!(attribute.first_child_key(), NULL_NODE_KEY);
    assert_eq!(attribute.child_count(), 0);
    assert!(attribute.as_struct().is_none());
}

#[test]
fn test_local_hash_tracks_identity() {
    let a = Node::new(
        header(1),
        Payload::StringValue {
            st: st(),
            value: ValueDelegate { value: b"same".to_vec() },
            in_object: false,
        },
    );
    let mut b = a.clone();
    // header and structure do not contribute.
    b.header.hash = 1;
    b.as_struct_mut().unwrap().child_count = 99;
    assert_eq!(a.local_hash(), b.local_hash());

    let mut c = a.clone();
    if let Payload::StringValue { value, .. } = &mut c.payload {
        value.value = b"diff".to_vec();
    }
    assert_ne!(a.local_hash(), c.local_hash());
}

#[test]
fn test_unknown_kind_fails() {
    assert!(NodeKind::from_u8(0).is_err());
    assert!(NodeKind::from_u8(255).is_err());
}
