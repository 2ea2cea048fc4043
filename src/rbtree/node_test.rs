use super::*;

#[test]
fn test_qnm_ordering() {
    assert!(QNm::local("a") < QNm::local("b"));
    assert!(QNm::new("u1", "a") < QNm::new("u2", "a"));
    assert!(QNm::local("a") < QNm::new("", "aa"));
}

#[test]
fn test_atomic_ordering() {
    use Atomic::*;

    assert!(Null < Bool(false));
    assert!(Bool(false) < Bool(true));
    assert!(Bool(true) < Integer(i64::MIN));
    assert!(Integer(1) < Integer(2));
    assert!(Integer(2) < Double(2.5));
    assert!(Double(2.5) < Double(3.0));
    assert!(Double(f64::MAX) < Str("".to_string()));
    assert!(Str("a".to_string()) < Str("b".to_string()));
    // cross numeric comparison is by value.
    assert_eq!(
        Integer(2).cmp(&Double(2.0)),
        std::cmp::Ordering::Equal
    );
}

#[test]
fn test_cas_key_ordering() {
    let a = CasKey {
        path: 1,
        value: Atomic::Str("z".to_string()),
    };
    let b = CasKey {
        path: 2,
        value: Atomic::Str("a".to_string()),
    };
    // path dominates the atomic.
    assert!(a < b);
}

#[test]
fn test_index_key_codec() {
    let keys = vec![
        IndexKey::Path(42),
        IndexKey::Name(QNm::new("http://ns", "title")),
        IndexKey::Cas(CasKey {
            path: 7,
            value: Atomic::Double(-1.5),
        }),
        IndexKey::Cas(CasKey {
            path: 7,
            value: Atomic::Null,
        }),
    ];
    for key in keys.into_iter() {
        let mut buf = vec![];
        key.encode(&mut buf);
        assert_eq!(IndexKey::decode(&mut buf.as_slice()).unwrap(), key);
    }
}

#[test]
fn test_ordered_bytes_preserve_order() {
    let mut keys = vec![];
    for path in [-5_i64, -1, 0, 3, 1 << 40].iter() {
        keys.push(IndexKey::Path(*path));
    }
    check_order(&keys);

    let mut keys = vec![];
    for val in [-100.5_f64, -1.0, 0.0, 0.5, 2.0, 1e9].iter() {
        keys.push(IndexKey::Cas(CasKey {
            path: 1,
            value: Atomic::Double(*val),
        }));
    }
    check_order(&keys);
}

fn check_order(keys: &[IndexKey]) {
    for window in keys.windows(2) {
        assert!(window[0] < window[1]);
        assert!(
            window[0].to_ordered_bytes() < window[1].to_ordered_bytes(),
            "{:?} {:?}",
            window[0],
            window[1]
        );
    }
}

#[test]
fn test_rb_record_codec() {
    let node = RbNode::new(100, 42, IndexKey::Path(3));
    let mut buf = vec![];
    node.encode(&mut buf);
    let back = RbNode::decode(&mut buf.as_slice()).unwrap();
    assert_eq!(back.node_key, 100);
    assert_eq!(back.parent, 42);
    assert_eq!(back.value_node, 101);
    assert_eq!(back.key, IndexKey::Path(3));
    assert!(back.red);
    assert!(!back.changed);

    let mut refs = crate::index::NodeReferences::new();
    refs.add(5);
    refs.add(900);
    let value = RbValue { node_key: 101, refs };
    let mut buf = vec![];
    value.encode(&mut buf);
    let back = RbValue::decode(&mut buf.as_slice()).unwrap();
    assert_eq!(back.node_key, 101);
    assert_eq!(back.refs.to_keys(), vec![5, 900]);
}
