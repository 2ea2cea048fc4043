use super::*;

use crate::{json, resource::ResourceSession, ResourceConfig, TreeKind};

fn session_with(doc: serde_json::Value) -> (tempfile::TempDir, ResourceSession) {
    let dir = tempfile::tempdir().unwrap();
    let config = ResourceConfig::new(TreeKind::Json);
    let session = ResourceSession::create(dir.path().as_os_str(), "res", config).unwrap();
    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.move_to_document_root();
    json::shred_as_first_child(&mut wtx, &doc).unwrap();
    wtx.commit().unwrap();
    (dir, session)
}

#[test]
fn test_preorder_from_root() {
    let (_dir, session) = session_with(serde_json::json!({"a": [1, 2], "b": true}));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    rtx.move_to_document_root();

    // reference order via repeated move_to_next.
    let mut expected = vec![];
    {
        let mut probe = session.begin_node_read_only_trx(None).unwrap();
        probe.move_to_document_root();
        while probe.move_to_next() {
            expected.push(probe.node_key());
        }
    }

    let keys: Vec<i64> = DescendantAxis::new(&mut rtx, IncludeSelf::No).collect();
    assert_eq!(keys, expected);
    // done() rewinds the cursor to the start node.
    assert_eq!(rtx.node_key(), crate::node::DOCUMENT_ROOT);
}

#[test]
fn test_include_self() {
    let (_dir, session) = session_with(serde_json::json!([true]));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    rtx.move_to_document_root();

    let keys: Vec<i64> = DescendantAxis::new(&mut rtx, IncludeSelf::Yes).collect();
    assert_eq!(keys[0], crate::node::DOCUMENT_ROOT);
    assert_eq!(keys.len(), 3);
}

#[test]
fn test_anchored_at_subtree() {
    let (_dir, session) =
        session_with(serde_json::json!({"a": {"x": 1, "y": 2}, "b": 3}));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();

    // anchor on the object under "a"; "b" must not be emitted.
    rtx.move_to_document_root();
    rtx.move_to_first_child(); // object
    rtx.move_to_first_child(); // key "a"
    rtx.move_to_first_child(); // nested object
    let anchor = rtx.node_key();

    let keys: Vec<i64> = DescendantAxis::new(&mut rtx, IncludeSelf::No).collect();
    // x, 1, y, 2.
    assert_eq!(keys.len(), 4);
    assert_eq!(rtx.node_key(), anchor);

    let mut probe = session.begin_node_read_only_trx(None).unwrap();
    for key in keys.iter() {
        assert!(probe.move_to(*key));
        assert_ne!(probe.name(), Some("b"));
    }
}

#[test]
fn test_empty_subtree() {
    let (_dir, session) = session_with(serde_json::json!({}));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    rtx.move_to_document_root();
    rtx.move_to_first_child(); // empty object

    let keys: Vec<i64> = DescendantAxis::new(&mut rtx, IncludeSelf::No).collect();
    assert!(keys.is_empty());

    let keys: Vec<i64> = DescendantAxis::new(&mut rtx, IncludeSelf::Yes).collect();
    assert_eq!(keys.len(), 1);
}
