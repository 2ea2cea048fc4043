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

fn kinds(tuples: &[DiffTuple]) -> Vec<DiffKind> {
    tuples.iter().map(|t| t.kind).collect()
}

#[test]
fn test_identical_revisions_same_hash() {
    let (_dir, session) = session_with(serde_json::json!({"a": [1, 2]}));
    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.commit().unwrap();

    let tuples = session.diff(1, 2).unwrap();
    // the unchanged top subtree short-circuits into one observation.
    assert_eq!(kinds(&tuples), vec![DiffKind::SameHash]);
}

#[test]
fn test_update_shows_as_updated() {
    let (_dir, session) = session_with(serde_json::json!({"a": 1, "b": 2}));

    let val_key = {
        let mut rtx = session.begin_node_read_only_trx(None).unwrap();
        rtx.move_to_document_root();
        rtx.move_to_first_child();
        rtx.move_to_first_child();
        rtx.move_to_first_child();
        rtx.node_key()
    };
    let mut wtx = session.begin_node_write_trx().unwrap();
    assert!(wtx.move_to(val_key));
    wtx.set_number_value(crate::node::Number::Integer(9)).unwrap();
    wtx.commit().unwrap();

    let tuples = session.diff(1, 2).unwrap();
    let updated: Vec<&DiffTuple> =
        tuples.iter().filter(|t| t.kind == DiffKind::Updated).collect();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].new_node_key, val_key);
    assert_eq!(updated[0].old_node_key, val_key);
    // the untouched "b" subtree hashes equal.
    assert!(tuples.iter().any(|t| t.kind == DiffKind::SameHash));
    assert!(!tuples.iter().any(|t| t.kind == DiffKind::Inserted));
}

#[test]
fn test_insert_and_delete() {
    let (_dir, session) = session_with(serde_json::json!({"keep": 1}));

    // revision 2 adds a sibling subtree.
    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.move_to_document_root();
    wtx.move_to_first_child();
    wtx.move_to_first_child();
    let added = wtx.insert_object_key_as_right_sibling("new").unwrap();
    wtx.insert_string_value_as_first_child("v").unwrap();
    wtx.commit().unwrap();

    let tuples = session.diff(1, 2).unwrap();
    let inserted: Vec<&DiffTuple> =
        tuples.iter().filter(|t| t.kind == DiffKind::Inserted).collect();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].new_node_key, added);
    assert_eq!(inserted[0].old_node_key, crate::node::NULL_NODE_KEY);

    // and the reverse direction observes a delete.
    let tuples = session.diff(2, 1).unwrap();
    let deleted: Vec<&DiffTuple> =
        tuples.iter().filter(|t| t.kind == DiffKind::Deleted).collect();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].old_node_key, added);
}

#[test]
fn test_depths_are_reported() {
    let (_dir, session) = session_with(serde_json::json!({"a": {"b": 1}}));

    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.move_to_document_root();
    wtx.move_to_first_child(); // object
    wtx.move_to_first_child(); // "a"
    wtx.move_to_first_child(); // nested object
    wtx.insert_object_key_as_first_child("c").unwrap();
    wtx.insert_null_value_as_first_child().unwrap();
    wtx.commit().unwrap();

    let tuples = session.diff(1, 2).unwrap();
    let inserted: Vec<&DiffTuple> =
        tuples.iter().filter(|t| t.kind == DiffKind::Inserted).collect();
    assert_eq!(inserted.len(), 1);
    // doc(0) / object(1) / a(2) / object(3) / c(4).
    assert_eq!(inserted[0].depth, 4);
}
