use super::*;

use crate::{
    json, node::NodeKind, resource::ResourceSession, tree::NodeCursor, ResourceConfig,
    TreeKind,
};

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
fn test_next_batch_chunks() {
    let (_dir, session) = session_with(serde_json::json!([1, 2, 3, 4, 5]));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    rtx.move_to_document_root();

    let mut axis = BatchDescendantAxis::new(&mut rtx, IncludeSelf::No);
    let mut out = vec![];
    assert_eq!(axis.next_batch(&mut out, 4), 4);
    assert_eq!(out.len(), 4);
    assert_eq!(axis.next_batch(&mut out, 4), 2);
    assert_eq!(out.len(), 6); // array node + five values.
    assert_eq!(axis.next_batch(&mut out, 4), 0);
}

#[test]
fn test_batches_equal_plain_axis() {
    let (_dir, session) = session_with(serde_json::json!({"a": [1, {"b": 2}]}));

    let plain: Vec<i64> = {
        let mut rtx = session.begin_node_read_only_trx(None).unwrap();
        rtx.move_to_document_root();
        crate::axis::DescendantAxis::new(&mut rtx, IncludeSelf::No).collect()
    };

    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    rtx.move_to_document_root();
    let mut axis = BatchDescendantAxis::new(&mut rtx, IncludeSelf::No);
    let mut batched = vec![];
    while axis.next_batch(&mut batched, 3) > 0 {}
    assert_eq!(batched, plain);
}

#[test]
fn test_filters_skip_candidates() {
    let (_dir, session) = session_with(serde_json::json!({"a": 1, "b": "s"}));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    rtx.move_to_document_root();

    let mut axis = BatchDescendantAxis::new(&mut rtx, IncludeSelf::No)
        .with_filter(Box::new(|c| c.kind() == NodeKind::ObjectKey));
    let mut out = vec![];
    axis.next_batch(&mut out, 100);
    assert_eq!(out.len(), 2);
}

#[test]
fn test_for_each_next_visits_cursor() {
    let (_dir, session) = session_with(serde_json::json!([true, false]));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    rtx.move_to_document_root();

    let mut kinds = vec![];
    let mut axis = BatchDescendantAxis::new(&mut rtx, IncludeSelf::No);
    let n = axis.for_each_next(10, |cursor| kinds.push(cursor.kind()));
    assert_eq!(n, 3);
    assert_eq!(
        kinds,
        vec![NodeKind::Array, NodeKind::BooleanValue, NodeKind::BooleanValue]
    );
}
