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
fn test_move_to_post_condition() {
    let (_dir, session) = session_with(serde_json::json!({"a": 1}));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();

    assert!(rtx.move_to_document_root());
    let at = rtx.node_key();
    // failed moves leave the cursor where it was.
    assert!(!rtx.move_to(9999));
    assert_eq!(rtx.node_key(), at);
    assert!(!rtx.move_to_parent());
    assert_eq!(rtx.node_key(), at);
    assert!(!rtx.move_to_left_sibling());
    assert_eq!(rtx.node_key(), at);
}

#[test]
fn test_document_order_walk() {
    let (_dir, session) = session_with(serde_json::json!({"a": [1, 2], "b": true}));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();

    rtx.move_to_document_root();
    let mut forward = vec![rtx.node_key()];
    while rtx.move_to_next() {
        forward.push(rtx.node_key());
    }
    // doc, obj, a, array, 1, 2, b, true.
    assert_eq!(forward.len(), 8);

    // move_to_previous walks the same order backwards.
    let mut backward = vec![rtx.node_key()];
    while rtx.move_to_previous() {
        backward.push(rtx.node_key());
    }
    backward.reverse();
    assert_eq!(forward, backward);
}

#[test]
fn test_next_following_skips_subtree() {
    let (_dir, session) = session_with(serde_json::json!({"a": [1, 2], "b": true}));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();

    // position on the "a" entry, next-following lands on "b".
    rtx.move_to_document_root();
    rtx.move_to_first_child();
    rtx.move_to_first_child();
    assert_eq!(rtx.name().unwrap(), "a");
    let a = rtx.node_key();

    assert!(rtx.move_to_next_following());
    assert_eq!(rtx.name().unwrap(), "b");

    // and from the last node there is nothing following.
    rtx.move_to_first_child();
    assert!(!rtx.move_to_next_following());
    rtx.move_to(a);
    assert!(rtx.has_first_child());
}
