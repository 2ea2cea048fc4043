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
fn test_serialize_insert_with_path() {
    let (_dir, session) = session_with(serde_json::json!({"a": {"b": 1}}));

    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.move_to_document_root();
    wtx.move_to_first_child();
    wtx.move_to_first_child(); // "a"
    wtx.move_to_first_child(); // nested object
    wtx.insert_object_key_as_first_child("c").unwrap();
    wtx.insert_string_value_as_first_child("v").unwrap();
    wtx.commit().unwrap();

    let out = JsonDiffSerializer::new(&session, 1, 2).serialize(true).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&out).unwrap();

    assert_eq!(doc["old-revision"], 1);
    assert_eq!(doc["new-revision"], 2);
    let diffs = doc["diffs"].as_array().unwrap();
    assert_eq!(diffs.len(), 1);
    let insert = &diffs[0]["insert"];
    assert_eq!(insert["path"], "/a/c");
    assert_eq!(insert["data"], serde_json::json!({"c": "v"}));
}

#[test]
fn test_serialize_rewrites_array_positions() {
    let (_dir, session) = session_with(serde_json::json!({"list": [10, 20, 30]}));

    // update the middle element.
    let target = {
        let mut rtx = session.begin_node_read_only_trx(None).unwrap();
        rtx.move_to_document_root();
        rtx.move_to_first_child(); // object
        rtx.move_to_first_child(); // "list"
        rtx.move_to_first_child(); // array
        rtx.move_to_first_child(); // 10
        rtx.move_to_right_sibling(); // 20
        rtx.node_key()
    };
    let mut wtx = session.begin_node_write_trx().unwrap();
    assert!(wtx.move_to(target));
    wtx.set_number_value(crate::node::Number::Integer(21)).unwrap();
    wtx.commit().unwrap();

    let out = JsonDiffSerializer::new(&session, 1, 2).serialize(true).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&out).unwrap();
    let diffs = doc["diffs"].as_array().unwrap();
    assert_eq!(diffs.len(), 1);
    let update = &diffs[0]["update"];
    // "[]" resolves to the concrete position.
    assert_eq!(update["path"], "/list/[1]");
    assert_eq!(update["data"], serde_json::json!(21));
}

#[test]
fn test_serialize_delete() {
    let (_dir, session) = session_with(serde_json::json!({"a": 1, "b": 2}));

    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.move_to_document_root();
    wtx.move_to_first_child();
    wtx.move_to_first_child(); // "a"
    wtx.move_to_right_sibling(); // "b"
    wtx.remove().unwrap();
    wtx.commit().unwrap();

    let out = JsonDiffSerializer::new(&session, 1, 2).serialize(true).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&out).unwrap();
    let diffs = doc["diffs"].as_array().unwrap();
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0]["delete"]["path"], "/b");
}

#[test]
fn test_unchanged_tuples_included_on_request() {
    let (_dir, session) = session_with(serde_json::json!({"a": 1}));
    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.commit().unwrap();

    let with = JsonDiffSerializer::new(&session, 1, 2).serialize(false).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&with).unwrap();
    assert_eq!(doc["diffs"].as_array().unwrap().len(), 1);
    assert!(doc["diffs"][0].get("same").is_some());

    let without = JsonDiffSerializer::new(&session, 1, 2).serialize(true).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&without).unwrap();
    assert!(doc["diffs"].as_array().unwrap().is_empty());
}
