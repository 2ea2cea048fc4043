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

fn names_of(session: &ResourceSession, keys: &[i64]) -> Vec<String> {
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    keys.iter()
        .filter_map(|key| {
            rtx.move_to(*key);
            rtx.name().map(|name| name.to_string())
        })
        .collect()
}

#[test]
fn test_unlimited_equals_json_axis() {
    let (_dir, session) = session_with(serde_json::json!({"a": {"b": {"c": 1}}}));

    let all: Vec<i64> = {
        let mut rtx = session.begin_node_read_only_trx(None).unwrap();
        rtx.move_to_document_root();
        crate::axis::JsonDescendantAxis::new(&mut rtx, IncludeSelf::No).collect()
    };
    let limited: Vec<i64> = {
        let mut rtx = session.begin_node_read_only_trx(None).unwrap();
        rtx.move_to_document_root();
        JsonLimitedDescendantAxis::new(&mut rtx, IncludeSelf::No, None, None).collect()
    };
    assert_eq!(all, limited);
}

#[test]
fn test_max_level_cuts_descent() {
    // three levels of objects below the anchor.
    let (_dir, session) =
        session_with(serde_json::json!({"k": {"a": {"x": 1}, "b": 2}}));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    rtx.move_to_document_root();
    rtx.move_to_first_child(); // anchor on the top object

    let keys: Vec<i64> =
        JsonLimitedDescendantAxis::new(&mut rtx, IncludeSelf::No, Some(2), Some(2))
            .collect();
    let names = names_of(&session, &keys);

    // the first two depth-2 entries are visited, level 3 is not.
    assert!(names.contains(&"k".to_string()));
    assert!(names.contains(&"a".to_string()));
    assert!(!names.contains(&"x".to_string()));

    // object-key values do not increment the depth, so the value
    // object of "a" is still emitted.
    let mut probe = session.begin_node_read_only_trx(None).unwrap();
    let level3: Vec<i64> = keys
        .iter()
        .filter(|key| {
            probe.move_to(**key);
            probe.kind() == crate::node::NodeKind::ObjectNumberValue
                && probe.node().number_value()
                    == Some(crate::node::Number::Integer(1))
        })
        .cloned()
        .collect();
    assert!(level3.is_empty(), "no level-3 node may be visited");
}

#[test]
fn test_max_children_per_depth() {
    let (_dir, session) =
        session_with(serde_json::json!({"k": {"a": 1, "b": 2, "c": 3}}));
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    rtx.move_to_document_root();
    rtx.move_to_first_child(); // top object

    let keys: Vec<i64> =
        JsonLimitedDescendantAxis::new(&mut rtx, IncludeSelf::No, None, Some(2)).collect();
    let names = names_of(&session, &keys);

    // depth 2 emits exactly its first two entries: key "a" and its
    // value; "b" and "c" are cut off.
    assert!(names.contains(&"a".to_string()));
    assert!(!names.contains(&"b".to_string()));
    assert!(!names.contains(&"c".to_string()));
    // depth 1 ("k" and the value object) is untouched.
    assert!(names.contains(&"k".to_string()));
    assert_eq!(keys.len(), 4);
}
