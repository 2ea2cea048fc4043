use super::*;

use crate::names::{NameDictionary, NameSpace};

fn names_with(names: &[&str]) -> NameDictionary {
    let mut dict = NameDictionary::new();
    for name in names.iter() {
        dict.get_or_insert(NameSpace::LocalName, name);
    }
    dict
}

fn step(dict: &NameDictionary, name: &str) -> PathStep {
    PathStep::Name {
        uri_key: -1,
        local_key: dict.get(NameSpace::LocalName, name),
    }
}

#[test]
fn test_get_or_create() {
    let dict = names_with(&["a", "b"]);
    let mut summary = PathSummary::new();

    let (a, created) = summary.get_or_create(PATH_ROOT, step(&dict, "a"));
    assert!(created);
    let (a2, created) = summary.get_or_create(PATH_ROOT, step(&dict, "a"));
    assert!(!created);
    assert_eq!(a, a2);

    let (ab, _) = summary.get_or_create(a, step(&dict, "b"));
    let (aarr, _) = summary.get_or_create(a, PathStep::Array);
    assert_ne!(ab, aarr);

    assert_eq!(summary.get(ab).unwrap().level, 2);
    assert_eq!(summary.get(ab).unwrap().parent, a);
    assert_eq!(summary.len(), 3);
}

#[test]
fn test_ref_counts() {
    let dict = names_with(&["a"]);
    let mut summary = PathSummary::new();
    let (a, _) = summary.get_or_create(PATH_ROOT, step(&dict, "a"));

    summary.incr_ref(a);
    summary.incr_ref(a);
    summary.decr_ref(a);
    assert_eq!(summary.get(a).unwrap().ref_count, 1);
    summary.decr_ref(a);
    summary.decr_ref(a); // saturates at zero.
    assert_eq!(summary.get(a).unwrap().ref_count, 0);
}

#[test]
fn test_resolve_expr() {
    let dict = names_with(&["a", "b", "c"]);
    let mut summary = PathSummary::new();
    let (a, _) = summary.get_or_create(PATH_ROOT, step(&dict, "a"));
    let (arr, _) = summary.get_or_create(a, PathStep::Array);
    let (arr_b, _) = summary.get_or_create(arr, step(&dict, "b"));
    let (c, _) = summary.get_or_create(PATH_ROOT, step(&dict, "c"));
    let (c_b, _) = summary.get_or_create(c, step(&dict, "b"));

    assert_eq!(summary.resolve_expr("/a", &dict).unwrap(), vec![a]);
    assert_eq!(summary.resolve_expr("/a/[]", &dict).unwrap(), vec![arr]);
    assert_eq!(summary.resolve_expr("/a/[]/b", &dict).unwrap(), vec![arr_b]);

    // the wildcard spans one step; /a/[] has no "b" child directly
    // under depth 1, so only /c/b matches.
    assert_eq!(summary.resolve_expr("/*/b", &dict).unwrap(), vec![c_b]);

    assert!(summary.resolve_expr("/missing", &dict).unwrap().is_empty());
}

#[test]
fn test_resolve_expr_rejects_malformed() {
    let dict = names_with(&[]);
    let summary = PathSummary::new();
    assert!(summary.resolve_expr("a/b", &dict).is_err());
    assert!(summary.resolve_expr("/", &dict).is_err());
    assert!(summary.resolve_expr("/a//b", &dict).is_err());
    assert!(summary.resolve_expr("", &dict).is_err());
}

#[test]
fn test_to_path() {
    let dict = names_with(&["a", "b"]);
    let mut summary = PathSummary::new();
    let (a, _) = summary.get_or_create(PATH_ROOT, step(&dict, "a"));
    let (arr, _) = summary.get_or_create(a, PathStep::Array);
    let (b, _) = summary.get_or_create(arr, step(&dict, "b"));

    assert_eq!(summary.to_path(b, &dict).unwrap(), "/a/[]/b");
    assert_eq!(summary.to_path(a, &dict).unwrap(), "/a");
}

#[test]
fn test_node_codec() {
    let node = PathNode {
        key: 9,
        parent: 3,
        step: PathStep::Name {
            uri_key: 2,
            local_key: 5,
        },
        level: 4,
        ref_count: 77,
        children: vec![10, 11],
    };
    let mut buf = vec![];
    node.encode(&mut buf);
    assert_eq!(PathNode::decode(&mut buf.as_slice()).unwrap(), node);

    let node = PathNode {
        key: 1,
        parent: PATH_ROOT,
        step: PathStep::Array,
        level: 1,
        ref_count: 0,
        children: vec![],
    };
    let mut buf = vec![];
    node.encode(&mut buf);
    assert_eq!(PathNode::decode(&mut buf.as_slice()).unwrap(), node);
}

#[test]
fn test_from_nodes_round_trip() {
    let dict = names_with(&["x"]);
    let mut summary = PathSummary::new();
    let (x, _) = summary.get_or_create(PATH_ROOT, step(&dict, "x"));
    summary.get_or_create(x, PathStep::Array);
    summary.incr_ref(x);

    let nodes: Vec<PathNode> = summary.nodes().cloned().collect();
    let back = PathSummary::from_nodes(nodes);
    assert_eq!(back.len(), summary.len());
    assert_eq!(back.max_key(), summary.max_key());
    assert_eq!(back.resolve_expr("/x/[]", &dict).unwrap().len(), 1);
}
