use super::*;

use crate::{
    config::IndexBackend,
    index::IndexDef,
    rbtree::node::QNm,
    resource::ResourceSession,
    ResourceConfig, TreeKind,
};

fn trie_session(dir: &tempfile::TempDir) -> ResourceSession {
    let mut config = ResourceConfig::new(TreeKind::Json);
    config.set_index_backend(IndexBackend::Trie);
    ResourceSession::create(dir.path().as_os_str(), "res", config).unwrap()
}

#[test]
fn test_insert_scan_in_key_order() {
    let dir = tempfile::tempdir().unwrap();
    let session = trie_session(&dir);

    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.register_index(IndexDef::name(0)).unwrap();
    for (n, name) in ["delta", "alpha", "dell", "bravo", "del"].iter().enumerate() {
        insert(
            wtx.pages(),
            0,
            IndexKey::Name(QNm::local(name)),
            n as i64,
        )
        .unwrap();
    }

    let it = wtx.pages().index_meta(0).index_type().unwrap();
    let root = wtx.pages().index_meta(0).root;
    let locals: Vec<String> = scan(wtx.pages(), it, root)
        .unwrap()
        .into_iter()
        .map(|(key, _)| match key {
            IndexKey::Name(qnm) => qnm.local,
            key => panic!("unexpected {:?}", key),
        })
        .collect();
    // prefixes sort before their extensions.
    assert_eq!(locals, vec!["alpha", "bravo", "del", "dell", "delta"]);
    wtx.abort().unwrap();
}

#[test]
fn test_duplicate_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let session = trie_session(&dir);

    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.register_index(IndexDef::name(0)).unwrap();

    let key = IndexKey::Name(QNm::local("x"));
    insert(wtx.pages(), 0, key.clone(), 1).unwrap();
    insert(wtx.pages(), 0, key.clone(), 2).unwrap();

    let it = wtx.pages().index_meta(0).index_type().unwrap();
    let root = wtx.pages().index_meta(0).root;
    let entries = scan(wtx.pages(), it, root).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1.to_keys(), vec![1, 2]);

    assert!(remove(wtx.pages(), 0, &key, 1).unwrap());
    assert!(!remove(wtx.pages(), 0, &key, 1).unwrap());
    assert!(!remove(wtx.pages(), 0, &IndexKey::Name(QNm::local("y")), 1).unwrap());

    let entries = scan(wtx.pages(), it, root).unwrap();
    assert_eq!(entries[0].1.to_keys(), vec![2]);
    wtx.abort().unwrap();
}

#[test]
fn test_trie_survives_commit() {
    let dir = tempfile::tempdir().unwrap();
    let session = trie_session(&dir);

    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.register_index(IndexDef::name(0)).unwrap();
    insert(wtx.pages(), 0, IndexKey::Name(QNm::local("k1")), 5).unwrap();
    insert(wtx.pages(), 0, IndexKey::Name(QNm::local("k2")), 6).unwrap();
    wtx.commit().unwrap();

    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    let meta = rtx.pages().root().index_roots[0].clone();
    let entries = scan(
        rtx.pages_mut(),
        crate::page::IndexType::Name,
        meta.root,
    )
    .unwrap();
    assert_eq!(entries.len(), 2);
}

#[test]
fn test_trie_node_codec() {
    let node = TrieNode {
        node_key: 5,
        parent: 2,
        label: b'x',
        children: vec![(b'a', 7), (b'z', 9)],
        value_node: 6,
        key: Some(IndexKey::Name(QNm::local("xa"))),
    };
    let mut buf = vec![];
    node.encode(&mut buf);
    assert_eq!(TrieNode::decode(&mut buf.as_slice()).unwrap(), node);
}
