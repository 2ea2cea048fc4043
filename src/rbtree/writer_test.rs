use super::*;

use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};

use crate::{
    index::IndexDef,
    rbtree::{self, node::QNm},
    resource::ResourceSession,
    ResourceConfig, TreeKind,
};

fn name_index_session(dir: &tempfile::TempDir) -> ResourceSession {
    let config = ResourceConfig::new(TreeKind::Json);
    ResourceSession::create(dir.path().as_os_str(), "res", config).unwrap()
}

fn insert_all(wtx: &mut crate::tree::NodeWriteTrx, keys: &[u64]) {
    for key in keys.iter() {
        rbtree::writer::index_insert(
            wtx.pages(),
            0,
            IndexKey::Name(QNm::local(&key.to_string())),
            *key as i64,
        )
        .unwrap();
    }
}

fn scanned_locals(wtx: &mut crate::tree::NodeWriteTrx) -> Vec<String> {
    let it = wtx.pages().index_meta(0).index_type().unwrap();
    let root = wtx.pages().index_meta(0).root;
    rbtree::reader::scan(wtx.pages(), it, root)
        .unwrap()
        .into_iter()
        .map(|(key, _)| match key {
            IndexKey::Name(qnm) => qnm.local,
            key => panic!("unexpected {:?}", key),
        })
        .collect()
}

fn validate(wtx: &mut crate::tree::NodeWriteTrx) {
    let it = wtx.pages().index_meta(0).index_type().unwrap();
    let root = wtx.pages().index_meta(0).root;
    rbtree::reader::validate(wtx.pages(), it, root).unwrap();
}

#[test]
fn test_insert_sequence_keeps_invariants() {
    let dir = tempfile::tempdir().unwrap();
    let session = name_index_session(&dir);

    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.register_index(IndexDef::name(0)).unwrap();

    // invariants hold after every single insertion.
    for key in [5_u64, 3, 7, 1, 4, 6, 8, 2].iter() {
        insert_all(&mut wtx, &[*key]);
        validate(&mut wtx);
    }

    assert_eq!(
        scanned_locals(&mut wtx),
        vec!["1", "2", "3", "4", "5", "6", "7", "8"]
    );

    // removal drops the node reference but keeps the tree shape.
    let removed = rbtree::writer::index_remove(
        wtx.pages(),
        0,
        &IndexKey::Name(QNm::local("4")),
        4,
    )
    .unwrap();
    assert!(removed);
    validate(&mut wtx);
    assert_eq!(scanned_locals(&mut wtx).len(), 8);

    let root = wtx.pages().index_meta(0).root;
    let (_, refs) = rbtree::reader::get(
        wtx.pages(),
        crate::page::IndexType::Name,
        root,
        &IndexKey::Name(QNm::local("4")),
        rbtree::SearchMode::Equal,
    )
    .unwrap()
    .unwrap();
    assert!(refs.is_empty());

    wtx.commit().unwrap();
}

#[test]
fn test_duplicate_key_merges_refs() {
    let dir = tempfile::tempdir().unwrap();
    let session = name_index_session(&dir);

    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.register_index(IndexDef::name(0)).unwrap();

    for node_key in [10_i64, 20, 30].iter() {
        rbtree::writer::index_insert(
            wtx.pages(),
            0,
            IndexKey::Name(QNm::local("dup")),
            *node_key,
        )
        .unwrap();
    }

    let locals = scanned_locals(&mut wtx);
    assert_eq!(locals, vec!["dup"]);

    let root = wtx.pages().index_meta(0).root;
    let (_, refs) = rbtree::reader::get(
        wtx.pages(),
        crate::page::IndexType::Name,
        root,
        &IndexKey::Name(QNm::local("dup")),
        rbtree::SearchMode::Equal,
    )
    .unwrap()
    .unwrap();
    assert_eq!(refs.to_keys(), vec![10, 20, 30]);
    wtx.abort().unwrap();
}

#[test]
fn test_random_insertions_stay_balanced() {
    let seed: u64 = rand::random();
    println!("test_random_insertions seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let dir = tempfile::tempdir().unwrap();
    let session = name_index_session(&dir);

    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.register_index(IndexDef::name(0)).unwrap();

    let mut keys: Vec<u64> = (0..200).collect();
    keys.shuffle(&mut rng);
    insert_all(&mut wtx, &keys);
    validate(&mut wtx);

    let locals = scanned_locals(&mut wtx);
    let mut expected: Vec<String> = (0..200_u64).map(|k| k.to_string()).collect();
    expected.sort();
    assert_eq!(locals, expected);
    wtx.abort().unwrap();
}

#[test]
fn test_persisted_index_survives_commit() {
    let dir = tempfile::tempdir().unwrap();
    let session = name_index_session(&dir);

    let mut wtx = session.begin_node_write_trx().unwrap();
    wtx.register_index(IndexDef::name(0)).unwrap();
    insert_all(&mut wtx, &[2, 1, 3]);
    wtx.commit().unwrap();

    // scan through a fresh read transaction.
    let mut rtx = session.begin_node_read_only_trx(None).unwrap();
    let meta = rtx.pages().root().index_roots[0].clone();
    let entries = rbtree::reader::scan(
        rtx.pages_mut(),
        crate::page::IndexType::Name,
        meta.root,
    )
    .unwrap();
    assert_eq!(entries.len(), 3);
}
