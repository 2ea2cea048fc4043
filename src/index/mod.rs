//! Module `index` implement the secondary indexes.
//!
//! Each index kind - NAME, PATH, CAS - has a builder doing a one-shot
//! scan over a revision, and a listener translating node mutations
//! into index updates during a write transaction. Entries map an
//! [IndexKey](crate::rbtree::node::IndexKey) to the
//! [NodeReferences] of the nodes classified under it. Two backends
//! satisfy the same contracts: the red-black tree and an ordered trie.

use std::collections::HashSet;

use crate::{
    config::IndexBackend,
    names::NameSpace,
    node::{Node, NodeKind, Number, Payload},
    page::{IndexRootMeta, IndexType},
    rbtree::{
        self,
        node::{Atomic, CasKey, IndexKey, QNm, RbNode, RbValue},
    },
    tree::{NodeCursor, PageWriteTrx},
    util::binary::put_u8,
    Result,
};

pub mod pathsummary;
pub mod refs;
pub mod trie;

pub use refs::NodeReferences;
pub use trie::TrieNode;

/// Kind of a secondary index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum IndexKind {
    Name = 0,
    Path = 1,
    Cas = 2,
}

impl IndexKind {
    pub fn from_u8(tag: u8) -> Result<IndexKind> {
        match tag {
            0 => Ok(IndexKind::Name),
            1 => Ok(IndexKind::Path),
            2 => Ok(IndexKind::Cas),
            tag => err_at!(Corrupt, msg: "bad index kind {}", tag),
        }
    }

    /// Subtree holding this kind's records.
    pub fn index_type(&self) -> IndexType {
        match self {
            IndexKind::Name => IndexType::Name,
            IndexKind::Path => IndexType::Path,
            IndexKind::Cas => IndexType::Cas,
        }
    }
}

/// Definition of one secondary index.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexDef {
    pub kind: IndexKind,
    pub number: u16,
    /// Path expressions narrowing PATH and CAS indexes; empty = all.
    pub paths: Vec<String>,
    /// NAME include set; empty = all names.
    pub include_names: Vec<String>,
    /// NAME exclude set.
    pub exclude_names: Vec<String>,
}

impl IndexDef {
    pub fn name(number: u16) -> IndexDef {
        IndexDef {
            kind: IndexKind::Name,
            number,
            paths: vec![],
            include_names: vec![],
            exclude_names: vec![],
        }
    }

    pub fn path(number: u16, paths: Vec<String>) -> IndexDef {
        IndexDef {
            kind: IndexKind::Path,
            number,
            paths,
            include_names: vec![],
            exclude_names: vec![],
        }
    }

    pub fn cas(number: u16, paths: Vec<String>) -> IndexDef {
        IndexDef {
            kind: IndexKind::Cas,
            number,
            paths,
            include_names: vec![],
            exclude_names: vec![],
        }
    }

    pub fn to_meta(&self) -> IndexRootMeta {
        let mut meta = IndexRootMeta::new(self.kind as u8, self.number);
        meta.paths = self.paths.clone();
        meta.include_names = self.include_names.clone();
        meta.exclude_names = self.exclude_names.clone();
        meta
    }

    pub fn from_meta(meta: &IndexRootMeta) -> Result<IndexDef> {
        Ok(IndexDef {
            kind: IndexKind::from_u8(meta.kind)?,
            number: meta.number,
            paths: meta.paths.clone(),
            include_names: meta.include_names.clone(),
            exclude_names: meta.exclude_names.clone(),
        })
    }
}

/// What a listener is told about a mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeType {
    Insert,
    Delete,
}

/// Record stored in an index subtree, shared by both backends.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexRecord {
    /// Red-black key node.
    Key(RbNode),
    /// [NodeReferences] payload, paired with a key or trie node.
    Value(RbValue),
    /// Ordered trie node.
    Trie(TrieNode),
}

impl IndexRecord {
    pub fn node_key(&self) -> i64 {
        match self {
            IndexRecord::Key(node) => node.node_key,
            IndexRecord::Value(value) => value.node_key,
            IndexRecord::Trie(node) => node.node_key,
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            IndexRecord::Key(node) => {
                put_u8(buf, 0);
                node.encode(buf);
            }
            IndexRecord::Value(value) => {
                put_u8(buf, 1);
                value.encode(buf);
            }
            IndexRecord::Trie(node) => {
                put_u8(buf, 2);
                node.encode(buf);
            }
        }
    }

    pub fn decode(buf: &mut &[u8]) -> Result<IndexRecord> {
        match crate::util::binary::take_u8(buf)? {
            0 => Ok(IndexRecord::Key(RbNode::decode(buf)?)),
            1 => Ok(IndexRecord::Value(RbValue::decode(buf)?)),
            2 => Ok(IndexRecord::Trie(TrieNode::decode(buf)?)),
            tag => err_at!(Corrupt, msg: "bad index record tag {}", tag),
        }
    }
}

/// Base of the record-key space for index `number`; all indexes of a
/// kind share one subtree, partitioned by number in the high bits.
pub fn key_base(number: u16) -> i64 {
    (number as i64) << 44
}

/// Index key for `node`, or `None` when the node does not participate
/// in indexes of `kind`.
pub fn key_for(kind: IndexKind, node: &Node, name: Option<&str>, pcr: i64) -> Option<IndexKey> {
    match kind {
        IndexKind::Name => match node.kind() {
            NodeKind::ObjectKey | NodeKind::Element | NodeKind::Attribute => {
                name.map(|name| IndexKey::Name(QNm::local(name)))
            }
            _ => None,
        },
        IndexKind::Path => match node.kind() {
            NodeKind::ObjectKey | NodeKind::Element | NodeKind::Array => {
                Some(IndexKey::Path(pcr))
            }
            _ => None,
        },
        IndexKind::Cas => atomic_of(node).map(|value| IndexKey::Cas(CasKey { path: pcr, value })),
    }
}

/// Typed atomic for value nodes; CAS indexes only cover these.
pub fn atomic_of(node: &Node) -> Option<Atomic> {
    match &node.payload {
        Payload::StringValue { value, .. } => Some(Atomic::Str(
            String::from_utf8_lossy(&value.value).into_owned(),
        )),
        Payload::BooleanValue { value, .. } => Some(Atomic::Bool(*value)),
        Payload::NumberValue { value, .. } => Some(match value {
            Number::Integer(val) => Atomic::Integer(*val),
            Number::Double(val) => Atomic::Double(*val),
        }),
        Payload::NullValue { .. } => Some(Atomic::Null),
        Payload::Text { value, .. } | Payload::Attribute { value, .. } => Some(Atomic::Str(
            String::from_utf8_lossy(&value.value).into_owned(),
        )),
        _ => None,
    }
}

/// Whether `def` accepts a change for `node` at `pcr`.
pub(crate) fn accepts(
    def: &IndexDef,
    pcrs: Option<&HashSet<i64>>,
    name: Option<&str>,
    pcr: i64,
) -> bool {
    match def.kind {
        IndexKind::Name => match name {
            Some(name) => {
                let included = def.include_names.is_empty()
                    || def.include_names.iter().any(|n| n == name);
                let excluded = def.exclude_names.iter().any(|n| n == name);
                included && !excluded
            }
            None => false,
        },
        IndexKind::Path | IndexKind::Cas => match pcrs {
            Some(pcrs) => pcrs.contains(&pcr),
            None => true,
        },
    }
}

/// Apply one mutation to every registered index. `pcr_filters[i]` is
/// the resolved PCR set for `defs[i]`, `None` meaning unfiltered.
pub fn on_change(
    pwtx: &mut PageWriteTrx,
    defs: &[IndexDef],
    pcr_filters: &[Option<HashSet<i64>>],
    backend: IndexBackend,
    change: ChangeType,
    node: &Node,
    name: Option<&str>,
    pcr: i64,
) -> Result<()> {
    for (slot, def) in defs.iter().enumerate() {
        if !accepts(def, pcr_filters[slot].as_ref(), name, pcr) {
            continue;
        }
        let key = match key_for(def.kind, node, name, pcr) {
            Some(key) => key,
            None => continue,
        };
        let node_key = node.node_key();
        match (backend, change) {
            (IndexBackend::RBTree, ChangeType::Insert) => {
                rbtree::writer::index_insert(pwtx, slot, key, node_key)?;
            }
            (IndexBackend::RBTree, ChangeType::Delete) => {
                rbtree::writer::index_remove(pwtx, slot, &key, node_key)?;
            }
            (IndexBackend::Trie, ChangeType::Insert) => {
                trie::insert(pwtx, slot, key, node_key)?;
            }
            (IndexBackend::Trie, ChangeType::Delete) => {
                trie::remove(pwtx, slot, &key, node_key)?;
            }
        }
    }
    Ok(())
}

/// Materialized index entries, ascending by key.
pub fn read_entries<S: rbtree::IndexStore>(
    store: &mut S,
    meta: &IndexRootMeta,
    backend: IndexBackend,
) -> Result<Vec<(IndexKey, NodeReferences)>> {
    let kind = IndexKind::from_u8(meta.kind)?;
    match backend {
        IndexBackend::RBTree => rbtree::reader::scan(store, kind.index_type(), meta.root),
        IndexBackend::Trie => trie::scan(store, kind.index_type(), meta.root),
    }
}

/// Filter applied when opening an index.
#[derive(Clone, Debug, Default)]
pub struct IndexFilter {
    /// Restrict NAME lookups to these local names.
    pub names: Option<HashSet<String>>,
    /// Restrict PATH/CAS lookups to these PCRs.
    pub pcrs: Option<HashSet<i64>>,
}

impl IndexFilter {
    pub fn all() -> IndexFilter {
        IndexFilter::default()
    }

    pub fn for_names(names: Vec<String>) -> IndexFilter {
        IndexFilter {
            names: Some(names.into_iter().collect()),
            pcrs: None,
        }
    }

    pub fn for_pcrs(pcrs: Vec<i64>) -> IndexFilter {
        IndexFilter {
            names: None,
            pcrs: Some(pcrs.into_iter().collect()),
        }
    }

    fn matches(&self, key: &IndexKey) -> bool {
        match key {
            IndexKey::Name(qnm) => match &self.names {
                Some(names) => names.contains(&qnm.local),
                None => true,
            },
            IndexKey::Path(pcr) => match &self.pcrs {
                Some(pcrs) => pcrs.contains(pcr),
                None => true,
            },
            IndexKey::Cas(cas) => match &self.pcrs {
                Some(pcrs) => pcrs.contains(&cas.path),
                None => true,
            },
        }
    }
}

/// Open an index over one revision and iterate its matching
/// [NodeReferences].
pub fn open_index<S: rbtree::IndexStore>(
    store: &mut S,
    meta: &IndexRootMeta,
    backend: IndexBackend,
    filter: &IndexFilter,
) -> Result<impl Iterator<Item = (IndexKey, NodeReferences)>> {
    let filter = filter.clone();
    let entries = read_entries(store, meta, backend)?;
    Ok(entries
        .into_iter()
        .filter(move |(key, _)| filter.matches(key)))
}

/// One-shot builder: scan the whole revision through `cursor` movements
/// and feed every node into the listeners of `def`.
pub fn build_index(wtx: &mut crate::tree::NodeWriteTrx, def: &IndexDef) -> Result<()> {
    wtx.register_index(def.clone())?;
    let mut stack = vec![crate::node::DOCUMENT_ROOT];
    while let Some(key) = stack.pop() {
        if !wtx.move_to(key) {
            return err_at!(KeyNotFound, msg: "node {} while building index", key);
        }
        let (first, right) = (wtx.first_child_key(), wtx.right_sibling_key());
        if key != crate::node::DOCUMENT_ROOT {
            wtx.reindex_current(def)?;
        }
        if right != crate::node::NULL_NODE_KEY && key != crate::node::DOCUMENT_ROOT {
            stack.push(right);
        }
        if first != crate::node::NULL_NODE_KEY {
            stack.push(first);
        }
    }
    Ok(())
}
