//! Module `trie` implement the ordered-trie index backend.
//!
//! Keys are walked byte-wise over their order preserving encoding, one
//! trie node per distinct prefix byte. Children stay sorted, so a
//! depth-first walk yields entries in ascending key order, satisfying
//! the same iterator contract as the red-black backend.

use crate::{
    index::{IndexRecord, NodeReferences},
    node::NULL_NODE_KEY,
    page::{IndexType, Record},
    rbtree::{node::IndexKey, IndexStore},
    tree::PageWriteTrx,
    util::binary::{self, put_i64, put_u16, put_u8},
    Result,
};

/// One node of the persisted trie.
#[derive(Clone, Debug, PartialEq)]
pub struct TrieNode {
    pub node_key: i64,
    pub parent: i64,
    /// Byte on the edge from the parent; 0 for the root.
    pub label: u8,
    /// `(byte, child node key)`, sorted by byte.
    pub children: Vec<(u8, i64)>,
    /// Value node carrying [NodeReferences], NULL when this prefix is
    /// not a complete key.
    pub value_node: i64,
    /// Complete key stored at terminals for iteration.
    pub key: Option<IndexKey>,
}

impl TrieNode {
    fn new(node_key: i64, parent: i64, label: u8) -> TrieNode {
        TrieNode {
            node_key,
            parent,
            label,
            children: vec![],
            value_node: NULL_NODE_KEY,
            key: None,
        }
    }

    fn child(&self, label: u8) -> Option<i64> {
        self.children
            .binary_search_by_key(&label, |(byte, _)| *byte)
            .ok()
            .map(|at| self.children[at].1)
    }

    fn add_child(&mut self, label: u8, key: i64) {
        match self.children.binary_search_by_key(&label, |(byte, _)| *byte) {
            Ok(at) => self.children[at].1 = key,
            Err(at) => self.children.insert(at, (label, key)),
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        put_i64(buf, self.node_key);
        put_i64(buf, self.parent);
        put_u8(buf, self.label);
        put_u16(buf, self.children.len() as u16);
        for (byte, key) in self.children.iter() {
            put_u8(buf, *byte);
            put_i64(buf, *key);
        }
        put_i64(buf, self.value_node);
        match &self.key {
            Some(key) => {
                put_u8(buf, 1);
                key.encode(buf);
            }
            None => put_u8(buf, 0),
        }
    }

    pub fn decode(buf: &mut &[u8]) -> Result<TrieNode> {
        let node_key = binary::take_i64(buf)?;
        let parent = binary::take_i64(buf)?;
        let label = binary::take_u8(buf)?;
        let mut children = vec![];
        for _ in 0..binary::take_u16(buf)? {
            let byte = binary::take_u8(buf)?;
            children.push((byte, binary::take_i64(buf)?));
        }
        let value_node = binary::take_i64(buf)?;
        let key = match binary::take_u8(buf)? {
            0 => None,
            _ => Some(IndexKey::decode(buf)?),
        };
        Ok(TrieNode {
            node_key,
            parent,
            label,
            children,
            value_node,
            key,
        })
    }
}

fn fetch<S: IndexStore>(store: &mut S, it: IndexType, key: i64) -> Result<TrieNode> {
    match store.get_index_record(it, key)? {
        Some(IndexRecord::Trie(node)) => Ok(node),
        Some(_) => err_at!(Corrupt, msg: "non-trie record {}", key),
        None => err_at!(KeyNotFound, msg: "trie node {}", key),
    }
}

fn store_node(pwtx: &mut PageWriteTrx, it: IndexType, node: TrieNode) -> Result<()> {
    pwtx.put_record(it, Record::Index(IndexRecord::Trie(node)), None)
}

/// Merge `node_key` into the entry for `key`.
pub fn insert(
    pwtx: &mut PageWriteTrx,
    slot: usize,
    key: IndexKey,
    node_key: i64,
) -> Result<()> {
    let it = pwtx.index_meta(slot).index_type()?;

    let mut cur = match pwtx.index_meta(slot).root {
        NULL_NODE_KEY => {
            let root_key = pwtx.alloc_index_keys(slot, 1)?;
            store_node(pwtx, it, TrieNode::new(root_key, NULL_NODE_KEY, 0))?;
            pwtx.index_meta_mut(slot).root = root_key;
            root_key
        }
        root => root,
    };

    for byte in key.to_ordered_bytes() {
        let node = fetch(pwtx, it, cur)?;
        cur = match node.child(byte) {
            Some(child) => child,
            None => {
                let child_key = pwtx.alloc_index_keys(slot, 1)?;
                store_node(pwtx, it, TrieNode::new(child_key, cur, byte))?;
                let mut parent = fetch(pwtx, it, cur)?;
                parent.add_child(byte, child_key);
                store_node(pwtx, it, parent)?;
                child_key
            }
        };
    }

    let mut terminal = fetch(pwtx, it, cur)?;
    let mut refs = if terminal.value_node != NULL_NODE_KEY {
        match pwtx.get_index_record(it, terminal.value_node)? {
            Some(IndexRecord::Value(value)) => value.refs,
            _ => return err_at!(Corrupt, msg: "trie value {}", terminal.value_node),
        }
    } else {
        terminal.value_node = pwtx.alloc_index_keys(slot, 1)?;
        terminal.key = Some(key);
        NodeReferences::new()
    };
    refs.add(node_key);
    let value = crate::rbtree::node::RbValue {
        node_key: terminal.value_node,
        refs,
    };
    pwtx.put_record(it, Record::Index(IndexRecord::Value(value)), None)?;
    store_node(pwtx, it, terminal)
}

/// Remove `node_key` from the entry for `key`; `true` when present.
pub fn remove(
    pwtx: &mut PageWriteTrx,
    slot: usize,
    key: &IndexKey,
    node_key: i64,
) -> Result<bool> {
    let it = pwtx.index_meta(slot).index_type()?;
    let mut cur = pwtx.index_meta(slot).root;
    if cur == NULL_NODE_KEY {
        return Ok(false);
    }
    for byte in key.to_ordered_bytes() {
        let node = fetch(pwtx, it, cur)?;
        cur = match node.child(byte) {
            Some(child) => child,
            None => return Ok(false),
        };
    }
    let terminal = fetch(pwtx, it, cur)?;
    if terminal.value_node == NULL_NODE_KEY {
        return Ok(false);
    }
    let mut refs = match pwtx.get_index_record(it, terminal.value_node)? {
        Some(IndexRecord::Value(value)) => value.refs,
        _ => return err_at!(Corrupt, msg: "trie value {}", terminal.value_node),
    };
    let removed = refs.remove(node_key);
    let value = crate::rbtree::node::RbValue {
        node_key: terminal.value_node,
        refs,
    };
    pwtx.put_record(it, Record::Index(IndexRecord::Value(value)), None)?;
    Ok(removed)
}

/// All entries in ascending key order.
pub fn scan<S: IndexStore>(
    store: &mut S,
    it: IndexType,
    root: i64,
) -> Result<Vec<(IndexKey, NodeReferences)>> {
    let mut out = vec![];
    if root == NULL_NODE_KEY {
        return Ok(out);
    }
    let mut stack = vec![root];
    while let Some(cur) = stack.pop() {
        let node = fetch(store, it, cur)?;
        if let (Some(key), value_node) = (&node.key, node.value_node) {
            if value_node != NULL_NODE_KEY {
                let refs = match store.get_index_record(it, value_node)? {
                    Some(IndexRecord::Value(value)) => value.refs,
                    _ => return err_at!(Corrupt, msg: "trie value {}", value_node),
                };
                out.push((key.clone(), refs));
            }
        }
        // push in reverse so the smallest byte pops first.
        for (_, child) in node.children.iter().rev() {
            stack.push(*child);
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "trie_test.rs"]
mod trie_test;
