//! Module `reader` implement lookups and iteration over the persistent
//! red-black tree.

use crate::{
    index::{IndexRecord, NodeReferences},
    node::NULL_NODE_KEY,
    page::IndexType,
    rbtree::{node::IndexKey, IndexStore},
    Result,
};

/// How [get] treats a missing exact match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMode {
    Equal,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

fn fetch_key_node<S: IndexStore>(
    store: &mut S,
    it: IndexType,
    key: i64,
) -> Result<crate::rbtree::node::RbNode> {
    match store.get_index_record(it, key)? {
        Some(IndexRecord::Key(node)) => Ok(node),
        Some(_) => err_at!(Corrupt, msg: "value node {} where key node expected", key),
        None => err_at!(KeyNotFound, msg: "index node {}", key),
    }
}

fn fetch_refs<S: IndexStore>(
    store: &mut S,
    it: IndexType,
    key: i64,
) -> Result<NodeReferences> {
    match store.get_index_record(it, key)? {
        Some(IndexRecord::Value(value)) => Ok(value.refs),
        Some(_) => err_at!(Corrupt, msg: "key node {} where value node expected", key),
        None => err_at!(KeyNotFound, msg: "index value {}", key),
    }
}

/// Search for `key` under `mode`; returns the matched entry.
pub fn get<S: IndexStore>(
    store: &mut S,
    it: IndexType,
    root: i64,
    key: &IndexKey,
    mode: SearchMode,
) -> Result<Option<(IndexKey, NodeReferences)>> {
    let mut cur = root;
    // nearest smaller / larger candidates seen on the walk.
    let mut lower: Option<crate::rbtree::node::RbNode> = None;
    let mut upper: Option<crate::rbtree::node::RbNode> = None;

    while cur != NULL_NODE_KEY {
        let node = fetch_key_node(store, it, cur)?;
        match key.cmp(&node.key) {
            std::cmp::Ordering::Equal => {
                return match mode {
                    SearchMode::Greater => descend_min(store, it, node.right)?
                        .map(|node| resolve(store, it, node))
                        .transpose(),
                    SearchMode::Less => descend_max(store, it, node.left)?
                        .map(|node| resolve(store, it, node))
                        .transpose(),
                    _ => Ok(Some(resolve(store, it, node)?)),
                };
            }
            std::cmp::Ordering::Less => {
                upper = Some(node.clone());
                cur = node.left;
            }
            std::cmp::Ordering::Greater => {
                lower = Some(node.clone());
                cur = node.right;
            }
        }
    }

    let candidate = match mode {
        SearchMode::Equal => None,
        SearchMode::Greater | SearchMode::GreaterOrEqual => upper,
        SearchMode::Less | SearchMode::LessOrEqual => lower,
    };
    candidate.map(|node| resolve(store, it, node)).transpose()
}

fn resolve<S: IndexStore>(
    store: &mut S,
    it: IndexType,
    node: crate::rbtree::node::RbNode,
) -> Result<(IndexKey, NodeReferences)> {
    let refs = fetch_refs(store, it, node.value_node)?;
    Ok((node.key, refs))
}

fn descend_min<S: IndexStore>(
    store: &mut S,
    it: IndexType,
    mut cur: i64,
) -> Result<Option<crate::rbtree::node::RbNode>> {
    let mut best = None;
    while cur != NULL_NODE_KEY {
        let node = fetch_key_node(store, it, cur)?;
        cur = node.left;
        best = Some(node);
    }
    Ok(best)
}

fn descend_max<S: IndexStore>(
    store: &mut S,
    it: IndexType,
    mut cur: i64,
) -> Result<Option<crate::rbtree::node::RbNode>> {
    let mut best = None;
    while cur != NULL_NODE_KEY {
        let node = fetch_key_node(store, it, cur)?;
        cur = node.right;
        best = Some(node);
    }
    Ok(best)
}

/// All entries in ascending key order.
pub fn scan<S: IndexStore>(
    store: &mut S,
    it: IndexType,
    root: i64,
) -> Result<Vec<(IndexKey, NodeReferences)>> {
    let mut out = vec![];
    let mut stack = vec![];
    let mut cur = root;
    loop {
        while cur != NULL_NODE_KEY {
            let node = fetch_key_node(store, it, cur)?;
            cur = node.left;
            stack.push(node);
        }
        let node = match stack.pop() {
            Some(node) => node,
            None => break,
        };
        cur = node.right;
        out.push(resolve(store, it, node)?);
    }
    Ok(out)
}

/// Structural check used by tests and the verifier: red nodes have
/// black children and every root-to-leaf path carries the same number
/// of black nodes. Returns the black height.
pub fn validate<S: IndexStore>(store: &mut S, it: IndexType, root: i64) -> Result<usize> {
    if root != NULL_NODE_KEY && fetch_key_node(store, it, root)?.red {
        return err_at!(Fatal, msg: "red root");
    }
    black_height(store, it, root)
}

fn black_height<S: IndexStore>(store: &mut S, it: IndexType, key: i64) -> Result<usize> {
    if key == NULL_NODE_KEY {
        return Ok(1);
    }
    let node = fetch_key_node(store, it, key)?;
    if node.red {
        for child in [node.left, node.right].iter() {
            if *child != NULL_NODE_KEY && fetch_key_node(store, it, *child)?.red {
                return err_at!(Fatal, msg: "red node {} has red child", key);
            }
        }
    }
    let lh = black_height(store, it, node.left)?;
    let rh = black_height(store, it, node.right)?;
    if lh != rh {
        err_at!(Fatal, msg: "black height {} != {} at {}", lh, rh, key)
    } else {
        Ok(lh + if node.red { 0 } else { 1 })
    }
}

#[cfg(test)]
#[path = "reader_test.rs"]
mod reader_test;
