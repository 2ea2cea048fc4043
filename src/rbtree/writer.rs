//! Module `writer` implement mutations on the persistent red-black
//! tree.

use crate::{
    index::IndexRecord,
    node::NULL_NODE_KEY,
    page::{IndexType, Record},
    rbtree::{
        node::{IndexKey, RbNode, RbValue},
        IndexStore,
    },
    tree::PageWriteTrx,
    Result,
};

fn fetch_key_node(pwtx: &mut PageWriteTrx, it: IndexType, key: i64) -> Result<RbNode> {
    match pwtx.get_index_record(it, key)? {
        Some(IndexRecord::Key(node)) => Ok(node),
        Some(_) => err_at!(Corrupt, msg: "value node {} where key node expected", key),
        None => err_at!(KeyNotFound, msg: "index node {}", key),
    }
}

fn store_key_node(pwtx: &mut PageWriteTrx, it: IndexType, mut node: RbNode) -> Result<()> {
    node.changed = true;
    pwtx.put_record(it, Record::Index(IndexRecord::Key(node)), None)
}

fn fetch_value(pwtx: &mut PageWriteTrx, it: IndexType, key: i64) -> Result<RbValue> {
    match pwtx.get_index_record(it, key)? {
        Some(IndexRecord::Value(value)) => Ok(value),
        Some(_) => err_at!(Corrupt, msg: "key node {} where value node expected", key),
        None => err_at!(KeyNotFound, msg: "index value {}", key),
    }
}

fn store_value(pwtx: &mut PageWriteTrx, it: IndexType, value: RbValue) -> Result<()> {
    pwtx.put_record(it, Record::Index(IndexRecord::Value(value)), None)
}

/// Merge `node_key` into the entry for `key`, allocating a fresh
/// key/value node pair on miss. Returns the value node's key.
pub fn index_insert(
    pwtx: &mut PageWriteTrx,
    slot: usize,
    key: IndexKey,
    node_key: i64,
) -> Result<i64> {
    let it = pwtx.index_meta(slot).index_type()?;
    let root = pwtx.index_meta(slot).root;

    if root == NULL_NODE_KEY {
        let pair = pwtx.alloc_index_keys(slot, 2)?;
        let mut znode = RbNode::new(pair, NULL_NODE_KEY, key);
        znode.red = false;
        let mut value = RbValue {
            node_key: pair + 1,
            refs: Default::default(),
        };
        value.refs.add(node_key);
        store_key_node(pwtx, it, znode)?;
        store_value(pwtx, it, value)?;
        pwtx.index_meta_mut(slot).root = pair;
        return Ok(pair + 1);
    }

    // walk to the insertion point, or an existing entry.
    let mut cur = root;
    let attach = loop {
        let node = fetch_key_node(pwtx, it, cur)?;
        match key.cmp(&node.key) {
            std::cmp::Ordering::Equal => {
                let mut value = fetch_value(pwtx, it, node.value_node)?;
                value.refs.add(node_key);
                let value_key = value.node_key;
                store_value(pwtx, it, value)?;
                return Ok(value_key);
            }
            std::cmp::Ordering::Less if node.left == NULL_NODE_KEY => break (cur, true),
            std::cmp::Ordering::Less => cur = node.left,
            std::cmp::Ordering::Greater if node.right == NULL_NODE_KEY => {
                break (cur, false)
            }
            std::cmp::Ordering::Greater => cur = node.right,
        }
    };

    let pair = pwtx.alloc_index_keys(slot, 2)?;
    let znode = RbNode::new(pair, attach.0, key);
    let mut value = RbValue {
        node_key: pair + 1,
        refs: Default::default(),
    };
    value.refs.add(node_key);

    let mut parent = fetch_key_node(pwtx, it, attach.0)?;
    if attach.1 {
        parent.left = pair;
    } else {
        parent.right = pair;
    }
    store_key_node(pwtx, it, parent)?;
    store_key_node(pwtx, it, znode)?;
    store_value(pwtx, it, value)?;

    insert_fixup(pwtx, it, slot, pair)?;
    Ok(pair + 1)
}

/// Remove `node_key` from the entry for `key`; `true` when it was
/// present. The key node itself stays, an empty reference set is a
/// valid entry.
pub fn index_remove(
    pwtx: &mut PageWriteTrx,
    slot: usize,
    key: &IndexKey,
    node_key: i64,
) -> Result<bool> {
    let it = pwtx.index_meta(slot).index_type()?;
    let mut cur = pwtx.index_meta(slot).root;
    while cur != NULL_NODE_KEY {
        let node = fetch_key_node(pwtx, it, cur)?;
        match key.cmp(&node.key) {
            std::cmp::Ordering::Equal => {
                let mut value = fetch_value(pwtx, it, node.value_node)?;
                let removed = value.refs.remove(node_key);
                store_value(pwtx, it, value)?;
                return Ok(removed);
            }
            std::cmp::Ordering::Less => cur = node.left,
            std::cmp::Ordering::Greater => cur = node.right,
        }
    }
    Ok(false)
}

// standard red-black insertion fix-up over the record store.
fn insert_fixup(pwtx: &mut PageWriteTrx, it: IndexType, slot: usize, mut z: i64) -> Result<()> {
    loop {
        let znode = fetch_key_node(pwtx, it, z)?;
        if znode.parent == NULL_NODE_KEY {
            break;
        }
        let parent = fetch_key_node(pwtx, it, znode.parent)?;
        if !parent.red {
            break;
        }
        // red parent implies a grandparent, the root is black.
        let gkey = parent.parent;
        let mut grand = fetch_key_node(pwtx, it, gkey)?;
        let parent_is_left = grand.left == parent.node_key;
        let uncle_key = if parent_is_left { grand.right } else { grand.left };
        let uncle_red = if uncle_key != NULL_NODE_KEY {
            fetch_key_node(pwtx, it, uncle_key)?.red
        } else {
            false
        };

        if uncle_red {
            let mut p = parent;
            p.red = false;
            store_key_node(pwtx, it, p)?;
            let mut uncle = fetch_key_node(pwtx, it, uncle_key)?;
            uncle.red = false;
            store_key_node(pwtx, it, uncle)?;
            grand.red = true;
            store_key_node(pwtx, it, grand)?;
            z = gkey;
            continue;
        }

        if parent_is_left {
            if parent.right == z {
                z = parent.node_key;
                rotate_left(pwtx, it, slot, z)?;
            }
            let zn = fetch_key_node(pwtx, it, z)?;
            let mut p = fetch_key_node(pwtx, it, zn.parent)?;
            let gkey = p.parent;
            p.red = false;
            store_key_node(pwtx, it, p)?;
            let mut g = fetch_key_node(pwtx, it, gkey)?;
            g.red = true;
            store_key_node(pwtx, it, g)?;
            rotate_right(pwtx, it, slot, gkey)?;
        } else {
            if parent.left == z {
                z = parent.node_key;
                rotate_right(pwtx, it, slot, z)?;
            }
            let zn = fetch_key_node(pwtx, it, z)?;
            let mut p = fetch_key_node(pwtx, it, zn.parent)?;
            let gkey = p.parent;
            p.red = false;
            store_key_node(pwtx, it, p)?;
            let mut g = fetch_key_node(pwtx, it, gkey)?;
            g.red = true;
            store_key_node(pwtx, it, g)?;
            rotate_left(pwtx, it, slot, gkey)?;
        }
    }

    let root = pwtx.index_meta(slot).root;
    let mut root_node = fetch_key_node(pwtx, it, root)?;
    if root_node.red {
        root_node.red = false;
        store_key_node(pwtx, it, root_node)?;
    }
    Ok(())
}

fn rotate_left(pwtx: &mut PageWriteTrx, it: IndexType, slot: usize, xkey: i64) -> Result<()> {
    let mut x = fetch_key_node(pwtx, it, xkey)?;
    let ykey = x.right;
    let mut y = fetch_key_node(pwtx, it, ykey)?;

    x.right = y.left;
    if y.left != NULL_NODE_KEY {
        let mut child = fetch_key_node(pwtx, it, y.left)?;
        child.parent = xkey;
        store_key_node(pwtx, it, child)?;
    }
    y.parent = x.parent;
    if x.parent == NULL_NODE_KEY {
        pwtx.index_meta_mut(slot).root = ykey;
    } else {
        let mut parent = fetch_key_node(pwtx, it, x.parent)?;
        if parent.left == xkey {
            parent.left = ykey;
        } else {
            parent.right = ykey;
        }
        store_key_node(pwtx, it, parent)?;
    }
    y.left = xkey;
    x.parent = ykey;
    store_key_node(pwtx, it, x)?;
    store_key_node(pwtx, it, y)?;
    Ok(())
}

fn rotate_right(pwtx: &mut PageWriteTrx, it: IndexType, slot: usize, xkey: i64) -> Result<()> {
    let mut x = fetch_key_node(pwtx, it, xkey)?;
    let ykey = x.left;
    let mut y = fetch_key_node(pwtx, it, ykey)?;

    x.left = y.right;
    if y.right != NULL_NODE_KEY {
        let mut child = fetch_key_node(pwtx, it, y.right)?;
        child.parent = xkey;
        store_key_node(pwtx, it, child)?;
    }
    y.parent = x.parent;
    if x.parent == NULL_NODE_KEY {
        pwtx.index_meta_mut(slot).root = ykey;
    } else {
        let mut parent = fetch_key_node(pwtx, it, x.parent)?;
        if parent.left == xkey {
            parent.left = ykey;
        } else {
            parent.right = ykey;
        }
        store_key_node(pwtx, it, parent)?;
    }
    y.right = xkey;
    x.parent = ykey;
    store_key_node(pwtx, it, x)?;
    store_key_node(pwtx, it, y)?;
    Ok(())
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;
