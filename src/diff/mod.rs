//! Module `diff` implement the revision diff engine.
//!
//! Two cursors co-walk the old and the new revision in preorder. Node
//! keys are stable for a node's lifetime, so identity is key equality;
//! equal rolling hashes short-circuit whole subtrees as unchanged.
//! Tree moves are out of scope and degrade into delete plus insert.

use crate::{
    node::NULL_NODE_KEY,
    tree::{NodeCursor, NodeReadTrx},
    Result,
};

pub mod serializer;

pub use serializer::JsonDiffSerializer;

/// Kind of one diff observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffKind {
    Inserted,
    Deleted,
    ReplacedNew,
    ReplacedOld,
    Updated,
    Same,
    SameHash,
}

/// One diff observation over a pair of revisions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiffTuple {
    pub kind: DiffKind,
    pub old_node_key: i64,
    pub new_node_key: i64,
    pub depth: u64,
}

fn depth_of(trx: &mut NodeReadTrx) -> u64 {
    let at = trx.node_key();
    let mut depth = 0;
    while trx.move_to_parent() {
        depth += 1;
    }
    trx.move_to(at);
    depth
}

fn contains(trx: &mut NodeReadTrx, key: i64) -> bool {
    let at = trx.node_key();
    let found = trx.move_to(key);
    trx.move_to(at);
    found
}

// preorder step; false once the walk left the document.
fn step(trx: &mut NodeReadTrx) -> bool {
    trx.move_to_next()
}

// skip the whole subtree under the current node.
fn step_over(trx: &mut NodeReadTrx) -> bool {
    trx.move_to_next_following()
}

/// Diff `old` against `new`, emitting tuples in document order of the
/// new revision.
pub fn diff_revisions(
    old: &mut NodeReadTrx,
    new: &mut NodeReadTrx,
) -> Result<Vec<DiffTuple>> {
    let mut tuples = vec![];

    old.move_to_document_root();
    new.move_to_document_root();
    let mut old_live = step(old);
    let mut new_live = step(new);

    loop {
        match (old_live, new_live) {
            (false, false) => break,
            (false, true) => {
                tuples.push(DiffTuple {
                    kind: DiffKind::Inserted,
                    old_node_key: NULL_NODE_KEY,
                    new_node_key: new.node_key(),
                    depth: depth_of(new),
                });
                new_live = step_over(new);
            }
            (true, false) => {
                tuples.push(DiffTuple {
                    kind: DiffKind::Deleted,
                    old_node_key: old.node_key(),
                    new_node_key: NULL_NODE_KEY,
                    depth: depth_of(old),
                });
                old_live = step_over(old);
            }
            (true, true) => {
                let (old_key, new_key) = (old.node_key(), new.node_key());
                if old_key == new_key {
                    let depth = depth_of(new);
                    if old.hash() == new.hash() {
                        tuples.push(DiffTuple {
                            kind: DiffKind::SameHash,
                            old_node_key: old_key,
                            new_node_key: new_key,
                            depth,
                        });
                        old_live = step_over(old);
                        new_live = step_over(new);
                    } else if old.node().kind() != new.node().kind() {
                        tuples.push(DiffTuple {
                            kind: DiffKind::ReplacedOld,
                            old_node_key: old_key,
                            new_node_key: NULL_NODE_KEY,
                            depth,
                        });
                        tuples.push(DiffTuple {
                            kind: DiffKind::ReplacedNew,
                            old_node_key: NULL_NODE_KEY,
                            new_node_key: new_key,
                            depth,
                        });
                        old_live = step_over(old);
                        new_live = step_over(new);
                    } else if old.node().local_hash() != new.node().local_hash() {
                        tuples.push(DiffTuple {
                            kind: DiffKind::Updated,
                            old_node_key: old_key,
                            new_node_key: new_key,
                            depth,
                        });
                        old_live = step(old);
                        new_live = step(new);
                    } else {
                        tuples.push(DiffTuple {
                            kind: DiffKind::Same,
                            old_node_key: old_key,
                            new_node_key: new_key,
                            depth,
                        });
                        old_live = step(old);
                        new_live = step(new);
                    }
                } else if !contains(old, new_key) {
                    tuples.push(DiffTuple {
                        kind: DiffKind::Inserted,
                        old_node_key: NULL_NODE_KEY,
                        new_node_key: new_key,
                        depth: depth_of(new),
                    });
                    new_live = step_over(new);
                } else {
                    tuples.push(DiffTuple {
                        kind: DiffKind::Deleted,
                        old_node_key: old_key,
                        new_node_key: NULL_NODE_KEY,
                        depth: depth_of(old),
                    });
                    old_live = step_over(old);
                }
            }
        }
    }

    Ok(tuples)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
