//! Module `tree` implement the transaction core: the cursor contract,
//! read transactions over a pinned revision and the write transaction
//! with its redo log and commit pipeline.

use crate::node::{Node, NodeKind, NULL_NODE_KEY};

pub mod pagetree;
pub mod rtx;
pub mod wtx;

pub use rtx::{NodeReadTrx, PageReadTrx};
pub use wtx::{NodeWriteTrx, PageWriteTrx, RevisionInfo};

/// Cursor contract shared by read and write cursors.
///
/// Every `move_to*` either moves the cursor and returns `true`, or
/// leaves it at the prior node and returns `false`.
pub trait NodeCursor {
    /// Current node, the immutable view.
    fn node(&self) -> &Node;

    /// Position the cursor at `key`.
    fn move_to(&mut self, key: i64) -> bool;

    fn move_to_document_root(&mut self) -> bool {
        self.move_to(crate::node::DOCUMENT_ROOT)
    }

    fn move_to_parent(&mut self) -> bool {
        self.move_to(self.node().parent_key())
    }

    fn move_to_first_child(&mut self) -> bool {
        self.move_to(self.node().first_child_key())
    }

    fn move_to_last_child(&mut self) -> bool {
        self.move_to(self.node().last_child_key())
    }

    fn move_to_left_sibling(&mut self) -> bool {
        self.move_to(self.node().left_sibling_key())
    }

    fn move_to_right_sibling(&mut self) -> bool {
        self.move_to(self.node().right_sibling_key())
    }

    /// Document order successor: first child, else nearest following
    /// sibling up the ancestor chain.
    fn move_to_next(&mut self) -> bool {
        if self.move_to_first_child() {
            true
        } else {
            self.move_to_next_following()
        }
    }

    /// Document order predecessor: deepest descendant of the left
    /// sibling, else the parent.
    fn move_to_previous(&mut self) -> bool {
        let start = self.node().node_key();
        if self.move_to_left_sibling() {
            while self.move_to_last_child() {}
            true
        } else if self.move_to_parent() {
            true
        } else {
            debug_assert_eq!(self.node().node_key(), start);
            false
        }
    }

    /// Right sibling of the nearest ancestor that has one.
    fn move_to_next_following(&mut self) -> bool {
        let start = self.node().node_key();
        loop {
            if self.node().right_sibling_key() != NULL_NODE_KEY {
                return self.move_to_right_sibling();
            }
            if !self.move_to_parent() {
                self.move_to(start);
                return false;
            }
        }
    }

    fn node_key(&self) -> i64 {
        self.node().node_key()
    }

    fn kind(&self) -> NodeKind {
        self.node().kind()
    }

    fn parent_key(&self) -> i64 {
        self.node().parent_key()
    }

    fn first_child_key(&self) -> i64 {
        self.node().first_child_key()
    }

    fn last_child_key(&self) -> i64 {
        self.node().last_child_key()
    }

    fn left_sibling_key(&self) -> i64 {
        self.node().left_sibling_key()
    }

    fn right_sibling_key(&self) -> i64 {
        self.node().right_sibling_key()
    }

    fn child_count(&self) -> u64 {
        self.node().child_count()
    }

    fn descendant_count(&self) -> u64 {
        self.node().descendant_count()
    }

    fn hash(&self) -> u64 {
        self.node().header.hash
    }

    fn path_node_key(&self) -> i64 {
        self.node().path_node_key()
    }

    fn has_first_child(&self) -> bool {
        self.first_child_key() != NULL_NODE_KEY
    }

    fn has_right_sibling(&self) -> bool {
        self.right_sibling_key() != NULL_NODE_KEY
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
