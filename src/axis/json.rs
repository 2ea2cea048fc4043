//! Module `json` implement the depth-tracking descendant axis.
//!
//! Identical preorder walk to
//! [DescendantAxis](crate::axis::DescendantAxis), but stack entries
//! carry the depth they re-enter at; restoring depth zero terminates,
//! which lets axes anchored at non-root nodes stop correctly.

use crate::{axis::IncludeSelf, node::NULL_NODE_KEY, tree::NodeCursor};

pub struct JsonDescendantAxis<'a, C>
where
    C: NodeCursor,
{
    cursor: &'a mut C,
    include_self: bool,
    start_key: i64,
    stack: Vec<(i64, u32)>,
    depth: u32,
    first: bool,
    done: bool,
}

impl<'a, C> JsonDescendantAxis<'a, C>
where
    C: NodeCursor,
{
    pub fn new(cursor: &'a mut C, include_self: IncludeSelf) -> Self {
        let start_key = cursor.node_key();
        JsonDescendantAxis {
            cursor,
            include_self: include_self == IncludeSelf::Yes,
            start_key,
            stack: vec![],
            depth: 0,
            first: true,
            done: false,
        }
    }

    pub fn cursor(&self) -> &C {
        &*self.cursor
    }

    /// Depth of the node the cursor sits on, zero for the start node.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    fn finish(&mut self) -> Option<i64> {
        self.done = true;
        self.cursor.move_to(self.start_key);
        None
    }

    pub fn next_key(&mut self) -> Option<i64> {
        if self.done {
            return None;
        }

        if self.first {
            self.first = false;
            self.cursor.move_to(self.start_key);
            if self.include_self {
                return Some(self.start_key);
            }
            return if self.cursor.move_to_first_child() {
                self.depth = 1;
                Some(self.cursor.node_key())
            } else {
                self.finish()
            };
        }

        if self.cursor.has_first_child() {
            let right = self.cursor.right_sibling_key();
            if right != NULL_NODE_KEY {
                self.stack.push((right, self.depth));
            }
            self.depth += 1;
            self.cursor.move_to_first_child();
            return Some(self.cursor.node_key());
        }

        if self.cursor.has_right_sibling() {
            if self.depth == 0 {
                // the start node's own sibling is outside the subtree.
                return self.finish();
            }
            self.cursor.move_to_right_sibling();
            return Some(self.cursor.node_key());
        }

        match self.stack.pop() {
            Some((_, 0)) => self.finish(),
            Some((key, depth)) => {
                self.depth = depth;
                self.cursor.move_to(key);
                Some(key)
            }
            None => self.finish(),
        }
    }
}

impl<'a, C> Iterator for JsonDescendantAxis<'a, C>
where
    C: NodeCursor,
{
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        self.next_key()
    }
}

#[cfg(test)]
#[path = "json_test.rs"]
mod json_test;
