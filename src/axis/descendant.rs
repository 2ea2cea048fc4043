//! Module `descendant` implement the basic preorder descendant axis.

use crate::{
    axis::IncludeSelf,
    node::NULL_NODE_KEY,
    tree::NodeCursor,
};

/// Preorder walk over the subtree rooted at the cursor's position.
///
/// First-child wins over right-sibling; a stack of pending sibling
/// keys drives the climb back up. O(1) amortized per step.
pub struct DescendantAxis<'a, C>
where
    C: NodeCursor,
{
    cursor: &'a mut C,
    include_self: bool,
    start_key: i64,
    // right sibling of the start node, the subtree boundary.
    start_right_sibling: i64,
    stack: Vec<i64>,
    first: bool,
    done: bool,
}

impl<'a, C> DescendantAxis<'a, C>
where
    C: NodeCursor,
{
    /// Anchor the axis at the cursor's current node.
    pub fn new(cursor: &'a mut C, include_self: IncludeSelf) -> Self {
        let start_key = cursor.node_key();
        let start_right_sibling = cursor.right_sibling_key();
        DescendantAxis {
            cursor,
            include_self: include_self == IncludeSelf::Yes,
            start_key,
            start_right_sibling,
            stack: vec![],
            first: true,
            done: false,
        }
    }

    pub fn cursor(&self) -> &C {
        &*self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut C {
        self.cursor
    }

    // rewind to the start node and finish.
    fn finish(&mut self) -> Option<i64> {
        self.done = true;
        self.cursor.move_to(self.start_key);
        None
    }

    /// Key of the next node in preorder; the cursor is left positioned
    /// on it.
    pub fn next_key(&mut self) -> Option<i64> {
        if self.done {
            return None;
        }

        if self.first {
            self.first = false;
            if self.include_self {
                self.cursor.move_to(self.start_key);
                return Some(self.start_key);
            }
            self.cursor.move_to(self.start_key);
            return if self.cursor.move_to_first_child() {
                Some(self.cursor.node_key())
            } else {
                self.finish()
            };
        }

        if self.cursor.has_first_child() {
            let right = self.cursor.right_sibling_key();
            if right != NULL_NODE_KEY {
                self.stack.push(right);
            }
            self.cursor.move_to_first_child();
            return Some(self.cursor.node_key());
        }

        let right = self.cursor.right_sibling_key();
        if right != NULL_NODE_KEY {
            if right == self.start_right_sibling {
                return self.finish();
            }
            self.cursor.move_to_right_sibling();
            return Some(self.cursor.node_key());
        }

        match self.stack.pop() {
            Some(key) if key == self.start_right_sibling => self.finish(),
            Some(key) => {
                self.cursor.move_to(key);
                Some(key)
            }
            None => self.finish(),
        }
    }
}

impl<'a, C> Iterator for DescendantAxis<'a, C>
where
    C: NodeCursor,
{
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        self.next_key()
    }
}

#[cfg(test)]
#[path = "descendant_test.rs"]
mod descendant_test;
