//! Module `limited` implement the depth and breadth bounded descendant
//! axis.
//!
//! Two cut-offs on top of the JSON-aware walk: `max_level` stops the
//! descent below a depth, where an object key and its value count as
//! one level; `max_children` bounds how many children each depth may
//! emit, with a lazily resized per-level counter.

use crate::{
    axis::IncludeSelf,
    node::{NodeKind, NULL_NODE_KEY},
    tree::NodeCursor,
};

pub struct JsonLimitedDescendantAxis<'a, C>
where
    C: NodeCursor,
{
    cursor: &'a mut C,
    include_self: bool,
    start_key: i64,
    max_level: Option<u32>,
    max_children: Option<u64>,
    stack: Vec<(i64, u32)>,
    // children emitted so far per depth, resized on demand.
    emitted: Vec<u64>,
    depth: u32,
    first: bool,
    done: bool,
}

impl<'a, C> JsonLimitedDescendantAxis<'a, C>
where
    C: NodeCursor,
{
    pub fn new(
        cursor: &'a mut C,
        include_self: IncludeSelf,
        max_level: Option<u32>,
        max_children: Option<u64>,
    ) -> Self {
        let start_key = cursor.node_key();
        JsonLimitedDescendantAxis {
            cursor,
            include_self: include_self == IncludeSelf::Yes,
            start_key,
            max_level,
            max_children,
            stack: vec![],
            emitted: vec![],
            depth: 0,
            first: true,
            done: false,
        }
    }

    pub fn cursor(&self) -> &C {
        &*self.cursor
    }

    fn finish(&mut self) -> Option<i64> {
        self.done = true;
        self.cursor.move_to(self.start_key);
        None
    }

    // the object-key/value pairing keeps values on their key's level.
    fn child_level(&self) -> u32 {
        if self.cursor.kind() == NodeKind::ObjectKey {
            self.depth
        } else {
            self.depth + 1
        }
    }

    fn may_descend(&self) -> bool {
        match self.max_level {
            Some(max) => self.child_level() <= max,
            None => true,
        }
    }

    // account one emission at `depth`; false once the depth is full.
    fn may_emit(&mut self, depth: u32) -> bool {
        let max = match self.max_children {
            Some(max) => max,
            None => return true,
        };
        let at = depth as usize;
        if self.emitted.len() <= at {
            self.emitted.resize(at + 1, 0);
        }
        if self.emitted[at] >= max {
            false
        } else {
            self.emitted[at] += 1;
            true
        }
    }

    // a depth that exhausted its quota skips the rest of its sibling
    // chain, subtrees included; climb through pending ancestors.
    fn next_from_stack(&mut self) -> Option<i64> {
        loop {
            match self.stack.pop() {
                Some((_, 0)) => return self.finish(),
                Some((key, depth)) => {
                    self.depth = depth;
                    self.cursor.move_to(key);
                    if self.may_emit(depth) {
                        return Some(key);
                    }
                }
                None => return self.finish(),
            }
        }
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
            if self.cursor.move_to_first_child() {
                self.depth = 1;
                if self.may_emit(1) {
                    return Some(self.cursor.node_key());
                }
                return self.next_from_stack();
            }
            return self.finish();
        }

        if self.cursor.has_first_child() && self.may_descend() {
            let right = self.cursor.right_sibling_key();
            if right != NULL_NODE_KEY {
                self.stack.push((right, self.depth));
            }
            let level = self.child_level();
            self.depth = level;
            self.cursor.move_to_first_child();
            if self.may_emit(level) {
                return Some(self.cursor.node_key());
            }
            return self.next_from_stack();
        }

        if self.cursor.has_right_sibling() {
            if self.depth == 0 {
                return self.finish();
            }
            self.cursor.move_to_right_sibling();
            if self.may_emit(self.depth) {
                return Some(self.cursor.node_key());
            }
            return self.next_from_stack();
        }

        self.next_from_stack()
    }
}

impl<'a, C> Iterator for JsonLimitedDescendantAxis<'a, C>
where
    C: NodeCursor,
{
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        self.next_key()
    }
}

#[cfg(test)]
#[path = "limited_test.rs"]
mod limited_test;
