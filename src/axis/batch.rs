//! Module `batch` implement the allocation-free batched descendant
//! axis.
//!
//! The same preorder state machine, driven in chunks: callers either
//! fill a reusable key buffer or run a consumer against the positioned
//! cursor, and zero or more filter predicates reject candidates before
//! they are emitted.

use crate::{
    axis::{descendant::DescendantAxis, IncludeSelf},
    tree::NodeCursor,
};

/// Filter predicate over the cursor-positioned candidate.
pub type Filter<C> = Box<dyn Fn(&C) -> bool>;

pub struct BatchDescendantAxis<'a, C>
where
    C: NodeCursor,
{
    inner: DescendantAxis<'a, C>,
    filters: Vec<Filter<C>>,
}

impl<'a, C> BatchDescendantAxis<'a, C>
where
    C: NodeCursor,
{
    pub fn new(cursor: &'a mut C, include_self: IncludeSelf) -> Self {
        BatchDescendantAxis {
            inner: DescendantAxis::new(cursor, include_self),
            filters: vec![],
        }
    }

    /// Add a predicate; candidates must pass every one.
    pub fn with_filter(mut self, filter: Filter<C>) -> Self {
        self.filters.push(filter);
        self
    }

    fn next_accepted(&mut self) -> Option<i64> {
        loop {
            let key = self.inner.next_key()?;
            let cursor = self.inner.cursor();
            if self.filters.iter().all(|accept| accept(cursor)) {
                return Some(key);
            }
        }
    }

    /// Append up to `max` accepted keys into `out`, returning how many
    /// were produced. Zero means the axis is exhausted.
    pub fn next_batch(&mut self, out: &mut Vec<i64>, max: usize) -> usize {
        let mut produced = 0;
        while produced < max {
            match self.next_accepted() {
                Some(key) => {
                    out.push(key);
                    produced += 1;
                }
                None => break,
            }
        }
        produced
    }

    /// Run `consumer` against the positioned cursor for up to `max`
    /// accepted nodes, returning how many ran.
    pub fn for_each_next<F>(&mut self, max: usize, mut consumer: F) -> usize
    where
        F: FnMut(&C),
    {
        let mut produced = 0;
        while produced < max {
            match self.next_accepted() {
                Some(_) => {
                    consumer(self.inner.cursor());
                    produced += 1;
                }
                None => break,
            }
        }
        produced
    }
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod batch_test;
