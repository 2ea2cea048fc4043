//! Module `pagetree` implement the four level indirect walk shared by
//! all record subtrees.
//!
//! A page key is split into [INP_LEVELS] groups of [INP_LEVEL_BITS]
//! bits, one per level; each group indexes one reference inside that
//! level's indirect page.

use crate::page::{INP_LEVELS, INP_LEVEL_BITS, INP_REFERENCE_COUNT};

/// Highest page key addressable by the indirect tree.
pub const MAX_PAGE_KEY: u64 = (1 << (INP_LEVEL_BITS as u64 * INP_LEVELS as u64)) - 1;

/// Slot offset of `page_key` at `level`; level 0 is directly under the
/// subtree root, level `INP_LEVELS - 1` references the leaf.
#[inline]
pub fn level_offset(page_key: u64, level: usize) -> usize {
    debug_assert!(level < INP_LEVELS);
    let shift = INP_LEVEL_BITS * ((INP_LEVELS - 1 - level) as u32);
    ((page_key >> shift) as usize) & (INP_REFERENCE_COUNT - 1)
}

#[cfg(test)]
#[path = "pagetree_test.rs"]
mod pagetree_test;
