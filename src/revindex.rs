//! Module `revindex` implement the timestamp to revision-offset lookup.
//!
//! Commits append `(timestamp, offset)` pairs; timestamps are
//! monotonically non-decreasing, so append keeps both arrays sorted and
//! opening a revision by time is a plain binary search.

use crate::Result;

/// Per revision file data, one entry per committed revision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevisionFileData {
    pub offset: u64,
    pub timestamp_ms: u64,
}

/// Parallel pair of sorted arrays `(timestamps[], offsets[])`, entry
/// index equals revision number.
#[derive(Clone, Default)]
pub struct RevisionIndex {
    timestamps: Vec<u64>,
    offsets: Vec<u64>,
}

impl RevisionIndex {
    pub fn new() -> RevisionIndex {
        RevisionIndex::default()
    }

    pub fn from_entries(entries: Vec<RevisionFileData>) -> Result<RevisionIndex> {
        let mut index = RevisionIndex::new();
        for entry in entries.into_iter() {
            index.append(entry.timestamp_ms, entry.offset)?;
        }
        Ok(index)
    }

    /// Number of committed revisions.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Append the entry for a freshly committed revision.
    pub fn append(&mut self, timestamp_ms: u64, offset: u64) -> Result<()> {
        if let Some(last) = self.timestamps.last() {
            if *last > timestamp_ms {
                return err_at!(
                    Fatal, msg: "timestamp regression {} > {}", last, timestamp_ms
                );
            }
        }
        self.timestamps.push(timestamp_ms);
        self.offsets.push(offset);
        Ok(())
    }

    /// Return the greatest revision whose timestamp is `<= t`, or -1
    /// if every revision is younger than `t`.
    pub fn find_revision(&self, t: u64) -> i64 {
        // binary search for the first timestamp > t.
        let (mut lo, mut hi) = (0_usize, self.timestamps.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.timestamps[mid] <= t {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo as i64 - 1
    }

    pub fn get(&self, revision: u32) -> Result<RevisionFileData> {
        let idx = revision as usize;
        if idx >= self.timestamps.len() {
            err_at!(OutOfRange, msg: "revision {} latest {}", revision, self.timestamps.len())
        } else {
            Ok(RevisionFileData {
                offset: self.offsets[idx],
                timestamp_ms: self.timestamps[idx],
            })
        }
    }

    /// Drop entries beyond `revision`, part of undo.
    pub fn truncate_to(&mut self, revision: u32) {
        let n = (revision as usize) + 1;
        self.timestamps.truncate(n);
        self.offsets.truncate(n);
    }
}

#[cfg(test)]
#[path = "revindex_test.rs"]
mod revindex_test;
