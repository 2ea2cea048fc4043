//! Module `reference` implement the handle through which one page
//! points at another.
//!
//! A reference either points at a persisted page - `key` is the file
//! offset of its latest fragment - or at an uncommitted page parked in
//! the redo log under `log_key`. The fragment list keeps prior
//! `(revision, offset)` pairs so older revisions stay readable until
//! the epoch watermark passes them.

use crate::{
    util::binary::{self, put_u16, put_u32, put_u64, put_u8},
    Result,
};

/// Offset value marking an unresolved reference.
pub const UNRESOLVED: u64 = 0;

/// Reference to a page, persisted or parked in the redo log.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct PageRef {
    /// File offset of the latest fragment, 0 = unresolved.
    pub key: u64,
    /// Content hash over the compressed bytes as written to disk.
    pub hash: Vec<u8>,
    /// Redo-log index for uncommitted pages, never serialized.
    pub log_key: Option<u64>,
    /// Prior fragments as `(revision, offset)`, oldest first.
    pub fragments: Vec<(u32, u64)>,
}

impl PageRef {
    pub fn new() -> PageRef {
        PageRef::default()
    }

    pub fn with_offset(key: u64) -> PageRef {
        PageRef {
            key,
            ..PageRef::default()
        }
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.key != UNRESOLVED
    }

    #[inline]
    pub fn in_log(&self) -> bool {
        self.log_key.is_some()
    }

    /// Record a freshly written fragment for `revision` at `offset`.
    pub fn resolve(&mut self, revision: u32, offset: u64, hash: Vec<u8>) {
        self.key = offset;
        self.hash = hash;
        self.log_key = None;
        self.fragments.push((revision, offset));
    }

    /// Drop fragments no reader can still observe. The latest fragment
    /// is always kept.
    pub fn prune_fragments(&mut self, min_active_revision: u32) {
        if self.fragments.len() > 1 {
            let last = self.fragments.len() - 1;
            let keep: Vec<(u32, u64)> = self
                .fragments
                .iter()
                .enumerate()
                .filter(|(i, (rev, _))| *i == last || *rev >= min_active_revision)
                .map(|(_, frag)| *frag)
                .collect();
            self.fragments = keep;
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        put_u64(buf, self.key);
        put_u8(buf, self.hash.len() as u8);
        buf.extend_from_slice(&self.hash);
        put_u16(buf, self.fragments.len() as u16);
        for (revision, offset) in self.fragments.iter() {
            put_u32(buf, *revision);
            put_u64(buf, *offset);
        }
    }

    pub fn decode(buf: &mut &[u8]) -> Result<PageRef> {
        let key = binary::take_u64(buf)?;
        let hash_len = binary::take_u8(buf)? as usize;
        let hash = binary::take_slice(buf, hash_len)?.to_vec();
        let mut fragments = vec![];
        for _ in 0..binary::take_u16(buf)? {
            let revision = binary::take_u32(buf)?;
            let offset = binary::take_u64(buf)?;
            fragments.push((revision, offset));
        }
        Ok(PageRef {
            key,
            hash,
            log_key: None,
            fragments,
        })
    }
}

#[cfg(test)]
#[path = "reference_test.rs"]
mod reference_test;
