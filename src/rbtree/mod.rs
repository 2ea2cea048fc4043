//! Module `rbtree` implement the red-black tree backend for secondary
//! indexes.
//!
//! Key nodes and their [NodeReferences](crate::index::NodeReferences)
//! value nodes are records inside the index subtree of the page tree;
//! the value node of a key node lives at `node_key + 1`. Writers keep
//! the standard red-black invariants through recolor and rotations,
//! readers walk the tree with a search mode and iterate in key order.

use std::sync::Arc;

use crate::{
    cache::{IndexNodeCache, IndexNodeKey},
    index::IndexRecord,
    page::{IndexType, Record},
    tree::{PageReadTrx, PageWriteTrx},
    Result,
};

pub mod node;
pub mod reader;
pub mod writer;

pub use node::{Atomic, CasKey, IndexKey, QNm, RbNode, RbValue};
pub use reader::SearchMode;

/// Record access shared by read and write transactions; writers see
/// their own uncommitted records through the redo log.
pub trait IndexStore {
    fn get_index_record(&mut self, index_type: IndexType, key: i64)
        -> Result<Option<IndexRecord>>;
}

impl IndexStore for PageReadTrx {
    fn get_index_record(
        &mut self,
        index_type: IndexType,
        key: i64,
    ) -> Result<Option<IndexRecord>> {
        match self.get_record(index_type, key)? {
            Some(Record::Index(record)) => Ok(Some(record)),
            Some(_) => err_at!(Corrupt, msg: "non-index record {}", key),
            None => Ok(None),
        }
    }
}

impl IndexStore for PageWriteTrx {
    fn get_index_record(
        &mut self,
        index_type: IndexType,
        key: i64,
    ) -> Result<Option<IndexRecord>> {
        match self.get_record(index_type, key)? {
            Some(Record::Index(record)) => Ok(Some(record)),
            Some(_) => err_at!(Corrupt, msg: "non-index record {}", key),
            None => Ok(None),
        }
    }
}

/// Read-side store layering the resource-level node cache over a read
/// transaction. Committed index nodes are immutable, so entries keyed
/// by `(kind, number, revision, node_key)` never invalidate.
pub struct CachedIndexStore<'a> {
    trx: &'a mut PageReadTrx,
    cache: Arc<IndexNodeCache<IndexRecord>>,
    index_kind: u8,
    index_number: u16,
}

impl<'a> CachedIndexStore<'a> {
    pub fn new(
        trx: &'a mut PageReadTrx,
        cache: Arc<IndexNodeCache<IndexRecord>>,
        index_kind: u8,
        index_number: u16,
    ) -> CachedIndexStore<'a> {
        CachedIndexStore {
            trx,
            cache,
            index_kind,
            index_number,
        }
    }
}

impl<'a> IndexStore for CachedIndexStore<'a> {
    fn get_index_record(
        &mut self,
        index_type: IndexType,
        key: i64,
    ) -> Result<Option<IndexRecord>> {
        let cache_key = IndexNodeKey {
            index_kind: self.index_kind,
            index_number: self.index_number,
            revision: self.trx.revision(),
            node_key: key,
        };
        if let Some(record) = self.cache.get(&cache_key) {
            return Ok(Some((*record).clone()));
        }
        match self.trx.get_index_record(index_type, key)? {
            Some(record) => {
                self.cache.put(cache_key, Arc::new(record.clone()));
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}
