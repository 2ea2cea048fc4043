//! Module `cache` implement the resource level caches.
//!
//! Committed pages are immutable, so the page cache is read-through and
//! never writes back. Entries are keyed by file offset, which is unique
//! across revisions in an append-only file. Striping bounds lock
//! contention without growing state per task.

use lru::LruCache;
use parking_lot::Mutex;

use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicU64, Ordering::SeqCst},
        Arc,
    },
};

use crate::page::Page;

/// Default capacity of the resource page cache, in pages.
pub const PAGE_CACHE_SIZE: usize = 4096;
/// Default capacity of the index-node cache, in nodes.
pub const INDEX_CACHE_SIZE: usize = 4096;

const STRIPES: usize = 16;

/// Striped LRU cache over committed pages, keyed by file offset.
pub struct PageCache {
    stripes: Vec<Mutex<LruCache<u64, Arc<Page>>>>,
    n_hits: AtomicU64,
    n_misses: AtomicU64,
    n_sets: AtomicU64,
}

impl PageCache {
    pub fn new(capacity: usize) -> Arc<PageCache> {
        let per_stripe = usize::max(1, capacity / STRIPES);
        let stripes = (0..STRIPES)
            .map(|_| Mutex::new(LruCache::new(NonZeroUsize::new(per_stripe).unwrap())))
            .collect();
        Arc::new(PageCache {
            stripes,
            n_hits: AtomicU64::new(0),
            n_misses: AtomicU64::new(0),
            n_sets: AtomicU64::new(0),
        })
    }

    #[inline]
    fn stripe(&self, offset: u64) -> &Mutex<LruCache<u64, Arc<Page>>> {
        &self.stripes[(offset as usize) % STRIPES]
    }

    pub fn get(&self, offset: u64) -> Option<Arc<Page>> {
        let page = self.stripe(offset).lock().get(&offset).cloned();
        match page.is_some() {
            true => self.n_hits.fetch_add(1, SeqCst),
            false => self.n_misses.fetch_add(1, SeqCst),
        };
        page
    }

    pub fn put(&self, offset: u64, page: Arc<Page>) {
        self.n_sets.fetch_add(1, SeqCst);
        self.stripe(offset).lock().put(offset, page);
    }

    /// Drop every cached entry, used when a resource is truncated.
    pub fn clear(&self) {
        for stripe in self.stripes.iter() {
            stripe.lock().clear();
        }
    }

    /// `(hits, misses, sets)` since this cache was created.
    pub fn to_counts(&self) -> (u64, u64, u64) {
        (
            self.n_hits.load(SeqCst),
            self.n_misses.load(SeqCst),
            self.n_sets.load(SeqCst),
        )
    }
}

/// Cache key for red-black index nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexNodeKey {
    pub index_kind: u8,
    pub index_number: u16,
    pub revision: u32,
    pub node_key: i64,
}

/// LRU cache over decoded index-tree nodes, avoids re-walking record
/// pages for hot index lookups.
pub struct IndexNodeCache<T> {
    inner: Mutex<LruCache<IndexNodeKey, Arc<T>>>,
}

impl<T> IndexNodeCache<T> {
    pub fn new(capacity: usize) -> Arc<IndexNodeCache<T>> {
        let cap = NonZeroUsize::new(usize::max(1, capacity)).unwrap();
        Arc::new(IndexNodeCache {
            inner: Mutex::new(LruCache::new(cap)),
        })
    }

    pub fn get(&self, key: &IndexNodeKey) -> Option<Arc<T>> {
        self.inner.lock().get(key).cloned()
    }

    pub fn put(&self, key: IndexNodeKey, val: Arc<T>) {
        self.inner.lock().put(key, val);
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;
