//! Module `resource` implement the session facade over one resource.
//!
//! A resource owns one storage backend, one page cache, one epoch
//! tracker, one write gate and one revision index. Read cursors pin a
//! revision; the single write cursor builds the next one.

use cbordata::Cborize;
use log::info;
use parking_lot::RwLock;

use std::{ffi, sync::Arc, time};

use crate::{
    cache::{IndexNodeCache, PageCache},
    config::ResourceConfig,
    diff::{self, DiffTuple},
    epoch::{EpochTracker, WriteGate},
    index::{
        self,
        pathsummary::PathSummaryReader,
        IndexDef, IndexFilter, IndexKind, NodeReferences,
    },
    io::{Pipeline, Storage},
    page::{IndexRootMeta, RevisionRootPage, UberPage},
    rbtree::{node::IndexKey, CachedIndexStore},
    revindex::{RevisionFileData, RevisionIndex},
    tree::{NodeReadTrx, NodeWriteTrx, PageReadTrx, PageWriteTrx, RevisionInfo},
    Result,
};

const STATS_VER: u32 = 0x00010001;

/// Statistics for one resource: durable facts from the head revision
/// plus session-lifetime write and cache counters.
#[derive(Clone, Default, Debug, Cborize)]
pub struct Stats {
    pub name: String,
    /// Number of committed revisions.
    pub revisions: u64,
    /// Size of the data file in bytes.
    pub data_bytes: u64,
    /// Highest node key allocated in the main subtree.
    pub max_node_key: i64,
    /// Registered secondary indexes.
    pub n_indexes: u64,
    /// Timestamp of the latest commit, ms from UNIX epoch.
    pub last_commit_ms: u64,
    /// Pages appended by this session's commits.
    pub n_pages_written: u64,
    /// Bytes appended by this session's commits, padding included.
    pub n_bytes_written: u64,
    /// Page cache hits since the resource was opened.
    pub n_cache_hits: u64,
    /// Page cache misses since the resource was opened.
    pub n_cache_misses: u64,
}

impl Stats {
    const ID: u32 = STATS_VER;
}

/// Session over one resource; cheap to share behind `Arc` if needed.
pub struct ResourceSession {
    dir: ffi::OsString,
    name: String,
    config: ResourceConfig,
    storage: Storage,
    cache: Arc<PageCache>,
    index_cache: Arc<IndexNodeCache<index::IndexRecord>>,
    epoch: Arc<EpochTracker>,
    gate: Arc<WriteGate>,
    revindex: Arc<RwLock<RevisionIndex>>,
}

impl ResourceSession {
    /// Create the resource under `dir` and commit revision 0, holding
    /// nothing but the document root.
    pub fn create(dir: &ffi::OsStr, name: &str, config: ResourceConfig) -> Result<Self> {
        config.validate()?;
        let pipeline = Pipeline::new(config.pipeline.clone(), config.cipher_key)?;
        let storage = Storage::open(dir, name, config.storage_backend, pipeline, true)?;
        config.save(dir, name)?;

        let session = ResourceSession {
            dir: dir.to_os_string(),
            name: name.to_string(),
            config,
            storage,
            cache: PageCache::new(0),
            index_cache: IndexNodeCache::new(1),
            epoch: EpochTracker::new(0),
            gate: Arc::new(WriteGate::default()),
            revindex: Arc::new(RwLock::new(RevisionIndex::new())),
        };
        let session = session.rebuild_shared_state()?;

        // bootstrap revision 0.
        let mut wtx = session.begin_node_write_trx()?;
        wtx.commit()?;

        info!(target: "arbor", "created resource {:?}/{}", session.dir, session.name);
        Ok(session)
    }

    /// Open an existing resource with its persisted configuration.
    pub fn open(dir: &ffi::OsStr, name: &str) -> Result<Self> {
        let config = ResourceConfig::load(dir, name)?;
        config.validate()?;
        let pipeline = Pipeline::new(config.pipeline.clone(), config.cipher_key)?;
        let storage = Storage::open(dir, name, config.storage_backend, pipeline, false)?;

        let session = ResourceSession {
            dir: dir.to_os_string(),
            name: name.to_string(),
            config,
            storage,
            cache: PageCache::new(0),
            index_cache: IndexNodeCache::new(1),
            epoch: EpochTracker::new(0),
            gate: Arc::new(WriteGate::default()),
            revindex: Arc::new(RwLock::new(RevisionIndex::new())),
        };
        session.rebuild_shared_state()
    }

    fn rebuild_shared_state(mut self) -> Result<Self> {
        self.cache = PageCache::new(self.config.page_cache_size);
        self.index_cache = IndexNodeCache::new(self.config.index_cache_size);
        self.epoch = EpochTracker::new(self.config.max_concurrent_readers);
        let entries = self.storage.load_revision_entries()?;
        let revindex = RevisionIndex::from_entries(entries)?;
        if !revindex.is_empty() {
            self.epoch
                .set_last_committed((revindex.len() - 1) as u32);
        }
        self.revindex = Arc::new(RwLock::new(revindex));
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn epoch(&self) -> &Arc<EpochTracker> {
        &self.epoch
    }

    /// Number of committed revisions.
    pub fn revision_count(&self) -> usize {
        self.revindex.read().len()
    }

    /// Latest committed revision.
    pub fn latest_revision(&self) -> Result<u32> {
        match self.revision_count() {
            0 => err_at!(InvalidState, msg: "resource holds no revision"),
            n => Ok((n - 1) as u32),
        }
    }

    /// Greatest revision committed at or before `timestamp_ms`, -1 if
    /// none.
    pub fn find_revision(&self, timestamp_ms: u64) -> i64 {
        self.revindex.read().find_revision(timestamp_ms)
    }

    pub fn revision_file_data(&self, revision: u32) -> Result<RevisionFileData> {
        self.revindex.read().get(revision)
    }

    fn resolve_revision(&self, revision: Option<u32>) -> Result<u32> {
        let latest = self.latest_revision()?;
        match revision {
            None => Ok(latest),
            Some(revision) if revision <= latest => Ok(revision),
            Some(revision) => {
                err_at!(OutOfRange, msg: "revision {} latest {}", revision, latest)
            }
        }
    }

    fn page_read_trx(&self, revision: u32) -> Result<PageReadTrx> {
        let ticket = self.epoch.register(revision)?;
        let mut reader = self.storage.create_reader()?;
        let root = reader.read_revision_root(revision)?;
        PageReadTrx::new(
            root,
            reader,
            Arc::clone(&self.cache),
            self.config.cap_exponent(),
            ticket,
        )
    }

    /// Begin a read-only cursor pinned to `revision` (default latest).
    pub fn begin_node_read_only_trx(&self, revision: Option<u32>) -> Result<NodeReadTrx> {
        let revision = self.resolve_revision(revision)?;
        NodeReadTrx::new(self.page_read_trx(revision)?)
    }

    /// Begin the write cursor; blocks up to the configured timeout for
    /// the single write permit.
    pub fn begin_node_write_trx(&self) -> Result<NodeWriteTrx> {
        let timeout = time::Duration::from_millis(self.config.write_permit_timeout_ms);
        let permit = self.gate.acquire(timeout)?;

        let (base_root, uber, new_revision) = match self.revision_count() {
            0 => (RevisionRootPage::bootstrap(), UberPage::bootstrap(), 0),
            n => {
                let head = (n - 1) as u32;
                let mut reader = self.storage.create_reader()?;
                let root = reader.read_revision_root(head)?;
                let uber = reader.read_uber()?;
                (root, uber, head + 1)
            }
        };

        let base = {
            let ticket = self.epoch.register(base_root.revision)?;
            let reader = self.storage.create_reader()?;
            PageReadTrx::new(
                base_root,
                reader,
                Arc::clone(&self.cache),
                self.config.cap_exponent(),
                ticket,
            )?
        };
        let writer = self.storage.create_writer()?;
        let pages = PageWriteTrx::new(
            base,
            uber,
            new_revision,
            writer,
            Some(permit),
            Arc::clone(&self.epoch),
            Arc::clone(&self.revindex),
        );
        NodeWriteTrx::new(pages, &self.config)
    }

    /// Path summary of `revision` (default latest).
    pub fn open_path_summary(&self, revision: Option<u32>) -> Result<PathSummaryReader> {
        let revision = self.resolve_revision(revision)?;
        let mut pages = self.page_read_trx(revision)?;
        let summary = pages.load_path_summary()?;
        let names = pages.names().clone();
        Ok(PathSummaryReader::new(summary, names, revision))
    }

    fn index_meta(
        &self,
        pages: &PageReadTrx,
        kind: IndexKind,
        number: u16,
    ) -> Result<IndexRootMeta> {
        for meta in pages.root().index_roots.iter() {
            if meta.kind == kind as u8 && meta.number == number {
                return Ok(meta.clone());
            }
        }
        err_at!(KeyNotFound, msg: "no {:?} index #{}", kind, number)
    }

    /// Open a secondary index over `revision` and return its matching
    /// entries in key order.
    pub fn open_index(
        &self,
        revision: Option<u32>,
        kind: IndexKind,
        number: u16,
        filter: &IndexFilter,
    ) -> Result<Vec<(IndexKey, NodeReferences)>> {
        let revision = self.resolve_revision(revision)?;
        let mut pages = self.page_read_trx(revision)?;
        let meta = self.index_meta(&pages, kind, number)?;
        let mut store = CachedIndexStore::new(
            &mut pages,
            Arc::clone(&self.index_cache),
            meta.kind,
            meta.number,
        );
        let entries =
            index::open_index(&mut store, &meta, self.config.index_backend, filter)?;
        Ok(entries.collect())
    }

    /// Register `def` and backfill it from the latest revision; commits
    /// a new revision.
    pub fn create_index(&self, def: IndexDef) -> Result<RevisionInfo> {
        let mut wtx = self.begin_node_write_trx()?;
        index::build_index(&mut wtx, &def)?;
        wtx.commit()
    }

    /// Diff two revisions, tuples in new-revision document order.
    pub fn diff(&self, old_revision: u32, new_revision: u32) -> Result<Vec<DiffTuple>> {
        let mut old = self.begin_node_read_only_trx(Some(old_revision))?;
        let mut new = self.begin_node_read_only_trx(Some(new_revision))?;
        diff::diff_revisions(&mut old, &mut new)
    }

    /// Statistics over the head revision and this session's counters.
    pub fn to_stats(&self) -> Result<Stats> {
        let head = self.latest_revision()?;
        let mut reader = self.storage.create_reader()?;
        let root = reader.read_revision_root(head)?;
        let entry = self.revision_file_data(head)?;
        let counters = self.storage.counters();
        let (n_cache_hits, n_cache_misses, _) = self.cache.to_counts();
        Ok(Stats {
            name: self.name.clone(),
            revisions: self.revision_count() as u64,
            data_bytes: self.storage.data_len()?,
            max_node_key: root.max_node_key,
            n_indexes: root.index_roots.len() as u64,
            last_commit_ms: entry.timestamp_ms,
            n_pages_written: counters.n_pages.load(std::sync::atomic::Ordering::SeqCst),
            n_bytes_written: counters.n_bytes.load(std::sync::atomic::Ordering::SeqCst),
            n_cache_hits,
            n_cache_misses,
        })
    }

    /// Close the session; open cursors must be dropped first.
    pub fn close(self) -> Result<()> {
        info!(target: "arbor", "closed resource {:?}/{}", self.dir, self.name);
        Ok(())
    }
}

#[cfg(test)]
#[path = "resource_test.rs"]
mod resource_test;
