//! Module `wtx` implement the write transaction.
//!
//! A [PageWriteTrx] overlays a redo log of copy-on-write record pages
//! on top of the head revision. Nothing touches the data file until
//! commit, which appends record pages, rebuilds the dirty indirect
//! chains bottom up, writes a fresh revision root page and finally
//! publishes the revision through the uber page and the sidecar.
//! [NodeWriteTrx] is the mutating cursor on top, maintaining structure
//! links, counts, rolling hashes, dewey-ids, the path summary and the
//! secondary-index listeners.

use log::{info, warn};
use parking_lot::RwLock;

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    mem,
    sync::Arc,
    time,
};

use crate::{
    arena::Arena,
    config::{IndexBackend, ResourceConfig, TreeKind},
    epoch::{EpochTracker, WritePermit},
    index::{self, pathsummary::{PathStep, PathSummary, PATH_ROOT}, ChangeType, IndexDef},
    io::StorageWriter,
    names::NameSpace,
    node::{
        DeweyId, NameDelegate, Node, NodeHeader, NodeKind, Number, Payload, StructDelegate,
        ValueDelegate, DOCUMENT_ROOT, NULL_NODE_KEY,
    },
    page::{
        IndexRootMeta, IndexType, IndirectPage, NamePage, OverflowPage, Page, PageRef, Record,
        RecordPage, Slot, UberPage, INP_LEVELS, OVERFLOW_THRESHOLD, SUBTREES,
    },
    revindex::RevisionIndex,
    tree::{pagetree, NodeCursor, PageReadTrx},
    Result,
};

/// Outcome of a successful commit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevisionInfo {
    pub revision: u32,
    pub timestamp_ms: u64,
}

/// Redo-log entry: the committed incarnation and the working copy.
pub struct PageContainer {
    /// Page as read from the base revision, `None` for fresh pages.
    pub current: Option<RecordPage>,
    /// Working copy all reads and writes inside the transaction see.
    pub modified: RecordPage,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum TrxState {
    Open,
    Committed,
    Aborted,
}

/// Page level write transaction.
pub struct PageWriteTrx {
    base: PageReadTrx,
    uber: UberPage,
    revision: u32,
    redo: HashMap<(IndexType, u64), PageContainer>,
    overflow_log: HashMap<(IndexType, i64), Vec<u8>>,
    max_node_key: i64,
    index_roots: Vec<IndexRootMeta>,
    index_rebuild: Vec<bool>,
    writer: StorageWriter,
    arena: Arena,
    permit: Option<WritePermit>,
    base_data_len: u64,
    epoch: Arc<EpochTracker>,
    revindex: Arc<RwLock<RevisionIndex>>,
    state: TrxState,
}

impl PageWriteTrx {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        base: PageReadTrx,
        uber: UberPage,
        revision: u32,
        writer: StorageWriter,
        permit: Option<WritePermit>,
        epoch: Arc<EpochTracker>,
        revindex: Arc<RwLock<RevisionIndex>>,
    ) -> PageWriteTrx {
        let max_node_key = base.root().max_node_key;
        let index_roots = base.root().index_roots.clone();
        let n_indexes = index_roots.len();
        let base_data_len = writer.data_len();
        PageWriteTrx {
            base,
            uber,
            revision,
            redo: HashMap::new(),
            overflow_log: HashMap::new(),
            max_node_key,
            index_roots,
            index_rebuild: vec![false; n_indexes],
            writer,
            arena: Arena::default(),
            permit,
            base_data_len,
            epoch,
            revindex,
            state: TrxState::Open,
        }
    }

    /// Revision this transaction will commit as.
    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn base(&mut self) -> &mut PageReadTrx {
        &mut self.base
    }

    pub fn names(&self) -> &crate::names::NameDictionary {
        self.base.names()
    }

    pub fn names_mut(&mut self) -> &mut crate::names::NameDictionary {
        self.base.names_mut()
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            TrxState::Open => Ok(()),
            state => err_at!(InvalidState, msg: "transaction is {:?}", state),
        }
    }

    /// Allocate the next node key of the main subtree.
    pub fn alloc_node_key(&mut self) -> i64 {
        self.max_node_key += 1;
        self.max_node_key
    }

    pub fn max_node_key(&self) -> i64 {
        self.max_node_key
    }

    pub fn index_roots(&self) -> &[IndexRootMeta] {
        &self.index_roots
    }

    pub fn index_meta(&self, slot: usize) -> &IndexRootMeta {
        &self.index_roots[slot]
    }

    pub fn index_meta_mut(&mut self, slot: usize) -> &mut IndexRootMeta {
        &mut self.index_roots[slot]
    }

    /// Mark an index dirty after a listener failure; commit records it
    /// in the revision root page.
    pub fn mark_index_rebuild(&mut self, slot: usize) {
        self.index_rebuild[slot] = true;
    }

    pub fn register_index(&mut self, meta: IndexRootMeta) -> Result<usize> {
        for existing in self.index_roots.iter() {
            if existing.kind == meta.kind && existing.number == meta.number {
                return err_at!(
                    InvalidState, msg: "index {}/{} exists", meta.kind, meta.number
                );
            }
        }
        self.index_roots.push(meta);
        self.index_rebuild.push(false);
        Ok(self.index_roots.len() - 1)
    }

    /// Allocate `n` record keys in the index subtree of `slot`,
    /// returning the first.
    pub fn alloc_index_keys(&mut self, slot: usize, n: i64) -> Result<i64> {
        let meta = &mut self.index_roots[slot];
        let base = index::key_base(meta.number);
        if meta.max_node_key < base {
            meta.max_node_key = base - 1;
        }
        let first = meta.max_node_key + 1;
        meta.max_node_key += n;
        Ok(first)
    }

    fn page_key_of(&self, record_key: i64) -> u64 {
        self.base.page_key_of(record_key)
    }

    fn slot_of(&self, record_key: i64) -> usize {
        self.base.slot_of(record_key)
    }

    /// Working copy of the record page holding `page_key`, faulted in
    /// copy-on-write from the base revision.
    fn prepare_page(&mut self, it: IndexType, page_key: u64) -> Result<&mut RecordPage> {
        if !self.redo.contains_key(&(it, page_key)) {
            let capacity = 1 << self.base.cap_exp();
            let container = match self.base.get_record_page(it, page_key)? {
                Some(page) => {
                    let current = page.as_record()?.clone();
                    let modified = current.clone();
                    PageContainer {
                        current: Some(current),
                        modified,
                    }
                }
                None => PageContainer {
                    current: None,
                    modified: RecordPage::new(page_key, it, self.revision, capacity),
                },
            };
            self.redo.insert((it, page_key), container);
        }
        Ok(&mut self.redo.get_mut(&(it, page_key)).unwrap().modified)
    }

    /// Redo-aware record read.
    pub fn get_record(&mut self, it: IndexType, key: i64) -> Result<Option<Record>> {
        if key < 0 {
            return Ok(None);
        }
        if let Some(bytes) = self.overflow_log.get(&(it, key)) {
            return Ok(Some(Record::decode(it, &mut bytes.as_slice())?));
        }
        let page_key = self.page_key_of(key);
        if let Some(container) = self.redo.get(&(it, page_key)) {
            let slot = self.base.slot_of(key);
            return match container.modified.get_slot(slot)? {
                None => Ok(None),
                Some(Slot::Overflow) => {
                    // overflow bytes created in an earlier transaction.
                    self.base.get_record(it, key)
                }
                Some(Slot::Bytes(_)) => container.modified.get_record(slot),
            };
        }
        self.base.get_record(it, key)
    }

    /// Redo-aware dewey-id read.
    pub fn get_dewey_id(&mut self, it: IndexType, key: i64) -> Result<Option<Vec<u8>>> {
        if key < 0 {
            return Ok(None);
        }
        let page_key = self.page_key_of(key);
        if let Some(container) = self.redo.get(&(it, page_key)) {
            let slot = self.base.slot_of(key);
            return Ok(container.modified.get_dewey_id(slot)?.map(|id| id.to_vec()));
        }
        self.base.get_dewey_id(it, key)
    }

    /// Store `record`, spilling oversized ones into the overflow log.
    pub fn put_record(
        &mut self,
        it: IndexType,
        record: Record,
        dewey: Option<Vec<u8>>,
    ) -> Result<()> {
        self.check_open()?;
        let key = record.key();
        let slot = self.slot_of(key);
        let page_key = self.page_key_of(key);

        let mut bytes = vec![];
        record.encode(&mut bytes);
        if bytes.len() > OVERFLOW_THRESHOLD {
            // the record page keeps only a marker plus the reference,
            // filled in when the overflow page is flushed.
            let aref = self.arena.copy_in(&bytes);
            let staged = self.arena.get(aref).to_vec();
            self.overflow_log.insert((it, key), staged);
            let page = self.prepare_page(it, page_key)?;
            page.set_slot(slot, Slot::Overflow)?;
            if let Some(id) = dewey {
                page.set_dewey_id(slot, id)?;
            }
            return Ok(());
        }

        self.overflow_log.remove(&(it, key));
        let page = self.prepare_page(it, page_key)?;
        page.set_record(slot, record)?;
        if let Some(id) = dewey {
            page.set_dewey_id(slot, id)?;
        }
        Ok(())
    }

    /// Drop the record under `key`.
    pub fn remove_record(&mut self, it: IndexType, key: i64) -> Result<()> {
        self.check_open()?;
        self.overflow_log.remove(&(it, key));
        let slot = self.slot_of(key);
        let page_key = self.page_key_of(key);
        let page = self.prepare_page(it, page_key)?;
        page.clear_slot(slot)
    }

    /// Scratch arena scoped to this transaction.
    pub fn arena(&mut self) -> &mut Arena {
        &mut self.arena
    }

    // committed leaf reference for a record page, so fragments carry
    // over into the new incarnation.
    fn base_leaf_ref(&mut self, it: IndexType, page_key: u64) -> Result<Option<PageRef>> {
        let mut reference = self.base.root().subtree_ref(it).clone();
        if !reference.is_resolved() {
            return Ok(None);
        }
        for level in 0..INP_LEVELS {
            let page = self.base.read_page(&reference)?;
            let indirect = page.as_indirect()?;
            match indirect.get_reference(pagetree::level_offset(page_key, level)) {
                Some(child) if child.is_resolved() => reference = child.clone(),
                _ => return Ok(None),
            }
        }
        Ok(Some(reference))
    }

    fn update_level(
        &mut self,
        old_ref: PageRef,
        level: usize,
        entries: Vec<(u64, PageRef)>,
        min_active: u32,
        scratch: &mut Vec<u8>,
    ) -> Result<PageRef> {
        let mut page = if old_ref.is_resolved() {
            self.base.read_page(&old_ref)?.as_indirect()?.clone()
        } else {
            IndirectPage::new()
        };

        if level == INP_LEVELS - 1 {
            for (page_key, reference) in entries.into_iter() {
                page.set_reference(pagetree::level_offset(page_key, level), reference);
            }
        } else {
            let mut groups: BTreeMap<usize, Vec<(u64, PageRef)>> = BTreeMap::new();
            for entry in entries.into_iter() {
                let offset = pagetree::level_offset(entry.0, level);
                groups.entry(offset).or_insert_with(Vec::new).push(entry);
            }
            for (offset, group) in groups.into_iter() {
                let child_old = page.get_reference(offset).cloned().unwrap_or_default();
                let child_new =
                    self.update_level(child_old, level + 1, group, min_active, scratch)?;
                page.set_reference(offset, child_new);
            }
        }

        let mut new_ref = old_ref;
        let revision = self.revision;
        self.writer
            .write(&mut new_ref, &Page::Indirect(page), revision, scratch)?;
        new_ref.prune_fragments(min_active);
        Ok(new_ref)
    }

    /// Commit protocol, see the module documentation for the order.
    pub fn commit(&mut self, path_summary_max: i64) -> Result<RevisionInfo> {
        self.check_open()?;
        let revision = self.revision;
        let min_active = self.epoch.min_active_revision();
        let mut scratch = vec![];

        // overflow pages first; their references land in record pages.
        let overflow = {
            let mut overflow: Vec<((IndexType, i64), Vec<u8>)> =
                self.overflow_log.drain().collect();
            overflow.sort_by_key(|((it, key), _)| (*it as u8, *key));
            overflow
        };
        for ((it, key), bytes) in overflow.into_iter() {
            let page = OverflowPage {
                record_key: key,
                data: bytes,
            };
            let mut reference = PageRef::new();
            self.writer
                .write(&mut reference, &Page::Overflow(page), revision, &mut scratch)?;
            let page_key = self.page_key_of(key);
            match self.redo.get_mut(&(it, page_key)) {
                Some(container) => container.modified.set_page_reference(key, reference),
                None => return err_at!(Fatal, msg: "overflow {} without record page", key),
            }
        }

        // record pages in (index_type, page_key) order.
        let mut dirty: Vec<(IndexType, u64)> = self.redo.keys().cloned().collect();
        dirty.sort_by_key(|(it, page_key)| (*it as u8, *page_key));

        let mut updates: HashMap<IndexType, Vec<(u64, PageRef)>> = HashMap::new();
        let containers = mem::take(&mut self.redo);
        for (it, page_key) in dirty.into_iter() {
            let mut page = containers.get(&(it, page_key)).unwrap().modified.clone();
            page.set_revision(revision);
            let mut reference = self
                .base_leaf_ref(it, page_key)?
                .unwrap_or_else(PageRef::new);
            self.writer
                .write(&mut reference, &Page::Record(page), revision, &mut scratch)?;
            reference.prune_fragments(min_active);
            updates
                .entry(it)
                .or_insert_with(Vec::new)
                .push((page_key, reference));
        }

        // subtree indirect chains, then the revision root.
        let mut new_root = self.base.root().clone();
        for it in SUBTREES.iter() {
            if let Some(entries) = updates.remove(it) {
                let old_ref = new_root.subtree_ref(*it).clone();
                let new_ref = self.update_level(old_ref, 0, entries, min_active, &mut scratch)?;
                *new_root.subtree_ref_mut(*it) = new_ref;
            }
        }

        let mut names_ref = PageRef::new();
        let names_page = NamePage {
            dict: self.base.names().clone(),
        };
        self.writer
            .write(&mut names_ref, &Page::Names(names_page), revision, &mut scratch)?;

        let timestamp_ms = self.next_timestamp();
        new_root.revision = revision;
        new_root.timestamp_ms = timestamp_ms;
        new_root.max_node_key = self.max_node_key;
        new_root.max_path_node_key = path_summary_max;
        new_root.index_roots = self.index_roots.clone();
        for (slot, rebuild) in self.index_rebuild.iter().enumerate() {
            if *rebuild {
                new_root.index_roots[slot].rebuild_needed = true;
            }
        }

        let mut root_ref = PageRef::new();
        self.writer.write(
            &mut root_ref,
            &Page::RevisionRoot(new_root.clone()),
            revision,
            &mut scratch,
        )?;
        let root_offset = root_ref.key;

        // publish: uber tree, both uber copies, then the sidecar entry.
        let old_roots_ref = self.uber.revision_roots.clone();
        let mut roots_ref = self.update_level(
            old_roots_ref,
            0,
            vec![(u64::from(revision), root_ref)],
            min_active,
            &mut scratch,
        )?;
        if roots_ref.fragments.len() > 8 {
            let at = roots_ref.fragments.len() - 8;
            roots_ref.fragments.drain(..at);
        }
        self.uber.revision_roots = roots_ref;
        self.uber.revision_count = revision + 1;

        self.writer.force_all()?;
        let uber = self.uber.clone();
        self.writer.write_uber_page(&uber)?;
        self.writer.append_revision_entry(revision, root_offset, timestamp_ms)?;

        self.revindex.write().append(timestamp_ms, root_offset)?;
        self.epoch.set_last_committed(revision);

        info!(
            target: "arbor",
            "committed revision {} at offset {} ({} bytes)",
            revision, root_offset, self.writer.data_len() - self.base_data_len
        );

        self.arena.reset();
        self.state = TrxState::Committed;
        self.permit.take();

        Ok(RevisionInfo {
            revision,
            timestamp_ms,
        })
    }

    /// Discard the redo log and truncate the data file back to where
    /// the transaction began.
    pub fn abort(&mut self) -> Result<()> {
        self.check_open()?;
        self.redo.clear();
        self.overflow_log.clear();
        self.arena.reset();
        self.writer.truncate_data(self.base_data_len)?;
        self.state = TrxState::Aborted;
        self.permit.take();
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state == TrxState::Open
    }

    // monotonically non-decreasing commit timestamps.
    fn next_timestamp(&self) -> u64 {
        let now = time::SystemTime::now()
            .duration_since(time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let revindex = self.revindex.read();
        match revindex.len() {
            0 => now,
            n => {
                let last = revindex.get((n - 1) as u32).map(|e| e.timestamp_ms).unwrap_or(0);
                u64::max(now, last)
            }
        }
    }
}

impl Drop for PageWriteTrx {
    fn drop(&mut self) {
        if self.state == TrxState::Open {
            self.abort().ok();
        }
    }
}

/// Write cursor over the node tree.
pub struct NodeWriteTrx {
    pages: PageWriteTrx,
    cur: Node,
    tree_kind: TreeKind,
    use_dewey: bool,
    with_path_summary: bool,
    index_backend: IndexBackend,
    index_defs: Vec<IndexDef>,
    pcr_filters: Vec<Option<HashSet<i64>>>,
    summary: PathSummary,
    summary_dirty: bool,
}

// where a new node lands relative to the cursor.
#[derive(Clone, Copy, PartialEq)]
enum InsertPos {
    FirstChild,
    RightSibling,
}

impl NodeWriteTrx {
    pub(crate) fn new(mut pages: PageWriteTrx, config: &ResourceConfig) -> Result<NodeWriteTrx> {
        let summary = if config.with_path_summary {
            pages.base().load_path_summary()?
        } else {
            PathSummary::new()
        };

        let mut index_defs = vec![];
        for meta in pages.index_roots().iter() {
            index_defs.push(IndexDef::from_meta(meta)?);
        }
        let pcr_filters = vec![None; index_defs.len()];

        let cur = match pages.get_record(IndexType::Document, DOCUMENT_ROOT)? {
            Some(record) => record.as_node()?.clone(),
            None => {
                // bootstrap: materialize the document root.
                let root = document_root(config.tree_kind, pages.revision());
                pages.put_record(IndexType::Document, Record::Node(root.clone()), None)?;
                root
            }
        };

        let mut wtx = NodeWriteTrx {
            pages,
            cur,
            tree_kind: config.tree_kind,
            use_dewey: config.use_dewey_ids,
            with_path_summary: config.with_path_summary,
            index_backend: config.index_backend,
            index_defs,
            pcr_filters,
            summary,
            summary_dirty: false,
        };
        wtx.refresh_pcr_filters()?;
        Ok(wtx)
    }

    /// Revision this transaction will commit as.
    pub fn revision(&self) -> u32 {
        self.pages.revision()
    }

    pub fn pages(&mut self) -> &mut PageWriteTrx {
        &mut self.pages
    }

    pub fn path_summary(&self) -> &PathSummary {
        &self.summary
    }

    pub fn name(&self) -> Option<String> {
        let key = self.cur.local_name_key();
        self.pages
            .names()
            .resolve(NameSpace::LocalName, key)
            .map(|name| name.to_string())
    }

    pub fn commit(&mut self) -> Result<RevisionInfo> {
        if self.with_path_summary && self.summary_dirty {
            let nodes: Vec<_> = self.summary.nodes().cloned().collect();
            for node in nodes.into_iter() {
                self.pages
                    .put_record(IndexType::PathSummary, Record::Path(node), None)?;
            }
            self.summary_dirty = false;
        }
        let info = self.pages.commit(self.summary.max_key())?;
        // keep the cursor coherent for follow-up reads.
        Ok(info)
    }

    pub fn abort(&mut self) -> Result<()> {
        self.pages.abort()
    }

    /// Register a new secondary index; use
    /// [build_index](crate::index::build_index) to backfill it.
    pub fn register_index(&mut self, def: IndexDef) -> Result<usize> {
        let mut meta = def.to_meta();
        meta.max_node_key = index::key_base(def.number) - 1;
        let slot = self.pages.register_index(meta)?;
        self.index_defs.push(def);
        self.pcr_filters.push(None);
        self.refresh_pcr_filters()?;
        Ok(slot)
    }

    fn refresh_pcr_filters(&mut self) -> Result<()> {
        for (slot, def) in self.index_defs.iter().enumerate() {
            self.pcr_filters[slot] = if def.paths.is_empty() {
                None
            } else {
                let mut pcrs = HashSet::new();
                for expr in def.paths.iter() {
                    for pcr in self.summary.resolve_expr(expr, self.pages.base.names())? {
                        pcrs.insert(pcr);
                    }
                }
                Some(pcrs)
            };
        }
        Ok(())
    }

    fn fetch_node(&mut self, key: i64) -> Result<Node> {
        match self.pages.get_record(IndexType::Document, key)? {
            Some(Record::Node(node)) => Ok(node),
            Some(_) => err_at!(Corrupt, msg: "non-node record {}", key),
            None => err_at!(KeyNotFound, msg: "node {}", key),
        }
    }

    fn store_node(&mut self, node: &Node) -> Result<()> {
        self.pages
            .put_record(IndexType::Document, Record::Node(node.clone()), None)
    }

    fn store_node_with_dewey(&mut self, node: &Node, dewey: Option<&DeweyId>) -> Result<()> {
        self.pages.put_record(
            IndexType::Document,
            Record::Node(node.clone()),
            dewey.map(|id| id.to_bytes()),
        )
    }

    fn stamp(&self, node: &mut Node) {
        node.header.previous_revision = node.header.last_modified_revision;
        node.header.last_modified_revision = self.pages.revision();
    }

    // propagate a subtree-hash delta from `parent` to the root; each
    // level scales the delta by the rolling-hash multiplier.
    fn adjust_ancestors(
        &mut self,
        parent: i64,
        desc_delta: i64,
        mut hash_delta: u64,
    ) -> Result<()> {
        let mut cur = parent;
        while cur != NULL_NODE_KEY {
            let mut node = self.fetch_node(cur)?;
            if let Some(st) = node.as_struct_mut() {
                st.descendant_count = (st.descendant_count as i64 + desc_delta) as u64;
            }
            hash_delta = hash_delta.wrapping_mul(31);
            node.header.hash = node.header.hash.wrapping_add(hash_delta);
            self.stamp(&mut node);
            let next = node.parent_key();
            self.store_node(&node)?;
            cur = next;
        }
        Ok(())
    }

    /// Path class of the node at `key`, materializing array steps on
    /// demand.
    fn node_pcr(&mut self, key: i64) -> Result<i64> {
        if key == NULL_NODE_KEY || !self.with_path_summary {
            return Ok(PATH_ROOT);
        }
        let node = self.fetch_node(key)?;
        match node.kind() {
            NodeKind::JsonDocument | NodeKind::XmlDocument => Ok(PATH_ROOT),
            NodeKind::ObjectKey | NodeKind::Element => Ok(node.path_node_key()),
            NodeKind::Array => {
                let parent_pcr = self.node_pcr(node.parent_key())?;
                let (pcr, created) = self.summary.get_or_create(parent_pcr, PathStep::Array);
                if created {
                    self.summary_dirty = true;
                    self.refresh_pcr_filters()?;
                }
                Ok(pcr)
            }
            _ => self.node_pcr(node.parent_key()),
        }
    }

    fn get_or_create_path(&mut self, parent_pcr: i64, step: PathStep) -> Result<i64> {
        let (pcr, created) = self.summary.get_or_create(parent_pcr, step);
        self.summary.incr_ref(pcr);
        self.summary_dirty = true;
        if created {
            self.refresh_pcr_filters()?;
        }
        Ok(pcr)
    }

    fn notify(
        &mut self,
        change: ChangeType,
        node: &Node,
        name: Option<&str>,
        pcr: i64,
    ) -> Result<()> {
        if self.index_defs.is_empty() {
            return Ok(());
        }
        let defs = mem::take(&mut self.index_defs);
        let filters = mem::take(&mut self.pcr_filters);
        let res = index::on_change(
            &mut self.pages,
            &defs,
            &filters,
            self.index_backend,
            change,
            node,
            name,
            pcr,
        );
        self.index_defs = defs;
        self.pcr_filters = filters;
        if let Err(err) = res {
            // index errors never roll back the data commit; the index
            // is marked rebuildable instead.
            warn!(target: "arbor", "index listener failed: {}", err);
            for slot in 0..self.index_defs.len() {
                self.pages.mark_index_rebuild(slot);
            }
        }
        Ok(())
    }

    /// Re-run the insert listener of `def` for the current node, used
    /// by the one-shot index builder.
    pub fn reindex_current(&mut self, def: &IndexDef) -> Result<()> {
        let node = self.cur.clone();
        let name = self.name();
        let pcr = self.node_pcr(node.node_key())?;
        let slot = match self
            .index_defs
            .iter()
            .position(|d| d.kind == def.kind && d.number == def.number)
        {
            Some(slot) => slot,
            None => return err_at!(InvalidState, msg: "index not registered"),
        };
        let filter = self.pcr_filters[slot].clone();
        if !index::accepts(&self.index_defs[slot], filter.as_ref(), name.as_deref(), pcr) {
            return Ok(());
        }
        let key = match index::key_for(def.kind, &node, name.as_deref(), pcr) {
            Some(key) => key,
            None => return Ok(()),
        };
        match self.index_backend {
            IndexBackend::RBTree => {
                crate::rbtree::writer::index_insert(&mut self.pages, slot, key, node.node_key())?;
            }
            IndexBackend::Trie => {
                crate::index::trie::insert(&mut self.pages, slot, key, node.node_key())?;
            }
        }
        Ok(())
    }

    fn dewey_for(
        &mut self,
        parent: i64,
        left: i64,
        right: i64,
    ) -> Result<Option<DeweyId>> {
        if !self.use_dewey {
            return Ok(None);
        }
        let fetch = |wtx: &mut Self, key: i64| -> Result<Option<DeweyId>> {
            match key {
                NULL_NODE_KEY => Ok(None),
                key => match wtx.pages.get_dewey_id(IndexType::Document, key)? {
                    Some(bytes) => Ok(Some(DeweyId::from_bytes(&bytes)?)),
                    None => Ok(None),
                },
            }
        };
        let parent_id = match fetch(self, parent)? {
            Some(id) => id,
            None => DeweyId::root(),
        };
        let left_id = fetch(self, left)?;
        let right_id = fetch(self, right)?;
        Ok(Some(DeweyId::between(
            &parent_id,
            left_id.as_ref(),
            right_id.as_ref(),
        )?))
    }

    // the shared insert machinery: link surgery, counts, hashes,
    // dewey-ids. `build` receives the fresh header and returns the
    // payload.
    fn insert_structural<F>(&mut self, pos: InsertPos, build: F) -> Result<i64>
    where
        F: FnOnce(StructDelegate) -> Payload,
    {
        let anchor = self.cur.clone();
        let (parent_key, left_key, right_key) = match pos {
            InsertPos::FirstChild => {
                (anchor.node_key(), NULL_NODE_KEY, anchor.first_child_key())
            }
            InsertPos::RightSibling => (
                anchor.parent_key(),
                anchor.node_key(),
                anchor.right_sibling_key(),
            ),
        };

        let key = self.pages.alloc_node_key();
        let st = StructDelegate {
            first_child: NULL_NODE_KEY,
            last_child: NULL_NODE_KEY,
            left_sibling: left_key,
            right_sibling: right_key,
            child_count: 0,
            descendant_count: 0,
        };
        let mut node = Node::new(
            NodeHeader {
                node_key: key,
                parent_key,
                hash: 0,
                previous_revision: self.pages.revision(),
                last_modified_revision: self.pages.revision(),
            },
            build(st),
        );
        node.header.hash = node.local_hash();

        let mut parent = self.fetch_node(parent_key)?;
        {
            let st = match parent.as_struct_mut() {
                Some(st) => st,
                None => return err_at!(UnsupportedOp, msg: "parent holds no children"),
            };
            match pos {
                InsertPos::FirstChild => {
                    st.first_child = key;
                    if st.last_child == NULL_NODE_KEY {
                        st.last_child = key;
                    }
                }
                InsertPos::RightSibling => {
                    if st.last_child == left_key {
                        st.last_child = key;
                    }
                }
            }
            st.child_count += 1;
        }
        self.stamp(&mut parent);
        self.store_node(&parent)?;

        if left_key != NULL_NODE_KEY {
            let mut left = self.fetch_node(left_key)?;
            if let Some(st) = left.as_struct_mut() {
                st.right_sibling = key;
            }
            self.stamp(&mut left);
            self.store_node(&left)?;
        }
        if right_key != NULL_NODE_KEY {
            let mut right = self.fetch_node(right_key)?;
            if let Some(st) = right.as_struct_mut() {
                st.left_sibling = key;
            }
            self.stamp(&mut right);
            self.store_node(&right)?;
        }

        let dewey = self.dewey_for(parent_key, left_key, right_key)?;
        self.store_node_with_dewey(&node, dewey.as_ref())?;

        self.adjust_ancestors(parent_key, 1, node.header.hash)?;

        self.cur = self.fetch_node(key)?;
        Ok(key)
    }

    fn expect_kind(&self, allowed: &[NodeKind], what: &str) -> Result<()> {
        let kind = self.cur.kind();
        if allowed.contains(&kind) {
            Ok(())
        } else {
            err_at!(UnsupportedOp, msg: "{} not allowed at {:?}", what, kind)
        }
    }

    fn expect_json(&self) -> Result<()> {
        match self.tree_kind {
            TreeKind::Json => Ok(()),
            TreeKind::Xml => err_at!(UnsupportedOp, msg: "json op on xml resource"),
        }
    }

    fn expect_xml(&self) -> Result<()> {
        match self.tree_kind {
            TreeKind::Xml => Ok(()),
            TreeKind::Json => err_at!(UnsupportedOp, msg: "xml op on json resource"),
        }
    }

    fn sibling_parent(&mut self) -> Result<Node> {
        let parent_key = self.cur.parent_key();
        if parent_key == NULL_NODE_KEY {
            err_at!(UnsupportedOp, msg: "document root has no siblings")
        } else {
            self.fetch_node(parent_key)
        }
    }

    // value nodes under an object key are the key's single child.
    fn value_context(&mut self, pos: InsertPos) -> Result<(bool, i64)> {
        let parent = match pos {
            InsertPos::FirstChild => self.cur.clone(),
            InsertPos::RightSibling => self.sibling_parent()?,
        };
        match parent.kind() {
            NodeKind::ObjectKey => {
                if pos == InsertPos::RightSibling {
                    return err_at!(UnsupportedOp, msg: "object value has no siblings");
                }
                if parent.child_count() > 0 {
                    return err_at!(UnsupportedOp, msg: "object key already has a value");
                }
                let pcr = self.node_pcr(parent.node_key())?;
                Ok((true, pcr))
            }
            NodeKind::Array | NodeKind::JsonDocument => {
                let pcr = self.node_pcr(parent.node_key())?;
                Ok((false, pcr))
            }
            kind => err_at!(UnsupportedOp, msg: "value under {:?}", kind),
        }
    }
}

// JSON structural inserts.
impl NodeWriteTrx {
    pub fn insert_object_as_first_child(&mut self) -> Result<i64> {
        self.expect_json()?;
        self.expect_kind(
            &[NodeKind::JsonDocument, NodeKind::Array, NodeKind::ObjectKey],
            "object insert",
        )?;
        if self.cur.kind() == NodeKind::ObjectKey && self.cur.child_count() > 0 {
            return err_at!(UnsupportedOp, msg: "object key already has a value");
        }
        let key = self.insert_structural(InsertPos::FirstChild, |st| Payload::Object { st })?;
        let node = self.cur.clone();
        let pcr = self.node_pcr(key)?;
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_object_as_right_sibling(&mut self) -> Result<i64> {
        self.expect_json()?;
        let parent = self.sibling_parent()?;
        match parent.kind() {
            NodeKind::Array | NodeKind::JsonDocument => (),
            kind => return err_at!(UnsupportedOp, msg: "object sibling under {:?}", kind),
        }
        let key = self.insert_structural(InsertPos::RightSibling, |st| Payload::Object { st })?;
        let node = self.cur.clone();
        let pcr = self.node_pcr(key)?;
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_array_as_first_child(&mut self) -> Result<i64> {
        self.expect_json()?;
        self.expect_kind(
            &[NodeKind::JsonDocument, NodeKind::Array, NodeKind::ObjectKey],
            "array insert",
        )?;
        if self.cur.kind() == NodeKind::ObjectKey && self.cur.child_count() > 0 {
            return err_at!(UnsupportedOp, msg: "object key already has a value");
        }
        let key = self.insert_structural(InsertPos::FirstChild, |st| Payload::Array { st })?;
        let node = self.cur.clone();
        let pcr = self.node_pcr(key)?;
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_array_as_right_sibling(&mut self) -> Result<i64> {
        self.expect_json()?;
        let parent = self.sibling_parent()?;
        match parent.kind() {
            NodeKind::Array | NodeKind::JsonDocument => (),
            kind => return err_at!(UnsupportedOp, msg: "array sibling under {:?}", kind),
        }
        let key = self.insert_structural(InsertPos::RightSibling, |st| Payload::Array { st })?;
        let node = self.cur.clone();
        let pcr = self.node_pcr(key)?;
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_object_key_as_first_child(&mut self, name: &str) -> Result<i64> {
        self.expect_json()?;
        self.expect_kind(&[NodeKind::Object], "object key insert")?;
        let parent_pcr = self.node_pcr(self.cur.node_key())?;
        self.insert_object_key(InsertPos::FirstChild, name, parent_pcr)
    }

    pub fn insert_object_key_as_right_sibling(&mut self, name: &str) -> Result<i64> {
        self.expect_json()?;
        self.expect_kind(&[NodeKind::ObjectKey], "object key sibling insert")?;
        let parent = self.sibling_parent()?;
        let parent_pcr = self.node_pcr(parent.node_key())?;
        self.insert_object_key(InsertPos::RightSibling, name, parent_pcr)
    }

    fn insert_object_key(
        &mut self,
        pos: InsertPos,
        name: &str,
        parent_pcr: i64,
    ) -> Result<i64> {
        let name_key = self
            .pages
            .names_mut()
            .get_or_insert(NameSpace::LocalName, name);
        let pcr = if self.with_path_summary {
            let uri_key = -1;
            self.get_or_create_path(
                parent_pcr,
                PathStep::Name {
                    uri_key,
                    local_key: name_key,
                },
            )?
        } else {
            PATH_ROOT
        };
        let key = self.insert_structural(pos, |st| Payload::ObjectKey {
            st,
            name_key,
            path_node_key: pcr,
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, Some(name), pcr)?;
        Ok(key)
    }

    pub fn insert_string_value_as_first_child(&mut self, value: &str) -> Result<i64> {
        self.expect_json()?;
        let (in_object, pcr) = self.value_context(InsertPos::FirstChild)?;
        let bytes = value.as_bytes().to_vec();
        let key = self.insert_structural(InsertPos::FirstChild, |st| Payload::StringValue {
            st,
            value: ValueDelegate { value: bytes },
            in_object,
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_string_value_as_right_sibling(&mut self, value: &str) -> Result<i64> {
        self.expect_json()?;
        let (in_object, pcr) = self.value_context(InsertPos::RightSibling)?;
        let bytes = value.as_bytes().to_vec();
        let key = self.insert_structural(InsertPos::RightSibling, |st| Payload::StringValue {
            st,
            value: ValueDelegate { value: bytes },
            in_object,
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_boolean_value_as_first_child(&mut self, value: bool) -> Result<i64> {
        self.expect_json()?;
        let (in_object, pcr) = self.value_context(InsertPos::FirstChild)?;
        let key = self.insert_structural(InsertPos::FirstChild, |st| Payload::BooleanValue {
            st,
            value,
            in_object,
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_boolean_value_as_right_sibling(&mut self, value: bool) -> Result<i64> {
        self.expect_json()?;
        let (in_object, pcr) = self.value_context(InsertPos::RightSibling)?;
        let key = self.insert_structural(InsertPos::RightSibling, |st| Payload::BooleanValue {
            st,
            value,
            in_object,
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_number_value_as_first_child(&mut self, value: Number) -> Result<i64> {
        self.expect_json()?;
        let (in_object, pcr) = self.value_context(InsertPos::FirstChild)?;
        let key = self.insert_structural(InsertPos::FirstChild, |st| Payload::NumberValue {
            st,
            value,
            in_object,
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_number_value_as_right_sibling(&mut self, value: Number) -> Result<i64> {
        self.expect_json()?;
        let (in_object, pcr) = self.value_context(InsertPos::RightSibling)?;
        let key = self.insert_structural(InsertPos::RightSibling, |st| Payload::NumberValue {
            st,
            value,
            in_object,
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_null_value_as_first_child(&mut self) -> Result<i64> {
        self.expect_json()?;
        let (in_object, pcr) = self.value_context(InsertPos::FirstChild)?;
        let key = self.insert_structural(InsertPos::FirstChild, |st| Payload::NullValue {
            st,
            in_object,
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_null_value_as_right_sibling(&mut self) -> Result<i64> {
        self.expect_json()?;
        let (in_object, pcr) = self.value_context(InsertPos::RightSibling)?;
        let key = self.insert_structural(InsertPos::RightSibling, |st| Payload::NullValue {
            st,
            in_object,
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }
}

// XML inserts.
impl NodeWriteTrx {
    pub fn insert_element_as_first_child(
        &mut self,
        uri: &str,
        prefix: &str,
        local: &str,
    ) -> Result<i64> {
        self.expect_xml()?;
        self.expect_kind(&[NodeKind::XmlDocument, NodeKind::Element], "element insert")?;
        let parent_pcr = self.node_pcr(self.cur.node_key())?;
        self.insert_element(InsertPos::FirstChild, uri, prefix, local, parent_pcr)
    }

    pub fn insert_element_as_right_sibling(
        &mut self,
        uri: &str,
        prefix: &str,
        local: &str,
    ) -> Result<i64> {
        self.expect_xml()?;
        let parent = self.sibling_parent()?;
        let parent_pcr = self.node_pcr(parent.node_key())?;
        self.insert_element(InsertPos::RightSibling, uri, prefix, local, parent_pcr)
    }

    fn insert_element(
        &mut self,
        pos: InsertPos,
        uri: &str,
        prefix: &str,
        local: &str,
        parent_pcr: i64,
    ) -> Result<i64> {
        let names = self.pages.names_mut();
        let uri_key = if uri.is_empty() {
            -1
        } else {
            names.get_or_insert(NameSpace::Uri, uri)
        };
        let prefix_key = if prefix.is_empty() {
            -1
        } else {
            names.get_or_insert(NameSpace::Prefix, prefix)
        };
        let local_name_key = names.get_or_insert(NameSpace::LocalName, local);
        let pcr = if self.with_path_summary {
            self.get_or_create_path(
                parent_pcr,
                PathStep::Name {
                    uri_key,
                    local_key: local_name_key,
                },
            )?
        } else {
            PATH_ROOT
        };
        let name = NameDelegate {
            uri_key,
            prefix_key,
            local_name_key,
            path_node_key: pcr,
        };
        let key = self.insert_structural(pos, move |st| Payload::Element {
            st,
            name,
            attribute_keys: vec![],
            namespace_keys: vec![],
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, Some(local), pcr)?;
        Ok(key)
    }

    pub fn insert_text_as_first_child(&mut self, value: &str) -> Result<i64> {
        self.expect_xml()?;
        self.expect_kind(&[NodeKind::XmlDocument, NodeKind::Element], "text insert")?;
        let pcr = self.node_pcr(self.cur.node_key())?;
        let bytes = value.as_bytes().to_vec();
        let key = self.insert_structural(InsertPos::FirstChild, |st| Payload::Text {
            st,
            value: ValueDelegate { value: bytes },
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_text_as_right_sibling(&mut self, value: &str) -> Result<i64> {
        self.expect_xml()?;
        let parent = self.sibling_parent()?;
        let pcr = self.node_pcr(parent.node_key())?;
        let bytes = value.as_bytes().to_vec();
        let key = self.insert_structural(InsertPos::RightSibling, |st| Payload::Text {
            st,
            value: ValueDelegate { value: bytes },
        })?;
        let node = self.cur.clone();
        self.notify(ChangeType::Insert, &node, None, pcr)?;
        Ok(key)
    }

    pub fn insert_comment_as_first_child(&mut self, value: &str) -> Result<i64> {
        self.expect_xml()?;
        self.expect_kind(&[NodeKind::XmlDocument, NodeKind::Element], "comment insert")?;
        let bytes = value.as_bytes().to_vec();
        self.insert_structural(InsertPos::FirstChild, |st| Payload::Comment {
            st,
            value: ValueDelegate { value: bytes },
        })
    }

    pub fn insert_pi_as_first_child(&mut self, target: &str, content: &str) -> Result<i64> {
        self.expect_xml()?;
        self.expect_kind(&[NodeKind::XmlDocument, NodeKind::Element], "pi insert")?;
        let target_key = self
            .pages
            .names_mut()
            .get_or_insert(NameSpace::LocalName, target);
        let bytes = content.as_bytes().to_vec();
        self.insert_structural(InsertPos::FirstChild, move |st| {
            Payload::ProcessingInstruction {
                st,
                name: NameDelegate {
                    uri_key: -1,
                    prefix_key: -1,
                    local_name_key: target_key,
                    path_node_key: PATH_ROOT,
                },
                value: ValueDelegate { value: bytes },
            }
        })
    }

    /// Attach an attribute to the current element.
    pub fn insert_attribute(&mut self, uri: &str, local: &str, value: &str) -> Result<i64> {
        self.expect_xml()?;
        self.expect_kind(&[NodeKind::Element], "attribute insert")?;
        let element_key = self.cur.node_key();

        let names = self.pages.names_mut();
        let uri_key = if uri.is_empty() {
            -1
        } else {
            names.get_or_insert(NameSpace::Uri, uri)
        };
        let local_name_key = names.get_or_insert(NameSpace::LocalName, local);

        let pcr = if self.with_path_summary {
            let parent_pcr = self.node_pcr(element_key)?;
            self.get_or_create_path(
                parent_pcr,
                PathStep::Name {
                    uri_key,
                    local_key: local_name_key,
                },
            )?
        } else {
            PATH_ROOT
        };

        let key = self.pages.alloc_node_key();
        let mut node = Node::new(
            NodeHeader {
                node_key: key,
                parent_key: element_key,
                hash: 0,
                previous_revision: self.pages.revision(),
                last_modified_revision: self.pages.revision(),
            },
            Payload::Attribute {
                name: NameDelegate {
                    uri_key,
                    prefix_key: -1,
                    local_name_key,
                    path_node_key: pcr,
                },
                value: ValueDelegate {
                    value: value.as_bytes().to_vec(),
                },
            },
        );
        node.header.hash = node.local_hash();
        self.store_node(&node)?;

        let mut element = self.fetch_node(element_key)?;
        if let Payload::Element { attribute_keys, .. } = &mut element.payload {
            attribute_keys.push(key);
        }
        self.stamp(&mut element);
        self.store_node(&element)?;
        self.adjust_ancestors(element_key, 0, node.header.hash)?;

        self.notify(ChangeType::Insert, &node.clone(), Some(local), pcr)?;
        self.cur = self.fetch_node(element_key)?;
        Ok(key)
    }

    /// Attach a namespace declaration to the current element.
    pub fn insert_namespace(&mut self, prefix: &str, uri: &str) -> Result<i64> {
        self.expect_xml()?;
        self.expect_kind(&[NodeKind::Element], "namespace insert")?;
        let element_key = self.cur.node_key();

        let names = self.pages.names_mut();
        let uri_key = names.get_or_insert(NameSpace::Uri, uri);
        let prefix_key = names.get_or_insert(NameSpace::Prefix, prefix);

        let key = self.pages.alloc_node_key();
        let mut node = Node::new(
            NodeHeader {
                node_key: key,
                parent_key: element_key,
                hash: 0,
                previous_revision: self.pages.revision(),
                last_modified_revision: self.pages.revision(),
            },
            Payload::Namespace {
                name: NameDelegate {
                    uri_key,
                    prefix_key,
                    local_name_key: -1,
                    path_node_key: PATH_ROOT,
                },
            },
        );
        node.header.hash = node.local_hash();
        self.store_node(&node)?;

        let mut element = self.fetch_node(element_key)?;
        if let Payload::Element { namespace_keys, .. } = &mut element.payload {
            namespace_keys.push(key);
        }
        self.stamp(&mut element);
        self.store_node(&element)?;
        self.adjust_ancestors(element_key, 0, node.header.hash)?;

        self.cur = self.fetch_node(element_key)?;
        Ok(key)
    }
}

// updates and removal.
impl NodeWriteTrx {
    fn replace_leaf_payload(&mut self, payload: Payload, name: Option<&str>) -> Result<()> {
        let mut node = self.cur.clone();
        let pcr = self.node_pcr(node.node_key())?;
        let old_local = node.local_hash();
        self.notify(ChangeType::Delete, &node.clone(), name, pcr)?;

        node.payload = payload;
        let new_local = node.local_hash();
        let delta = new_local.wrapping_sub(old_local);
        node.header.hash = node.header.hash.wrapping_add(delta);
        self.stamp(&mut node);
        self.store_node(&node)?;
        self.adjust_ancestors(node.parent_key(), 0, delta)?;

        self.notify(ChangeType::Insert, &node.clone(), name, pcr)?;
        self.cur = node;
        Ok(())
    }

    pub fn set_string_value(&mut self, value: &str) -> Result<()> {
        match &self.cur.payload {
            Payload::StringValue { st, in_object, .. } => {
                let payload = Payload::StringValue {
                    st: st.clone(),
                    value: ValueDelegate {
                        value: value.as_bytes().to_vec(),
                    },
                    in_object: *in_object,
                };
                self.replace_leaf_payload(payload, None)
            }
            Payload::Text { st, .. } => {
                let payload = Payload::Text {
                    st: st.clone(),
                    value: ValueDelegate {
                        value: value.as_bytes().to_vec(),
                    },
                };
                self.replace_leaf_payload(payload, None)
            }
            _ => err_at!(UnsupportedOp, msg: "set string on {:?}", self.cur.kind()),
        }
    }

    pub fn set_boolean_value(&mut self, value: bool) -> Result<()> {
        match &self.cur.payload {
            Payload::BooleanValue { st, in_object, .. } => {
                let payload = Payload::BooleanValue {
                    st: st.clone(),
                    value,
                    in_object: *in_object,
                };
                self.replace_leaf_payload(payload, None)
            }
            _ => err_at!(UnsupportedOp, msg: "set boolean on {:?}", self.cur.kind()),
        }
    }

    pub fn set_number_value(&mut self, value: Number) -> Result<()> {
        match &self.cur.payload {
            Payload::NumberValue { st, in_object, .. } => {
                let payload = Payload::NumberValue {
                    st: st.clone(),
                    value,
                    in_object: *in_object,
                };
                self.replace_leaf_payload(payload, None)
            }
            _ => err_at!(UnsupportedOp, msg: "set number on {:?}", self.cur.kind()),
        }
    }

    /// Rename the current object key.
    pub fn set_object_key_name(&mut self, name: &str) -> Result<()> {
        self.expect_kind(&[NodeKind::ObjectKey], "rename")?;
        let node = self.cur.clone();
        let old_name = self.name();
        let old_pcr = self.node_pcr(node.node_key())?;
        self.notify(ChangeType::Delete, &node.clone(), old_name.as_deref(), old_pcr)?;
        if self.with_path_summary {
            self.summary.decr_ref(old_pcr);
            self.summary_dirty = true;
        }

        let name_key = self
            .pages
            .names_mut()
            .get_or_insert(NameSpace::LocalName, name);
        let parent_pcr = match self.summary.get(old_pcr) {
            Some(path_node) => path_node.parent,
            None => PATH_ROOT,
        };
        let pcr = if self.with_path_summary {
            self.get_or_create_path(
                parent_pcr,
                PathStep::Name {
                    uri_key: -1,
                    local_key: name_key,
                },
            )?
        } else {
            PATH_ROOT
        };

        let mut node = self.cur.clone();
        let old_local = node.local_hash();
        if let Payload::ObjectKey {
            name_key: nk,
            path_node_key,
            ..
        } = &mut node.payload
        {
            *nk = name_key;
            *path_node_key = pcr;
        }
        let delta = node.local_hash().wrapping_sub(old_local);
        node.header.hash = node.header.hash.wrapping_add(delta);
        self.stamp(&mut node);
        self.store_node(&node)?;
        self.adjust_ancestors(node.parent_key(), 0, delta)?;

        self.notify(ChangeType::Insert, &node.clone(), Some(name), pcr)?;
        self.cur = node;
        Ok(())
    }

    /// Remove the current node and its whole subtree; the cursor moves
    /// to the parent.
    pub fn remove(&mut self) -> Result<()> {
        if self.cur.node_key() == DOCUMENT_ROOT {
            return err_at!(UnsupportedOp, msg: "cannot remove the document root");
        }
        // attributes and namespaces hang off their element, not the
        // child chain.
        if matches!(self.cur.kind(), NodeKind::Attribute | NodeKind::Namespace) {
            return self.remove_non_structural();
        }
        let target = self.cur.clone();
        let parent_key = target.parent_key();
        let left_key = target.left_sibling_key();
        let right_key = target.right_sibling_key();

        // collect the subtree in preorder.
        let mut doomed = vec![];
        let mut stack = vec![target.node_key()];
        while let Some(key) = stack.pop() {
            let node = self.fetch_node(key)?;
            if let Payload::Element {
                attribute_keys,
                namespace_keys,
                ..
            } = &node.payload
            {
                for akey in attribute_keys.iter().chain(namespace_keys.iter()) {
                    doomed.push(self.fetch_node(*akey)?);
                }
            }
            let mut child = node.first_child_key();
            while child != NULL_NODE_KEY {
                stack.push(child);
                child = self.fetch_node(child)?.right_sibling_key();
            }
            doomed.push(node);
        }

        // listeners and path summary before the records disappear.
        for node in doomed.clone().into_iter() {
            let pcr = self.node_pcr(node.node_key())?;
            let name = {
                let key = node.local_name_key();
                self.pages
                    .names()
                    .resolve(NameSpace::LocalName, key)
                    .map(|n| n.to_string())
            };
            self.notify(ChangeType::Delete, &node, name.as_deref(), pcr)?;
            if self.with_path_summary
                && matches!(
                    node.kind(),
                    NodeKind::ObjectKey | NodeKind::Element | NodeKind::Attribute
                )
            {
                self.summary.decr_ref(node.path_node_key());
                self.summary_dirty = true;
            }
        }

        // link surgery around the removed subtree.
        let mut parent = self.fetch_node(parent_key)?;
        {
            let st = parent.as_struct_mut().unwrap();
            if st.first_child == target.node_key() {
                st.first_child = right_key;
            }
            if st.last_child == target.node_key() {
                st.last_child = left_key;
            }
            st.child_count -= 1;
        }
        self.stamp(&mut parent);
        self.store_node(&parent)?;

        if left_key != NULL_NODE_KEY {
            let mut left = self.fetch_node(left_key)?;
            if let Some(st) = left.as_struct_mut() {
                st.right_sibling = right_key;
            }
            self.stamp(&mut left);
            self.store_node(&left)?;
        }
        if right_key != NULL_NODE_KEY {
            let mut right = self.fetch_node(right_key)?;
            if let Some(st) = right.as_struct_mut() {
                st.left_sibling = left_key;
            }
            self.stamp(&mut right);
            self.store_node(&right)?;
        }

        let removed_structural = 1 + target.descendant_count() as i64;
        self.adjust_ancestors(
            parent_key,
            -removed_structural,
            target.header.hash.wrapping_neg(),
        )?;

        for node in doomed.into_iter() {
            self.pages
                .remove_record(IndexType::Document, node.node_key())?;
        }

        self.cur = self.fetch_node(parent_key)?;
        Ok(())
    }

    fn remove_non_structural(&mut self) -> Result<()> {
        let target = self.cur.clone();
        let element_key = target.parent_key();

        let pcr = self.node_pcr(target.node_key())?;
        let name = self.name();
        self.notify(ChangeType::Delete, &target, name.as_deref(), pcr)?;
        if self.with_path_summary && target.kind() == NodeKind::Attribute {
            self.summary.decr_ref(target.path_node_key());
            self.summary_dirty = true;
        }

        let mut element = self.fetch_node(element_key)?;
        if let Payload::Element {
            attribute_keys,
            namespace_keys,
            ..
        } = &mut element.payload
        {
            attribute_keys.retain(|key| *key != target.node_key());
            namespace_keys.retain(|key| *key != target.node_key());
        }
        self.stamp(&mut element);
        self.store_node(&element)?;
        self.adjust_ancestors(element_key, 0, target.header.hash.wrapping_neg())?;

        self.pages
            .remove_record(IndexType::Document, target.node_key())?;
        self.cur = self.fetch_node(element_key)?;
        Ok(())
    }
}

impl NodeCursor for NodeWriteTrx {
    fn node(&self) -> &Node {
        &self.cur
    }

    fn move_to(&mut self, key: i64) -> bool {
        if key == NULL_NODE_KEY {
            return false;
        }
        if key == self.cur.node_key() {
            return true;
        }
        match self.pages.get_record(IndexType::Document, key) {
            Ok(Some(Record::Node(node))) => {
                self.cur = node;
                true
            }
            _ => false,
        }
    }
}

fn document_root(tree_kind: TreeKind, revision: u32) -> Node {
    let st = StructDelegate::default();
    let payload = match tree_kind {
        TreeKind::Json => Payload::JsonDocument { st },
        TreeKind::Xml => Payload::XmlDocument { st },
    };
    let mut node = Node::new(
        NodeHeader {
            node_key: DOCUMENT_ROOT,
            parent_key: NULL_NODE_KEY,
            hash: 0,
            previous_revision: revision,
            last_modified_revision: revision,
        },
        payload,
    );
    node.header.hash = node.local_hash();
    node
}

#[cfg(test)]
#[path = "wtx_test.rs"]
mod wtx_test;
