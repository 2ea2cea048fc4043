//! Module `rtx` implement read transactions.
//!
//! A [PageReadTrx] pins one committed revision: it owns a storage
//! reader, a bounded per-transaction cache, a handle on the shared
//! resource cache, and an epoch ticket keeping its revision's page
//! fragments alive. A [NodeReadTrx] is the cursor layered on top.

use lru::LruCache;

use std::{num::NonZeroUsize, sync::Arc};

use crate::{
    cache::PageCache,
    epoch::Ticket,
    index::pathsummary::PathSummary,
    io::StorageReader,
    names::{NameDictionary, NameSpace},
    node::{Node, NodeKind, DOCUMENT_ROOT, NULL_NODE_KEY},
    page::{IndexType, Page, PageRef, Record, RevisionRootPage, Slot},
    tree::{pagetree, NodeCursor},
    Result,
};

/// Capacity of the per-transaction page cache.
const TRX_CACHE_SIZE: usize = 256;

/// Page level read transaction pinned to one revision.
pub struct PageReadTrx {
    revision: u32,
    root: RevisionRootPage,
    reader: StorageReader,
    shared_cache: Arc<PageCache>,
    trx_cache: LruCache<u64, Arc<Page>>,
    names: NameDictionary,
    cap_exp: u32,
    _ticket: Ticket,
}

impl PageReadTrx {
    pub fn new(
        root: RevisionRootPage,
        mut reader: StorageReader,
        shared_cache: Arc<PageCache>,
        cap_exp: u32,
        ticket: Ticket,
    ) -> Result<PageReadTrx> {
        let names = if root.names.is_resolved() {
            reader.read(&root.names)?.as_names()?.dict.clone()
        } else {
            NameDictionary::new()
        };
        Ok(PageReadTrx {
            revision: root.revision,
            root,
            reader,
            shared_cache,
            trx_cache: LruCache::new(NonZeroUsize::new(TRX_CACHE_SIZE).unwrap()),
            names,
            cap_exp,
            _ticket: ticket,
        })
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn root(&self) -> &RevisionRootPage {
        &self.root
    }

    pub fn names(&self) -> &NameDictionary {
        &self.names
    }

    pub fn names_mut(&mut self) -> &mut NameDictionary {
        &mut self.names
    }

    /// Read a page through both caches; exposed to the write
    /// transaction for copy-on-write faulting.
    pub(crate) fn read_page(&mut self, reference: &PageRef) -> Result<Arc<Page>> {
        self.read_ref(reference)
    }

    pub fn cap_exp(&self) -> u32 {
        self.cap_exp
    }

    pub(crate) fn page_key_of(&self, record_key: i64) -> u64 {
        (record_key as u64) >> self.cap_exp
    }

    pub(crate) fn slot_of(&self, record_key: i64) -> usize {
        ((record_key as u64) & ((1 << self.cap_exp) - 1)) as usize
    }

    /// Read through both caches.
    fn read_ref(&mut self, reference: &PageRef) -> Result<Arc<Page>> {
        let key = reference.key;
        if let Some(page) = self.trx_cache.get(&key) {
            return Ok(Arc::clone(page));
        }
        if let Some(page) = self.shared_cache.get(key) {
            self.trx_cache.put(key, Arc::clone(&page));
            return Ok(page);
        }
        let page = Arc::new(self.reader.read(reference)?);
        self.shared_cache.put(key, Arc::clone(&page));
        self.trx_cache.put(key, Arc::clone(&page));
        Ok(page)
    }

    /// Walk the indirect tree of `index_type` down to the record page
    /// holding `page_key`.
    pub fn get_record_page(
        &mut self,
        index_type: IndexType,
        page_key: u64,
    ) -> Result<Option<Arc<Page>>> {
        let mut reference = self.root.subtree_ref(index_type).clone();
        if !reference.is_resolved() {
            return Ok(None);
        }
        for level in 0..crate::page::INP_LEVELS {
            let page = self.read_ref(&reference)?;
            let indirect = page.as_indirect()?;
            let offset = pagetree::level_offset(page_key, level);
            match indirect.get_reference(offset) {
                Some(child) if child.is_resolved() => reference = child.clone(),
                _ => return Ok(None),
            }
        }
        Ok(Some(self.read_ref(&reference)?))
    }

    /// Decoded record for `record_key`, resolving overflow slots.
    pub fn get_record(
        &mut self,
        index_type: IndexType,
        record_key: i64,
    ) -> Result<Option<Record>> {
        if record_key < 0 {
            return Ok(None);
        }
        let page_key = self.page_key_of(record_key);
        let slot = self.slot_of(record_key);
        let page = match self.get_record_page(index_type, page_key)? {
            Some(page) => page,
            None => return Ok(None),
        };
        let record_page = page.as_record()?;
        match record_page.get_slot(slot)? {
            None => Ok(None),
            Some(Slot::Bytes(_)) => record_page.get_record(slot),
            Some(Slot::Overflow) => {
                let reference = match record_page.get_page_reference(record_key) {
                    Some(reference) => reference.clone(),
                    None => {
                        return err_at!(
                            Corrupt, msg: "overflow slot {} without reference", record_key
                        )
                    }
                };
                let page = self.read_ref(&reference)?;
                let overflow = page.as_overflow()?;
                let record = Record::decode(index_type, &mut overflow.data.as_slice())?;
                Ok(Some(record))
            }
        }
    }

    /// Dewey-id side-table entry for `record_key`.
    pub fn get_dewey_id(
        &mut self,
        index_type: IndexType,
        record_key: i64,
    ) -> Result<Option<Vec<u8>>> {
        if record_key < 0 {
            return Ok(None);
        }
        let page_key = self.page_key_of(record_key);
        let slot = self.slot_of(record_key);
        match self.get_record_page(index_type, page_key)? {
            Some(page) => Ok(page
                .as_record()?
                .get_dewey_id(slot)?
                .map(|id| id.to_vec())),
            None => Ok(None),
        }
    }

    /// Materialize the path summary of this revision.
    pub fn load_path_summary(&mut self) -> Result<PathSummary> {
        let mut nodes = vec![];
        let max = self.root.max_path_node_key;
        let mut page_key = 0_u64;
        while (page_key << self.cap_exp) as i64 <= max {
            if let Some(page) = self.get_record_page(IndexType::PathSummary, page_key)? {
                let record_page = page.as_record()?;
                for slot in record_page.occupied() {
                    if let Some(Record::Path(node)) = record_page.get_record(slot)? {
                        nodes.push(node);
                    }
                }
            }
            page_key += 1;
        }
        Ok(PathSummary::from_nodes(nodes))
    }
}

/// Read cursor over the node tree of one revision.
pub struct NodeReadTrx {
    pages: PageReadTrx,
    cur: Node,
    closed: bool,
}

impl NodeReadTrx {
    pub fn new(mut pages: PageReadTrx) -> Result<NodeReadTrx> {
        let cur = match pages.get_record(IndexType::Document, DOCUMENT_ROOT)? {
            Some(record) => record.as_node()?.clone(),
            None => return err_at!(Corrupt, msg: "resource without document root"),
        };
        Ok(NodeReadTrx {
            pages,
            cur,
            closed: false,
        })
    }

    pub fn revision(&self) -> u32 {
        self.pages.revision()
    }

    pub fn pages_mut(&mut self) -> &mut PageReadTrx {
        &mut self.pages
    }

    pub fn pages(&self) -> &PageReadTrx {
        &self.pages
    }

    /// Resolved local name of the current node, for name-bearing kinds
    /// and object keys.
    pub fn name(&self) -> Option<&str> {
        let key = self.cur.local_name_key();
        self.pages.names().resolve(NameSpace::LocalName, key)
    }

    pub fn value_string(&self) -> Option<String> {
        self.cur
            .value_bytes()
            .map(|val| String::from_utf8_lossy(val).into_owned())
    }

    /// Dewey-id of the current node, when the resource maintains them.
    pub fn dewey_id(&mut self) -> Result<Option<crate::node::DeweyId>> {
        let key = self.cur.node_key();
        match self.pages.get_dewey_id(IndexType::Document, key)? {
            Some(bytes) => Ok(Some(crate::node::DeweyId::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Deregister from the epoch tracker by dropping self.
    pub fn close(self) {}
}

impl NodeCursor for NodeReadTrx {
    fn node(&self) -> &Node {
        &self.cur
    }

    fn move_to(&mut self, key: i64) -> bool {
        if self.closed || key == NULL_NODE_KEY {
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

// kind check helpers shared with the axes.
impl NodeReadTrx {
    pub fn is_object_key(&self) -> bool {
        self.cur.kind() == NodeKind::ObjectKey
    }
}

#[cfg(test)]
#[path = "rtx_test.rs"]
mod rtx_test;
