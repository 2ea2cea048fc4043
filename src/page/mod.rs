//! Module `page` implement the page variants of the copy-on-write page
//! tree, and their canonical serialization.
//!
//! The head of a resource is the [UberPage]. It points, through a
//! four level indirect tree, at one [RevisionRootPage] per revision,
//! which in turn roots the five subtrees of that revision: main
//! records, path summary and the three secondary indexes. Leaves of
//! record subtrees are [RecordPage]s.

use crate::{
    names::NameDictionary,
    util::binary::{self, put_i64, put_u16, put_u32, put_u64, put_u8},
    Result,
};

pub mod codec;
pub mod indirect;
pub mod record;
pub mod reference;

pub use indirect::IndirectPage;
pub use record::{Record, RecordPage, Slot};
pub use reference::PageRef;

/// Fan-out of every indirect page.
pub const INP_REFERENCE_COUNT: usize = 1024;
/// Bits of a page key consumed per indirect level.
pub const INP_LEVEL_BITS: u32 = 10;
/// Number of indirect levels between a subtree root and its leaves.
pub const INP_LEVELS: usize = 4;

/// Byte alignment for ordinary page fragments.
pub const PAGE_FRAGMENT_BYTE_ALIGN: u64 = 8;
/// Byte alignment for revision root pages.
pub const REVISION_ROOT_PAGE_BYTE_ALIGN: u64 = 256;
/// Byte alignment and reserved size for uber pages.
pub const UBER_PAGE_BYTE_ALIGN: u64 = 512;
/// Size of the data-file header; the sidecar places its second uber
/// copy at `FIRST_BEACON >> 1`.
pub const FIRST_BEACON: u64 = 2 * UBER_PAGE_BYTE_ALIGN;

/// Default number of record slots per record page.
pub const RECORD_PAGE_CAPACITY: usize = 512;
/// Records whose encoded form exceeds this many bytes move to a
/// dedicated overflow page.
pub const OVERFLOW_THRESHOLD: usize = 4096;

/// Which subtree a page belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IndexType {
    /// Main record subtree holding the tree nodes.
    Document = 0,
    /// Path class records.
    PathSummary = 1,
    /// PATH index records.
    Path = 2,
    /// CAS index records.
    Cas = 3,
    /// NAME index records.
    Name = 4,
    /// Revision roots under the uber page.
    RevisionRoots = 5,
}

/// Subtrees rooted in a revision root page, in commit flush order.
pub const SUBTREES: [IndexType; 5] = [
    IndexType::Document,
    IndexType::PathSummary,
    IndexType::Path,
    IndexType::Cas,
    IndexType::Name,
];

impl IndexType {
    pub fn from_u8(tag: u8) -> Result<IndexType> {
        let val = match tag {
            0 => IndexType::Document,
            1 => IndexType::PathSummary,
            2 => IndexType::Path,
            3 => IndexType::Cas,
            4 => IndexType::Name,
            5 => IndexType::RevisionRoots,
            tag => return err_at!(Corrupt, msg: "unknown index type {}", tag),
        };
        Ok(val)
    }
}

/// Per secondary-index metadata kept in the revision root page. The
/// filter definition persists here too, so listeners resume on
/// re-open without re-registration.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexRootMeta {
    /// Index kind tag, see [crate::index::IndexKind].
    pub kind: u8,
    pub number: u16,
    /// Node key of the tree root inside the index subtree.
    pub root: i64,
    /// Highest record key allocated for this index.
    pub max_node_key: i64,
    /// Set when an index listener failed during commit; the index must
    /// be rebuilt before it can be trusted.
    pub rebuild_needed: bool,
    /// Path expressions narrowing PATH/CAS coverage; empty = all.
    pub paths: Vec<String>,
    /// NAME include set; empty = all names.
    pub include_names: Vec<String>,
    /// NAME exclude set.
    pub exclude_names: Vec<String>,
}

impl IndexRootMeta {
    pub fn new(kind: u8, number: u16) -> IndexRootMeta {
        IndexRootMeta {
            kind,
            number,
            root: crate::node::NULL_NODE_KEY,
            max_node_key: -1,
            rebuild_needed: false,
            paths: vec![],
            include_names: vec![],
            exclude_names: vec![],
        }
    }

    /// Subtree for records of this index, derived from the kind tag.
    pub fn index_type(&self) -> Result<IndexType> {
        match self.kind {
            0 => Ok(IndexType::Name),
            1 => Ok(IndexType::Path),
            2 => Ok(IndexType::Cas),
            tag => err_at!(Corrupt, msg: "bad index kind {}", tag),
        }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        put_u8(buf, self.kind);
        put_u16(buf, self.number);
        put_i64(buf, self.root);
        put_i64(buf, self.max_node_key);
        put_u8(buf, self.rebuild_needed as u8);
        for set in [&self.paths, &self.include_names, &self.exclude_names].iter() {
            put_u16(buf, set.len() as u16);
            for item in set.iter() {
                binary::put_bytes(buf, item.as_bytes());
            }
        }
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Result<IndexRootMeta> {
        let mut meta = IndexRootMeta {
            kind: binary::take_u8(buf)?,
            number: binary::take_u16(buf)?,
            root: binary::take_i64(buf)?,
            max_node_key: binary::take_i64(buf)?,
            rebuild_needed: binary::take_u8(buf)? != 0,
            paths: vec![],
            include_names: vec![],
            exclude_names: vec![],
        };
        for i in 0..3 {
            let mut items = vec![];
            for _ in 0..binary::take_u16(buf)? {
                let item =
                    err_at!(FailConvert, String::from_utf8(binary::take_bytes(buf)?))?;
                items.push(item);
            }
            match i {
                0 => meta.paths = items,
                1 => meta.include_names = items,
                _ => meta.exclude_names = items,
            }
        }
        Ok(meta)
    }
}

/// Root page of one committed revision.
#[derive(Clone, Debug, PartialEq)]
pub struct RevisionRootPage {
    pub revision: u32,
    pub timestamp_ms: u64,
    /// Node key allocator head for the main subtree.
    pub max_node_key: i64,
    /// Path node key allocator head for the path summary.
    pub max_path_node_key: i64,
    pub documents: PageRef,
    pub path_summary: PageRef,
    pub cas_index: PageRef,
    pub path_index: PageRef,
    pub name_index: PageRef,
    /// Name dictionary snapshot for this revision.
    pub names: PageRef,
    pub index_roots: Vec<IndexRootMeta>,
}

impl RevisionRootPage {
    pub fn bootstrap() -> RevisionRootPage {
        RevisionRootPage {
            revision: 0,
            timestamp_ms: 0,
            max_node_key: crate::node::DOCUMENT_ROOT,
            max_path_node_key: 0,
            documents: PageRef::new(),
            path_summary: PageRef::new(),
            cas_index: PageRef::new(),
            path_index: PageRef::new(),
            name_index: PageRef::new(),
            names: PageRef::new(),
            index_roots: vec![],
        }
    }

    pub fn subtree_ref(&self, index_type: IndexType) -> &PageRef {
        match index_type {
            IndexType::Document => &self.documents,
            IndexType::PathSummary => &self.path_summary,
            IndexType::Path => &self.path_index,
            IndexType::Cas => &self.cas_index,
            IndexType::Name => &self.name_index,
            IndexType::RevisionRoots => unreachable!("not rooted here"),
        }
    }

    pub fn subtree_ref_mut(&mut self, index_type: IndexType) -> &mut PageRef {
        match index_type {
            IndexType::Document => &mut self.documents,
            IndexType::PathSummary => &mut self.path_summary,
            IndexType::Path => &mut self.path_index,
            IndexType::Cas => &mut self.cas_index,
            IndexType::Name => &mut self.name_index,
            IndexType::RevisionRoots => unreachable!("not rooted here"),
        }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        put_u32(buf, self.revision);
        put_u64(buf, self.timestamp_ms);
        put_i64(buf, self.max_node_key);
        put_i64(buf, self.max_path_node_key);
        self.documents.encode(buf);
        self.path_summary.encode(buf);
        self.cas_index.encode(buf);
        self.path_index.encode(buf);
        self.name_index.encode(buf);
        self.names.encode(buf);
        put_u16(buf, self.index_roots.len() as u16);
        for meta in self.index_roots.iter() {
            meta.encode(buf);
        }
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Result<RevisionRootPage> {
        let revision = binary::take_u32(buf)?;
        let timestamp_ms = binary::take_u64(buf)?;
        let max_node_key = binary::take_i64(buf)?;
        let max_path_node_key = binary::take_i64(buf)?;
        let documents = PageRef::decode(buf)?;
        let path_summary = PageRef::decode(buf)?;
        let cas_index = PageRef::decode(buf)?;
        let path_index = PageRef::decode(buf)?;
        let name_index = PageRef::decode(buf)?;
        let names = PageRef::decode(buf)?;
        let mut index_roots = vec![];
        for _ in 0..binary::take_u16(buf)? {
            index_roots.push(IndexRootMeta::decode(buf)?);
        }
        Ok(RevisionRootPage {
            revision,
            timestamp_ms,
            max_node_key,
            max_path_node_key,
            documents,
            path_summary,
            cas_index,
            path_index,
            name_index,
            names,
            index_roots,
        })
    }
}

/// Head page of a resource, written twice per commit for crash
/// resilience.
#[derive(Clone, Debug, PartialEq)]
pub struct UberPage {
    /// Number of committed revisions; the latest is `count - 1`.
    pub revision_count: u32,
    /// Indirect tree over all revision root pages, keyed by revision.
    pub revision_roots: PageRef,
}

impl UberPage {
    pub fn bootstrap() -> UberPage {
        UberPage {
            revision_count: 0,
            revision_roots: PageRef::new(),
        }
    }

    pub fn last_committed(&self) -> u32 {
        self.revision_count.saturating_sub(1)
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        put_u32(buf, self.revision_count);
        self.revision_roots.encode(buf);
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Result<UberPage> {
        Ok(UberPage {
            revision_count: binary::take_u32(buf)?,
            revision_roots: PageRef::decode(buf)?,
        })
    }
}

/// Dedicated page for one oversized record.
#[derive(Clone, Debug, PartialEq)]
pub struct OverflowPage {
    pub record_key: i64,
    pub data: Vec<u8>,
}

impl OverflowPage {
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        put_i64(buf, self.record_key);
        binary::put_bytes(buf, &self.data);
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Result<OverflowPage> {
        Ok(OverflowPage {
            record_key: binary::take_i64(buf)?,
            data: binary::take_bytes(buf)?,
        })
    }
}

/// Name dictionary snapshot page.
#[derive(Clone)]
pub struct NamePage {
    pub dict: NameDictionary,
}

impl NamePage {
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        self.dict.encode(buf);
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Result<NamePage> {
        Ok(NamePage {
            dict: NameDictionary::decode(buf)?,
        })
    }
}

/// Sum over every page variant.
#[derive(Clone)]
pub enum Page {
    Uber(UberPage),
    RevisionRoot(RevisionRootPage),
    Indirect(IndirectPage),
    Record(RecordPage),
    Overflow(OverflowPage),
    Names(NamePage),
}

impl Page {
    pub fn as_record(&self) -> Result<&RecordPage> {
        match self {
            Page::Record(page) => Ok(page),
            _ => err_at!(Corrupt, msg: "expected record page"),
        }
    }

    pub fn as_indirect(&self) -> Result<&IndirectPage> {
        match self {
            Page::Indirect(page) => Ok(page),
            _ => err_at!(Corrupt, msg: "expected indirect page"),
        }
    }

    pub fn as_revision_root(&self) -> Result<&RevisionRootPage> {
        match self {
            Page::RevisionRoot(page) => Ok(page),
            _ => err_at!(Corrupt, msg: "expected revision root page"),
        }
    }

    pub fn as_uber(&self) -> Result<&UberPage> {
        match self {
            Page::Uber(page) => Ok(page),
            _ => err_at!(Corrupt, msg: "expected uber page"),
        }
    }

    pub fn as_overflow(&self) -> Result<&OverflowPage> {
        match self {
            Page::Overflow(page) => Ok(page),
            _ => err_at!(Corrupt, msg: "expected overflow page"),
        }
    }

    pub fn as_names(&self) -> Result<&NamePage> {
        match self {
            Page::Names(page) => Ok(page),
            _ => err_at!(Corrupt, msg: "expected name page"),
        }
    }

    /// Byte alignment of this page kind within the data file.
    pub fn alignment(&self) -> u64 {
        match self {
            Page::Uber(_) => UBER_PAGE_BYTE_ALIGN,
            Page::RevisionRoot(_) => REVISION_ROOT_PAGE_BYTE_ALIGN,
            _ => PAGE_FRAGMENT_BYTE_ALIGN,
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
