//! Module `record` implement the fixed-capacity key/value leaf pages.
//!
//! A record page holds up to `capacity` record slots, addressed by
//! `(page_key, slot_offset)`. Slots store the encoded record bytes; a
//! side cache keeps each slot's decoded form so repeated reads
//! deserialize once. Dewey-ids live in a parallel side table and
//! oversized records are swapped out to overflow pages, leaving only a
//! reference behind.

use parking_lot::Mutex;

use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicU32, Ordering::SeqCst},
};

use crate::{
    index::{pathsummary::PathNode, IndexRecord},
    node::Node,
    page::{reference::PageRef, IndexType},
    util::binary::{self, put_i64, put_u16, put_u32, put_u64, put_u8},
    Result,
};

/// A record stored in a record page; the subtree decides the variant.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Node(Node),
    Path(PathNode),
    Index(IndexRecord),
}

impl Record {
    /// Record key, unique within its subtree.
    pub fn key(&self) -> i64 {
        match self {
            Record::Node(node) => node.header.node_key,
            Record::Path(node) => node.key,
            Record::Index(record) => record.node_key(),
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Record::Node(node) => node.encode(buf),
            Record::Path(node) => node.encode(buf),
            Record::Index(record) => record.encode(buf),
        }
    }

    pub fn decode(index_type: IndexType, buf: &mut &[u8]) -> Result<Record> {
        match index_type {
            IndexType::Document => Ok(Record::Node(Node::decode(buf)?)),
            IndexType::PathSummary => Ok(Record::Path(PathNode::decode(buf)?)),
            IndexType::Path | IndexType::Cas | IndexType::Name => {
                Ok(Record::Index(IndexRecord::decode(buf)?))
            }
            IndexType::RevisionRoots => {
                err_at!(Corrupt, msg: "revision-roots subtree holds no records")
            }
        }
    }

    pub fn as_node(&self) -> Result<&Node> {
        match self {
            Record::Node(node) => Ok(node),
            _ => err_at!(Corrupt, msg: "expected node record"),
        }
    }

    pub fn as_index(&self) -> Result<&IndexRecord> {
        match self {
            Record::Index(record) => Ok(record),
            _ => err_at!(Corrupt, msg: "expected index record"),
        }
    }
}

/// One record slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    /// Encoded record bytes.
    Bytes(Vec<u8>),
    /// Record moved to an overflow page, see
    /// [RecordPage::get_page_reference].
    Overflow,
}

/// Fixed-capacity leaf page of a record subtree.
pub struct RecordPage {
    page_key: u64,
    index_type: IndexType,
    revision: u32,
    capacity: usize,
    slots: Vec<Option<Slot>>,
    dewey: Vec<Option<Vec<u8>>>,
    overflow: BTreeMap<i64, PageRef>,
    // deserialize-once side cache, keyed by slot offset.
    decoded: Mutex<HashMap<u16, Record>>,
    pin_count: AtomicU32,
}

impl Clone for RecordPage {
    fn clone(&self) -> RecordPage {
        RecordPage {
            page_key: self.page_key,
            index_type: self.index_type,
            revision: self.revision,
            capacity: self.capacity,
            slots: self.slots.clone(),
            dewey: self.dewey.clone(),
            overflow: self.overflow.clone(),
            decoded: Mutex::new(HashMap::new()),
            pin_count: AtomicU32::new(0),
        }
    }
}

impl PartialEq for RecordPage {
    fn eq(&self, other: &Self) -> bool {
        self.page_key == other.page_key
            && self.index_type == other.index_type
            && self.revision == other.revision
            && self.capacity == other.capacity
            && self.slots == other.slots
            && self.dewey == other.dewey
            && self.overflow == other.overflow
    }
}

impl std::fmt::Debug for RecordPage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "RecordPage<{:?},{},rev={}>",
            self.index_type, self.page_key, self.revision
        )
    }
}

impl RecordPage {
    pub fn new(
        page_key: u64,
        index_type: IndexType,
        revision: u32,
        capacity: usize,
    ) -> RecordPage {
        RecordPage {
            page_key,
            index_type,
            revision,
            capacity,
            slots: vec![None; capacity],
            dewey: vec![None; capacity],
            overflow: BTreeMap::new(),
            decoded: Mutex::new(HashMap::new()),
            pin_count: AtomicU32::new(0),
        }
    }

    pub fn page_key(&self) -> u64 {
        self.page_key
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Stamp the revision this incarnation of the page belongs to.
    pub fn set_revision(&mut self, revision: u32) {
        self.revision = revision;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, SeqCst) + 1
    }

    pub fn unpin(&self) -> u32 {
        self.pin_count.fetch_sub(1, SeqCst) - 1
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(SeqCst)
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= self.capacity {
            err_at!(OutOfRange, msg: "slot {} capacity {}", slot, self.capacity)
        } else {
            Ok(())
        }
    }

    /// Store `record` in its slot, encoding it once.
    pub fn set_record(&mut self, slot: usize, record: Record) -> Result<()> {
        self.check_slot(slot)?;
        let mut buf = vec![];
        record.encode(&mut buf);
        self.slots[slot] = Some(Slot::Bytes(buf));
        self.decoded.lock().insert(slot as u16, record);
        Ok(())
    }

    /// Decoded record at `slot`, deserializing at most once.
    pub fn get_record(&self, slot: usize) -> Result<Option<Record>> {
        self.check_slot(slot)?;
        if let Some(record) = self.decoded.lock().get(&(slot as u16)) {
            return Ok(Some(record.clone()));
        }
        match &self.slots[slot] {
            None => Ok(None),
            Some(Slot::Overflow) => err_at!(
                Fatal, msg: "overflow slot {} must resolve through a transaction", slot
            ),
            Some(Slot::Bytes(data)) => {
                let record = Record::decode(self.index_type, &mut data.as_slice())?;
                self.decoded.lock().insert(slot as u16, record.clone());
                Ok(Some(record))
            }
        }
    }

    pub fn set_slot(&mut self, slot: usize, data: Slot) -> Result<()> {
        self.check_slot(slot)?;
        self.decoded.lock().remove(&(slot as u16));
        self.slots[slot] = Some(data);
        Ok(())
    }

    pub fn get_slot(&self, slot: usize) -> Result<Option<&Slot>> {
        self.check_slot(slot)?;
        Ok(self.slots[slot].as_ref())
    }

    pub fn clear_slot(&mut self, slot: usize) -> Result<()> {
        self.check_slot(slot)?;
        self.decoded.lock().remove(&(slot as u16));
        self.slots[slot] = None;
        self.dewey[slot] = None;
        Ok(())
    }

    pub fn set_dewey_id(&mut self, slot: usize, id: Vec<u8>) -> Result<()> {
        self.check_slot(slot)?;
        self.dewey[slot] = Some(id);
        Ok(())
    }

    pub fn get_dewey_id(&self, slot: usize) -> Result<Option<&[u8]>> {
        self.check_slot(slot)?;
        Ok(self.dewey[slot].as_deref())
    }

    /// Reference to the overflow page holding record `key`.
    pub fn set_page_reference(&mut self, key: i64, reference: PageRef) {
        self.overflow.insert(key, reference);
    }

    pub fn get_page_reference(&self, key: i64) -> Option<&PageRef> {
        self.overflow.get(&key)
    }

    pub fn overflow_refs(&self) -> impl Iterator<Item = (&i64, &PageRef)> {
        self.overflow.iter()
    }

    /// Occupied slot offsets, ascending.
    pub fn occupied(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(off, _)| off)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_none())
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        put_u64(buf, self.page_key);
        put_u8(buf, self.index_type as u8);
        put_u32(buf, self.revision);
        put_u32(buf, self.capacity as u32);

        let occupied = self.occupied();
        put_u32(buf, occupied.len() as u32);
        for off in occupied.iter() {
            put_u16(buf, *off as u16);
            match self.slots[*off].as_ref().unwrap() {
                Slot::Bytes(data) => {
                    put_u8(buf, 0);
                    binary::put_bytes(buf, data);
                }
                Slot::Overflow => put_u8(buf, 1),
            }
        }

        let dewey: Vec<usize> = (0..self.capacity).filter(|i| self.dewey[*i].is_some()).collect();
        put_u32(buf, dewey.len() as u32);
        for off in dewey.into_iter() {
            put_u16(buf, off as u16);
            binary::put_bytes(buf, self.dewey[off].as_ref().unwrap());
        }

        put_u32(buf, self.overflow.len() as u32);
        for (key, reference) in self.overflow.iter() {
            put_i64(buf, *key);
            reference.encode(buf);
        }
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Result<RecordPage> {
        let page_key = binary::take_u64(buf)?;
        let index_type = IndexType::from_u8(binary::take_u8(buf)?)?;
        let revision = binary::take_u32(buf)?;
        let capacity = binary::take_u32(buf)? as usize;

        let mut page = RecordPage::new(page_key, index_type, revision, capacity);
        for _ in 0..binary::take_u32(buf)? {
            let off = binary::take_u16(buf)? as usize;
            page.check_slot(off)?;
            let slot = match binary::take_u8(buf)? {
                0 => Slot::Bytes(binary::take_bytes(buf)?),
                1 => Slot::Overflow,
                tag => return err_at!(Corrupt, msg: "bad slot tag {}", tag),
            };
            page.slots[off] = Some(slot);
        }
        for _ in 0..binary::take_u32(buf)? {
            let off = binary::take_u16(buf)? as usize;
            page.check_slot(off)?;
            page.dewey[off] = Some(binary::take_bytes(buf)?);
        }
        for _ in 0..binary::take_u32(buf)? {
            let key = binary::take_i64(buf)?;
            page.overflow.insert(key, PageRef::decode(buf)?);
        }
        Ok(page)
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
