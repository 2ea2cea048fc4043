//! Module `indirect` implement the fan-out pages of the page tree.
//!
//! An indirect page holds up to [INP_REFERENCE_COUNT] references in a
//! sparse layout: an occupancy bitmap plus a dense list of the present
//! references in bitmap order. Rank queries run over a word array
//! shadow of the bitmap so `set`/`get` stay cheap at any occupancy.

use croaring::Bitmap;

use crate::{
    page::{reference::PageRef, INP_REFERENCE_COUNT},
    util::binary::{self, put_u16, put_u32, put_u8},
    Result,
};

// beyond this occupancy the page reports full, and serializes as a
// full reference array.
const FULL_LIMIT: usize = INP_REFERENCE_COUNT - 16;
// up to this many references the page serializes in dense
// `(offset, reference)` form.
const DENSE_LIMIT: usize = 4;

const WORDS: usize = INP_REFERENCE_COUNT / 64;

/// Indirect page: occupancy bitmap plus dense reference list.
#[derive(Clone)]
pub struct IndirectPage {
    bitmap: Bitmap,
    refs: Vec<PageRef>,
    /// Word-array shadow of `bitmap`, rebuilt lazily after mutation.
    shadow: Option<Vec<u64>>,
}

impl Default for IndirectPage {
    fn default() -> IndirectPage {
        IndirectPage::new()
    }
}

impl PartialEq for IndirectPage {
    fn eq(&self, other: &Self) -> bool {
        self.offsets() == other.offsets() && self.refs == other.refs
    }
}

impl std::fmt::Debug for IndirectPage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "IndirectPage<cardinality={}>", self.cardinality())
    }
}

impl IndirectPage {
    pub fn new() -> IndirectPage {
        IndirectPage {
            bitmap: Bitmap::create(),
            refs: vec![],
            shadow: Some(vec![0; WORDS]),
        }
    }

    /// Number of occupied slots.
    pub fn cardinality(&self) -> usize {
        self.bitmap.cardinality() as usize
    }

    /// Population count of set bits in `[0, offset)`, the dense-list
    /// position for slot `offset`.
    pub fn index(&self, offset: usize) -> usize {
        match &self.shadow {
            Some(words) => {
                let mut rank = 0_u32;
                for word in words.iter().take(offset / 64) {
                    rank += word.count_ones();
                }
                let rem = offset % 64;
                if rem > 0 {
                    rank += (words[offset / 64] & ((1_u64 << rem) - 1)).count_ones();
                }
                rank as usize
            }
            // shadow invalidated, fall back to scanning the bitmap.
            None => self.bitmap.iter().take_while(|v| (*v as usize) < offset).count(),
        }
    }

    /// Rebuild the word shadow after mutations invalidated it.
    pub fn ensure_shadow(&mut self) {
        if self.shadow.is_none() {
            let mut words = vec![0_u64; WORDS];
            for val in self.bitmap.iter() {
                words[(val as usize) / 64] |= 1_u64 << (val % 64);
            }
            self.shadow = Some(words);
        }
    }

    #[cfg(test)]
    pub(crate) fn shadow_words(&self) -> Option<&[u64]> {
        self.shadow.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn invalidate_shadow(&mut self) {
        self.shadow = None;
    }

    /// Return the reference at slot `offset`, if occupied.
    pub fn get_reference(&self, offset: usize) -> Option<&PageRef> {
        debug_assert!(offset < INP_REFERENCE_COUNT);
        if self.bitmap.contains(offset as u32) {
            Some(&self.refs[self.index(offset)])
        } else {
            None
        }
    }

    pub fn get_reference_mut(&mut self, offset: usize) -> Option<&mut PageRef> {
        if self.bitmap.contains(offset as u32) {
            let at = self.index(offset);
            Some(&mut self.refs[at])
        } else {
            None
        }
    }

    /// Write `reference` into slot `offset`. Returns the full-signal:
    /// true once occupancy reaches the full limit, telling the caller
    /// the page shall materialize as a full reference array.
    pub fn set_reference(&mut self, offset: usize, reference: PageRef) -> bool {
        debug_assert!(offset < INP_REFERENCE_COUNT);
        let at = self.index(offset);
        if self.bitmap.contains(offset as u32) {
            self.refs[at] = reference;
        } else {
            self.refs.insert(at, reference);
            self.bitmap.add(offset as u32);
            match &mut self.shadow {
                Some(words) => words[offset / 64] |= 1_u64 << (offset % 64),
                None => (),
            }
        }
        self.cardinality() >= FULL_LIMIT
    }

    /// Occupied slots in ascending order.
    pub fn offsets(&self) -> Vec<usize> {
        self.bitmap.iter().map(|v| v as usize).collect()
    }

    /// References in bitmap order.
    pub fn references(&self) -> &[PageRef] {
        &self.refs
    }

    pub fn references_mut(&mut self) -> &mut [PageRef] {
        &mut self.refs
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        let count = self.cardinality();
        put_u32(buf, count as u32);
        if count <= DENSE_LIMIT {
            put_u8(buf, 0);
            for (offset, reference) in self.offsets().iter().zip(self.refs.iter()) {
                put_u16(buf, *offset as u16);
                reference.encode(buf);
            }
        } else if count < FULL_LIMIT {
            put_u8(buf, 1);
            let bitmap = self.bitmap.serialize();
            put_u32(buf, bitmap.len() as u32);
            buf.extend_from_slice(&bitmap);
            for reference in self.refs.iter() {
                reference.encode(buf);
            }
        } else {
            put_u8(buf, 2);
            let mut dense = 0;
            for offset in 0..INP_REFERENCE_COUNT {
                if self.bitmap.contains(offset as u32) {
                    put_u8(buf, 1);
                    self.refs[dense].encode(buf);
                    dense += 1;
                } else {
                    put_u8(buf, 0);
                }
            }
        }
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Result<IndirectPage> {
        let count = binary::take_u32(buf)? as usize;
        let mut page = IndirectPage::new();
        match binary::take_u8(buf)? {
            0 => {
                for _ in 0..count {
                    let offset = binary::take_u16(buf)? as usize;
                    page.set_reference(offset, PageRef::decode(buf)?);
                }
            }
            1 => {
                let n = binary::take_u32(buf)? as usize;
                let bitmap = Bitmap::deserialize(binary::take_slice(buf, n)?);
                let mut refs = Vec::with_capacity(count);
                for _ in 0..count {
                    refs.push(PageRef::decode(buf)?);
                }
                page.bitmap = bitmap;
                page.refs = refs;
                page.shadow = None;
                page.ensure_shadow();
            }
            2 => {
                for offset in 0..INP_REFERENCE_COUNT {
                    if binary::take_u8(buf)? != 0 {
                        page.set_reference(offset, PageRef::decode(buf)?);
                    }
                }
            }
            tag => return err_at!(Corrupt, msg: "bad references form {}", tag),
        }
        if page.cardinality() != count {
            return err_at!(
                Corrupt, msg: "reference count {} != {}", page.cardinality(), count
            );
        }
        Ok(page)
    }
}

#[cfg(test)]
#[path = "indirect_test.rs"]
mod indirect_test;
