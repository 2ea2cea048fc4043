//! Module `codec` implement the canonical serialization for every page
//! variant.
//!
//! There is exactly one byte form per variant; the byte-handler
//! pipeline (compression, checksum, encryption) applies on top of this
//! form, and content hashes are computed over the pipelined bytes as
//! written to disk.

use crate::{
    page::{IndirectPage, NamePage, OverflowPage, Page, RecordPage, RevisionRootPage, UberPage},
    util::binary,
    Result,
};

const TAG_UBER: u8 = 1;
const TAG_REVISION_ROOT: u8 = 2;
const TAG_INDIRECT: u8 = 3;
const TAG_RECORD: u8 = 4;
const TAG_OVERFLOW: u8 = 5;
const TAG_NAMES: u8 = 6;

/// Serialize `page` into `buf`.
pub fn encode_page(page: &Page, buf: &mut Vec<u8>) {
    match page {
        Page::Uber(p) => {
            buf.push(TAG_UBER);
            p.encode(buf);
        }
        Page::RevisionRoot(p) => {
            buf.push(TAG_REVISION_ROOT);
            p.encode(buf);
        }
        Page::Indirect(p) => {
            buf.push(TAG_INDIRECT);
            p.encode(buf);
        }
        Page::Record(p) => {
            buf.push(TAG_RECORD);
            p.encode(buf);
        }
        Page::Overflow(p) => {
            buf.push(TAG_OVERFLOW);
            p.encode(buf);
        }
        Page::Names(p) => {
            buf.push(TAG_NAMES);
            p.encode(buf);
        }
    }
}

/// Deserialize one page from `data`.
pub fn decode_page(data: &[u8]) -> Result<Page> {
    let buf = &mut &data[..];
    let page = match binary::take_u8(buf)? {
        TAG_UBER => Page::Uber(UberPage::decode(buf)?),
        TAG_REVISION_ROOT => Page::RevisionRoot(RevisionRootPage::decode(buf)?),
        TAG_INDIRECT => Page::Indirect(IndirectPage::decode(buf)?),
        TAG_RECORD => Page::Record(RecordPage::decode(buf)?),
        TAG_OVERFLOW => Page::Overflow(OverflowPage::decode(buf)?),
        TAG_NAMES => Page::Names(NamePage::decode(buf)?),
        tag => return err_at!(Corrupt, msg: "unknown page tag {}", tag),
    };
    Ok(page)
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;
