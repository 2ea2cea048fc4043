//! Module `io` implement the byte storage backends.
//!
//! A resource owns two files: the append-only data file holding every
//! page ever committed, and the revision sidecar holding the two uber
//! page copies plus one `(offset, timestamp)` entry per revision. Page
//! records in the data file are `u32_be length || pipelined bytes`,
//! each record start aligned per its page kind.
//!
//! Readers are independent: every reader owns its own descriptor (or a
//! shared memory map) and does positional reads. All writes funnel
//! through the single [flush::Appender] thread.

use cityhash_rs::cityhash_110_128;
use memmap2::Mmap;

use std::{
    borrow::Cow,
    ffi, fs,
    io::{Read, Seek, SeekFrom},
    path,
    sync::{
        atomic::{AtomicU64, Ordering::SeqCst},
        Arc,
    },
};

use crate::{
    page::{self, codec, Page, PageRef, RevisionRootPage, UberPage},
    revindex::RevisionFileData,
    util, Result,
};

pub mod flush;
pub mod pipeline;
pub mod pool;

pub use flush::Appender;
pub use pipeline::{Pipeline, PipelineStep};
pub use pool::BufferPool;

/// Magic prefix of the data file header.
pub const MAGIC: &[u8; 8] = b"arbordb\x01";

/// Queue depth of the appender thread.
pub const FLUSH_QUEUE_SIZE: usize = 64;

/// Selects the read-side backend implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// Positional reads over one descriptor per reader.
    File,
    /// Shared read-only memory map, remapped per reader generation.
    MemoryMapped,
}

/// Session-lifetime write tally, shared between a resource's writers
/// and its statistics.
#[derive(Default)]
pub struct WriteCounters {
    pub n_pages: AtomicU64,
    pub n_bytes: AtomicU64,
}

/// Compute the content hash stored in page references: city-hash 128
/// over the pipelined bytes exactly as written to disk.
pub fn content_hash(data: &[u8]) -> Vec<u8> {
    cityhash_110_128(data).to_be_bytes().to_vec()
}

pub fn data_location(dir: &ffi::OsStr, name: &str) -> ffi::OsString {
    let loc: path::PathBuf = [dir.to_os_string(), format!("{}.data", name).into()]
        .iter()
        .collect();
    loc.into_os_string()
}

pub fn revisions_location(dir: &ffi::OsStr, name: &str) -> ffi::OsString {
    let loc: path::PathBuf = [dir.to_os_string(), format!("{}.revisions", name).into()]
        .iter()
        .collect();
    loc.into_os_string()
}

/// Handle to the two files of a resource, factory for readers and the
/// writer.
pub struct Storage {
    data_loc: ffi::OsString,
    rev_loc: ffi::OsString,
    backend: StorageBackend,
    pipeline: Pipeline,
    pool: Arc<BufferPool>,
    counters: Arc<WriteCounters>,
}

impl Storage {
    /// Open (or with `create`, initialize) the files for `name` under
    /// `dir`.
    pub fn open(
        dir: &ffi::OsStr,
        name: &str,
        backend: StorageBackend,
        pipeline: Pipeline,
        create: bool,
    ) -> Result<Storage> {
        let data_loc = data_location(dir, name);
        let rev_loc = revisions_location(dir, name);

        if create {
            let mut data_fd = util::create_file_a(&data_loc)?;
            let mut header = MAGIC.to_vec();
            header.resize(page::FIRST_BEACON as usize, 0);
            util::write_buffer(&mut data_fd, &header, "writing beacon")?;
            err_at!(IOError, data_fd.sync_all())?;

            let mut rev_fd = util::create_file_a(&rev_loc)?;
            let zeros = vec![0_u8; (page::FIRST_BEACON) as usize];
            util::write_buffer(&mut rev_fd, &zeros, "writing uber slots")?;
            err_at!(IOError, rev_fd.sync_all())?;
        } else {
            let mut fd = util::open_file_r(&data_loc)?;
            let mut magic = [0_u8; 8];
            err_at!(IOError, fd.read_exact(&mut magic))?;
            if &magic != MAGIC {
                return err_at!(Corrupt, msg: "bad magic {:?}", magic);
            }
        }

        Ok(Storage {
            data_loc,
            rev_loc,
            backend,
            pipeline,
            pool: BufferPool::new(),
            counters: Arc::new(WriteCounters::default()),
        })
    }

    pub fn create_reader(&self) -> Result<StorageReader> {
        let rev = util::open_file_r(&self.rev_loc)?;
        let data = match self.backend {
            StorageBackend::File => Data::File(util::open_file_r(&self.data_loc)?),
            StorageBackend::MemoryMapped => {
                let fd = util::open_file_r(&self.data_loc)?;
                // remapped on every reader generation, readers opened
                // after a commit observe the grown file.
                let map = err_at!(IOError, unsafe { Mmap::map(&fd) })?;
                Data::Mmap(Arc::new(map))
            }
        };
        Ok(StorageReader {
            data,
            rev,
            pipeline: self.pipeline.clone(),
            pool: Arc::clone(&self.pool),
        })
    }

    pub fn create_writer(&self) -> Result<StorageWriter> {
        let appender = Appender::open(&self.data_loc, FLUSH_QUEUE_SIZE)?;
        let rev_fd = util::open_file_w(&self.rev_loc)?;
        Ok(StorageWriter {
            data_loc: self.data_loc.clone(),
            rev_loc: self.rev_loc.clone(),
            pipeline: self.pipeline.clone(),
            appender,
            rev_fd,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Pages and bytes appended by this resource's writers so far.
    pub fn counters(&self) -> &WriteCounters {
        &self.counters
    }

    pub fn data_len(&self) -> Result<u64> {
        Ok(err_at!(IOError, fs::metadata(&self.data_loc))?.len())
    }

    pub fn revision_count(&self) -> Result<u32> {
        let len = err_at!(IOError, fs::metadata(&self.rev_loc))?.len();
        let payload = len.saturating_sub(page::FIRST_BEACON);
        util::to_u32((payload / 16) as usize)
    }

    /// Load the whole sidecar entry table.
    pub fn load_revision_entries(&self) -> Result<Vec<RevisionFileData>> {
        let mut reader = self.create_reader()?;
        let count = self.revision_count()?;
        let mut entries = Vec::with_capacity(count as usize);
        for revision in 0..count {
            entries.push(reader.get_revision_file_data(revision)?);
        }
        Ok(entries)
    }
}

enum Data {
    File(fs::File),
    Mmap(Arc<Mmap>),
}

/// Read handle over a resource; positional, independent of other
/// readers.
pub struct StorageReader {
    data: Data,
    rev: fs::File,
    pipeline: Pipeline,
    pool: Arc<BufferPool>,
}

impl StorageReader {
    /// Read and decode the page a reference points at, verifying its
    /// content hash.
    pub fn read(&mut self, reference: &PageRef) -> Result<Page> {
        if !reference.is_resolved() {
            return err_at!(KeyNotFound, msg: "unresolved page reference");
        }
        self.read_at(reference.key, Some(&reference.hash))
    }

    /// Read the page record at `offset` without a hash check, used for
    /// offsets coming from the trusted sidecar.
    pub fn read_at_offset(&mut self, offset: u64) -> Result<Page> {
        self.read_at(offset, None)
    }

    fn read_at(&mut self, offset: u64, hash: Option<&[u8]>) -> Result<Page> {
        match &mut self.data {
            Data::Mmap(map) => {
                let map = Arc::clone(map);
                let data = map.as_ref();
                let off = util::to_usize(offset)?;
                if off + 4 > data.len() {
                    return err_at!(Corrupt, msg: "offset {} beyond file", offset);
                }
                let mut lenb = [0_u8; 4];
                lenb.copy_from_slice(&data[off..off + 4]);
                let n = u32::from_be_bytes(lenb) as usize;
                if off + 4 + n > data.len() {
                    return err_at!(
                        Corrupt, msg: "declared {} actual {}", n, data.len() - off - 4
                    );
                }
                let payload = &data[off + 4..off + 4 + n];
                decode_payload(&self.pipeline, payload, hash)
            }
            Data::File(fd) => {
                let pipeline = self.pipeline.clone();
                self.pool.clone().with_buffer(offset, |buf| {
                    let mut lenb = [0_u8; 4];
                    err_at!(IOError, fd.seek(SeekFrom::Start(offset)))?;
                    err_at!(IOError, fd.read_exact(&mut lenb), "page length at {}", offset)?;
                    let n = u32::from_be_bytes(lenb) as usize;
                    buf.resize(n, 0);
                    match fd.read(buf) {
                        Ok(m) if m == n => (),
                        Ok(m) => {
                            return err_at!(Corrupt, msg: "declared {} actual {}", n, m)
                        }
                        Err(err) => return err_at!(IOError, Err(err)),
                    }
                    decode_payload(&pipeline, buf, hash)
                })
            }
        }
    }

    /// Sidecar entry for `revision`.
    pub fn get_revision_file_data(&mut self, revision: u32) -> Result<RevisionFileData> {
        let at = page::FIRST_BEACON + 16 * u64::from(revision);
        let len = err_at!(IOError, self.rev.metadata())?.len();
        if at + 16 > len {
            return err_at!(OutOfRange, msg: "revision {} beyond sidecar", revision);
        }
        let mut entry = [0_u8; 16];
        err_at!(IOError, self.rev.seek(SeekFrom::Start(at)))?;
        err_at!(IOError, self.rev.read_exact(&mut entry))?;
        let mut offset = [0_u8; 8];
        let mut timestamp = [0_u8; 8];
        offset.copy_from_slice(&entry[..8]);
        timestamp.copy_from_slice(&entry[8..]);
        Ok(RevisionFileData {
            offset: u64::from_be_bytes(offset),
            timestamp_ms: u64::from_be_bytes(timestamp),
        })
    }

    /// Root page of `revision`, located through the sidecar.
    pub fn read_revision_root(&mut self, revision: u32) -> Result<RevisionRootPage> {
        let entry = self.get_revision_file_data(revision)?;
        let page = self.read_at_offset(entry.offset)?;
        let root = page.as_revision_root()?;
        if root.revision != revision {
            err_at!(
                Corrupt, msg: "sidecar points {} at root {}", revision, root.revision
            )
        } else {
            Ok(root.clone())
        }
    }

    /// Latest readable uber page; copy `a` wins, `b` is the fallback.
    pub fn read_uber(&mut self) -> Result<UberPage> {
        match self.read_uber_slot(0) {
            Ok(uber) => Ok(uber),
            Err(_) => self.read_uber_slot(page::FIRST_BEACON >> 1),
        }
    }

    fn read_uber_slot(&mut self, at: u64) -> Result<UberPage> {
        let mut slot = vec![0_u8; page::UBER_PAGE_BYTE_ALIGN as usize];
        err_at!(IOError, self.rev.seek(SeekFrom::Start(at)))?;
        err_at!(IOError, self.rev.read_exact(&mut slot))?;

        let buf = &mut slot.as_slice();
        let n = util::binary::take_u32(buf)? as usize;
        let crc = util::binary::take_u32(buf)?;
        let payload = util::binary::take_slice(buf, n)?;
        if crc32fast::hash(payload) != crc {
            return err_at!(Corrupt, msg: "uber copy at {} fails crc", at);
        }
        Ok(codec::decode_page(payload)?.as_uber()?.clone())
    }
}

fn decode_payload(pipeline: &Pipeline, payload: &[u8], hash: Option<&[u8]>) -> Result<Page> {
    if let Some(hash) = hash {
        if !hash.is_empty() && content_hash(payload).as_slice() != hash {
            return err_at!(Corrupt, msg: "content hash mismatch");
        }
    }
    let plain = pipeline.restore(Cow::Borrowed(payload))?;
    codec::decode_page(&plain)
}

/// Write handle, exactly one per resource at a time.
pub struct StorageWriter {
    data_loc: ffi::OsString,
    rev_loc: ffi::OsString,
    pipeline: Pipeline,
    appender: Appender,
    rev_fd: fs::File,
    counters: Arc<WriteCounters>,
}

impl StorageWriter {
    /// Offset at which the next page record will start, before
    /// alignment.
    pub fn data_len(&self) -> u64 {
        self.appender.fpos()
    }

    /// Serialize `page` through the pipeline and append it, updating
    /// `reference` with the assigned offset and content hash.
    pub fn write(
        &mut self,
        reference: &mut PageRef,
        page: &Page,
        revision: u32,
        scratch: &mut Vec<u8>,
    ) -> Result<u64> {
        scratch.clear();
        codec::encode_page(page, scratch);
        let payload = self.pipeline.apply(Cow::Borrowed(&scratch[..]))?;
        let hash = content_hash(&payload);

        let fpos = self.data_len();
        let at = util::align_up(fpos, page.alignment());
        let mut block = Vec::with_capacity((at - fpos) as usize + 4 + payload.len());
        block.resize((at - fpos) as usize, 0);
        block.extend_from_slice(&util::to_u32(payload.len())?.to_be_bytes());
        block.extend_from_slice(&payload);
        let n_bytes = block.len() as u64;
        self.appender.append(block)?;
        self.counters.n_pages.fetch_add(1, SeqCst);
        self.counters.n_bytes.fetch_add(n_bytes, SeqCst);

        reference.resolve(revision, at, hash);
        Ok(at)
    }

    /// Write the two uber copies into the sidecar, second copy last;
    /// its completion is the commit point for crash recovery.
    pub fn write_uber_page(&mut self, uber: &UberPage) -> Result<()> {
        let mut payload = vec![];
        codec::encode_page(&Page::Uber(uber.clone()), &mut payload);

        let mut slot = vec![];
        util::binary::put_u32(&mut slot, payload.len() as u32);
        util::binary::put_u32(&mut slot, crc32fast::hash(&payload));
        slot.extend_from_slice(&payload);
        if slot.len() > page::UBER_PAGE_BYTE_ALIGN as usize {
            return err_at!(Fatal, msg: "uber page {} too large", slot.len());
        }
        slot.resize(page::UBER_PAGE_BYTE_ALIGN as usize, 0);

        for at in [0, page::FIRST_BEACON >> 1].iter() {
            err_at!(IOError, self.rev_fd.seek(SeekFrom::Start(*at)))?;
            util::write_buffer(&mut self.rev_fd, &slot, "uber copy")?;
            err_at!(IOError, self.rev_fd.sync_all())?;
        }
        Ok(())
    }

    /// Append the sidecar entry for a committed revision.
    pub fn append_revision_entry(
        &mut self,
        revision: u32,
        offset: u64,
        timestamp_ms: u64,
    ) -> Result<()> {
        let at = page::FIRST_BEACON + 16 * u64::from(revision);
        let mut entry = vec![];
        entry.extend_from_slice(&offset.to_be_bytes());
        entry.extend_from_slice(&timestamp_ms.to_be_bytes());
        err_at!(IOError, self.rev_fd.seek(SeekFrom::Start(at)))?;
        util::write_buffer(&mut self.rev_fd, &entry, "revision entry")?;
        err_at!(IOError, self.rev_fd.sync_all())?;
        Ok(())
    }

    /// Undo everything beyond `revision`: truncate the data file past
    /// that revision's root record and drop younger sidecar entries.
    pub fn truncate_to(&mut self, revision: u32) -> Result<()> {
        let root_offset = {
            let at = page::FIRST_BEACON + 16 * u64::from(revision);
            let mut entry = [0_u8; 8];
            err_at!(IOError, self.rev_fd.seek(SeekFrom::Start(at)))?;
            err_at!(IOError, self.rev_fd.read_exact(&mut entry))?;
            u64::from_be_bytes(entry)
        };

        let data_end = {
            let mut fd = util::open_file_r(&self.data_loc)?;
            let mut lenb = [0_u8; 4];
            err_at!(IOError, fd.seek(SeekFrom::Start(root_offset)))?;
            err_at!(IOError, fd.read_exact(&mut lenb))?;
            root_offset + 4 + u64::from(u32::from_be_bytes(lenb))
        };
        self.truncate_data(data_end)?;

        let sidecar_end = page::FIRST_BEACON + 16 * (u64::from(revision) + 1);
        err_at!(IOError, self.rev_fd.set_len(sidecar_end))?;
        err_at!(IOError, self.rev_fd.sync_all())?;
        Ok(())
    }

    /// Truncate the data file to exactly `len` bytes, restarting the
    /// appender.
    pub fn truncate_data(&mut self, len: u64) -> Result<()> {
        self.appender.close()?;
        let fd = util::open_file_w(&self.data_loc)?;
        err_at!(IOError, fd.set_len(len))?;
        err_at!(IOError, fd.sync_all())?;
        self.appender = Appender::open(&self.data_loc, FLUSH_QUEUE_SIZE)?;
        Ok(())
    }

    /// Force data and sidecar to durable storage.
    pub fn force_all(&mut self) -> Result<()> {
        self.appender.sync()?;
        err_at!(IOError, self.rev_fd.sync_all())?;
        Ok(())
    }

    pub fn close(mut self) -> Result<u64> {
        let fpos = self.appender.close()?;
        err_at!(IOError, self.rev_fd.sync_all())?;
        Ok(fpos)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
