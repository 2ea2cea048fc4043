//! Module `config` implement per-resource configuration.
//!
//! Configuration is used when creating a resource and persisted next
//! to it, so re-opening never depends on the caller passing the same
//! options again.

use cbordata::Cborize;

use std::{convert::TryFrom, ffi, fs, path};

use crate::{
    cache, epoch,
    io::{PipelineStep, StorageBackend},
    page, util, Error, Result,
};

const CONFIG_VER: u32 = 0x000d0001;

/// Kind of trees stored in a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeKind {
    Json,
    Xml,
}

/// Backend implementation for the secondary indexes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexBackend {
    /// Red-black tree persisted in the index subtrees.
    RBTree,
    /// Ordered trie persisted in the index subtrees.
    Trie,
}

/// Configuration for a resource.
///
/// Use the `set_*` methods to change the defaults before creating the
/// resource; subsequently the configuration is persisted along with it.
#[derive(Clone, Debug)]
pub struct ResourceConfig {
    /// JSON or XML node model for this resource.
    pub tree_kind: TreeKind,
    /// Byte backend implementation.
    ///
    /// Default: [StorageBackend::File]
    pub storage_backend: StorageBackend,
    /// Ordered byte-handler steps applied to page bytes.
    ///
    /// Default: empty
    pub pipeline: Vec<PipelineStep>,
    /// Key for the AES pipeline step.
    pub cipher_key: Option<[u8; 32]>,
    /// Maintain dewey-ids on structural nodes.
    ///
    /// Default: false
    pub use_dewey_ids: bool,
    /// Maintain the path summary; required by PATH and CAS indexes.
    ///
    /// Default: true
    pub with_path_summary: bool,
    /// Secondary index backend.
    ///
    /// Default: [IndexBackend::RBTree]
    pub index_backend: IndexBackend,
    /// Record slots per record page, power of two.
    ///
    /// Default: [page::RECORD_PAGE_CAPACITY]
    pub record_page_capacity: usize,
    /// Revision tracker slots.
    ///
    /// Default: [epoch::MAX_CONCURRENT_READERS]
    pub max_concurrent_readers: usize,
    /// Resource page cache capacity, in pages.
    pub page_cache_size: usize,
    /// Index node cache capacity, in nodes.
    pub index_cache_size: usize,
    /// Bounded wait for the write permit, in milliseconds.
    pub write_permit_timeout_ms: u64,
}

impl Default for ResourceConfig {
    fn default() -> ResourceConfig {
        ResourceConfig::new(TreeKind::Json)
    }
}

impl ResourceConfig {
    pub fn new(tree_kind: TreeKind) -> ResourceConfig {
        ResourceConfig {
            tree_kind,
            storage_backend: StorageBackend::File,
            pipeline: vec![],
            cipher_key: None,
            use_dewey_ids: false,
            with_path_summary: true,
            index_backend: IndexBackend::RBTree,
            record_page_capacity: page::RECORD_PAGE_CAPACITY,
            max_concurrent_readers: epoch::MAX_CONCURRENT_READERS,
            page_cache_size: cache::PAGE_CACHE_SIZE,
            index_cache_size: cache::INDEX_CACHE_SIZE,
            write_permit_timeout_ms: epoch::WRITE_PERMIT_TIMEOUT.as_millis() as u64,
        }
    }

    pub fn set_storage_backend(&mut self, backend: StorageBackend) -> &mut Self {
        self.storage_backend = backend;
        self
    }

    pub fn set_pipeline(&mut self, steps: Vec<PipelineStep>) -> &mut Self {
        self.pipeline = steps;
        self
    }

    pub fn set_cipher_key(&mut self, key: [u8; 32]) -> &mut Self {
        self.cipher_key = Some(key);
        self
    }

    pub fn set_dewey_ids(&mut self, enable: bool) -> &mut Self {
        self.use_dewey_ids = enable;
        self
    }

    pub fn set_path_summary(&mut self, enable: bool) -> &mut Self {
        self.with_path_summary = enable;
        self
    }

    pub fn set_index_backend(&mut self, backend: IndexBackend) -> &mut Self {
        self.index_backend = backend;
        self
    }

    pub fn set_record_page_capacity(&mut self, capacity: usize) -> &mut Self {
        self.record_page_capacity = capacity;
        self
    }

    pub fn set_max_concurrent_readers(&mut self, readers: usize) -> &mut Self {
        self.max_concurrent_readers = readers;
        self
    }

    pub fn set_cache_sizes(&mut self, pages: usize, index_nodes: usize) -> &mut Self {
        self.page_cache_size = pages;
        self.index_cache_size = index_nodes;
        self
    }

    pub fn set_write_permit_timeout_ms(&mut self, ms: u64) -> &mut Self {
        self.write_permit_timeout_ms = ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let cap = self.record_page_capacity;
        if !cap.is_power_of_two() || cap < 16 || cap > page::INP_REFERENCE_COUNT {
            return err_at!(
                OutOfRange, msg: "record page capacity {} not a power of two in 16..={}",
                cap, page::INP_REFERENCE_COUNT
            );
        }
        if self.max_concurrent_readers == 0 {
            return err_at!(OutOfRange, msg: "need at least one reader slot");
        }
        if self.pipeline.contains(&PipelineStep::Aes) && self.cipher_key.is_none() {
            return err_at!(InvalidState, msg: "aes pipeline step without cipher key");
        }
        Ok(())
    }

    /// log2 of the record page capacity.
    pub fn cap_exponent(&self) -> u32 {
        self.record_page_capacity.trailing_zeros()
    }
}

pub fn config_location(dir: &ffi::OsStr, name: &str) -> ffi::OsString {
    let loc: path::PathBuf = [dir.to_os_string(), format!("{}.conf", name).into()]
        .iter()
        .collect();
    loc.into_os_string()
}

/// Persisted form of [ResourceConfig].
#[derive(Clone, Default, Debug, Cborize)]
pub struct ConfigRecord {
    pub tree_kind: u8,
    pub storage_backend: u8,
    pub pipeline: Vec<u8>,
    pub cipher_key: Option<Vec<u8>>,
    pub use_dewey_ids: bool,
    pub with_path_summary: bool,
    pub index_backend: u8,
    pub record_page_capacity: u64,
    pub max_concurrent_readers: u64,
    pub page_cache_size: u64,
    pub index_cache_size: u64,
    pub write_permit_timeout_ms: u64,
}

impl ConfigRecord {
    const ID: u32 = CONFIG_VER;
}

impl From<ResourceConfig> for ConfigRecord {
    fn from(config: ResourceConfig) -> ConfigRecord {
        ConfigRecord {
            tree_kind: match config.tree_kind {
                TreeKind::Json => 0,
                TreeKind::Xml => 1,
            },
            storage_backend: match config.storage_backend {
                StorageBackend::File => 0,
                StorageBackend::MemoryMapped => 1,
            },
            pipeline: config
                .pipeline
                .iter()
                .map(|step| match step {
                    PipelineStep::Zstd => 1,
                    PipelineStep::Deflate => 2,
                    PipelineStep::Aes => 3,
                    PipelineStep::Crc32 => 4,
                })
                .collect(),
            cipher_key: config.cipher_key.map(|key| key.to_vec()),
            use_dewey_ids: config.use_dewey_ids,
            with_path_summary: config.with_path_summary,
            index_backend: match config.index_backend {
                IndexBackend::RBTree => 0,
                IndexBackend::Trie => 1,
            },
            record_page_capacity: config.record_page_capacity as u64,
            max_concurrent_readers: config.max_concurrent_readers as u64,
            page_cache_size: config.page_cache_size as u64,
            index_cache_size: config.index_cache_size as u64,
            write_permit_timeout_ms: config.write_permit_timeout_ms,
        }
    }
}

impl TryFrom<ConfigRecord> for ResourceConfig {
    type Error = Error;

    fn try_from(record: ConfigRecord) -> Result<ResourceConfig> {
        let tree_kind = match record.tree_kind {
            0 => TreeKind::Json,
            1 => TreeKind::Xml,
            tag => return err_at!(Corrupt, msg: "bad tree kind {}", tag),
        };
        let storage_backend = match record.storage_backend {
            0 => StorageBackend::File,
            1 => StorageBackend::MemoryMapped,
            tag => return err_at!(Corrupt, msg: "bad storage backend {}", tag),
        };
        let mut pipeline = vec![];
        for tag in record.pipeline.iter() {
            pipeline.push(match tag {
                1 => PipelineStep::Zstd,
                2 => PipelineStep::Deflate,
                3 => PipelineStep::Aes,
                4 => PipelineStep::Crc32,
                tag => return err_at!(Corrupt, msg: "bad pipeline step {}", tag),
            });
        }
        let cipher_key = match record.cipher_key {
            Some(key) => {
                let mut fixed = [0_u8; 32];
                if key.len() != 32 {
                    return err_at!(Corrupt, msg: "cipher key length {}", key.len());
                }
                fixed.copy_from_slice(&key);
                Some(fixed)
            }
            None => None,
        };
        let index_backend = match record.index_backend {
            0 => IndexBackend::RBTree,
            1 => IndexBackend::Trie,
            tag => return err_at!(Corrupt, msg: "bad index backend {}", tag),
        };
        Ok(ResourceConfig {
            tree_kind,
            storage_backend,
            pipeline,
            cipher_key,
            use_dewey_ids: record.use_dewey_ids,
            with_path_summary: record.with_path_summary,
            index_backend,
            record_page_capacity: record.record_page_capacity as usize,
            max_concurrent_readers: record.max_concurrent_readers as usize,
            page_cache_size: record.page_cache_size as usize,
            index_cache_size: record.index_cache_size as usize,
            write_permit_timeout_ms: record.write_permit_timeout_ms,
        })
    }
}

impl ResourceConfig {
    /// Persist under `dir` for later [ResourceConfig::load].
    pub fn save(&self, dir: &ffi::OsStr, name: &str) -> Result<()> {
        let data = util::to_cbor_bytes(ConfigRecord::from(self.clone()))?;
        let loc = config_location(dir, name);
        let mut fd = util::create_file_a(&loc)?;
        util::write_buffer(&mut fd, &data, "writing config")?;
        err_at!(IOError, fd.sync_all())?;
        Ok(())
    }

    pub fn load(dir: &ffi::OsStr, name: &str) -> Result<ResourceConfig> {
        use std::convert::TryInto;

        let loc = config_location(dir, name);
        let data = err_at!(IOError, fs::read(path::Path::new(&loc)))?;
        let (record, _) = util::cbor_from_bytes::<ConfigRecord>(&data)?;
        record.try_into()
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
