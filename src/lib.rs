//! Arbor is a versioned, append-only storage engine for hierarchical
//! data - JSON and XML trees.
//!
//! Every commit produces an immutable revision; historical snapshots
//! stay queryable while a single writer builds the next revision with
//! ordinary tree-mutation semantics. Pages are copy-on-write: a commit
//! appends only the record pages it touched, their indirect ancestors,
//! a fresh revision root page and the uber page, so unchanged subtrees
//! are shared between revisions.
//!
//! The crate is organized leaves first:
//!
//! * [io] - append-only data file, revision sidecar, byte-handler
//!   pipeline, striped read-buffer pool.
//! * [page] - page variants, their canonical codec, indirect pages and
//!   record pages.
//! * [node] - the tagged node model shared by JSON and XML trees.
//! * [tree] - read/write transactions, the cursor contract and the
//!   commit pipeline.
//! * [epoch] - revision tracker deciding when page fragments may be
//!   evicted, plus the per-resource write gate.
//! * [axis] - preorder descendant cursors.
//! * [rbtree], [index] - the secondary index cores and their glue.
//! * [revindex] - timestamp to revision lookup.
//! * [diff] - preorder co-walk diff between two revisions.
//! * [resource] - the session facade tying a resource together.

#[macro_use]
mod error;
pub mod util;

pub mod arena;
pub mod axis;
pub mod cache;
pub mod config;
pub mod diff;
pub mod epoch;
pub mod index;
pub mod io;
pub mod json;
pub mod names;
pub mod node;
pub mod page;
pub mod rbtree;
pub mod resource;
pub mod revindex;
pub mod tree;

pub use crate::config::{IndexBackend, ResourceConfig, TreeKind};
pub use crate::error::Error;
pub use crate::resource::ResourceSession;
pub use crate::tree::{NodeCursor, NodeReadTrx, NodeWriteTrx, RevisionInfo};

/// Shorthand for `std::result::Result` with this package's [Error].
pub type Result<T> = std::result::Result<T, Error>;
