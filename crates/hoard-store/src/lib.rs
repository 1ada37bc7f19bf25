//! Content-addressed object storage for hoard.
//!
//! Every snapshot is a graph of immutable objects identified by their
//! domain-separated BLAKE3 hash:
//!
//! - [`Blob`] -- file content, one chunk of a split file, or a symlink target
//! - [`Tree`] -- a directory listing, or the chunk list of a split file
//! - [`Commit`] -- root tree + parent commit + message
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`LooseObjectStore`] -- one file per object under a fan-out directory
//!
//! [`HashSplitter`] turns a byte stream into a blob or chunk tree inside any
//! of them.

pub mod error;
pub mod loose;
pub mod memory;
pub mod object;
pub mod split;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use loose::LooseObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{Blob, Commit, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry};
pub use split::{HashSplitter, SplitConfig, SplitError, SplitOutcome};
pub use traits::ObjectStore;
