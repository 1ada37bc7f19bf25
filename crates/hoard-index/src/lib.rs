//! Staging index for hoard.
//!
//! The index records, for every path under the directories a user has
//! indexed, the stat data of the last scan and the object the last save
//! stored for it. Entries are kept in post-order (children before the
//! directory that contains them), which is the order a save consumes them in.
//!
//! # Key Types
//!
//! - [`Index`] -- The in-memory index (BTreeMap-backed), loaded from and
//!   saved to a bincode file
//! - [`IndexEntry`] -- One path: stat data, recorded object, flags
//! - [`PathKey`] -- Normalised path with post-order comparison
//! - [`EntryCursor`] / [`SortedEntries`] -- Filtered traversal with pruning
//! - [`EntryStatus`] -- Deleted / added / modified / unchanged

pub mod cursor;
pub mod entry;
pub mod error;
pub mod index;
pub mod path;
pub mod status;

pub use cursor::{EntryCursor, SortedEntries};
pub use entry::{FileKind, IndexEntry, StatInfo};
pub use error::{IndexError, IndexResult};
pub use index::{Index, INDEX_VERSION};
pub use path::{compare_keys, PathKey};
pub use status::{EntryStatus, ScanReport};
