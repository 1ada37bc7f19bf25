//! Error taxonomy for a save.
//!
//! Two tiers: [`SoftError`]s are recorded per entry and the save carries on
//! without that entry; [`SaveError`]s abort the save.

use std::fmt;

use hoard_index::{IndexError, PathKey};
use hoard_refs::{RefError, RefName};
use hoard_store::StoreError;
use hoard_types::ObjectId;

/// Why an entry was left out of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftErrorKind {
    /// The file could not be opened or read.
    Unreadable(String),
    /// The symlink target could not be read.
    UnreadableLink(String),
    /// Device, socket, FIFO.
    SpecialFile,
    /// At or above the configured size ceiling.
    TooLarge { size: u64, limit: u64 },
}

/// A per-entry failure that did not stop the save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftError {
    pub path: PathKey,
    pub kind: SoftErrorKind,
}

impl fmt::Display for SoftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SoftErrorKind::Unreadable(reason) => write!(f, "{}: {reason}", self.path),
            SoftErrorKind::UnreadableLink(reason) => {
                write!(f, "{}: cannot read link: {reason}", self.path)
            }
            SoftErrorKind::SpecialFile => write!(f, "skipping special file \"{}\"", self.path),
            SoftErrorKind::TooLarge { size, limit } => write!(
                f,
                "skipping large file \"{}\" ({size} bytes, limit {limit})",
                self.path
            ),
        }
    }
}

/// Errors that abort a save.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("ref error: {0}")]
    Ref(#[from] RefError),

    /// The named ref changed after the save read it. The new commit exists in
    /// the store but nothing points at it.
    #[error("{name} moved during save (expected {expected:?}); commit {commit} left unreferenced")]
    RefMoved {
        name: RefName,
        expected: Option<ObjectId>,
        commit: ObjectId,
    },

    #[error("entries out of order: {current} after {previous}")]
    OutOfOrder { previous: PathKey, current: PathKey },

    #[error("tree stack underflow")]
    StackUnderflow,

    #[error("directory in file position: {0}")]
    UnexpectedDirectory(PathKey),
}

/// Convenience alias for save results.
pub type SaveResult<T> = Result<T, SaveError>;
