//! Error types for the index crate.

use std::path::PathBuf;

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The specified path was not found in the index.
    #[error("path not found in index: {0}")]
    PathNotFound(String),

    /// A path could not be turned into an absolute, slash-separated key.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The index file was written by an incompatible version.
    #[error("unsupported index version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The index file could not be decoded.
    #[error("corrupt index file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Serialization error while writing the index.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Walking the filesystem failed.
    #[error("scan failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
