//! High-level API for hoard.
//!
//! [`Repository`] ties the object store, ref store, staging index and save
//! driver together behind one directory on disk. This is the entry point for
//! the CLI and for applications embedding hoard.

pub mod config;
pub mod error;
pub mod options;
pub mod repository;

pub use config::{RepoConfig, SaveSection};
pub use error::{SdkError, SdkResult};
pub use options::{command_message, SaveOptions};
pub use repository::{Repository, REPO_ENV};

// Re-export key types
pub use hoard_index::ScanReport;
pub use hoard_refs::RefName;
pub use hoard_save::{
    LogProgress, NoProgress, Progress, ProgressSnapshot, SavePhase, SaveReport, SoftError,
};
pub use hoard_store::{EntryMode, Tree, TreeEntry};
pub use hoard_types::ObjectId;
