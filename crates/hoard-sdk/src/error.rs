use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("repository not initialized at {0}")]
    NotInitialized(PathBuf),

    #[error("repository already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("no repository location: pass --repo or set {0}")]
    NoLocation(&'static str),

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("store error: {0}")]
    Store(#[from] hoard_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] hoard_refs::RefError),

    #[error("index error: {0}")]
    Index(#[from] hoard_index::IndexError),

    #[error(transparent)]
    Save(#[from] hoard_save::SaveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
