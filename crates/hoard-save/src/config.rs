//! Per-save settings.

use chrono::{DateTime, Utc};
use hoard_refs::RefName;
use hoard_store::SplitConfig;

/// Message used when the caller does not supply one.
pub const DEFAULT_MESSAGE: &str = "hoard save";

/// What to save and what to produce.
#[derive(Clone, Debug, Default)]
pub struct SaveConfig {
    /// Files of this size or larger are skipped with a soft error.
    pub smaller: Option<u64>,
    pub split: SplitConfig,
    /// Ref to advance to the new commit. Implies a commit.
    pub ref_name: Option<RefName>,
    /// Write a commit even when no ref is named.
    pub commit: bool,
    pub message: Option<String>,
    /// Overrides the `user@host` default.
    pub author: Option<String>,
    /// Commit time; the moment of commit if unset.
    pub timestamp: Option<DateTime<Utc>>,
}

impl SaveConfig {
    pub fn wants_commit(&self) -> bool {
        self.commit || self.ref_name.is_some()
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(DEFAULT_MESSAGE)
    }

    pub fn with_ref(mut self, name: RefName) -> Self {
        self.ref_name = Some(name);
        self
    }

    pub fn with_smaller(mut self, limit: u64) -> Self {
        self.smaller = Some(limit);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether a file of `size` bytes is over the ceiling.
    pub fn too_large(&self, size: u64) -> Option<u64> {
        self.smaller.filter(|limit| size >= *limit)
    }
}
