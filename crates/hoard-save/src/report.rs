//! What a save produced.

use hoard_types::ObjectId;

use crate::error::SoftError;

/// Work predicted by the estimate pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Estimate {
    /// Entries that cannot be reused.
    pub files: u64,
    /// Recorded size of those entries.
    pub bytes: u64,
    /// Every entry the commit pass will visit.
    pub total_files: u64,
}

/// Counters from the commit pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveStats {
    pub entries: u64,
    /// Files and directories whose recorded object was used as-is.
    pub reused: u64,
    /// Files and symlinks stored afresh.
    pub files_stored: u64,
    pub chunks: u64,
    pub bytes_stored: u64,
    /// Trees added to the store; trees it already held are not counted.
    pub trees_written: u64,
    /// Deleted entries skipped.
    pub deleted: u64,
    /// Deepest the tree stack got, counting `/`.
    pub max_depth: usize,
}

#[derive(Clone, Debug)]
pub struct SaveReport {
    /// Root tree of the snapshot.
    pub tree: ObjectId,
    /// The commit, if one was requested.
    pub commit: Option<ObjectId>,
    pub soft_errors: Vec<SoftError>,
    pub estimate: Estimate,
    pub stats: SaveStats,
}

impl SaveReport {
    /// No entry was skipped.
    pub fn is_clean(&self) -> bool {
        self.soft_errors.is_empty()
    }
}
