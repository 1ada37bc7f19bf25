//! Change status of entries and scan summaries.

use std::fmt;

/// How an entry changed since the last save.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryStatus {
    /// Gone from disk.
    Deleted,
    /// Never saved.
    Added,
    /// Saved before, changed since.
    Modified,
    Unchanged,
}

impl EntryStatus {
    /// One-letter code used in verbose listings.
    pub fn letter(self) -> char {
        match self {
            Self::Deleted => 'D',
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Unchanged => ' ',
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Counts produced by [`Index::scan`](crate::Index::scan).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Paths visited on disk.
    pub scanned: usize,
    pub added: usize,
    pub modified: usize,
    /// Paths that vanished since the previous scan.
    pub deleted: usize,
    /// Deleted entries dropped after surviving one scan.
    pub pruned: usize,
    /// Paths that could not be read or named and were left out.
    pub errors: usize,
}

impl ScanReport {
    pub fn has_changes(&self) -> bool {
        self.added + self.modified + self.deleted > 0
    }
}
