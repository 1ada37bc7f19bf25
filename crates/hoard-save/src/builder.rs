//! Per-entry commit logic.
//!
//! [`SnapshotBuilder`] consumes index entries in post-order, decides for each
//! whether to reuse its recorded object or store it afresh, and feeds the
//! result into a [`TreeStack`]. It knows nothing about cursors or progress;
//! the driver owns those.

use std::fs::{self, File};
use std::path::Path;

use hoard_index::{EntryStatus, FileKind, IndexEntry, PathKey};
use hoard_store::{EntryMode, HashSplitter, ObjectStore, SplitError};
use hoard_types::ObjectId;
use tracing::{debug, trace, warn};

use crate::config::SaveConfig;
use crate::error::{SaveError, SaveResult, SoftError, SoftErrorKind};
use crate::oracle::{Decision, ValidityOracle};
use crate::report::SaveStats;
use crate::stack::{Ascended, TreeStack};

/// A reuse record to write back into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Writeback {
    pub path: PathKey,
    pub mode: EntryMode,
    pub id: ObjectId,
}

/// What processing one entry produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Processed {
    pub writeback: Option<Writeback>,
    /// The entry existed and could not be reused.
    pub needed_work: bool,
}

/// Everything left once the stream is exhausted.
#[derive(Debug, Clone)]
pub struct Built {
    pub tree: ObjectId,
    pub soft_errors: Vec<SoftError>,
    pub stats: SaveStats,
}

pub struct SnapshotBuilder<'a> {
    store: &'a dyn ObjectStore,
    oracle: &'a dyn ValidityOracle,
    config: &'a SaveConfig,
    splitter: HashSplitter,
    stack: TreeStack,
    root: Option<ObjectId>,
    last: Option<PathKey>,
    soft_errors: Vec<SoftError>,
    stats: SaveStats,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        oracle: &'a dyn ValidityOracle,
        config: &'a SaveConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            config,
            splitter: HashSplitter::new(config.split.clone()),
            stack: TreeStack::new(),
            root: None,
            last: None,
            soft_errors: Vec::new(),
            stats: SaveStats::default(),
        }
    }

    pub fn soft_errors(&self) -> &[SoftError] {
        &self.soft_errors
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Process the next entry. Entries must arrive in strictly increasing
    /// path order; `on_bytes` observes file content as it is read.
    pub fn process(
        &mut self,
        entry: &IndexEntry,
        on_bytes: &mut dyn FnMut(u64),
    ) -> SaveResult<Processed> {
        self.check_order(&entry.path)?;
        self.stats.entries += 1;

        let decision = self.oracle.classify(entry);
        log_status(entry, &decision);

        if !entry.exists {
            self.stats.deleted += 1;
            return Ok(Processed::default());
        }
        let needed_work = !decision.is_reusable();

        self.stack.align(self.store, &entry.path.dir_components())?;

        if entry.is_dir() {
            let reuse = decision.reused_id();
            let incomplete = self.stack.top_skipped();
            let ascended = self.stack.ascend(self.store, reuse)?;
            if let Ascended::Root(id) = ascended {
                self.root = Some(id);
            }
            if reuse.is_some() {
                self.stats.reused += 1;
                return Ok(Processed::default());
            }
            if incomplete {
                // Left stale so the next save revisits the skipped entries.
                debug!(dir = %entry.path, "directory incomplete; not recorded");
                return Ok(Processed {
                    writeback: None,
                    needed_work,
                });
            }
            return Ok(Processed {
                writeback: Some(Writeback {
                    path: entry.path.clone(),
                    mode: EntryMode::Directory,
                    id: ascended.id(),
                }),
                needed_work,
            });
        }

        let name = entry.path.name();
        if let Decision::Reusable { content_id, mode } = decision {
            self.stack.record_leaf(mode, name, content_id)?;
            self.stats.reused += 1;
            return Ok(Processed::default());
        }

        let stored = if let Some(limit) = self.config.too_large(entry.size()) {
            self.soft(
                entry,
                SoftErrorKind::TooLarge {
                    size: entry.size(),
                    limit,
                },
            );
            None
        } else {
            match entry.kind() {
                FileKind::Regular => self.store_file(entry, on_bytes)?,
                FileKind::Symlink => self.store_link(entry)?,
                FileKind::Directory => {
                    return Err(SaveError::UnexpectedDirectory(entry.path.clone()))
                }
                FileKind::Other => {
                    self.soft(entry, SoftErrorKind::SpecialFile);
                    None
                }
            }
        };

        let Some((mode, id)) = stored else {
            return Ok(Processed {
                writeback: None,
                needed_work,
            });
        };
        self.stack.record_leaf(mode, name, id)?;
        Ok(Processed {
            writeback: Some(Writeback {
                path: entry.path.clone(),
                mode,
                id,
            }),
            needed_work,
        })
    }

    /// Close the remaining directories and return the root tree.
    pub fn finish(mut self) -> SaveResult<Built> {
        let tree = match self.root {
            Some(id) => id,
            None => self.stack.finish(self.store)?,
        };
        self.stats.trees_written = self.stack.trees_written();
        self.stats.max_depth = self.stack.max_depth();
        Ok(Built {
            tree,
            soft_errors: self.soft_errors,
            stats: self.stats,
        })
    }

    fn check_order(&mut self, path: &PathKey) -> SaveResult<()> {
        if let Some(previous) = &self.last {
            if path <= previous {
                return Err(SaveError::OutOfOrder {
                    previous: previous.clone(),
                    current: path.clone(),
                });
            }
        }
        self.last = Some(path.clone());
        Ok(())
    }

    fn store_file(
        &mut self,
        entry: &IndexEntry,
        on_bytes: &mut dyn FnMut(u64),
    ) -> SaveResult<Option<(EntryMode, ObjectId)>> {
        let mut file = match File::open(Path::new(entry.path.as_str())) {
            Ok(file) => file,
            Err(e) => {
                self.soft(entry, SoftErrorKind::Unreadable(e.to_string()));
                return Ok(None);
            }
        };
        let executable = entry.stat.is_executable();
        match self
            .splitter
            .split_to_blob_or_tree(self.store, &mut file, executable, on_bytes)
        {
            Ok(outcome) => {
                self.stats.files_stored += 1;
                self.stats.chunks += outcome.chunks as u64;
                self.stats.bytes_stored += outcome.size;
                Ok(Some((outcome.mode, outcome.id)))
            }
            Err(SplitError::Read(e)) => {
                self.soft(entry, SoftErrorKind::Unreadable(e.to_string()));
                Ok(None)
            }
            Err(SplitError::Store(e)) => Err(e.into()),
        }
    }

    fn store_link(&mut self, entry: &IndexEntry) -> SaveResult<Option<(EntryMode, ObjectId)>> {
        match fs::read_link(Path::new(entry.path.as_str())) {
            Ok(target) => {
                let id = self.store.create_blob(target.as_os_str().as_encoded_bytes())?;
                self.stats.files_stored += 1;
                Ok(Some((EntryMode::Symlink, id)))
            }
            Err(e) => {
                self.soft(entry, SoftErrorKind::UnreadableLink(e.to_string()));
                Ok(None)
            }
        }
    }

    fn soft(&mut self, entry: &IndexEntry, kind: SoftErrorKind) {
        let error = SoftError {
            path: entry.path.clone(),
            kind,
        };
        warn!("{error}");
        self.soft_errors.push(error);
        self.stack.mark_skipped();
    }
}

fn log_status(entry: &IndexEntry, decision: &Decision) {
    let status = match entry.status() {
        EntryStatus::Unchanged if !decision.is_reusable() => EntryStatus::Modified,
        status => status,
    };
    if entry.is_dir() {
        debug!("{} {}", status.letter(), entry.path);
    } else {
        trace!("{} {}", status.letter(), entry.path);
    }
}
