//! The staging index: what the last scan saw and what the last save stored.
//!
//! [`Index`] keeps one [`IndexEntry`] per path in a `BTreeMap` ordered by
//! [`PathKey`], so iteration is always post-order. A scan refreshes stat data
//! and marks changed paths (and every directory above them) stale; a save
//! reads entries through [`EntryCursor`] and writes reuse records back with
//! [`Index::persist`].

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use hoard_store::EntryMode;
use hoard_types::ObjectId;

use crate::cursor::{EntryCursor, SortedEntries};
use crate::entry::{IndexEntry, StatInfo};
use crate::error::{IndexError, IndexResult};
use crate::path::PathKey;
use crate::status::ScanReport;

/// On-disk format version of the index file.
pub const INDEX_VERSION: u32 = 1;

#[derive(Serialize)]
struct IndexFileRef<'a> {
    version: u32,
    entries: Vec<&'a IndexEntry>,
}

#[derive(Deserialize)]
struct IndexFile {
    version: u32,
    entries: Vec<IndexEntry>,
}

/// The staging index.
#[derive(Clone, Debug, Default)]
pub struct Index {
    entries: BTreeMap<PathKey, IndexEntry>,
}

impl Index {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &PathKey) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    /// All entries in post-order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Add or replace an entry. Returns the previous entry for the path.
    pub fn insert(&mut self, entry: IndexEntry) -> Option<IndexEntry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Load an index file. A missing file yields an empty index.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let file: IndexFile = bincode::deserialize(&bytes).map_err(|e| IndexError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if file.version != INDEX_VERSION {
            return Err(IndexError::UnsupportedVersion {
                found: file.version,
                expected: INDEX_VERSION,
            });
        }
        let entries = file
            .entries
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect();
        Ok(Self { entries })
    }

    /// Write the index to `path`, replacing any previous file atomically.
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file = IndexFileRef {
            version: INDEX_VERSION,
            entries: self.entries.values().collect(),
        };
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        let mut writer = BufWriter::new(tmp);
        bincode::serialize_into(&mut writer, &file)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        writer.flush()?;
        let tmp = writer.into_inner().map_err(|e| e.into_error())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| IndexError::Io(e.error))?;
        debug!(path = %path.display(), entries = self.entries.len(), "index written");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Save support
    // ---------------------------------------------------------------

    /// Record that `path` is now stored as `content_id` with `tree_mode`, and
    /// clear its stale flag.
    pub fn persist(
        &mut self,
        path: &PathKey,
        tree_mode: EntryMode,
        content_id: ObjectId,
    ) -> IndexResult<()> {
        let entry = self
            .entries
            .get_mut(path)
            .ok_or_else(|| IndexError::PathNotFound(path.to_string()))?;
        entry.content_id = content_id;
        entry.tree_mode = Some(tree_mode);
        entry.stale = false;
        Ok(())
    }

    /// Map a filesystem path to the key it is indexed under, preferring the
    /// directory form.
    pub fn resolve(&self, path: &Path) -> IndexResult<PathKey> {
        let as_dir = PathKey::from_path(path, true)?;
        if self.entries.contains_key(&as_dir) {
            return Ok(as_dir);
        }
        let as_file = PathKey::from_path(path, false)?;
        if self.entries.contains_key(&as_file) {
            return Ok(as_file);
        }
        Err(IndexError::PathNotFound(path.display().to_string()))
    }

    /// Lazy post-order iteration over entries at or below `roots`.
    ///
    /// When `recurse` returns `false` for a directory, nothing below it is
    /// yielded; the directory entry itself still is.
    pub fn sorted_entries<F>(&self, roots: &[PathKey], recurse: F) -> SortedEntries<'_, F>
    where
        F: FnMut(&IndexEntry) -> bool,
    {
        SortedEntries::new(self, EntryCursor::new(roots.iter().cloned()), recurse)
    }

    /// First entry strictly after `last` in post-order.
    pub(crate) fn entry_after(&self, last: Option<&PathKey>) -> Option<(&PathKey, &IndexEntry)> {
        match last {
            None => self.entries.iter().next(),
            Some(key) => self
                .entries
                .range((Bound::Excluded(key), Bound::Unbounded))
                .next(),
        }
    }

    // ---------------------------------------------------------------
    // Scanning
    // ---------------------------------------------------------------

    /// Walk `roots` and refresh the index from disk.
    ///
    /// New and changed paths become stale, paths that vanished are marked
    /// `exists = false` (and dropped on the following scan), and staleness is
    /// propagated to every directory above a stale entry, up to `/`.
    pub fn scan(&mut self, roots: &[PathBuf]) -> IndexResult<ScanReport> {
        let mut report = ScanReport::default();
        let mut seen: HashSet<PathKey> = HashSet::new();
        let mut scopes = Vec::with_capacity(roots.len());
        // Directories whose listing failed; their recorded entries are kept.
        let mut unlisted: Vec<PathKey> = Vec::new();

        for root in roots {
            let root = fs::canonicalize(root)?;
            let meta = fs::symlink_metadata(&root)?;
            let root_key = PathKey::from_path(&root, meta.is_dir())?;

            for ancestor in root_key.ancestors() {
                if seen.contains(&ancestor) {
                    continue;
                }
                let meta = fs::symlink_metadata(Path::new(ancestor.as_str()))?;
                self.observe(&ancestor, StatInfo::from_metadata(&meta), &mut report);
                seen.insert(ancestor);
            }

            let mut walker = WalkDir::new(&root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter();
            while let Some(item) = walker.next() {
                let item = match item {
                    Ok(item) => item,
                    Err(e) => {
                        warn!("cannot read {}: {e}", path_of(&e));
                        report.errors += 1;
                        let dir = e.path().and_then(|p| PathKey::from_path(p, true).ok());
                        unlisted.extend(dir);
                        continue;
                    }
                };
                let meta = match item.metadata() {
                    Ok(meta) => meta,
                    Err(e) => {
                        warn!("cannot stat {}: {e}", item.path().display());
                        report.errors += 1;
                        continue;
                    }
                };
                let key = match PathKey::from_path(item.path(), meta.is_dir()) {
                    Ok(key) => key,
                    Err(e) => {
                        warn!("skipping {e}");
                        report.errors += 1;
                        if meta.is_dir() {
                            walker.skip_current_dir();
                        }
                        continue;
                    }
                };
                self.observe(&key, StatInfo::from_metadata(&meta), &mut report);
                seen.insert(key);
            }
            scopes.push(root_key);
        }

        let mut gone = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            if seen.contains(key) || !scopes.iter().any(|scope| key.is_within(scope)) {
                continue;
            }
            if unlisted.iter().any(|dir| key != dir && key.is_within(dir)) {
                continue;
            }
            if entry.exists {
                entry.exists = false;
                entry.stale = true;
                report.deleted += 1;
            } else {
                gone.push(key.clone());
            }
        }
        for key in gone {
            self.entries.remove(&key);
            report.pruned += 1;
        }

        self.propagate_staleness();
        info!(
            scanned = report.scanned,
            added = report.added,
            modified = report.modified,
            deleted = report.deleted,
            errors = report.errors,
            "index updated"
        );
        Ok(report)
    }

    fn observe(&mut self, key: &PathKey, stat: StatInfo, report: &mut ScanReport) {
        report.scanned += 1;
        match self.entries.get_mut(key) {
            Some(entry) if entry.exists && !entry.stat_changed(&stat) => {}
            Some(entry) => {
                entry.stat = stat;
                entry.exists = true;
                entry.stale = true;
                report.modified += 1;
            }
            None => {
                self.entries
                    .insert(key.clone(), IndexEntry::new(key.clone(), stat));
                report.added += 1;
            }
        }
    }

    /// Mark every directory above a stale entry stale. Post-order visits
    /// children first, so one pass suffices.
    fn propagate_staleness(&mut self) {
        let mut dirty: HashSet<PathKey> = HashSet::new();
        for (key, entry) in self.entries.iter_mut() {
            if dirty.contains(key) {
                entry.stale = true;
            }
            if entry.stale {
                for ancestor in key.ancestors() {
                    if !dirty.insert(ancestor) {
                        break;
                    }
                }
            }
        }
    }
}

fn path_of(err: &walkdir::Error) -> String {
    err.path()
        .map_or_else(|| "<unknown>".to_string(), |p| p.display().to_string())
}
