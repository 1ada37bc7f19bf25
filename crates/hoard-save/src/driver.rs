//! The snapshot driver.
//!
//! A save makes two passes over the same filtered index stream. The estimate
//! pass only classifies entries, to size the work for progress display. The
//! commit pass runs every entry through a [`SnapshotBuilder`], writing reuse
//! records back into the index as it goes. Finalize writes the commit and
//! moves the named ref with a compare-and-swap against the value read when
//! the save started.

use std::time::Instant;

use hoard_index::{EntryCursor, Index, IndexEntry, PathKey};
use hoard_refs::RefStore;
use hoard_store::{Commit, ObjectStore};
use hoard_types::ObjectId;
use tracing::{info, warn};

use crate::builder::SnapshotBuilder;
use crate::config::SaveConfig;
use crate::error::{SaveError, SaveResult};
use crate::oracle::{StoreOracle, ValidityOracle};
use crate::progress::{Progress, ProgressSnapshot, SavePhase};
use crate::report::{Estimate, SaveReport};

/// Runs saves against one object store and ref store.
pub struct Saver<'a> {
    store: &'a dyn ObjectStore,
    refs: &'a dyn RefStore,
    config: SaveConfig,
}

impl<'a> Saver<'a> {
    pub fn new(store: &'a dyn ObjectStore, refs: &'a dyn RefStore, config: SaveConfig) -> Self {
        Self {
            store,
            refs,
            config,
        }
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    /// Count the entries under `roots` that the commit pass will visit and
    /// how much of them needs re-reading. Writes nothing.
    pub fn estimate(&self, index: &Index, roots: &[PathKey]) -> Estimate {
        let oracle = StoreOracle::new(self.store);
        let mut estimate = Estimate::default();
        for entry in index.sorted_entries(roots, |e| !oracle.classify(e).is_reusable()) {
            estimate.total_files += 1;
            if entry.exists && !oracle.classify(&entry).is_reusable() {
                estimate.files += 1;
                estimate.bytes += entry.size();
            }
        }
        estimate
    }

    /// Snapshot everything under `roots`.
    ///
    /// Per-entry problems end up in [`SaveReport::soft_errors`]; anything
    /// returned as `Err` aborted the save. Reuse records written before an
    /// abort stay in `index`.
    pub fn save(
        &self,
        index: &mut Index,
        roots: &[PathKey],
        progress: &mut dyn Progress,
    ) -> SaveResult<SaveReport> {
        let result = self.run(index, roots, progress);
        match &result {
            Ok(_) => progress.phase(SavePhase::Done),
            Err(e) => {
                warn!(error = %e, "save failed");
                progress.phase(SavePhase::Failed);
            }
        }
        result
    }

    fn run(
        &self,
        index: &mut Index,
        roots: &[PathKey],
        progress: &mut dyn Progress,
    ) -> SaveResult<SaveReport> {
        let old_ref = match &self.config.ref_name {
            Some(name) => self.refs.read_ref(name)?,
            None => None,
        };

        progress.phase(SavePhase::Scanning);
        let estimate = self.estimate(index, roots);
        info!(
            files = estimate.files,
            bytes = estimate.bytes,
            total = estimate.total_files,
            "index read"
        );

        progress.phase(SavePhase::Committing);
        let oracle = StoreOracle::new(self.store);
        let mut builder = SnapshotBuilder::new(self.store, &oracle, &self.config);
        let mut tracker = Tracker::new(estimate, progress);
        let mut cursor = EntryCursor::new(roots.iter().cloned());
        let mut recurse = |e: &IndexEntry| !oracle.classify(e).is_reusable();

        while let Some(entry) = cursor.next_entry(index, &mut recurse) {
            let processed = builder.process(&entry, &mut |n| tracker.add_bytes(n))?;
            if let Some(writeback) = processed.writeback {
                index.persist(&writeback.path, writeback.mode, writeback.id)?;
            }
            let done = if processed.needed_work { entry.size() } else { 0 };
            tracker.entry_done(done);
        }

        tracker.progress.phase(SavePhase::Finalizing);
        let built = builder.finish()?;
        let commit = self.finalize(built.tree, old_ref)?;
        info!(
            tree = %built.tree.short_hex(),
            reused = built.stats.reused,
            stored = built.stats.files_stored,
            errors = built.soft_errors.len(),
            "snapshot written"
        );
        Ok(SaveReport {
            tree: built.tree,
            commit,
            soft_errors: built.soft_errors,
            estimate,
            stats: built.stats,
        })
    }

    fn finalize(&self, tree: ObjectId, old_ref: Option<ObjectId>) -> SaveResult<Option<ObjectId>> {
        if !self.config.wants_commit() {
            return Ok(None);
        }
        let mut commit = Commit::new(old_ref, tree, self.config.message());
        if let Some(author) = &self.config.author {
            commit = commit.with_author(author.clone());
        }
        if let Some(timestamp) = self.config.timestamp {
            commit = commit.with_timestamp(timestamp);
        }
        let id = self.store.create_commit(&commit)?;

        if let Some(name) = &self.config.ref_name {
            if !self.refs.compare_and_swap(name, old_ref, id)? {
                return Err(SaveError::RefMoved {
                    name: name.clone(),
                    expected: old_ref,
                    commit: id,
                });
            }
            info!(%name, commit = %id.short_hex(), "ref updated");
        }
        Ok(Some(id))
    }
}

/// Turns per-entry events into progress snapshots.
struct Tracker<'p> {
    progress: &'p mut dyn Progress,
    start: Instant,
    files_done: u64,
    files_total: u64,
    bytes_done: u64,
    bytes_in_flight: u64,
    bytes_total: u64,
}

impl<'p> Tracker<'p> {
    fn new(estimate: Estimate, progress: &'p mut dyn Progress) -> Self {
        Self {
            progress,
            start: Instant::now(),
            files_done: 0,
            files_total: estimate.total_files,
            bytes_done: 0,
            bytes_in_flight: 0,
            bytes_total: estimate.bytes,
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            files_done: self.files_done,
            files_total: self.files_total,
            bytes_done: self.bytes_done + self.bytes_in_flight,
            bytes_total: self.bytes_total,
            elapsed: self.start.elapsed(),
        }
    }

    fn add_bytes(&mut self, n: u64) {
        self.bytes_in_flight += n;
        let snapshot = self.snapshot();
        self.progress.update(&snapshot);
    }

    fn entry_done(&mut self, recorded_size: u64) {
        self.files_done += 1;
        self.bytes_done += recorded_size;
        self.bytes_in_flight = 0;
        let snapshot = self.snapshot();
        self.progress.update(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SoftErrorKind;
    use crate::progress::NoProgress;
    use hoard_index::StatInfo;
    use hoard_refs::{InMemoryRefStore, RefName};
    use hoard_store::{EntryMode, InMemoryObjectStore, ObjectKind, TreeEntry};
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::{Path, PathBuf};

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        index: Index,
        store: InMemoryObjectStore,
        refs: InMemoryRefStore,
    }

    impl Fixture {
        fn new(files: &[(&str, &[u8])]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().canonicalize().unwrap();
            for (name, data) in files {
                let path = root.join(name);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, data).unwrap();
            }
            let mut fixture = Self {
                _dir: dir,
                root,
                index: Index::new(),
                store: InMemoryObjectStore::new(),
                refs: InMemoryRefStore::new(),
            };
            fixture.rescan();
            fixture
        }

        fn rescan(&mut self) {
            self.index.scan(&[self.root.clone()]).unwrap();
        }

        fn root_key(&self) -> PathKey {
            PathKey::from_path(&self.root, true).unwrap()
        }

        fn save(&mut self, config: SaveConfig) -> SaveResult<SaveReport> {
            let roots = [self.root_key()];
            Saver::new(&self.store, &self.refs, config).save(
                &mut self.index,
                &roots,
                &mut NoProgress,
            )
        }

        fn lookup(&self, tree: ObjectId, rel: &str) -> Option<TreeEntry> {
            lookup(&self.store, tree, &self.root.join(rel))
        }

        fn blob(&self, id: &ObjectId) -> Vec<u8> {
            self.store.read(id).unwrap().unwrap().data
        }
    }

    fn lookup(store: &dyn ObjectStore, tree: ObjectId, path: &Path) -> Option<TreeEntry> {
        let key = PathKey::from_path(path, false).unwrap();
        let mut names = key.dir_components();
        names.push(key.name());
        let mut current = tree;
        let mut found = None;
        for name in names {
            let entry = store.read_tree(&current).unwrap()?.get(name)?.clone();
            current = entry.object_id;
            found = Some(entry);
        }
        found
    }

    fn main_ref() -> RefName {
        RefName::branch("main").unwrap()
    }

    fn commit_config() -> SaveConfig {
        SaveConfig::default().with_ref(main_ref())
    }

    #[test]
    fn first_save_stores_everything() {
        let mut fx = Fixture::new(&[("a.txt", b"alpha"), ("sub/b.txt", b"beta")]);
        let report = fx.save(commit_config()).unwrap();

        assert!(report.is_clean());
        let a = fx.lookup(report.tree, "a.txt").unwrap();
        assert_eq!(a.mode, EntryMode::Regular);
        assert_eq!(fx.blob(&a.object_id), b"alpha");
        let sub = fx.lookup(report.tree, "sub").unwrap();
        assert_eq!(sub.mode, EntryMode::Directory);
        let b = fx.lookup(report.tree, "sub/b.txt").unwrap();
        assert_eq!(fx.blob(&b.object_id), b"beta");

        let commit_id = report.commit.unwrap();
        assert_eq!(fx.refs.read_ref(&main_ref()).unwrap(), Some(commit_id));
        let commit = fx.store.read_commit(&commit_id).unwrap().unwrap();
        assert_eq!(commit.tree, report.tree);
        assert_eq!(commit.parent, None);
        assert_eq!(commit.message, "hoard save");

        let root = fx.root_key();
        for entry in fx.index.iter().filter(|e| e.path.is_within(&root)) {
            assert!(!entry.stale, "{}", entry.path);
            assert!(entry.tree_mode.is_some(), "{}", entry.path);
        }
        assert_eq!(report.stats.files_stored, 2);
        assert_eq!(report.estimate.files, report.stats.entries);
    }

    #[test]
    fn second_save_reuses_everything() {
        let mut fx = Fixture::new(&[("a.txt", b"alpha"), ("sub/b.txt", b"beta")]);
        let first = fx.save(commit_config()).unwrap();
        let blobs = fx.store.count(ObjectKind::Blob);
        let trees = fx.store.count(ObjectKind::Tree);

        let second = fx.save(commit_config()).unwrap();
        assert_eq!(second.tree, first.tree);
        assert_eq!(fx.store.count(ObjectKind::Blob), blobs);
        assert_eq!(fx.store.count(ObjectKind::Tree), trees);
        assert_eq!(fx.store.count(ObjectKind::Commit), 2);
        assert_eq!(second.stats.files_stored, 0);
        // The whole root directory was pruned and reused in one step.
        assert_eq!(second.stats.entries, 1);
        assert_eq!(second.estimate.files, 0);

        let commit = fx.store.read_commit(&second.commit.unwrap()).unwrap().unwrap();
        assert_eq!(commit.parent, first.commit);
    }

    #[test]
    fn rescan_without_changes_still_reuses() {
        let mut fx = Fixture::new(&[("a.txt", b"alpha")]);
        let first = fx.save(SaveConfig::default()).unwrap();
        fx.rescan();
        let second = fx.save(SaveConfig::default()).unwrap();
        assert_eq!(second.tree, first.tree);
        assert_eq!(second.stats.files_stored, 0);
        assert_eq!(first.commit, None);
    }

    #[test]
    fn changed_file_rehashes_only_its_branch() {
        let mut fx = Fixture::new(&[
            ("keep/one", b"1"),
            ("keep/two", b"2"),
            ("edit/three", b"3"),
        ]);
        let first = fx.save(SaveConfig::default()).unwrap();
        let keep_before = fx.lookup(first.tree, "keep").unwrap();

        fs::write(fx.root.join("edit/three"), b"three!").unwrap();
        fx.rescan();
        let second = fx.save(SaveConfig::default()).unwrap();

        assert_ne!(second.tree, first.tree);
        assert_eq!(fx.lookup(second.tree, "keep").unwrap(), keep_before);
        let three = fx.lookup(second.tree, "edit/three").unwrap();
        assert_eq!(fx.blob(&three.object_id), b"three!");
        assert_eq!(second.stats.files_stored, 1);
        assert!(second.stats.reused >= 1);
    }

    #[test]
    fn deleted_file_is_omitted() {
        let mut fx = Fixture::new(&[("a", b"a"), ("b", b"b")]);
        fx.save(SaveConfig::default()).unwrap();
        fs::remove_file(fx.root.join("a")).unwrap();
        fx.rescan();

        let report = fx.save(SaveConfig::default()).unwrap();
        assert!(fx.lookup(report.tree, "a").is_none());
        assert!(fx.lookup(report.tree, "b").is_some());
        assert_eq!(report.stats.deleted, 1);
    }

    #[test]
    fn deleting_everything_leaves_empty_directory() {
        let mut fx = Fixture::new(&[("d/x", b"x")]);
        fx.save(SaveConfig::default()).unwrap();
        fs::remove_dir_all(fx.root.join("d")).unwrap();
        fx.rescan();

        let report = fx.save(SaveConfig::default()).unwrap();
        let root_entry = lookup(&fx.store, report.tree, &fx.root).unwrap();
        let listing = fx.store.read_tree(&root_entry.object_id).unwrap().unwrap();
        assert!(listing.is_empty());
    }

    #[test]
    fn only_deleted_entries_yield_empty_root_tree() {
        let store = InMemoryObjectStore::new();
        let refs = InMemoryRefStore::new();
        let mut index = Index::new();
        for path in ["/gone/", "/gone/f"] {
            let stat = if path.ends_with('/') {
                StatInfo::directory()
            } else {
                StatInfo::regular(1)
            };
            let mut entry = IndexEntry::new(PathKey::new(path).unwrap(), stat);
            entry.exists = false;
            index.insert(entry);
        }
        let report = Saver::new(&store, &refs, SaveConfig::default())
            .save(&mut index, &[PathKey::root()], &mut NoProgress)
            .unwrap();
        assert_eq!(report.tree, store.create_tree(Vec::new()).unwrap());
        assert_eq!(report.stats.deleted, 2);
    }

    #[test]
    fn oversized_file_is_skipped_softly() {
        let mut fx = Fixture::new(&[("small", b"ok"), ("big", &[7u8; 64])]);
        let report = fx.save(SaveConfig::default().with_smaller(32)).unwrap();

        assert_eq!(report.soft_errors.len(), 1);
        assert!(matches!(
            report.soft_errors[0].kind,
            SoftErrorKind::TooLarge { size: 64, limit: 32 }
        ));
        assert!(fx.lookup(report.tree, "big").is_none());
        assert!(fx.lookup(report.tree, "small").is_some());
        // Skipped files are not recorded, so they are retried next time.
        let big = PathKey::from_path(&fx.root.join("big"), false).unwrap();
        assert!(fx.index.get(&big).unwrap().stale);
    }

    #[test]
    fn skipped_file_is_picked_up_without_rescan() {
        let mut fx = Fixture::new(&[("small", b"ok"), ("big", &[7u8; 64])]);
        let first = fx.save(SaveConfig::default().with_smaller(32)).unwrap();
        assert!(fx.lookup(first.tree, "big").is_none());
        assert!(fx.index.get(&fx.root_key()).unwrap().stale);

        let second = fx.save(SaveConfig::default()).unwrap();
        assert!(second.soft_errors.is_empty());
        let big = fx.lookup(second.tree, "big").unwrap();
        assert_eq!(fx.blob(&big.object_id), vec![7u8; 64]);
        assert!(fx.lookup(second.tree, "small").is_some());
        assert_eq!(second.stats.files_stored, 1);
    }

    #[test]
    fn unreadable_and_special_files_do_not_abort() {
        let mut fx = Fixture::new(&[("vanishes", b"v"), ("stays", b"s")]);
        fs::remove_file(fx.root.join("vanishes")).unwrap();
        let fifo = PathKey::from_path(&fx.root.join("pipe"), false).unwrap();
        fx.index.insert(IndexEntry::new(fifo, StatInfo::fifo()));

        let report = fx.save(commit_config()).unwrap();
        let kinds: Vec<_> = report.soft_errors.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[0], SoftErrorKind::SpecialFile));
        assert!(matches!(kinds[1], SoftErrorKind::Unreadable(_)));
        assert!(fx.lookup(report.tree, "stays").is_some());
        assert!(report.commit.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_and_executables_keep_their_modes() {
        use std::os::unix::fs::PermissionsExt;

        let mut fx = Fixture::new(&[("run.sh", b"#!/bin/sh\n")]);
        fs::set_permissions(fx.root.join("run.sh"), fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("run.sh", fx.root.join("link")).unwrap();
        fx.rescan();

        let report = fx.save(SaveConfig::default()).unwrap();
        assert_eq!(
            fx.lookup(report.tree, "run.sh").unwrap().mode,
            EntryMode::Executable
        );
        let link = fx.lookup(report.tree, "link").unwrap();
        assert_eq!(link.mode, EntryMode::Symlink);
        assert_eq!(fx.blob(&link.object_id), b"run.sh");
    }

    /// Moves the ref right after the save reads it.
    struct RacingRefs {
        inner: InMemoryRefStore,
        racer: ObjectId,
    }

    impl RefStore for RacingRefs {
        fn read_ref(&self, name: &RefName) -> hoard_refs::Result<Option<ObjectId>> {
            let current = self.inner.read_ref(name)?;
            self.inner.force(name, self.racer);
            Ok(current)
        }

        fn compare_and_swap(
            &self,
            name: &RefName,
            expected: Option<ObjectId>,
            new: ObjectId,
        ) -> hoard_refs::Result<bool> {
            self.inner.compare_and_swap(name, expected, new)
        }

        fn delete_ref(&self, name: &RefName) -> hoard_refs::Result<bool> {
            self.inner.delete_ref(name)
        }

        fn list_refs(&self) -> hoard_refs::Result<Vec<(RefName, ObjectId)>> {
            self.inner.list_refs()
        }
    }

    #[test]
    fn moved_ref_is_fatal_and_orphans_the_commit() {
        let fx = Fixture::new(&[("a", b"a")]);
        let mut index = fx.index.clone();
        let racer = ObjectId::from_bytes(b"someone else");
        let refs = RacingRefs {
            inner: InMemoryRefStore::new(),
            racer,
        };

        let err = Saver::new(&fx.store, &refs, commit_config())
            .save(&mut index, &[fx.root_key()], &mut NoProgress)
            .unwrap_err();
        let SaveError::RefMoved { commit, expected, .. } = err else {
            panic!("expected RefMoved, got {err:?}");
        };
        assert_eq!(expected, None);
        assert!(fx.store.exists(&commit).unwrap());
        assert_eq!(refs.read_ref(&main_ref()).unwrap(), Some(racer));
    }

    #[derive(Default)]
    struct Recorder {
        phases: Vec<SavePhase>,
        last: Option<ProgressSnapshot>,
    }

    impl Progress for Recorder {
        fn phase(&mut self, phase: SavePhase) {
            self.phases.push(phase);
        }

        fn update(&mut self, snapshot: &ProgressSnapshot) {
            self.last = Some(*snapshot);
        }
    }

    #[test]
    fn progress_sees_phases_and_completion() {
        let mut fx = Fixture::new(&[("a", b"aaaa"), ("b", b"bb")]);
        let mut recorder = Recorder::default();
        let roots = [fx.root_key()];
        let report = Saver::new(&fx.store, &fx.refs, SaveConfig::default())
            .save(&mut fx.index, &roots, &mut recorder)
            .unwrap();

        assert_eq!(
            recorder.phases,
            vec![
                SavePhase::Scanning,
                SavePhase::Committing,
                SavePhase::Finalizing,
                SavePhase::Done
            ]
        );
        let last = recorder.last.unwrap();
        assert_eq!(last.files_done, report.estimate.total_files);
        assert_eq!(last.bytes_done, last.bytes_total);
    }

    #[test]
    fn failure_reports_failed_phase() {
        let fx = Fixture::new(&[("a", b"a")]);
        let mut index = fx.index.clone();
        let refs = RacingRefs {
            inner: InMemoryRefStore::new(),
            racer: ObjectId::from_bytes(b"r"),
        };
        let mut recorder = Recorder::default();
        let _ = Saver::new(&fx.store, &refs, commit_config()).save(
            &mut index,
            &[fx.root_key()],
            &mut recorder,
        );
        assert_eq!(recorder.phases.last(), Some(&SavePhase::Failed));
    }

    /// An index holding `files` (already stored, reusable) and a stale
    /// directory entry for every directory above them.
    fn synthetic_index(
        store: &InMemoryObjectStore,
        files: &BTreeSet<String>,
        reverse: bool,
    ) -> Index {
        let mut entries = Vec::new();
        let mut dirs = BTreeSet::new();
        for path in files {
            let key = PathKey::new(path.as_str()).unwrap();
            let id = store.create_blob(path.as_bytes()).unwrap();
            dirs.extend(key.ancestors());
            entries.push(IndexEntry::recorded(
                key,
                StatInfo::regular(path.len() as u64),
                id,
                EntryMode::Regular,
            ));
        }
        entries.extend(
            dirs.into_iter()
                .map(|dir| IndexEntry::new(dir, StatInfo::directory())),
        );
        if reverse {
            entries.reverse();
        }
        let mut index = Index::new();
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    #[test]
    fn insertion_order_does_not_change_the_tree() {
        let files: BTreeSet<String> = ["/a/x", "/a/b/y", "/c/z", "/top"]
            .into_iter()
            .map(String::from)
            .collect();
        let store = InMemoryObjectStore::new();
        let refs = InMemoryRefStore::new();
        let saver = Saver::new(&store, &refs, SaveConfig::default());

        let mut forward = synthetic_index(&store, &files, false);
        let mut backward = synthetic_index(&store, &files, true);
        let roots = [PathKey::root()];
        let one = saver.save(&mut forward, &roots, &mut NoProgress).unwrap();
        let two = saver.save(&mut backward, &roots, &mut NoProgress).unwrap();
        assert_eq!(one.tree, two.tree);
        assert_eq!(
            lookup(&store, one.tree, Path::new("/a/b/y")).unwrap().object_id,
            store.create_blob(b"/a/b/y").unwrap()
        );
    }

    fn file_sets() -> impl Strategy<Value = BTreeSet<String>> {
        let dirs = prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 0..6);
        let name = prop::sample::select(vec!["f", "g", "h"]);
        prop::collection::btree_set(
            (dirs, name).prop_map(|(dirs, name)| {
                let mut path = String::from("/");
                for dir in dirs {
                    path.push_str(dir);
                    path.push('/');
                }
                path.push_str(name);
                path
            }),
            1..30,
        )
    }

    proptest! {
        #[test]
        fn random_trees_reassemble_with_bounded_depth(files in file_sets()) {
            let store = InMemoryObjectStore::new();
            let refs = InMemoryRefStore::new();
            let mut index = synthetic_index(&store, &files, false);
            let report = Saver::new(&store, &refs, SaveConfig::default())
                .save(&mut index, &[PathKey::root()], &mut NoProgress)
                .unwrap();

            let deepest = files
                .iter()
                .map(|p| PathKey::new(p.as_str()).unwrap().dir_components().len())
                .max()
                .unwrap_or(0);
            prop_assert!(report.stats.max_depth <= deepest + 1);
            for path in &files {
                let found = lookup(&store, report.tree, Path::new(path)).unwrap();
                prop_assert_eq!(found.object_id, store.create_blob(path.as_bytes()).unwrap());
            }
            prop_assert!(report.is_clean());
            prop_assert_eq!(report.stats.reused as usize, files.len());
        }
    }
}
