//! On-disk repository: objects, refs, index and configuration under one
//! directory.
//!
//! ```text
//! <repo>/config.toml
//! <repo>/index
//! <repo>/objects/ab/cdef...
//! <repo>/refs/heads/<name>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use hoard_index::{Index, PathKey, ScanReport};
use hoard_refs::{FsRefStore, RefName, RefStore};
use hoard_save::{Progress, SaveConfig, SaveReport, Saver};
use hoard_store::{Commit, LooseObjectStore, ObjectStore, Tree};
use hoard_types::ObjectId;
use tracing::{debug, info};

use crate::config::RepoConfig;
use crate::error::{SdkError, SdkResult};
use crate::options::SaveOptions;

/// Environment variable naming the repository directory.
pub const REPO_ENV: &str = "HOARD_DIR";

const CONFIG_FILE: &str = "config.toml";
const INDEX_FILE: &str = "index";
const OBJECTS_DIR: &str = "objects";

/// An opened repository.
pub struct Repository {
    root: PathBuf,
    config: RepoConfig,
    store: LooseObjectStore,
    refs: FsRefStore,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .finish()
    }
}

impl Repository {
    /// Pick the repository directory: `explicit` if given, else `$HOARD_DIR`.
    pub fn locate(explicit: Option<PathBuf>) -> SdkResult<PathBuf> {
        explicit
            .or_else(|| std::env::var_os(REPO_ENV).map(PathBuf::from))
            .ok_or(SdkError::NoLocation(REPO_ENV))
    }

    /// Create a new repository at `root`.
    pub fn init(root: impl Into<PathBuf>) -> SdkResult<Self> {
        let root = root.into();
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(SdkError::AlreadyInitialized(root));
        }
        fs::create_dir_all(&root)?;
        RepoConfig::default().write(&config_path)?;
        info!(root = %root.display(), "repository initialized");
        Self::open(root)
    }

    /// Open an existing repository.
    pub fn open(root: impl Into<PathBuf>) -> SdkResult<Self> {
        let root = root.into();
        let config_path = root.join(CONFIG_FILE);
        if !config_path.is_file() {
            return Err(SdkError::NotInitialized(root));
        }
        let config = RepoConfig::load(&config_path)?;
        let store = LooseObjectStore::open(root.join(OBJECTS_DIR))?;
        let refs = FsRefStore::open(&root)?;
        Ok(Self {
            root,
            config,
            store,
            refs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ObjectStore {
        &self.store
    }

    pub fn refs(&self) -> &dyn RefStore {
        &self.refs
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn load_index(&self) -> SdkResult<Index> {
        Ok(Index::load(&self.index_path())?)
    }

    // ---- Index operations ----

    /// Scan `paths` into the index.
    pub fn update_index(&self, paths: &[PathBuf]) -> SdkResult<ScanReport> {
        let mut index = self.load_index()?;
        let report = index.scan(paths)?;
        index.save(&self.index_path())?;
        Ok(report)
    }

    // ---- Save ----

    /// Snapshot `paths` (which must already be indexed).
    ///
    /// The index is written back even when the save fails, so records for
    /// content stored before the failure are not lost.
    pub fn save(
        &self,
        paths: &[PathBuf],
        options: &SaveOptions,
        progress: &mut dyn Progress,
    ) -> SdkResult<SaveReport> {
        if paths.is_empty() {
            return Err(SdkError::InvalidOperation("no paths to save".into()));
        }
        let mut index = self.load_index()?;
        let roots = paths
            .iter()
            .map(|p| -> SdkResult<PathKey> { Ok(index.resolve(&fs::canonicalize(p)?)?) })
            .collect::<SdkResult<Vec<PathKey>>>()?;
        let config = self.save_config(options)?;
        debug!(roots = roots.len(), ref_name = ?config.ref_name, "starting save");

        let result = Saver::new(&self.store, &self.refs, config).save(&mut index, &roots, progress);
        index.save(&self.index_path())?;
        Ok(result?)
    }

    fn save_config(&self, options: &SaveOptions) -> SdkResult<SaveConfig> {
        let ref_name = options
            .name
            .as_deref()
            .map(RefName::branch)
            .transpose()?;
        Ok(SaveConfig {
            smaller: options.smaller.or(self.config.save.smaller),
            split: self.config.split.clone(),
            ref_name,
            commit: options.commit,
            message: options.message.clone(),
            author: self.config.save.author.clone(),
            timestamp: None,
        })
    }

    // ---- Inspection ----

    pub fn list_refs(&self) -> SdkResult<Vec<(RefName, ObjectId)>> {
        Ok(self.refs.list_refs()?)
    }

    /// Resolve a branch name, or a hex object id, to an object id.
    pub fn resolve(&self, rev: &str) -> SdkResult<ObjectId> {
        if let Ok(id) = rev.parse::<ObjectId>() {
            return Ok(id);
        }
        let name = RefName::branch(rev)?;
        self.refs
            .read_ref(&name)?
            .ok_or_else(|| SdkError::ObjectNotFound(rev.to_string()))
    }

    pub fn read_commit(&self, id: &ObjectId) -> SdkResult<Commit> {
        self.store
            .read_commit(id)?
            .ok_or_else(|| SdkError::ObjectNotFound(id.to_hex()))
    }

    /// The tree for `id`, following a commit to its root tree.
    pub fn read_tree(&self, id: &ObjectId) -> SdkResult<Tree> {
        let object = self
            .store
            .read(id)?
            .ok_or_else(|| SdkError::ObjectNotFound(id.to_hex()))?;
        match object.kind {
            hoard_store::ObjectKind::Commit => {
                let commit = Commit::from_stored_object(&object)?;
                self.read_tree(&commit.tree)
            }
            _ => Ok(Tree::from_stored_object(&object)?),
        }
    }
}
