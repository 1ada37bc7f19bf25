//! File-backed reference store.
//!
//! Each ref is a file at `<root>/<refname>` holding the hex commit id and a
//! newline. Updates take `<file>.lock` with an exclusive create, compare the
//! current value, write the new value into the lock file and rename it over
//! the ref. A crashed writer leaves a stale lock behind, which blocks further
//! updates until it is removed by hand.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use hoard_types::ObjectId;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RefError, Result};
use crate::traits::RefStore;
use crate::types::RefName;

#[derive(Debug, Clone)]
pub struct FsRefStore {
    root: PathBuf,
}

/// Removes the lock file on drop unless it was renamed into place.
struct LockGuard {
    path: PathBuf,
    file: Option<File>,
}

impl LockGuard {
    fn acquire(ref_path: &Path, name: &RefName) -> Result<Self> {
        let path = lock_path(ref_path);
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RefError::Locked {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    fn commit(mut self, ref_path: &Path, target: ObjectId) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{}", target.to_hex())?;
            file.sync_all()?;
        }
        fs::rename(&self.path, ref_path)?;
        self.file = None;
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.file.is_some() {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn lock_path(ref_path: &Path) -> PathBuf {
    let mut name = ref_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

impl FsRefStore {
    /// Open a ref store rooted at `root` (the directory that contains `refs/`).
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("refs").join("heads"))?;
        Ok(Self { root })
    }

    fn ref_path(&self, name: &RefName) -> PathBuf {
        name.as_str()
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn read_path(path: &Path, name: &RefName) -> Result<Option<ObjectId>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        ObjectId::from_hex(text.trim())
            .map(Some)
            .map_err(|e| RefError::Corrupt {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

impl RefStore for FsRefStore {
    fn read_ref(&self, name: &RefName) -> Result<Option<ObjectId>> {
        Self::read_path(&self.ref_path(name), name)
    }

    fn compare_and_swap(
        &self,
        name: &RefName,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<bool> {
        let path = self.ref_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock = LockGuard::acquire(&path, name)?;
        let current = Self::read_path(&path, name)?;
        if current != expected {
            debug!(%name, ?expected, ?current, "ref moved; refusing update");
            return Ok(false);
        }
        lock.commit(&path, new)?;
        debug!(%name, target = %new.short_hex(), "ref updated");
        Ok(true)
    }

    fn delete_ref(&self, name: &RefName) -> Result<bool> {
        let path = self.ref_path(name);
        let _lock = LockGuard::acquire(&path, name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_refs(&self) -> Result<Vec<(RefName, ObjectId)>> {
        let mut out = Vec::new();
        for full in collect_ref_files(&self.root.join("refs").join("heads"))? {
            let Ok(name) = RefName::parse(&full) else {
                continue;
            };
            if let Some(target) = self.read_ref(&name)? {
                out.push((name, target));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

/// Slash-joined names of every ref file below `refs/heads`, skipping lock
/// files.
fn collect_ref_files(heads: &Path) -> Result<Vec<String>> {
    if !heads.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in WalkDir::new(heads).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() || entry.file_name().to_string_lossy().ends_with(".lock") {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(heads) else {
            continue;
        };
        let mut name = String::from("refs/heads");
        for part in rel.components() {
            name.push('/');
            name.push_str(&part.as_os_str().to_string_lossy());
        }
        names.push(name);
    }
    Ok(names)
}
