//! Index path keys and their post-order.
//!
//! Keys are absolute, `/`-separated and normalised. Directories carry a
//! trailing `/`, so `/` itself is the root directory. Keys compare component
//! by component, with a directory's empty trailing component sorting after
//! every name. Every entry therefore precedes the directory that contains it:
//!
//! ```text
//! /a/x  <  /a/y  <  /a/  <  /b/z  <  /b/  <  /
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// A normalised index path ordered children-first.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathKey(String);

impl PathKey {
    /// Wrap an already-normalised key.
    pub fn new(key: impl Into<String>) -> IndexResult<Self> {
        let key = key.into();
        validate(&key)?;
        Ok(Self(key))
    }

    /// Key for a filesystem path. `is_dir` adds the trailing slash.
    pub fn from_path(path: &Path, is_dir: bool) -> IndexResult<Self> {
        let mut key = String::from("/");
        let mut first = true;
        for component in path.components() {
            match component {
                Component::RootDir => {}
                Component::Normal(name) => {
                    let name = name
                        .to_str()
                        .ok_or_else(|| IndexError::InvalidPath(path.display().to_string()))?;
                    if !first {
                        key.push('/');
                    }
                    key.push_str(name);
                    first = false;
                }
                _ => return Err(IndexError::InvalidPath(path.display().to_string())),
            }
        }
        if !path.has_root() {
            return Err(IndexError::InvalidPath(path.display().to_string()));
        }
        if is_dir && !first {
            key.push('/');
        }
        Ok(Self(key))
    }

    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_dir(&self) -> bool {
        self.0.ends_with('/')
    }

    /// The containing directory's key, `None` for `/`.
    pub fn parent(&self) -> Option<PathKey> {
        if self.0 == "/" {
            return None;
        }
        let trimmed = self.0.strip_suffix('/').unwrap_or(&self.0);
        let cut = trimmed.rfind('/')?;
        Some(Self(trimmed[..=cut].to_string()))
    }

    /// Final name component; empty for `/`.
    pub fn name(&self) -> &str {
        let trimmed = self.0.strip_suffix('/').unwrap_or(&self.0);
        trimmed.rsplit('/').next().unwrap_or("")
    }

    /// Names of the directories leading to this entry, outermost first. For a
    /// directory the list includes the directory itself.
    pub fn dir_components(&self) -> Vec<&str> {
        let trimmed = self.0.trim_start_matches('/');
        let mut parts: Vec<&str> = trimmed.split('/').collect();
        // Files drop their own name; directories drop the empty tail.
        parts.pop();
        parts
    }

    /// Whether `self` is `other` or lies below it.
    pub fn is_within(&self, other: &PathKey) -> bool {
        if other.is_dir() {
            self.0.starts_with(&other.0)
        } else {
            self.0 == other.0
        }
    }

    /// Every directory strictly above this entry, innermost first.
    pub fn ancestors(&self) -> impl Iterator<Item = PathKey> {
        std::iter::successors(self.parent(), PathKey::parent)
    }
}

fn validate(key: &str) -> IndexResult<()> {
    let invalid = || IndexError::InvalidPath(key.to_string());
    let rest = key.strip_prefix('/').ok_or_else(invalid)?;
    if rest.is_empty() {
        return Ok(());
    }
    let body = rest.strip_suffix('/').unwrap_or(rest);
    if body
        .split('/')
        .any(|c| c.is_empty() || c == "." || c == "..")
    {
        return Err(invalid());
    }
    Ok(())
}

// A directory's empty tail outranks every real name.
fn rank(component: &str) -> (bool, &str) {
    (component.is_empty(), component)
}

/// Post-order comparison of two normalised keys.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    let mut left = a.trim_start_matches('/').split('/');
    let mut right = b.trim_start_matches('/').split('/');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x == y => continue,
            (Some(x), Some(y)) => return rank(x).cmp(&rank(y)),
        }
    }
}

impl Ord for PathKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_keys(&self.0, &other.0)
    }
}

impl PartialOrd for PathKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathKey({:?})", self.0)
    }
}

impl AsRef<str> for PathKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
