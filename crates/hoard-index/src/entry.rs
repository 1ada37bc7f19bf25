//! Index entry types: one record per path seen by a scan.

use serde::{Deserialize, Serialize};

use hoard_store::EntryMode;
use hoard_types::ObjectId;

use crate::path::PathKey;
use crate::status::EntryStatus;

const S_IFMT: u32 = 0o170_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFREG: u32 = 0o100_000;
const S_IFLNK: u32 = 0o120_000;
const S_IFIFO: u32 = 0o010_000;

/// Kind of filesystem object an entry was scanned as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    /// Devices, sockets, FIFOs.
    Other,
}

/// The subset of `lstat` output used to detect changes between scans.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatInfo {
    /// Raw POSIX mode (type and permission bits).
    pub mode: u32,
    pub size: u64,
    pub mtime_ns: i64,
    pub ctime_ns: i64,
    pub ino: u64,
    pub dev: u64,
}

impl StatInfo {
    /// Capture the change-detection fields of `meta` (from `symlink_metadata`).
    #[cfg(unix)]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            mode: meta.mode(),
            size: meta.size(),
            mtime_ns: meta.mtime() * 1_000_000_000 + meta.mtime_nsec(),
            ctime_ns: meta.ctime() * 1_000_000_000 + meta.ctime_nsec(),
            ino: meta.ino(),
            dev: meta.dev(),
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let file_type = meta.file_type();
        let kind = if file_type.is_dir() {
            S_IFDIR | 0o755
        } else if file_type.is_symlink() {
            S_IFLNK | 0o777
        } else {
            S_IFREG | 0o644
        };
        let mtime_ns = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_nanos() as i64);
        Self {
            mode: kind,
            size: meta.len(),
            mtime_ns,
            ctime_ns: mtime_ns,
            ino: 0,
            dev: 0,
        }
    }

    /// A regular, non-executable file of `size` bytes.
    pub fn regular(size: u64) -> Self {
        Self::with_mode(S_IFREG | 0o644, size)
    }

    pub fn directory() -> Self {
        Self::with_mode(S_IFDIR | 0o755, 0)
    }

    pub fn symlink(target_len: u64) -> Self {
        Self::with_mode(S_IFLNK | 0o777, target_len)
    }

    pub fn fifo() -> Self {
        Self::with_mode(S_IFIFO | 0o644, 0)
    }

    pub fn with_mode(mode: u32, size: u64) -> Self {
        Self {
            mode,
            size,
            ..Self::default()
        }
    }

    pub fn kind(&self) -> FileKind {
        match self.mode & S_IFMT {
            S_IFREG => FileKind::Regular,
            S_IFDIR => FileKind::Directory,
            S_IFLNK => FileKind::Symlink,
            _ => FileKind::Other,
        }
    }

    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }
}

/// An entry in the staging index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Normalised absolute path; directories end in `/`.
    pub path: PathKey,
    pub stat: StatInfo,
    /// Object recorded for this path by the last save, or the null id.
    pub content_id: ObjectId,
    /// Tree mode the recorded object was stored with.
    pub tree_mode: Option<EntryMode>,
    /// `false` once the path has disappeared from disk.
    pub exists: bool,
    /// Set when the path (or, for directories, anything below it) changed
    /// since `content_id` was recorded.
    pub stale: bool,
}

impl IndexEntry {
    /// A freshly seen path: nothing recorded yet.
    pub fn new(path: PathKey, stat: StatInfo) -> Self {
        Self {
            path,
            stat,
            content_id: ObjectId::null(),
            tree_mode: None,
            exists: true,
            stale: true,
        }
    }

    /// An entry that already carries a valid record, as left by a save.
    pub fn recorded(path: PathKey, stat: StatInfo, id: ObjectId, mode: EntryMode) -> Self {
        Self {
            content_id: id,
            tree_mode: Some(mode),
            stale: false,
            ..Self::new(path, stat)
        }
    }

    pub fn is_dir(&self) -> bool {
        self.path.is_dir()
    }

    pub fn kind(&self) -> FileKind {
        self.stat.kind()
    }

    pub fn size(&self) -> u64 {
        self.stat.size
    }

    /// The recorded object, if any.
    pub fn content_id(&self) -> Option<ObjectId> {
        self.content_id.non_null()
    }

    /// Change status relative to the last save.
    pub fn status(&self) -> EntryStatus {
        if !self.exists {
            EntryStatus::Deleted
        } else if !self.stale {
            EntryStatus::Unchanged
        } else if self.content_id.is_null() {
            EntryStatus::Added
        } else {
            EntryStatus::Modified
        }
    }

    /// Whether `stat` differs from what was recorded in any field that
    /// signals a content change.
    pub fn stat_changed(&self, stat: &StatInfo) -> bool {
        self.stat != *stat
    }
}
