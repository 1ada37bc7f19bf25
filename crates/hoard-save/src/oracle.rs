//! Reuse decisions.
//!
//! An entry's recorded object can stand in for re-reading the path when the
//! entry is not stale, something was recorded, and the store still has it.

use hoard_index::IndexEntry;
use hoard_store::{EntryMode, ObjectStore};
use hoard_types::ObjectId;
use tracing::warn;

/// Outcome of classifying one entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Use the recorded object as-is.
    Reusable { content_id: ObjectId, mode: EntryMode },
    /// Content must be (re)computed.
    Stale,
}

impl Decision {
    pub fn is_reusable(&self) -> bool {
        matches!(self, Self::Reusable { .. })
    }

    pub fn reused_id(&self) -> Option<ObjectId> {
        match self {
            Self::Reusable { content_id, .. } => Some(*content_id),
            Self::Stale => None,
        }
    }
}

/// Decides whether an entry's recorded object is still good.
pub trait ValidityOracle {
    /// Pure: no writes to the index or the store.
    fn classify(&self, entry: &IndexEntry) -> Decision;
}

/// Oracle backed by an object store's existence check.
pub struct StoreOracle<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> StoreOracle<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }
}

impl ValidityOracle for StoreOracle<'_> {
    fn classify(&self, entry: &IndexEntry) -> Decision {
        if entry.stale || !entry.exists {
            return Decision::Stale;
        }
        let (Some(content_id), Some(mode)) = (entry.content_id(), entry.tree_mode) else {
            return Decision::Stale;
        };
        match self.store.exists(&content_id) {
            Ok(true) => Decision::Reusable { content_id, mode },
            Ok(false) => Decision::Stale,
            Err(e) => {
                // Re-reading the path is always safe.
                warn!(path = %entry.path, error = %e, "existence check failed");
                Decision::Stale
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_index::{PathKey, StatInfo};
    use hoard_store::InMemoryObjectStore;

    fn entry_for(id: ObjectId) -> IndexEntry {
        IndexEntry::recorded(
            PathKey::new("/f").unwrap(),
            StatInfo::regular(5),
            id,
            EntryMode::Regular,
        )
    }

    #[test]
    fn recorded_and_present_is_reusable() {
        let store = InMemoryObjectStore::new();
        let id = store.create_blob(b"hello").unwrap();
        let oracle = StoreOracle::new(&store);
        assert_eq!(
            oracle.classify(&entry_for(id)),
            Decision::Reusable {
                content_id: id,
                mode: EntryMode::Regular
            }
        );
    }

    #[test]
    fn missing_object_is_stale() {
        let store = InMemoryObjectStore::new();
        let oracle = StoreOracle::new(&store);
        assert_eq!(
            oracle.classify(&entry_for(ObjectId::from_bytes(b"gone"))),
            Decision::Stale
        );
    }

    #[test]
    fn stale_flag_wins() {
        let store = InMemoryObjectStore::new();
        let id = store.create_blob(b"hello").unwrap();
        let mut entry = entry_for(id);
        entry.stale = true;
        assert_eq!(StoreOracle::new(&store).classify(&entry), Decision::Stale);
    }

    #[test]
    fn never_hashed_is_stale() {
        let store = InMemoryObjectStore::new();
        let entry = IndexEntry::new(PathKey::new("/f").unwrap(), StatInfo::regular(1));
        assert_eq!(StoreOracle::new(&store).classify(&entry), Decision::Stale);
    }

    #[test]
    fn classify_does_not_write() {
        let store = InMemoryObjectStore::new();
        let id = store.create_blob(b"hello").unwrap();
        let oracle = StoreOracle::new(&store);
        oracle.classify(&entry_for(id));
        oracle.classify(&entry_for(ObjectId::from_bytes(b"other")));
        assert_eq!(store.len(), 1);
    }
}
