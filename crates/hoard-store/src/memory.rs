use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hoard_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store for tests and embedding.
///
/// A poisoned lock is recovered rather than propagated: the map only ever
/// gains complete, immutable objects, so a panic elsewhere cannot leave it
/// half-updated.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> RwLockReadGuard<'_, HashMap<ObjectId, StoredObject>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn objects_mut(&self) -> RwLockWriteGuard<'_, HashMap<ObjectId, StoredObject>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    /// Number of stored objects of the given kind.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.objects().values().filter(|o| o.kind == kind).count()
    }

    /// Sorted list of every stored id.
    pub fn all_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.objects().keys().copied().collect();
        ids.sort();
        ids
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        Ok(self.objects().get(id).cloned())
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        self.objects_mut()
            .entry(id)
            .or_insert_with(|| object.clone());
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.objects().contains_key(id))
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.objects_mut().remove(id).is_some())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Commit, EntryMode, Tree, TreeEntry};

    #[test]
    fn create_blob_and_read_back() {
        let store = InMemoryObjectStore::new();
        let id = store.create_blob(b"hello world").unwrap();
        let obj = store.read(&id).unwrap().expect("blob should exist");
        assert_eq!(obj.kind, ObjectKind::Blob);
        assert_eq!(obj.data, b"hello world");
        assert_eq!(obj.compute_id(), id);
    }

    #[test]
    fn same_content_is_stored_once() {
        let store = InMemoryObjectStore::new();
        let a = store.create_blob(b"dup").unwrap();
        let b = store.create_blob(b"dup").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn create_tree_and_read_tree() {
        let store = InMemoryObjectStore::new();
        let blob = store.create_blob(b"content").unwrap();
        let tree_id = store
            .create_tree(vec![TreeEntry::new(EntryMode::Regular, "f", blob)])
            .unwrap();
        let tree = store.read_tree(&tree_id).unwrap().unwrap();
        assert_eq!(tree.get("f").unwrap().object_id, blob);
        assert_eq!(store.count(ObjectKind::Tree), 1);
        assert_eq!(store.count(ObjectKind::Blob), 1);
    }

    #[test]
    fn read_tree_rejects_blob() {
        let store = InMemoryObjectStore::new();
        let blob = store.create_blob(b"not a tree").unwrap();
        assert!(store.read_tree(&blob).is_err());
    }

    #[test]
    fn read_tree_missing_is_none() {
        let store = InMemoryObjectStore::new();
        assert!(store
            .read_tree(&ObjectId::from_bytes(b"nope"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn create_commit_and_read_commit() {
        let store = InMemoryObjectStore::new();
        let tree = store.create_tree(Vec::new()).unwrap();
        let commit = Commit::new(None, tree, "first");
        let id = store.create_commit(&commit).unwrap();
        assert_eq!(store.read_commit(&id).unwrap(), Some(commit));
    }

    #[test]
    fn exists_and_delete() {
        let store = InMemoryObjectStore::new();
        let id = store.create_blob(b"gone soon").unwrap();
        assert!(store.exists(&id).unwrap());
        assert!(store.delete(&id).unwrap());
        assert!(!store.exists(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
    }

    #[test]
    fn all_ids_sorted() {
        let store = InMemoryObjectStore::new();
        for data in [&b"c"[..], b"a", b"b"] {
            store.create_blob(data).unwrap();
        }
        let ids = store.all_ids();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn empty_tree_is_a_real_object() {
        let store = InMemoryObjectStore::new();
        let id = store.create_tree(Vec::new()).unwrap();
        assert_eq!(store.read_tree(&id).unwrap(), Some(Tree::empty()));
    }

    #[test]
    fn debug_reports_count() {
        let store = InMemoryObjectStore::new();
        store.create_blob(b"x").unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("object_count: 1"));
    }
}
