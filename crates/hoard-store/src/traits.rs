use hoard_types::ObjectId;

use crate::error::StoreResult;
use crate::object::{Blob, Commit, StoredObject, Tree, TreeEntry};

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written; the same bytes always produce the
///   same id, so a repeated write is a no-op.
/// - An object becomes visible only once it is complete. A reader never sees
///   a partially written object.
/// - I/O errors are propagated, never swallowed.
pub trait ObjectStore: Send + Sync {
    /// Read an object by id. `Ok(None)` if it does not exist.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its id.
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Delete an object. Returns `true` if it existed.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Store raw bytes as a blob.
    fn create_blob(&self, data: &[u8]) -> StoreResult<ObjectId> {
        self.write(&Blob::new(data.to_vec()).into_stored_object())
    }

    /// Store a tree built from `entries` (sorted by name before hashing).
    fn create_tree(&self, entries: Vec<TreeEntry>) -> StoreResult<ObjectId> {
        self.write(&Tree::new(entries).to_stored_object()?)
    }

    fn create_commit(&self, commit: &Commit) -> StoreResult<ObjectId> {
        self.write(&commit.to_stored_object()?)
    }

    fn read_tree(&self, id: &ObjectId) -> StoreResult<Option<Tree>> {
        self.read(id)?
            .map(|obj| Tree::from_stored_object(&obj))
            .transpose()
    }

    fn read_commit(&self, id: &ObjectId) -> StoreResult<Option<Commit>> {
        self.read(id)?
            .map(|obj| Commit::from_stored_object(&obj))
            .transpose()
    }
}
