//! The [`RefStore`] trait defining the reference storage interface.

use hoard_types::ObjectId;

use crate::error::Result;
use crate::types::RefName;

/// Storage backend for named refs.
///
/// Refs are the only mutable state in a repository. They change exclusively
/// through [`RefStore::compare_and_swap`], which makes a concurrent writer
/// visible instead of silently overwriting its work.
pub trait RefStore: Send + Sync {
    /// Current commit of `name`, or `None` if the ref does not exist.
    fn read_ref(&self, name: &RefName) -> Result<Option<ObjectId>>;

    /// Atomically set `name` to `new` if it currently holds `expected`.
    ///
    /// `expected == None` means "the ref must not exist yet". Returns
    /// `Ok(false)` without changing anything when the current value differs.
    fn compare_and_swap(
        &self,
        name: &RefName,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<bool>;

    /// Delete a ref. Returns `true` if it existed.
    fn delete_ref(&self, name: &RefName) -> Result<bool>;

    /// All refs, sorted by name.
    fn list_refs(&self) -> Result<Vec<(RefName, ObjectId)>>;
}
