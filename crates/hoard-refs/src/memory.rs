//! In-memory reference store for tests and embedding.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use hoard_types::ObjectId;

use crate::error::Result;
use crate::traits::RefStore;
use crate::types::RefName;

/// An in-memory implementation of [`RefStore`]. Data is lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<BTreeMap<RefName, ObjectId>>,
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally point `name` at `target`. Test fixture helper for
    /// simulating a concurrent writer.
    pub fn force(&self, name: &RefName, target: ObjectId) {
        self.refs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), target);
    }
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &RefName) -> Result<Option<ObjectId>> {
        let refs = self.refs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(refs.get(name).copied())
    }

    fn compare_and_swap(
        &self,
        name: &RefName,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<bool> {
        let mut refs = self.refs.write().unwrap_or_else(PoisonError::into_inner);
        if refs.get(name).copied() != expected {
            return Ok(false);
        }
        refs.insert(name.clone(), new);
        Ok(true)
    }

    fn delete_ref(&self, name: &RefName) -> Result<bool> {
        let mut refs = self.refs.write().unwrap_or_else(PoisonError::into_inner);
        Ok(refs.remove(name).is_some())
    }

    fn list_refs(&self) -> Result<Vec<(RefName, ObjectId)>> {
        let refs = self.refs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(refs.iter().map(|(k, v)| (k.clone(), *v)).collect())
    }
}
