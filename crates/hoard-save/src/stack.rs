//! Tree assembly stack.
//!
//! Holds one [`Frame`] per directory on the path from `/` to the directory
//! of the current entry. Leaves are appended to the top frame; leaving a
//! directory pops its frame, writes (or reuses) its tree and appends the
//! result to the parent frame. Memory is proportional to path depth, not to
//! the number of entries.

use hoard_store::{EntryMode, ObjectStore, Tree, TreeEntry};
use hoard_types::ObjectId;
use tracing::trace;

use crate::error::{SaveError, SaveResult};

/// An open directory and the children collected for it so far.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Directory name; empty for `/`.
    pub name: String,
    pub pending: Vec<TreeEntry>,
    /// Some entry below this directory was left out of the snapshot.
    pub skipped: bool,
}

impl Frame {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: Vec::new(),
            skipped: false,
        }
    }
}

/// Result of closing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ascended {
    /// A subdirectory's tree, already recorded in its parent frame.
    Child(ObjectId),
    /// The stack is empty; this is the snapshot's root tree.
    Root(ObjectId),
}

impl Ascended {
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Child(id) | Self::Root(id) => *id,
        }
    }
}

#[derive(Debug, Default)]
pub struct TreeStack {
    frames: Vec<Frame>,
    max_depth: usize,
    trees_written: u64,
}

impl TreeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open frames, counting `/`.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Trees added to the store so far. Trees the store already held are not
    /// counted.
    pub fn trees_written(&self) -> u64 {
        self.trees_written
    }

    /// Names of the open directories below `/`, outermost first.
    pub fn open_path(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().skip(1).map(|f| f.name.as_str())
    }

    /// Whether anything below the top frame was left out.
    pub fn top_skipped(&self) -> bool {
        self.frames.last().is_some_and(|f| f.skipped)
    }

    /// Flag the top frame as incomplete. Closing it carries the flag to the
    /// parent.
    pub fn mark_skipped(&mut self) {
        if let Some(top) = self.frames.last_mut() {
            top.skipped = true;
        }
    }

    pub fn descend(&mut self, name: impl Into<String>) {
        self.frames.push(Frame::new(name));
        self.max_depth = self.max_depth.max(self.frames.len());
    }

    /// Close the top frame. With `reuse`, that tree id stands for the
    /// directory and its pending children are discarded; otherwise a tree is
    /// written from them.
    pub fn ascend(
        &mut self,
        store: &dyn ObjectStore,
        reuse: Option<ObjectId>,
    ) -> SaveResult<Ascended> {
        let frame = self.frames.pop().ok_or(SaveError::StackUnderflow)?;
        let id = match reuse {
            Some(id) => id,
            None => self.write_tree(store, frame.pending)?,
        };
        trace!(dir = %frame.name, tree = %id.short_hex(), reused = reuse.is_some(), "ascend");
        match self.frames.last_mut() {
            Some(parent) => {
                parent.skipped |= frame.skipped;
                parent
                    .pending
                    .push(TreeEntry::new(EntryMode::Directory, frame.name, id));
                Ok(Ascended::Child(id))
            }
            None => Ok(Ascended::Root(id)),
        }
    }

    /// Append a file-like child to the top frame.
    pub fn record_leaf(
        &mut self,
        mode: EntryMode,
        name: impl Into<String>,
        id: ObjectId,
    ) -> SaveResult<()> {
        let top = self.frames.last_mut().ok_or(SaveError::StackUnderflow)?;
        top.pending.push(TreeEntry::new(mode, name, id));
        Ok(())
    }

    /// Make the open path equal `target`: close frames that are not on it,
    /// then open the missing components. Opens `/` if the stack is empty.
    pub fn align(&mut self, store: &dyn ObjectStore, target: &[&str]) -> SaveResult<()> {
        if self.frames.is_empty() {
            self.descend("");
        }
        while !self.is_prefix_of(target) {
            self.ascend(store, None)?;
        }
        let open = self.frames.len() - 1;
        for name in &target[open..] {
            self.descend(*name);
        }
        Ok(())
    }

    fn write_tree(
        &mut self,
        store: &dyn ObjectStore,
        entries: Vec<TreeEntry>,
    ) -> SaveResult<ObjectId> {
        let object = Tree::new(entries).to_stored_object()?;
        let id = object.compute_id();
        if !store.exists(&id)? {
            store.write(&object)?;
            self.trees_written += 1;
        }
        Ok(id)
    }

    fn is_prefix_of(&self, target: &[&str]) -> bool {
        let open = self.frames.len().saturating_sub(1);
        open <= target.len() && self.open_path().zip(target).all(|(a, b)| a == *b)
    }

    /// Close every remaining frame and return the root tree. An untouched
    /// stack yields the empty tree.
    pub fn finish(&mut self, store: &dyn ObjectStore) -> SaveResult<ObjectId> {
        if self.frames.is_empty() {
            return self.write_tree(store, Vec::new());
        }
        loop {
            if let Ascended::Root(id) = self.ascend(store, None)? {
                return Ok(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_store::InMemoryObjectStore;
    use proptest::prelude::*;

    fn leaf(s: &str) -> ObjectId {
        ObjectId::from_bytes(s.as_bytes())
    }

    #[test]
    fn builds_nested_trees() {
        let store = InMemoryObjectStore::new();
        let mut stack = TreeStack::new();
        stack.align(&store, &["a"]).unwrap();
        stack.record_leaf(EntryMode::Regular, "x", leaf("x")).unwrap();
        stack.align(&store, &["b"]).unwrap();
        stack.record_leaf(EntryMode::Regular, "y", leaf("y")).unwrap();
        let root = stack.finish(&store).unwrap();

        let tree = store.read_tree(&root).unwrap().unwrap();
        assert_eq!(tree.names(), vec!["a", "b"]);
        let a = tree.get("a").unwrap();
        assert_eq!(a.mode, EntryMode::Directory);
        let a_tree = store.read_tree(&a.object_id).unwrap().unwrap();
        assert_eq!(a_tree.get("x").unwrap().object_id, leaf("x"));
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.trees_written(), 3);
    }

    #[test]
    fn reuse_skips_the_write() {
        let store = InMemoryObjectStore::new();
        let mut stack = TreeStack::new();
        stack.align(&store, &["a"]).unwrap();
        let old = leaf("old-tree");
        assert_eq!(stack.ascend(&store, Some(old)).unwrap(), Ascended::Child(old));
        assert_eq!(store.len(), 0);
        let root = stack.ascend(&store, None).unwrap();
        let Ascended::Root(root) = root else {
            panic!("expected root");
        };
        let tree = store.read_tree(&root).unwrap().unwrap();
        assert_eq!(tree.get("a").unwrap().object_id, old);
    }

    #[test]
    fn underflow_is_an_error() {
        let store = InMemoryObjectStore::new();
        let mut stack = TreeStack::new();
        assert!(matches!(
            stack.ascend(&store, None),
            Err(SaveError::StackUnderflow)
        ));
        assert!(matches!(
            stack.record_leaf(EntryMode::Regular, "x", leaf("x")),
            Err(SaveError::StackUnderflow)
        ));
    }

    #[test]
    fn empty_stack_finishes_with_empty_tree() {
        let store = InMemoryObjectStore::new();
        let mut stack = TreeStack::new();
        let root = stack.finish(&store).unwrap();
        assert!(store.read_tree(&root).unwrap().unwrap().is_empty());
        assert_eq!(stack.trees_written(), 1);
    }

    #[test]
    fn trees_already_stored_are_not_counted() {
        let store = InMemoryObjectStore::new();
        store.create_tree(Vec::new()).unwrap();
        let mut stack = TreeStack::new();
        stack.finish(&store).unwrap();
        assert_eq!(stack.trees_written(), 0);

        stack.align(&store, &["a"]).unwrap();
        stack.record_leaf(EntryMode::Regular, "x", leaf("x")).unwrap();
        stack.finish(&store).unwrap();
        assert_eq!(stack.trees_written(), 2);

        stack.align(&store, &["a"]).unwrap();
        stack.record_leaf(EntryMode::Regular, "x", leaf("x")).unwrap();
        stack.finish(&store).unwrap();
        assert_eq!(stack.trees_written(), 2);
    }

    #[test]
    fn skip_flag_travels_to_every_ancestor() {
        let store = InMemoryObjectStore::new();
        let mut stack = TreeStack::new();
        stack.align(&store, &["a", "b"]).unwrap();
        stack.mark_skipped();
        assert!(stack.top_skipped());
        stack.align(&store, &["a", "c"]).unwrap();
        assert!(!stack.top_skipped());
        stack.ascend(&store, None).unwrap();
        assert!(stack.top_skipped());
        stack.ascend(&store, None).unwrap();
        assert!(stack.top_skipped());
    }

    #[test]
    fn align_reopens_only_what_changed() {
        let store = InMemoryObjectStore::new();
        let mut stack = TreeStack::new();
        stack.align(&store, &["a", "b", "c"]).unwrap();
        assert_eq!(stack.depth(), 4);
        stack.align(&store, &["a", "d"]).unwrap();
        assert_eq!(stack.open_path().collect::<Vec<_>>(), vec!["a", "d"]);
        stack.align(&store, &[]).unwrap();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.max_depth(), 4);
    }

    fn dir_paths() -> impl Strategy<Value = Vec<Vec<String>>> {
        prop::collection::vec(
            prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 0..6),
            1..40,
        )
        .prop_map(|paths| {
            let mut paths: Vec<Vec<String>> = paths
                .into_iter()
                .map(|p| p.into_iter().map(String::from).collect())
                .collect();
            paths.sort();
            paths
        })
    }

    proptest! {
        #[test]
        fn depth_never_exceeds_path_depth(paths in dir_paths()) {
            let store = InMemoryObjectStore::new();
            let mut stack = TreeStack::new();
            let deepest = paths.iter().map(Vec::len).max().unwrap_or(0);
            for dirs in &paths {
                let target: Vec<&str> = dirs.iter().map(String::as_str).collect();
                stack.align(&store, &target).unwrap();
                prop_assert_eq!(stack.depth(), target.len() + 1);
                stack.record_leaf(EntryMode::Regular, "f", leaf("f")).unwrap();
            }
            prop_assert!(stack.max_depth() <= deepest + 1);
            stack.finish(&store).unwrap();
            prop_assert_eq!(stack.depth(), 0);
        }
    }
}
