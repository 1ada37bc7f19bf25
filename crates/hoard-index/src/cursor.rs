//! Post-order traversal with directory pruning.
//!
//! [`EntryCursor`] holds only owned state (the roots, the last key returned
//! and the recursion decisions for the directories on the current path), so a
//! caller can mutate the index between steps. [`SortedEntries`] wraps it as
//! an ordinary iterator for read-only passes.

use crate::entry::IndexEntry;
use crate::index::Index;
use crate::path::PathKey;

/// Resumable position in a filtered post-order walk of an [`Index`].
#[derive(Clone, Debug, Default)]
pub struct EntryCursor {
    roots: Vec<PathKey>,
    last: Option<PathKey>,
    /// Recursion decisions for directories enclosing the last entry,
    /// outermost first.
    decisions: Vec<(PathKey, bool)>,
}

impl EntryCursor {
    pub fn new(roots: impl IntoIterator<Item = PathKey>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
            last: None,
            decisions: Vec::new(),
        }
    }

    /// Advance to the next entry at or below one of the roots.
    ///
    /// `recurse` is asked once per enclosing directory. If it declines, the
    /// directory's entry is returned in place of its first descendant and the
    /// rest of the subtree is skipped.
    pub fn next_entry(
        &mut self,
        index: &Index,
        recurse: &mut dyn FnMut(&IndexEntry) -> bool,
    ) -> Option<IndexEntry> {
        loop {
            let (key, entry) = index.entry_after(self.last.as_ref())?;
            let Some(root) = self.roots.iter().find(|root| key.is_within(root)) else {
                self.last = Some(key.clone());
                continue;
            };

            let chain = enclosing_dirs(key, root);
            match first_declined(&chain, &mut self.decisions, index, recurse) {
                Some(dir) => match index.get(&dir) {
                    Some(dir_entry) => {
                        self.last = Some(dir);
                        return Some(dir_entry.clone());
                    }
                    None => {
                        self.last = Some(dir);
                        continue;
                    }
                },
                None => {
                    self.last = Some(key.clone());
                    return Some(entry.clone());
                }
            }
        }
    }
}

/// Directories strictly above `key` that are still inside `root`, outermost
/// first.
fn enclosing_dirs(key: &PathKey, root: &PathKey) -> Vec<PathKey> {
    let mut chain: Vec<PathKey> = key
        .ancestors()
        .take_while(|dir| dir.is_within(root))
        .collect();
    chain.reverse();
    chain
}

/// Outermost directory in `chain` for which recursion is declined.
fn first_declined(
    chain: &[PathKey],
    decisions: &mut Vec<(PathKey, bool)>,
    index: &Index,
    recurse: &mut dyn FnMut(&IndexEntry) -> bool,
) -> Option<PathKey> {
    let shared = decisions
        .iter()
        .zip(chain)
        .take_while(|((cached, _), dir)| cached == *dir)
        .count();
    decisions.truncate(shared);

    for dir in &chain[shared..] {
        // Directories with no entry of their own are always entered.
        let wanted = index.get(dir).map_or(true, |entry| recurse(entry));
        decisions.push((dir.clone(), wanted));
        if !wanted {
            break;
        }
    }
    decisions
        .iter()
        .find(|(_, wanted)| !wanted)
        .map(|(dir, _)| dir.clone())
}

/// Iterator over a filtered post-order walk. Yields owned entries.
pub struct SortedEntries<'a, F> {
    index: &'a Index,
    cursor: EntryCursor,
    recurse: F,
}

impl<'a, F> SortedEntries<'a, F>
where
    F: FnMut(&IndexEntry) -> bool,
{
    pub fn new(index: &'a Index, cursor: EntryCursor, recurse: F) -> Self {
        Self {
            index,
            cursor,
            recurse,
        }
    }
}

impl<F> Iterator for SortedEntries<'_, F>
where
    F: FnMut(&IndexEntry) -> bool,
{
    type Item = IndexEntry;

    fn next(&mut self) -> Option<IndexEntry> {
        self.cursor.next_entry(self.index, &mut self.recurse)
    }
}
