//! Caller-facing options for a save.

use hoard_save::DEFAULT_MESSAGE;

/// What a `save` should produce beyond the root tree.
#[derive(Clone, Debug, Default)]
pub struct SaveOptions {
    /// Branch to advance. Implies a commit.
    pub name: Option<String>,
    /// Write a commit even without a branch.
    pub commit: bool,
    /// Overrides the repository's configured size ceiling.
    pub smaller: Option<u64>,
    pub message: Option<String>,
}

impl SaveOptions {
    pub fn branch(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Commit message recording the command line that produced a snapshot.
pub fn command_message(argv: &[String]) -> String {
    format!("{DEFAULT_MESSAGE}\n\nGenerated by command:\n{argv:?}")
}
