//! Ref names.
//!
//! Snapshot sets are branches: `refs/heads/<name>` pointing at the latest
//! commit saved under that name.

use std::fmt;

use crate::error::{RefError, Result};
use crate::names::validate_branch_name;

/// Prefix under which every snapshot branch lives.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// A validated, fully qualified ref name such as `refs/heads/main`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    /// Qualify a short branch name: `main` → `refs/heads/main`.
    pub fn branch(short: &str) -> Result<Self> {
        validate_branch_name(short)?;
        Ok(Self(format!("{HEADS_PREFIX}{short}")))
    }

    /// Parse a fully qualified name.
    pub fn parse(full: &str) -> Result<Self> {
        let short = full
            .strip_prefix(HEADS_PREFIX)
            .ok_or_else(|| RefError::InvalidName {
                name: full.to_string(),
                reason: format!("must start with {HEADS_PREFIX:?}"),
            })?;
        Self::branch(short)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name without `refs/heads/`.
    pub fn short_name(&self) -> &str {
        &self.0[HEADS_PREFIX.len()..]
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
