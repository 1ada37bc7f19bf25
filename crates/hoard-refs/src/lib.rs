//! Named refs for hoard.
//!
//! A ref maps a name such as `refs/heads/laptop` to the latest snapshot
//! commit saved under it. Refs are the only mutable state in a repository and
//! they move only through compare-and-swap, so two `save` runs racing on the
//! same name cannot silently drop one another's commit.
//!
//! # Modules
//!
//! - [`error`] -- Error types for ref operations
//! - [`types`] -- [`RefName`], the validated fully qualified name
//! - [`names`] -- Branch name validation
//! - [`traits`] -- The [`RefStore`] trait
//! - [`memory`] -- In-memory [`InMemoryRefStore`] for tests
//! - [`fs`] -- [`FsRefStore`], one lock-protected file per ref

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use fs::FsRefStore;
pub use memory::InMemoryRefStore;
pub use names::validate_branch_name;
pub use traits::RefStore;
pub use types::{RefName, HEADS_PREFIX};
