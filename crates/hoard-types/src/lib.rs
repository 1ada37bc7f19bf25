//! Foundation types for hoard.
//!
//! Every other hoard crate depends on `hoard-types`. It deliberately holds
//! very little: the content-addressed [`ObjectId`] that names blobs, trees
//! and commits, and the [`TypeError`] raised when parsing one.

pub mod error;
pub mod object;

pub use error::TypeError;
pub use object::ObjectId;
