//! Hashing primitives for hoard.
//!
//! Object identifiers are BLAKE3 digests prefixed with a per-kind domain tag,
//! so a blob and a tree with the same serialized bytes never collide.

pub mod hasher;

pub use hasher::ContentHasher;
