use hoard_types::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"hoard-blob-v1"`) that is fed to
/// BLAKE3 ahead of the payload. The tag is part of the on-disk format: changing
/// it changes every object id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for file content and chunk blobs.
    pub const BLOB: Self = Self::new("hoard-blob-v1");
    /// Hasher for directory listings and chunk trees.
    pub const TREE: Self = Self::new("hoard-tree-v1");
    /// Hasher for snapshot commits.
    pub const COMMIT: Self = Self::new("hoard-commit-v1");

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Check that `data` hashes to `expected` under this domain.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
