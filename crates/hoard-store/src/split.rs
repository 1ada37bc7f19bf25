//! Content-defined splitting of file content into blobs.
//!
//! A rolling checksum over a 64-byte window picks chunk boundaries from the
//! content itself, so an insertion near the start of a file only changes the
//! chunks around the edit. Files that fit in one chunk become a single blob;
//! longer files become a tree of chunk blobs (mode [`EntryMode::ChunkedFile`])
//! whose entry names are zero-padded hex offsets, so name order is offset
//! order.

use std::io::{ErrorKind, Read};

use hoard_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::object::{EntryMode, TreeEntry};
use crate::traits::ObjectStore;

const WINDOW_BITS: u32 = 6;
const WINDOW_SIZE: usize = 1 << WINDOW_BITS;
const CHAR_OFFSET: u32 = 31;
const READ_BUF_SIZE: usize = 64 * 1024;
const MAX_BLOB_BITS: u32 = 30;
const MAX_BLOB_SIZE: usize = 1 << 30;

/// Tuning for the splitter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// A boundary falls where the low `blob_bits` bits of the rolling digest
    /// are all ones, giving an average chunk of `2^blob_bits` bytes.
    pub blob_bits: u32,
    /// Hard upper bound on a chunk's size.
    pub max_blob_size: usize,
    /// Chunk trees with more children than this are split into subtrees.
    pub max_tree_entries: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        let blob_bits = 13;
        Self {
            blob_bits,
            max_blob_size: 4 << blob_bits,
            max_tree_entries: 256,
        }
    }
}

impl SplitConfig {
    /// Reject settings the splitter cannot honour.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.blob_bits == 0 || self.blob_bits > MAX_BLOB_BITS {
            return Err(StoreError::InvalidConfig(format!(
                "blob_bits must be between 1 and {MAX_BLOB_BITS}, got {}",
                self.blob_bits
            )));
        }
        if self.max_blob_size == 0 || self.max_blob_size > MAX_BLOB_SIZE {
            return Err(StoreError::InvalidConfig(format!(
                "max_blob_size must be between 1 and {MAX_BLOB_SIZE}, got {}",
                self.max_blob_size
            )));
        }
        if self.max_tree_entries < 2 {
            return Err(StoreError::InvalidConfig(format!(
                "max_tree_entries must be at least 2, got {}",
                self.max_tree_entries
            )));
        }
        Ok(())
    }
}

/// Result of splitting one stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitOutcome {
    pub mode: EntryMode,
    pub id: ObjectId,
    /// Bytes consumed from the reader.
    pub size: u64,
    /// Number of chunk blobs written.
    pub chunks: usize,
}

/// Failure while splitting. Reading the source and writing the store fail
/// for different reasons and callers treat them differently.
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rolling checksum over the last [`WINDOW_SIZE`] bytes.
#[derive(Clone)]
struct Rollsum {
    s1: u32,
    s2: u32,
    window: [u8; WINDOW_SIZE],
    pos: usize,
}

impl Rollsum {
    fn new() -> Self {
        let size = WINDOW_SIZE as u32;
        Self {
            s1: size.wrapping_mul(CHAR_OFFSET),
            s2: size.wrapping_mul(size - 1).wrapping_mul(CHAR_OFFSET),
            window: [0; WINDOW_SIZE],
            pos: 0,
        }
    }

    fn roll(&mut self, byte: u8) {
        let dropped = u32::from(self.window[self.pos]);
        let added = u32::from(byte);
        self.s1 = self.s1.wrapping_add(added).wrapping_sub(dropped);
        self.s2 = self.s2.wrapping_add(self.s1).wrapping_sub(
            (WINDOW_SIZE as u32).wrapping_mul(dropped.wrapping_add(CHAR_OFFSET)),
        );
        self.window[self.pos] = byte;
        self.pos = (self.pos + 1) % WINDOW_SIZE;
    }

    fn digest(&self) -> u32 {
        (self.s1 << 16) | (self.s2 & 0xffff)
    }
}

/// Splits byte streams into blobs and chunk trees inside an [`ObjectStore`].
#[derive(Clone, Debug, Default)]
pub struct HashSplitter {
    config: SplitConfig,
}

impl HashSplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Read `reader` to the end and store its content.
    ///
    /// `on_bytes` is called with the number of bytes consumed after every read
    /// so callers can report progress inside large files.
    pub fn split_to_blob_or_tree<R: Read + ?Sized>(
        &self,
        store: &dyn ObjectStore,
        reader: &mut R,
        executable: bool,
        on_bytes: &mut dyn FnMut(u64),
    ) -> Result<SplitOutcome, SplitError> {
        // Out-of-range settings degrade to size-capped chunks.
        let mask = 1u32
            .checked_shl(self.config.blob_bits)
            .map_or(u32::MAX, |bit| bit - 1);
        let max_blob = self.config.max_blob_size.max(1);

        let mut buf = vec![0u8; READ_BUF_SIZE];
        let mut chunk = Vec::with_capacity(max_blob.min(READ_BUF_SIZE));
        let mut sum = Rollsum::new();
        let mut chunks: Vec<TreeEntry> = Vec::new();
        let mut offset = 0u64;
        let mut size = 0u64;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SplitError::Read(e)),
            };
            for &byte in &buf[..n] {
                chunk.push(byte);
                sum.roll(byte);
                if (sum.digest() & mask) == mask || chunk.len() >= max_blob {
                    let id = store.create_blob(&chunk)?;
                    chunks.push(chunk_entry(EntryMode::Regular, offset, id));
                    offset += chunk.len() as u64;
                    chunk.clear();
                    sum = Rollsum::new();
                }
            }
            size += n as u64;
            on_bytes(n as u64);
        }

        if !chunk.is_empty() || chunks.is_empty() {
            let id = store.create_blob(&chunk)?;
            chunks.push(chunk_entry(EntryMode::Regular, offset, id));
        }

        let count = chunks.len();
        if count == 1 {
            let mode = if executable {
                EntryMode::Executable
            } else {
                EntryMode::Regular
            };
            return Ok(SplitOutcome {
                mode,
                id: chunks[0].object_id,
                size,
                chunks: count,
            });
        }

        let id = self.write_chunk_tree(store, chunks)?;
        Ok(SplitOutcome {
            mode: EntryMode::ChunkedFile,
            id,
            size,
            chunks: count,
        })
    }

    /// Write `entries` as one tree, folding runs into subtrees until the top
    /// level fits in `max_tree_entries`.
    fn write_chunk_tree(
        &self,
        store: &dyn ObjectStore,
        mut entries: Vec<TreeEntry>,
    ) -> Result<ObjectId, StoreError> {
        let fanout = self.config.max_tree_entries.max(2);
        while entries.len() > fanout {
            let mut folded = Vec::with_capacity(entries.len() / fanout + 1);
            for group in entries.chunks(fanout) {
                let name = group[0].name.clone();
                let id = store.create_tree(group.to_vec())?;
                folded.push(TreeEntry::new(EntryMode::ChunkedFile, name, id));
            }
            entries = folded;
        }
        store.create_tree(entries)
    }
}

fn chunk_entry(mode: EntryMode, offset: u64, id: ObjectId) -> TreeEntry {
    TreeEntry::new(mode, format!("{offset:016x}"), id)
}
