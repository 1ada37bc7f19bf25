//! Incremental snapshot commit for hoard.
//!
//! Turns the staging index into a tree of content-addressed objects, a
//! commit, and a ref update:
//!
//! 1. The estimate pass walks the filtered index and sizes the work.
//! 2. The commit pass visits entries in post-order. Each one is either
//!    reused (its recorded object is still in the store and nothing changed)
//!    or stored afresh, and lands in the [`TreeStack`] frame of its directory.
//! 3. Finalize closes the remaining frames, writes the commit and moves the
//!    ref with compare-and-swap.
//!
//! Per-entry failures become [`SoftError`]s; everything else is a
//! [`SaveError`] and aborts the save.

pub mod builder;
pub mod config;
pub mod driver;
pub mod error;
pub mod oracle;
pub mod progress;
pub mod report;
pub mod stack;

pub use builder::{Built, Processed, SnapshotBuilder, Writeback};
pub use config::{SaveConfig, DEFAULT_MESSAGE};
pub use driver::Saver;
pub use error::{SaveError, SaveResult, SoftError, SoftErrorKind};
pub use oracle::{Decision, StoreOracle, ValidityOracle};
pub use progress::{
    format_eta, EtaSmoother, LogProgress, NoProgress, Progress, ProgressSnapshot, SavePhase,
};
pub use report::{Estimate, SaveReport, SaveStats};
pub use stack::{Ascended, Frame, TreeStack};
