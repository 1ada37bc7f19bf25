//! Progress reporting for a save.
//!
//! The driver publishes immutable [`ProgressSnapshot`]s through the
//! [`Progress`] trait; rendering (or ignoring) them is up to the caller.

use std::fmt;
use std::time::Duration;

use tracing::info;

/// Rate and ETA are not shown before this much time has passed.
pub const WARMUP: Duration = Duration::from_secs(30);

/// An increasing ETA that grew by less than this fraction is ignored.
const ETA_JITTER: f64 = 0.05;

/// Where a save is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SavePhase {
    Idle,
    /// Estimate pass over the index.
    Scanning,
    /// Hashing and tree assembly.
    Committing,
    /// Root tree, commit and ref update.
    Finalizing,
    Done,
    Failed,
}

impl fmt::Display for SavePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Committing => "committing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Point-in-time counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub files_done: u64,
    pub files_total: u64,
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Share of bytes done, 0 to 100. An empty workload counts as done.
    pub fn percent(&self) -> f64 {
        if self.bytes_total == 0 {
            return 100.0;
        }
        (self.bytes_done as f64 * 100.0 / self.bytes_total as f64).min(100.0)
    }

    /// Throughput rounded down to two significant digits, once warmed up.
    pub fn rate_kib_per_sec(&self) -> Option<u64> {
        if self.elapsed < WARMUP {
            return None;
        }
        let kps = (self.bytes_done as f64 / 1024.0 / self.elapsed.as_secs_f64()) as u64;
        let digits = kps.max(1).ilog10();
        let unit = 10u64.pow(digits.saturating_sub(1));
        Some(kps / unit * unit)
    }

    /// Unsmoothed time left, extrapolated from the average rate so far.
    pub fn remaining(&self) -> Option<Duration> {
        if self.elapsed < WARMUP {
            return None;
        }
        if self.bytes_done == 0 {
            return Some(Duration::ZERO);
        }
        let left = self.bytes_total.saturating_sub(self.bytes_done) as f64;
        Some(self.elapsed.mul_f64(left / self.bytes_done as f64))
    }
}

/// Damps small upward jumps in a sequence of ETA estimates.
#[derive(Clone, Debug, Default)]
pub struct EtaSmoother {
    last: Option<Duration>,
}

impl EtaSmoother {
    pub fn smooth(&mut self, snapshot: &ProgressSnapshot) -> Option<Duration> {
        let remain = snapshot.remaining()?;
        match self.last {
            Some(last)
                if remain > last
                    && !last.is_zero()
                    && (remain - last).as_secs_f64() / last.as_secs_f64() < ETA_JITTER =>
            {
                Some(last)
            }
            _ => {
                self.last = Some(remain);
                Some(remain)
            }
        }
    }
}

/// Render a duration the way the progress line shows it: `1h2m`, `3m4`, `5s`.
pub fn format_eta(remain: Duration) -> String {
    let total = remain.as_secs();
    let (hours, mins, secs) = (total / 3600, total / 60 % 60, total % 60);
    if hours > 0 {
        format!("{hours}h{mins}m")
    } else if mins > 0 {
        format!("{mins}m{secs}")
    } else {
        format!("{secs}s")
    }
}

/// Receives phase changes and counter updates from a save.
pub trait Progress {
    fn phase(&mut self, phase: SavePhase);
    fn update(&mut self, snapshot: &ProgressSnapshot);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn phase(&mut self, _phase: SavePhase) {}
    fn update(&mut self, _snapshot: &ProgressSnapshot) {}
}

/// Logs phase changes, and counters at most once per `interval`.
#[derive(Debug)]
pub struct LogProgress {
    interval: Duration,
    next_at: Duration,
    eta: EtaSmoother,
}

impl LogProgress {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_at: Duration::ZERO,
            eta: EtaSmoother::default(),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Progress for LogProgress {
    fn phase(&mut self, phase: SavePhase) {
        info!(%phase, "save phase");
    }

    fn update(&mut self, snapshot: &ProgressSnapshot) {
        if snapshot.elapsed < self.next_at {
            return;
        }
        self.next_at = snapshot.elapsed + self.interval;
        let eta = self.eta.smooth(snapshot).map(format_eta);
        info!(
            percent = %format!("{:.2}", snapshot.percent()),
            files = snapshot.files_done,
            files_total = snapshot.files_total,
            kib = snapshot.bytes_done / 1024,
            kib_total = snapshot.bytes_total / 1024,
            rate = ?snapshot.rate_kib_per_sec(),
            eta = ?eta,
            "saving"
        );
    }
}
