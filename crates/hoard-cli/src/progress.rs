//! The `Saving: ...` line drawn on stderr during `hoard save`.

use std::io::{self, Write};
use std::time::Duration;

use hoard_save::{format_eta, EtaSmoother, Progress, ProgressSnapshot, SavePhase};

const REDRAW_EVERY: Duration = Duration::from_millis(100);

#[derive(Default)]
pub struct TermProgress {
    eta: EtaSmoother,
    last: Option<ProgressSnapshot>,
    drawn_at: Option<Duration>,
}

impl TermProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn draw(&self, line: &str, end: &str) {
        let mut err = io::stderr().lock();
        let _ = write!(err, "\r{line}{end}");
        let _ = err.flush();
    }
}

impl Progress for TermProgress {
    fn phase(&mut self, phase: SavePhase) {
        match phase {
            SavePhase::Scanning => self.draw("Reading index...", ""),
            SavePhase::Finalizing => {
                let last = self.last.unwrap_or_default();
                self.draw(&format!("{}, done.", progress_line(&last, None)), "    \n");
            }
            SavePhase::Failed if self.last.is_some() => self.draw("", "\n"),
            _ => {}
        }
    }

    fn update(&mut self, snapshot: &ProgressSnapshot) {
        self.last = Some(*snapshot);
        let due = self
            .drawn_at
            .map_or(true, |at| snapshot.elapsed >= at + REDRAW_EVERY);
        if !due {
            return;
        }
        self.drawn_at = Some(snapshot.elapsed);
        let eta = self.eta.smooth(snapshot);
        self.draw(&progress_line(snapshot, eta), "  ");
    }
}

/// `Saving: 42.00% (420/1000k, 3/10 files) 2m5 120k/s`
pub fn progress_line(snapshot: &ProgressSnapshot, eta: Option<Duration>) -> String {
    let mut line = format!(
        "Saving: {:.2}% ({}/{}k, {}/{} files)",
        snapshot.percent(),
        snapshot.bytes_done / 1024,
        snapshot.bytes_total / 1024,
        snapshot.files_done,
        snapshot.files_total,
    );
    if let Some(eta) = eta {
        line.push(' ');
        line.push_str(&format_eta(eta));
    }
    if let Some(rate) = snapshot.rate_kib_per_sec() {
        line.push_str(&format!(" {rate}k/s"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn early_line_has_no_rate() {
        let snapshot = ProgressSnapshot {
            files_done: 3,
            files_total: 10,
            bytes_done: 420 * 1024,
            bytes_total: 1000 * 1024,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(
            progress_line(&snapshot, None),
            "Saving: 42.00% (420/1000k, 3/10 files)"
        );
    }

    #[test]
    fn late_line_shows_eta_and_rate() {
        let snapshot = ProgressSnapshot {
            files_done: 3,
            files_total: 10,
            bytes_done: 6000 * 1024,
            bytes_total: 12000 * 1024,
            elapsed: Duration::from_secs(60),
        };
        let eta = snapshot.remaining();
        assert_eq!(
            progress_line(&snapshot, eta),
            "Saving: 50.00% (6000/12000k, 3/10 files) 1m0 100k/s"
        );
    }
}
