//! Throughput accounting over a trailing time window.
//!
//! Completion rate is measured against a rolling checkpoint rather than
//! the run start, so the ETA tracks *current* throughput: early slow
//! roots stop skewing the estimate once the window rolls past them.

use std::time::{Duration, Instant};

/// Default width of the trailing measurement window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// One progress observation, produced per completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Completions so far.
    pub done: u64,
    /// Total scheduled.
    pub total: u64,
    /// Completions per second over the trailing window.
    pub per_second: f64,
    /// Estimated time to completion at the current rate.
    pub eta: Duration,
}

/// Rolling-window progress tracker. Single-consumer: owned by whoever
/// drains the completion stream.
#[derive(Debug)]
pub struct ProgressWindow {
    total: u64,
    done: u64,
    window: Duration,
    started: Instant,
    checkpoint_done: u64,
    checkpoint_at: Instant,
}

impl ProgressWindow {
    /// Start tracking `total` scheduled completions.
    #[must_use]
    pub fn new(total: u64, window: Duration) -> Self {
        Self::starting_at(total, window, Instant::now())
    }

    /// Start tracking with an explicit clock origin.
    #[must_use]
    pub const fn starting_at(total: u64, window: Duration, now: Instant) -> Self {
        Self {
            total,
            done: 0,
            window,
            started: now,
            checkpoint_done: 0,
            checkpoint_at: now,
        }
    }

    /// Record one completion now.
    pub fn record(&mut self) -> ProgressSnapshot {
        self.record_at(Instant::now())
    }

    /// Record one completion at an explicit instant.
    pub fn record_at(&mut self, now: Instant) -> ProgressSnapshot {
        self.done += 1;

        let since_checkpoint = now.saturating_duration_since(self.checkpoint_at);
        let done_since_checkpoint = self.done - self.checkpoint_done;
        let secs_per_item = since_checkpoint.as_secs_f64() / done_since_checkpoint as f64;
        let per_second = if secs_per_item > 0.0 {
            1.0 / secs_per_item
        } else {
            f64::INFINITY
        };
        let remaining = self.total.saturating_sub(self.done);
        let eta = Duration::from_secs_f64(secs_per_item * remaining as f64);

        if since_checkpoint > self.window {
            self.checkpoint_done = self.done;
            self.checkpoint_at = now;
        }

        ProgressSnapshot {
            done: self.done,
            total: self.total,
            per_second,
            eta,
        }
    }

    /// Completions so far.
    #[must_use]
    pub const fn done(&self) -> u64 {
        self.done
    }

    /// Whole-run average throughput at an explicit instant.
    #[must_use]
    pub fn average_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        if elapsed > 0.0 {
            self.done as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Elapsed time since tracking started, at an explicit instant.
    #[must_use]
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}

/// Format a duration as `HH:MM:SS` for progress lines.
#[must_use]
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_WINDOW, ProgressWindow, format_hms};
    use std::time::{Duration, Instant};

    #[test]
    fn rate_and_eta_reflect_the_trailing_window() {
        let start = Instant::now();
        let mut window = ProgressWindow::starting_at(10, DEFAULT_WINDOW, start);

        // Two completions, one per second.
        let _ = window.record_at(start + Duration::from_secs(1));
        let snap = window.record_at(start + Duration::from_secs(2));

        assert_eq!(snap.done, 2);
        assert!((snap.per_second - 1.0).abs() < 1e-9);
        assert_eq!(snap.eta, Duration::from_secs(8));
    }

    #[test]
    fn checkpoint_rolls_after_the_window_elapses() {
        let start = Instant::now();
        let mut window = ProgressWindow::starting_at(100, Duration::from_secs(5), start);

        // A glacial first item rolls the checkpoint...
        let slow = window.record_at(start + Duration::from_secs(60));
        assert!(slow.per_second < 0.1);

        // ...so later fast items are measured against the new checkpoint,
        // not the slow start.
        let _ = window.record_at(start + Duration::from_secs(61));
        let fast = window.record_at(start + Duration::from_secs(62));
        assert!((fast.per_second - 1.0).abs() < 1e-9);
    }

    #[test]
    fn average_is_whole_run_not_window() {
        let start = Instant::now();
        let mut window = ProgressWindow::starting_at(4, DEFAULT_WINDOW, start);
        for offset in 1..=4 {
            let _ = window.record_at(start + Duration::from_secs(offset));
        }
        let average = window.average_at(start + Duration::from_secs(8));
        assert!((average - 0.5).abs() < 1e-9);
    }

    #[test]
    fn eta_is_zero_when_everything_is_done() {
        let start = Instant::now();
        let mut window = ProgressWindow::starting_at(1, DEFAULT_WINDOW, start);
        let snap = window.record_at(start + Duration::from_secs(3));
        assert_eq!(snap.eta, Duration::ZERO);
    }

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_hms(Duration::from_secs(59)), "00:00:59");
        assert_eq!(format_hms(Duration::from_secs(3600 + 61)), "01:01:01");
        assert_eq!(format_hms(Duration::from_secs(25 * 3600)), "25:00:00");
    }
}
