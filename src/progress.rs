//! Progress reporting: lock-free engine counters plus terminal bars

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::error::{CompareError, Result};

/// Pipeline phase, for progress events and abort context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Validate,
    Read,
    Join,
    Aggregate,
    Assemble,
    Done,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Validate,
            1 => Self::Read,
            2 => Self::Join,
            3 => Self::Aggregate,
            4 => Self::Assemble,
            _ => Self::Done,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Read => "read",
            Self::Join => "join",
            Self::Aggregate => "aggregate",
            Self::Assemble => "assemble",
            Self::Done => "done",
        }
    }
}

/// Shared progress counters. Reader threads increment, observers read;
/// atomic operations only, no locking.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    rows_read_source: AtomicU64,
    rows_read_target: AtomicU64,
    phase: AtomicU8,
}

/// Snapshot of the counters, emitted to observers.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProgressSnapshot {
    pub rows_read_source: u64,
    pub rows_read_target: u64,
    pub phase: Phase,
}

impl ProgressCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_source_rows(&self, n: u64) {
        self.rows_read_source.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_target_rows(&self, n: u64) {
        self.rows_read_target.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            rows_read_source: self.rows_read_source.load(Ordering::Relaxed),
            rows_read_target: self.rows_read_target.load(Ordering::Relaxed),
            phase: Phase::from_u8(self.phase.load(Ordering::Relaxed)),
        }
    }
}

/// Cancellation token plus overall deadline for one comparison run.
/// Checked at batch and partition boundaries.
#[derive(Debug, Clone)]
pub struct RunControl {
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new(cancel: Arc<AtomicBool>, timeout: Option<Duration>) -> Self {
        Self {
            cancel,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Fail the run if it was cancelled or ran past its deadline.
    pub fn check(&self, phase: Phase) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(CompareError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline {
                return Err(CompareError::aborted(
                    phase.name(),
                    "time budget exceeded",
                ));
            }
        }
        Ok(())
    }
}

/// Terminal progress reporter for comparison runs.
#[derive(Debug)]
pub struct ProgressReporter {
    read_pb: Option<ProgressBar>,
    join_pb: Option<ProgressBar>,
    show_progress: bool,
}

impl ProgressReporter {
    pub fn new_for_comparison() -> Self {
        Self {
            read_pb: Some(create_spinner("Reading source and target...")),
            join_pb: None,
            show_progress: true,
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            read_pb: None,
            join_pb: None,
            show_progress: false,
        }
    }

    /// Refresh the read spinner message from a counter snapshot.
    pub fn update_read(&mut self, snapshot: &ProgressSnapshot) {
        if let Some(pb) = &self.read_pb {
            pb.set_message(format!(
                "Reading... {} source rows, {} target rows",
                snapshot.rows_read_source, snapshot.rows_read_target
            ));
            pb.tick();
        }
    }

    pub fn finish_read(&mut self, message: &str) {
        if let Some(pb) = self.read_pb.take() {
            pb.finish_with_message(message.to_string());
        }
        if self.show_progress && self.join_pb.is_none() {
            self.join_pb = Some(create_spinner("Joining partitions..."));
        }
    }

    pub fn finish_join(&mut self, message: &str) {
        if let Some(pb) = self.join_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    pub fn finish_all(&mut self, message: &str) {
        self.finish_read(message);
        self.finish_join(message);
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        // Ensure all progress bars are cleaned up silently
        if let Some(pb) = self.read_pb.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = self.join_pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")
            .expect("Invalid progress template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = ProgressCounters::new();
        counters.add_source_rows(100);
        counters.add_target_rows(50);
        counters.set_phase(Phase::Read);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.rows_read_source, 100);
        assert_eq!(snapshot.rows_read_target, 50);
        assert_eq!(snapshot.phase, Phase::Read);
    }

    #[test]
    fn test_cancellation() {
        let control = RunControl::unbounded();
        assert!(control.check(Phase::Read).is_ok());

        control.cancel_token().store(true, Ordering::Relaxed);
        let err = control.check(Phase::Read).unwrap_err();
        assert_eq!(err.kind(), "cancelled");
    }

    #[test]
    fn test_deadline() {
        let control = RunControl::new(
            Arc::new(AtomicBool::new(false)),
            Some(Duration::from_secs(0)),
        );
        std::thread::sleep(Duration::from_millis(5));
        let err = control.check(Phase::Join).unwrap_err();
        assert_eq!(err.kind(), "comparison_aborted");
    }

    #[test]
    fn test_minimal_progress_reporter() {
        let reporter = ProgressReporter::new_minimal();
        assert!(reporter.read_pb.is_none());
        assert!(reporter.join_pb.is_none());
    }
}
