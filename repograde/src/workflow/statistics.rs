//! Run statistics
//!
//! Counters updated by the coordinator's driving loop as each job
//! terminates, and reported at the end of every run.

use crate::models::JobOutcome;
use serde::{Deserialize, Serialize};

/// **Run Statistics**
///
/// Display: "Processed X of Y"
/// - X = admitted jobs that reached a terminal outcome
/// - Y = admitted jobs (cached jobs are never admitted)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Jobs admitted to the worker pool
    pub total: usize,
    /// Admitted jobs that finished, whatever the outcome
    pub completed: usize,
    /// Result artifacts written this run
    pub graded: usize,
    /// Snapshots produced by a fetch-only run
    pub fetched: usize,
    /// Jobs skipped before admission because their artifact existed
    pub cached: usize,
    pub fetch_failed: usize,
    pub grading_failed: usize,
}

impl ProcessingStats {
    pub fn display_string(&self) -> String {
        format!("Processed {} of {}", self.completed, self.total)
    }

    /// Count a skipped (pre-admission) job
    pub fn record_skip(&mut self) {
        self.cached += 1;
    }

    /// Count one admitted job reaching a terminal outcome
    pub fn record(&mut self, outcome: &JobOutcome) {
        self.completed += 1;
        match outcome {
            JobOutcome::Cached => self.cached += 1,
            JobOutcome::Fetched => self.fetched += 1,
            JobOutcome::Graded(_) => self.graded += 1,
            JobOutcome::FetchFailed { .. } => self.fetch_failed += 1,
            JobOutcome::GradingFailed { .. } => self.grading_failed += 1,
        }
    }

    pub fn failures(&self) -> usize {
        self.fetch_failed + self.grading_failed
    }

    /// "x/y" progress field for log lines
    pub fn progress(&self) -> String {
        format!("{}/{}", self.completed, self.total)
    }
}
