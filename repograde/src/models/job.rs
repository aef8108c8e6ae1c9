//! Per-identity jobs and their outcomes

use super::{GradingResponse, RepoIdentity};
use std::fmt;

/// What a submission row resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowTarget {
    /// URL field blank
    MissingUrl,
    /// URL field present but no repository URL could be extracted
    InvalidUrl,
    /// Row maps onto a repository job
    Item(RepoIdentity),
}

/// One unit of work per unique identity in a run
///
/// Lives only in memory; its result is persisted as artifacts.
#[derive(Debug, Clone)]
pub struct Job {
    pub identity: RepoIdentity,
    /// Submission row positions that referenced this identity
    pub source_rows: Vec<usize>,
    /// Grading attempts consumed
    pub attempts_used: u32,
    /// `None` until the job is terminal
    pub outcome: Option<JobOutcome>,
}

impl Job {
    pub fn new(identity: RepoIdentity) -> Self {
        Self {
            identity,
            source_rows: Vec::new(),
            attempts_used: 0,
            outcome: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Terminal outcome of a job
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// A result artifact already existed; nothing ran
    Cached,
    /// Snapshot is on disk (fetch-only runs)
    Fetched,
    /// Grading succeeded and the result artifact was written
    Graded(GradingResponse),
    /// Snapshot could not be produced, or was empty
    FetchFailed { reason: String },
    /// Attempt budget exhausted
    GradingFailed { errors: Vec<String> },
}

impl JobOutcome {
    pub fn status(&self) -> ItemStatus {
        match self {
            JobOutcome::Cached | JobOutcome::Graded(_) => ItemStatus::Ok,
            JobOutcome::Fetched => ItemStatus::Pending,
            JobOutcome::FetchFailed { .. } => ItemStatus::FetchFailed,
            JobOutcome::GradingFailed { .. } => ItemStatus::GradingFailed,
        }
    }
}

/// Status column value of a summary row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    Ok,
    FetchFailed,
    GradingFailed,
    MissingUrl,
    InvalidUrl,
    Pending,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Ok => "ok",
            ItemStatus::FetchFailed => "fetch failed",
            ItemStatus::GradingFailed => "grading failed",
            ItemStatus::MissingUrl => "missing URL",
            ItemStatus::InvalidUrl => "invalid URL",
            ItemStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
