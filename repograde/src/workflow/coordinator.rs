//! Concurrency coordinator
//!
//! Turns submission rows into one job per unique repository identity and
//! drives those jobs through a bounded worker pool.
//!
//! # Architecture
//! - Planning is complete before dispatch: the seen-identities map is fully
//!   populated and every duplicate row is attached to its job first
//! - Jobs whose artifact already exists are skipped before admission
//! - At most `parallelism` jobs run at once via
//!   `futures::stream::buffer_unordered`, completing in any order
//! - A single driving loop owns the jobs and statistics; workers only return
//!   outcomes, so no lock is shared between them
//! - Every failure becomes a recorded outcome at the job boundary

use crate::models::{ItemStatus, Job, JobOutcome, RepoIdentity, RowTarget};
use crate::services::artifact_store::{ArtifactPaths, ArtifactStore};
use crate::services::grading_validator::{GradeOutcome, GradingValidator};
use crate::services::snapshot_fetcher::SnapshotSource;
use crate::workflow::statistics::ProcessingStats;
use futures::stream::{self, StreamExt};
use repograde_common::config::MAX_PARALLEL;
use std::collections::HashMap;
use std::sync::Arc;

/// What each admitted job does
#[derive(Clone)]
pub enum Stage {
    /// Snapshot only
    Fetch(Arc<dyn SnapshotSource>),
    /// Grade snapshots already on disk
    Grade(Arc<GradingValidator>),
    /// Snapshot, then grade
    FetchAndGrade(Arc<dyn SnapshotSource>, Arc<GradingValidator>),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Fetch(_) => "fetch",
            Stage::Grade(_) => "grade",
            Stage::FetchAndGrade(..) => "fetch+grade",
        }
    }

    /// Artifact that makes a job unnecessary
    fn is_done(&self, paths: &ArtifactPaths) -> bool {
        match self {
            Stage::Fetch(_) => paths.snapshot_ready(),
            Stage::Grade(_) | Stage::FetchAndGrade(..) => paths.has_result(),
        }
    }

    fn skipped_outcome(&self) -> JobOutcome {
        match self {
            Stage::Fetch(_) => JobOutcome::Fetched,
            Stage::Grade(_) | Stage::FetchAndGrade(..) => JobOutcome::Cached,
        }
    }
}

/// Final state of every job plus counters
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub jobs: Vec<Job>,
    pub stats: ProcessingStats,
}

impl RunReport {
    /// Status of every identity that reached an outcome
    pub fn statuses(&self) -> HashMap<RepoIdentity, ItemStatus> {
        self.jobs
            .iter()
            .filter_map(|job| {
                job.outcome
                    .as_ref()
                    .map(|outcome| (job.identity.clone(), outcome.status()))
            })
            .collect()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            jobs = self.jobs.len(),
            graded = self.stats.graded,
            fetched = self.stats.fetched,
            cached = self.stats.cached,
            fetch_failed = self.stats.fetch_failed,
            grading_failed = self.stats.grading_failed,
            "Run completed: {}",
            self.stats.display_string()
        );
    }
}

/// Job planner and bounded dispatcher
pub struct Coordinator {
    store: ArtifactStore,
    stage: Stage,
    parallelism: usize,
    /// Identity → index into `jobs`
    seen: HashMap<RepoIdentity, usize>,
    jobs: Vec<Job>,
}

impl Coordinator {
    /// `parallelism` is clamped to `1..=32`
    pub fn new(store: ArtifactStore, stage: Stage, parallelism: usize) -> Self {
        let clamped = parallelism.clamp(1, MAX_PARALLEL);
        if clamped != parallelism {
            tracing::warn!(requested = parallelism, using = clamped, "Parallelism out of range");
        }
        Self {
            store,
            stage,
            parallelism: clamped,
            seen: HashMap::new(),
            jobs: Vec::new(),
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Add one job per new identity, recording every referencing row
    pub fn plan_rows(&mut self, targets: &[RowTarget]) {
        for (row, target) in targets.iter().enumerate() {
            if let RowTarget::Item(identity) = target {
                self.admit_identity(identity.clone(), Some(row));
            }
        }
    }

    /// Add one job per new identity with no source rows
    pub fn plan_identities(&mut self, identities: impl IntoIterator<Item = RepoIdentity>) {
        for identity in identities {
            self.admit_identity(identity, None);
        }
    }

    fn admit_identity(&mut self, identity: RepoIdentity, row: Option<usize>) {
        let index = match self.seen.get(&identity) {
            Some(&index) => index,
            None => {
                let index = self.jobs.len();
                self.seen.insert(identity.clone(), index);
                self.jobs.push(Job::new(identity));
                index
            }
        };
        if let Some(row) = row {
            self.jobs[index].source_rows.push(row);
        }
    }

    pub async fn run(self) -> RunReport {
        self.run_with_progress(|_, _| {}).await
    }

    /// Run every planned job, calling `progress` as each one terminates
    pub async fn run_with_progress<F>(mut self, mut progress: F) -> RunReport
    where
        F: FnMut(&Job, &ProcessingStats),
    {
        let mut stats = ProcessingStats::default();
        let mut admitted = Vec::new();

        for (index, job) in self.jobs.iter_mut().enumerate() {
            if self.stage.is_done(&self.store.paths(&job.identity)) {
                job.outcome = Some(self.stage.skipped_outcome());
                stats.record_skip();
                tracing::debug!(identity = %job.identity, "Artifact present, job skipped");
            } else {
                admitted.push((index, job.identity.clone()));
            }
        }
        stats.total = admitted.len();

        tracing::info!(
            stage = self.stage.name(),
            jobs = self.jobs.len(),
            admitted = stats.total,
            skipped = stats.cached,
            parallelism = self.parallelism,
            "Starting job dispatch"
        );

        let store = self.store.clone();
        let stage = self.stage.clone();

        let mut completions = stream::iter(admitted)
            .map(|(index, identity)| {
                let store = store.clone();
                let stage = stage.clone();
                async move {
                    let (outcome, attempts) = execute(&stage, &store, &identity).await;
                    (index, outcome, attempts)
                }
            })
            .buffer_unordered(self.parallelism);

        while let Some((index, outcome, attempts)) = completions.next().await {
            stats.record(&outcome);

            let status = outcome.status();
            let job = &mut self.jobs[index];
            job.attempts_used = attempts;
            job.outcome = Some(outcome);

            tracing::info!(
                identity = %job.identity,
                status = %status,
                progress = stats.progress(),
                "Pipeline progress update"
            );
            progress(job, &stats);
        }

        RunReport {
            jobs: self.jobs,
            stats,
        }
    }
}

/// One job, start to terminal outcome; returns the outcome and attempts used
async fn execute(stage: &Stage, store: &ArtifactStore, identity: &RepoIdentity) -> (JobOutcome, u32) {
    let paths = store.paths(identity);

    match stage {
        Stage::Fetch(fetcher) => match fetcher.fetch(identity, &paths).await {
            Ok(_) => (JobOutcome::Fetched, 0),
            Err(e) => (JobOutcome::FetchFailed { reason: e.to_string() }, 0),
        },
        Stage::Grade(validator) => grade(validator, identity, &paths).await,
        Stage::FetchAndGrade(fetcher, validator) => {
            if let Err(e) = fetcher.fetch(identity, &paths).await {
                return (JobOutcome::FetchFailed { reason: e.to_string() }, 0);
            }
            grade(validator, identity, &paths).await
        }
    }
}

async fn grade(validator: &GradingValidator, identity: &RepoIdentity, paths: &ArtifactPaths) -> (JobOutcome, u32) {
    match validator.grade(identity, paths).await {
        Ok(GradeOutcome::Cached) => (JobOutcome::Cached, 0),
        Ok(GradeOutcome::Graded { response, attempts }) => (JobOutcome::Graded(response), attempts),
        Ok(GradeOutcome::Failed { errors }) => {
            let attempts = errors.len() as u32;
            let errors = errors.iter().map(ToString::to_string).collect();
            (JobOutcome::GradingFailed { errors }, attempts)
        }
        Ok(GradeOutcome::EmptySnapshot) => (
            JobOutcome::FetchFailed {
                reason: "empty or unreadable snapshot".to_string(),
            },
            0,
        ),
        Err(e) => {
            tracing::error!(identity = %identity, error = %e, "Grading step failed locally");
            (JobOutcome::GradingFailed { errors: vec![e.to_string()] }, 0)
        }
    }
}
