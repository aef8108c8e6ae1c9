//! End-to-end operations behind each subcommand
//!
//! Each operation reads its inputs, plans jobs on a fresh [`Coordinator`]
//! and writes its outputs. Per-item failures never surface as `Err`; only
//! unusable inputs (missing CSV, unknown column, bad rubric) or local
//! filesystem errors do.

use crate::models::RowTarget;
use crate::services::grading_client::GradingClient;
use crate::services::grading_validator::GradingValidator;
use crate::services::row_source;
use crate::services::snapshot_fetcher::{SnapshotFetcher, SnapshotSource};
use crate::services::summary::{self, SummaryTable};
use crate::services::ArtifactStore;
use crate::workflow::{Coordinator, ProgressReporter, RunReport, Stage};
use repograde_common::config::{resolve_api_key, TomlConfig};
use repograde_common::{Error, Result, Rubric};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Submission spreadsheet and the column holding repository URLs
#[derive(Debug, Clone)]
pub struct SubmissionSource {
    pub csv: PathBuf,
    pub column: String,
}

/// Grading validator wired to the configured HTTP endpoint
///
/// `model` overrides the configured model when set.
pub fn build_validator(
    config: &TomlConfig,
    rubric: Arc<Rubric>,
    model: Option<&str>,
) -> Result<Arc<GradingValidator>> {
    let api_key = resolve_api_key(config)?;
    let client = GradingClient::new(
        config.grading.endpoint.clone(),
        api_key,
        Duration::from_secs(config.grading.timeout_secs),
    )
    .map_err(|e| Error::Config(format!("Grading client setup failed: {}", e)))?;

    let model = model.unwrap_or(&config.grading.model);
    tracing::info!(endpoint = %config.grading.endpoint, model, "Grading client ready");

    Ok(Arc::new(GradingValidator::new(Arc::new(client), rubric, model)))
}

/// Snapshot fetcher running the configured tool
pub fn build_fetcher(config: &TomlConfig) -> Arc<dyn SnapshotSource> {
    Arc::new(SnapshotFetcher::new(config.snapshot.tool.clone()))
}

/// Operation runner over one artifact directory
pub struct Pipeline {
    store: ArtifactStore,
    parallelism: usize,
    progress_bar: bool,
}

impl Pipeline {
    pub fn new(repos_dir: impl Into<PathBuf>, parallelism: usize) -> Self {
        Self {
            store: ArtifactStore::new(repos_dir),
            parallelism,
            progress_bar: false,
        }
    }

    /// Draw a progress bar on stderr while jobs run
    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.progress_bar = enabled;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Fetch and grade every submission, then write the summary CSV
    pub async fn run(
        &self,
        source: &SubmissionSource,
        fetcher: Arc<dyn SnapshotSource>,
        validator: Arc<GradingValidator>,
        summary_path: &Path,
    ) -> Result<(RunReport, SummaryTable)> {
        let table = row_source::read_submissions(&source.csv)?;
        let targets = row_source::resolve_targets(&table, &source.column)?;
        log_targets(&targets);

        self.store.ensure_dir()?;
        let mut coordinator = Coordinator::new(
            self.store.clone(),
            Stage::FetchAndGrade(fetcher, validator),
            self.parallelism,
        );
        coordinator.plan_rows(&targets);

        let report = self.dispatch(coordinator, "run").await;

        let summary = summary::summarize(&table, &targets, &report.statuses(), &self.store);
        summary.write_csv(summary_path)?;
        tracing::info!(file = %summary_path.display(), rows = summary.rows.len(), "Wrote summary");

        Ok((report, summary))
    }

    /// Snapshot every submission without grading
    pub async fn fetch(&self, source: &SubmissionSource, fetcher: Arc<dyn SnapshotSource>) -> Result<RunReport> {
        let table = row_source::read_submissions(&source.csv)?;
        let targets = row_source::resolve_targets(&table, &source.column)?;
        log_targets(&targets);

        self.store.ensure_dir()?;
        let mut coordinator = Coordinator::new(self.store.clone(), Stage::Fetch(fetcher), self.parallelism);
        coordinator.plan_rows(&targets);

        Ok(self.dispatch(coordinator, "fetch").await)
    }

    /// Grade every snapshot in the artifact directory that has no result
    pub async fn eval(&self, validator: Arc<GradingValidator>) -> Result<RunReport> {
        let identities = self.store.snapshot_identities().map_err(|e| {
            Error::InvalidInput(format!("Cannot scan {}: {}", self.store.root().display(), e))
        })?;
        tracing::info!(dir = %self.store.root().display(), snapshots = identities.len(), "Found snapshots");

        let mut coordinator = Coordinator::new(self.store.clone(), Stage::Grade(validator), self.parallelism);
        coordinator.plan_identities(identities);

        Ok(self.dispatch(coordinator, "eval").await)
    }

    async fn dispatch(&self, coordinator: Coordinator, label: &str) -> RunReport {
        let report = if self.progress_bar {
            let reporter = ProgressReporter::stderr(label);
            let report = coordinator
                .run_with_progress(|job, stats| reporter.update(job, stats))
                .await;
            reporter.finish(&report.stats);
            report
        } else {
            coordinator.run().await
        };
        report.log_summary();
        report
    }

    /// Rebuild the summary CSV from submissions plus artifacts on disk
    pub fn summary(&self, source: &SubmissionSource, summary_path: &Path) -> Result<SummaryTable> {
        let table = row_source::read_submissions(&source.csv)?;
        let targets = row_source::resolve_targets(&table, &source.column)?;

        let statuses = summary::rescan_statuses(&targets, &self.store);
        let summary = summary::summarize(&table, &targets, &statuses, &self.store);
        summary.write_csv(summary_path)?;
        tracing::info!(file = %summary_path.display(), rows = summary.rows.len(), "Wrote summary");

        Ok(summary)
    }

    /// Write one score row per result artifact
    pub fn scores(&self, rubric: &Rubric, scores_path: &Path) -> Result<SummaryTable> {
        let scores = summary::score_table(&self.store, rubric)?;
        scores.write_csv(scores_path)?;
        tracing::info!(file = %scores_path.display(), rows = scores.rows.len(), "Wrote scores");
        Ok(scores)
    }
}

fn log_targets(targets: &[RowTarget]) {
    let missing = targets.iter().filter(|t| **t == RowTarget::MissingUrl).count();
    let invalid = targets.iter().filter(|t| **t == RowTarget::InvalidUrl).count();
    tracing::info!(
        rows = targets.len(),
        repos = targets.len() - missing - invalid,
        missing_url = missing,
        invalid_url = invalid,
        "Resolved submission rows"
    );
}
