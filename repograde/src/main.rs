//! repograde - batch repository grading
//!
//! Subcommands:
//! - `run`: fetch and grade every repository in a submissions CSV, then
//!   write the summary CSV
//! - `fetch`: snapshots only
//! - `eval`: grade snapshots already in the artifact directory
//! - `summary`: rebuild the summary CSV from artifacts on disk
//! - `scores`: one row per result artifact with its total

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use repograde::{build_fetcher, build_validator, Pipeline, SubmissionSource};
use repograde_common::config::{ConfigResolver, TomlConfig, DEFAULT_PARALLEL};
use repograde_common::Rubric;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// Command-line arguments for repograde
#[derive(Parser, Debug)]
#[command(name = "repograde")]
#[command(about = "Grade GitHub repositories from a submissions CSV against a rubric")]
#[command(version = VERSION)]
struct Cli {
    /// Config file (default: $REPOGRADE_CONFIG, ./repograde.toml, user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, grade and summarize every submission
    Run {
        #[command(flatten)]
        submissions: SubmissionArgs,
        #[command(flatten)]
        repos: RepoArgs,
        #[command(flatten)]
        grading: GradingArgs,
        #[command(flatten)]
        parallel: ParallelArgs,
        /// Summary CSV (default: <repos>/summary.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Fetch snapshots only
    Fetch {
        #[command(flatten)]
        submissions: SubmissionArgs,
        #[command(flatten)]
        repos: RepoArgs,
        #[command(flatten)]
        parallel: ParallelArgs,
    },
    /// Grade every snapshot in the artifact directory that has no result
    Eval {
        #[command(flatten)]
        repos: RepoArgs,
        #[command(flatten)]
        grading: GradingArgs,
        #[command(flatten)]
        parallel: ParallelArgs,
    },
    /// Rebuild the summary CSV from artifacts on disk
    Summary {
        #[command(flatten)]
        submissions: SubmissionArgs,
        #[command(flatten)]
        repos: RepoArgs,
        /// Summary CSV (default: <repos>/summary.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write per-repository totals for every result artifact
    Scores {
        #[command(flatten)]
        repos: RepoArgs,
        /// Rubric TOML file
        #[arg(long, default_value = "evals.toml")]
        check: PathBuf,
        /// Scores CSV
        #[arg(long, default_value = "scores.csv")]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SubmissionArgs {
    /// Submissions CSV
    #[arg(long)]
    submissions: PathBuf,

    /// CSV column holding repository URLs
    #[arg(long)]
    column: String,
}

#[derive(Args, Debug)]
struct RepoArgs {
    /// Artifact directory (snapshots, results, failure logs)
    #[arg(long, default_value = "./code")]
    repos: PathBuf,
}

#[derive(Args, Debug)]
struct GradingArgs {
    /// Rubric TOML file
    #[arg(long, default_value = "evals.toml")]
    check: PathBuf,

    /// Model identifier (overrides the config file)
    #[arg(long)]
    model: Option<String>,
}

#[derive(Args, Debug)]
struct ParallelArgs {
    /// Jobs in flight at once
    #[arg(long, default_value_t = DEFAULT_PARALLEL as u64, value_parser = clap::value_parser!(u64).range(1..=32))]
    parallel: u64,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl ParallelArgs {
    fn pipeline(&self, repos: &RepoArgs) -> Pipeline {
        Pipeline::new(&repos.repos, self.parallel as usize).with_progress_bar(!self.no_progress)
    }
}

impl SubmissionArgs {
    fn source(&self) -> SubmissionSource {
        SubmissionSource {
            csv: self.submissions.clone(),
            column: self.column.clone(),
        }
    }
}

impl GradingArgs {
    fn rubric(&self) -> Result<Arc<Rubric>> {
        let rubric = Rubric::load(&self.check)
            .with_context(|| format!("Failed to load rubric {}", self.check.display()))?;
        info!(file = %self.check.display(), checks = rubric.checks.len(), "Rubric loaded");
        Ok(Arc::new(rubric))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG wins; otherwise the config file's level applies once loaded
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::<EnvFilter, Registry>::new(
        env_filter.unwrap_or_else(|| EnvFilter::new("info")),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = ConfigResolver::new(cli.config.clone())
        .load()
        .context("Failed to load configuration")?;

    if !from_env {
        let level = EnvFilter::try_new(&config.logging.level)
            .with_context(|| format!("Invalid [logging] level '{}'", config.logging.level))?;
        filter_handle
            .reload(level)
            .context("Failed to apply log level")?;
    }

    info!("Starting repograde {}", VERSION);

    execute(cli.command, &config).await
}

async fn execute(command: Command, config: &TomlConfig) -> Result<()> {
    match command {
        Command::Run {
            submissions,
            repos,
            grading,
            parallel,
            out,
        } => {
            let rubric = grading.rubric()?;
            let validator = build_validator(config, rubric, grading.model.as_deref())?;
            let pipeline = parallel.pipeline(&repos);
            let out = out.unwrap_or_else(|| repos.repos.join("summary.csv"));

            pipeline
                .run(&submissions.source(), build_fetcher(config), validator, &out)
                .await
                .context("Pipeline run failed")?;
        }
        Command::Fetch {
            submissions,
            repos,
            parallel,
        } => {
            let pipeline = parallel.pipeline(&repos);
            pipeline
                .fetch(&submissions.source(), build_fetcher(config))
                .await
                .context("Fetch failed")?;
        }
        Command::Eval {
            repos,
            grading,
            parallel,
        } => {
            let rubric = grading.rubric()?;
            let validator = build_validator(config, rubric, grading.model.as_deref())?;
            let pipeline = parallel.pipeline(&repos);
            pipeline.eval(validator).await.context("Eval failed")?;
        }
        Command::Summary {
            submissions,
            repos,
            out,
        } => {
            let pipeline = Pipeline::new(&repos.repos, DEFAULT_PARALLEL);
            let out = out.unwrap_or_else(|| repos.repos.join("summary.csv"));
            pipeline
                .summary(&submissions.source(), &out)
                .context("Summary failed")?;
        }
        Command::Scores { repos, check, out } => {
            let rubric = Rubric::load(&check)
                .with_context(|| format!("Failed to load rubric {}", check.display()))?;
            let pipeline = Pipeline::new(&repos.repos, DEFAULT_PARALLEL);
            pipeline.scores(&rubric, &out).context("Scores failed")?;
        }
    }

    Ok(())
}
