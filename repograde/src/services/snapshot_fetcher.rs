//! Repository snapshot fetcher
//!
//! Produces a flattened text snapshot of a repository by running an
//! external tool (`uvx gitingest` by default) as a child process:
//!
//! ```text
//! <tool...> <url> -o <destination>
//! ```
//!
//! Fetching is idempotent: an existing non-empty snapshot is reused without
//! invoking the tool. A run only counts as successful when the tool exits
//! zero *and* leaves a non-empty file behind; anything else removes the
//! partial output and appends the captured streams to the failure log.

use crate::models::RepoIdentity;
use crate::services::artifact_store::ArtifactPaths;
use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Snapshot fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Tool binary missing or not executable
    #[error("snapshot tool could not be started: {0}")]
    Spawn(String),

    /// Tool ran but exited non-zero
    #[error("snapshot tool failed (rc={0})")]
    ToolFailed(String),

    /// Tool exited zero without producing output
    #[error("snapshot tool produced no output")]
    EmptyOutput,

    /// Local filesystem error around the tool run
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a successful fetch was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Existing non-empty snapshot reused
    Cached,
    /// Tool ran and produced the snapshot
    Fetched,
}

/// Source of repository snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(
        &self,
        identity: &RepoIdentity,
        paths: &ArtifactPaths,
    ) -> Result<FetchStatus, FetchError>;
}

/// Captured result of one tool invocation
struct ToolRun {
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// Snapshot fetcher backed by an external command
pub struct SnapshotFetcher {
    tool: Vec<String>,
}

impl SnapshotFetcher {
    /// `tool` is the program followed by any leading arguments
    pub fn new(tool: Vec<String>) -> Self {
        Self { tool }
    }

    fn command_line(&self, url: &str, dest: &str) -> Vec<String> {
        let mut cmd = self.tool.clone();
        cmd.extend([url.to_string(), "-o".to_string(), dest.to_string()]);
        cmd
    }

    async fn run_tool(&self, cmd: &[String]) -> Result<ToolRun, FetchError> {
        let (program, args) = cmd
            .split_first()
            .ok_or_else(|| FetchError::Spawn("empty tool command".to_string()))?;

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| FetchError::Spawn(format!("{}: {}", program, e)))?;

        Ok(ToolRun {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn record_failure(paths: &ArtifactPaths, cmd: &[String], rc: &str, stdout: &str, stderr: &str) {
        let record = format!(
            "snapshot tool failed (rc={})\nCMD: {}\nSTDOUT:\n{}\nSTDERR:\n{}\n",
            rc,
            shell_join(cmd),
            stdout,
            stderr
        );
        if let Err(e) = paths.append_failure_log(&record) {
            tracing::error!(
                log = %paths.failure_log.display(),
                error = %e,
                "Failed to write snapshot failure log"
            );
        }
    }
}

#[async_trait]
impl SnapshotSource for SnapshotFetcher {
    async fn fetch(
        &self,
        identity: &RepoIdentity,
        paths: &ArtifactPaths,
    ) -> Result<FetchStatus, FetchError> {
        if paths.snapshot_ready() {
            tracing::debug!(identity = %identity, "Snapshot cached, skipping tool");
            return Ok(FetchStatus::Cached);
        }

        if let Some(parent) = paths.snapshot.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let url = identity.url();
        let dest = paths.snapshot.to_string_lossy().into_owned();
        let cmd = self.command_line(&url, &dest);

        tracing::debug!(identity = %identity, command = %shell_join(&cmd), "Running snapshot tool");

        let run = match self.run_tool(&cmd).await {
            Ok(run) => run,
            Err(e) => {
                paths.remove_snapshot()?;
                Self::record_failure(paths, &cmd, "spawn error", "", &e.to_string());
                tracing::warn!(identity = %identity, error = %e, "Snapshot tool could not be started");
                return Err(e);
            }
        };

        let rc = run
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());

        if run.code == Some(0) && paths.snapshot_ready() {
            paths.clear_failure_log()?;
            tracing::info!(identity = %identity, "Snapshot fetched");
            return Ok(FetchStatus::Fetched);
        }

        paths.remove_snapshot()?;
        Self::record_failure(paths, &cmd, &rc, &run.stdout, &run.stderr);

        let err = if run.code == Some(0) {
            FetchError::EmptyOutput
        } else {
            FetchError::ToolFailed(rc)
        };
        tracing::warn!(identity = %identity, error = %err, "Snapshot fetch failed");
        Err(err)
    }
}

/// Render a command line for logs, quoting arguments that need it
fn shell_join(cmd: &[String]) -> String {
    cmd.iter()
        .map(|arg| {
            let plain = !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
            if plain {
                arg.clone()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
