//! Identity-keyed artifacts on disk
//!
//! Every identity owns three files in the output directory:
//! - `<key>.txt`: repository snapshot
//! - `<key>.json`: validated grading result (compact JSON)
//! - `<key>.log`: failure log of the most recent failed attempt sequence
//!
//! A job only ever touches its own identity's files, so no locking is needed.

use crate::models::RepoIdentity;
use repograde_common::Result;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Output directory holding all artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the output directory if missing (idempotent)
    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    pub fn paths(&self, identity: &RepoIdentity) -> ArtifactPaths {
        let key = identity.key();
        ArtifactPaths {
            snapshot: self.root.join(format!("{}.txt", key)),
            result: self.root.join(format!("{}.json", key)),
            failure_log: self.root.join(format!("{}.log", key)),
            key,
        }
    }

    /// Identities of every snapshot in the directory, sorted by key
    ///
    /// File stems that do not parse as `owner.name` are skipped.
    pub fn snapshot_identities(&self) -> Result<Vec<RepoIdentity>> {
        let mut identities = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match RepoIdentity::from_key(stem) {
                Some(identity) => identities.push(identity),
                None => tracing::warn!(file = %path.display(), "Skipping snapshot with unrecognized name"),
            }
        }
        identities.sort_by_key(|id| id.key());
        Ok(identities)
    }

    /// Identities of every result artifact in the directory, sorted by key
    pub fn result_identities(&self) -> Result<Vec<RepoIdentity>> {
        let mut identities = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(identity) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(RepoIdentity::from_key)
            {
                identities.push(identity);
            }
        }
        identities.sort_by_key(|id| id.key());
        Ok(identities)
    }
}

/// Artifact file locations for one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub key: String,
    pub snapshot: PathBuf,
    pub result: PathBuf,
    pub failure_log: PathBuf,
}

impl ArtifactPaths {
    /// Snapshot exists and is non-empty
    ///
    /// A zero-length file is a leftover from a crashed write and counts as absent.
    pub fn snapshot_ready(&self) -> bool {
        fs::metadata(&self.snapshot)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    pub fn has_result(&self) -> bool {
        self.result.is_file()
    }

    pub fn has_failure_log(&self) -> bool {
        self.failure_log.is_file()
    }

    /// Snapshot file name as recorded in failure logs
    pub fn snapshot_file_name(&self) -> String {
        format!("{}.txt", self.key)
    }

    /// Persist a result as compact JSON (key order and non-ASCII preserved)
    ///
    /// Written to `<key>.json.tmp` and renamed into place, so a crash never
    /// leaves a truncated result behind.
    pub fn write_result(&self, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        let staging = self.result.with_extension("json.tmp");
        fs::write(&staging, encoded)?;
        if let Err(e) = fs::rename(&staging, &self.result) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn read_result(&self) -> Result<Value> {
        let content = fs::read_to_string(&self.result)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Replace the failure log
    pub fn write_failure_log(&self, content: &str) -> io::Result<()> {
        fs::write(&self.failure_log, content)
    }

    /// Append one record to the failure log, newline-terminated
    pub fn append_failure_log(&self, record: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.failure_log)?;
        writeln!(file, "{}", record.trim_end_matches('\n'))
    }

    /// Remove a stale failure log (missing file is fine)
    pub fn clear_failure_log(&self) -> io::Result<()> {
        remove_if_exists(&self.failure_log)
    }

    /// Remove a partial snapshot (missing file is fine)
    pub fn remove_snapshot(&self) -> io::Result<()> {
        remove_if_exists(&self.snapshot)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
