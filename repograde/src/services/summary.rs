//! Result aggregation
//!
//! Joins job outcomes back to the input rows by position and flattens the
//! per-check scores of each result artifact into dynamic columns.
//!
//! Summary columns: every input column in header order, then `status`,
//! `owner_repo`, `json_path`, `log_path`, then the sorted union of check
//! names seen across all result artifacts. An absent check is a blank
//! cell, never zero.
//!
//! Header names are unique. The fixed columns keep their names; an input
//! column that collides is renamed `input_<name>` and a colliding check
//! column `score_<name>`.

use crate::models::{ItemStatus, RepoIdentity, RowTarget, SubmissionTable};
use crate::services::artifact_store::{ArtifactPaths, ArtifactStore};
use indexmap::IndexMap;
use repograde_common::{Result, Rubric};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

const FIXED_COLUMNS: [&str; 4] = ["status", "owner_repo", "json_path", "log_path"];

/// Rendered table ready to be written as CSV
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SummaryTable {
    /// Cell by row position and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Write header and rows, creating the parent directory if needed
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Build one summary row per input record
///
/// `statuses` holds the outcome of every identity that ran; identities
/// missing from it are reported as `pending`.
pub fn summarize(
    table: &SubmissionTable,
    targets: &[RowTarget],
    statuses: &HashMap<RepoIdentity, ItemStatus>,
    store: &ArtifactStore,
) -> SummaryTable {
    let mut score_cache: HashMap<RepoIdentity, IndexMap<String, String>> = HashMap::new();
    let mut check_columns = BTreeSet::new();

    for target in targets {
        if let RowTarget::Item(identity) = target {
            if score_cache.contains_key(identity) {
                continue;
            }
            let scores = read_scores(&store.paths(identity));
            check_columns.extend(scores.keys().cloned());
            score_cache.insert(identity.clone(), scores);
        }
    }

    let mut headers: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    for name in &table.headers {
        claim_header(&mut headers, name, "input_");
    }
    // Input columns come first in the rendered header
    headers.rotate_left(FIXED_COLUMNS.len());
    for name in &check_columns {
        claim_header(&mut headers, name, "score_");
    }

    let rows = table
        .records
        .iter()
        .zip(targets)
        .map(|(record, target)| {
            let mut row: Vec<String> = table
                .headers
                .iter()
                .map(|h| record.get(h).to_string())
                .collect();

            match target {
                RowTarget::MissingUrl | RowTarget::InvalidUrl => {
                    let status = if *target == RowTarget::MissingUrl {
                        ItemStatus::MissingUrl
                    } else {
                        ItemStatus::InvalidUrl
                    };
                    row.push(status.to_string());
                    row.extend(std::iter::repeat(String::new()).take(3 + check_columns.len()));
                }
                RowTarget::Item(identity) => {
                    let paths = store.paths(identity);
                    let status = statuses.get(identity).copied().unwrap_or(ItemStatus::Pending);
                    row.push(status.to_string());
                    row.push(paths.key.clone());
                    row.push(existing_path(&paths.result));
                    row.push(existing_path(&paths.failure_log));

                    let scores = score_cache.get(identity);
                    for column in &check_columns {
                        let cell = scores
                            .and_then(|s| s.get(column))
                            .cloned()
                            .unwrap_or_default();
                        row.push(cell);
                    }
                }
            }
            row
        })
        .collect();

    SummaryTable { headers, rows }
}

/// Append `name`, prefixed until it no longer collides with `headers`
fn claim_header(headers: &mut Vec<String>, name: &str, prefix: &str) {
    let mut candidate = name.to_string();
    while headers.contains(&candidate) {
        candidate = format!("{}{}", prefix, candidate);
    }
    headers.push(candidate);
}

/// Reconstruct statuses from artifacts on disk
///
/// Result present → `ok`. Failure log without result → `fetch failed` when
/// the snapshot is missing or empty, `grading failed` otherwise. Anything
/// else is `pending`.
pub fn rescan_statuses(targets: &[RowTarget], store: &ArtifactStore) -> HashMap<RepoIdentity, ItemStatus> {
    targets
        .iter()
        .filter_map(|t| match t {
            RowTarget::Item(identity) => Some(identity),
            _ => None,
        })
        .map(|identity| {
            let paths = store.paths(identity);
            (identity.clone(), disk_status(&paths))
        })
        .collect()
}

fn disk_status(paths: &ArtifactPaths) -> ItemStatus {
    if paths.has_result() {
        ItemStatus::Ok
    } else if paths.has_failure_log() {
        if paths.snapshot_ready() {
            ItemStatus::GradingFailed
        } else {
            ItemStatus::FetchFailed
        }
    } else {
        ItemStatus::Pending
    }
}

/// One row per result artifact: `repo`, `total`, then each rubric check
///
/// Only numeric scores of declared checks count toward the total; other
/// values render as blank cells. Rows are sorted by item key.
pub fn score_table(store: &ArtifactStore, rubric: &Rubric) -> Result<SummaryTable> {
    let mut headers = vec!["repo".to_string(), "total".to_string()];
    headers.extend(rubric.check_names().map(str::to_string));

    let mut rows = Vec::new();
    for identity in store.result_identities()? {
        let paths = store.paths(&identity);
        let data = match paths.read_result() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(file = %paths.result.display(), error = %e, "Skipping unreadable result");
                continue;
            }
        };

        let mut total = 0.0;
        let mut cells = Vec::new();
        for name in rubric.check_names() {
            match data.get(name).and_then(|entry| entry.get("score")) {
                Some(Value::Number(n)) => {
                    total += n.as_f64().unwrap_or(0.0);
                    cells.push(n.to_string());
                }
                _ => cells.push(String::new()),
            }
        }

        let mut row = vec![identity.url(), total.to_string()];
        row.extend(cells);
        rows.push(row);
    }

    Ok(SummaryTable { headers, rows })
}

/// Per-check score cells of a result artifact, keyed by check name
fn read_scores(paths: &ArtifactPaths) -> IndexMap<String, String> {
    if !paths.has_result() {
        return IndexMap::new();
    }
    match paths.read_result() {
        Ok(Value::Object(map)) => flatten_scores(&map),
        Ok(other) => {
            tracing::warn!(file = %paths.result.display(), found = ?other, "Result is not an object");
            IndexMap::new()
        }
        Err(e) => {
            tracing::warn!(file = %paths.result.display(), error = %e, "Failed to read result");
            IndexMap::new()
        }
    }
}

fn flatten_scores(map: &Map<String, Value>) -> IndexMap<String, String> {
    map.iter()
        .map(|(name, entry)| {
            let value = entry.get("score").unwrap_or(entry);
            (name.clone(), render_cell(value))
        })
        .collect()
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn existing_path(path: &Path) -> String {
    if path.is_file() {
        path.display().to_string()
    } else {
        String::new()
    }
}
