//! Submission spreadsheet reader
//!
//! Reads a UTF-8 CSV whose header row names the fields. Short rows are
//! padded with empty cells so every record carries every header.

use crate::models::{RowTarget, Submission, SubmissionTable};
use crate::services::url_extractor;
use indexmap::IndexMap;
use repograde_common::{Error, Result};
use std::path::Path;

/// Read every record of `path` in file order
pub fn read_submissions(path: &Path) -> Result<SubmissionTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut records = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let fields: IndexMap<String, String> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        records.push(Submission { index, fields });
    }

    tracing::debug!(file = %path.display(), rows = records.len(), "Read submissions");

    Ok(SubmissionTable { headers, records })
}

/// Resolve each record's URL field to a target, by position
pub fn resolve_targets(table: &SubmissionTable, column: &str) -> Result<Vec<RowTarget>> {
    if !table.has_column(column) {
        return Err(Error::InvalidInput(format!(
            "column '{}' not found (available: {})",
            column,
            table.headers.join(", ")
        )));
    }

    Ok(table
        .records
        .iter()
        .map(|row| classify(row.get(column)))
        .collect())
}

fn classify(text: &str) -> RowTarget {
    if text.trim().is_empty() {
        return RowTarget::MissingUrl;
    }
    match url_extractor::extract(text) {
        Some(identity) => RowTarget::Item(identity),
        None => RowTarget::InvalidUrl,
    }
}
