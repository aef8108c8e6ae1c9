//! Submission records read from the input spreadsheet

use indexmap::IndexMap;

/// One input row, addressed by position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub index: usize,
    pub fields: IndexMap<String, String>,
}

impl Submission {
    /// Field value, empty when the row has no such column
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }
}

/// Header plus every record, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionTable {
    pub headers: Vec<String>,
    pub records: Vec<Submission>,
}

impl SubmissionTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
