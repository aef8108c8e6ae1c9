//! Repository URL extraction
//!
//! Finds the first GitHub repository URL in free text and reduces it to a
//! canonical [`RepoIdentity`]. Trailing path, query and fragment are
//! ignored, a `.git` suffix is dropped, and trailing dots (sentence
//! punctuation right after a URL) are trimmed.

use crate::models::RepoIdentity;
use once_cell::sync::Lazy;
use regex::Regex;

static GITHUB_REPO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://(?:www\.)?github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)(?:[/#?]\S*)?")
        .expect("GitHub URL pattern is valid")
});

/// Extract the first repository identity from `text`
pub fn extract(text: &str) -> Option<RepoIdentity> {
    let caps = GITHUB_REPO_RE.captures(text)?;
    let owner = caps.get(1)?.as_str();
    let name = canonical_name(caps.get(2)?.as_str());
    RepoIdentity::new(owner, name)
}

fn canonical_name(raw: &str) -> &str {
    let name = raw.trim_end_matches('.');
    let name = name.strip_suffix(".git").unwrap_or(name);
    name.trim_end_matches('.')
}
