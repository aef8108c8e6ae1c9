//! Fake snapshot tool
//!
//! The fetcher appends `<url> -o <dest>`, so inside the script `$1` is the
//! URL and `$3` the destination.

use std::fs;
use std::path::Path;

/// Write `body` as a shell script and return the tool command line
pub fn write_tool(dir: &Path, name: &str, body: &str) -> Vec<String> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write tool script");
    vec!["sh".to_string(), path.display().to_string()]
}

/// Script that records each call in `calls` and writes a snapshot
pub fn snapshot_tool(dir: &Path, calls: &Path) -> Vec<String> {
    write_tool(
        dir,
        "snapshot.sh",
        &format!(
            "echo \"$1\" >> '{}'\nprintf 'Repository: %s\\n' \"$1\" > \"$3\"",
            calls.display()
        ),
    )
}

/// Number of lines recorded in a call log (0 when absent)
pub fn call_count(calls: &Path) -> usize {
    fs::read_to_string(calls)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}
