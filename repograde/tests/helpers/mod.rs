//! Test Helper Utilities
//!
//! Shared fakes for the snapshot tool and the grading endpoint

#![allow(dead_code, unused_imports)]

pub mod fake_endpoint;
pub mod fake_tool;
pub mod scripted_grader;

pub use fake_endpoint::{FakeEndpoint, Scripted};
pub use fake_tool::{call_count, snapshot_tool, write_tool};
pub use scripted_grader::ScriptedGrader;

use repograde_common::Rubric;

/// Single-check rubric used across the integration tests
pub fn agent_loop_rubric() -> Rubric {
    Rubric::from_toml_str(
        r#"
instructions = "Grade the repository."

[checks.agent_loop]
max = 0.2
check = "Implements an agent loop"
"#,
    )
    .expect("valid rubric")
}

/// Valid single-check response body
pub fn agent_loop_response(score: f64) -> String {
    format!(
        r#"{{"agent_loop":{{"score":{},"max":0.2,"reason":"loop present"}}}}"#,
        score
    )
}
