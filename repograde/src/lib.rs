//! repograde library interface
//!
//! Batch grading of GitHub repositories listed in a submissions CSV:
//! extract each row's repository URL, fetch a text snapshot, grade it
//! against a TOML rubric through an LLM endpoint, and aggregate the
//! validated results into a summary CSV.
//!
//! Exposes the building blocks for integration testing and the
//! [`pipeline::Pipeline`] operations used by the binary.

pub mod models;
pub mod pipeline;
pub mod services;
pub mod workflow;

pub use pipeline::{build_fetcher, build_validator, Pipeline, SubmissionSource};
pub use repograde_common::{Error, Result};
