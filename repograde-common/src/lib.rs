//! # repograde common library
//!
//! Shared code for the repograde pipeline crates:
//! - Error and result types
//! - Pipeline configuration loading (`repograde.toml`)
//! - Rubric loading and prompt/schema construction

pub mod config;
pub mod error;
pub mod rubric;

pub use error::{Error, Result};
pub use rubric::{CheckSpec, Rubric};
