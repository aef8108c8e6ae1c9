//! Data models for the grading pipeline

pub mod grading;
pub mod identity;
pub mod job;
pub mod submission;

pub use grading::{CheckScore, GradingResponse};
pub use identity::RepoIdentity;
pub use job::{ItemStatus, Job, JobOutcome, RowTarget};
pub use submission::{Submission, SubmissionTable};
