//! Pipeline services
//!
//! Leaf components, each usable on its own: URL extraction, the row
//! source, snapshot fetching, the grading client and validator, artifact
//! storage and result aggregation.

pub mod artifact_store;
pub mod grading_client;
pub mod grading_validator;
pub mod row_source;
pub mod snapshot_fetcher;
pub mod summary;
pub mod url_extractor;

pub use artifact_store::{ArtifactPaths, ArtifactStore};
pub use grading_client::{Grader, GradingClient, GradingClientError, GradingRequest};
pub use grading_validator::{
    validate_response, AttemptError, AttemptFailure, GradeOutcome, GradingValidator,
    SchemaViolation, ATTEMPT_BUDGET,
};
pub use snapshot_fetcher::{FetchError, FetchStatus, SnapshotFetcher, SnapshotSource};
pub use summary::SummaryTable;
