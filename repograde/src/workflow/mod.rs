//! Job planning and bounded dispatch

pub mod coordinator;
pub mod progress;
pub mod statistics;

pub use coordinator::{Coordinator, RunReport, Stage};
pub use progress::ProgressReporter;
pub use statistics::ProcessingStats;
