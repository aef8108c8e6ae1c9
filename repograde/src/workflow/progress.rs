//! Terminal progress bar for job dispatch
//!
//! Fed from [`Coordinator::run_with_progress`](super::Coordinator::run_with_progress).
//! indicatif hides the bar when stderr is not a terminal.

use super::ProcessingStats;
use crate::models::Job;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Bar drawn on stderr
    pub fn stderr(stage: &str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{elapsed_precise}] {prefix} {pos}/{len} repos ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        bar.set_prefix(stage.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Bar that tracks state without drawing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn update(&self, job: &Job, stats: &ProcessingStats) {
        self.bar.set_length(stats.total as u64);
        self.bar.set_position(stats.completed as u64);
        self.bar.set_message(job.identity.to_string());
    }

    pub fn finish(&self, stats: &ProcessingStats) {
        self.bar.set_length(stats.total as u64);
        self.bar.set_position(stats.completed as u64);
        self.bar.finish_with_message(stats.display_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }
}
