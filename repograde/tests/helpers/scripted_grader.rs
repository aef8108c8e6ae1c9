//! Grader returning a fixed sequence of replies

use async_trait::async_trait;
use repograde::services::{Grader, GradingRequest};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct ScriptedGrader {
    replies: Mutex<VecDeque<Option<String>>>,
    calls: AtomicUsize,
    snapshots: Mutex<Vec<String>>,
}

impl ScriptedGrader {
    /// `None` replies simulate a failed call; an exhausted script fails too
    pub fn new(replies: Vec<Option<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot text received by each call
    pub fn snapshots(&self) -> Vec<String> {
        self.snapshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl Grader for ScriptedGrader {
    async fn grade(&self, request: &GradingRequest<'_>) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.snapshots.lock().unwrap().push(request.snapshot.to_string());
        self.replies.lock().unwrap().pop_front().flatten()
    }
}
