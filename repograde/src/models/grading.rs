//! Validated grading response

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Score awarded for one rubric check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckScore {
    pub score: f64,
    pub max: f64,
    pub reason: String,
}

/// A grading response that passed validation against the rubric
///
/// Keys follow rubric declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradingResponse {
    checks: IndexMap<String, CheckScore>,
}

impl GradingResponse {
    pub fn new(checks: IndexMap<String, CheckScore>) -> Self {
        Self { checks }
    }

    pub fn get(&self, check: &str) -> Option<&CheckScore> {
        self.checks.get(check)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CheckScore)> {
        self.checks.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Sum of all awarded scores
    pub fn total(&self) -> f64 {
        self.checks.values().map(|c| c.score).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_and_order() {
        let mut checks = IndexMap::new();
        checks.insert(
            "b".to_string(),
            CheckScore { score: 0.5, max: 1.0, reason: "ok".into() },
        );
        checks.insert(
            "a".to_string(),
            CheckScore { score: 0.25, max: 0.5, reason: String::new() },
        );
        let response = GradingResponse::new(checks);

        assert_eq!(response.total(), 0.75);
        let names: Vec<&str> = response.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut checks = IndexMap::new();
        checks.insert(
            "agent_loop".to_string(),
            CheckScore { score: 0.1, max: 0.2, reason: "r".into() },
        );
        let json = serde_json::to_string(&GradingResponse::new(checks)).unwrap();
        assert_eq!(json, r#"{"agent_loop":{"score":0.1,"max":0.2,"reason":"r"}}"#);
    }
}
