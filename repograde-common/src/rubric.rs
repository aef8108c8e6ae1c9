//! Grading rubric
//!
//! A rubric is a TOML document with shared instructions and an ordered set
//! of bounded-score checks:
//!
//! ```toml
//! instructions = "You are grading a browser-based LLM agent."
//!
//! [checks.agent_loop]
//! max = 0.2
//! check = "Implements an agent loop that feeds tool results back to the model."
//! ```
//!
//! Declaration order is preserved; it drives the prompt layout and the
//! order in which responses are validated.

use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

/// One named check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    /// Highest score the check can award
    pub max: f64,
    /// Free-text criterion shown to the grader
    #[serde(rename = "check")]
    pub description: String,
}

/// Loaded rubric (immutable for the duration of a run)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub checks: IndexMap<String, CheckSpec>,
}

impl Rubric {
    /// Read and validate a rubric file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read rubric {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate rubric text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let rubric: Rubric = toml::from_str(content)?;
        rubric.validate()?;
        Ok(rubric)
    }

    /// Every check must have a non-empty name and a positive, finite max
    pub fn validate(&self) -> Result<()> {
        if self.checks.is_empty() {
            return Err(Error::Config("Rubric declares no checks".to_string()));
        }
        for (name, spec) in &self.checks {
            if name.trim().is_empty() {
                return Err(Error::Config("Rubric check with empty name".to_string()));
            }
            if !spec.max.is_finite() || spec.max <= 0.0 {
                return Err(Error::Config(format!(
                    "Rubric check {}: max must be a positive number, got {}",
                    name, spec.max
                )));
            }
        }
        Ok(())
    }

    /// Check names in declaration order
    pub fn check_names(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&CheckSpec> {
        self.checks.get(name)
    }

    /// System prompt: instructions followed by one line per check
    pub fn system_prompt(&self) -> String {
        let mut prompt = self.instructions.trim().to_string();
        for (name, spec) in &self.checks {
            prompt.push_str(&format!(
                "\n\n[{}] (max {}): {}",
                name,
                spec.max,
                spec.description.trim()
            ));
        }
        prompt
    }

    /// Closed JSON schema for the grading response
    ///
    /// One required property per check; each is an object with a numeric
    /// `score`, a `max` pinned to the declared maximum, and a string
    /// `reason`. No additional properties at either level.
    pub fn response_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::with_capacity(self.checks.len());

        for (name, spec) in &self.checks {
            properties.insert(
                name.clone(),
                json!({
                    "type": "object",
                    "properties": {
                        "score": {"type": "number"},
                        "max": {"type": "number", "const": spec.max},
                        "reason": {"type": "string"},
                    },
                    "required": ["score", "max", "reason"],
                    "additionalProperties": false,
                }),
            );
            required.push(Value::String(name.clone()));
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}
