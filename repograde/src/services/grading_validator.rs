//! Grading validator and retrier
//!
//! Drives the single-attempt [`Grader`] through a fixed budget of two
//! attempts per job and validates each response against the rubric.
//!
//! # State Progression
//! NOT_STARTED → ATTEMPTING(1) → ATTEMPTING(2) → SUCCEEDED | FAILED
//!
//! Each attempt fails on the first problem found, in this order:
//! 1. The call returned nothing
//! 2. The content is not JSON, or not a JSON object
//! 3. Per rubric check, in declaration order: entry is an object, `score`
//!    and `max` are numbers, `reason` is a string, `max` matches the rubric
//!    and `0 <= score <= max`, and the entry has no other fields
//! 4. The response names a check the rubric does not declare
//!
//! On success the response is written as the result artifact and any stale
//! failure log is removed. When the budget runs out the failure log records
//! every attempt's error and no result artifact is written.

use crate::models::{CheckScore, GradingResponse, RepoIdentity};
use crate::services::artifact_store::ArtifactPaths;
use crate::services::grading_client::{Grader, GradingRequest};
use indexmap::IndexMap;
use repograde_common::{Result, Rubric};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Grading attempts per job
pub const ATTEMPT_BUDGET: u32 = 2;

/// Characters of unparsable content kept in the error message
const SNIPPET_CHARS: usize = 500;

/// Keys allowed inside one check entry
const ENTRY_FIELDS: [&str; 3] = ["score", "max", "reason"];

/// Why a response failed schema validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("invalid structure: {found}")]
    NotAnObject { found: &'static str },

    #[error("check {check}: invalid structure: {found}")]
    InvalidStructure { check: String, found: &'static str },

    #[error("check {check}: invalid types: score={score}, max={max}")]
    InvalidTypes {
        check: String,
        score: &'static str,
        max: &'static str,
    },

    #[error("check {check}: invalid reason type: {found}")]
    InvalidReasonType { check: String, found: &'static str },

    #[error("check {check}: invalid scores: score={score}, max={max}, expected_max={expected_max}")]
    InvalidScores {
        check: String,
        score: f64,
        max: f64,
        expected_max: f64,
    },

    #[error("check {check}: unexpected field {field}")]
    UnexpectedField { check: String, field: String },

    #[error("unexpected check {check}")]
    UnexpectedCheck { check: String },
}

/// Why one attempt failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptFailure {
    #[error("grading call failed")]
    CallFailed,

    #[error("invalid json: {snippet}")]
    InvalidJson { snippet: String },

    #[error(transparent)]
    Schema(#[from] SchemaViolation),
}

/// One recorded attempt error, rendered as a failure-log line
#[derive(Debug, Clone, PartialEq, Error)]
#[error("attempt {attempt}: {failure}")]
pub struct AttemptError {
    pub attempt: u32,
    pub failure: AttemptFailure,
}

/// A response that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    /// Response exactly as received, persisted as the result artifact
    pub raw: Value,
    pub response: GradingResponse,
    /// Attempts consumed, including the successful one
    pub attempts: u32,
    /// Errors from earlier attempts in the same sequence
    pub errors: Vec<AttemptError>,
}

/// Outcome of the grade step for one identity
#[derive(Debug, Clone, PartialEq)]
pub enum GradeOutcome {
    /// Result artifact already present; no calls made
    Cached,
    Graded { response: GradingResponse, attempts: u32 },
    Failed { errors: Vec<AttemptError> },
    /// Snapshot empty or unreadable; grading never started
    EmptySnapshot,
}

/// Validate a parsed response against the rubric
pub fn validate_response(
    rubric: &Rubric,
    value: &Value,
) -> std::result::Result<GradingResponse, SchemaViolation> {
    let object = value.as_object().ok_or(SchemaViolation::NotAnObject {
        found: json_type(Some(value)),
    })?;

    let mut checks = IndexMap::with_capacity(rubric.checks.len());

    for (name, spec) in &rubric.checks {
        let entry = object.get(name);
        let Some(fields) = entry.and_then(Value::as_object) else {
            return Err(SchemaViolation::InvalidStructure {
                check: name.clone(),
                found: json_type(entry),
            });
        };

        let score = fields.get("score");
        let max = fields.get("max");
        let (Some(score_val), Some(max_val)) = (
            score.and_then(Value::as_f64),
            max.and_then(Value::as_f64),
        ) else {
            return Err(SchemaViolation::InvalidTypes {
                check: name.clone(),
                score: json_type(score),
                max: json_type(max),
            });
        };

        let reason = fields.get("reason");
        let Some(reason) = reason.and_then(Value::as_str) else {
            return Err(SchemaViolation::InvalidReasonType {
                check: name.clone(),
                found: json_type(reason),
            });
        };

        if max_val != spec.max || score_val < 0.0 || score_val > spec.max {
            return Err(SchemaViolation::InvalidScores {
                check: name.clone(),
                score: score_val,
                max: max_val,
                expected_max: spec.max,
            });
        }

        if let Some(field) = fields.keys().find(|k| !ENTRY_FIELDS.contains(&k.as_str())) {
            return Err(SchemaViolation::UnexpectedField {
                check: name.clone(),
                field: field.clone(),
            });
        }

        checks.insert(
            name.clone(),
            CheckScore {
                score: score_val,
                max: max_val,
                reason: reason.to_string(),
            },
        );
    }

    if let Some(extra) = object.keys().find(|k| rubric.get(k).is_none()) {
        return Err(SchemaViolation::UnexpectedCheck {
            check: extra.clone(),
        });
    }

    Ok(GradingResponse::new(checks))
}

/// JSON type name used in error messages
fn json_type(value: Option<&Value>) -> &'static str {
    match value {
        None => "missing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "bool",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

/// Multi-attempt grading orchestrator
pub struct GradingValidator {
    grader: Arc<dyn Grader>,
    rubric: Arc<Rubric>,
    model: String,
    system_prompt: String,
    schema: Value,
}

impl GradingValidator {
    pub fn new(grader: Arc<dyn Grader>, rubric: Arc<Rubric>, model: impl Into<String>) -> Self {
        let system_prompt = rubric.system_prompt();
        let schema = rubric.response_schema();
        Self {
            grader,
            rubric,
            model: model.into(),
            system_prompt,
            schema,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Run up to [`ATTEMPT_BUDGET`] attempts against `snapshot`
    ///
    /// Touches no files; the caller decides what to persist.
    pub async fn run_attempts(&self, snapshot: &str) -> std::result::Result<Validated, Vec<AttemptError>> {
        let request = GradingRequest {
            model: &self.model,
            system_prompt: &self.system_prompt,
            snapshot,
            schema: &self.schema,
        };

        let mut errors = Vec::new();

        for attempt in 1..=ATTEMPT_BUDGET {
            tracing::debug!(attempt, "Grading attempt");

            match self.attempt(&request).await {
                Ok((raw, response)) => {
                    return Ok(Validated {
                        raw,
                        response,
                        attempts: attempt,
                        errors,
                    });
                }
                Err(failure) => {
                    let error = AttemptError { attempt, failure };
                    tracing::warn!(attempt, error = %error, "Grading attempt rejected");
                    errors.push(error);
                }
            }
        }

        Err(errors)
    }

    async fn attempt(
        &self,
        request: &GradingRequest<'_>,
    ) -> std::result::Result<(Value, GradingResponse), AttemptFailure> {
        let content = self
            .grader
            .grade(request)
            .await
            .ok_or(AttemptFailure::CallFailed)?;

        let raw: Value = serde_json::from_str(&content).map_err(|_| AttemptFailure::InvalidJson {
            snippet: content.chars().take(SNIPPET_CHARS).collect(),
        })?;

        let response = validate_response(&self.rubric, &raw)?;
        Ok((raw, response))
    }

    /// Grade one identity's snapshot and persist the outcome
    ///
    /// Returns `Err` only for local filesystem failures.
    pub async fn grade(&self, identity: &RepoIdentity, paths: &ArtifactPaths) -> Result<GradeOutcome> {
        if paths.has_result() {
            tracing::debug!(identity = %identity, "Result cached, skipping grading");
            return Ok(GradeOutcome::Cached);
        }

        // Invalid UTF-8 is replaced, not rejected; only a missing or empty file stops here
        let snapshot = match tokio::fs::read(&paths.snapshot).await {
            Ok(bytes) if !bytes.is_empty() => String::from_utf8_lossy(&bytes).into_owned(),
            _ => {
                paths.append_failure_log(&format!(
                    "Empty or unreadable snapshot: {}",
                    paths.snapshot.display()
                ))?;
                tracing::warn!(identity = %identity, "Snapshot empty or unreadable");
                return Ok(GradeOutcome::EmptySnapshot);
            }
        };

        match self.run_attempts(&snapshot).await {
            Ok(validated) => {
                paths.write_result(&validated.raw)?;
                paths.clear_failure_log()?;
                tracing::info!(
                    identity = %identity,
                    attempts = validated.attempts,
                    total = validated.response.total(),
                    "Grading succeeded"
                );
                Ok(GradeOutcome::Graded {
                    response: validated.response,
                    attempts: validated.attempts,
                })
            }
            Err(errors) => {
                paths.write_failure_log(&self.failure_log(paths, &errors))?;
                tracing::error!(
                    identity = %identity,
                    attempts = errors.len(),
                    log = %paths.failure_log.display(),
                    "Grading failed, attempt budget exhausted"
                );
                Ok(GradeOutcome::Failed { errors })
            }
        }
    }

    fn failure_log(&self, paths: &ArtifactPaths, errors: &[AttemptError]) -> String {
        let lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
        format!(
            "eval failure\nfile: {}\nmodel: {}\nattempts: {}\ntime: {}\n\n{}\n",
            paths.snapshot_file_name(),
            self.model,
            errors.len(),
            chrono::Utc::now().to_rfc3339(),
            lines.join("\n")
        )
    }
}
