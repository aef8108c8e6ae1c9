//! LLM grading client
//!
//! Sends one snapshot to an OpenAI-compatible chat-completions endpoint and
//! asks for a response constrained by the rubric's closed JSON schema.
//!
//! The client makes exactly one attempt per call. Every failure (transport
//! error, timeout, non-success status, missing content) collapses to `None`
//! at the [`Grader`] boundary; retry policy lives in the validator.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("repograde/", env!("CARGO_PKG_VERSION"));

/// Everything needed for one grading call
#[derive(Debug, Clone, Copy)]
pub struct GradingRequest<'a> {
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub snapshot: &'a str,
    pub schema: &'a Value,
}

/// Single-attempt grading backend
#[async_trait]
pub trait Grader: Send + Sync {
    /// Raw response content, or `None` if the call failed
    async fn grade(&self, request: &GradingRequest<'_>) -> Option<String>;
}

/// Grading client errors (internal; logged, then reported as `None`)
#[derive(Debug, Error)]
pub enum GradingClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Response has no message content")]
    EmptyContent,
}

/// Chat-completions grading client
pub struct GradingClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GradingClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GradingClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GradingClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Request body for one grading call
    pub fn request_body(request: &GradingRequest<'_>) -> Value {
        json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.snapshot},
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {"name": "checks", "schema": request.schema},
            },
        })
    }

    async fn try_grade(&self, request: &GradingRequest<'_>) -> Result<String, GradingClientError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| GradingClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GradingClientError::Api(status.as_u16(), error_text));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GradingClientError::Parse(e.to_string()))?;

        extract_content(&body).ok_or(GradingClientError::EmptyContent)
    }
}

#[async_trait]
impl Grader for GradingClient {
    async fn grade(&self, request: &GradingRequest<'_>) -> Option<String> {
        tracing::debug!(
            model = request.model,
            snapshot_bytes = request.snapshot.len(),
            "Sending grading request"
        );

        match self.try_grade(request).await {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!(error = %e, "Grading call failed");
                None
            }
        }
    }
}

/// `choices[0].message.content`, if it is a non-blank string
fn extract_content(body: &Value) -> Option<String> {
    let content = body
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?;
    if content.trim().is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}
