//! Grading client and validator integration tests
//!
//! The validator runs against a scripted in-process grader; the HTTP client
//! runs against a local axum server speaking the chat-completions shape.

mod helpers;

use helpers::{agent_loop_response, agent_loop_rubric, FakeEndpoint, Scripted, ScriptedGrader};
use repograde::models::RepoIdentity;
use repograde::services::{
    ArtifactPaths, ArtifactStore, GradeOutcome, Grader, GradingClient, GradingRequest,
    GradingValidator,
};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn setup(dir: &TempDir, snapshot: &str) -> (RepoIdentity, ArtifactPaths) {
    let identity = RepoIdentity::new("octo", "demo").unwrap();
    let paths = ArtifactStore::new(dir.path()).paths(&identity);
    fs::write(&paths.snapshot, snapshot).unwrap();
    (identity, paths)
}

fn validator(grader: Arc<ScriptedGrader>) -> GradingValidator {
    GradingValidator::new(grader, Arc::new(agent_loop_rubric()), "gpt-5-mini")
}

#[tokio::test]
async fn test_valid_response_persisted_once() {
    let dir = TempDir::new().unwrap();
    let (identity, paths) = setup(&dir, "repo");
    let grader = Arc::new(ScriptedGrader::new(vec![Some(agent_loop_response(0.15))]));

    let outcome = validator(grader.clone()).grade(&identity, &paths).await.unwrap();

    assert!(matches!(outcome, GradeOutcome::Graded { attempts: 1, .. }));
    assert_eq!(grader.calls(), 1);
    assert_eq!(grader.snapshots(), vec!["repo".to_string()]);
    assert_eq!(
        fs::read_to_string(&paths.result).unwrap(),
        r#"{"agent_loop":{"score":0.15,"max":0.2,"reason":"loop present"}}"#
    );
    assert!(!paths.has_failure_log());
}

#[tokio::test]
async fn test_out_of_range_then_valid_retry() {
    let dir = TempDir::new().unwrap();
    let (identity, paths) = setup(&dir, "repo");
    fs::write(&paths.failure_log, "old failure\n").unwrap();
    let grader = Arc::new(ScriptedGrader::new(vec![
        Some(agent_loop_response(0.4)),
        Some(agent_loop_response(0.1)),
    ]));

    let outcome = validator(grader.clone()).grade(&identity, &paths).await.unwrap();

    match outcome {
        GradeOutcome::Graded { response, attempts } => {
            assert_eq!(attempts, 2);
            assert_eq!(response.get("agent_loop").unwrap().score, 0.1);
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(grader.calls(), 2);
    assert_eq!(
        fs::read_to_string(&paths.result).unwrap(),
        r#"{"agent_loop":{"score":0.1,"max":0.2,"reason":"loop present"}}"#
    );
    assert!(!paths.has_failure_log());
}

#[tokio::test]
async fn test_out_of_range_records_exactly_one_error() {
    let grader = Arc::new(ScriptedGrader::new(vec![
        Some(agent_loop_response(0.4)),
        Some(agent_loop_response(0.1)),
    ]));

    let validated = validator(grader).run_attempts("repo").await.unwrap();

    assert_eq!(validated.attempts, 2);
    assert_eq!(validated.errors.len(), 1);
    assert_eq!(
        validated.errors[0].to_string(),
        "attempt 1: check agent_loop: invalid scores: score=0.4, max=0.2, expected_max=0.2"
    );
}

#[tokio::test]
async fn test_two_invalid_attempts_write_failure_log() {
    let dir = TempDir::new().unwrap();
    let (identity, paths) = setup(&dir, "repo");
    let grader = Arc::new(ScriptedGrader::new(vec![
        Some("this is not json".to_string()),
        None,
    ]));

    let outcome = validator(grader.clone()).grade(&identity, &paths).await.unwrap();

    match outcome {
        GradeOutcome::Failed { errors } => assert_eq!(errors.len(), 2),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(grader.calls(), 2);
    assert!(!paths.has_result());

    let log = fs::read_to_string(&paths.failure_log).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines[0], "eval failure");
    assert_eq!(lines[1], "file: octo.demo.txt");
    assert_eq!(lines[2], "model: gpt-5-mini");
    assert_eq!(lines[3], "attempts: 2");
    assert!(lines[4].starts_with("time: "));
    assert!(chrono::DateTime::parse_from_rfc3339(&lines[4]["time: ".len()..]).is_ok());
    assert_eq!(lines[5], "");

    let entries: Vec<&str> = lines[6..].iter().copied().filter(|l| l.starts_with("attempt ")).collect();
    assert_eq!(
        entries,
        vec!["attempt 1: invalid json: this is not json", "attempt 2: grading call failed"]
    );
}

#[tokio::test]
async fn test_invalid_json_snippet_truncated() {
    let long = "x".repeat(2000);
    let grader = Arc::new(ScriptedGrader::new(vec![Some(long.clone()), Some(long)]));

    let errors = validator(grader).run_attempts("repo").await.unwrap_err();

    assert_eq!(errors.len(), 2);
    assert_eq!(
        errors[0].to_string(),
        format!("attempt 1: invalid json: {}", "x".repeat(500))
    );
}

#[tokio::test]
async fn test_extra_check_rejected() {
    let reply = r#"{"agent_loop":{"score":0.1,"max":0.2,"reason":"ok"},"bonus":{"score":1,"max":1,"reason":""}}"#;
    let grader = Arc::new(ScriptedGrader::new(vec![
        Some(reply.to_string()),
        Some(reply.to_string()),
    ]));

    let errors = validator(grader).run_attempts("repo").await.unwrap_err();

    assert_eq!(errors[1].to_string(), "attempt 2: unexpected check bonus");
}

#[tokio::test]
async fn test_non_utf8_snapshot_still_graded() {
    let dir = TempDir::new().unwrap();
    let (identity, paths) = setup(&dir, "");
    fs::write(&paths.snapshot, b"fn main() {} // caf\xe9\n").unwrap();
    let grader = Arc::new(ScriptedGrader::new(vec![Some(agent_loop_response(0.1))]));

    let outcome = validator(grader.clone()).grade(&identity, &paths).await.unwrap();

    assert!(matches!(outcome, GradeOutcome::Graded { attempts: 1, .. }));
    assert_eq!(grader.snapshots(), vec!["fn main() {} // caf\u{fffd}\n".to_string()]);
    assert!(paths.has_result());
    assert!(!paths.has_failure_log());
}

#[tokio::test]
async fn test_existing_result_means_zero_calls() {
    let dir = TempDir::new().unwrap();
    let (identity, paths) = setup(&dir, "repo");
    let existing = "{\"agent_loop\": {\"score\": 0.2, \"max\": 0.2, \"reason\": \"kept\"}}";
    fs::write(&paths.result, existing).unwrap();
    let grader = Arc::new(ScriptedGrader::new(vec![Some(agent_loop_response(0.0))]));

    let outcome = validator(grader.clone()).grade(&identity, &paths).await.unwrap();

    assert_eq!(outcome, GradeOutcome::Cached);
    assert_eq!(grader.calls(), 0);
    assert_eq!(fs::read_to_string(&paths.result).unwrap(), existing);
}

#[tokio::test]
async fn test_empty_snapshot_never_reaches_grader() {
    let dir = TempDir::new().unwrap();
    let (identity, paths) = setup(&dir, "");
    let grader = Arc::new(ScriptedGrader::new(vec![Some(agent_loop_response(0.1))]));

    let outcome = validator(grader.clone()).grade(&identity, &paths).await.unwrap();

    assert_eq!(outcome, GradeOutcome::EmptySnapshot);
    assert_eq!(grader.calls(), 0);
    assert!(!paths.has_result());
    assert!(paths.has_failure_log());
}

fn request_parts() -> (String, serde_json::Value) {
    let rubric = agent_loop_rubric();
    (rubric.system_prompt(), rubric.response_schema())
}

#[tokio::test]
async fn test_client_sends_schema_request_with_bearer_auth() {
    let endpoint = FakeEndpoint::start(vec![Scripted::Content(agent_loop_response(0.1))]).await;
    let client = GradingClient::new(&endpoint.url, "sk-test", Duration::from_secs(5)).unwrap();
    let (prompt, schema) = request_parts();

    let content = client
        .grade(&GradingRequest {
            model: "gpt-5-mini",
            system_prompt: &prompt,
            snapshot: "repo",
            schema: &schema,
        })
        .await;

    assert_eq!(content, Some(agent_loop_response(0.1)));

    let requests = endpoint.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer sk-test"));

    let body = &requests[0].body;
    assert_eq!(body["model"], "gpt-5-mini");
    assert_eq!(body["messages"][0]["content"], json!(prompt));
    assert_eq!(body["messages"][1]["content"], "repo");
    assert_eq!(body["response_format"]["type"], "json_schema");
    assert_eq!(body["response_format"]["json_schema"]["schema"], schema);
    assert_eq!(
        body["response_format"]["json_schema"]["schema"]["properties"]["agent_loop"]["properties"]["max"]["const"],
        json!(0.2)
    );
}

#[tokio::test]
async fn test_client_failures_collapse_to_none() {
    let endpoint = FakeEndpoint::start(vec![
        Scripted::Status(429),
        Scripted::Content("   ".to_string()),
        Scripted::Body(json!({"choices": []})),
    ])
    .await;
    let client = GradingClient::new(&endpoint.url, "sk-test", Duration::from_secs(5)).unwrap();
    let (prompt, schema) = request_parts();
    let request = GradingRequest {
        model: "gpt-5-mini",
        system_prompt: &prompt,
        snapshot: "repo",
        schema: &schema,
    };

    for _ in 0..3 {
        assert_eq!(client.grade(&request).await, None);
    }
    assert_eq!(endpoint.request_count(), 3);
}

#[tokio::test]
async fn test_client_unreachable_endpoint() {
    // Bind then drop to get a port with nothing listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GradingClient::new(
        format!("http://{}/v1/chat/completions", addr),
        "sk-test",
        Duration::from_secs(2),
    )
    .unwrap();
    let (prompt, schema) = request_parts();

    let content = client
        .grade(&GradingRequest {
            model: "m",
            system_prompt: &prompt,
            snapshot: "repo",
            schema: &schema,
        })
        .await;

    assert_eq!(content, None);
}

#[tokio::test]
async fn test_validator_over_http_retries_once() {
    let dir = TempDir::new().unwrap();
    let (identity, paths) = setup(&dir, "repo");
    let endpoint = FakeEndpoint::start(vec![
        Scripted::Status(500),
        Scripted::Content(agent_loop_response(0.2)),
    ])
    .await;
    let client = GradingClient::new(&endpoint.url, "sk-test", Duration::from_secs(5)).unwrap();
    let validator = GradingValidator::new(Arc::new(client), Arc::new(agent_loop_rubric()), "gpt-5-mini");

    let outcome = validator.grade(&identity, &paths).await.unwrap();

    assert!(matches!(outcome, GradeOutcome::Graded { attempts: 2, .. }));
    assert_eq!(endpoint.request_count(), 2);
    assert!(paths.has_result());
}

#[tokio::test]
async fn test_client_timeout_is_a_failed_call() {
    let endpoint = FakeEndpoint::start(vec![Scripted::Hang]).await;
    let client = GradingClient::new(&endpoint.url, "sk-test", Duration::from_millis(300)).unwrap();
    let (prompt, schema) = request_parts();

    let started = std::time::Instant::now();
    let content = client
        .grade(&GradingRequest {
            model: "gpt-5-mini",
            system_prompt: &prompt,
            snapshot: "repo",
            schema: &schema,
        })
        .await;

    assert_eq!(content, None);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(endpoint.request_count(), 1);
}

#[tokio::test]
async fn test_validator_records_timeouts_as_failed_calls() {
    let dir = TempDir::new().unwrap();
    let (identity, paths) = setup(&dir, "repo");
    let endpoint = FakeEndpoint::start(vec![Scripted::Hang, Scripted::Hang]).await;
    let client = GradingClient::new(&endpoint.url, "sk-test", Duration::from_millis(300)).unwrap();
    let validator = GradingValidator::new(Arc::new(client), Arc::new(agent_loop_rubric()), "gpt-5-mini");

    let outcome = validator.grade(&identity, &paths).await.unwrap();

    match outcome {
        GradeOutcome::Failed { errors } => {
            let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
            assert_eq!(
                rendered,
                vec!["attempt 1: grading call failed", "attempt 2: grading call failed"]
            );
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(endpoint.request_count(), 2);
    assert!(!paths.has_result());
    assert!(fs::read_to_string(&paths.failure_log)
        .unwrap()
        .contains("attempt 2: grading call failed"));
}
