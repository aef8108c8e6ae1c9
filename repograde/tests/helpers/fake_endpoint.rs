//! Local chat-completions endpoint with scripted replies

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Scripted {
    /// 200 with `choices[0].message.content` set to this text
    Content(String),
    /// Bare status code with a plain-text body
    Status(u16),
    /// 200 with this exact JSON body
    Body(Value),
    /// Record the request and never answer
    Hang,
}

/// Request as seen by the endpoint
#[derive(Debug, Clone)]
pub struct Recorded {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct EndpointState {
    replies: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Recorded>>,
}

pub struct FakeEndpoint {
    pub url: String,
    state: Arc<EndpointState>,
}

impl FakeEndpoint {
    /// Bind to an ephemeral port and serve `replies` in order
    ///
    /// Requests beyond the script get a 500.
    pub async fn start(replies: Vec<Scripted>) -> Self {
        let state = Arc::new(EndpointState {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/chat/completions", post(chat))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake endpoint");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake endpoint server");
        });

        Self {
            url: format!("http://{}/v1/chat/completions", addr),
            state,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

async fn chat(
    State(state): State<Arc<EndpointState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.requests.lock().unwrap().push(Recorded {
        authorization,
        body,
    });

    let reply = state.replies.lock().unwrap().pop_front();
    match reply {
        Some(Scripted::Content(content)) => Json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
        .into_response(),
        Some(Scripted::Status(code)) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "scripted failure",
        )
            .into_response(),
        Some(Scripted::Body(body)) => Json(body).into_response(),
        Some(Scripted::Hang) => std::future::pending().await,
        None => (StatusCode::INTERNAL_SERVER_ERROR, "script exhausted").into_response(),
    }
}
