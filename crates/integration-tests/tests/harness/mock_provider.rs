//! Mock model provider for integration tests
//!
//! Accepts POSTs on any path, records what it received and answers with a
//! scripted sequence of replies (the last one repeats).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// JSON body with a status
    Json(StatusCode, Value),
    /// `text/event-stream` body sent verbatim
    Stream(String),
    /// Arbitrary text body with a status
    Text(StatusCode, String),
    /// Answer only after the delay
    Delayed(Duration, Box<Reply>),
    /// `text/event-stream` body repeating `data: <event>` forever
    Endless(String),
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self::Json(StatusCode::OK, body)
    }

    /// SSE body from `data:` payloads, each followed by a blank line
    pub fn sse(events: &[&str]) -> Self {
        Self::Stream(events.iter().map(|e| format!("data: {e}\n\n")).collect())
    }
}

/// A request as the mock received it
#[derive(Debug, Clone)]
pub struct Recorded {
    /// Path and query
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Value,
}

struct MockState {
    request_count: AtomicU32,
    replies: Vec<Reply>,
    recorded: Mutex<Vec<Recorded>>,
    stream_dropped: AtomicBool,
}

/// Marks the endless body as dropped once the server lets go of it
struct DropGuard(Arc<MockState>);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.stream_dropped.store(true, Ordering::SeqCst);
    }
}

/// In-process provider on an ephemeral port
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockProvider {
    /// Start a mock that always answers with `reply`
    pub async fn start(reply: Reply) -> anyhow::Result<Self> {
        Self::start_sequence(vec![reply]).await
    }

    /// Start a mock answering the n-th request with the n-th reply
    pub async fn start_sequence(replies: Vec<Reply>) -> anyhow::Result<Self> {
        anyhow::ensure!(!replies.is_empty(), "mock needs at least one reply");

        let state = Arc::new(MockState {
            request_count: AtomicU32::new(0),
            replies,
            recorded: Mutex::new(Vec::new()),
            stream_dropped: AtomicBool::new(false),
        });

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL with a `/v1` prefix
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Root URL, for Azure-style `openai_api_base`
    pub fn root_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.recorded.lock().unwrap().clone()
    }

    /// Whether an endless body has been released by the server
    pub fn stream_dropped(&self) -> bool {
        self.state.stream_dropped.load(Ordering::SeqCst)
    }

    /// The most recent request
    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("mock received no requests")
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(State(state): State<Arc<MockState>>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let n = state.request_count.fetch_add(1, Ordering::Relaxed) as usize;

    state.recorded.lock().unwrap().push(Recorded {
        uri: uri.to_string(),
        headers,
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let mut reply = state.replies[n.min(state.replies.len() - 1)].clone();
    while let Reply::Delayed(delay, inner) = reply {
        tokio::time::sleep(delay).await;
        reply = *inner;
    }
    respond(reply, &state)
}

fn respond(reply: Reply, state: &Arc<MockState>) -> Response {
    match reply {
        Reply::Delayed(..) => unreachable!("delays are awaited before responding"),
        Reply::Json(status, body) => (status, axum::Json(body)).into_response(),
        Reply::Stream(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/event-stream")],
            Body::from(body),
        )
            .into_response(),
        Reply::Text(status, body) => (status, body).into_response(),
        Reply::Endless(event) => {
            let guard = DropGuard(Arc::clone(state));
            let events = stream::unfold((guard, format!("data: {event}\n\n")), |(guard, event)| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let bytes = Bytes::from(event.clone());
                Some((Ok::<_, Infallible>(bytes), (guard, event)))
            });
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/event-stream")],
                Body::from_stream(events),
            )
                .into_response()
        }
    }
}

// -- Canned provider bodies --

/// `OpenAI` chat completion body
pub fn chat_completion(model: &str, content: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop",
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
    })
}

/// Gateway envelope around `data`
pub fn envelope(data: Value) -> Value {
    json!({"success": true, "errorCode": null, "errorMessage": null, "data": data})
}

/// Stream chunk carrying a content delta
pub fn delta(content: &str) -> String {
    json!({"choices": [{"index": 0, "delta": {"content": content}}]}).to_string()
}

/// Stream chunk carrying only a finish reason
pub fn finish(reason: &str) -> String {
    json!({"choices": [{"index": 0, "delta": {}, "finish_reason": reason}]}).to_string()
}

/// `OpenAI` embeddings body with one vector per dimension seed
pub fn embeddings(seeds: &[f32]) -> Value {
    let data: Vec<Value> = seeds
        .iter()
        .enumerate()
        .map(|(index, seed)| json!({"object": "embedding", "index": index, "embedding": [seed, seed * 2.0]}))
        .collect();
    json!({
        "object": "list",
        "data": data,
        "model": "text-embedding-3-small",
        "usage": {"prompt_tokens": 4, "total_tokens": 4},
    })
}
