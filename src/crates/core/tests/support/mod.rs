#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use deepterm_core::{
    ChatRelay, ClientConfig, CompletionOutput, DeeptermError, DeeptermResult, PowSolver,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const TOKEN: &str = "test-token";

#[derive(Clone)]
pub enum CompletionReply {
    /// Body chunks, each flushed after a short pause.
    Sse(Vec<String>),
    Json(Value),
    Status(u16),
    /// Never-ending token stream; `MockUpstream::body_dropped` flips once the
    /// server releases it.
    Endless,
}

#[derive(Clone)]
pub struct MockConfig {
    pub challenge_available: bool,
    pub created_session_id: Option<String>,
    pub history: HashMap<String, Vec<i64>>,
    pub history_fails: bool,
    /// `delete_all` and `file/preview` answer 500.
    pub account_fails: bool,
    pub completion: CompletionReply,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            challenge_available: true,
            created_session_id: Some("session-new".to_string()),
            history: HashMap::new(),
            history_fails: false,
            account_fails: false,
            completion: CompletionReply::Sse(vec![]),
        }
    }
}

impl MockConfig {
    pub fn sse(chunks: &[&str]) -> Self {
        Self {
            completion: CompletionReply::Sse(chunks.iter().map(|c| c.to_string()).collect()),
            ..Self::default()
        }
    }
}

#[derive(Default)]
pub struct Recorded {
    pub authorizations: Vec<String>,
    pub challenge_targets: Vec<String>,
    pub completion_proofs: Vec<Option<String>>,
    pub completion_bodies: Vec<Value>,
    pub history_queries: Vec<HashMap<String, String>>,
    pub upload_proofs: Vec<Option<String>>,
    pub upload_bodies: Vec<Vec<u8>>,
    pub delete_all_referers: Vec<String>,
    pub preview_queries: Vec<HashMap<String, String>>,
    pub preview_referers: Vec<String>,
}

#[derive(Clone)]
struct MockState {
    config: Arc<MockConfig>,
    recorded: Arc<Mutex<Recorded>>,
    challenges_issued: Arc<AtomicUsize>,
    body_dropped: Arc<AtomicBool>,
}

impl MockState {
    fn record(&self, headers: &HeaderMap) -> MutexGuard<'_, Recorded> {
        let mut recorded = self.recorded.lock().unwrap();
        if let Some(auth) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            recorded.authorizations.push(auth.to_string());
        }
        recorded
    }
}

/// In-process stand-in for the upstream chat service.
pub struct MockUpstream {
    pub base_url: String,
    recorded: Arc<Mutex<Recorded>>,
    body_dropped: Arc<AtomicBool>,
}

impl MockUpstream {
    pub async fn spawn(config: MockConfig) -> Self {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let body_dropped = Arc::new(AtomicBool::new(false));
        let state = MockState {
            config: Arc::new(config),
            recorded: Arc::clone(&recorded),
            challenges_issued: Arc::new(AtomicUsize::new(0)),
            body_dropped: Arc::clone(&body_dropped),
        };

        let app = Router::new()
            .route("/api/v0/chat_session/create", post(create_session))
            .route("/api/v0/chat_session/fetch_page", get(fetch_page))
            .route("/api/v0/chat_session/delete_all", post(delete_all))
            .route("/api/v0/chat/history_messages", get(history_messages))
            .route("/api/v0/chat/create_pow_challenge", post(create_challenge))
            .route("/api/v0/chat/completion", post(completion))
            .route("/api/v0/file/upload_file", post(upload_file))
            .route("/api/v0/file/preview", get(file_preview))
            .route("/api/v0/users/current", get(current_user))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            recorded,
            body_dropped,
        }
    }

    pub fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }

    /// Whether an `Endless` completion body has been released by the server.
    pub fn body_dropped(&self) -> bool {
        self.body_dropped.load(Ordering::SeqCst)
    }

    pub fn relay(&self, solver: Arc<dyn PowSolver>) -> ChatRelay {
        ChatRelay::new(ClientConfig::with_base_url(&self.base_url), solver)
            .expect("relay builds")
    }
}

/// Base URL of a port nothing listens on.
pub async fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn envelope(biz_data: Value) -> Json<Value> {
    Json(json!({
        "code": 0,
        "msg": "",
        "data": { "biz_code": 0, "biz_msg": "", "biz_data": biz_data }
    }))
}

fn referer(headers: &HeaderMap) -> String {
    headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn pow_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-ds-pow-response")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn create_session(State(state): State<MockState>, headers: HeaderMap) -> Json<Value> {
    drop(state.record(&headers));
    match &state.config.created_session_id {
        Some(id) => envelope(json!({ "id": id, "title": null })),
        None => envelope(Value::Null),
    }
}

async fn fetch_page(State(state): State<MockState>, headers: HeaderMap) -> Json<Value> {
    drop(state.record(&headers));
    envelope(json!({
        "chat_sessions": [{ "id": "session-1", "title": "First chat", "updated_at": 1700000000.5 }],
        "has_more": false
    }))
}

async fn delete_all(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state
        .record(&headers)
        .delete_all_referers
        .push(referer(&headers));
    if state.config.account_fails {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    envelope(Value::Null).into_response()
}

async fn file_preview(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    {
        let mut recorded = state.record(&headers);
        recorded.preview_referers.push(referer(&headers));
        recorded.preview_queries.push(params.clone());
    }
    if state.config.account_fails {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let file_id = params.get("file_id").cloned().unwrap_or_default();
    envelope(json!({ "id": file_id, "status": "SUCCESS", "preview_url": "https://cdn.example/preview" }))
        .into_response()
}

async fn current_user(State(state): State<MockState>, headers: HeaderMap) -> Json<Value> {
    drop(state.record(&headers));
    envelope(json!({ "id": "user-1", "email": "user@example.com" }))
}

async fn history_messages(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.record(&headers).history_queries.push(params.clone());
    if state.config.history_fails {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let session_id = params.get("chat_session_id").cloned().unwrap_or_default();
    let messages: Vec<Value> = state
        .config
        .history
        .get(&session_id)
        .map(|ids| {
            ids.iter()
                .map(|id| json!({ "message_id": id, "role": "USER", "content": "earlier turn" }))
                .collect()
        })
        .unwrap_or_default();
    envelope(json!({ "chat_messages": messages })).into_response()
}

async fn create_challenge(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let target_path = body["target_path"].as_str().unwrap_or_default().to_string();
    state
        .record(&headers)
        .challenge_targets
        .push(target_path.clone());
    if !state.config.challenge_available {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let n = state.challenges_issued.fetch_add(1, Ordering::SeqCst) + 1;
    envelope(json!({
        "challenge": {
            "algorithm": "DeepSeekHashV1",
            "challenge": format!("challenge-{}", n),
            "salt": format!("salt-{}", n),
            "signature": "signature",
            "difficulty": 144000,
            "expire_at": 1700000000000i64,
            "expire_after": 300000,
            "target_path": target_path
        }
    }))
    .into_response()
}

async fn completion(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    {
        let mut recorded = state.record(&headers);
        recorded.completion_proofs.push(pow_header(&headers));
        recorded.completion_bodies.push(body);
    }

    match state.config.completion.clone() {
        CompletionReply::Json(value) => Json(value).into_response(),
        CompletionReply::Status(code) => StatusCode::from_u16(code).unwrap().into_response(),
        CompletionReply::Sse(chunks) => {
            let stream = futures::stream::iter(chunks).then(|chunk| async move {
                tokio::time::sleep(Duration::from_millis(25)).await;
                Ok::<_, Infallible>(chunk)
            });
            (
                [(header::CONTENT_TYPE, "text/event-stream; charset=utf-8")],
                Body::from_stream(stream),
            )
                .into_response()
        }
        CompletionReply::Endless => {
            let guard = DropFlag(Arc::clone(&state.body_dropped));
            let stream = futures::stream::unfold(guard, |guard| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Some((Ok::<_, Infallible>("data: {\"v\":\"tick\"}\n\n"), guard))
            });
            (
                [(header::CONTENT_TYPE, "text/event-stream; charset=utf-8")],
                Body::from_stream(stream),
            )
                .into_response()
        }
    }
}

async fn upload_file(
    State(state): State<MockState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    {
        let mut recorded = state.record(&headers);
        recorded.upload_proofs.push(pow_header(&headers));
        recorded.upload_bodies.push(body.to_vec());
    }
    envelope(json!({
        "id": "file-abc",
        "status": "PENDING",
        "file_name": "notes.txt",
        "file_size": 5
    }))
}

/// Sets its flag when the owning response body is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Answers every challenge with a fixed value and counts calls.
#[derive(Default)]
pub struct FixedSolver {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PowSolver for FixedSolver {
    async fn solve(
        &self,
        _challenge: &str,
        _salt: &str,
        _expire_at: i64,
        _difficulty: f64,
    ) -> DeeptermResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(4242)
    }
}

pub struct UnsolvableSolver;

#[async_trait]
impl PowSolver for UnsolvableSolver {
    async fn solve(
        &self,
        _challenge: &str,
        _salt: &str,
        _expire_at: i64,
        _difficulty: f64,
    ) -> DeeptermResult<u64> {
        Err(DeeptermError::PowNotFound)
    }
}

pub async fn collect_stream(output: CompletionOutput) -> Vec<String> {
    match output {
        CompletionOutput::Stream(stream) => stream.into_text_stream().collect().await,
        CompletionOutput::Aggregate(_) => panic!("expected stream output"),
    }
}

pub fn aggregate_text(output: CompletionOutput) -> String {
    match output {
        CompletionOutput::Aggregate(text) => text,
        CompletionOutput::Stream(_) => panic!("expected aggregate output"),
    }
}
