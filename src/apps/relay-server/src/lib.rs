//! DeepTerm Relay Server
//!
//! `POST /completion` runs one prompt through the relay and answers either
//! as a server-sent event stream or as a single JSON document.

pub mod config;
pub mod logging;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use deepterm_core::{
    ChatRelay, CompletionOptions, CompletionOutput, DeeptermError, DeliveryMode,
};
use futures_util::{stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tower_http::cors::CorsLayer;

const STREAM_END_EVENT: &str = "end";
const STREAM_END_DATA: &str = "[DONE]";

#[derive(Clone)]
pub struct AppState {
    pub relay: ChatRelay,
}

fn default_true() -> bool {
    true
}

/// Body of `POST /completion`.
#[derive(Debug, Deserialize)]
pub struct CompletionPayload {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Existing session to continue; a new one is created when absent.
    #[serde(default)]
    pub sessid: Option<String>,
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(default = "default_true")]
    pub search: bool,
    #[serde(default)]
    pub thinking: bool,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

impl CompletionPayload {
    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            search_enabled: self.search,
            thinking_enabled: self.thinking,
            file_ids: self.file_ids.clone(),
        }
    }
}

pub enum ApiError {
    BadRequest(String),
    Internal,
}

impl From<DeeptermError> for ApiError {
    fn from(err: DeeptermError) -> Self {
        match err {
            DeeptermError::AuthMissing => ApiError::BadRequest(err.to_string()),
            other => {
                tracing::error!("[ERROR] {}", other);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/completion", post(completion))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn completion(
    State(state): State<AppState>,
    payload: Result<Json<CompletionPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::warn!("Rejected completion body: {}", rejection);
        ApiError::from(DeeptermError::AuthMissing)
    })?;

    let token = payload.token.as_deref().unwrap_or_default();
    let prompt = payload.prompt.as_deref().unwrap_or_default();
    let mode = DeliveryMode::from_stream_flag(payload.stream);

    let output = state
        .relay
        .relay(token, prompt, payload.sessid.as_deref(), mode, payload.options())
        .await?;

    Ok(match output {
        CompletionOutput::Stream(completion) => {
            let events = completion
                .into_text_stream()
                .map(|text| Ok::<_, Infallible>(Event::default().data(sse_data(&text))))
                .chain(stream::once(async {
                    Ok(Event::default()
                        .event(STREAM_END_EVENT)
                        .data(STREAM_END_DATA))
                }));
            Sse::new(events).into_response()
        }
        CompletionOutput::Aggregate(result) => Json(json!({ "result": result })).into_response(),
    })
}

/// SSE data fields cannot carry carriage returns.
fn sse_data(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
