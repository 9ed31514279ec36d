use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use deepterm_core::{ChatRelay, ClientConfig, DeeptermError, DeeptermResult, PowSolver};
use deepterm_relay_server::{app, AppState};
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

struct NoopSolver;

#[async_trait]
impl PowSolver for NoopSolver {
    async fn solve(&self, _: &str, _: &str, _: i64, _: f64) -> DeeptermResult<u64> {
        Err(DeeptermError::Solver("not used".to_string()))
    }
}

/// Upstream that only knows the completion route; every other call 404s.
async fn spawn_upstream() -> String {
    let upstream = Router::new().route(
        "/api/v0/chat/completion",
        post(|| async {
            let chunks = futures_util::stream::iter([
                "data: {\"v\":\"Hel\"}\n\n",
                "data: {\"v\":\"lo\"}\n\n",
                "data: {\"v\":\"FINISHED\"}\n\n",
            ])
            .map(Ok::<_, Infallible>);
            (
                [(header::CONTENT_TYPE, "text/event-stream")],
                Body::from_stream(chunks),
            )
                .into_response()
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn server() -> Router {
    let relay = ChatRelay::new(
        ClientConfig::with_base_url(spawn_upstream().await),
        Arc::new(NoopSolver),
    )
    .unwrap();
    app(AppState { relay })
}

fn post_completion(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/completion")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let response = server()
        .await
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn missing_prompt_is_a_bad_request() {
    let response = server()
        .await
        .oneshot(post_completion(r#"{"token":"t"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Missing \"token\" or \"prompt\"" })
    );
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let response = server()
        .await
        .oneshot(post_completion("{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn aggregate_mode_returns_result_document() {
    let response = server()
        .await
        .oneshot(post_completion(
            r#"{"token":"t","prompt":"hi","sessid":"s-1","stream":false}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "result": "Hello" }));
}

#[tokio::test]
async fn stream_mode_sends_tokens_then_end_event() {
    let response = server()
        .await
        .oneshot(post_completion(r#"{"token":"t","prompt":"hi","sessid":"s-1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let events: Vec<(String, String)> = response
        .into_body()
        .into_data_stream()
        .eventsource()
        .map(|event| {
            let event = event.unwrap();
            (event.event, event.data)
        })
        .collect()
        .await;
    assert_eq!(
        events,
        vec![
            ("message".to_string(), "Hel".to_string()),
            ("message".to_string(), "lo".to_string()),
            ("end".to_string(), "[DONE]".to_string()),
        ]
    );
}

#[tokio::test]
async fn session_creation_failure_is_an_internal_error() {
    let response = server()
        .await
        .oneshot(post_completion(r#"{"token":"t","prompt":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Internal server error" })
    );
}
