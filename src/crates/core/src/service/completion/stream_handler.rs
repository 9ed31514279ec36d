use super::frame::{extract_chunk_events, CompletionEvent, CompletionFailure};
use crate::util::utf8::Utf8StreamDecoder;
use futures::{Stream, StreamExt};
use log::{debug, error, trace};
use reqwest::header::CONTENT_TYPE;
use reqwest::Response;
use serde_json::Value;
use std::fmt::Display;
use tokio::sync::mpsc;

const JSON_MIME_TYPE: &str = "application/json";

fn is_json_response(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|content_type| content_type.contains(JSON_MIME_TYPE))
        .unwrap_or(false)
}

/// Forward a successful completion response to `tx_event`
///
/// A JSON document is delivered as one token holding its serialized text;
/// any other body is read as a chunked stream.
pub async fn handle_completion_response(
    response: Response,
    tx_event: &mpsc::Sender<CompletionEvent>,
) {
    if is_json_response(&response) {
        let event = match response.json::<Value>().await {
            Ok(json) => CompletionEvent::Token(json.to_string()),
            Err(e) => {
                error!("Completion JSON body could not be parsed: {}", e);
                CompletionEvent::Failure(CompletionFailure::InvalidJson)
            }
        };
        let _ = tx_event.send(event).await;
        return;
    }

    handle_completion_stream(response.bytes_stream(), tx_event).await;
}

/// Convert a byte stream into completion events
///
/// Returns as soon as the receiver is dropped.
pub async fn handle_completion_stream<S, B, E>(stream: S, tx_event: &mpsc::Sender<CompletionEvent>)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = Utf8StreamDecoder::new();

    while let Some(next) = stream.next().await {
        let bytes = match next {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Completion stream error: {}", e);
                let _ = tx_event
                    .send(CompletionEvent::Failure(CompletionFailure::StreamInterrupted))
                    .await;
                return;
            }
        };

        let chunk = decoder.decode(bytes.as_ref());
        trace!("Completion chunk: {:?}", chunk);
        if !forward(extract_chunk_events(&chunk), tx_event).await {
            return;
        }
    }

    let tail = decoder.finish();
    forward(extract_chunk_events(&tail), tx_event).await;
}

async fn forward(events: Vec<CompletionEvent>, tx_event: &mpsc::Sender<CompletionEvent>) -> bool {
    for event in events {
        if tx_event.send(event).await.is_err() {
            debug!("Completion consumer dropped, stopping read loop");
            return false;
        }
    }
    true
}
