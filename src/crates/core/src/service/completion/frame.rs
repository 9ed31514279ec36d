//! Classification of decoded completion chunks

use deepterm_core_types::StreamPayload;
use log::{trace, warn};

/// Substring identifying an anti-bot interstitial page in the body.
pub const BOT_CHALLENGE_MARKER: &str = "challenge-platform";
pub const BOT_CHALLENGE_WARNING: &str =
    "Detected by Cloudflare, please try again and increase the request delay";

const DATA_PREFIX: &str = "data:";

/// One item delivered from the read loop to the consumer, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    /// A fragment of the assistant's reply.
    Token(String),
    /// The upstream served an anti-bot page instead of data. Reading continues.
    BotChallenge,
    /// The call cannot produce (more) text.
    Failure(CompletionFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionFailure {
    Network,
    UpstreamStatus(u16),
    InvalidJson,
    ProofNotFound,
    StreamInterrupted,
}

impl CompletionFailure {
    pub fn message(&self) -> String {
        match self {
            CompletionFailure::Network => "❌ Network error while requesting completion".to_string(),
            CompletionFailure::UpstreamStatus(status) => format!("❌ Server returned {}", status),
            CompletionFailure::InvalidJson => "❌ Failed to parse JSON response".to_string(),
            CompletionFailure::ProofNotFound => {
                "❌ Proof of work could not be solved".to_string()
            }
            CompletionFailure::StreamInterrupted => {
                "❌ Completion stream interrupted".to_string()
            }
        }
    }
}

impl CompletionEvent {
    /// Text forwarded to a streaming consumer.
    pub fn into_text(self) -> String {
        match self {
            CompletionEvent::Token(text) => text,
            CompletionEvent::BotChallenge => BOT_CHALLENGE_WARNING.to_string(),
            CompletionEvent::Failure(failure) => failure.message(),
        }
    }
}

/// Splits one decoded chunk into events.
///
/// - A chunk containing the bot-challenge marker yields only `BotChallenge`.
/// - Otherwise each `data:` line is parsed as JSON; a string `v` that is not a
///   control value is a token, and an unparseable payload is passed through
///   as raw text.
/// - A chunk without any `data:` line is passed through whole.
pub fn extract_chunk_events(chunk: &str) -> Vec<CompletionEvent> {
    if chunk.is_empty() {
        return Vec::new();
    }

    if chunk.contains(BOT_CHALLENGE_MARKER) {
        warn!("Anti-bot challenge page detected in completion stream");
        return vec![CompletionEvent::BotChallenge];
    }

    let data_lines: Vec<&str> = chunk
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix(DATA_PREFIX))
        .collect();

    if data_lines.is_empty() {
        return vec![CompletionEvent::Token(chunk.to_string())];
    }

    data_lines
        .into_iter()
        .filter_map(|rest| {
            let payload = rest.trim();
            if payload.is_empty() {
                return None;
            }
            match StreamPayload::parse(payload) {
                Ok(parsed) => parsed
                    .answer_token()
                    .map(|token| CompletionEvent::Token(token.to_string())),
                Err(e) => {
                    trace!("Unparseable data line passed through: error={}, data={}", e, payload);
                    Some(CompletionEvent::Token(payload.to_string()))
                }
            }
        })
        .collect()
}
