use crate::session::MessageId;
use serde::Serialize;
use serde_json::Value;

/// Control values carried in `v` that are not part of the answer text.
pub const RESERVED_STREAM_VALUES: [&str; 3] = ["SEARCHING", "FINISHED", "ANSWER"];

/// Body of `POST /chat/completion`.
#[derive(Debug, Serialize)]
pub struct CompletionBody<'a> {
    pub chat_session_id: &'a str,
    pub parent_message_id: Option<&'a MessageId>,
    pub prompt: &'a str,
    pub ref_file_ids: &'a [String],
    pub thinking_enabled: bool,
    pub search_enabled: bool,
}

/// One parsed `data:` payload of the completion event stream.
///
/// Any JSON value is accepted; only an object with a string `v` carries text.
#[derive(Debug, Clone)]
pub struct StreamPayload(Value);

impl StreamPayload {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw).map(Self)
    }

    pub fn answer_token(&self) -> Option<&str> {
        self.0
            .get("v")
            .and_then(Value::as_str)
            .filter(|v| !RESERVED_STREAM_VALUES.contains(v))
    }
}
