use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /chat_session/create`.
#[derive(Debug, Default, Serialize)]
pub struct CreateSessionBody {
    pub character_id: Option<String>,
}

/// `biz_data` of `POST /chat_session/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSession {
    pub id: String,
}

/// Message ids are integers on current deployments; older ones used strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Numeric(id) => write!(f, "{}", id),
            MessageId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub message_id: MessageId,
    pub parent_id: Option<MessageId>,
    pub role: Option<String>,
    pub content: Option<String>,
}

/// `biz_data` of `GET /chat/history_messages`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryMessages {
    #[serde(default)]
    pub chat_messages: Vec<ChatMessage>,
}

impl HistoryMessages {
    /// The most recent message, which threads the next turn.
    pub fn last_message_id(&self) -> Option<MessageId> {
        self.chat_messages
            .last()
            .map(|message| message.message_id.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatSessionSummary {
    pub id: String,
    pub title: Option<String>,
    pub updated_at: Option<f64>,
}

/// `biz_data` of `GET /chat_session/fetch_page`.
#[derive(Debug, Default, Deserialize)]
pub struct SessionPage {
    #[serde(default)]
    pub chat_sessions: Vec<ChatSessionSummary>,
    #[serde(default)]
    pub has_more: bool,
}
