//! Session and parent-message resolution

use crate::infrastructure::http::UpstreamClient;
use crate::util::errors::{DeeptermError, DeeptermResult};
use deepterm_core_types::{CreateSessionBody, CreatedSession, HistoryMessages, MessageId};
use log::{info, warn};

const CREATE_SESSION_PATH: &str = "/chat_session/create";
const HISTORY_PATH: &str = "/chat/history_messages";

#[derive(Clone)]
pub struct SessionResolver {
    client: UpstreamClient,
}

impl SessionResolver {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    /// Reuses `supplied` verbatim when non-empty, otherwise creates a new session.
    pub async fn resolve_session(
        &self,
        token: &str,
        supplied: Option<&str>,
    ) -> DeeptermResult<String> {
        if let Some(session_id) = supplied.filter(|id| !id.is_empty()) {
            info!("[SESSION] Using existing session: {}", session_id);
            return Ok(session_id.to_string());
        }

        let session_id = self.create_session(token).await?;
        info!("[SESSION] New session created: {}", session_id);
        Ok(session_id)
    }

    pub async fn create_session(&self, token: &str) -> DeeptermResult<String> {
        let request = self
            .client
            .post(token, CREATE_SESSION_PATH)
            .json(&CreateSessionBody::default());

        let envelope = self
            .client
            .send_envelope::<CreatedSession>(request)
            .await
            .map_err(|e| match e {
                DeeptermError::Network(_) => e,
                other => DeeptermError::SessionCreation(other.to_string()),
            })?;

        let message = envelope.message().map(str::to_string);
        envelope
            .into_biz_data()
            .map(|session| session.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                DeeptermError::SessionCreation(
                    message.unwrap_or_else(|| "response carried no session id".to_string()),
                )
            })
    }

    pub async fn fetch_history(
        &self,
        token: &str,
        session_id: &str,
    ) -> DeeptermResult<HistoryMessages> {
        let request = self
            .client
            .get_in_session(token, HISTORY_PATH, session_id)
            .query(&[("chat_session_id", session_id), ("cache_version", "-1")]);

        let envelope = self
            .client
            .send_envelope::<HistoryMessages>(request)
            .await?;
        Ok(envelope.into_biz_data().unwrap_or_default())
    }

    /// Id of the last message in the session, `None` on a first turn.
    ///
    /// Read fresh on every call. A failed history lookup is logged and
    /// treated as an empty history.
    pub async fn resolve_parent(&self, token: &str, session_id: &str) -> Option<MessageId> {
        match self.fetch_history(token, session_id).await {
            Ok(history) => history.last_message_id(),
            Err(e) => {
                warn!(
                    "History lookup failed, continuing as first turn: session_id={}, error={}",
                    session_id, e
                );
                None
            }
        }
    }
}
