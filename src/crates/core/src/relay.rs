//! Relay facade: session resolution followed by a completion call.

use crate::config::ClientConfig;
use crate::infrastructure::http::UpstreamClient;
use crate::infrastructure::pow::PowSolver;
use crate::service::{
    AccountService, ChallengeService, CompletionEngine, CompletionOptions, CompletionOutput,
    CompletionRequest, DeliveryMode, SessionResolver,
};
use crate::util::errors::{DeeptermError, DeeptermResult};
use deepterm_core_types::MessageId;
use std::sync::Arc;

/// Where the next turn attaches: a session and the message it follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationThread {
    pub session_id: String,
    pub parent_message_id: Option<MessageId>,
}

/// Entry point used by front ends.
///
/// Cheap to clone; clones share the HTTP connection pool and the solver.
#[derive(Clone)]
pub struct ChatRelay {
    challenges: ChallengeService,
    sessions: SessionResolver,
    completions: CompletionEngine,
    account: AccountService,
}

impl ChatRelay {
    pub fn new(config: ClientConfig, solver: Arc<dyn PowSolver>) -> DeeptermResult<Self> {
        let client = UpstreamClient::new(config)?;
        let challenges = ChallengeService::new(client.clone(), solver);
        Ok(Self {
            sessions: SessionResolver::new(client.clone()),
            completions: CompletionEngine::new(client.clone(), challenges.clone()),
            account: AccountService::new(client, challenges.clone()),
            challenges,
        })
    }

    pub fn challenges(&self) -> &ChallengeService {
        &self.challenges
    }

    pub fn sessions(&self) -> &SessionResolver {
        &self.sessions
    }

    pub fn completions(&self) -> &CompletionEngine {
        &self.completions
    }

    pub fn account(&self) -> &AccountService {
        &self.account
    }

    /// Resolves (or creates) the session and reads its current last message.
    pub async fn resolve_thread(
        &self,
        token: &str,
        supplied_session_id: Option<&str>,
    ) -> DeeptermResult<ConversationThread> {
        let session_id = self
            .sessions
            .resolve_session(token, supplied_session_id)
            .await?;
        let parent_message_id = self.sessions.resolve_parent(token, &session_id).await;
        Ok(ConversationThread {
            session_id,
            parent_message_id,
        })
    }

    /// Full relay sequence for one prompt.
    ///
    /// Fails with `AuthMissing` before any network call when `token` or
    /// `prompt` is empty. Whitespace-only values are passed through as given.
    pub async fn relay(
        &self,
        token: &str,
        prompt: &str,
        session_id: Option<&str>,
        mode: DeliveryMode,
        options: CompletionOptions,
    ) -> DeeptermResult<CompletionOutput> {
        if token.is_empty() || prompt.is_empty() {
            return Err(DeeptermError::AuthMissing);
        }

        let thread = self.resolve_thread(token, session_id).await?;
        let request = CompletionRequest::new(prompt, thread.session_id, thread.parent_message_id)
            .with_options(options);
        Ok(self.completions.complete(token, request, mode).await)
    }
}
