//! Completion relay
//!
//! The read loop runs as its own task and pushes events into a bounded
//! channel. Stream mode hands the receiving end to the caller; aggregate mode
//! drains the same channel into one string.

pub mod frame;
pub mod stream_handler;

pub use frame::{
    extract_chunk_events, CompletionEvent, CompletionFailure, BOT_CHALLENGE_MARKER,
    BOT_CHALLENGE_WARNING,
};
pub use stream_handler::{handle_completion_response, handle_completion_stream};

use super::challenge::ChallengeService;
use crate::infrastructure::http::{UpstreamClient, POW_RESPONSE_HEADER};
use crate::util::errors::DeeptermError;
use deepterm_core_types::{CompletionBody, MessageId};
use futures::{Stream, StreamExt};
use log::{debug, error, warn};
use reqwest::Response;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const COMPLETION_PATH: &str = "/chat/completion";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    #[default]
    Stream,
    Aggregate,
}

impl DeliveryMode {
    pub fn from_stream_flag(stream: bool) -> Self {
        if stream {
            DeliveryMode::Stream
        } else {
            DeliveryMode::Aggregate
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub search_enabled: bool,
    pub thinking_enabled: bool,
    pub file_ids: Vec<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            search_enabled: true,
            thinking_enabled: false,
            file_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub session_id: String,
    /// `None` on the first turn of a session.
    pub parent_message_id: Option<MessageId>,
    pub options: CompletionOptions,
}

impl CompletionRequest {
    pub fn new(
        prompt: impl Into<String>,
        session_id: impl Into<String>,
        parent_message_id: Option<MessageId>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            session_id: session_id.into(),
            parent_message_id,
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }
}

/// Receiving end of one completion call.
///
/// Dropping it cancels the call: the producing task stops at its next
/// suspension point and releases the upstream response.
pub struct CompletionStream {
    rx: mpsc::Receiver<CompletionEvent>,
}

impl CompletionStream {
    pub async fn next_event(&mut self) -> Option<CompletionEvent> {
        self.rx.recv().await
    }

    /// Chunks as forwarded to a streaming client, failures rendered as text.
    pub fn into_text_stream(self) -> impl Stream<Item = String> + Send + 'static {
        ReceiverStream::new(self.rx).map(CompletionEvent::into_text)
    }

    /// Concatenates every token in arrival order.
    ///
    /// Failures contribute nothing, so a call that fails before producing any
    /// text aggregates to an empty string.
    pub async fn aggregate(mut self) -> String {
        let mut text = String::new();
        while let Some(event) = self.rx.recv().await {
            match event {
                CompletionEvent::Failure(failure) => {
                    warn!("Completion failed during aggregation: {}", failure.message());
                }
                other => text.push_str(&other.into_text()),
            }
        }
        text
    }
}

pub enum CompletionOutput {
    Stream(CompletionStream),
    Aggregate(String),
}

#[derive(Clone)]
pub struct CompletionEngine {
    client: UpstreamClient,
    challenges: ChallengeService,
}

impl CompletionEngine {
    pub fn new(client: UpstreamClient, challenges: ChallengeService) -> Self {
        Self { client, challenges }
    }

    pub async fn complete(
        &self,
        token: &str,
        request: CompletionRequest,
        mode: DeliveryMode,
    ) -> CompletionOutput {
        let stream = self.start(token, request);
        match mode {
            DeliveryMode::Stream => CompletionOutput::Stream(stream),
            DeliveryMode::Aggregate => CompletionOutput::Aggregate(stream.aggregate().await),
        }
    }

    /// Spawns the call and returns its event channel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, token: &str, request: CompletionRequest) -> CompletionStream {
        let (tx, rx) = mpsc::channel(self.client.config().stream_buffer.max(1));
        let engine = self.clone();
        let token = token.to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = tx.closed() => {
                    debug!("Completion consumer dropped, cancelling: session_id={}", request.session_id);
                }
                _ = engine.run(&token, &request, &tx) => {}
            }
        });

        CompletionStream { rx }
    }

    async fn run(
        &self,
        token: &str,
        request: &CompletionRequest,
        tx_event: &mpsc::Sender<CompletionEvent>,
    ) {
        let proof = match self.acquire_proof(token, request).await {
            Ok(proof) => proof,
            Err(failure) => {
                let _ = tx_event.send(CompletionEvent::Failure(failure)).await;
                return;
            }
        };

        let response = match self.dispatch(token, request, proof).await {
            Ok(response) => response,
            Err(e) => {
                error!("Completion request failed: session_id={}, error={}", request.session_id, e);
                let _ = tx_event
                    .send(CompletionEvent::Failure(CompletionFailure::Network))
                    .await;
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("Completion rejected: session_id={}, status={}", request.session_id, status);
            let _ = tx_event
                .send(CompletionEvent::Failure(CompletionFailure::UpstreamStatus(
                    status.as_u16(),
                )))
                .await;
            return;
        }

        handle_completion_response(response, tx_event).await;
    }

    /// A missing challenge or solver degrades to an unproven submission;
    /// an unsolvable challenge ends the call.
    async fn acquire_proof(
        &self,
        token: &str,
        request: &CompletionRequest,
    ) -> Result<Option<String>, CompletionFailure> {
        let target_path = self.client.config().api_path(COMPLETION_PATH);
        match self
            .challenges
            .acquire_proof(token, Some(&request.session_id), &target_path)
            .await
        {
            Ok(proof) => Ok(Some(proof)),
            Err(DeeptermError::PowNotFound) => {
                error!("PoW search found no answer for completion challenge");
                Err(CompletionFailure::ProofNotFound)
            }
            Err(e) => {
                warn!("Submitting completion without proof: {}", e);
                Ok(None)
            }
        }
    }

    async fn dispatch(
        &self,
        token: &str,
        request: &CompletionRequest,
        proof: Option<String>,
    ) -> reqwest::Result<Response> {
        let body = CompletionBody {
            chat_session_id: &request.session_id,
            parent_message_id: request.parent_message_id.as_ref(),
            prompt: &request.prompt,
            ref_file_ids: &request.options.file_ids,
            thinking_enabled: request.options.thinking_enabled,
            search_enabled: request.options.search_enabled,
        };

        let mut builder = self
            .client
            .post_in_session(token, COMPLETION_PATH, &request.session_id)
            .json(&body);
        if let Some(proof) = proof {
            builder = builder.header(POW_RESPONSE_HEADER, proof);
        }
        builder.send().await
    }
}
