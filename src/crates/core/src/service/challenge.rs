//! PoW challenge acquisition and proof minting

use crate::infrastructure::http::UpstreamClient;
use crate::infrastructure::pow::PowSolver;
use crate::util::errors::{DeeptermError, DeeptermResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use deepterm_core_types::{PowChallenge, PowChallengeData, PowChallengeRequest, ProofPayload};
use log::{debug, warn};
use std::sync::Arc;

const CREATE_CHALLENGE_PATH: &str = "/chat/create_pow_challenge";

#[derive(Clone)]
pub struct ChallengeService {
    client: UpstreamClient,
    solver: Arc<dyn PowSolver>,
}

impl ChallengeService {
    pub fn new(client: UpstreamClient, solver: Arc<dyn PowSolver>) -> Self {
        Self { client, solver }
    }

    /// Fetches a fresh challenge scoped to `target_path`, solves it and
    /// returns the base64 proof for the `x-ds-pow-response` header.
    ///
    /// Every call mints a new single-use proof.
    pub async fn acquire_proof(
        &self,
        token: &str,
        session_id: Option<&str>,
        target_path: &str,
    ) -> DeeptermResult<String> {
        let challenge = self.fetch_challenge(token, session_id, target_path).await?;
        let answer = self
            .solver
            .solve(
                &challenge.challenge,
                &challenge.salt,
                challenge.expire_at,
                challenge.difficulty,
            )
            .await?;
        debug!(
            "Proof minted: target_path={}, algorithm={}",
            challenge.target_path, challenge.algorithm
        );
        encode_proof(&challenge, answer)
    }

    async fn fetch_challenge(
        &self,
        token: &str,
        session_id: Option<&str>,
        target_path: &str,
    ) -> DeeptermResult<PowChallenge> {
        let request = match session_id {
            Some(session_id) => self
                .client
                .post_in_session(token, CREATE_CHALLENGE_PATH, session_id),
            None => self.client.post(token, CREATE_CHALLENGE_PATH),
        }
        .json(&PowChallengeRequest { target_path });

        let envelope = self
            .client
            .send_envelope::<PowChallengeData>(request)
            .await
            .map_err(|e| {
                warn!("PoW challenge request failed: target_path={}, error={}", target_path, e);
                DeeptermError::ChallengeUnavailable(e.to_string())
            })?;

        let message = envelope.message().map(str::to_string);
        envelope
            .into_biz_data()
            .map(|data| data.challenge)
            .ok_or_else(|| {
                DeeptermError::ChallengeUnavailable(format!(
                    "response carried no challenge{}",
                    message.map(|m| format!(": {}", m)).unwrap_or_default()
                ))
            })
    }
}

/// Base64 of the six-field proof JSON.
pub fn encode_proof(challenge: &PowChallenge, answer: u64) -> DeeptermResult<String> {
    let json = serde_json::to_vec(&ProofPayload::new(challenge, answer))
        .map_err(|e| DeeptermError::Decode(e.to_string()))?;
    Ok(STANDARD.encode(json))
}
