use serde::{Deserialize, Serialize};

/// Body of `POST /chat/create_pow_challenge`.
#[derive(Debug, Serialize)]
pub struct PowChallengeRequest<'a> {
    pub target_path: &'a str,
}

/// `biz_data` of `POST /chat/create_pow_challenge`.
#[derive(Debug, Deserialize)]
pub struct PowChallengeData {
    pub challenge: PowChallenge,
}

/// A challenge issued by the service. Consumed exactly once to mint a proof.
#[derive(Debug, Clone, Deserialize)]
pub struct PowChallenge {
    pub algorithm: String,
    pub challenge: String,
    pub salt: String,
    pub signature: String,
    pub difficulty: f64,
    pub expire_at: i64,
    pub target_path: String,
}

/// Solved challenge as sent in the `x-ds-pow-response` header (base64 of this JSON).
///
/// Field order is part of the wire format.
#[derive(Debug, Serialize)]
pub struct ProofPayload<'a> {
    pub algorithm: &'a str,
    pub challenge: &'a str,
    pub salt: &'a str,
    pub answer: u64,
    pub signature: &'a str,
    pub target_path: &'a str,
}

impl<'a> ProofPayload<'a> {
    pub fn new(challenge: &'a PowChallenge, answer: u64) -> Self {
        Self {
            algorithm: &challenge.algorithm,
            challenge: &challenge.challenge,
            salt: &challenge.salt,
            answer,
            signature: &challenge.signature,
            target_path: &challenge.target_path,
        }
    }
}
