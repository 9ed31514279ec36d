//! Error types for the relay core

use reqwest::StatusCode;
use thiserror::Error;

pub type DeeptermResult<T> = Result<T, DeeptermError>;

#[derive(Debug, Error)]
pub enum DeeptermError {
    #[error("Missing \"token\" or \"prompt\"")]
    AuthMissing,

    #[error("Failed to create chat session: {0}")]
    SessionCreation(String),

    #[error("PoW challenge unavailable: {0}")]
    ChallengeUnavailable(String),

    #[error("POW not found")]
    PowNotFound,

    #[error("PoW solver error: {0}")]
    Solver(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream rejected request with status {status}: {message}")]
    UpstreamRejected { status: StatusCode, message: String },

    #[error("Response schema error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
