//! Wire types for the upstream chat service.
//!
//! Every endpoint answers with the same two-level envelope
//! (`{code, msg, data: {biz_code, biz_msg, biz_data}}`); the payload types
//! below describe `biz_data` per endpoint.

pub mod completion;
pub mod envelope;
pub mod file;
pub mod pow;
pub mod session;

pub use completion::{CompletionBody, StreamPayload, RESERVED_STREAM_VALUES};
pub use envelope::{ApiData, ApiResponse};
pub use file::UploadedFile;
pub use pow::{PowChallenge, PowChallengeData, PowChallengeRequest, ProofPayload};
pub use session::{
    ChatMessage, ChatSessionSummary, CreateSessionBody, CreatedSession, HistoryMessages,
    MessageId, SessionPage,
};
