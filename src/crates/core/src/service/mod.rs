//! Service layer - challenge, session, completion and account operations

pub mod account;
pub mod challenge;
pub mod completion;
pub mod session;

pub use account::AccountService;
pub use challenge::{encode_proof, ChallengeService};
pub use completion::{
    CompletionEngine, CompletionEvent, CompletionFailure, CompletionOptions, CompletionOutput,
    CompletionRequest, CompletionStream, DeliveryMode,
};
pub use session::SessionResolver;
