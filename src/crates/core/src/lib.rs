// DeepTerm Core Library - relay to the upstream chat service
// Layers: Util -> Infrastructure -> Service -> Relay

pub mod config;
pub mod infrastructure; // Infrastructure layer - upstream HTTP client, PoW module host
pub mod relay;
pub mod service; // Service layer - challenge, session, completion, account
pub mod util; // Utility layer - errors, incremental UTF-8 decoding

// Export main types
pub use config::ClientConfig;
pub use relay::{ChatRelay, ConversationThread};
pub use util::errors::*;

pub use infrastructure::{PowSolver, UpstreamClient, WasmPowSolver};
pub use service::{
    AccountService, ChallengeService, CompletionEngine, CompletionEvent, CompletionFailure,
    CompletionOptions, CompletionOutput, CompletionRequest, CompletionStream, DeliveryMode,
    SessionResolver,
};

pub use deepterm_core_types as types;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
