//! Proof-of-work solving
//!
//! The search itself lives in a precompiled WebAssembly module supplied by the
//! upstream; this module only marshals inputs into it and decodes the result.

mod wasm;

pub use wasm::WasmPowSolver;

use crate::util::errors::DeeptermResult;
use async_trait::async_trait;

/// Finds an answer for a PoW challenge.
#[async_trait]
pub trait PowSolver: Send + Sync {
    /// Returns the integer answer, or `PowNotFound` if the search gave up.
    async fn solve(
        &self,
        challenge: &str,
        salt: &str,
        expire_at: i64,
        difficulty: f64,
    ) -> DeeptermResult<u64>;
}

/// Prefix hashed in front of every candidate answer.
pub fn answer_prefix(salt: &str, expire_at: i64) -> String {
    format!("{}_{}_", salt, expire_at)
}
