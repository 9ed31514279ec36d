//! Infrastructure layer - upstream HTTP access and the PoW module host

pub mod http;
pub mod pow;

pub use http::UpstreamClient;
pub use pow::{PowSolver, WasmPowSolver};
