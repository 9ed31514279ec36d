pub mod errors;
pub mod utf8;

pub use errors::{DeeptermError, DeeptermResult};
pub use utf8::Utf8StreamDecoder;
