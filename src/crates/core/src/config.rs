//! Client configuration

use crate::util::errors::{DeeptermError, DeeptermResult};
use serde::Deserialize;
use std::str::FromStr;

pub const DEFAULT_BASE_URL: &str = "https://chat.deepseek.com";
pub const DEFAULT_API_PREFIX: &str = "/api/v0";
const DEFAULT_STREAM_BUFFER: usize = 64;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin of the upstream chat service, without trailing slash.
    pub base_url: String,
    pub api_prefix: String,
    /// Capacity of the token channel between the read loop and its consumer.
    pub stream_buffer: usize,
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            stream_buffer: DEFAULT_STREAM_BUFFER,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Overlays `DEEPTERM_*` environment variables on the defaults.
    pub fn from_env() -> DeeptermResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> DeeptermResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(base_url) = lookup("DEEPTERM_BASE_URL") {
            let trimmed = base_url.trim().trim_end_matches('/');
            if !trimmed.is_empty() {
                config.base_url = trimmed.to_string();
            }
        }
        if let Some(value) = lookup("DEEPTERM_STREAM_BUFFER") {
            config.stream_buffer = parse_number("DEEPTERM_STREAM_BUFFER", &value)?;
            if config.stream_buffer == 0 {
                return Err(DeeptermError::Config(
                    "DEEPTERM_STREAM_BUFFER must be greater than zero".to_string(),
                ));
            }
        }
        if let Some(value) = lookup("DEEPTERM_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout_secs = parse_number("DEEPTERM_CONNECT_TIMEOUT_SECS", &value)?;
        }
        Ok(config)
    }

    /// Absolute URL of an API path such as `/chat/completion`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, self.api_path(path))
    }

    /// Server-relative path, as used for PoW `target_path` scoping.
    pub fn api_path(&self, path: &str) -> String {
        format!("{}{}", self.api_prefix, path)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> DeeptermResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DeeptermError::Config(format!("Invalid value for {}: '{}'", key, value)))
}
