//! Server configuration from the environment

use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_WASM_PATH: &str = "./deepseek.wasm";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Location of the proof-of-work search module.
    pub wasm_path: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT '{}'", value))?,
            None => DEFAULT_PORT,
        };
        let bind = lookup("DEEPTERM_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind
            .trim()
            .parse()
            .with_context(|| format!("Invalid DEEPTERM_BIND '{}'", bind))?;
        let wasm_path = lookup("DEEPTERM_WASM_PATH")
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WASM_PATH.to_string());

        Ok(Self {
            bind,
            port,
            wasm_path: PathBuf::from(wasm_path),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
