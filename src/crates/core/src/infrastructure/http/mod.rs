//! HTTP access to the upstream chat service.

pub mod headers;

pub use headers::{browser_identity_headers, POW_RESPONSE_HEADER, THINKING_ENABLED_HEADER};

use crate::config::ClientConfig;
use crate::util::errors::{DeeptermError, DeeptermResult};
use deepterm_core_types::ApiResponse;
use log::{debug, warn};
use reqwest::header::REFERER;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Thin wrapper over `reqwest::Client` that knows the upstream URL layout.
///
/// Holds no per-user state; the bearer token is attached to each request.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl UpstreamClient {
    pub fn new(config: ClientConfig) -> DeeptermResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .use_rustls_tls()
            .default_headers(browser_identity_headers())
            .build()
            .map_err(|e| DeeptermError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Page of the web client a request for `session_id` would originate from.
    pub fn session_referer(&self, session_id: &str) -> String {
        format!("{}/a/chat/s/{}", self.config.base_url, session_id)
    }

    fn home_referer(&self) -> String {
        format!("{}/", self.config.base_url)
    }

    pub(crate) fn get(&self, token: &str, path: &str) -> RequestBuilder {
        self.request(Method::GET, token, path, self.home_referer())
    }

    pub(crate) fn post(&self, token: &str, path: &str) -> RequestBuilder {
        self.request(Method::POST, token, path, self.home_referer())
    }

    /// Like `get`, but appearing to come from the page of `session_id`.
    pub(crate) fn get_in_session(&self, token: &str, path: &str, session_id: &str) -> RequestBuilder {
        self.request(Method::GET, token, path, self.session_referer(session_id))
    }

    pub(crate) fn post_in_session(&self, token: &str, path: &str, session_id: &str) -> RequestBuilder {
        self.request(Method::POST, token, path, self.session_referer(session_id))
    }

    fn request(&self, method: Method, token: &str, path: &str, referer: String) -> RequestBuilder {
        self.http
            .request(method, self.config.endpoint(path))
            .bearer_auth(token)
            .header(REFERER, referer)
    }

    /// Sends a request and decodes the standard envelope.
    ///
    /// Non-2xx statuses become `UpstreamRejected`; a body that does not match
    /// the envelope schema becomes `Decode`.
    pub(crate) async fn send_envelope<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> DeeptermResult<ApiResponse<T>> {
        let response = request.send().await?;
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            debug!(
                "Envelope decode failed: body={}",
                truncate(&String::from_utf8_lossy(&bytes))
            );
            DeeptermError::Decode(e.to_string())
        })
    }
}

/// Turns a non-2xx response into `UpstreamRejected`, keeping a prefix of the body.
pub(crate) async fn ensure_success(response: Response) -> DeeptermResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    warn!("Upstream rejected request: path={}, status={}", url, status);
    Err(DeeptermError::UpstreamRejected {
        status,
        message: truncate(&body),
    })
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_BODY_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}
