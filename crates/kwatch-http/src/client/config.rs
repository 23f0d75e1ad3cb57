//! Configuration for the kwatch client.

use crate::error::{ClientError, Result};
use std::time::Duration;

pub const DEFAULT_HTTP_BASE_URL: &str = "http://localhost:8001";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;
pub const DEFAULT_AUTH_DOMAIN: &str = "k8s.io";
pub const DEFAULT_BINARY_PROTOCOL: &str = "base64.binary.k8s.io";

/// Configuration for the kwatch client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL for one-shot requests.
    pub http_base_url: String,
    /// Base URL for watch connections.
    pub ws_base_url: String,
    /// Fixed delay before reopening a stream after an unexpected close.
    pub reconnect_delay_ms: u64,
    /// Domain embedded in the bearer sub-protocol tag.
    pub auth_domain: String,
    /// Binary framing sub-protocol offered on every connection.
    pub binary_protocol: String,
    /// Capacity of the per-connection frame buffer.
    pub frame_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::new(DEFAULT_HTTP_BASE_URL)
    }
}

impl ClientConfig {
    /// Config for a server; the watch base URL is derived from `http_base_url`.
    pub fn new(http_base_url: impl Into<String>) -> Self {
        let http_base_url = http_base_url.into();
        let ws_base_url = ws_url_from_http(&http_base_url);
        ClientConfig {
            http_base_url,
            ws_base_url,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            auth_domain: DEFAULT_AUTH_DOMAIN.to_string(),
            binary_protocol: DEFAULT_BINARY_PROTOCOL.to_string(),
            frame_buffer: 100,
        }
    }

    /// Load from `KWATCH_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let http = lookup("KWATCH_HTTP_BASE_URL").unwrap_or_else(|| DEFAULT_HTTP_BASE_URL.into());
        let mut config = ClientConfig::new(http);
        if let Some(ws) = lookup("KWATCH_WS_BASE_URL") {
            config.ws_base_url = ws;
        }
        if let Some(delay) = lookup("KWATCH_RECONNECT_DELAY_MS") {
            config.reconnect_delay_ms = delay.trim().parse().map_err(|_| {
                ClientError::Config(format!("Invalid KWATCH_RECONNECT_DELAY_MS: {}", delay))
            })?;
        }
        if let Some(domain) = lookup("KWATCH_AUTH_DOMAIN") {
            config.auth_domain = domain;
        }
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_ws_base_url(mut self, url: impl Into<String>) -> Self {
        self.ws_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Both base URLs must parse.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.http_base_url)?;
        url::Url::parse(&self.ws_base_url)?;
        if self.frame_buffer == 0 {
            return Err(ClientError::Config("frame_buffer must be non-zero".into()));
        }
        Ok(())
    }
}

fn ws_url_from_http(http: &str) -> String {
    if let Some(rest) = http.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = http.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        http.to_string()
    }
}
