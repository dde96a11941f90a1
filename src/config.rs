//! Client configuration: builder overrides first, environment second.
//!
//! Environment variables (loaded through `.env` when present):
//!
//! - `DIAFLOW_BASE_URL` — HTTP base of the backend (default `http://localhost:8000`)
//! - `DIAFLOW_WS_URL` — WebSocket base (default derived from the HTTP base)
//! - `DIAFLOW_STREAM_MAX_RETRIES` — reconnect attempt budget
//! - `DIAFLOW_STREAM_BASE_DELAY_MS` — first backoff delay
//! - `DIAFLOW_STREAM_MAX_DELAY_MS` — backoff cap

use std::time::Duration;

use crate::stream::BackoffPolicy;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Resolved client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// HTTP base url (no trailing slash).
    pub base_url: String,
    /// WebSocket base url (no trailing slash).
    pub ws_url: String,
    /// Reconnect policy for the stream client.
    pub backoff: BackoffPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ClientConfig {
    /// Resolve configuration from the environment, falling back to local
    /// development defaults.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let base_url = trim_slash(
            std::env::var("DIAFLOW_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        );
        let ws_url = match std::env::var("DIAFLOW_WS_URL") {
            Ok(url) => trim_slash(url),
            Err(_) => derive_ws_url(&base_url),
        };

        let mut backoff = BackoffPolicy::default();
        if let Some(max) = env_u32("DIAFLOW_STREAM_MAX_RETRIES") {
            backoff.max_attempts = max;
        }
        if let Some(ms) = env_u64("DIAFLOW_STREAM_BASE_DELAY_MS") {
            backoff.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("DIAFLOW_STREAM_MAX_DELAY_MS") {
            backoff.max_delay = Duration::from_millis(ms);
        }

        Self {
            base_url,
            ws_url,
            backoff,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = trim_slash(base_url.into());
        self.ws_url = derive_ws_url(&self.base_url);
        self
    }

    #[must_use]
    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = trim_slash(ws_url.into());
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

fn derive_ws_url(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{base_url}")
    }
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_is_derived_from_the_http_scheme() {
        let config = ClientConfig::from_env().with_base_url("https://flows.example.com/");
        assert_eq!(config.base_url, "https://flows.example.com");
        assert_eq!(config.ws_url, "wss://flows.example.com");
    }

    #[test]
    fn explicit_ws_url_wins() {
        let config = ClientConfig::from_env()
            .with_base_url("http://a.example")
            .with_ws_url("ws://b.example/");
        assert_eq!(config.ws_url, "ws://b.example");
    }
}
