//! SSE transport: `GET {base}/sse/executions/{id}`, newline-delimited JSON.

use async_trait::async_trait;
use futures_util::StreamExt;

use super::transport::{StreamConnection, StreamTransport};
use super::{ExecutionCommand, StreamError};
use crate::ids::ExecutionId;

/// Receive-only transport over the backend's SSE endpoint.
///
/// Frames arrive as `data:`-prefixed lines (or bare newline-delimited JSON;
/// both are accepted). Comment and `event:` lines are skipped.
pub struct SseTransport {
    client: reqwest::Client,
    base_url: String,
}

impl SseTransport {
    /// A transport rooted at `base_url` (scheme + host, no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Use a preconfigured HTTP client (proxies, custom TLS).
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    fn name(&self) -> &'static str {
        "sse"
    }

    async fn connect(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Box<dyn StreamConnection>, StreamError> {
        let url = format!("{}/sse/executions/{}", self.base_url, execution_id);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;
        tracing::debug!(%url, "sse stream opened");
        Ok(Box::new(SseConnection {
            body: Some(Box::pin(response.bytes_stream())),
            buffer: String::new(),
        }))
    }
}

type BytesStream =
    std::pin::Pin<Box<dyn futures_util::Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>;

struct SseConnection {
    body: Option<BytesStream>,
    buffer: String,
}

impl SseConnection {
    /// Pop the next payload line already sitting in the buffer, skipping
    /// SSE framing noise.
    fn pop_line(&mut self) -> Option<String> {
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim();
            if line.is_empty() || line.starts_with(':') || line.starts_with("event:") {
                continue;
            }
            let payload = line.strip_prefix("data:").unwrap_or(line).trim();
            if !payload.is_empty() {
                return Some(payload.to_string());
            }
        }
        None
    }
}

#[async_trait]
impl StreamConnection for SseConnection {
    async fn next_frame(&mut self) -> Result<Option<String>, StreamError> {
        loop {
            if let Some(line) = self.pop_line() {
                return Ok(Some(line));
            }
            let Some(body) = self.body.as_mut() else {
                return Ok(None);
            };
            match body.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&chunk));
                }
                Some(Err(err)) => {
                    self.body = None;
                    return Err(err.into());
                }
                None => {
                    self.body = None;
                    // Flush a trailing unterminated line, if any.
                    if !self.buffer.is_empty() {
                        self.buffer.push('\n');
                        if let Some(line) = self.pop_line() {
                            return Ok(Some(line));
                        }
                    }
                    return Ok(None);
                }
            }
        }
    }

    async fn send(&mut self, _command: &ExecutionCommand) -> Result<(), StreamError> {
        Err(StreamError::CommandUnsupported { transport: "sse" })
    }

    async fn close(&mut self) {
        self.body = None;
        self.buffer.clear();
    }
}
