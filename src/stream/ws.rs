//! WebSocket transport: bidirectional event push plus execution commands.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::transport::{StreamConnection, StreamTransport};
use super::{ExecutionCommand, StreamError};
use crate::ids::ExecutionId;

/// Bidirectional transport over the backend's WebSocket endpoint.
///
/// Receives the same event frames as the SSE path and additionally carries
/// [`ExecutionCommand`]s (pause/resume/skip/abort, interactive responses)
/// upstream as JSON text frames.
pub struct WsTransport {
    base_url: String,
}

impl WsTransport {
    /// A transport rooted at `base_url` (`ws://` or `wss://` scheme, no
    /// trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl StreamTransport for WsTransport {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn connect(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Box<dyn StreamConnection>, StreamError> {
        let url = format!("{}/ws/executions/{}", self.base_url, execution_id);
        let (stream, _) = connect_async(url.as_str()).await?;
        tracing::debug!(%url, "websocket opened");
        Ok(Box::new(WsConnection {
            stream: Some(stream),
        }))
    }
}

struct WsConnection {
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

#[async_trait]
impl StreamConnection for WsConnection {
    async fn next_frame(&mut self) -> Result<Option<String>, StreamError> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(None);
            };
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                // Control frames and binary payloads are not event frames.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => continue,
                Some(Ok(Message::Close(_))) => {
                    self.stream = None;
                    return Ok(None);
                }
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(err)) => {
                    self.stream = None;
                    return Err(err.into());
                }
                None => {
                    self.stream = None;
                    return Ok(None);
                }
            }
        }
    }

    async fn send(&mut self, command: &ExecutionCommand) -> Result<(), StreamError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(StreamError::NotConnected);
        };
        let frame = serde_json::to_string(command)?;
        stream.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }
}
