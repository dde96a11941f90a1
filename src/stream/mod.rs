//! The resilient execution-event stream client.
//!
//! One abstraction covers both live transports: the client owns the
//! connect/reconnect lifecycle and event decoding, a [`StreamTransport`]
//! implementation owns the wire. Backoff, terminal-status suppression, and
//! cancellation live here exactly once instead of being copied per
//! transport.
//!
//! Lifecycle: `Disconnected → Connecting → Connected → (error →
//! Reconnecting → Connecting) | Closed`. Reconnection uses exponential
//! backoff ([`BackoffPolicy`]) with a bounded attempt budget, and is
//! suppressed entirely once the watched execution reports a terminal
//! status — a server that finished a run shuts its stream down on purpose.
//!
//! Delivery is at-most-once: frames lost in a reconnect gap are not
//! replayed. After every successful reconnect the client emits
//! [`StreamNotice::Reconnected`] so the consumer can re-query authoritative
//! state from the backend.

pub mod backoff;
mod client;
mod sse;
mod transport;
mod ws;

pub use backoff::BackoffPolicy;
pub use client::{StreamClient, StreamHandle};
pub use sse::SseTransport;
pub use transport::{StreamConnection, StreamTransport};
pub use ws::WsTransport;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::execution::ExecutionEvent;
use crate::ids::NodeId;

/// Connection lifecycle states of a stream client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No execution to watch, or the failure budget is spent. No network
    /// activity happens in this state.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Live and receiving frames.
    Connected,
    /// Waiting out a backoff delay before the next attempt.
    Reconnecting,
    /// Deliberately closed: caller disconnect or terminal execution status.
    Closed,
}

/// What the client reports to its consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamNotice {
    /// A decoded execution event.
    Event(ExecutionEvent),
    /// The connection lifecycle moved.
    StateChanged(ConnectionState),
    /// A transport error occurred; reconnection may follow.
    TransportError { message: String },
    /// A reconnect succeeded after `failures` consecutive errors. Events
    /// may have been missed; re-query authoritative state to resync.
    Reconnected { failures: u32 },
    /// The failure budget is spent; the client stops trying.
    GaveUp { failures: u32 },
}

/// Commands the bidirectional (WebSocket) path accepts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionCommand {
    Pause,
    Resume,
    Abort,
    SkipNode { node_id: NodeId },
    InteractiveResponse { node_id: NodeId, response: String },
}

/// Errors from the stream client and its transports.
#[derive(Debug, Error, Diagnostic)]
pub enum StreamError {
    /// HTTP-level failure on the SSE path.
    #[error("sse transport error: {0}")]
    #[diagnostic(code(diaflow::stream::sse))]
    Http(#[from] reqwest::Error),

    /// WebSocket-level failure.
    #[error("websocket transport error: {0}")]
    #[diagnostic(code(diaflow::stream::websocket))]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Transport failure outside the built-in wire errors (custom
    /// transports report through this).
    #[error("{transport} transport failure: {message}")]
    #[diagnostic(code(diaflow::stream::transport))]
    Transport {
        transport: &'static str,
        message: String,
    },

    /// The transport cannot carry commands (SSE is receive-only).
    #[error("{transport} transport does not support commands")]
    #[diagnostic(
        code(diaflow::stream::command_unsupported),
        help("Use the WebSocket transport for pause/resume/skip commands.")
    )]
    CommandUnsupported { transport: &'static str },

    /// A command could not be serialized for the wire.
    #[error("failed to encode command: {0}")]
    #[diagnostic(code(diaflow::stream::command_encode))]
    CommandEncode(#[from] serde_json::Error),

    /// The client task is not running (never started or already closed).
    #[error("stream client is not connected")]
    #[diagnostic(code(diaflow::stream::not_connected))]
    NotConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_serialize_with_snake_case_tags() {
        let cmd = ExecutionCommand::SkipNode {
            node_id: NodeId::new("n3"),
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["type"], "skip_node");
        assert_eq!(value["node_id"], "n3");

        let pause = serde_json::to_value(ExecutionCommand::Pause).unwrap();
        assert_eq!(pause["type"], "pause");
    }
}
