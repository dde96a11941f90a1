//! The transport seam the stream client is parameterized by.

use async_trait::async_trait;

use super::{ExecutionCommand, StreamError};
use crate::ids::ExecutionId;

/// Opens connections to the backend's event stream for one execution.
///
/// Implementations own the wire only; the client owns reconnection,
/// decoding, and lifecycle. Tests substitute scripted transports here.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Open a fresh connection for `execution_id`.
    async fn connect(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Box<dyn StreamConnection>, StreamError>;
}

/// One live connection yielding raw text frames.
#[async_trait]
pub trait StreamConnection: Send {
    /// The next raw frame.
    ///
    /// `Ok(None)` means the server closed the stream cleanly; an error is a
    /// transport failure the client may recover from by reconnecting.
    async fn next_frame(&mut self) -> Result<Option<String>, StreamError>;

    /// Send a command upstream. Receive-only transports return
    /// [`StreamError::CommandUnsupported`].
    async fn send(&mut self, command: &ExecutionCommand) -> Result<(), StreamError>;

    /// Close the underlying transport. Must be idempotent.
    async fn close(&mut self);
}
