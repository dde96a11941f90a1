//! The transport-agnostic stream client: connect, decode, reconnect.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::transport::{StreamConnection, StreamTransport};
use super::{BackoffPolicy, ConnectionState, ExecutionCommand, StreamError, StreamNotice};
use crate::execution::ExecutionEvent;
use crate::ids::ExecutionId;

/// Builds stream sessions over one transport.
pub struct StreamClient {
    transport: Arc<dyn StreamTransport>,
    backoff: BackoffPolicy,
}

impl StreamClient {
    /// A client over the given transport with the default backoff policy.
    pub fn new<T: StreamTransport + 'static>(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            backoff: BackoffPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Start watching an execution.
    ///
    /// With `None` the handle stays [`ConnectionState::Disconnected`] and no
    /// network activity happens at all; there is nothing to watch yet.
    #[must_use]
    pub fn spawn(&self, execution_id: Option<ExecutionId>) -> StreamHandle {
        let state = Arc::new(Mutex::new(ConnectionState::Disconnected));
        let (notice_tx, notice_rx) = flume::unbounded();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let Some(execution_id) = execution_id else {
            return StreamHandle {
                notices: notice_rx,
                commands: command_tx,
                shutdown: None,
                task: None,
                state,
            };
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let session = Session {
            transport: self.transport.clone(),
            backoff: self.backoff.clone(),
            execution_id,
            state: state.clone(),
            notices: notice_tx,
        };
        let task = tokio::spawn(session.run(shutdown_rx, command_rx));

        StreamHandle {
            notices: notice_rx,
            commands: command_tx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            state,
        }
    }
}

/// A running stream session: consume notices, send commands, disconnect.
pub struct StreamHandle {
    notices: flume::Receiver<StreamNotice>,
    commands: mpsc::UnboundedSender<ExecutionCommand>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    state: Arc<Mutex<ConnectionState>>,
}

impl StreamHandle {
    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// The next notice, or `None` once the session is over and drained.
    pub async fn recv(&self) -> Option<StreamNotice> {
        self.notices.recv_async().await.ok()
    }

    /// Non-blocking drain of everything currently queued.
    #[must_use]
    pub fn drain(&self) -> Vec<StreamNotice> {
        self.notices.try_iter().collect()
    }

    /// Queue a command for the backend (WebSocket transport only).
    pub fn send_command(&self, command: ExecutionCommand) -> Result<(), StreamError> {
        self.commands
            .send(command)
            .map_err(|_| StreamError::NotConnected)
    }

    /// Close the transport and cancel any pending reconnect timer.
    pub async fn disconnect(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Session {
    transport: Arc<dyn StreamTransport>,
    backoff: BackoffPolicy,
    execution_id: ExecutionId,
    state: Arc<Mutex<ConnectionState>>,
    notices: flume::Sender<StreamNotice>,
}

enum LoopOutcome {
    /// Caller asked to stop, or a terminal status closed the stream.
    Finished(ConnectionState),
    /// Transport trouble; reconnect unless suppressed.
    Retry { message: String },
}

impl Session {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
        let _ = self.notices.send(StreamNotice::StateChanged(state));
    }

    fn notify(&self, notice: StreamNotice) {
        let _ = self.notices.send(notice);
    }

    async fn run(
        self,
        mut shutdown: oneshot::Receiver<()>,
        mut commands: mpsc::UnboundedReceiver<ExecutionCommand>,
    ) {
        let mut failures: u32 = 0;
        let mut connected_before = false;
        let mut terminal_seen = false;

        loop {
            self.set_state(ConnectionState::Connecting);
            let connection = tokio::select! {
                _ = &mut shutdown => {
                    self.set_state(ConnectionState::Closed);
                    return;
                }
                result = self.transport.connect(&self.execution_id) => result,
            };

            let outcome = match connection {
                Ok(mut connection) => {
                    if connected_before {
                        self.notify(StreamNotice::Reconnected { failures });
                    }
                    connected_before = true;
                    failures = 0;
                    self.set_state(ConnectionState::Connected);

                    let outcome = self
                        .pump(
                            connection.as_mut(),
                            &mut shutdown,
                            &mut commands,
                            &mut terminal_seen,
                        )
                        .await;
                    connection.close().await;
                    outcome
                }
                Err(err) => LoopOutcome::Retry {
                    message: err.to_string(),
                },
            };

            match outcome {
                LoopOutcome::Finished(state) => {
                    self.set_state(state);
                    return;
                }
                LoopOutcome::Retry { message } => {
                    tracing::warn!(
                        execution = %self.execution_id,
                        transport = self.transport.name(),
                        error = %message,
                        "stream connection trouble"
                    );
                    self.notify(StreamNotice::TransportError { message });

                    if terminal_seen {
                        // The run is over; the server shut the stream down
                        // on purpose. Do not hammer it.
                        self.set_state(ConnectionState::Closed);
                        return;
                    }

                    failures += 1;
                    if self.backoff.exhausted(failures) {
                        self.notify(StreamNotice::GaveUp { failures });
                        self.set_state(ConnectionState::Disconnected);
                        return;
                    }

                    self.set_state(ConnectionState::Reconnecting);
                    let delay = self.backoff.delay(failures);
                    tokio::select! {
                        _ = &mut shutdown => {
                            // Disconnect during backoff cancels the pending
                            // timer; nothing is left running.
                            self.set_state(ConnectionState::Closed);
                            return;
                        }
                        _ = sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Drive one live connection until it ends or the caller stops us.
    async fn pump(
        &self,
        connection: &mut dyn StreamConnection,
        shutdown: &mut oneshot::Receiver<()>,
        commands: &mut mpsc::UnboundedReceiver<ExecutionCommand>,
        terminal_seen: &mut bool,
    ) -> LoopOutcome {
        // Once the command sender is gone the branch stays disabled; the
        // frame side keeps the connection alive.
        let mut commands_open = true;
        loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    return LoopOutcome::Finished(ConnectionState::Closed);
                }
                command = commands.recv(), if commands_open => {
                    match command {
                        Some(command) => match connection.send(&command).await {
                            Ok(()) => {}
                            Err(StreamError::CommandUnsupported { transport }) => {
                                tracing::warn!(
                                    transport,
                                    ?command,
                                    "dropping command: transport is receive-only"
                                );
                            }
                            Err(err) => {
                                return LoopOutcome::Retry {
                                    message: err.to_string(),
                                };
                            }
                        },
                        None => commands_open = false,
                    }
                }
                frame = connection.next_frame() => match frame {
                    Ok(Some(text)) => match ExecutionEvent::decode(&text) {
                        Ok(Some(event)) => {
                            if event_is_terminal(&event) {
                                *terminal_seen = true;
                            }
                            self.notify(StreamNotice::Event(event));
                        }
                        Ok(None) => {
                            tracing::debug!("skipping unrecognized event type");
                        }
                        Err(err) => {
                            // Malformed telemetry is dropped quietly; a toast
                            // per bad frame would be worse than the bug.
                            tracing::debug!(error = %err, "dropping malformed event frame");
                        }
                    },
                    Ok(None) => {
                        if *terminal_seen {
                            return LoopOutcome::Finished(ConnectionState::Closed);
                        }
                        return LoopOutcome::Retry {
                            message: "stream closed by server".to_string(),
                        };
                    }
                    Err(err) => {
                        return LoopOutcome::Retry {
                            message: err.to_string(),
                        };
                    }
                }
            }
        }
    }
}

/// Whether this event means the run is over (directly or inside a batch).
fn event_is_terminal(event: &ExecutionEvent) -> bool {
    match event {
        ExecutionEvent::StatusChanged { status, .. } => status.is_terminal(),
        ExecutionEvent::Error { .. } => true,
        ExecutionEvent::BatchUpdate { events, .. } => events.iter().any(event_is_terminal),
        _ => false,
    }
}
