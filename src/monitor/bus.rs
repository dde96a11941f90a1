//! The monitor bus: receives decoded events and broadcasts to sinks.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{sync::oneshot, task};

use super::sink::{EventSink, StdOutSink};
use crate::execution::ExecutionEvent;

/// Receives execution events on a channel and broadcasts each one to every
/// registered sink from a background task.
pub struct MonitorBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    event_channel: (
        flume::Sender<ExecutionEvent>,
        flume::Receiver<ExecutionEvent>,
    ),
    listener: Mutex<Option<ListenerState>>,
}

impl Default for MonitorBus {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl MonitorBus {
    /// Create a bus with a single sink.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self::with_sinks(vec![Box::new(sink)])
    }

    /// Create a bus with multiple sinks.
    #[must_use]
    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            event_channel: flume::unbounded(),
            listener: Mutex::new(None),
        }
    }

    /// Dynamically add a sink (useful for per-request streaming).
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().push(Box::new(sink));
    }

    /// Get a clone of the sender side so producers can push events.
    #[must_use]
    pub fn sender(&self) -> flume::Sender<ExecutionEvent> {
        self.event_channel.0.clone()
    }

    /// Spawn the background task that drains the channel into the sinks.
    /// Idempotent: calling multiple times has no effect.
    pub fn listen(&self) {
        let mut guard = self.listener.lock();
        if guard.is_some() {
            return; // Already listening
        }

        let receiver = self.event_channel.1.clone();
        let sinks = self.sinks.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        Err(_) => break, // All senders dropped.
                        Ok(event) => {
                            let mut sinks_guard = sinks.lock();
                            for sink in sinks_guard.iter_mut() {
                                if let Err(err) = sink.handle(&event) {
                                    tracing::warn!(error = %err, "monitor sink error");
                                }
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener task, waiting for it to wind down.
    pub async fn stop(&self) {
        let state = self.listener.lock().take();
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for MonitorBus {
    fn drop(&mut self) {
        if let Some(state) = self.listener.lock().take() {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}
