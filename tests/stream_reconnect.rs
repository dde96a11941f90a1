//! Reconnect behavior of the stream client over a scripted transport:
//! backoff budget, terminal-status suppression, and cancellation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::timeout;

use diaflow::execution::{EventType, ExecutionEvent};
use diaflow::ids::ExecutionId;
use diaflow::stream::{
    BackoffPolicy, ConnectionState, ExecutionCommand, StreamClient, StreamConnection,
    StreamError, StreamNotice, StreamTransport,
};

/// What one scripted connect attempt does.
#[derive(Clone)]
enum Attempt {
    /// Fail to connect at all.
    Refuse,
    /// Deliver the frames, then close cleanly.
    Frames(Vec<String>),
    /// Deliver the frames, then fail with a transport error.
    FramesThenError(Vec<String>),
}

struct ScriptedTransport {
    connects: Arc<AtomicU32>,
    script: Mutex<VecDeque<Attempt>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Attempt>) -> (Self, Arc<AtomicU32>) {
        let connects = Arc::new(AtomicU32::new(0));
        (
            Self {
                connects: connects.clone(),
                script: Mutex::new(script.into()),
            },
            connects,
        )
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn connect(
        &self,
        _execution_id: &ExecutionId,
    ) -> Result<Box<dyn StreamConnection>, StreamError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let attempt = self.script.lock().pop_front().unwrap_or(Attempt::Refuse);
        match attempt {
            Attempt::Refuse => Err(StreamError::Transport {
                transport: "scripted",
                message: "connection refused".to_string(),
            }),
            Attempt::Frames(frames) => Ok(Box::new(ScriptedConnection {
                frames: frames.into(),
                error_at_end: false,
            })),
            Attempt::FramesThenError(frames) => Ok(Box::new(ScriptedConnection {
                frames: frames.into(),
                error_at_end: true,
            })),
        }
    }
}

struct ScriptedConnection {
    frames: VecDeque<String>,
    error_at_end: bool,
}

#[async_trait]
impl StreamConnection for ScriptedConnection {
    async fn next_frame(&mut self) -> Result<Option<String>, StreamError> {
        match self.frames.pop_front() {
            Some(frame) => Ok(Some(frame)),
            None if self.error_at_end => {
                self.error_at_end = false;
                Err(StreamError::Transport {
                    transport: "scripted",
                    message: "connection reset".to_string(),
                })
            }
            None => Ok(None),
        }
    }

    async fn send(&mut self, _command: &ExecutionCommand) -> Result<(), StreamError> {
        Err(StreamError::CommandUnsupported {
            transport: "scripted",
        })
    }

    async fn close(&mut self) {}
}

fn fast_backoff(max_attempts: u32) -> BackoffPolicy {
    BackoffPolicy {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        max_attempts,
        jitter: false,
    }
}

fn status_frame(status: &str) -> String {
    format!(r#"{{"type":"EXECUTION_STATUS_CHANGED","execution_id":"exec_t","data":{{"status":"{status}"}}}}"#)
}

async fn collect_until_end(handle: &diaflow::stream::StreamHandle) -> Vec<StreamNotice> {
    let mut notices = Vec::new();
    while let Ok(Some(notice)) = timeout(Duration::from_secs(5), handle.recv()).await {
        notices.push(notice);
    }
    notices
}

#[tokio::test(flavor = "multi_thread")]
async fn gives_up_after_the_failure_budget() {
    let (transport, connects) = ScriptedTransport::new(vec![]);
    let client = StreamClient::new(transport).with_backoff(fast_backoff(5));
    let handle = client.spawn(Some(ExecutionId::new("exec_t")));

    let notices = collect_until_end(&handle).await;

    assert_eq!(connects.load(Ordering::SeqCst), 5);
    assert!(notices
        .iter()
        .any(|n| matches!(n, StreamNotice::GaveUp { failures: 5 })));
    assert_eq!(handle.state(), ConnectionState::Disconnected);
}

#[tokio::test(flavor = "multi_thread")]
async fn terminal_status_suppresses_reconnection() {
    // The run completes, then the transport errors out; the client must not
    // reconnect against a server that shut the stream down on purpose.
    let (transport, connects) = ScriptedTransport::new(vec![Attempt::FramesThenError(vec![
        status_frame("RUNNING"),
        status_frame("COMPLETED"),
    ])]);
    let client = StreamClient::new(transport).with_backoff(fast_backoff(5));
    let handle = client.spawn(Some(ExecutionId::new("exec_t")));

    let notices = collect_until_end(&handle).await;

    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(handle.state(), ConnectionState::Closed);
    let events: Vec<_> = notices
        .iter()
        .filter_map(|n| match n {
            StreamNotice::Event(e) => Some(e.event_type()),
            _ => None,
        })
        .collect();
    assert_eq!(
        events,
        vec![
            EventType::ExecutionStatusChanged,
            EventType::ExecutionStatusChanged
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_emits_a_resync_notice() {
    let (transport, connects) = ScriptedTransport::new(vec![
        Attempt::FramesThenError(vec![status_frame("RUNNING")]),
        Attempt::Frames(vec![status_frame("COMPLETED")]),
    ]);
    let client = StreamClient::new(transport).with_backoff(fast_backoff(5));
    let handle = client.spawn(Some(ExecutionId::new("exec_t")));

    let notices = collect_until_end(&handle).await;

    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert!(notices
        .iter()
        .any(|n| matches!(n, StreamNotice::Reconnected { failures: 1 })));
    assert_eq!(handle.state(), ConnectionState::Closed);
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnect_cancels_a_pending_reconnect_timer() {
    let (transport, connects) = ScriptedTransport::new(vec![]);
    let client = StreamClient::new(transport).with_backoff(BackoffPolicy {
        base_delay: Duration::from_secs(60),
        max_delay: Duration::from_secs(60),
        max_attempts: 5,
        jitter: false,
    });
    let handle = client.spawn(Some(ExecutionId::new("exec_t")));

    // Wait until the client is sitting in its backoff sleep.
    loop {
        match timeout(Duration::from_secs(5), handle.recv())
            .await
            .expect("client stalled")
        {
            Some(StreamNotice::StateChanged(ConnectionState::Reconnecting)) => break,
            Some(_) => continue,
            None => panic!("stream ended before reconnecting"),
        }
    }

    // Disconnect must return promptly despite the 60s pending timer.
    timeout(Duration::from_secs(1), handle.disconnect())
        .await
        .expect("disconnect did not cancel the pending timer");
    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn no_execution_id_means_no_network_activity() {
    let (transport, connects) = ScriptedTransport::new(vec![Attempt::Frames(vec![])]);
    let client = StreamClient::new(transport).with_backoff(fast_backoff(5));
    let handle = client.spawn(None);

    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert_eq!(handle.recv().await, None);
    assert_eq!(connects.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_and_unknown_frames_are_dropped_quietly() {
    let (transport, _) = ScriptedTransport::new(vec![Attempt::Frames(vec![
        "this is not json".to_string(),
        r#"{"type":"BRAND_NEW_EVENT","execution_id":"exec_t","data":{}}"#.to_string(),
        status_frame("COMPLETED"),
    ])]);
    let client = StreamClient::new(transport).with_backoff(fast_backoff(5));
    let handle = client.spawn(Some(ExecutionId::new("exec_t")));

    let notices = collect_until_end(&handle).await;
    let events: Vec<_> = notices
        .iter()
        .filter(|n| matches!(n, StreamNotice::Event(_)))
        .collect();
    assert_eq!(events.len(), 1);

    let event = notices.iter().find_map(|n| match n {
        StreamNotice::Event(ExecutionEvent::StatusChanged { status, .. }) => Some(*status),
        _ => None,
    });
    assert_eq!(event, Some(diaflow::execution::ExecutionStatus::Completed));
}
