//! Monitor bus fan-out: every sink sees every event, in order.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use diaflow::execution::{ExecutionEvent, ExecutionStatus};
use diaflow::ids::ExecutionId;
use diaflow::monitor::{ChannelSink, MemorySink, MonitorBus};

fn status_event(status: ExecutionStatus) -> ExecutionEvent {
    ExecutionEvent::StatusChanged {
        execution_id: ExecutionId::new("exec_m"),
        status,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn events_reach_every_sink_in_order() {
    let memory = MemorySink::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let bus = MonitorBus::with_sink(memory.clone());
    bus.add_sink(ChannelSink::new(tx));
    bus.listen();

    let sender = bus.sender();
    sender.send(status_event(ExecutionStatus::Running)).unwrap();
    sender
        .send(status_event(ExecutionStatus::Completed))
        .unwrap();

    // The channel sink sees both, in order.
    let first = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    let second = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(first, Some(status_event(ExecutionStatus::Running)));
    assert_eq!(second, Some(status_event(ExecutionStatus::Completed)));

    bus.stop().await;

    let snapshot = memory.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0], status_event(ExecutionStatus::Running));
}

#[tokio::test(flavor = "multi_thread")]
async fn listen_is_idempotent() {
    let memory = MemorySink::new();
    let bus = MonitorBus::with_sink(memory.clone());
    bus.listen();
    bus.listen(); // no second listener; events are not duplicated

    bus.sender()
        .send(status_event(ExecutionStatus::Running))
        .unwrap();

    // Give the listener a moment to drain.
    tokio::time::sleep(Duration::from_millis(50)).await;
    bus.stop().await;
    assert_eq!(memory.snapshot().len(), 1);
}
