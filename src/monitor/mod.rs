//! Monitor-side event fan-out.
//!
//! The stream client decodes wire frames into
//! [`crate::execution::ExecutionEvent`]s and hands them to a [`MonitorBus`],
//! which broadcasts each event to every registered [`EventSink`]: stdout
//! rendering for console monitoring, an in-memory sink for tests, a channel
//! sink for async consumers. One bus per watched execution is typical, but
//! nothing prevents sharing.

mod bus;
mod sink;

pub use bus::MonitorBus;
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
