//! # Diaflow: Diagram Workflow Domain Core and Streaming Client
//!
//! Diaflow is the domain core and client-side toolkit for a diagram-based
//! agent-workflow system: typed graphs of nodes wired by arrows between
//! named handles, the persons (LLM agent identities) and api-key references
//! they lean on, portable serialization with label/ID round-tripping, and a
//! resilient client for the backend's execution-event streams.
//!
//! ## Core Concepts
//!
//! - **Diagram**: a validated graph of typed nodes, arrows, handles,
//!   persons, and api-key references
//! - **Converter**: bidirectional mapping between generated ids in memory
//!   and unique human labels in the persisted formats (native JSON,
//!   light/readable YAML)
//! - **Store**: the single state container; every mutation is a typed
//!   command applied atomically
//! - **Stream**: one reconnecting client over pluggable transports (SSE,
//!   WebSocket) with backoff and terminal-status suppression
//! - **Execution state**: the local cache of one run, folded from decoded
//!   wire events by a single reducer
//!
//! ## Building a Diagram
//!
//! ```
//! use diaflow::diagram::node::{PersonJobData, StartData};
//! use diaflow::diagram::{DomainArrow, DomainNode, NodeData, Vec2};
//! use diaflow::ids::HandleRef;
//! use diaflow::store::{DiagramCommand, DiagramStore};
//! use diaflow::types::HandleLabel;
//!
//! let mut store = DiagramStore::new();
//!
//! let start = DomainNode::new("Start", Vec2::new(0.0, 0.0), NodeData::Start(StartData::default()));
//! let ask = DomainNode::new(
//!     "Ask",
//!     Vec2::new(250.0, 0.0),
//!     NodeData::PersonJob(PersonJobData::default()),
//! );
//! let (start_id, ask_id) = (start.id.clone(), ask.id.clone());
//!
//! store.apply(DiagramCommand::AddNode(start)).unwrap();
//! store.apply(DiagramCommand::AddNode(ask)).unwrap();
//! store
//!     .apply(DiagramCommand::AddArrow(DomainArrow::new(
//!         HandleRef::new(start_id, HandleLabel::Default),
//!         HandleRef::new(ask_id, HandleLabel::Default),
//!     )))
//!     .unwrap();
//!
//! assert_eq!(store.revision(), 3);
//! ```
//!
//! ## Round-Tripping Documents
//!
//! ```
//! use diaflow::convert::DiagramConverter;
//! use diaflow::types::DiagramFormat;
//!
//! let light = r#"
//! nodes:
//!   Start:
//!     type: start
//!   Done:
//!     type: endpoint
//! connections:
//!   - from: Start
//!     to: Done
//! "#;
//!
//! let converter = DiagramConverter::new();
//! let diagram = converter.deserialize(light, Some(DiagramFormat::Light)).unwrap();
//! assert_eq!(diagram.nodes.len(), 2);
//!
//! // Re-encode as the full-fidelity native form.
//! let native = converter.serialize(&diagram, DiagramFormat::Native).unwrap();
//! assert!(native.contains("\"nodes\""));
//! ```
//!
//! ## Watching an Execution
//!
//! ```no_run
//! use diaflow::config::ClientConfig;
//! use diaflow::ids::ExecutionId;
//! use diaflow::stream::{SseTransport, StreamClient, StreamNotice};
//!
//! # async fn demo() {
//! let config = ClientConfig::from_env();
//! let client = StreamClient::new(SseTransport::new(config.base_url.clone()))
//!     .with_backoff(config.backoff.clone());
//!
//! let handle = client.spawn(Some(ExecutionId::new("exec_42")));
//! while let Some(notice) = handle.recv().await {
//!     match notice {
//!         StreamNotice::Event(event) => println!("{event:?}"),
//!         StreamNotice::Reconnected { .. } => {
//!             // Events may have been missed; re-query authoritative state.
//!         }
//!         _ => {}
//!     }
//! }
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Closed domain enums (node kinds, handles, services)
//! - [`ids`] - Typed identifiers and `node:handle` endpoint references
//! - [`diagram`] - The diagram data model and structural validation
//! - [`convert`] - Label/ID round-trip and format strategies
//! - [`store`] - Command-funneled state container and snapshot persistence
//! - [`execution`] - Statuses, wire events, and the local state reducer
//! - [`monitor`] - Event fan-out to pluggable sinks
//! - [`stream`] - The resilient SSE/WebSocket stream client
//! - [`api`] - Backend envelope handling and explicit sync calls
//! - [`config`] - Environment-backed client configuration
//! - [`telemetry`] - Console rendering and tracing setup

pub mod api;
pub mod config;
pub mod convert;
pub mod diagram;
pub mod execution;
pub mod ids;
pub mod monitor;
pub mod store;
pub mod stream;
pub mod telemetry;
pub mod types;
