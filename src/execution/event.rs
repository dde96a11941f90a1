//! Execution events as they arrive on the wire.
//!
//! The backend pushes newline-delimited JSON envelopes of the shape
//! `{ "type": "...", "execution_id": "...", "data": { … } }`. Decoding is
//! tolerant in exactly one way: an unrecognized `type` tag yields
//! `Ok(None)` so future event kinds are skipped instead of killing the
//! stream. Anything else malformed is an error — the stream client logs it
//! at debug level and drops the frame.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::{ExecutionStatus, NodeExecutionStatus};
use crate::ids::{ExecutionId, NodeId};
use crate::types::ParseTagError;

/// Wire tags of the known event kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ExecutionStatusChanged,
    NodeStatusChanged,
    NodeProgress,
    InteractivePrompt,
    InteractiveResponse,
    ExecutionError,
    ExecutionUpdate,
}

impl EventType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ExecutionStatusChanged => "EXECUTION_STATUS_CHANGED",
            EventType::NodeStatusChanged => "NODE_STATUS_CHANGED",
            EventType::NodeProgress => "NODE_PROGRESS",
            EventType::InteractivePrompt => "INTERACTIVE_PROMPT",
            EventType::InteractiveResponse => "INTERACTIVE_RESPONSE",
            EventType::ExecutionError => "EXECUTION_ERROR",
            EventType::ExecutionUpdate => "EXECUTION_UPDATE",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXECUTION_STATUS_CHANGED" => Ok(EventType::ExecutionStatusChanged),
            "NODE_STATUS_CHANGED" => Ok(EventType::NodeStatusChanged),
            "NODE_PROGRESS" => Ok(EventType::NodeProgress),
            "INTERACTIVE_PROMPT" => Ok(EventType::InteractivePrompt),
            "INTERACTIVE_RESPONSE" => Ok(EventType::InteractiveResponse),
            "EXECUTION_ERROR" => Ok(EventType::ExecutionError),
            "EXECUTION_UPDATE" => Ok(EventType::ExecutionUpdate),
            other => Err(ParseTagError {
                what: "event type",
                value: other.to_string(),
            }),
        }
    }
}

/// Token counts reported with node completions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub cached: u64,
}

impl TokenUsage {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.input + self.output
    }

    /// Accumulate another report into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input += other.input;
        self.output += other.output;
        self.cached += other.cached;
    }
}

/// Errors produced while decoding a wire frame.
#[derive(Debug, Error, Diagnostic)]
pub enum EventDecodeError {
    /// The frame is not valid JSON or lacks the envelope fields.
    #[error("malformed event frame: {source}")]
    #[diagnostic(code(diaflow::execution::malformed_frame))]
    Frame {
        #[source]
        source: serde_json::Error,
    },

    /// The `data` payload does not match what the event type requires.
    #[error("malformed {event_type} payload: {source}")]
    #[diagnostic(code(diaflow::execution::malformed_payload))]
    Payload {
        event_type: EventType,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    execution_id: ExecutionId,
    #[serde(default)]
    data: Value,
}

#[derive(Serialize, Deserialize)]
struct StatusChangedData {
    status: ExecutionStatus,
}

#[derive(Serialize, Deserialize)]
struct NodeStatusChangedData {
    node_id: NodeId,
    status: NodeExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cost: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct NodeProgressData {
    node_id: NodeId,
    message: String,
}

#[derive(Serialize, Deserialize)]
struct InteractivePromptData {
    node_id: NodeId,
    prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct InteractiveResponseData {
    node_id: NodeId,
    response: String,
}

#[derive(Serialize, Deserialize)]
struct ExecutionErrorData {
    #[serde(alias = "error")]
    message: String,
}

#[derive(Serialize, Deserialize)]
struct ExecutionUpdateData {
    events: Vec<Value>,
}

/// A decoded execution event.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionEvent {
    /// The run's overall status changed.
    StatusChanged {
        execution_id: ExecutionId,
        status: ExecutionStatus,
    },
    /// One node's status changed, possibly carrying output and accounting.
    NodeStatusChanged {
        execution_id: ExecutionId,
        node_id: NodeId,
        status: NodeExecutionStatus,
        output: Option<Value>,
        error: Option<String>,
        token_usage: Option<TokenUsage>,
        cost: Option<f64>,
    },
    /// A progress/log line from a running node.
    NodeProgress {
        execution_id: ExecutionId,
        node_id: NodeId,
        message: String,
    },
    /// The run is waiting on a human response.
    InteractivePrompt {
        execution_id: ExecutionId,
        node_id: NodeId,
        prompt: String,
        timeout: Option<u32>,
    },
    /// A human response was recorded (possibly by another client).
    InteractiveResponse {
        execution_id: ExecutionId,
        node_id: NodeId,
        response: String,
    },
    /// The run failed with an engine-level error.
    Error {
        execution_id: ExecutionId,
        message: String,
    },
    /// Batch wrapper: inner events apply in order.
    BatchUpdate {
        execution_id: ExecutionId,
        events: Vec<ExecutionEvent>,
    },
}

impl ExecutionEvent {
    /// The run this event belongs to.
    #[must_use]
    pub fn execution_id(&self) -> &ExecutionId {
        match self {
            ExecutionEvent::StatusChanged { execution_id, .. }
            | ExecutionEvent::NodeStatusChanged { execution_id, .. }
            | ExecutionEvent::NodeProgress { execution_id, .. }
            | ExecutionEvent::InteractivePrompt { execution_id, .. }
            | ExecutionEvent::InteractiveResponse { execution_id, .. }
            | ExecutionEvent::Error { execution_id, .. }
            | ExecutionEvent::BatchUpdate { execution_id, .. } => execution_id,
        }
    }

    /// The wire tag of this event.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            ExecutionEvent::StatusChanged { .. } => EventType::ExecutionStatusChanged,
            ExecutionEvent::NodeStatusChanged { .. } => EventType::NodeStatusChanged,
            ExecutionEvent::NodeProgress { .. } => EventType::NodeProgress,
            ExecutionEvent::InteractivePrompt { .. } => EventType::InteractivePrompt,
            ExecutionEvent::InteractiveResponse { .. } => EventType::InteractiveResponse,
            ExecutionEvent::Error { .. } => EventType::ExecutionError,
            ExecutionEvent::BatchUpdate { .. } => EventType::ExecutionUpdate,
        }
    }

    /// Decode one wire frame.
    ///
    /// Returns `Ok(None)` when the frame is well-formed but its `type` tag
    /// is not a known event kind; such frames are skipped by consumers.
    pub fn decode(frame: &str) -> Result<Option<Self>, EventDecodeError> {
        let envelope: WireEnvelope =
            serde_json::from_str(frame).map_err(|source| EventDecodeError::Frame { source })?;
        Self::decode_envelope(envelope)
    }

    /// Decode an already-parsed JSON value (used for batch inners).
    pub fn decode_value(value: Value) -> Result<Option<Self>, EventDecodeError> {
        let envelope: WireEnvelope =
            serde_json::from_value(value).map_err(|source| EventDecodeError::Frame { source })?;
        Self::decode_envelope(envelope)
    }

    fn decode_envelope(envelope: WireEnvelope) -> Result<Option<Self>, EventDecodeError> {
        let Ok(event_type) = envelope.event_type.parse::<EventType>() else {
            return Ok(None);
        };
        let execution_id = envelope.execution_id;
        let payload = |source| EventDecodeError::Payload { event_type, source };

        let event = match event_type {
            EventType::ExecutionStatusChanged => {
                let data: StatusChangedData =
                    serde_json::from_value(envelope.data).map_err(payload)?;
                ExecutionEvent::StatusChanged {
                    execution_id,
                    status: data.status,
                }
            }
            EventType::NodeStatusChanged => {
                let data: NodeStatusChangedData =
                    serde_json::from_value(envelope.data).map_err(payload)?;
                ExecutionEvent::NodeStatusChanged {
                    execution_id,
                    node_id: data.node_id,
                    status: data.status,
                    output: data.output,
                    error: data.error,
                    token_usage: data.token_usage,
                    cost: data.cost,
                }
            }
            EventType::NodeProgress => {
                let data: NodeProgressData =
                    serde_json::from_value(envelope.data).map_err(payload)?;
                ExecutionEvent::NodeProgress {
                    execution_id,
                    node_id: data.node_id,
                    message: data.message,
                }
            }
            EventType::InteractivePrompt => {
                let data: InteractivePromptData =
                    serde_json::from_value(envelope.data).map_err(payload)?;
                ExecutionEvent::InteractivePrompt {
                    execution_id,
                    node_id: data.node_id,
                    prompt: data.prompt,
                    timeout: data.timeout,
                }
            }
            EventType::InteractiveResponse => {
                let data: InteractiveResponseData =
                    serde_json::from_value(envelope.data).map_err(payload)?;
                ExecutionEvent::InteractiveResponse {
                    execution_id,
                    node_id: data.node_id,
                    response: data.response,
                }
            }
            EventType::ExecutionError => {
                let data: ExecutionErrorData =
                    serde_json::from_value(envelope.data).map_err(payload)?;
                ExecutionEvent::Error {
                    execution_id,
                    message: data.message,
                }
            }
            EventType::ExecutionUpdate => {
                let data: ExecutionUpdateData =
                    serde_json::from_value(envelope.data).map_err(payload)?;
                let mut events = Vec::with_capacity(data.events.len());
                for inner in data.events {
                    // Unknown inner kinds are skipped just like top-level ones.
                    if let Some(event) = Self::decode_value(inner)? {
                        events.push(event);
                    }
                }
                ExecutionEvent::BatchUpdate {
                    execution_id,
                    events,
                }
            }
        };
        Ok(Some(event))
    }

    /// Encode back into the wire envelope (tests and the WebSocket path).
    #[must_use]
    pub fn to_wire_value(&self) -> Value {
        let data = match self {
            ExecutionEvent::StatusChanged { status, .. } => {
                serde_json::json!({ "status": status })
            }
            ExecutionEvent::NodeStatusChanged {
                node_id,
                status,
                output,
                error,
                token_usage,
                cost,
                ..
            } => {
                let mut map = serde_json::Map::new();
                map.insert("node_id".into(), serde_json::json!(node_id));
                map.insert("status".into(), serde_json::json!(status));
                if let Some(output) = output {
                    map.insert("output".into(), output.clone());
                }
                if let Some(error) = error {
                    map.insert("error".into(), Value::String(error.clone()));
                }
                if let Some(usage) = token_usage {
                    map.insert("token_usage".into(), serde_json::json!(usage));
                }
                if let Some(cost) = cost {
                    map.insert("cost".into(), serde_json::json!(cost));
                }
                Value::Object(map)
            }
            ExecutionEvent::NodeProgress {
                node_id, message, ..
            } => serde_json::json!({ "node_id": node_id, "message": message }),
            ExecutionEvent::InteractivePrompt {
                node_id,
                prompt,
                timeout,
                ..
            } => {
                let mut map = serde_json::Map::new();
                map.insert("node_id".into(), serde_json::json!(node_id));
                map.insert("prompt".into(), Value::String(prompt.clone()));
                if let Some(timeout) = timeout {
                    map.insert("timeout".into(), serde_json::json!(timeout));
                }
                Value::Object(map)
            }
            ExecutionEvent::InteractiveResponse {
                node_id, response, ..
            } => serde_json::json!({ "node_id": node_id, "response": response }),
            ExecutionEvent::Error { message, .. } => serde_json::json!({ "message": message }),
            ExecutionEvent::BatchUpdate { events, .. } => serde_json::json!({
                "events": events.iter().map(Self::to_wire_value).collect::<Vec<_>>(),
            }),
        };
        serde_json::json!({
            "type": self.event_type().as_str(),
            "execution_id": self.execution_id(),
            "data": data,
        })
    }
}
