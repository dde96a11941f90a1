//! Execution-side types: run/node statuses, wire events, and the local
//! execution state reducer.
//!
//! The execution engine itself is backend-owned; this module only models
//! what the client observes. [`event::ExecutionEvent`] is the decoded wire
//! event, [`state::ExecutionState`] is the local cache those events are
//! folded into.

pub mod event;
pub mod state;

pub use event::{EventDecodeError, EventType, ExecutionEvent, TokenUsage};
pub use state::{ExecutionState, InteractivePromptInfo, LogLine};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::ParseTagError;

/// Status of one execution run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Aborted,
    Skipped,
}

impl ExecutionStatus {
    /// Once terminal, a run emits no further events; the stream client uses
    /// this to suppress reconnection against an intentionally closed server.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Aborted
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Paused => "PAUSED",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Aborted => "ABORTED",
            ExecutionStatus::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ExecutionStatus::Pending),
            "RUNNING" => Ok(ExecutionStatus::Running),
            "PAUSED" => Ok(ExecutionStatus::Paused),
            "COMPLETED" => Ok(ExecutionStatus::Completed),
            "FAILED" => Ok(ExecutionStatus::Failed),
            "ABORTED" => Ok(ExecutionStatus::Aborted),
            "SKIPPED" => Ok(ExecutionStatus::Skipped),
            other => Err(ParseTagError {
                what: "execution status",
                value: other.to_string(),
            }),
        }
    }
}

/// Status of one node within a run; a superset of [`ExecutionStatus`] with
/// the iteration-cap outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeExecutionStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Aborted,
    Skipped,
    MaxiterReached,
}

impl NodeExecutionStatus {
    /// Whether the node has finished (in any outcome).
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(
            self,
            NodeExecutionStatus::Pending
                | NodeExecutionStatus::Running
                | NodeExecutionStatus::Paused
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeExecutionStatus::Pending => "PENDING",
            NodeExecutionStatus::Running => "RUNNING",
            NodeExecutionStatus::Paused => "PAUSED",
            NodeExecutionStatus::Completed => "COMPLETED",
            NodeExecutionStatus::Failed => "FAILED",
            NodeExecutionStatus::Aborted => "ABORTED",
            NodeExecutionStatus::Skipped => "SKIPPED",
            NodeExecutionStatus::MaxiterReached => "MAXITER_REACHED",
        }
    }
}

impl fmt::Display for NodeExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Aborted.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Paused.is_terminal());
    }

    #[test]
    fn status_wire_tags_are_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&NodeExecutionStatus::MaxiterReached).unwrap(),
            "\"MAXITER_REACHED\""
        );
        let parsed: ExecutionStatus = "ABORTED".parse().unwrap();
        assert_eq!(parsed, ExecutionStatus::Aborted);
    }
}
