//! Local execution state: the client-side cache of one run.
//!
//! All mutation goes through [`ExecutionState::apply`], the single reducer
//! for decoded wire events. The backend is the source of truth; this state
//! is a cache that a fresh status query can rebuild at any time, which is
//! why it is deliberately excluded from snapshot persistence.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::collections::VecDeque;

use super::event::{ExecutionEvent, TokenUsage};
use super::{ExecutionStatus, NodeExecutionStatus};
use crate::ids::{ExecutionId, NodeId};

/// How many log lines the state retains; older lines fall off the front.
pub const LOG_CAPACITY: usize = 512;

/// One retained log line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub when: DateTime<Utc>,
    pub node: Option<NodeId>,
    pub message: String,
}

/// A pending interactive prompt the run is blocked on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractivePromptInfo {
    pub node: NodeId,
    pub prompt: String,
    pub timeout: Option<u32>,
    pub raised_at: DateTime<Utc>,
}

/// The observed state of one execution run.
#[derive(Clone, Debug)]
pub struct ExecutionState {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    pub node_status: FxHashMap<NodeId, NodeExecutionStatus>,
    pub node_outputs: FxHashMap<NodeId, Value>,
    pub node_errors: FxHashMap<NodeId, String>,
    /// Aggregated token counts across all node completions.
    pub token_usage: TokenUsage,
    /// Aggregated cost across all node completions, in the backend's unit.
    pub total_cost: f64,
    pub pending_prompts: Vec<InteractivePromptInfo>,
    pub last_error: Option<String>,
    log: VecDeque<LogLine>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionState {
    /// Fresh state for a run; everything pending, nothing observed yet.
    #[must_use]
    pub fn new(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            status: ExecutionStatus::Pending,
            node_status: FxHashMap::default(),
            node_outputs: FxHashMap::default(),
            node_errors: FxHashMap::default(),
            token_usage: TokenUsage::default(),
            total_cost: 0.0,
            pending_prompts: Vec::new(),
            last_error: None,
            log: VecDeque::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether the run has reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The retained log lines, oldest first.
    #[must_use]
    pub fn log(&self) -> impl Iterator<Item = &LogLine> {
        self.log.iter()
    }

    /// Fold one decoded event into the state.
    ///
    /// Events for a different run are ignored (logged at debug level); the
    /// state is keyed to exactly one execution.
    pub fn apply(&mut self, event: &ExecutionEvent) {
        if event.execution_id() != &self.execution_id {
            tracing::debug!(
                expected = %self.execution_id,
                got = %event.execution_id(),
                "dropping event for another execution"
            );
            return;
        }
        match event {
            ExecutionEvent::StatusChanged { status, .. } => {
                self.status = *status;
                match status {
                    ExecutionStatus::Running if self.started_at.is_none() => {
                        self.started_at = Some(Utc::now());
                    }
                    s if s.is_terminal() => {
                        self.finished_at = Some(Utc::now());
                    }
                    _ => {}
                }
                self.push_log(None, format!("execution status: {status}"));
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
                self.node_status.insert(node_id.clone(), *status);
                if let Some(output) = output {
                    self.node_outputs.insert(node_id.clone(), output.clone());
                }
                if let Some(error) = error {
                    self.node_errors.insert(node_id.clone(), error.clone());
                }
                if let Some(usage) = token_usage {
                    self.token_usage.add(usage);
                }
                if let Some(cost) = cost {
                    self.total_cost += cost;
                }
                self.push_log(Some(node_id.clone()), format!("node status: {status}"));
            }
            ExecutionEvent::NodeProgress {
                node_id, message, ..
            } => {
                self.push_log(Some(node_id.clone()), message.clone());
            }
            ExecutionEvent::InteractivePrompt {
                node_id,
                prompt,
                timeout,
                ..
            } => {
                self.pending_prompts.push(InteractivePromptInfo {
                    node: node_id.clone(),
                    prompt: prompt.clone(),
                    timeout: *timeout,
                    raised_at: Utc::now(),
                });
                self.push_log(Some(node_id.clone()), format!("waiting on: {prompt}"));
            }
            ExecutionEvent::InteractiveResponse { node_id, .. } => {
                self.pending_prompts.retain(|p| &p.node != node_id);
                self.push_log(Some(node_id.clone()), "prompt answered".to_string());
            }
            ExecutionEvent::Error { message, .. } => {
                self.status = ExecutionStatus::Failed;
                self.finished_at = Some(Utc::now());
                self.last_error = Some(message.clone());
                self.push_log(None, format!("execution error: {message}"));
            }
            ExecutionEvent::BatchUpdate { events, .. } => {
                for inner in events {
                    self.apply(inner);
                }
            }
        }
    }

    fn push_log(&mut self, node: Option<NodeId>, message: String) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(LogLine {
            when: Utc::now(),
            node,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec() -> ExecutionId {
        ExecutionId::new("exec_t")
    }

    #[test]
    fn status_and_node_events_update_the_cache() {
        let mut state = ExecutionState::new(exec());
        state.apply(&ExecutionEvent::StatusChanged {
            execution_id: exec(),
            status: ExecutionStatus::Running,
        });
        state.apply(&ExecutionEvent::NodeStatusChanged {
            execution_id: exec(),
            node_id: NodeId::new("n1"),
            status: NodeExecutionStatus::Completed,
            output: Some(serde_json::json!("done")),
            error: None,
            token_usage: Some(TokenUsage {
                input: 100,
                output: 20,
                cached: 10,
            }),
            cost: Some(0.01),
        });

        assert_eq!(state.status, ExecutionStatus::Running);
        assert!(state.started_at.is_some());
        assert_eq!(
            state.node_status[&NodeId::new("n1")],
            NodeExecutionStatus::Completed
        );
        assert_eq!(state.token_usage.total(), 120);
        assert!((state.total_cost - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn events_for_other_executions_are_ignored() {
        let mut state = ExecutionState::new(exec());
        state.apply(&ExecutionEvent::StatusChanged {
            execution_id: ExecutionId::new("exec_other"),
            status: ExecutionStatus::Completed,
        });
        assert_eq!(state.status, ExecutionStatus::Pending);
    }

    #[test]
    fn prompts_are_queued_and_cleared() {
        let mut state = ExecutionState::new(exec());
        state.apply(&ExecutionEvent::InteractivePrompt {
            execution_id: exec(),
            node_id: NodeId::new("ask"),
            prompt: "continue?".into(),
            timeout: Some(30),
        });
        assert_eq!(state.pending_prompts.len(), 1);
        state.apply(&ExecutionEvent::InteractiveResponse {
            execution_id: exec(),
            node_id: NodeId::new("ask"),
            response: "yes".into(),
        });
        assert!(state.pending_prompts.is_empty());
    }

    #[test]
    fn engine_error_marks_the_run_failed() {
        let mut state = ExecutionState::new(exec());
        state.apply(&ExecutionEvent::Error {
            execution_id: exec(),
            message: "boom".into(),
        });
        assert_eq!(state.status, ExecutionStatus::Failed);
        assert!(state.is_terminal());
        assert_eq!(state.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn batch_updates_apply_in_order() {
        let mut state = ExecutionState::new(exec());
        state.apply(&ExecutionEvent::BatchUpdate {
            execution_id: exec(),
            events: vec![
                ExecutionEvent::StatusChanged {
                    execution_id: exec(),
                    status: ExecutionStatus::Running,
                },
                ExecutionEvent::StatusChanged {
                    execution_id: exec(),
                    status: ExecutionStatus::Completed,
                },
            ],
        });
        assert_eq!(state.status, ExecutionStatus::Completed);
        assert!(state.finished_at.is_some());
    }

    #[test]
    fn log_ring_is_bounded() {
        let mut state = ExecutionState::new(exec());
        for i in 0..(LOG_CAPACITY + 10) {
            state.apply(&ExecutionEvent::NodeProgress {
                execution_id: exec(),
                node_id: NodeId::new("n"),
                message: format!("line {i}"),
            });
        }
        assert_eq!(state.log().count(), LOG_CAPACITY);
        assert_eq!(state.log().next().map(|l| l.message.as_str()), Some("line 10"));
    }
}
