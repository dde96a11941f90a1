//! Backend synchronization: the response envelope and the explicit
//! save/execute/status-query calls.
//!
//! The backend answers every call with the uniform envelope
//! `{ success, message?, error?, …payload }`. [`Envelope::into_result`] is
//! the one place business-rule failures (`success: false`) turn into typed
//! errors; callers never inspect `success` themselves. Synchronization is
//! explicit: nothing talks to the backend except these calls and the
//! stream transports.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::convert::to_portable;
use crate::diagram::Diagram;
use crate::execution::{ExecutionStatus, NodeExecutionStatus};
use crate::ids::{ExecutionId, NodeId};

/// Errors from backend calls.
#[derive(Debug, Error, Diagnostic)]
pub enum ApiError {
    /// Transport or decode failure.
    #[error("backend request failed: {0}")]
    #[diagnostic(code(diaflow::api::http))]
    Http(#[from] reqwest::Error),

    /// Request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    #[diagnostic(code(diaflow::api::encode))]
    Encode(#[from] serde_json::Error),

    /// The backend answered `success: false`.
    #[error("backend rejected the request: {message}")]
    #[diagnostic(code(diaflow::api::rejected))]
    Rejected { message: String },
}

/// The uniform backend response shape.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: Option<T>,
}

impl<T> Envelope<T> {
    /// Map the envelope to a result; the single shared failure handler.
    ///
    /// Failures are logged here (the rewrite's stand-in for the UI toast
    /// layer) and returned as [`ApiError::Rejected`].
    pub fn into_result(self) -> Result<T, ApiError> {
        if self.success {
            self.payload.ok_or_else(|| ApiError::Rejected {
                message: "backend reported success without a payload".to_string(),
            })
        } else {
            let message = self
                .error
                .or(self.message)
                .unwrap_or_else(|| "unspecified backend error".to_string());
            tracing::warn!(%message, "backend rejected request");
            Err(ApiError::Rejected { message })
        }
    }
}

/// Receipt for a saved diagram.
#[derive(Debug, Deserialize)]
pub struct SaveReceipt {
    #[serde(rename = "diagramId")]
    pub diagram_id: String,
}

/// Receipt for a started execution.
#[derive(Debug, Deserialize)]
pub struct ExecutionReceipt {
    #[serde(rename = "executionId")]
    pub execution_id: ExecutionId,
}

/// Authoritative execution state as returned by a status query; used to
/// resynchronize after a reconnect gap.
#[derive(Debug, Deserialize)]
pub struct ExecutionSnapshot {
    pub status: ExecutionStatus,
    #[serde(rename = "nodeStatus", default)]
    pub node_status: FxHashMap<NodeId, NodeExecutionStatus>,
}

/// Thin HTTP client for the explicit synchronization points.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// A client rooted at `base_url` (scheme + host, no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Use a preconfigured HTTP client.
    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let envelope: Envelope<T> = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope.into_result()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let envelope: Envelope<T> = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope.into_result()
    }

    /// Save a diagram; the body is the label-keyed portable form.
    pub async fn save_diagram(&self, diagram: &Diagram) -> Result<SaveReceipt, ApiError> {
        let body = serde_json::to_value(to_portable(diagram))?;
        self.post("/api/diagrams", &body).await
    }

    /// Start an execution of a diagram.
    pub async fn execute_diagram(&self, diagram: &Diagram) -> Result<ExecutionReceipt, ApiError> {
        let body = serde_json::to_value(to_portable(diagram))?;
        self.post("/api/executions", &body).await
    }

    /// Query authoritative execution state (post-reconnect resync).
    pub async fn execution_state(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<ExecutionSnapshot, ApiError> {
        self.get(&format!("/api/executions/{execution_id}")).await
    }
}
