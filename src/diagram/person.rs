//! Persons (LLM agent identities) and api key references.

use serde::{Deserialize, Serialize};

use crate::ids::{ApiKeyId, PersonId};
use crate::types::{ApiService, ForgettingMode, LlmService};

/// LLM binding of a person: which service/model it runs on and how its
/// conversation memory behaves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub service: LlmService,
    pub model: String,
    /// Opaque reference into the api key registry; never the raw secret.
    #[serde(rename = "apiKeyId")]
    pub api_key_id: ApiKeyId,
    #[serde(
        rename = "systemPrompt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub system_prompt: Option<String>,
    #[serde(rename = "forgettingMode", default = "forgetting_mode_default")]
    pub forgetting_mode: ForgettingMode,
}

fn forgetting_mode_default() -> ForgettingMode {
    ForgettingMode::NoForget
}

/// A named agent identity a person_job node runs as.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainPerson {
    pub id: PersonId,
    pub label: String,
    #[serde(rename = "llmConfig")]
    pub llm_config: LlmConfig,
}

impl DomainPerson {
    /// Build a person with a generated id.
    #[must_use]
    pub fn new(label: impl Into<String>, llm_config: LlmConfig) -> Self {
        Self {
            id: PersonId::generate(),
            label: label.into(),
            llm_config,
        }
    }
}

/// A stored api key reference: label plus the service it belongs to. The
/// secret itself lives server-side only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainApiKey {
    pub id: ApiKeyId,
    pub label: String,
    pub service: ApiService,
}

impl DomainApiKey {
    /// Build an api key reference with a generated id.
    #[must_use]
    pub fn new(label: impl Into<String>, service: ApiService) -> Self {
        Self {
            id: ApiKeyId::generate(),
            label: label.into(),
            service,
        }
    }
}
