//! The label-keyed intermediate document all format strategies share.
//!
//! A [`PortableDiagram`] is the portable face of a [`crate::diagram::Diagram`]:
//! entities are keyed by unique human labels, arrow endpoints are
//! `"Label:handle"` strings (the `:handle` part optional when it is
//! `default`), and generated ids do not appear at all. Strategies only parse
//! and render this shape; the id/label round-trip itself lives in
//! [`super::export`] and [`super::import`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diagram::Vec2;
use crate::types::{
    ApiService, ContentType, DataType, ForgettingMode, HandleDirection, HandleLabel, LlmService,
    NodeType,
};

/// One node in portable form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortableNode {
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec2>,
    /// Type-specific payload, still raw at this stage; validated into
    /// [`crate::diagram::NodeData`] during import.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
}

/// One arrow in portable form; endpoints are label references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortableArrow {
    pub source: String,
    pub target: String,
    #[serde(
        rename = "contentType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

/// One explicitly persisted handle (native format only; the portable YAML
/// forms rely on default-handle generation).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortableHandle {
    pub node: String,
    pub label: HandleLabel,
    pub direction: HandleDirection,
    #[serde(rename = "dataType", default = "data_type_any")]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

fn data_type_any() -> DataType {
    DataType::Any
}

/// One person in portable form; the api key is referenced by label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortablePerson {
    pub label: String,
    pub service: LlmService,
    pub model: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(
        rename = "systemPrompt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub system_prompt: Option<String>,
    #[serde(
        rename = "forgettingMode",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub forgetting_mode: Option<ForgettingMode>,
}

/// One api key reference in portable form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortableApiKey {
    pub label: String,
    pub service: ApiService,
}

/// A complete label-keyed document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortableDiagram {
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<PortableNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arrows: Vec<PortableArrow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handles: Vec<PortableHandle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub persons: Vec<PortablePerson>,
    #[serde(rename = "apiKeys", default, skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<PortableApiKey>,
}

/// Split a portable endpoint reference into its node label and handle.
///
/// The `:handle` suffix is recognized only when it parses as a known
/// [`HandleLabel`]; anything else is part of the node label. A reference
/// without a recognizable suffix addresses the `default` handle.
#[must_use]
pub fn split_endpoint(reference: &str) -> (&str, HandleLabel) {
    if let Some((node, suffix)) = reference.rsplit_once(':') {
        if let Ok(label) = suffix.parse::<HandleLabel>() {
            if !node.is_empty() {
                return (node, label);
            }
        }
    }
    (reference, HandleLabel::Default)
}

/// Render an endpoint reference, omitting the `default` handle suffix.
#[must_use]
pub fn join_endpoint(label: &str, handle: HandleLabel) -> String {
    if handle == HandleLabel::Default {
        label.to_string()
    } else {
        format!("{label}:{handle}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_split_recognizes_handle_suffixes() {
        assert_eq!(split_endpoint("Ask"), ("Ask", HandleLabel::Default));
        assert_eq!(
            split_endpoint("Branch:condtrue"),
            ("Branch", HandleLabel::Condtrue)
        );
        // Unknown suffixes stay part of the label.
        assert_eq!(
            split_endpoint("notes:misc"),
            ("notes:misc", HandleLabel::Default)
        );
    }

    #[test]
    fn endpoint_join_elides_default() {
        assert_eq!(join_endpoint("Ask", HandleLabel::Default), "Ask");
        assert_eq!(
            join_endpoint("Branch", HandleLabel::Condfalse),
            "Branch:condfalse"
        );
    }
}
