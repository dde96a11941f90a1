//! Directed connections between node handles.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{ArrowId, HandleRef};
use crate::types::ContentType;

/// A directed arrow from one node handle to another, optionally tagged with
/// the semantic payload type flowing along it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainArrow {
    pub id: ArrowId,
    /// Source endpoint; must be an output handle of its node.
    pub source: HandleRef,
    /// Target endpoint; must be an input handle of its node.
    pub target: HandleRef,
    #[serde(
        rename = "contentType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Free companion data (editor styling, packing hints); carried through
    /// round-trips untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl DomainArrow {
    /// Build an arrow with a generated id.
    #[must_use]
    pub fn new(source: HandleRef, target: HandleRef) -> Self {
        Self {
            id: ArrowId::generate(),
            source,
            target,
            content_type: None,
            label: None,
            data: Map::new(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The `(source node, target node)` pair, ignoring handle names.
    /// Round-trip tests compare connectivity with this.
    #[must_use]
    pub fn node_pair(&self) -> (&str, &str) {
        (self.source.node.as_str(), self.target.node.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use crate::types::HandleLabel;

    #[test]
    fn arrow_serializes_endpoints_as_refs() {
        let arrow = DomainArrow::new(
            HandleRef::new(NodeId::new("a"), HandleLabel::Default),
            HandleRef::new(NodeId::new("b"), HandleLabel::First),
        )
        .with_content_type(ContentType::RawText);
        let value = serde_json::to_value(&arrow).unwrap();
        assert_eq!(value["source"], "a:default");
        assert_eq!(value["target"], "b:first");
        assert_eq!(value["contentType"], "raw_text");

        let back: DomainArrow = serde_json::from_value(value).unwrap();
        assert_eq!(back, arrow);
        assert_eq!(back.node_pair(), ("a", "b"));
    }
}
