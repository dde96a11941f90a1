//! The diagram data model.
//!
//! A [`Diagram`] is a directed graph of typed nodes connected by arrows
//! between named handles, plus the persons (agent identities) and api key
//! references the nodes lean on. Entities live in insertion-ordered vectors
//! so serialization and label allocation are deterministic.
//!
//! Structural invariants are checked by [`Diagram::validate`]:
//!
//! - entity ids are unique per kind
//! - every handle belongs to an existing node, has the composed
//!   `node:label` id, and is legal for that node's type
//! - every arrow runs from an output handle to an input handle that both
//!   exist (or are materializable as defaults) on existing nodes
//! - person references from nodes and api-key references from persons
//!   resolve
//!
//! Lifecycle: diagrams are assembled in memory (usually through
//! [`crate::store::DiagramStore`]), optionally persisted as snapshots, and
//! synchronized to a backend only on explicit save/execute actions.

pub mod arrow;
pub mod handle;
pub mod node;
pub mod person;

pub use arrow::DomainArrow;
pub use handle::{default_handles, is_valid_handle, valid_handles, DomainHandle};
pub use node::{DomainNode, NodeData, Vec2};
pub use person::{DomainApiKey, DomainPerson, LlmConfig};

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ApiKeyId, ArrowId, HandleId, NodeId, PersonId};
use crate::types::{HandleDirection, HandleLabel, NodeType};

/// Schema version written into new documents.
pub const SCHEMA_VERSION: &str = "2.0.0";

/// Errors raised by diagram construction and validation.
#[derive(Debug, Error, Diagnostic)]
pub enum DiagramError {
    /// A node payload did not decode into the variant its type tag demands.
    #[error("invalid data payload for {node_type} node: {source}")]
    #[diagnostic(
        code(diaflow::diagram::invalid_node_data),
        help("The data object must carry the fields of the declared node type.")
    )]
    InvalidNodeData {
        node_type: NodeType,
        #[source]
        source: serde_json::Error,
    },

    /// Two entities of the same kind share an id.
    #[error("duplicate {kind} id: {id}")]
    #[diagnostic(code(diaflow::diagram::duplicate_id))]
    DuplicateId { kind: &'static str, id: String },

    /// A handle names a node that is not in the diagram.
    #[error("handle {handle} references unknown node {node}")]
    #[diagnostic(code(diaflow::diagram::dangling_handle))]
    DanglingHandle { handle: HandleId, node: NodeId },

    /// A handle's id is not `"{node_id}:{label}"`.
    #[error("handle {handle} id does not match node {node} and label {label}")]
    #[diagnostic(code(diaflow::diagram::handle_id_mismatch))]
    HandleIdMismatch {
        handle: HandleId,
        node: NodeId,
        label: HandleLabel,
    },

    /// A handle is not legal for its node's type.
    #[error("{node_type} node {node} cannot expose {direction} handle {label}")]
    #[diagnostic(
        code(diaflow::diagram::invalid_handle),
        help("See the per-node-type handle tables in diagram::handle.")
    )]
    InvalidHandle {
        node: NodeId,
        node_type: NodeType,
        label: HandleLabel,
        direction: HandleDirection,
    },

    /// An arrow endpoint references a node that is not in the diagram.
    #[error("arrow {arrow} {side} references unknown node {node}")]
    #[diagnostic(code(diaflow::diagram::arrow_unknown_node))]
    ArrowUnknownNode {
        arrow: ArrowId,
        side: &'static str,
        node: NodeId,
    },

    /// An arrow endpoint uses a handle invalid for the node's type.
    #[error(
        "arrow {arrow} {side} uses handle {label} which is not a valid \
         {direction} handle on {node_type} node {node}"
    )]
    #[diagnostic(
        code(diaflow::diagram::arrow_invalid_handle),
        help("Source endpoints must be output handles, targets input handles.")
    )]
    ArrowInvalidHandle {
        arrow: ArrowId,
        side: &'static str,
        node: NodeId,
        node_type: NodeType,
        label: HandleLabel,
        direction: HandleDirection,
    },

    /// A node references a person that is not in the diagram.
    #[error("node {node} references unknown person {person}")]
    #[diagnostic(code(diaflow::diagram::unknown_person))]
    UnknownPerson { node: NodeId, person: PersonId },

    /// A person references an api key that is not in the diagram.
    #[error("person {person} references unknown api key {api_key}")]
    #[diagnostic(code(diaflow::diagram::unknown_api_key))]
    UnknownApiKey { person: PersonId, api_key: ApiKeyId },
}

/// Document metadata carried alongside the graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagramMetadata {
    /// Format schema version, not the diagram's own revision.
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Default for DiagramMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: SCHEMA_VERSION.to_string(),
            name: None,
            description: None,
            author: None,
            created: now,
            modified: now,
        }
    }
}

impl DiagramMetadata {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }
}

/// A complete diagram: graph, agents, credentials references, metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    #[serde(default)]
    pub nodes: Vec<DomainNode>,
    #[serde(default)]
    pub handles: Vec<DomainHandle>,
    #[serde(default)]
    pub arrows: Vec<DomainArrow>,
    #[serde(default)]
    pub persons: Vec<DomainPerson>,
    #[serde(rename = "apiKeys", default)]
    pub api_keys: Vec<DomainApiKey>,
    #[serde(default)]
    pub metadata: DiagramMetadata,
}

impl Diagram {
    /// An empty diagram with fresh metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &NodeId) -> Option<&DomainNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut DomainNode> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    pub fn arrow(&self, id: &ArrowId) -> Option<&DomainArrow> {
        self.arrows.iter().find(|a| &a.id == id)
    }

    pub fn handle(&self, id: &HandleId) -> Option<&DomainHandle> {
        self.handles.iter().find(|h| &h.id == id)
    }

    pub fn person(&self, id: &PersonId) -> Option<&DomainPerson> {
        self.persons.iter().find(|p| &p.id == id)
    }

    pub fn api_key(&self, id: &ApiKeyId) -> Option<&DomainApiKey> {
        self.api_keys.iter().find(|k| &k.id == id)
    }

    /// Generate any handles a node's type defines but the diagram does not
    /// yet carry. Imported documents usually omit handle arrays entirely.
    pub fn ensure_default_handles(&mut self) {
        let mut missing = Vec::new();
        for node in &self.nodes {
            for handle in default_handles(&node.id, node.node_type()) {
                if self.handle(&handle.id).is_none() {
                    missing.push(handle);
                }
            }
        }
        self.handles.extend(missing);
    }

    /// Check every structural invariant; the first violation aborts.
    pub fn validate(&self) -> Result<(), DiagramError> {
        self.check_unique_ids()?;

        for handle in &self.handles {
            let node = self.node(&handle.node_id).ok_or_else(|| {
                DiagramError::DanglingHandle {
                    handle: handle.id.clone(),
                    node: handle.node_id.clone(),
                }
            })?;
            if HandleId::compose(&handle.node_id, handle.label) != handle.id {
                return Err(DiagramError::HandleIdMismatch {
                    handle: handle.id.clone(),
                    node: handle.node_id.clone(),
                    label: handle.label,
                });
            }
            if !is_valid_handle(node.node_type(), handle.label, handle.direction) {
                return Err(DiagramError::InvalidHandle {
                    node: node.id.clone(),
                    node_type: node.node_type(),
                    label: handle.label,
                    direction: handle.direction,
                });
            }
        }

        for arrow in &self.arrows {
            self.check_endpoint(arrow, "source", HandleDirection::Output)?;
            self.check_endpoint(arrow, "target", HandleDirection::Input)?;
        }

        for node in &self.nodes {
            if let Some(person) = node.data.person() {
                if self.person(person).is_none() {
                    return Err(DiagramError::UnknownPerson {
                        node: node.id.clone(),
                        person: person.clone(),
                    });
                }
            }
        }

        for person in &self.persons {
            if self.api_key(&person.llm_config.api_key_id).is_none() {
                return Err(DiagramError::UnknownApiKey {
                    person: person.id.clone(),
                    api_key: person.llm_config.api_key_id.clone(),
                });
            }
        }

        Ok(())
    }

    fn check_endpoint(
        &self,
        arrow: &DomainArrow,
        side: &'static str,
        direction: HandleDirection,
    ) -> Result<(), DiagramError> {
        let endpoint = match side {
            "source" => &arrow.source,
            _ => &arrow.target,
        };
        let node = self
            .node(&endpoint.node)
            .ok_or_else(|| DiagramError::ArrowUnknownNode {
                arrow: arrow.id.clone(),
                side,
                node: endpoint.node.clone(),
            })?;
        if !is_valid_handle(node.node_type(), endpoint.label, direction) {
            return Err(DiagramError::ArrowInvalidHandle {
                arrow: arrow.id.clone(),
                side,
                node: node.id.clone(),
                node_type: node.node_type(),
                label: endpoint.label,
                direction,
            });
        }
        Ok(())
    }

    fn check_unique_ids(&self) -> Result<(), DiagramError> {
        fn unique<'a, I: Iterator<Item = &'a str>>(
            kind: &'static str,
            ids: I,
        ) -> Result<(), DiagramError> {
            let mut seen = rustc_hash::FxHashSet::default();
            for id in ids {
                if !seen.insert(id) {
                    return Err(DiagramError::DuplicateId {
                        kind,
                        id: id.to_string(),
                    });
                }
            }
            Ok(())
        }
        unique("node", self.nodes.iter().map(|n| n.id.as_str()))?;
        unique("arrow", self.arrows.iter().map(|a| a.id.as_str()))?;
        unique("handle", self.handles.iter().map(|h| h.id.as_str()))?;
        unique("person", self.persons.iter().map(|p| p.id.as_str()))?;
        unique("api key", self.api_keys.iter().map(|k| k.id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::node::{ConditionData, PersonJobData, StartData};
    use super::*;
    use crate::ids::HandleRef;

    fn start_node(id: &str) -> DomainNode {
        DomainNode {
            id: NodeId::new(id),
            label: Some("Start".into()),
            position: Vec2::default(),
            data: NodeData::Start(StartData::default()),
        }
    }

    fn condition_node(id: &str) -> DomainNode {
        DomainNode {
            id: NodeId::new(id),
            label: Some("Branch".into()),
            position: Vec2::default(),
            data: NodeData::Condition(ConditionData {
                expression: "x > 0".into(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn valid_diagram_passes() {
        let mut diagram = Diagram::new();
        diagram.nodes.push(start_node("s"));
        diagram.nodes.push(condition_node("c"));
        diagram.ensure_default_handles();
        diagram.arrows.push(DomainArrow::new(
            HandleRef::parse("s:default").unwrap(),
            HandleRef::parse("c:default").unwrap(),
        ));
        diagram.validate().unwrap();
    }

    #[test]
    fn arrow_to_unknown_node_is_rejected() {
        let mut diagram = Diagram::new();
        diagram.nodes.push(start_node("s"));
        diagram.ensure_default_handles();
        diagram.arrows.push(DomainArrow::new(
            HandleRef::parse("s:default").unwrap(),
            HandleRef::parse("ghost:default").unwrap(),
        ));
        let err = diagram.validate().unwrap_err();
        assert!(matches!(err, DiagramError::ArrowUnknownNode { .. }));
    }

    #[test]
    fn arrow_into_invalid_handle_is_rejected() {
        let mut diagram = Diagram::new();
        diagram.nodes.push(start_node("s"));
        diagram.nodes.push(condition_node("c"));
        diagram.ensure_default_handles();
        // condtrue is an output of the condition node, not an input.
        diagram.arrows.push(DomainArrow::new(
            HandleRef::parse("s:default").unwrap(),
            HandleRef::parse("c:condtrue").unwrap(),
        ));
        let err = diagram.validate().unwrap_err();
        assert!(matches!(
            err,
            DiagramError::ArrowInvalidHandle { side: "target", .. }
        ));
    }

    #[test]
    fn person_job_requires_existing_person() {
        let mut diagram = Diagram::new();
        diagram.nodes.push(DomainNode {
            id: NodeId::new("pj"),
            label: None,
            position: Vec2::default(),
            data: NodeData::PersonJob(PersonJobData {
                person: Some(PersonId::new("missing")),
                ..Default::default()
            }),
        });
        diagram.ensure_default_handles();
        let err = diagram.validate().unwrap_err();
        assert!(matches!(err, DiagramError::UnknownPerson { .. }));
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let mut diagram = Diagram::new();
        diagram.nodes.push(start_node("dup"));
        diagram.nodes.push(start_node("dup"));
        let err = diagram.validate().unwrap_err();
        assert!(matches!(err, DiagramError::DuplicateId { kind: "node", .. }));
    }
}
