//! Node handles and the per-node-type handle tables.
//!
//! A handle is a named port on a node that arrows attach to. Which handles a
//! node exposes is fixed by its [`NodeType`]; the tables here are the single
//! source of truth for import validation and default-handle generation.

use serde::{Deserialize, Serialize};

use crate::ids::{HandleId, NodeId};
use crate::types::{DataType, HandleDirection, HandleLabel, NodeType};

/// A named input/output port on a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainHandle {
    /// Always `"{node_id}:{label}"`; see [`HandleId::compose`].
    pub id: HandleId,
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    pub label: HandleLabel,
    pub direction: HandleDirection,
    #[serde(rename = "dataType", default = "data_type_any")]
    pub data_type: DataType,
    /// Visual placement hint for the editor ("left"/"right"); carried
    /// through round-trips, never interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

fn data_type_any() -> DataType {
    DataType::Any
}

impl DomainHandle {
    /// Build a handle for `node` with the conventional id and placement.
    #[must_use]
    pub fn for_node(node: &NodeId, label: HandleLabel, direction: HandleDirection) -> Self {
        let position = match direction {
            HandleDirection::Input => "left",
            HandleDirection::Output => "right",
        };
        Self {
            id: HandleId::compose(node, label),
            node_id: node.clone(),
            label,
            direction,
            data_type: DataType::Any,
            position: Some(position.to_string()),
        }
    }
}

/// The full set of handles a node of the given type exposes, as
/// `(label, direction)` pairs.
#[must_use]
pub fn valid_handles(node_type: NodeType) -> &'static [(HandleLabel, HandleDirection)] {
    use HandleDirection::{Input, Output};
    use HandleLabel as L;
    match node_type {
        NodeType::Start => &[(L::Default, Output)],
        NodeType::PersonJob => &[(L::Default, Input), (L::First, Input), (L::Default, Output)],
        NodeType::PersonBatchJob => &[
            (L::Default, Input),
            (L::First, Input),
            (L::Default, Output),
            (L::Results, Output),
        ],
        NodeType::Condition => &[
            (L::Default, Input),
            (L::Condtrue, Output),
            (L::Condfalse, Output),
        ],
        NodeType::CodeJob
        | NodeType::Db
        | NodeType::UserResponse
        | NodeType::Notion
        | NodeType::TemplateJob
        | NodeType::TypescriptAst => &[(L::Default, Input), (L::Default, Output)],
        NodeType::ApiJob | NodeType::Hook => &[
            (L::Default, Input),
            (L::Success, Output),
            (L::Error, Output),
        ],
        NodeType::JsonSchemaValidator => &[
            (L::Default, Input),
            (L::Default, Output),
            (L::Error, Output),
        ],
        NodeType::SubDiagram => &[
            (L::Default, Input),
            (L::Default, Output),
            (L::Results, Output),
        ],
        NodeType::Endpoint => &[(L::Default, Input)],
    }
}

/// Whether `label`/`direction` is a legal handle on a node of `node_type`.
#[must_use]
pub fn is_valid_handle(
    node_type: NodeType,
    label: HandleLabel,
    direction: HandleDirection,
) -> bool {
    valid_handles(node_type)
        .iter()
        .any(|(l, d)| *l == label && *d == direction)
}

/// Generate the default handle set for a node.
#[must_use]
pub fn default_handles(node: &NodeId, node_type: NodeType) -> Vec<DomainHandle> {
    valid_handles(node_type)
        .iter()
        .map(|(label, direction)| DomainHandle::for_node(node, *label, *direction))
        .collect()
}
