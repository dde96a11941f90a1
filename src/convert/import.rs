//! Portable document → diagram: the label-to-id half of the round-trip.

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::portable::{split_endpoint, PortableDiagram};
use super::ConvertError;
use crate::diagram::{
    handle::is_valid_handle, Diagram, DiagramMetadata, DomainApiKey, DomainArrow, DomainHandle,
    DomainNode, DomainPerson, LlmConfig, NodeData, Vec2, SCHEMA_VERSION,
};
use crate::ids::{ApiKeyId, ArrowId, HandleId, HandleRef, NodeId, PersonId};
use crate::types::{ForgettingMode, HandleDirection, NodeType};

/// Rebuild an in-memory diagram from a portable document.
///
/// Fresh ids are generated for every entity; arrow endpoints are resolved
/// through label→id maps built during the same pass. Fails when an arrow
/// references an unknown label or a handle invalid for the referenced
/// node's type, with an error naming the arrow index.
pub fn from_portable(doc: &PortableDiagram) -> Result<Diagram, ConvertError> {
    let mut diagram = Diagram::new();
    diagram.metadata = DiagramMetadata {
        version: if doc.version.is_empty() {
            SCHEMA_VERSION.to_string()
        } else {
            doc.version.clone()
        },
        name: doc.name.clone(),
        description: doc.description.clone(),
        ..Default::default()
    };

    let mut key_ids: FxHashMap<&str, ApiKeyId> = FxHashMap::default();
    for key in &doc.api_keys {
        if key_ids.contains_key(key.label.as_str()) {
            return Err(ConvertError::DuplicateLabel {
                kind: "api key",
                label: key.label.clone(),
            });
        }
        let id = ApiKeyId::generate();
        key_ids.insert(key.label.as_str(), id.clone());
        diagram.api_keys.push(DomainApiKey {
            id,
            label: key.label.clone(),
            service: key.service,
        });
    }

    let mut person_ids: FxHashMap<&str, PersonId> = FxHashMap::default();
    for person in &doc.persons {
        if person_ids.contains_key(person.label.as_str()) {
            return Err(ConvertError::DuplicateLabel {
                kind: "person",
                label: person.label.clone(),
            });
        }
        let api_key_id = key_ids.get(person.api_key.as_str()).cloned().ok_or_else(|| {
            ConvertError::UnknownApiKeyLabel {
                person: person.label.clone(),
                api_key: person.api_key.clone(),
            }
        })?;
        let id = PersonId::generate();
        person_ids.insert(person.label.as_str(), id.clone());
        diagram.persons.push(DomainPerson {
            id,
            label: person.label.clone(),
            llm_config: LlmConfig {
                service: person.service,
                model: person.model.clone(),
                api_key_id,
                system_prompt: person.system_prompt.clone(),
                forgetting_mode: person.forgetting_mode.unwrap_or(ForgettingMode::NoForget),
            },
        });
    }

    let mut node_ids: FxHashMap<&str, (NodeId, NodeType)> = FxHashMap::default();
    for (index, pnode) in doc.nodes.iter().enumerate() {
        if node_ids.contains_key(pnode.label.as_str()) {
            return Err(ConvertError::DuplicateLabel {
                kind: "node",
                label: pnode.label.clone(),
            });
        }
        let id = NodeId::generate();
        node_ids.insert(pnode.label.as_str(), (id.clone(), pnode.node_type));

        let mut props = pnode.props.clone();
        // Person references arrive by label; resolve before payload decode.
        if pnode.node_type.uses_person() {
            let person_ref = match props.get("person") {
                Some(Value::String(label)) => Some(label.clone()),
                _ => None,
            };
            if let Some(person_label) = person_ref {
                let person_id = person_ids.get(person_label.as_str()).ok_or_else(|| {
                    ConvertError::UnknownPersonLabel {
                        node: pnode.label.clone(),
                        person: person_label.clone(),
                    }
                })?;
                props.insert(
                    "person".to_string(),
                    Value::String(person_id.to_string()),
                );
            }
        }

        diagram.nodes.push(DomainNode {
            id,
            label: Some(pnode.label.clone()),
            position: pnode.position.unwrap_or_else(|| Vec2::grid(index)),
            data: NodeData::from_object(pnode.node_type, props)?,
        });
    }

    for (index, parrow) in doc.arrows.iter().enumerate() {
        let source = resolve_endpoint(&node_ids, index, "source", &parrow.source)?;
        let target = resolve_endpoint(&node_ids, index, "target", &parrow.target)?;
        diagram.arrows.push(DomainArrow {
            id: ArrowId::generate(),
            source,
            target,
            content_type: parrow.content_type,
            label: parrow.label.clone(),
            data: parrow.data.clone(),
        });
    }

    for phandle in &doc.handles {
        let (node_id, _) = node_ids.get(phandle.node.as_str()).ok_or_else(|| {
            ConvertError::HandleUnknownNode {
                node: phandle.node.clone(),
            }
        })?;
        let id = HandleId::compose(node_id, phandle.label);
        if diagram.handle(&id).is_none() {
            diagram.handles.push(DomainHandle {
                id,
                node_id: node_id.clone(),
                label: phandle.label,
                direction: phandle.direction,
                data_type: phandle.data_type,
                position: phandle.position.clone(),
            });
        }
    }

    diagram.ensure_default_handles();
    diagram.validate()?;
    Ok(diagram)
}

fn resolve_endpoint(
    node_ids: &FxHashMap<&str, (NodeId, NodeType)>,
    index: usize,
    side: &'static str,
    reference: &str,
) -> Result<HandleRef, ConvertError> {
    let (label, handle) = split_endpoint(reference);
    let (node_id, node_type) =
        node_ids
            .get(label)
            .ok_or_else(|| ConvertError::ArrowUnknownNode {
                index,
                side,
                reference: reference.to_string(),
            })?;
    let direction = match side {
        "source" => HandleDirection::Output,
        _ => HandleDirection::Input,
    };
    if !is_valid_handle(*node_type, handle, direction) {
        return Err(ConvertError::ArrowInvalidHandle {
            index,
            side,
            node: label.to_string(),
            node_type: *node_type,
            handle,
        });
    }
    Ok(HandleRef::new(node_id.clone(), handle))
}
