//! Diagram → portable document: the id-to-label half of the round-trip.

use serde_json::Value;
use rustc_hash::FxHashMap;

use super::labels::LabelAllocator;
use super::portable::{
    join_endpoint, PortableApiKey, PortableArrow, PortableDiagram, PortableHandle, PortableNode,
    PortablePerson,
};
use crate::diagram::{Diagram, SCHEMA_VERSION};
use crate::ids::PersonId;
use crate::types::ForgettingMode;

/// Produce the label-keyed portable form of `diagram`.
///
/// Labels are allocated per namespace (nodes, persons, api keys) in
/// insertion order, so the output is deterministic for a given diagram.
/// Exporting is a one-way snapshot: running it over a diagram whose labels
/// already carry disambiguation suffixes may suffix them again.
#[must_use]
pub fn to_portable(diagram: &Diagram) -> PortableDiagram {
    let mut node_labels = LabelAllocator::new();
    let mut person_labels = LabelAllocator::new();
    let mut key_labels = LabelAllocator::new();

    let mut node_label_of = FxHashMap::default();
    let mut person_label_of = FxHashMap::default();
    let mut key_label_of = FxHashMap::default();

    let api_keys: Vec<PortableApiKey> = diagram
        .api_keys
        .iter()
        .map(|key| {
            let label = key_labels.allocate(&key.label);
            key_label_of.insert(key.id.clone(), label.clone());
            PortableApiKey {
                label,
                service: key.service,
            }
        })
        .collect();

    let persons: Vec<PortablePerson> = diagram
        .persons
        .iter()
        .map(|person| {
            let label = person_labels.allocate(&person.label);
            person_label_of.insert(person.id.clone(), label.clone());
            let config = &person.llm_config;
            PortablePerson {
                label,
                service: config.service,
                model: config.model.clone(),
                api_key: key_label_of
                    .get(&config.api_key_id)
                    .cloned()
                    .unwrap_or_else(|| config.api_key_id.to_string()),
                system_prompt: config.system_prompt.clone(),
                forgetting_mode: match config.forgetting_mode {
                    ForgettingMode::NoForget => None,
                    other => Some(other),
                },
            }
        })
        .collect();

    let nodes: Vec<PortableNode> = diagram
        .nodes
        .iter()
        .map(|node| {
            let label = node_labels.allocate(node.effective_label());
            node_label_of.insert(node.id.clone(), label.clone());
            let mut props = node.data.to_object();
            // Person references travel by label in portable documents.
            let person_ref = match props.get("person") {
                Some(Value::String(id)) => Some(PersonId::new(id.clone())),
                _ => None,
            };
            if let Some(person_id) = person_ref {
                if let Some(person_label) = person_label_of.get(&person_id) {
                    props.insert("person".to_string(), Value::String(person_label.clone()));
                }
            }
            PortableNode {
                label,
                node_type: node.node_type(),
                position: Some(node.position),
                props,
            }
        })
        .collect();

    let arrows: Vec<PortableArrow> = diagram
        .arrows
        .iter()
        .map(|arrow| {
            let source_label = node_label_of
                .get(&arrow.source.node)
                .cloned()
                .unwrap_or_else(|| arrow.source.node.to_string());
            let target_label = node_label_of
                .get(&arrow.target.node)
                .cloned()
                .unwrap_or_else(|| arrow.target.node.to_string());
            PortableArrow {
                source: join_endpoint(&source_label, arrow.source.label),
                target: join_endpoint(&target_label, arrow.target.label),
                content_type: arrow.content_type,
                label: arrow.label.clone(),
                data: arrow.data.clone(),
            }
        })
        .collect();

    let handles: Vec<PortableHandle> = diagram
        .handles
        .iter()
        .filter_map(|handle| {
            let node = node_label_of.get(&handle.node_id)?.clone();
            Some(PortableHandle {
                node,
                label: handle.label,
                direction: handle.direction,
                data_type: handle.data_type,
                position: handle.position.clone(),
            })
        })
        .collect();

    PortableDiagram {
        version: if diagram.metadata.version.is_empty() {
            SCHEMA_VERSION.to_string()
        } else {
            diagram.metadata.version.clone()
        },
        name: diagram.metadata.name.clone(),
        description: diagram.metadata.description.clone(),
        nodes,
        arrows,
        handles,
        persons,
        api_keys,
    }
}
