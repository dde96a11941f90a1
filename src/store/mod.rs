//! The single diagram state container.
//!
//! All mutation funnels through [`DiagramStore::apply`] with a typed
//! [`DiagramCommand`]; there are no ad hoc setters. A command either commits
//! atomically (validated against the structural invariants first) or
//! returns an error leaving the store untouched. Every committed command
//! advances a revision counter, which snapshot persistence and UI layers
//! use for cheap dirty checks.

pub mod persistence;

pub use persistence::{PersistError, SnapshotStore};

use miette::Diagnostic;
use thiserror::Error;

use crate::diagram::{
    default_handles, Diagram, DiagramError, DomainApiKey, DomainArrow, DomainNode, DomainPerson,
    LlmConfig, NodeData, Vec2,
};
use crate::ids::{ApiKeyId, ArrowId, NodeId, PersonId};

/// Errors from command application.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// The command targets an entity that is not in the diagram.
    #[error("{kind} not found: {id}")]
    #[diagnostic(code(diaflow::store::not_found))]
    NotFound { kind: &'static str, id: String },

    /// An entity with this id already exists.
    #[error("{kind} already exists: {id}")]
    #[diagnostic(code(diaflow::store::already_exists))]
    AlreadyExists { kind: &'static str, id: String },

    /// The api key is still referenced by a person; removal is refused
    /// instead of silently breaking agent configurations.
    #[error("api key {api_key} is still used by person {person}")]
    #[diagnostic(
        code(diaflow::store::api_key_in_use),
        help("Repoint or remove the referencing person first.")
    )]
    ApiKeyInUse { api_key: ApiKeyId, person: PersonId },

    /// The command would leave the diagram structurally invalid.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Invalid(#[from] DiagramError),
}

/// Tagged mutation commands; the only way to change a store.
#[derive(Clone, Debug)]
pub enum DiagramCommand {
    /// Add a node and its default handles.
    AddNode(DomainNode),
    /// Replace a node's typed payload.
    UpdateNodeData { id: NodeId, data: NodeData },
    /// Rename a node (None clears the label; export falls back to the id).
    RenameNode { id: NodeId, label: Option<String> },
    MoveNode { id: NodeId, position: Vec2 },
    /// Remove a node, cascading its handles and attached arrows.
    RemoveNode { id: NodeId },
    AddArrow(DomainArrow),
    RemoveArrow { id: ArrowId },
    AddPerson(DomainPerson),
    UpdatePerson { id: PersonId, llm_config: LlmConfig },
    /// Remove a person, detaching any person_job nodes that reference it.
    RemovePerson { id: PersonId },
    AddApiKey(DomainApiKey),
    /// Refused while any person still references the key.
    RemoveApiKey { id: ApiKeyId },
    SetMetadata {
        name: Option<String>,
        description: Option<String>,
    },
    /// Swap in a whole diagram (import flow).
    ReplaceDiagram(Diagram),
    Clear,
}

/// The one state container for the diagram under edit.
#[derive(Debug, Default)]
pub struct DiagramStore {
    diagram: Diagram,
    revision: u64,
}

impl DiagramStore {
    /// An empty store at revision zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt an existing diagram (e.g. a loaded snapshot), validating it.
    pub fn from_diagram(diagram: Diagram) -> Result<Self, StoreError> {
        diagram.validate()?;
        Ok(Self {
            diagram,
            revision: 0,
        })
    }

    /// Read-only view of the current diagram.
    #[must_use]
    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    /// Monotonic counter; advances once per committed command.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply one command atomically.
    ///
    /// The command is staged against a scratch copy and validated; only a
    /// fully valid result is committed. On error the store is unchanged.
    pub fn apply(&mut self, command: DiagramCommand) -> Result<(), StoreError> {
        let mut staged = self.diagram.clone();
        Self::apply_to(&mut staged, command)?;
        staged.validate()?;
        staged.metadata.touch();
        self.diagram = staged;
        self.revision += 1;
        Ok(())
    }

    fn apply_to(diagram: &mut Diagram, command: DiagramCommand) -> Result<(), StoreError> {
        match command {
            DiagramCommand::AddNode(node) => {
                if diagram.node(&node.id).is_some() {
                    return Err(StoreError::AlreadyExists {
                        kind: "node",
                        id: node.id.to_string(),
                    });
                }
                let handles = default_handles(&node.id, node.node_type());
                diagram.nodes.push(node);
                diagram.handles.extend(handles);
            }
            DiagramCommand::UpdateNodeData { id, data } => {
                let new_type = data.node_type();
                let node = diagram.node_mut(&id).ok_or_else(|| StoreError::NotFound {
                    kind: "node",
                    id: id.to_string(),
                })?;
                let type_changed = node.node_type() != new_type;
                node.data = data;
                if type_changed {
                    // A type change redefines the handle set.
                    diagram.handles.retain(|h| h.node_id != id);
                    diagram.handles.extend(default_handles(&id, new_type));
                }
            }
            DiagramCommand::RenameNode { id, label } => {
                let node = diagram.node_mut(&id).ok_or_else(|| StoreError::NotFound {
                    kind: "node",
                    id: id.to_string(),
                })?;
                node.label = label;
            }
            DiagramCommand::MoveNode { id, position } => {
                let node = diagram.node_mut(&id).ok_or_else(|| StoreError::NotFound {
                    kind: "node",
                    id: id.to_string(),
                })?;
                node.position = position;
            }
            DiagramCommand::RemoveNode { id } => {
                if diagram.node(&id).is_none() {
                    return Err(StoreError::NotFound {
                        kind: "node",
                        id: id.to_string(),
                    });
                }
                diagram.nodes.retain(|n| n.id != id);
                diagram.handles.retain(|h| h.node_id != id);
                diagram
                    .arrows
                    .retain(|a| a.source.node != id && a.target.node != id);
            }
            DiagramCommand::AddArrow(arrow) => {
                if diagram.arrow(&arrow.id).is_some() {
                    return Err(StoreError::AlreadyExists {
                        kind: "arrow",
                        id: arrow.id.to_string(),
                    });
                }
                diagram.arrows.push(arrow);
            }
            DiagramCommand::RemoveArrow { id } => {
                if diagram.arrow(&id).is_none() {
                    return Err(StoreError::NotFound {
                        kind: "arrow",
                        id: id.to_string(),
                    });
                }
                diagram.arrows.retain(|a| a.id != id);
            }
            DiagramCommand::AddPerson(person) => {
                if diagram.person(&person.id).is_some() {
                    return Err(StoreError::AlreadyExists {
                        kind: "person",
                        id: person.id.to_string(),
                    });
                }
                diagram.persons.push(person);
            }
            DiagramCommand::UpdatePerson { id, llm_config } => {
                let person = diagram
                    .persons
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or_else(|| StoreError::NotFound {
                        kind: "person",
                        id: id.to_string(),
                    })?;
                person.llm_config = llm_config;
            }
            DiagramCommand::RemovePerson { id } => {
                if diagram.person(&id).is_none() {
                    return Err(StoreError::NotFound {
                        kind: "person",
                        id: id.to_string(),
                    });
                }
                diagram.persons.retain(|p| p.id != id);
                for node in &mut diagram.nodes {
                    match &mut node.data {
                        NodeData::PersonJob(data) if data.person.as_ref() == Some(&id) => {
                            data.person = None;
                        }
                        NodeData::PersonBatchJob(data) if data.person.as_ref() == Some(&id) => {
                            data.person = None;
                        }
                        _ => {}
                    }
                }
            }
            DiagramCommand::AddApiKey(api_key) => {
                if diagram.api_key(&api_key.id).is_some() {
                    return Err(StoreError::AlreadyExists {
                        kind: "api key",
                        id: api_key.id.to_string(),
                    });
                }
                diagram.api_keys.push(api_key);
            }
            DiagramCommand::RemoveApiKey { id } => {
                if diagram.api_key(&id).is_none() {
                    return Err(StoreError::NotFound {
                        kind: "api key",
                        id: id.to_string(),
                    });
                }
                if let Some(person) = diagram
                    .persons
                    .iter()
                    .find(|p| p.llm_config.api_key_id == id)
                {
                    return Err(StoreError::ApiKeyInUse {
                        api_key: id,
                        person: person.id.clone(),
                    });
                }
                diagram.api_keys.retain(|k| k.id != id);
            }
            DiagramCommand::SetMetadata { name, description } => {
                diagram.metadata.name = name;
                diagram.metadata.description = description;
            }
            DiagramCommand::ReplaceDiagram(replacement) => {
                *diagram = replacement;
            }
            DiagramCommand::Clear => {
                *diagram = Diagram::new();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::node::{PersonJobData, StartData};
    use crate::ids::HandleRef;
    use crate::types::{ApiService, HandleLabel, LlmService};

    fn start_node() -> DomainNode {
        DomainNode::new("Start", Vec2::default(), NodeData::Start(StartData::default()))
    }

    fn person_with_key(store: &mut DiagramStore) -> (ApiKeyId, PersonId) {
        let key = DomainApiKey::new("Main", ApiService::Openai);
        let key_id = key.id.clone();
        store.apply(DiagramCommand::AddApiKey(key)).unwrap();
        let person = DomainPerson::new(
            "Researcher",
            LlmConfig {
                service: LlmService::Openai,
                model: "gpt-4o".into(),
                api_key_id: key_id.clone(),
                system_prompt: None,
                forgetting_mode: Default::default(),
            },
        );
        let person_id = person.id.clone();
        store.apply(DiagramCommand::AddPerson(person)).unwrap();
        (key_id, person_id)
    }

    #[test]
    fn add_node_creates_default_handles_and_bumps_revision() {
        let mut store = DiagramStore::new();
        let node = start_node();
        let id = node.id.clone();
        store.apply(DiagramCommand::AddNode(node)).unwrap();
        assert_eq!(store.revision(), 1);
        assert!(store
            .diagram()
            .handles
            .iter()
            .any(|h| h.node_id == id && h.label == HandleLabel::Default));
    }

    #[test]
    fn failed_command_leaves_store_untouched() {
        let mut store = DiagramStore::new();
        let node = start_node();
        let source = node.id.clone();
        store.apply(DiagramCommand::AddNode(node)).unwrap();
        let before = store.revision();

        // Arrow into a nonexistent node fails validation.
        let arrow = DomainArrow::new(
            HandleRef::new(source, HandleLabel::Default),
            HandleRef::new(NodeId::new("ghost"), HandleLabel::Default),
        );
        let err = store.apply(DiagramCommand::AddArrow(arrow)).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(store.revision(), before);
        assert!(store.diagram().arrows.is_empty());
    }

    #[test]
    fn remove_node_cascades_arrows_and_handles() {
        let mut store = DiagramStore::new();
        let a = start_node();
        let b = DomainNode::new(
            "End",
            Vec2::default(),
            NodeData::Endpoint(Default::default()),
        );
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        store.apply(DiagramCommand::AddNode(a)).unwrap();
        store.apply(DiagramCommand::AddNode(b)).unwrap();
        store
            .apply(DiagramCommand::AddArrow(DomainArrow::new(
                HandleRef::new(a_id.clone(), HandleLabel::Default),
                HandleRef::new(b_id.clone(), HandleLabel::Default),
            )))
            .unwrap();

        store.apply(DiagramCommand::RemoveNode { id: b_id.clone() }).unwrap();
        assert!(store.diagram().arrows.is_empty());
        assert!(store.diagram().handles.iter().all(|h| h.node_id != b_id));
        assert!(store.diagram().node(&a_id).is_some());
    }

    #[test]
    fn remove_api_key_in_use_is_refused() {
        let mut store = DiagramStore::new();
        let (key_id, person_id) = person_with_key(&mut store);
        let err = store
            .apply(DiagramCommand::RemoveApiKey { id: key_id.clone() })
            .unwrap_err();
        match err {
            StoreError::ApiKeyInUse { api_key, person } => {
                assert_eq!(api_key, key_id);
                assert_eq!(person, person_id);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn remove_person_detaches_node_references() {
        let mut store = DiagramStore::new();
        let (_, person_id) = person_with_key(&mut store);
        let node = DomainNode::new(
            "Ask",
            Vec2::default(),
            NodeData::PersonJob(PersonJobData {
                person: Some(person_id.clone()),
                ..Default::default()
            }),
        );
        let node_id = node.id.clone();
        store.apply(DiagramCommand::AddNode(node)).unwrap();

        store
            .apply(DiagramCommand::RemovePerson { id: person_id })
            .unwrap();
        let node = store.diagram().node(&node_id).unwrap();
        assert_eq!(node.data.person(), None);
    }

    #[test]
    fn unknown_targets_are_not_found() {
        let mut store = DiagramStore::new();
        let err = store
            .apply(DiagramCommand::MoveNode {
                id: NodeId::new("ghost"),
                position: Vec2::new(1.0, 1.0),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "node", .. }));
    }
}
