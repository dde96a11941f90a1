//! The light YAML format: compact, label-keyed, meant for hand editing.
//!
//! Nodes and persons are YAML mappings keyed by label; arrows are a flat
//! `connections` list; handles and arrow companion data are elided (import
//! regenerates default handles).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_yaml::Mapping;

use super::portable::{
    PortableApiKey, PortableArrow, PortableDiagram, PortableNode, PortablePerson,
};
use super::{ConvertError, FormatStrategy};
use crate::diagram::Vec2;
use crate::types::{ApiService, ContentType, DiagramFormat, ForgettingMode, LlmService, NodeType};

#[derive(Default)]
pub struct LightYamlStrategy;

#[derive(Default, Serialize, Deserialize)]
struct LightDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    nodes: Mapping,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    connections: Vec<LightConnection>,
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    persons: Mapping,
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    api_keys: Mapping,
}

#[derive(Serialize, Deserialize)]
struct LightConnection {
    from: String,
    to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct LightPersonBody {
    service: LlmService,
    model: String,
    api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    forgetting_mode: Option<ForgettingMode>,
}

#[derive(Serialize, Deserialize)]
struct LightApiKeyBody {
    service: ApiService,
}

fn yaml_err(source: serde_yaml::Error, context: &'static str) -> ConvertError {
    ConvertError::Yaml { context, source }
}

fn malformed(message: impl Into<String>) -> ConvertError {
    ConvertError::MalformedDocument {
        format: DiagramFormat::Light,
        message: message.into(),
    }
}

/// Bridge a YAML value into JSON space; YAML documents written by this crate
/// only ever use string keys, anything else is malformed.
pub(super) fn yaml_to_json(value: &serde_yaml::Value) -> Result<Value, ConvertError> {
    serde_json::to_value(value).map_err(|source| ConvertError::Json {
        context: "YAML value not representable as JSON",
        source,
    })
}

pub(super) fn json_to_yaml(value: &Value) -> Result<serde_yaml::Value, ConvertError> {
    serde_yaml::to_value(value)
        .map_err(|source| yaml_err(source, "JSON value not representable as YAML"))
}

pub(super) fn parse_label_keyed_persons(
    persons: &Mapping,
) -> Result<Vec<PortablePerson>, ConvertError> {
    persons
        .iter()
        .map(|(key, value)| {
            let label = key
                .as_str()
                .ok_or_else(|| malformed("person labels must be strings"))?;
            let body: LightPersonBody = serde_yaml::from_value(value.clone())
                .map_err(|source| yaml_err(source, "malformed person entry"))?;
            Ok(PortablePerson {
                label: label.to_string(),
                service: body.service,
                model: body.model,
                api_key: body.api_key,
                system_prompt: body.system_prompt,
                forgetting_mode: body.forgetting_mode,
            })
        })
        .collect()
}

pub(super) fn parse_label_keyed_api_keys(
    api_keys: &Mapping,
) -> Result<Vec<PortableApiKey>, ConvertError> {
    api_keys
        .iter()
        .map(|(key, value)| {
            let label = key
                .as_str()
                .ok_or_else(|| malformed("api key labels must be strings"))?;
            let body: LightApiKeyBody = serde_yaml::from_value(value.clone())
                .map_err(|source| yaml_err(source, "malformed api key entry"))?;
            Ok(PortableApiKey {
                label: label.to_string(),
                service: body.service,
            })
        })
        .collect()
}

pub(super) fn render_label_keyed_persons(
    persons: &[PortablePerson],
) -> Result<Mapping, ConvertError> {
    let mut mapping = Mapping::new();
    for person in persons {
        let body = LightPersonBody {
            service: person.service,
            model: person.model.clone(),
            api_key: person.api_key.clone(),
            system_prompt: person.system_prompt.clone(),
            forgetting_mode: person.forgetting_mode,
        };
        mapping.insert(
            serde_yaml::Value::String(person.label.clone()),
            serde_yaml::to_value(body)
                .map_err(|source| yaml_err(source, "failed to render person entry"))?,
        );
    }
    Ok(mapping)
}

pub(super) fn render_label_keyed_api_keys(
    api_keys: &[PortableApiKey],
) -> Result<Mapping, ConvertError> {
    let mut mapping = Mapping::new();
    for key in api_keys {
        mapping.insert(
            serde_yaml::Value::String(key.label.clone()),
            serde_yaml::to_value(LightApiKeyBody {
                service: key.service,
            })
            .map_err(|source| yaml_err(source, "failed to render api key entry"))?,
        );
    }
    Ok(mapping)
}

fn parse_node_body(
    label: &str,
    value: &serde_yaml::Value,
) -> Result<PortableNode, ConvertError> {
    let json = yaml_to_json(value)?;
    let Value::Object(mut body) = json else {
        return Err(malformed(format!("node {label:?} body must be a mapping")));
    };
    let node_type = match body.remove("type") {
        Some(Value::String(tag)) => tag.parse::<NodeType>()?,
        _ => return Err(malformed(format!("node {label:?} is missing a type tag"))),
    };
    let position = match body.remove("position") {
        Some(value) => Some(
            serde_json::from_value::<Vec2>(value).map_err(|source| ConvertError::Json {
                context: "malformed node position",
                source,
            })?,
        ),
        None => None,
    };
    Ok(PortableNode {
        label: label.to_string(),
        node_type,
        position,
        props: body,
    })
}

fn render_node_body(node: &PortableNode) -> Result<serde_yaml::Value, ConvertError> {
    let mut body = Map::new();
    body.insert(
        "type".to_string(),
        Value::String(node.node_type.as_str().to_string()),
    );
    if let Some(position) = node.position {
        body.insert(
            "position".to_string(),
            serde_json::to_value(position).map_err(|source| ConvertError::Json {
                context: "failed to render node position",
                source,
            })?,
        );
    }
    for (key, value) in &node.props {
        body.insert(key.clone(), value.clone());
    }
    json_to_yaml(&Value::Object(body))
}

impl FormatStrategy for LightYamlStrategy {
    fn format(&self) -> DiagramFormat {
        DiagramFormat::Light
    }

    fn quick_match(&self, content: &str) -> bool {
        let trimmed = content.trim_start();
        !trimmed.starts_with('{') && content.contains("nodes:") && !content.contains("flow:")
    }

    fn parse(&self, content: &str) -> Result<PortableDiagram, ConvertError> {
        let doc: LightDoc = serde_yaml::from_str(content)
            .map_err(|source| yaml_err(source, "failed to parse light diagram YAML"))?;

        let mut nodes = Vec::with_capacity(doc.nodes.len());
        for (key, value) in &doc.nodes {
            let label = key
                .as_str()
                .ok_or_else(|| malformed("node labels must be strings"))?;
            nodes.push(parse_node_body(label, value)?);
        }

        let arrows = doc
            .connections
            .into_iter()
            .map(|connection| PortableArrow {
                source: connection.from,
                target: connection.to,
                content_type: connection.content_type,
                label: connection.label,
                data: Map::new(),
            })
            .collect();

        Ok(PortableDiagram {
            version: doc.version.unwrap_or_default(),
            name: doc.name,
            description: doc.description,
            nodes,
            arrows,
            handles: Vec::new(),
            persons: parse_label_keyed_persons(&doc.persons)?,
            api_keys: parse_label_keyed_api_keys(&doc.api_keys)?,
        })
    }

    fn render(&self, doc: &PortableDiagram) -> Result<String, ConvertError> {
        let mut nodes = Mapping::new();
        for node in &doc.nodes {
            nodes.insert(
                serde_yaml::Value::String(node.label.clone()),
                render_node_body(node)?,
            );
        }

        let light = LightDoc {
            version: Some(if doc.version.is_empty() {
                crate::diagram::SCHEMA_VERSION.to_string()
            } else {
                doc.version.clone()
            }),
            name: doc.name.clone(),
            description: doc.description.clone(),
            nodes,
            connections: doc
                .arrows
                .iter()
                .map(|arrow| LightConnection {
                    from: arrow.source.clone(),
                    to: arrow.target.clone(),
                    content_type: arrow.content_type,
                    label: arrow.label.clone(),
                })
                .collect(),
            persons: render_label_keyed_persons(&doc.persons)?,
            api_keys: render_label_keyed_api_keys(&doc.api_keys)?,
        };

        serde_yaml::to_string(&light)
            .map_err(|source| yaml_err(source, "failed to render light diagram YAML"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_light_document() {
        let content = r#"
version: 2.0.0
nodes:
  Start:
    type: start
  Ask:
    type: person_job
    person: Researcher
    max_iteration: 2
connections:
  - from: Start
    to: Ask
    content_type: raw_text
persons:
  Researcher:
    service: openai
    model: gpt-4o
    api_key: Main
api_keys:
  Main:
    service: openai
"#;
        let strategy = LightYamlStrategy;
        assert!(strategy.quick_match(content));
        let doc = strategy.parse(content).unwrap();
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[1].props["person"], "Researcher");
        assert_eq!(doc.arrows.len(), 1);
        assert_eq!(doc.arrows[0].content_type, Some(ContentType::RawText));
        assert_eq!(doc.persons[0].api_key, "Main");
    }

    #[test]
    fn node_without_type_is_malformed() {
        let content = "nodes:\n  Broken:\n    person: X\n";
        let err = LightYamlStrategy.parse(content).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedDocument { .. }));
    }

    #[test]
    fn render_parse_round_trip_preserves_labels() {
        let doc = PortableDiagram {
            version: "2.0.0".into(),
            nodes: vec![PortableNode {
                label: "Solo".into(),
                node_type: NodeType::Start,
                position: Some(Vec2::new(1.0, 2.0)),
                props: Map::new(),
            }],
            ..Default::default()
        };
        let text = LightYamlStrategy.render(&doc).unwrap();
        let back = LightYamlStrategy.parse(&text).unwrap();
        assert_eq!(back.nodes[0].label, "Solo");
        assert_eq!(back.nodes[0].position, Some(Vec2::new(1.0, 2.0)));
    }
}
