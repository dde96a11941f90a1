//! The readable YAML format: a review-friendly rendering where arrows are
//! written as `flow` entries (`"Source -> Target"`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_yaml::Mapping;

use super::light::{
    json_to_yaml, parse_label_keyed_api_keys, parse_label_keyed_persons,
    render_label_keyed_api_keys, render_label_keyed_persons, yaml_to_json,
};
use super::portable::{PortableArrow, PortableDiagram, PortableNode};
use super::{ConvertError, FormatStrategy};
use crate::diagram::Vec2;
use crate::types::{ContentType, DiagramFormat, NodeType};

#[derive(Default)]
pub struct ReadableYamlStrategy;

#[derive(Default, Serialize, Deserialize)]
struct ReadableDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    persons: Mapping,
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    api_keys: Mapping,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    nodes: Vec<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    flow: Vec<FlowEntry>,
}

/// One arrow: the plain string form for bare connections, the mapping form
/// when the arrow carries a content tag or label.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FlowEntry {
    Plain(String),
    Tagged {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<ContentType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
}

fn malformed(message: impl Into<String>) -> ConvertError {
    ConvertError::MalformedDocument {
        format: DiagramFormat::Readable,
        message: message.into(),
    }
}

fn parse_flow_entry(index: usize, entry: &FlowEntry) -> Result<PortableArrow, ConvertError> {
    match entry {
        FlowEntry::Plain(text) => {
            let (from, to) = text
                .split_once("->")
                .ok_or_else(|| malformed(format!("flow entry {index} is missing \"->\"")))?;
            Ok(PortableArrow {
                source: from.trim().to_string(),
                target: to.trim().to_string(),
                content_type: None,
                label: None,
                data: serde_json::Map::new(),
            })
        }
        FlowEntry::Tagged {
            from,
            to,
            content,
            label,
        } => Ok(PortableArrow {
            source: from.clone(),
            target: to.clone(),
            content_type: *content,
            label: label.clone(),
            data: serde_json::Map::new(),
        }),
    }
}

fn render_flow_entry(arrow: &PortableArrow) -> FlowEntry {
    if arrow.content_type.is_none() && arrow.label.is_none() {
        FlowEntry::Plain(format!("{} -> {}", arrow.source, arrow.target))
    } else {
        FlowEntry::Tagged {
            from: arrow.source.clone(),
            to: arrow.target.clone(),
            content: arrow.content_type,
            label: arrow.label.clone(),
        }
    }
}

fn parse_node_entry(index: usize, value: &serde_yaml::Value) -> Result<PortableNode, ConvertError> {
    let json = yaml_to_json(value)?;
    let Value::Object(mut body) = json else {
        return Err(malformed(format!("node entry {index} must be a mapping")));
    };
    let label = match body.remove("label") {
        Some(Value::String(label)) => label,
        _ => return Err(malformed(format!("node entry {index} is missing a label"))),
    };
    let node_type = match body.remove("type") {
        Some(Value::String(tag)) => tag.parse::<NodeType>()?,
        _ => {
            return Err(malformed(format!(
                "node {label:?} is missing a type tag"
            )))
        }
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
        label,
        node_type,
        position,
        props: body,
    })
}

fn render_node_entry(node: &PortableNode) -> Result<serde_yaml::Value, ConvertError> {
    let mut body = serde_json::Map::new();
    body.insert("label".to_string(), Value::String(node.label.clone()));
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

impl FormatStrategy for ReadableYamlStrategy {
    fn format(&self) -> DiagramFormat {
        DiagramFormat::Readable
    }

    fn quick_match(&self, content: &str) -> bool {
        let trimmed = content.trim_start();
        !trimmed.starts_with('{') && content.contains("flow:")
    }

    fn parse(&self, content: &str) -> Result<PortableDiagram, ConvertError> {
        let doc: ReadableDoc = serde_yaml::from_str(content).map_err(|source| {
            ConvertError::Yaml {
                context: "failed to parse readable diagram YAML",
                source,
            }
        })?;

        let nodes = doc
            .nodes
            .iter()
            .enumerate()
            .map(|(index, value)| parse_node_entry(index, value))
            .collect::<Result<Vec<_>, _>>()?;
        let arrows = doc
            .flow
            .iter()
            .enumerate()
            .map(|(index, entry)| parse_flow_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

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
        let readable = ReadableDoc {
            version: Some(if doc.version.is_empty() {
                crate::diagram::SCHEMA_VERSION.to_string()
            } else {
                doc.version.clone()
            }),
            name: doc.name.clone(),
            description: doc.description.clone(),
            persons: render_label_keyed_persons(&doc.persons)?,
            api_keys: render_label_keyed_api_keys(&doc.api_keys)?,
            nodes: doc
                .nodes
                .iter()
                .map(render_node_entry)
                .collect::<Result<Vec<_>, _>>()?,
            flow: doc.arrows.iter().map(render_flow_entry).collect(),
        };

        serde_yaml::to_string(&readable).map_err(|source| ConvertError::Yaml {
            context: "failed to render readable diagram YAML",
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_tagged_flow_entries() {
        let content = r#"
version: 2.0.0
nodes:
  - label: Start
    type: start
  - label: Branch
    type: condition
    expression: done
  - label: Finish
    type: endpoint
flow:
  - Start -> Branch
  - from: Branch:condtrue
    to: Finish
    content: raw_text
"#;
        let strategy = ReadableYamlStrategy;
        assert!(strategy.quick_match(content));
        let doc = strategy.parse(content).unwrap();
        assert_eq!(doc.arrows.len(), 2);
        assert_eq!(doc.arrows[0].source, "Start");
        assert_eq!(doc.arrows[1].source, "Branch:condtrue");
        assert_eq!(doc.arrows[1].content_type, Some(ContentType::RawText));
    }

    #[test]
    fn flow_entry_without_arrow_is_malformed() {
        let content = "nodes:\n  - label: A\n    type: start\nflow:\n  - \"A to B\"\n";
        let err = ReadableYamlStrategy.parse(content).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedDocument { .. }));
    }

    #[test]
    fn bare_arrows_render_as_strings() {
        let arrow = PortableArrow {
            source: "A".into(),
            target: "B".into(),
            content_type: None,
            label: None,
            data: serde_json::Map::new(),
        };
        assert!(matches!(render_flow_entry(&arrow), FlowEntry::Plain(_)));
    }
}
