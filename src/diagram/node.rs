//! Diagram nodes and their typed payloads.
//!
//! A node's free-form `data` object in the persisted formats is validated
//! into the closed [`NodeData`] sum type at the deserialization boundary:
//! one variant per [`NodeType`], with the fields that kind of node actually
//! carries. Unknown payload keys are preserved in each variant's `extra` map
//! so round-trips do not drop forward-compatible fields, but they are never
//! interpreted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diagram::DiagramError;
use crate::ids::{NodeId, PersonId};
use crate::types::{
    DbBlockSubType, HookTriggerMode, HookType, HttpMethod, NodeType, NotionOperation,
    SupportedLanguage,
};

/// A 2D canvas position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Fallback grid placement for imported nodes without a position:
    /// four columns, row-major, with a fixed margin.
    #[must_use]
    pub fn grid(index: usize) -> Self {
        let col = (index % 4) as f64;
        let row = (index / 4) as f64;
        Self {
            x: 100.0 + col * 250.0,
            y: 100.0 + row * 200.0,
        }
    }
}

type ExtraMap = Map<String, Value>;

/// Payload of a start node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StartData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_mode: Option<HookTriggerMode>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_data: ExtraMap,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of a person_job node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonJobData {
    /// The person (agent configuration) this job runs as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonId>,
    /// Prompt used only on the first iteration (fed via the `first` handle).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_only_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prompt: Option<String>,
    #[serde(default = "default_max_iteration")]
    pub max_iteration: u32,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

fn default_max_iteration() -> u32 {
    1
}

/// Payload of a person_batch_job node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonBatchJobData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_only_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prompt: Option<String>,
    /// Input key holding the dataset the prompt is fanned over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_key: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of a condition node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionData {
    /// Boolean expression evaluated against the incoming payload.
    #[serde(default)]
    pub expression: String,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of a code_job node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodeJobData {
    pub language: SupportedLanguage,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of an api_job node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiJobData {
    pub url: String,
    #[serde(default = "default_http_method")]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: ExtraMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

fn default_http_method() -> HttpMethod {
    HttpMethod::Get
}

/// Payload of an endpoint node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointData {
    #[serde(default)]
    pub save_to_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of a db node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DbData {
    pub sub_type: DbBlockSubType,
    /// File path, inline prompt, code, or tool reference depending on
    /// `sub_type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of a user_response node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserResponseData {
    #[serde(default)]
    pub prompt: String,
    /// Seconds to wait for the human before the node times out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of a notion node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotionData {
    pub operation: NotionOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of a hook node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HookData {
    pub hook_type: HookType,
    /// Shell/python command for command hooks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Target URL for webhook hooks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_mode: Option<HookTriggerMode>,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of a template_job node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateJobData {
    #[serde(default)]
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of a json_schema_validator node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonSchemaValidatorData {
    #[serde(default)]
    pub schema: Value,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of a typescript_ast node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TypescriptAstData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// Payload of a sub_diagram node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubDiagramData {
    #[serde(default)]
    pub diagram_name: String,
    #[serde(flatten)]
    pub extra: ExtraMap,
}

/// The closed payload union: exactly one variant per [`NodeType`].
#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    Start(StartData),
    PersonJob(PersonJobData),
    PersonBatchJob(PersonBatchJobData),
    Condition(ConditionData),
    CodeJob(CodeJobData),
    ApiJob(ApiJobData),
    Endpoint(EndpointData),
    Db(DbData),
    UserResponse(UserResponseData),
    Notion(NotionData),
    Hook(HookData),
    TemplateJob(TemplateJobData),
    JsonSchemaValidator(JsonSchemaValidatorData),
    TypescriptAst(TypescriptAstData),
    SubDiagram(SubDiagramData),
}

impl NodeData {
    /// The node type this payload belongs to.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeData::Start(_) => NodeType::Start,
            NodeData::PersonJob(_) => NodeType::PersonJob,
            NodeData::PersonBatchJob(_) => NodeType::PersonBatchJob,
            NodeData::Condition(_) => NodeType::Condition,
            NodeData::CodeJob(_) => NodeType::CodeJob,
            NodeData::ApiJob(_) => NodeType::ApiJob,
            NodeData::Endpoint(_) => NodeType::Endpoint,
            NodeData::Db(_) => NodeType::Db,
            NodeData::UserResponse(_) => NodeType::UserResponse,
            NodeData::Notion(_) => NodeType::Notion,
            NodeData::Hook(_) => NodeType::Hook,
            NodeData::TemplateJob(_) => NodeType::TemplateJob,
            NodeData::JsonSchemaValidator(_) => NodeType::JsonSchemaValidator,
            NodeData::TypescriptAst(_) => NodeType::TypescriptAst,
            NodeData::SubDiagram(_) => NodeType::SubDiagram,
        }
    }

    /// The person this payload references, for the node kinds that have one.
    #[must_use]
    pub fn person(&self) -> Option<&PersonId> {
        match self {
            NodeData::PersonJob(data) => data.person.as_ref(),
            NodeData::PersonBatchJob(data) => data.person.as_ref(),
            _ => None,
        }
    }

    /// Validate a raw payload object into the variant matching `node_type`.
    pub fn from_object(node_type: NodeType, object: ExtraMap) -> Result<Self, DiagramError> {
        let value = Value::Object(object);
        let decode = |e: serde_json::Error| DiagramError::InvalidNodeData {
            node_type,
            source: e,
        };
        Ok(match node_type {
            NodeType::Start => NodeData::Start(serde_json::from_value(value).map_err(decode)?),
            NodeType::PersonJob => {
                NodeData::PersonJob(serde_json::from_value(value).map_err(decode)?)
            }
            NodeType::PersonBatchJob => {
                NodeData::PersonBatchJob(serde_json::from_value(value).map_err(decode)?)
            }
            NodeType::Condition => {
                NodeData::Condition(serde_json::from_value(value).map_err(decode)?)
            }
            NodeType::CodeJob => NodeData::CodeJob(serde_json::from_value(value).map_err(decode)?),
            NodeType::ApiJob => NodeData::ApiJob(serde_json::from_value(value).map_err(decode)?),
            NodeType::Endpoint => {
                NodeData::Endpoint(serde_json::from_value(value).map_err(decode)?)
            }
            NodeType::Db => NodeData::Db(serde_json::from_value(value).map_err(decode)?),
            NodeType::UserResponse => {
                NodeData::UserResponse(serde_json::from_value(value).map_err(decode)?)
            }
            NodeType::Notion => NodeData::Notion(serde_json::from_value(value).map_err(decode)?),
            NodeType::Hook => NodeData::Hook(serde_json::from_value(value).map_err(decode)?),
            NodeType::TemplateJob => {
                NodeData::TemplateJob(serde_json::from_value(value).map_err(decode)?)
            }
            NodeType::JsonSchemaValidator => {
                NodeData::JsonSchemaValidator(serde_json::from_value(value).map_err(decode)?)
            }
            NodeType::TypescriptAst => {
                NodeData::TypescriptAst(serde_json::from_value(value).map_err(decode)?)
            }
            NodeType::SubDiagram => {
                NodeData::SubDiagram(serde_json::from_value(value).map_err(decode)?)
            }
        })
    }

    /// Render the payload back into the raw object form used by the
    /// persisted formats.
    #[must_use]
    pub fn to_object(&self) -> ExtraMap {
        let value = match self {
            NodeData::Start(d) => serde_json::to_value(d),
            NodeData::PersonJob(d) => serde_json::to_value(d),
            NodeData::PersonBatchJob(d) => serde_json::to_value(d),
            NodeData::Condition(d) => serde_json::to_value(d),
            NodeData::CodeJob(d) => serde_json::to_value(d),
            NodeData::ApiJob(d) => serde_json::to_value(d),
            NodeData::Endpoint(d) => serde_json::to_value(d),
            NodeData::Db(d) => serde_json::to_value(d),
            NodeData::UserResponse(d) => serde_json::to_value(d),
            NodeData::Notion(d) => serde_json::to_value(d),
            NodeData::Hook(d) => serde_json::to_value(d),
            NodeData::TemplateJob(d) => serde_json::to_value(d),
            NodeData::JsonSchemaValidator(d) => serde_json::to_value(d),
            NodeData::TypescriptAst(d) => serde_json::to_value(d),
            NodeData::SubDiagram(d) => serde_json::to_value(d),
        };
        match value {
            Ok(Value::Object(map)) => map,
            // Payload structs always serialize to objects.
            _ => Map::new(),
        }
    }
}

/// A node in a diagram.
///
/// Serializes to the persisted shape
/// `{ "id", "type", "label"?, "position", "data": { … } }`, with the label
/// stored inside `data` on the wire (the editor keeps it there) but hoisted
/// into a first-class field in memory because the converter keys portable
/// documents on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct DomainNode {
    pub id: NodeId,
    /// Display label; export derives persisted labels from this.
    pub label: Option<String>,
    pub position: Vec2,
    pub data: NodeData,
}

impl DomainNode {
    /// Build a node with a generated id.
    #[must_use]
    pub fn new(label: impl Into<String>, position: Vec2, data: NodeData) -> Self {
        Self {
            id: NodeId::generate(),
            label: Some(label.into()),
            position,
            data,
        }
    }

    /// The type tag of this node's payload.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.data.node_type()
    }

    /// The label export would use: the display label, falling back to the id.
    #[must_use]
    pub fn effective_label(&self) -> &str {
        match &self.label {
            Some(label) if !label.is_empty() => label,
            _ => self.id.as_str(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawNode {
    id: NodeId,
    #[serde(rename = "type")]
    node_type: NodeType,
    #[serde(default)]
    position: Vec2,
    #[serde(default)]
    data: ExtraMap,
}

impl TryFrom<RawNode> for DomainNode {
    type Error = DiagramError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let mut object = raw.data;
        let label = match object.remove("label") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        Ok(Self {
            id: raw.id,
            label,
            position: raw.position,
            data: NodeData::from_object(raw.node_type, object)?,
        })
    }
}

impl From<DomainNode> for RawNode {
    fn from(node: DomainNode) -> Self {
        let mut data = node.data.to_object();
        if let Some(label) = &node.label {
            data.insert("label".to_string(), Value::String(label.clone()));
        }
        Self {
            id: node.id,
            node_type: node.data.node_type(),
            position: node.position,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_serde_round_trip_keeps_label_in_data() {
        let node = DomainNode::new(
            "Ask",
            Vec2::new(10.0, 20.0),
            NodeData::PersonJob(PersonJobData {
                person: Some(PersonId::new("p1")),
                first_only_prompt: Some("hi".into()),
                max_iteration: 3,
                ..Default::default()
            }),
        );
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "person_job");
        assert_eq!(value["data"]["label"], "Ask");
        assert_eq!(value["data"]["max_iteration"], 3);

        let back: DomainNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn unknown_payload_keys_survive_round_trips() {
        let value = json!({
            "id": "n1",
            "type": "condition",
            "position": {"x": 0.0, "y": 0.0},
            "data": {"expression": "x > 1", "future_flag": true}
        });
        let node: DomainNode = serde_json::from_value(value).unwrap();
        let NodeData::Condition(data) = &node.data else {
            panic!("expected condition payload");
        };
        assert_eq!(data.extra["future_flag"], true);
        let out = serde_json::to_value(&node).unwrap();
        assert_eq!(out["data"]["future_flag"], true);
    }

    #[test]
    fn payload_must_match_node_type() {
        let value = json!({
            "id": "n1",
            "type": "code_job",
            "position": {"x": 0.0, "y": 0.0},
            "data": {"language": "befunge", "code": ""}
        });
        assert!(serde_json::from_value::<DomainNode>(value).is_err());
    }

    #[test]
    fn effective_label_falls_back_to_id() {
        let mut node = DomainNode::new("Named", Vec2::default(), NodeData::Start(StartData::default()));
        assert_eq!(node.effective_label(), "Named");
        node.label = None;
        assert_eq!(node.effective_label(), node.id.as_str());
    }

    #[test]
    fn grid_positions_wrap_rows() {
        assert_eq!(Vec2::grid(0), Vec2::new(100.0, 100.0));
        assert_eq!(Vec2::grid(5), Vec2::new(350.0, 300.0));
    }
}
