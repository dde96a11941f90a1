//! Round-trip properties of the label/ID converter: connectivity
//! preservation, label disambiguation, and strict import validation.

use diaflow::convert::{to_portable, ConvertError, DiagramConverter};
use diaflow::diagram::node::{ConditionData, EndpointData, PersonJobData, StartData};
use diaflow::diagram::{
    Diagram, DomainApiKey, DomainArrow, DomainNode, DomainPerson, LlmConfig, NodeData, Vec2,
};
use diaflow::ids::{HandleRef, NodeId};
use diaflow::types::{ApiService, ContentType, DiagramFormat, HandleLabel, LlmService};

fn node(label: &str, data: NodeData) -> DomainNode {
    DomainNode::new(label, Vec2::new(10.0, 20.0), data)
}

fn arrow(source: &NodeId, source_handle: HandleLabel, target: &NodeId) -> DomainArrow {
    DomainArrow::new(
        HandleRef::new(source.clone(), source_handle),
        HandleRef::new(target.clone(), HandleLabel::Default),
    )
}

/// A diagram exercising persons, api keys, and branch handles.
fn sample_diagram() -> Diagram {
    let mut diagram = Diagram::new();

    let api_key = DomainApiKey::new("Main Key", ApiService::Anthropic);
    let key_id = api_key.id.clone();
    diagram.api_keys.push(api_key);

    let person = DomainPerson::new(
        "Researcher",
        LlmConfig {
            service: LlmService::Anthropic,
            model: "claude-sonnet".into(),
            api_key_id: key_id,
            system_prompt: Some("Be terse.".into()),
            forgetting_mode: Default::default(),
        },
    );
    let person_id = person.id.clone();
    diagram.persons.push(person);

    let start = node("Start", NodeData::Start(StartData::default()));
    let ask = node(
        "Ask",
        NodeData::PersonJob(PersonJobData {
            person: Some(person_id),
            first_only_prompt: Some("Summarize {{input}}".into()),
            max_iteration: 3,
            ..Default::default()
        }),
    );
    let branch = node(
        "Branch",
        NodeData::Condition(ConditionData {
            expression: "iterations > 2".into(),
            ..Default::default()
        }),
    );
    let done = node("Done", NodeData::Endpoint(EndpointData::default()));

    diagram.arrows.push(
        arrow(&start.id, HandleLabel::Default, &ask.id).with_content_type(ContentType::RawText),
    );
    diagram.arrows.push(
        arrow(&ask.id, HandleLabel::Default, &branch.id)
            .with_content_type(ContentType::ConversationState),
    );
    diagram
        .arrows
        .push(arrow(&branch.id, HandleLabel::Condtrue, &done.id));
    // The false branch loops back into the person job.
    diagram
        .arrows
        .push(arrow(&branch.id, HandleLabel::Condfalse, &ask.id));

    diagram.nodes.extend([start, ask, branch, done]);
    diagram.ensure_default_handles();
    diagram.validate().unwrap();
    diagram
}

/// Arrow connectivity as (source label, handle, target label) triples.
fn connectivity(diagram: &Diagram) -> Vec<(String, HandleLabel, String)> {
    let label_of = |id: &NodeId| -> String {
        diagram
            .node(id)
            .and_then(|n| n.label.clone())
            .unwrap_or_else(|| id.to_string())
    };
    let mut triples: Vec<_> = diagram
        .arrows
        .iter()
        .map(|a| (label_of(&a.source.node), a.source.label, label_of(&a.target.node)))
        .collect();
    triples.sort();
    triples
}

#[test]
fn native_round_trip_preserves_structure() {
    let diagram = sample_diagram();
    let converter = DiagramConverter::new();

    let text = converter
        .serialize(&diagram, DiagramFormat::Native)
        .unwrap();
    let back = converter
        .deserialize(&text, Some(DiagramFormat::Native))
        .unwrap();

    assert_eq!(back.nodes.len(), diagram.nodes.len());
    assert_eq!(back.arrows.len(), diagram.arrows.len());
    assert_eq!(back.persons.len(), 1);
    assert_eq!(back.api_keys.len(), 1);
    assert_eq!(connectivity(&back), connectivity(&diagram));

    // Person and api key associations survive by label.
    let person = &back.persons[0];
    assert_eq!(person.label, "Researcher");
    assert_eq!(
        back.api_key(&person.llm_config.api_key_id).map(|k| k.label.as_str()),
        Some("Main Key")
    );
    let ask = back
        .nodes
        .iter()
        .find(|n| n.label.as_deref() == Some("Ask"))
        .unwrap();
    assert_eq!(ask.data.person(), Some(&person.id));
}

#[test]
fn round_trips_hold_across_all_formats() {
    let diagram = sample_diagram();
    let converter = DiagramConverter::new();
    for format in [
        DiagramFormat::Native,
        DiagramFormat::Light,
        DiagramFormat::Readable,
    ] {
        let text = converter.serialize(&diagram, format).unwrap();
        let back = converter.deserialize(&text, Some(format)).unwrap();
        assert_eq!(back.nodes.len(), diagram.nodes.len(), "{format}");
        assert_eq!(connectivity(&back), connectivity(&diagram), "{format}");
    }
}

#[test]
fn colliding_labels_get_alphabetic_suffixes() {
    let mut diagram = Diagram::new();
    diagram
        .nodes
        .push(node("Start", NodeData::Start(StartData::default())));
    diagram
        .nodes
        .push(node("Start", NodeData::Endpoint(EndpointData::default())));
    diagram
        .nodes
        .push(node("Start", NodeData::Endpoint(EndpointData::default())));
    diagram.ensure_default_handles();

    let doc = to_portable(&diagram);
    let labels: Vec<_> = doc.nodes.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, vec!["Start", "Start-a", "Start-b"]);
}

#[test]
fn double_round_trip_keeps_connectivity_even_if_labels_shift() {
    let mut diagram = sample_diagram();
    // Force a collision so the first export introduces a suffix.
    diagram
        .nodes
        .push(node("Ask", NodeData::Endpoint(EndpointData::default())));
    diagram.ensure_default_handles();

    let converter = DiagramConverter::new();
    let once = converter.serialize(&diagram, DiagramFormat::Native).unwrap();
    let imported = converter
        .deserialize(&once, Some(DiagramFormat::Native))
        .unwrap();
    let twice = converter
        .serialize(&imported, DiagramFormat::Native)
        .unwrap();
    let reimported = converter
        .deserialize(&twice, Some(DiagramFormat::Native))
        .unwrap();

    assert_eq!(reimported.nodes.len(), diagram.nodes.len());
    assert_eq!(reimported.arrows.len(), diagram.arrows.len());
}

#[test]
fn import_rejects_unknown_arrow_target_naming_the_index() {
    let content = r#"
nodes:
  Start:
    type: start
connections:
  - from: Start
    to: Ghost
"#;
    let converter = DiagramConverter::new();
    let err = converter
        .deserialize(content, Some(DiagramFormat::Light))
        .unwrap_err();
    match err {
        ConvertError::ArrowUnknownNode {
            index,
            side,
            reference,
        } => {
            assert_eq!(index, 0);
            assert_eq!(side, "target");
            assert_eq!(reference, "Ghost");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn import_rejects_handle_invalid_for_node_type() {
    // condtrue is a condition-node output; Start does not expose it.
    let content = r#"
nodes:
  Start:
    type: start
  Done:
    type: endpoint
connections:
  - from: Start
    to: Done
  - from: "Start:condtrue"
    to: Done
"#;
    let converter = DiagramConverter::new();
    let err = converter
        .deserialize(content, Some(DiagramFormat::Light))
        .unwrap_err();
    match err {
        ConvertError::ArrowInvalidHandle {
            index,
            side,
            handle,
            ..
        } => {
            assert_eq!(index, 1);
            assert_eq!(side, "source");
            assert_eq!(handle, HandleLabel::Condtrue);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn format_detection_distinguishes_the_three_formats() {
    let converter = DiagramConverter::new();
    let diagram = sample_diagram();

    let native = converter.serialize(&diagram, DiagramFormat::Native).unwrap();
    let light = converter.serialize(&diagram, DiagramFormat::Light).unwrap();
    let readable = converter
        .serialize(&diagram, DiagramFormat::Readable)
        .unwrap();

    assert_eq!(converter.detect_format(&native), Some(DiagramFormat::Native));
    assert_eq!(converter.detect_format(&light), Some(DiagramFormat::Light));
    assert_eq!(
        converter.detect_format(&readable),
        Some(DiagramFormat::Readable)
    );
    assert_eq!(converter.detect_format("complete nonsense {{{"), None);
}

#[test]
fn convert_re_encodes_between_formats() {
    let converter = DiagramConverter::new();
    let diagram = sample_diagram();
    let light = converter.serialize(&diagram, DiagramFormat::Light).unwrap();

    let native = converter
        .convert(&light, DiagramFormat::Light, DiagramFormat::Native)
        .unwrap();
    let back = converter
        .deserialize(&native, Some(DiagramFormat::Native))
        .unwrap();
    assert_eq!(back.nodes.len(), diagram.nodes.len());
    assert_eq!(connectivity(&back), connectivity(&diagram));
}
