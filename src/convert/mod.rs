//! Diagram serialization: the label/ID round-trip converter.
//!
//! In memory, every entity is addressed by a generated id; on disk the
//! portable formats key entities by unique human labels so documents can be
//! read, diffed, and hand-edited. This module owns both halves of that
//! mapping and the format strategies that render it:
//!
//! - [`export::to_portable`] allocates unique labels ([`LabelAllocator`])
//!   and rewrites id references to label references
//! - [`import::from_portable`] regenerates ids and re-resolves arrow
//!   endpoints through label→id maps built in the same pass
//! - [`FormatStrategy`] implementations parse/render the portable document
//!   as native JSON, light YAML, or readable YAML
//!
//! Import is strict: an arrow referencing an unknown label or a handle that
//! the referenced node's type does not expose aborts with an error naming
//! the arrow index.
//!
//! # Example
//!
//! ```rust
//! use diaflow::convert::DiagramConverter;
//! use diaflow::diagram::{Diagram, DomainNode, NodeData, Vec2};
//! use diaflow::diagram::node::StartData;
//! use diaflow::types::DiagramFormat;
//!
//! let mut diagram = Diagram::new();
//! diagram.nodes.push(DomainNode::new(
//!     "Start",
//!     Vec2::default(),
//!     NodeData::Start(StartData::default()),
//! ));
//!
//! let converter = DiagramConverter::new();
//! let json = converter.serialize(&diagram, DiagramFormat::Native).unwrap();
//! let back = converter.deserialize(&json, Some(DiagramFormat::Native)).unwrap();
//! assert_eq!(back.nodes.len(), 1);
//! ```

pub mod export;
pub mod import;
pub mod labels;
pub mod portable;

mod light;
mod native;
mod readable;

pub use export::to_portable;
pub use import::from_portable;
pub use labels::LabelAllocator;
pub use light::LightYamlStrategy;
pub use native::NativeJsonStrategy;
pub use portable::PortableDiagram;
pub use readable::ReadableYamlStrategy;

use miette::Diagnostic;
use thiserror::Error;

use crate::diagram::{Diagram, DiagramError};
use crate::types::{DiagramFormat, HandleLabel, NodeType, ParseTagError};

/// Errors raised while importing, exporting, or converting documents.
#[derive(Debug, Error, Diagnostic)]
pub enum ConvertError {
    /// No registered format recognized the content.
    #[error("could not detect the diagram format of the given content")]
    #[diagnostic(
        code(diaflow::convert::detect_failed),
        help("Pass the format explicitly if the document is valid.")
    )]
    DetectFailed,

    /// JSON parse or render failure.
    #[error("{context}: {source}")]
    #[diagnostic(code(diaflow::convert::json))]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// YAML parse or render failure.
    #[error("{context}: {source}")]
    #[diagnostic(code(diaflow::convert::yaml))]
    Yaml {
        context: &'static str,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed but its shape is not what the format expects.
    #[error("malformed {format} document: {message}")]
    #[diagnostic(code(diaflow::convert::malformed_document))]
    MalformedDocument {
        format: DiagramFormat,
        message: String,
    },

    /// A string tag inside the document is outside its closed set.
    #[error(transparent)]
    #[diagnostic(code(diaflow::convert::unknown_tag))]
    Tag(#[from] ParseTagError),

    /// Two entities in one namespace carry the same label.
    #[error("duplicate {kind} label in document: {label:?}")]
    #[diagnostic(code(diaflow::convert::duplicate_label))]
    DuplicateLabel { kind: &'static str, label: String },

    /// A person references an api key label that is not in the document.
    #[error("person {person:?} references unknown api key {api_key:?}")]
    #[diagnostic(code(diaflow::convert::unknown_api_key_label))]
    UnknownApiKeyLabel { person: String, api_key: String },

    /// A node references a person label that is not in the document.
    #[error("node {node:?} references unknown person {person:?}")]
    #[diagnostic(code(diaflow::convert::unknown_person_label))]
    UnknownPersonLabel { node: String, person: String },

    /// An arrow endpoint references a node label that is not in the document.
    #[error("arrow {index} {side} references unknown node {reference:?}")]
    #[diagnostic(
        code(diaflow::convert::arrow_unknown_node),
        help("Arrow endpoints must name a node defined in the same document.")
    )]
    ArrowUnknownNode {
        index: usize,
        side: &'static str,
        reference: String,
    },

    /// An arrow endpoint uses a handle the referenced node's type lacks.
    #[error(
        "arrow {index} {side} uses handle {handle} which is not valid \
         on {node_type} node {node:?}"
    )]
    #[diagnostic(
        code(diaflow::convert::arrow_invalid_handle),
        help("See the per-node-type handle tables in diagram::handle.")
    )]
    ArrowInvalidHandle {
        index: usize,
        side: &'static str,
        node: String,
        node_type: NodeType,
        handle: HandleLabel,
    },

    /// An explicit handle entry references a node label not in the document.
    #[error("handle entry references unknown node {node:?}")]
    #[diagnostic(code(diaflow::convert::handle_unknown_node))]
    HandleUnknownNode { node: String },

    /// The rebuilt diagram failed structural validation.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Diagram(#[from] DiagramError),
}

/// One persisted-format implementation: parses and renders the shared
/// portable document.
pub trait FormatStrategy: Send + Sync {
    /// Which format this strategy implements.
    fn format(&self) -> DiagramFormat;

    /// Cheap syntactic sniff used before full parse during detection.
    fn quick_match(&self, content: &str) -> bool;

    /// Parse content into the portable document.
    fn parse(&self, content: &str) -> Result<PortableDiagram, ConvertError>;

    /// Render the portable document into this format.
    fn render(&self, doc: &PortableDiagram) -> Result<String, ConvertError>;
}

/// Registry of format strategies plus the import/export passes.
///
/// A converter owns no per-document state; label tracking lives inside a
/// single export call. One instance can serve many sequential conversions
/// but is not meant to be shared across concurrent calls mid-document.
#[derive(Default)]
pub struct DiagramConverter {
    native: NativeJsonStrategy,
    light: LightYamlStrategy,
    readable: ReadableYamlStrategy,
}

impl DiagramConverter {
    /// A converter with the three built-in formats registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn strategy(&self, format: DiagramFormat) -> &dyn FormatStrategy {
        match format {
            DiagramFormat::Native => &self.native,
            DiagramFormat::Light => &self.light,
            DiagramFormat::Readable => &self.readable,
        }
    }

    fn strategies(&self) -> [&dyn FormatStrategy; 3] {
        [&self.native, &self.light, &self.readable]
    }

    /// Export `diagram` into the given format.
    pub fn serialize(
        &self,
        diagram: &Diagram,
        format: DiagramFormat,
    ) -> Result<String, ConvertError> {
        let doc = to_portable(diagram);
        self.strategy(format).render(&doc)
    }

    /// Import a document, auto-detecting the format when none is given.
    pub fn deserialize(
        &self,
        content: &str,
        format: Option<DiagramFormat>,
    ) -> Result<Diagram, ConvertError> {
        let format = match format {
            Some(format) => format,
            None => self.detect_format(content).ok_or(ConvertError::DetectFailed)?,
        };
        let doc = self.strategy(format).parse(content)?;
        from_portable(&doc)
    }

    /// Detect the format of `content`: quick matches first, then a full
    /// parse probe in registration order.
    #[must_use]
    pub fn detect_format(&self, content: &str) -> Option<DiagramFormat> {
        let strategies = self.strategies();
        if let Some(strategy) = strategies.iter().find(|s| s.quick_match(content)) {
            return Some(strategy.format());
        }
        strategies
            .iter()
            .find(|s| s.parse(content).is_ok())
            .map(|s| s.format())
    }

    /// Re-encode a document from one format to another.
    pub fn convert(
        &self,
        content: &str,
        from: DiagramFormat,
        to: DiagramFormat,
    ) -> Result<String, ConvertError> {
        let diagram = self.deserialize(content, Some(from))?;
        self.serialize(&diagram, to)
    }
}
