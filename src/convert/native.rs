//! The native JSON format: full-fidelity portable document.

use super::portable::PortableDiagram;
use super::{ConvertError, FormatStrategy};
use crate::types::DiagramFormat;

/// Native JSON: the portable document serialized verbatim, including the
/// explicit handle array the YAML forms elide.
#[derive(Default)]
pub struct NativeJsonStrategy;

impl FormatStrategy for NativeJsonStrategy {
    fn format(&self) -> DiagramFormat {
        DiagramFormat::Native
    }

    fn quick_match(&self, content: &str) -> bool {
        let trimmed = content.trim_start();
        trimmed.starts_with('{') && trimmed.contains("\"nodes\"")
    }

    fn parse(&self, content: &str) -> Result<PortableDiagram, ConvertError> {
        serde_json::from_str(content).map_err(|source| ConvertError::Json {
            context: "failed to parse native diagram JSON",
            source,
        })
    }

    fn render(&self, doc: &PortableDiagram) -> Result<String, ConvertError> {
        serde_json::to_string_pretty(doc).map_err(|source| ConvertError::Json {
            context: "failed to render native diagram JSON",
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_match_requires_json_object_with_nodes() {
        let strategy = NativeJsonStrategy;
        assert!(strategy.quick_match(r#"{"version":"2.0.0","nodes":[]}"#));
        assert!(!strategy.quick_match("nodes:\n  Start:\n"));
        assert!(!strategy.quick_match("[1, 2, 3]"));
    }

    #[test]
    fn parse_render_round_trip() {
        let strategy = NativeJsonStrategy;
        let doc = PortableDiagram {
            version: "2.0.0".into(),
            ..Default::default()
        };
        let text = strategy.render(&doc).unwrap();
        let back = strategy.parse(&text).unwrap();
        assert_eq!(back, doc);
    }
}
