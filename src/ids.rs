//! Typed identifiers for diagram entities.
//!
//! Every entity in a diagram is addressed by a string ID. IDs generated by
//! this crate are UUID-backed with a short typed prefix (`node_1a2b3c4d`),
//! but imported documents may carry arbitrary strings; the newtypes here
//! only guarantee that a `NodeId` is never confused with a `PersonId` at a
//! call site.
//!
//! Arrow endpoints use [`HandleRef`], the `node:handle` encoding shared with
//! the persisted formats.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{HandleLabel, ParseTagError};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh prefixed identifier.
            #[must_use]
            pub fn generate() -> Self {
                let uuid = Uuid::new_v4().simple().to_string();
                Self(format!(concat!($prefix, "_{}"), &uuid[..8]))
            }

            /// Borrow the raw string form.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of a node within a diagram.
    NodeId,
    "node"
);
string_id!(
    /// Identifier of an arrow within a diagram.
    ArrowId,
    "arrow"
);
string_id!(
    /// Identifier of a person (LLM agent configuration).
    PersonId,
    "person"
);
string_id!(
    /// Identifier of an api key reference. The raw secret never appears in
    /// the model, only this opaque reference.
    ApiKeyId,
    "apikey"
);
string_id!(
    /// Identifier of one execution run of a diagram.
    ExecutionId,
    "exec"
);

/// Identifier of a handle: always `"{node_id}:{handle_label}"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(String);

impl HandleId {
    /// Compose a handle id from its node and label parts.
    #[must_use]
    pub fn compose(node: &NodeId, label: HandleLabel) -> Self {
        Self(format!("{node}:{label}"))
    }

    /// Wrap an existing handle id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors produced while parsing a `node:handle` endpoint reference.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum HandleRefError {
    /// The reference has no `:` separator or an empty side.
    #[error("malformed handle reference: {value:?}")]
    #[diagnostic(
        code(diaflow::ids::malformed_handle_ref),
        help("Arrow endpoints must look like \"nodeId:handleName\".")
    )]
    Malformed {
        /// The offending input.
        value: String,
    },

    /// The handle-name side is not a known handle label.
    #[error(transparent)]
    #[diagnostic(code(diaflow::ids::unknown_handle_label))]
    UnknownLabel(#[from] ParseTagError),
}

/// An arrow endpoint: a node plus the named handle the arrow attaches to.
///
/// The persisted encoding is `"{node}:{label}"`. The node side is an opaque
/// key at parse time (a generated ID in the native format, a human label in
/// the portable formats); the converter resolves it to a [`NodeId`] in
/// context.
///
/// ```rust
/// use diaflow::ids::HandleRef;
/// use diaflow::types::HandleLabel;
///
/// let r = HandleRef::parse("node_ab12cd34:condtrue").unwrap();
/// assert_eq!(r.label, HandleLabel::Condtrue);
/// assert_eq!(r.to_string(), "node_ab12cd34:condtrue");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandleRef {
    /// The node side of the reference.
    pub node: NodeId,
    /// The handle the arrow attaches to.
    pub label: HandleLabel,
}

impl HandleRef {
    /// Build a reference from parts.
    #[must_use]
    pub fn new(node: NodeId, label: HandleLabel) -> Self {
        Self { node, label }
    }

    /// Parse the `node:handle` encoding.
    ///
    /// Splits on the *last* `:` so node keys containing a colon still parse;
    /// handle labels come from a closed set and never contain one.
    pub fn parse(value: &str) -> Result<Self, HandleRefError> {
        let (node, label) = value.rsplit_once(':').ok_or_else(|| {
            HandleRefError::Malformed {
                value: value.to_string(),
            }
        })?;
        if node.is_empty() || label.is_empty() {
            return Err(HandleRefError::Malformed {
                value: value.to_string(),
            });
        }
        Ok(Self {
            node: NodeId::new(node),
            label: label.parse::<HandleLabel>()?,
        })
    }

    /// The handle id this reference points at.
    #[must_use]
    pub fn handle_id(&self) -> HandleId {
        HandleId::compose(&self.node, self.label)
    }
}

impl fmt::Display for HandleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.label)
    }
}

impl Serialize for HandleRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HandleRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        HandleRef::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_prefix() {
        assert!(NodeId::generate().as_str().starts_with("node_"));
        assert!(ExecutionId::generate().as_str().starts_with("exec_"));
        assert_ne!(NodeId::generate(), NodeId::generate());
    }

    #[test]
    fn handle_ref_parse_and_display() {
        let r = HandleRef::parse("n1:default").unwrap();
        assert_eq!(r.node.as_str(), "n1");
        assert_eq!(r.label, HandleLabel::Default);
        assert_eq!(r.to_string(), "n1:default");
    }

    #[test]
    fn handle_ref_rejects_malformed() {
        assert!(HandleRef::parse("no-separator").is_err());
        assert!(HandleRef::parse(":default").is_err());
        assert!(HandleRef::parse("n1:").is_err());
        assert!(HandleRef::parse("n1:not_a_label").is_err());
    }

    #[test]
    fn handle_ref_splits_on_last_colon() {
        let r = HandleRef::parse("Start: the beginning:condfalse").unwrap();
        assert_eq!(r.node.as_str(), "Start: the beginning");
        assert_eq!(r.label, HandleLabel::Condfalse);
    }

    #[test]
    fn handle_id_composition() {
        let id = HandleId::compose(&NodeId::new("n9"), HandleLabel::Results);
        assert_eq!(id.as_str(), "n9:results");
    }
}
