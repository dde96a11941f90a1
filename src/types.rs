//! Core domain types for the diaflow diagram model.
//!
//! This module defines the closed enums used throughout the system to tag
//! nodes, handles, arrows, and service integrations. These are the core
//! domain concepts that define what a diagram *is*.
//!
//! For execution-side types (statuses, event tags), see [`crate::execution`].
//!
//! # Boundary validation
//!
//! Every enum here corresponds to a string tag in the persisted and wire
//! formats. Parsing is strict: an unknown tag is a [`ParseTagError`], never a
//! silent fallback. Payloads are validated into these types once, at the
//! deserialization boundary, and trusted downstream.
//!
//! # Examples
//!
//! ```rust
//! use diaflow::types::{NodeType, HandleLabel, ContentType};
//!
//! let kind: NodeType = "person_job".parse().unwrap();
//! assert_eq!(kind, NodeType::PersonJob);
//! assert_eq!(kind.as_str(), "person_job");
//!
//! // Unknown tags are rejected, not coerced.
//! assert!("teleport_job".parse::<NodeType>().is_err());
//!
//! let payload = ContentType::ConversationState;
//! assert_eq!(payload.to_string(), "conversation_state");
//! assert!(HandleLabel::Condtrue.is_branch());
//! ```

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a persisted or wire string tag does not match any
/// variant of the target enum.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("unknown {what} tag: {value:?}")]
#[diagnostic(
    code(diaflow::types::unknown_tag),
    help("Check the document against the supported tag set for this field.")
)]
pub struct ParseTagError {
    /// Human name of the enum being parsed (e.g. `"node type"`).
    pub what: &'static str,
    /// The offending input.
    pub value: String,
}

impl ParseTagError {
    fn new(what: &'static str, value: impl Into<String>) -> Self {
        Self {
            what,
            value: value.into(),
        }
    }
}

macro_rules! tag_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($what:literal) {
            $($(#[$vmeta:meta])* $variant:ident => $tag:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $tag)] $variant),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The wire/persisted string tag for this variant.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseTagError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($name::$variant),)+
                    other => Err(ParseTagError::new($what, other)),
                }
            }
        }
    };
}

tag_enum! {
    /// Identifies the kind of a node within a diagram.
    ///
    /// Every node carries exactly one `NodeType`, and the type determines
    /// which [`crate::diagram::NodeData`] variant its payload must be and
    /// which handles it exposes (see [`crate::diagram::handle`]).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use diaflow::types::NodeType;
    ///
    /// assert!(NodeType::Start.is_entry());
    /// assert!(NodeType::Endpoint.is_terminal());
    /// assert!(NodeType::PersonJob.uses_person());
    /// ```
    NodeType ("node type") {
        /// Entry point of a diagram; no inputs.
        Start => "start",
        /// A single LLM-agent job bound to a person.
        PersonJob => "person_job",
        /// Batched variant of a person job (one prompt fanned over a dataset).
        PersonBatchJob => "person_batch_job",
        /// Boolean branch; routes along `condtrue`/`condfalse` handles.
        Condition => "condition",
        /// Executes a code snippet in a supported language.
        CodeJob => "code_job",
        /// Calls an external HTTP API.
        ApiJob => "api_job",
        /// Terminal node; optionally saves the final payload to a file.
        Endpoint => "endpoint",
        /// Reads from a data source (file, fixed prompt, code, api tool).
        Db => "db",
        /// Pauses execution and waits for a human response.
        UserResponse => "user_response",
        /// Notion page/database operation.
        Notion => "notion",
        /// Fires a shell/webhook/python/file hook.
        Hook => "hook",
        /// Renders a template against upstream inputs.
        TemplateJob => "template_job",
        /// Validates upstream payload against a JSON schema.
        JsonSchemaValidator => "json_schema_validator",
        /// Parses TypeScript source into an AST payload.
        TypescriptAst => "typescript_ast",
        /// Runs another diagram as a nested execution.
        SubDiagram => "sub_diagram",
    }
}

impl NodeType {
    /// Returns `true` for the diagram entry node.
    #[must_use]
    pub fn is_entry(&self) -> bool {
        matches!(self, NodeType::Start)
    }

    /// Returns `true` for nodes that end a branch (no outgoing handles).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeType::Endpoint)
    }

    /// Returns `true` for node kinds whose payload references a person.
    #[must_use]
    pub fn uses_person(&self) -> bool {
        matches!(self, NodeType::PersonJob | NodeType::PersonBatchJob)
    }
}

tag_enum! {
    /// Direction of a node handle.
    HandleDirection ("handle direction") {
        Input => "input",
        Output => "output",
    }
}

tag_enum! {
    /// Named ports that arrows attach to.
    ///
    /// The set of labels valid for a given node is determined by its
    /// [`NodeType`]; see [`crate::diagram::handle::valid_handles`].
    HandleLabel ("handle label") {
        /// The default input/output port present on most nodes.
        Default => "default",
        /// First-iteration-only input on person jobs.
        First => "first",
        /// True branch output of a condition node.
        Condtrue => "condtrue",
        /// False branch output of a condition node.
        Condfalse => "condfalse",
        /// Success output of fallible nodes (api_job, hook).
        Success => "success",
        /// Error output of fallible nodes.
        Error => "error",
        /// Aggregated results output of batch nodes.
        Results => "results",
    }
}

impl HandleLabel {
    /// Returns `true` for the condition-branch outputs.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self, HandleLabel::Condtrue | HandleLabel::Condfalse)
    }
}

tag_enum! {
    /// Declared data type of a handle.
    DataType ("data type") {
        Any => "any",
        String => "string",
        Number => "number",
        Boolean => "boolean",
        Object => "object",
        Array => "array",
    }
}

tag_enum! {
    /// Semantic payload tag carried by an arrow.
    ContentType ("content type") {
        /// Plain text flowing between nodes.
        RawText => "raw_text",
        /// Full conversation state handed to the next person job.
        ConversationState => "conversation_state",
        /// Structured object payload.
        Object => "object",
    }
}

tag_enum! {
    /// LLM service providers a person can be configured against.
    LlmService ("llm service") {
        Openai => "openai",
        Anthropic => "anthropic",
        Google => "google",
        Bedrock => "bedrock",
        Vertex => "vertex",
        Deepseek => "deepseek",
    }
}

tag_enum! {
    /// All API services an api key can belong to, LLM providers included.
    ApiService ("api service") {
        Openai => "openai",
        Anthropic => "anthropic",
        Google => "google",
        Gemini => "gemini",
        Bedrock => "bedrock",
        Vertex => "vertex",
        Deepseek => "deepseek",
        Notion => "notion",
        GoogleSearch => "google_search",
        Slack => "slack",
        Github => "github",
        Jira => "jira",
    }
}

impl ApiService {
    /// Returns the equivalent [`LlmService`] when this service is an LLM
    /// provider.
    #[must_use]
    pub fn as_llm(&self) -> Option<LlmService> {
        match self {
            ApiService::Openai => Some(LlmService::Openai),
            ApiService::Anthropic => Some(LlmService::Anthropic),
            ApiService::Google | ApiService::Gemini => Some(LlmService::Google),
            ApiService::Bedrock => Some(LlmService::Bedrock),
            ApiService::Vertex => Some(LlmService::Vertex),
            ApiService::Deepseek => Some(LlmService::Deepseek),
            _ => None,
        }
    }
}

tag_enum! {
    /// Conversation-memory policy of a person.
    ForgettingMode ("forgetting mode") {
        NoForget => "no_forget",
        OnEveryTurn => "on_every_turn",
        UponRequest => "upon_request",
    }
}

impl Default for ForgettingMode {
    fn default() -> Self {
        ForgettingMode::NoForget
    }
}

tag_enum! {
    /// Data-source flavor of a db node.
    DbBlockSubType ("db block sub type") {
        FixedPrompt => "fixed_prompt",
        File => "file",
        Code => "code",
        ApiTool => "api_tool",
    }
}

tag_enum! {
    /// Languages a code_job node can execute.
    SupportedLanguage ("supported language") {
        Python => "python",
        Typescript => "typescript",
        Bash => "bash",
        Shell => "shell",
    }
}

tag_enum! {
    /// HTTP methods for api_job nodes.
    HttpMethod ("http method") {
        Get => "GET",
        Post => "POST",
        Put => "PUT",
        Delete => "DELETE",
        Patch => "PATCH",
    }
}

tag_enum! {
    /// Notion API operations a notion node can perform.
    NotionOperation ("notion operation") {
        CreatePage => "create_page",
        UpdatePage => "update_page",
        ReadPage => "read_page",
        DeletePage => "delete_page",
        CreateDatabase => "create_database",
        QueryDatabase => "query_database",
        UpdateDatabase => "update_database",
    }
}

tag_enum! {
    /// Kinds of hook a hook node can fire.
    HookType ("hook type") {
        Shell => "shell",
        Webhook => "webhook",
        Python => "python",
        File => "file",
    }
}

tag_enum! {
    /// When a hook node fires.
    HookTriggerMode ("hook trigger mode") {
        Manual => "manual",
        Hook => "hook",
    }
}

tag_enum! {
    /// Persisted diagram document formats.
    ///
    /// `native` is the full-fidelity JSON form; `light` and `readable` are
    /// the label-keyed YAML forms meant for hand editing and review.
    DiagramFormat ("diagram format") {
        Native => "native",
        Light => "light",
        Readable => "readable",
    }
}
