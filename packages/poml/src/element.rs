//! Element kinds, ids and the lightweight handles that index the typed
//! collections of a [`Document`](crate::Document).

use crate::ast::{Attribute, Output};
use crate::diagram::{DiagramCamera, DiagramGraph, DiagramLayer};
use crate::payload::Payload;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Closed set of tag categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    Meta,
    Role,
    Task,
    Input,
    Document,
    Style,
    Hint,
    Example,
    ContentPart,
    OutputFormat,
    HumanMsg,
    AssistantMsg,
    SystemMsg,
    ToolDefinition,
    ToolRequest,
    ToolResponse,
    ToolResult,
    ToolError,
    OutputSchema,
    Runtime,
    Image,
    Audio,
    Video,
    Object,
    Diagram,
    Unknown,
}

impl ElementKind {
    pub const ALL: [ElementKind; 26] = [
        ElementKind::Meta,
        ElementKind::Role,
        ElementKind::Task,
        ElementKind::Input,
        ElementKind::Document,
        ElementKind::Style,
        ElementKind::Hint,
        ElementKind::Example,
        ElementKind::ContentPart,
        ElementKind::OutputFormat,
        ElementKind::HumanMsg,
        ElementKind::AssistantMsg,
        ElementKind::SystemMsg,
        ElementKind::ToolDefinition,
        ElementKind::ToolRequest,
        ElementKind::ToolResponse,
        ElementKind::ToolResult,
        ElementKind::ToolError,
        ElementKind::OutputSchema,
        ElementKind::Runtime,
        ElementKind::Image,
        ElementKind::Audio,
        ElementKind::Video,
        ElementKind::Object,
        ElementKind::Diagram,
        ElementKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Meta => "meta",
            ElementKind::Role => "role",
            ElementKind::Task => "task",
            ElementKind::Input => "input",
            ElementKind::Document => "document",
            ElementKind::Style => "style",
            ElementKind::Hint => "hint",
            ElementKind::Example => "example",
            ElementKind::ContentPart => "cp",
            ElementKind::OutputFormat => "output-format",
            ElementKind::HumanMsg => "human-msg",
            ElementKind::AssistantMsg => "assistant-msg",
            ElementKind::SystemMsg => "system-msg",
            ElementKind::ToolDefinition => "tool-definition",
            ElementKind::ToolRequest => "tool-request",
            ElementKind::ToolResponse => "tool-response",
            ElementKind::ToolResult => "tool-result",
            ElementKind::ToolError => "tool-error",
            ElementKind::OutputSchema => "output-schema",
            ElementKind::Runtime => "runtime",
            ElementKind::Image => "img",
            ElementKind::Audio => "audio",
            ElementKind::Video => "video",
            ElementKind::Object => "object",
            ElementKind::Diagram => "diagram",
            ElementKind::Unknown => "unknown",
        }
    }

    /// Canonical tag spelling. `None` for unknown elements.
    pub fn tag_name(&self) -> Option<&'static str> {
        match self {
            ElementKind::Unknown => None,
            other => Some(other.as_str()),
        }
    }

    /// Resolve a tag name, including the accepted aliases
    pub fn from_tag(name: &str) -> ElementKind {
        match name {
            "Document" => ElementKind::Document,
            "ai-msg" => ElementKind::AssistantMsg,
            "tool" => ElementKind::ToolDefinition,
            "Object" => ElementKind::Object,
            "unknown" => ElementKind::Unknown,
            _ => ElementKind::ALL
                .iter()
                .copied()
                .find(|kind| kind.as_str() == name)
                .unwrap_or(ElementKind::Unknown),
        }
    }

    /// Whether `name` is a spelling this kind may serialize under
    pub fn accepts_tag(&self, name: &str) -> bool {
        *self != ElementKind::Unknown && ElementKind::from_tag(name) == *self
    }

    /// Kinds of which at most one instance is structurally meaningful
    pub fn is_singleton(&self) -> bool {
        matches!(
            self,
            ElementKind::Meta | ElementKind::Role | ElementKind::OutputSchema
        )
    }

    pub fn is_message(&self) -> bool {
        matches!(
            self,
            ElementKind::HumanMsg | ElementKind::AssistantMsg | ElementKind::SystemMsg
        )
    }

    /// Typed collection holding this kind's payloads
    pub(crate) fn collection(&self) -> Option<Collection> {
        let collection = match self {
            ElementKind::Task => Collection::Tasks,
            ElementKind::Input => Collection::Inputs,
            ElementKind::Document => Collection::Documents,
            ElementKind::Style => Collection::Styles,
            ElementKind::Hint => Collection::Hints,
            ElementKind::Example => Collection::Examples,
            ElementKind::ContentPart => Collection::ContentParts,
            ElementKind::OutputFormat => Collection::OutputFormats,
            ElementKind::HumanMsg | ElementKind::AssistantMsg | ElementKind::SystemMsg => {
                Collection::Messages
            }
            ElementKind::ToolDefinition => Collection::ToolDefinitions,
            ElementKind::ToolRequest => Collection::ToolRequests,
            ElementKind::ToolResponse => Collection::ToolResponses,
            ElementKind::ToolResult => Collection::ToolResults,
            ElementKind::ToolError => Collection::ToolErrors,
            ElementKind::Runtime => Collection::Runtimes,
            ElementKind::Image => Collection::Images,
            ElementKind::Audio => Collection::Audios,
            ElementKind::Video => Collection::Videos,
            ElementKind::Object => Collection::Objects,
            ElementKind::Diagram => Collection::Diagrams,
            ElementKind::Meta
            | ElementKind::Role
            | ElementKind::OutputSchema
            | ElementKind::Unknown => return None,
        };
        Some(collection)
    }

    /// Position in the canonical serialization order. Message kinds share
    /// a rank so they keep their collection order.
    pub fn canonical_rank(&self) -> usize {
        match self {
            ElementKind::AssistantMsg | ElementKind::SystemMsg => ElementKind::HumanMsg as usize,
            other => *other as usize,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The growable typed collections of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Collection {
    Tasks,
    Inputs,
    Documents,
    Styles,
    Hints,
    Examples,
    ContentParts,
    OutputFormats,
    Messages,
    ToolDefinitions,
    ToolRequests,
    ToolResponses,
    ToolResults,
    ToolErrors,
    Runtimes,
    Images,
    Audios,
    Videos,
    Objects,
    Diagrams,
}

/// Stable element id, unique for the lifetime of its document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub const ROOT: &'static str = "root";

    pub(crate) fn from_counter(count: u64) -> Self {
        Self(format!("el-{}", count))
    }

    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ElementId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ElementId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ElementId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Handle to one child of the document root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub kind: ElementKind,
    /// Index into the kind's typed collection; `None` for singletons and
    /// unknown elements
    pub slot_index: Option<usize>,
    /// Tag spelling used in the source (aliases, unknown tag names)
    pub display_name: String,
    /// Verbatim markup of an unknown element, or of a singleton section
    /// shadowed by a later occurrence
    pub raw_text: String,
    pub id: ElementId,
    pub parent_id: ElementId,
    pub leading_trivia: String,
    pub trailing_trivia: String,
    #[serde(skip)]
    pub(crate) markup: Option<Box<Markup>>,
}

impl Element {
    pub(crate) fn new(kind: ElementKind, slot_index: Option<usize>, id: ElementId) -> Self {
        Self {
            kind,
            slot_index,
            display_name: kind.tag_name().unwrap_or_default().to_string(),
            raw_text: String::new(),
            id,
            parent_id: ElementId::root(),
            leading_trivia: String::new(),
            trailing_trivia: String::new(),
            markup: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == ElementKind::Unknown
    }

    /// Tag name to serialize under: the recorded spelling when the kind
    /// accepts it, else the canonical one
    pub fn tag_name(&self) -> &str {
        match self.kind.tag_name() {
            Some(canonical) if !self.kind.accepts_tag(&self.display_name) => canonical,
            Some(_) => &self.display_name,
            None => &self.display_name,
        }
    }

    /// Whether the parser recorded source markup for this element
    pub fn has_source_markup(&self) -> bool {
        self.markup.is_some()
    }
}

/// Source text recorded for an element in fidelity mode
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Markup {
    /// Canonical attributes as parsed, to detect edits
    pub attributes: Vec<Attribute>,
    /// Start tag text without the closing `>` or `/>`
    pub head: String,
    pub self_closing: bool,
    /// End tag text, empty when self-closing
    pub tail: String,
    pub inner: Option<InnerMarkup>,
}

/// Verbatim inner markup of a structured element
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InnerMarkup {
    pub snapshot: InnerSnapshot,
    pub raw: String,
}

/// Typed values an element's inner markup encoded when it was parsed
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InnerSnapshot {
    Meta {
        id: String,
        version: String,
        owner: String,
    },
    Style(Vec<Output>),
    Diagram {
        graph: DiagramGraph,
        layers: Vec<DiagramLayer>,
        camera: Option<DiagramCamera>,
    },
    /// Content the model does not decode; always re-emitted as written
    Opaque,
}

impl InnerSnapshot {
    pub fn capture(payload: &Payload<'_>) -> Option<Self> {
        match payload {
            Payload::Meta(meta) => Some(InnerSnapshot::Meta {
                id: meta.id.clone(),
                version: meta.version.clone(),
                owner: meta.owner.clone(),
            }),
            Payload::Style(style) => Some(InnerSnapshot::Style(style.outputs.clone())),
            Payload::Diagram(diagram) => Some(InnerSnapshot::Diagram {
                graph: diagram.graph.clone(),
                layers: diagram.layers.clone(),
                camera: diagram.camera.clone(),
            }),
            Payload::Runtime(_) => Some(InnerSnapshot::Opaque),
            _ => None,
        }
    }

    pub fn matches(&self, payload: &Payload<'_>) -> bool {
        match (self, payload) {
            (
                InnerSnapshot::Meta { id, version, owner },
                Payload::Meta(meta),
            ) => *id == meta.id && *version == meta.version && *owner == meta.owner,
            (InnerSnapshot::Style(outputs), Payload::Style(style)) => *outputs == style.outputs,
            (
                InnerSnapshot::Diagram {
                    graph,
                    layers,
                    camera,
                },
                Payload::Diagram(diagram),
            ) => *graph == diagram.graph && *layers == diagram.layers && *camera == diagram.camera,
            (InnerSnapshot::Opaque, Payload::Runtime(_)) => true,
            _ => false,
        }
    }
}
