//! Typed views over element payloads
//!
//! [`Payload`] borrows the record an element points at, [`PayloadMut`]
//! borrows it mutably and [`ElementData`] owns one (used when building or
//! inserting). Exactly one variant is populated, matching the element kind.

use crate::ast::*;
use crate::diagram::Diagram;
use crate::element::ElementKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload<'a> {
    Meta(&'a Meta),
    Role(&'a Block),
    Task(&'a Block),
    Input(&'a Input),
    Document(&'a DocRef),
    Style(&'a Style),
    Hint(&'a Block),
    Example(&'a Block),
    ContentPart(&'a Block),
    OutputFormat(&'a Block),
    Message(&'a Message),
    ToolDefinition(&'a ToolDefinition),
    ToolRequest(&'a ToolRequest),
    ToolResponse(&'a ToolReply),
    ToolResult(&'a ToolReply),
    ToolError(&'a ToolReply),
    OutputSchema(&'a OutputSchema),
    Runtime(&'a Runtime),
    Image(&'a Media),
    Audio(&'a Media),
    Video(&'a Media),
    Object(&'a ObjectTag),
    Diagram(&'a Diagram),
    /// Verbatim markup of an element the model does not understand
    Unknown(&'a str),
}

impl<'a> Payload<'a> {
    pub fn kind(&self) -> ElementKind {
        match self {
            Payload::Meta(_) => ElementKind::Meta,
            Payload::Role(_) => ElementKind::Role,
            Payload::Task(_) => ElementKind::Task,
            Payload::Input(_) => ElementKind::Input,
            Payload::Document(_) => ElementKind::Document,
            Payload::Style(_) => ElementKind::Style,
            Payload::Hint(_) => ElementKind::Hint,
            Payload::Example(_) => ElementKind::Example,
            Payload::ContentPart(_) => ElementKind::ContentPart,
            Payload::OutputFormat(_) => ElementKind::OutputFormat,
            Payload::Message(msg) => message_kind(msg.role),
            Payload::ToolDefinition(_) => ElementKind::ToolDefinition,
            Payload::ToolRequest(_) => ElementKind::ToolRequest,
            Payload::ToolResponse(_) => ElementKind::ToolResponse,
            Payload::ToolResult(_) => ElementKind::ToolResult,
            Payload::ToolError(_) => ElementKind::ToolError,
            Payload::OutputSchema(_) => ElementKind::OutputSchema,
            Payload::Runtime(_) => ElementKind::Runtime,
            Payload::Image(_) => ElementKind::Image,
            Payload::Audio(_) => ElementKind::Audio,
            Payload::Video(_) => ElementKind::Video,
            Payload::Object(_) => ElementKind::Object,
            Payload::Diagram(_) => ElementKind::Diagram,
            Payload::Unknown(_) => ElementKind::Unknown,
        }
    }

    /// Raw textual body, for kinds that carry one
    pub fn body(&self) -> Option<&'a str> {
        let body = match *self {
            Payload::Role(b)
            | Payload::Task(b)
            | Payload::Hint(b)
            | Payload::Example(b)
            | Payload::ContentPart(b)
            | Payload::OutputFormat(b) => &b.body,
            Payload::Input(input) => &input.body,
            Payload::Document(doc) => &doc.body,
            Payload::Style(style) => &style.outputs.first()?.body,
            Payload::Message(msg) => &msg.body,
            Payload::ToolDefinition(def) => &def.body,
            Payload::ToolRequest(req) => &req.body,
            Payload::ToolResponse(r) | Payload::ToolResult(r) | Payload::ToolError(r) => &r.body,
            Payload::OutputSchema(schema) => &schema.body,
            Payload::Image(m) | Payload::Audio(m) | Payload::Video(m) => &m.body,
            Payload::Object(obj) => &obj.body,
            Payload::Meta(_) | Payload::Runtime(_) | Payload::Diagram(_) | Payload::Unknown(_) => {
                return None
            }
        };
        Some(body.as_str())
    }

    pub fn canonical_attributes(&self) -> Vec<Attribute> {
        match self {
            Payload::Meta(meta) => meta.canonical_attributes(),
            Payload::Role(b)
            | Payload::Task(b)
            | Payload::Hint(b)
            | Payload::Example(b)
            | Payload::ContentPart(b)
            | Payload::OutputFormat(b) => b.canonical_attributes(),
            Payload::Input(input) => input.canonical_attributes(),
            Payload::Document(doc) => doc.canonical_attributes(),
            Payload::Style(style) => style.canonical_attributes(),
            Payload::Message(msg) => msg.canonical_attributes(),
            Payload::ToolDefinition(def) => def.canonical_attributes(),
            Payload::ToolRequest(req) => req.canonical_attributes(),
            Payload::ToolResponse(r) | Payload::ToolResult(r) | Payload::ToolError(r) => {
                r.canonical_attributes()
            }
            Payload::OutputSchema(schema) => schema.canonical_attributes(),
            Payload::Runtime(runtime) => runtime.canonical_attributes(),
            Payload::Image(m) | Payload::Audio(m) | Payload::Video(m) => m.canonical_attributes(),
            Payload::Object(obj) => obj.canonical_attributes(),
            Payload::Diagram(diagram) => diagram.canonical_attributes(),
            Payload::Unknown(_) => Vec::new(),
        }
    }

    /// Owned copy of the record
    pub fn to_data(&self) -> ElementData {
        match *self {
            Payload::Meta(v) => ElementData::Meta(v.clone()),
            Payload::Role(v) => ElementData::Role(v.clone()),
            Payload::Task(v) => ElementData::Task(v.clone()),
            Payload::Input(v) => ElementData::Input(v.clone()),
            Payload::Document(v) => ElementData::Document(v.clone()),
            Payload::Style(v) => ElementData::Style(v.clone()),
            Payload::Hint(v) => ElementData::Hint(v.clone()),
            Payload::Example(v) => ElementData::Example(v.clone()),
            Payload::ContentPart(v) => ElementData::ContentPart(v.clone()),
            Payload::OutputFormat(v) => ElementData::OutputFormat(v.clone()),
            Payload::Message(v) => ElementData::Message(v.clone()),
            Payload::ToolDefinition(v) => ElementData::ToolDefinition(v.clone()),
            Payload::ToolRequest(v) => ElementData::ToolRequest(v.clone()),
            Payload::ToolResponse(v) => ElementData::ToolResponse(v.clone()),
            Payload::ToolResult(v) => ElementData::ToolResult(v.clone()),
            Payload::ToolError(v) => ElementData::ToolError(v.clone()),
            Payload::OutputSchema(v) => ElementData::OutputSchema(v.clone()),
            Payload::Runtime(v) => ElementData::Runtime(v.clone()),
            Payload::Image(v) => ElementData::Image(v.clone()),
            Payload::Audio(v) => ElementData::Audio(v.clone()),
            Payload::Video(v) => ElementData::Video(v.clone()),
            Payload::Object(v) => ElementData::Object(v.clone()),
            Payload::Diagram(v) => ElementData::Diagram(v.clone()),
            Payload::Unknown(raw) => ElementData::Unknown {
                name: String::new(),
                raw: raw.to_string(),
            },
        }
    }
}

/// Mutable view of an element's record
#[derive(Debug)]
pub enum PayloadMut<'a> {
    Meta(&'a mut Meta),
    Role(&'a mut Block),
    Task(&'a mut Block),
    Input(&'a mut Input),
    Document(&'a mut DocRef),
    Style(&'a mut Style),
    Hint(&'a mut Block),
    Example(&'a mut Block),
    ContentPart(&'a mut Block),
    OutputFormat(&'a mut Block),
    Message(&'a mut Message),
    ToolDefinition(&'a mut ToolDefinition),
    ToolRequest(&'a mut ToolRequest),
    ToolResponse(&'a mut ToolReply),
    ToolResult(&'a mut ToolReply),
    ToolError(&'a mut ToolReply),
    OutputSchema(&'a mut OutputSchema),
    Runtime(&'a mut Runtime),
    Image(&'a mut Media),
    Audio(&'a mut Media),
    Video(&'a mut Media),
    Object(&'a mut ObjectTag),
    Diagram(&'a mut Diagram),
}

impl<'a> PayloadMut<'a> {
    /// Mutable textual body, for kinds that carry one. A style exposes the
    /// body of its first output.
    pub fn body_mut(self) -> Option<&'a mut String> {
        let body = match self {
            PayloadMut::Role(b)
            | PayloadMut::Task(b)
            | PayloadMut::Hint(b)
            | PayloadMut::Example(b)
            | PayloadMut::ContentPart(b)
            | PayloadMut::OutputFormat(b) => &mut b.body,
            PayloadMut::Input(input) => &mut input.body,
            PayloadMut::Document(doc) => &mut doc.body,
            PayloadMut::Style(style) => &mut style.outputs.first_mut()?.body,
            PayloadMut::Message(msg) => &mut msg.body,
            PayloadMut::ToolDefinition(def) => &mut def.body,
            PayloadMut::ToolRequest(req) => &mut req.body,
            PayloadMut::ToolResponse(r) | PayloadMut::ToolResult(r) | PayloadMut::ToolError(r) => {
                &mut r.body
            }
            PayloadMut::OutputSchema(schema) => &mut schema.body,
            PayloadMut::Image(m) | PayloadMut::Audio(m) | PayloadMut::Video(m) => &mut m.body,
            PayloadMut::Object(obj) => &mut obj.body,
            PayloadMut::Meta(_) | PayloadMut::Runtime(_) | PayloadMut::Diagram(_) => return None,
        };
        Some(body)
    }
}

/// An owned record, used to build documents and to insert elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementData {
    Meta(Meta),
    Role(Block),
    Task(Block),
    Input(Input),
    Document(DocRef),
    Style(Style),
    Hint(Block),
    Example(Block),
    ContentPart(Block),
    OutputFormat(Block),
    Message(Message),
    ToolDefinition(ToolDefinition),
    ToolRequest(ToolRequest),
    ToolResponse(ToolReply),
    ToolResult(ToolReply),
    ToolError(ToolReply),
    OutputSchema(OutputSchema),
    Runtime(Runtime),
    Image(Media),
    Audio(Media),
    Video(Media),
    Object(ObjectTag),
    Diagram(Diagram),
    /// Markup kept verbatim under the given tag name
    Unknown { name: String, raw: String },
}

impl ElementData {
    pub fn role(body: impl Into<String>) -> Self {
        ElementData::Role(Block::new(body))
    }

    pub fn task(body: impl Into<String>) -> Self {
        ElementData::Task(Block::new(body))
    }

    pub fn hint(body: impl Into<String>) -> Self {
        ElementData::Hint(Block::new(body))
    }

    pub fn input(name: impl Into<String>, required: bool, body: impl Into<String>) -> Self {
        ElementData::Input(Input::new(name, required, body))
    }

    pub fn message(role: MessageRole, body: impl Into<String>) -> Self {
        ElementData::Message(Message::new(role, body))
    }

    pub fn unknown(name: impl Into<String>, raw: impl Into<String>) -> Self {
        ElementData::Unknown {
            name: name.into(),
            raw: raw.into(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            ElementData::Meta(_) => ElementKind::Meta,
            ElementData::Role(_) => ElementKind::Role,
            ElementData::Task(_) => ElementKind::Task,
            ElementData::Input(_) => ElementKind::Input,
            ElementData::Document(_) => ElementKind::Document,
            ElementData::Style(_) => ElementKind::Style,
            ElementData::Hint(_) => ElementKind::Hint,
            ElementData::Example(_) => ElementKind::Example,
            ElementData::ContentPart(_) => ElementKind::ContentPart,
            ElementData::OutputFormat(_) => ElementKind::OutputFormat,
            ElementData::Message(msg) => message_kind(msg.role),
            ElementData::ToolDefinition(_) => ElementKind::ToolDefinition,
            ElementData::ToolRequest(_) => ElementKind::ToolRequest,
            ElementData::ToolResponse(_) => ElementKind::ToolResponse,
            ElementData::ToolResult(_) => ElementKind::ToolResult,
            ElementData::ToolError(_) => ElementKind::ToolError,
            ElementData::OutputSchema(_) => ElementKind::OutputSchema,
            ElementData::Runtime(_) => ElementKind::Runtime,
            ElementData::Image(_) => ElementKind::Image,
            ElementData::Audio(_) => ElementKind::Audio,
            ElementData::Video(_) => ElementKind::Video,
            ElementData::Object(_) => ElementKind::Object,
            ElementData::Diagram(_) => ElementKind::Diagram,
            ElementData::Unknown { .. } => ElementKind::Unknown,
        }
    }
}

pub(crate) fn message_kind(role: MessageRole) -> ElementKind {
    match role {
        MessageRole::Human => ElementKind::HumanMsg,
        MessageRole::Assistant => ElementKind::AssistantMsg,
        MessageRole::System => ElementKind::SystemMsg,
    }
}
