//! Typed payload records for POML elements
//!
//! One record per tag shape. Attributes a record understands become typed
//! fields; every other attribute is kept in order in `attributes` so that
//! nothing written by an author is dropped on re-encode. Bodies hold the
//! raw inner markup exactly as written.

use crate::json::{parse_lenient, JsonPayload};
use crate::tokenizer::decode_text;
use serde::{Deserialize, Serialize};

/// A single `name="value"` pair, value already entity-decoded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Canonical attribute list of a record: known fields first, then extras
pub trait CanonicalAttributes {
    fn canonical_attributes(&self) -> Vec<Attribute>;
}

/// Attributes of a start tag being split into known fields and extras
pub(crate) struct AttributeSet {
    attributes: Vec<Attribute>,
}

impl AttributeSet {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    /// Remove a known attribute, yielding its value or an empty string
    pub fn take(&mut self, name: &str) -> String {
        self.take_opt(name).unwrap_or_default()
    }

    pub fn take_opt(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|attr| attr.name == name)?;
        Some(self.attributes.remove(idx).value)
    }

    pub fn rest(self) -> Vec<Attribute> {
        self.attributes
    }
}

/// Builder for canonical attribute lists
#[derive(Default)]
pub(crate) struct AttributeList {
    attributes: Vec<Attribute>,
}

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known attributes are only written when non-empty
    pub fn known(mut self, name: &str, value: &str) -> Self {
        if !value.is_empty() {
            self.attributes.push(Attribute::new(name, value));
        }
        self
    }

    pub fn flag(mut self, name: &str, value: Option<bool>) -> Self {
        if let Some(value) = value {
            self.attributes
                .push(Attribute::new(name, if value { "true" } else { "false" }));
        }
        self
    }

    pub fn extend(mut self, extras: &[Attribute]) -> Vec<Attribute> {
        self.attributes.extend(extras.iter().cloned());
        self.attributes
    }
}

/// Boolean attribute values in the spellings authors actually use
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// `<meta>` section with `<id>`, `<version>` and `<owner>` children
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub id: String,
    pub version: String,
    pub owner: String,
    pub attributes: Vec<Attribute>,
}

impl Meta {
    pub fn new(id: impl Into<String>, version: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            owner: owner.into(),
            attributes: Vec::new(),
        }
    }
}

impl CanonicalAttributes for Meta {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        self.attributes.clone()
    }
}

/// Free-form body block: role, task, hint, example, cp, output-format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub body: String,
    pub attributes: Vec<Attribute>,
}

impl Block {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attributes: Vec::new(),
        }
    }

    /// Body as plain text, trimmed
    pub fn text(&self) -> String {
        decode_text(&self.body).trim().to_string()
    }
}

impl CanonicalAttributes for Block {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        self.attributes.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub name: String,
    pub required: bool,
    pub body: String,
    pub attributes: Vec<Attribute>,
}

impl Input {
    pub fn new(name: impl Into<String>, required: bool, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required,
            body: body.into(),
            attributes: Vec::new(),
        }
    }
}

impl CanonicalAttributes for Input {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        AttributeList::new()
            .known("name", &self.name)
            .flag("required", self.required.then_some(true))
            .extend(&self.attributes)
    }
}

/// `<document src="...">` reference to an external source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRef {
    pub src: String,
    pub body: String,
    pub attributes: Vec<Attribute>,
}

impl DocRef {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Default::default()
        }
    }
}

impl CanonicalAttributes for DocRef {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        AttributeList::new()
            .known("src", &self.src)
            .extend(&self.attributes)
    }
}

/// `<style>` block holding `<output format="...">` entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    pub outputs: Vec<Output>,
    pub attributes: Vec<Attribute>,
}

impl Style {
    pub fn new(outputs: Vec<Output>) -> Self {
        Self {
            outputs,
            attributes: Vec::new(),
        }
    }
}

impl CanonicalAttributes for Style {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        self.attributes.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub format: String,
    pub body: String,
    pub attributes: Vec<Attribute>,
}

impl Output {
    pub fn new(format: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            body: body.into(),
            attributes: Vec::new(),
        }
    }
}

impl CanonicalAttributes for Output {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        AttributeList::new()
            .known("format", &self.format)
            .extend(&self.attributes)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    Human,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::Human => "human",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

/// `<human-msg>`, `<assistant-msg>` or `<system-msg>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub body: String,
    pub attributes: Vec<Attribute>,
}

impl Message {
    pub fn new(role: MessageRole, body: impl Into<String>) -> Self {
        Self {
            role,
            body: body.into(),
            attributes: Vec::new(),
        }
    }

    pub fn text(&self) -> String {
        decode_text(&self.body).trim().to_string()
    }
}

impl CanonicalAttributes for Message {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        self.attributes.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub body: String,
    pub attributes: Vec<Attribute>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    /// Parameter schema carried in the body, when it parses as JSON
    pub fn schema(&self) -> JsonPayload {
        parse_lenient(&decode_text(&self.body))
    }
}

impl CanonicalAttributes for ToolDefinition {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        AttributeList::new()
            .known("name", &self.name)
            .known("description", &self.description)
            .extend(&self.attributes)
    }
}

/// A tool call issued by the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    pub parameters: String,
    pub body: String,
    pub attributes: Vec<Attribute>,
}

impl ToolRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters: parameters.into(),
            ..Default::default()
        }
    }

    /// Call arguments from `parameters`, falling back to the body
    pub fn arguments(&self) -> JsonPayload {
        if self.parameters.trim().is_empty() {
            parse_lenient(&decode_text(&self.body))
        } else {
            parse_lenient(&self.parameters)
        }
    }
}

impl CanonicalAttributes for ToolRequest {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        AttributeList::new()
            .known("id", &self.id)
            .known("name", &self.name)
            .known("parameters", &self.parameters)
            .extend(&self.attributes)
    }
}

/// Shared shape of `<tool-response>`, `<tool-result>` and `<tool-error>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolReply {
    pub id: String,
    pub name: String,
    pub body: String,
    pub attributes: Vec<Attribute>,
}

impl ToolReply {
    pub fn new(id: impl Into<String>, name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            body: body.into(),
            attributes: Vec::new(),
        }
    }

    pub fn content(&self) -> JsonPayload {
        parse_lenient(&decode_text(&self.body))
    }
}

impl CanonicalAttributes for ToolReply {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        AttributeList::new()
            .known("id", &self.id)
            .known("name", &self.name)
            .extend(&self.attributes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub body: String,
    pub attributes: Vec<Attribute>,
}

impl OutputSchema {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attributes: Vec::new(),
        }
    }

    pub fn json(&self) -> JsonPayload {
        parse_lenient(&decode_text(&self.body))
    }
}

impl CanonicalAttributes for OutputSchema {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        self.attributes.clone()
    }
}

/// Runtime/model hints, carried entirely in attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runtime {
    pub attributes: Vec<Attribute>,
}

impl Runtime {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

impl CanonicalAttributes for Runtime {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        self.attributes.clone()
    }
}

/// `<img>`, `<audio>` or `<video>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub src: String,
    pub alt: String,
    pub syntax: String,
    pub body: String,
    pub attributes: Vec<Attribute>,
}

impl Media {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Default::default()
        }
    }
}

impl CanonicalAttributes for Media {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        AttributeList::new()
            .known("src", &self.src)
            .known("alt", &self.alt)
            .known("syntax", &self.syntax)
            .extend(&self.attributes)
    }
}

/// `<object>` wrapper around a data payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTag {
    pub data: String,
    pub syntax: String,
    pub body: String,
    pub attributes: Vec<Attribute>,
}

impl ObjectTag {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// The `data` attribute, or the body when no attribute is given
    pub fn json(&self) -> JsonPayload {
        if self.data.trim().is_empty() {
            parse_lenient(&decode_text(&self.body))
        } else {
            parse_lenient(&self.data)
        }
    }
}

impl CanonicalAttributes for ObjectTag {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        AttributeList::new()
            .known("data", &self.data)
            .known("syntax", &self.syntax)
            .extend(&self.attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_set_splits_known_from_extras() {
        let mut set = AttributeSet::new(vec![
            Attribute::new("lang", "en"),
            Attribute::new("name", "topic"),
            Attribute::new("caption", "c"),
        ]);
        assert_eq!(set.take("name"), "topic");
        assert_eq!(set.take("required"), "");
        assert_eq!(
            set.rest(),
            vec![Attribute::new("lang", "en"), Attribute::new("caption", "c")]
        );
    }

    #[test]
    fn test_input_canonical_attributes() {
        let mut input = Input::new("topic", true, "");
        input.attributes.push(Attribute::new("caption", "Topic"));
        assert_eq!(
            input.canonical_attributes(),
            vec![
                Attribute::new("name", "topic"),
                Attribute::new("required", "true"),
                Attribute::new("caption", "Topic"),
            ]
        );

        input.required = false;
        assert_eq!(input.canonical_attributes().len(), 2);
    }

    #[test]
    fn test_parse_bool_forms() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn test_block_text_decodes_body() {
        let block = Block::new("  <![CDATA[a < b]]> &amp; c \n");
        assert_eq!(block.text(), "a < b & c");
    }

    #[test]
    fn test_tool_request_arguments_prefer_parameters() {
        let mut req = ToolRequest::new("c1", "search", r#"{"q":"rust"}"#);
        req.body = "ignored".to_string();
        assert!(req.arguments().is_json());

        req.parameters.clear();
        assert_eq!(req.arguments(), JsonPayload::Raw("ignored".to_string()));
    }
}
