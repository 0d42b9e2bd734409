/// Structural validation of POML documents
use crate::ast::{Media, ToolReply};
use crate::document::Document;
use crate::element::ElementKind;
use crate::error::{ValidationError, ValidationIssue};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// Collects every structural issue of a document in one run
#[derive(Debug, Default)]
pub struct Validator {
    /// Collected issues
    issues: Vec<ValidationIssue>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a document. Never stops at the first issue.
    pub fn validate(&mut self, doc: &Document) -> Result<(), ValidationError> {
        self.issues.clear();

        self.check_sections(doc);
        self.check_meta(doc);
        self.check_inputs(doc);
        self.check_documents(doc);
        self.check_styles(doc);
        self.check_tools(doc);
        self.check_schema(doc);
        self.check_media(ElementKind::Image, &doc.images);
        self.check_media(ElementKind::Audio, &doc.audios);
        self.check_media(ElementKind::Video, &doc.videos);
        self.check_diagrams(doc);
        self.check_bodies(doc);

        ValidationError::new(std::mem::take(&mut self.issues)).into_result()
    }

    fn report(&mut self, kind: ElementKind, field: Option<&str>, message: impl Into<String>) {
        let issue = ValidationIssue::new(kind, message);
        self.issues.push(match field {
            Some(field) => issue.with_field(field),
            None => issue,
        });
    }

    /// Singleton sections and tasks, counted over live handles
    fn check_sections(&mut self, doc: &Document) {
        let mut counts: HashMap<ElementKind, usize> = HashMap::new();
        let order = doc.resolve_order();
        for el in order.iter().filter(|el| doc.payload(el).is_some()) {
            *counts.entry(el.kind).or_default() += 1;
        }
        let count = |kind| counts.get(&kind).copied().unwrap_or(0);

        if count(ElementKind::Meta) == 0 {
            self.report(ElementKind::Meta, None, "meta section is required");
        }
        if count(ElementKind::Role) == 0 {
            self.report(ElementKind::Role, None, "role section is required");
        }
        if count(ElementKind::Task) == 0 {
            self.report(ElementKind::Task, None, "at least one task is required");
        }
        if count(ElementKind::Meta) > 1 {
            self.report(ElementKind::Meta, None, "only one meta section is allowed");
        }
        if count(ElementKind::Role) > 1 {
            self.report(ElementKind::Role, None, "only one role section is allowed");
        }
        if count(ElementKind::OutputSchema) > 1 {
            self.report(
                ElementKind::OutputSchema,
                None,
                "only one output-schema section is allowed",
            );
        }
    }

    fn check_meta(&mut self, doc: &Document) {
        let Some(meta) = &doc.meta else {
            return;
        };
        for (field, value) in [
            ("id", &meta.id),
            ("version", &meta.version),
            ("owner", &meta.owner),
        ] {
            if value.trim().is_empty() {
                self.report(
                    ElementKind::Meta,
                    Some(field),
                    format!("meta.{} is required", field),
                );
            }
        }
    }

    fn check_inputs(&mut self, doc: &Document) {
        let mut seen = HashSet::new();
        for input in &doc.inputs {
            let name = input.name.trim();
            if name.is_empty() {
                self.report(ElementKind::Input, Some("name"), "input.name is required");
            } else if !seen.insert(name) {
                self.report(
                    ElementKind::Input,
                    Some("name"),
                    format!("duplicate input name {:?}", name),
                );
            }
        }
    }

    fn check_documents(&mut self, doc: &Document) {
        for reference in &doc.documents {
            if reference.src.trim().is_empty() {
                self.report(ElementKind::Document, Some("src"), "document src is required");
            }
        }
    }

    fn check_styles(&mut self, doc: &Document) {
        for style in &doc.styles {
            for output in &style.outputs {
                if output.format.trim().is_empty() {
                    self.report(
                        ElementKind::Style,
                        Some("format"),
                        "style output format is required",
                    );
                }
            }
        }
    }

    /// Definitions, requests and the replies that refer back to them
    fn check_tools(&mut self, doc: &Document) {
        let mut tools = HashSet::new();
        for def in &doc.tool_definitions {
            let name = def.name.trim();
            if name.is_empty() {
                self.report(
                    ElementKind::ToolDefinition,
                    Some("name"),
                    "tool-definition name is required",
                );
            } else if !tools.insert(name) {
                self.report(
                    ElementKind::ToolDefinition,
                    Some("name"),
                    format!("duplicate tool-definition name {:?}", name),
                );
            }
        }

        let mut requests: HashMap<&str, &str> = HashMap::new();
        for (i, req) in doc.tool_requests.iter().enumerate() {
            let id = req.id.trim();
            let name = req.name.trim();
            if id.is_empty() {
                self.report(ElementKind::ToolRequest, Some("id"), "tool-request id is required");
            }
            if name.is_empty() {
                self.report(
                    ElementKind::ToolRequest,
                    Some("name"),
                    "tool-request name is required",
                );
            } else if !tools.contains(name) {
                self.report(
                    ElementKind::ToolRequest,
                    Some("name"),
                    format!(
                        "tool-request {:?} references unknown tool-definition {:?}",
                        label_or_index(id, i),
                        name
                    ),
                );
            }
            if !id.is_empty() {
                if requests.contains_key(id) {
                    self.report(
                        ElementKind::ToolRequest,
                        Some("id"),
                        format!("duplicate tool-request id {:?}", id),
                    );
                } else {
                    requests.insert(id, name);
                }
            }
        }

        for (kind, replies) in [
            (ElementKind::ToolResponse, &doc.tool_responses),
            (ElementKind::ToolResult, &doc.tool_results),
            (ElementKind::ToolError, &doc.tool_errors),
        ] {
            for (i, reply) in replies.iter().enumerate() {
                self.check_reply(kind, i, reply, &tools, &requests);
            }
        }
    }

    fn check_reply(
        &mut self,
        kind: ElementKind,
        index: usize,
        reply: &ToolReply,
        tools: &HashSet<&str>,
        requests: &HashMap<&str, &str>,
    ) {
        let id = reply.id.trim();
        let name = reply.name.trim();

        if !name.is_empty() && !tools.contains(name) {
            self.report(
                kind,
                Some("name"),
                format!(
                    "{} {:?} references unknown tool-definition {:?}",
                    kind,
                    label_or_index(id, index),
                    name
                ),
            );
        }

        if id.is_empty() {
            self.report(kind, Some("id"), format!("{} id is required", kind));
            return;
        }

        match requests.get(id) {
            None => self.report(
                kind,
                Some("id"),
                format!("{} id {:?} does not match a tool-request", kind, id),
            ),
            Some(requested) if !name.is_empty() && !requested.is_empty() && name != *requested => {
                self.report(
                    kind,
                    Some("name"),
                    format!(
                        "{} id {:?} uses mismatched tool {:?} (request used {:?})",
                        kind, id, name, requested
                    ),
                )
            }
            Some(_) => {}
        }
    }

    fn check_schema(&mut self, doc: &Document) {
        if let Some(schema) = &doc.schema {
            if schema.body.trim().is_empty() && schema.attributes.is_empty() {
                self.report(
                    ElementKind::OutputSchema,
                    None,
                    "output-schema requires body or attributes",
                );
            }
        }
    }

    fn check_media(&mut self, kind: ElementKind, items: &[Media]) {
        for media in items {
            if media.src.trim().is_empty() && media.body.trim().is_empty() {
                self.report(kind, Some("src"), format!("{} requires src or inline body", kind));
            }
        }
    }

    /// Diagram issues are merged under the diagram kind
    fn check_diagrams(&mut self, doc: &Document) {
        for (i, diagram) in doc.diagrams.iter().enumerate() {
            if let Err(err) = diagram.validate() {
                for issue in err.issues {
                    self.issues.push(ValidationIssue {
                        kind: issue.kind.or(Some(ElementKind::Diagram)),
                        field: issue.field,
                        message: format!("diagram[{}]: {}", i, issue.message),
                    });
                }
            }
        }
    }

    fn check_bodies(&mut self, doc: &Document) {
        for (kind, blocks) in [
            (ElementKind::Hint, &doc.hints),
            (ElementKind::Example, &doc.examples),
            (ElementKind::ContentPart, &doc.content_parts),
        ] {
            for (i, block) in blocks.iter().enumerate() {
                if block.body.trim().is_empty() {
                    self.report(kind, None, format!("{}[{}] requires body content", kind, i));
                }
            }
        }

        for (i, object) in doc.objects.iter().enumerate() {
            if object.data.trim().is_empty() && object.body.trim().is_empty() {
                self.report(
                    ElementKind::Object,
                    None,
                    format!("object[{}] requires data or body", i),
                );
            }
        }
    }
}

fn label_or_index(id: &str, index: usize) -> String {
    if id.is_empty() {
        format!("#{}", index)
    } else {
        id.to_string()
    }
}

/// Validate a document, aggregating every issue found
#[instrument(skip(doc), fields(elements = doc.elements().len()))]
pub fn validate(doc: &Document) -> Result<(), ValidationError> {
    let result = Validator::new().validate(doc);
    if let Err(err) = &result {
        debug!(issues = err.len(), "Validation failed");
    }
    result
}
