use crate::ast::*;
use crate::diagram::Diagram;
use crate::document::Document;
use crate::element::{ElementKind, InnerMarkup, InnerSnapshot, Markup};
use crate::error::{DecodeError, DecodeResult, PomlResult};
use crate::payload::ElementData;
use crate::tokenizer::{decode_text, tokenize, Event, EventKind, StartTag};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, instrument};

/// Decode configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Keep whitespace, comments and source markup for lossless round-trip
    pub preserve_whitespace: bool,
    /// Run the validator after decoding; a failure fails the parse
    pub validate: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            preserve_whitespace: true,
            validate: false,
        }
    }
}

impl ParseOptions {
    /// Fidelity mode plus validation
    pub fn strict() -> Self {
        Self {
            preserve_whitespace: true,
            validate: true,
        }
    }

    /// Typed content only
    pub fn fast() -> Self {
        Self {
            preserve_whitespace: false,
            validate: false,
        }
    }
}

/// Nested markup inside a structured element (meta, style, diagram)
#[derive(Debug, Clone)]
pub(crate) struct XmlNode<'src> {
    pub name: &'src str,
    pub attributes: Vec<Attribute>,
    /// Raw text between the start and end tag
    pub inner: &'src str,
    pub offset: usize,
    pub children: Vec<XmlNode<'src>>,
}

/// Build the element tree of a balanced run of events. Text is dropped.
pub(crate) fn build_nodes<'src>(source: &'src str, events: &[Event<'src>]) -> Vec<XmlNode<'src>> {
    let mut roots = Vec::new();
    let mut stack: Vec<(XmlNode<'src>, usize)> = Vec::new();

    for event in events {
        match &event.kind {
            EventKind::StartTag(tag) => {
                let node = XmlNode {
                    name: tag.name,
                    attributes: tag.attributes.clone(),
                    inner: "",
                    offset: event.span.start,
                    children: Vec::new(),
                };
                if tag.self_closing {
                    attach(&mut stack, &mut roots, node);
                } else {
                    stack.push((node, event.span.end));
                }
            }
            EventKind::EndTag { .. } => {
                if let Some((mut node, inner_start)) = stack.pop() {
                    node.inner = &source[inner_start..event.span.start];
                    attach(&mut stack, &mut roots, node);
                }
            }
            _ => {}
        }
    }

    roots
}

fn attach<'src>(
    stack: &mut [(XmlNode<'src>, usize)],
    roots: &mut Vec<XmlNode<'src>>,
    node: XmlNode<'src>,
) {
    match stack.last_mut() {
        Some((parent, _)) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Parser for POML documents
pub struct Parser<'src> {
    source: &'src str,
    events: Vec<Event<'src>>,
    pos: usize,
    /// Source span of every element handle pushed so far
    spans: Vec<Range<usize>>,
    options: ParseOptions,
    expected_root: Option<String>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self::with_options(source, ParseOptions::default())
    }

    pub fn with_options(source: &'src str, options: ParseOptions) -> Self {
        Self {
            source,
            events: Vec::new(),
            pos: 0,
            spans: Vec::new(),
            options,
            expected_root: None,
        }
    }

    /// Reject documents whose root element is not `name`
    pub fn expect_root(mut self, name: impl Into<String>) -> Self {
        self.expected_root = Some(name.into());
        self
    }

    /// Decode and, when requested, validate
    #[instrument(skip(self), fields(bytes = self.source.len(), preserve_whitespace = self.options.preserve_whitespace, validate = self.options.validate))]
    pub fn parse(mut self) -> PomlResult<Document> {
        let doc = self.parse_document()?;
        if self.options.validate {
            doc.validate()?;
        }
        Ok(doc)
    }

    /// Decode a complete document without validating it
    pub fn parse_document(&mut self) -> DecodeResult<Document> {
        self.events = tokenize(self.source)?;
        self.pos = 0;
        self.spans.clear();

        let mut doc = Document::new();
        let fidelity = self.options.preserve_whitespace;

        let root_span = self.parse_prolog()?;
        let root = match self.events[self.pos].start_tag() {
            Some(tag) => tag.clone(),
            None => return Err(DecodeError::unexpected_eof(self.source, "root element")),
        };
        if let Some(expected) = &self.expected_root {
            if root.name != expected.as_str() {
                return Err(DecodeError::unexpected_root(
                    self.source,
                    root_span.start,
                    expected.as_str(),
                    root.name,
                ));
            }
        }
        self.pos += 1;

        doc.root.name = root.name.to_string();
        doc.root.attributes = root.attributes.clone();
        doc.root.self_closing = root.self_closing;
        if fidelity {
            doc.root.prolog = self.source[..root_span.start].to_string();
            doc.root.head = Some(self.source[root_span.clone()].to_string());
        }

        let epilogue_start = if root.self_closing {
            root_span.end
        } else {
            self.parse_children(&mut doc, root.name, root_span.end)?
        };

        self.parse_epilogue()?;
        if fidelity {
            doc.root.epilogue = self.source[epilogue_start..].to_string();
        }

        debug!(
            root = %doc.root_name(),
            elements = doc.elements.len(),
            "Parsed document"
        );
        Ok(doc)
    }

    /// Skip everything before the root start tag; returns its span
    fn parse_prolog(&mut self) -> DecodeResult<Range<usize>> {
        while let Some(event) = self.events.get(self.pos) {
            match &event.kind {
                EventKind::StartTag(_) => return Ok(event.span.clone()),
                EventKind::EndTag { name } => {
                    return Err(DecodeError::invalid_syntax(
                        self.source,
                        event.span.start,
                        format!("unexpected end tag '</{}>' before root element", name),
                    ))
                }
                EventKind::Text if self.source[event.span.clone()].trim().is_empty() => {}
                EventKind::Text | EventKind::CData => {
                    return Err(DecodeError::invalid_syntax(
                        self.source,
                        event.span.start,
                        "text before root element",
                    ))
                }
                EventKind::Comment | EventKind::Instruction | EventKind::Declaration => {}
            }
            self.pos += 1;
        }
        Err(DecodeError::unexpected_eof(self.source, "root element"))
    }

    /// Decode the children of the root; returns the offset just past the
    /// root end tag
    fn parse_children(
        &mut self,
        doc: &mut Document,
        root_name: &str,
        inner_start: usize,
    ) -> DecodeResult<usize> {
        let fidelity = self.options.preserve_whitespace;
        let mut pending = inner_start;

        loop {
            let Some(event) = self.events.get(self.pos) else {
                return Err(DecodeError::unexpected_eof(
                    self.source,
                    format!("</{}>", root_name),
                ));
            };

            match &event.kind {
                EventKind::StartTag(_) => {
                    let start = event.span.start;
                    let close = self.find_close(self.pos)?;
                    self.push_element(doc, self.pos, close, pending..start)?;
                    pending = self.events[close].span.end;
                    self.pos = close + 1;
                }
                EventKind::EndTag { name } => {
                    if *name != root_name {
                        return Err(DecodeError::mismatched_tag(
                            self.source,
                            event.span.start,
                            root_name,
                            *name,
                        ));
                    }
                    if fidelity {
                        let trailing = &self.source[pending..event.span.start];
                        match doc.elements.last_mut() {
                            Some(last) => last.trailing_trivia = trailing.to_string(),
                            None => doc.root.empty_inner = trailing.to_string(),
                        }
                        doc.root.close = Some(self.source[event.span.clone()].to_string());
                    }
                    let end = event.span.end;
                    self.pos += 1;
                    return Ok(end);
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Anything but trivia after the root is malformed
    fn parse_epilogue(&mut self) -> DecodeResult<()> {
        while let Some(event) = self.events.get(self.pos) {
            let message = match &event.kind {
                EventKind::StartTag(tag) => format!("element <{}> after root element", tag.name),
                EventKind::EndTag { name } => format!("unexpected end tag '</{}>'", name),
                EventKind::Text if !self.source[event.span.clone()].trim().is_empty() => {
                    "text after root element".to_string()
                }
                EventKind::CData => "text after root element".to_string(),
                _ => {
                    self.pos += 1;
                    continue;
                }
            };
            return Err(DecodeError::invalid_syntax(
                self.source,
                event.span.start,
                message,
            ));
        }
        Ok(())
    }

    /// Index of the end tag closing the start tag at `open`
    fn find_close(&self, open: usize) -> DecodeResult<usize> {
        let mut stack: Vec<&str> = match self.events[open].start_tag() {
            Some(tag) if tag.self_closing => return Ok(open),
            Some(tag) => vec![tag.name],
            None => return Ok(open),
        };

        for (idx, event) in self.events.iter().enumerate().skip(open + 1) {
            match &event.kind {
                EventKind::StartTag(tag) if !tag.self_closing => stack.push(tag.name),
                EventKind::EndTag { name } => {
                    let expected = stack.pop().unwrap_or_default();
                    if *name != expected {
                        return Err(DecodeError::mismatched_tag(
                            self.source,
                            event.span.start,
                            expected,
                            *name,
                        ));
                    }
                    if stack.is_empty() {
                        return Ok(idx);
                    }
                }
                _ => {}
            }
        }

        let expected = stack.last().copied().unwrap_or_default();
        Err(DecodeError::unexpected_eof(
            self.source,
            format!("</{}>", expected),
        ))
    }

    fn push_element(
        &mut self,
        doc: &mut Document,
        open: usize,
        close: usize,
        leading: Range<usize>,
    ) -> DecodeResult<()> {
        let source = self.source;
        let fidelity = self.options.preserve_whitespace;
        let open_event = &self.events[open];
        let close_event = &self.events[close];
        let Some(tag) = open_event.start_tag() else {
            return Ok(());
        };

        let span = open_event.span.start..close_event.span.end;
        let inner = if tag.self_closing {
            ""
        } else {
            &source[open_event.span.end..close_event.span.start]
        };
        let kind = ElementKind::from_tag(tag.name);
        debug!(tag = tag.name, kind = %kind, offset = span.start, "Decoding element");

        let mut element = if kind == ElementKind::Unknown {
            doc.store(ElementData::unknown(tag.name, &source[span.clone()]))
        } else {
            let children = if tag.self_closing {
                Vec::new()
            } else {
                build_nodes(source, &self.events[open + 1..close])
            };
            let data = self.decode_payload(kind, tag, inner, &children, span.start)?;
            doc.store(data)
        };
        element.display_name = tag.name.to_string();

        if kind.is_singleton() {
            // an earlier occurrence is shadowed by this one; keep its text
            for (prev, prev_span) in doc.elements.iter_mut().zip(&self.spans) {
                if prev.kind == kind && prev.raw_text.is_empty() {
                    prev.raw_text = source[prev_span.clone()].to_string();
                }
            }
        }

        if fidelity {
            element.leading_trivia = source[leading].to_string();
            if let Some(payload) = doc.payload(&element) {
                let open_text = &source[open_event.span.clone()];
                let terminator = if tag.self_closing { 2 } else { 1 };
                let head_len = open_text.len() - terminator;
                let markup = Markup {
                    attributes: payload.canonical_attributes(),
                    head: open_text[..head_len].to_string(),
                    self_closing: tag.self_closing,
                    tail: if tag.self_closing {
                        String::new()
                    } else {
                        source[close_event.span.clone()].to_string()
                    },
                    inner: InnerSnapshot::capture(&payload).map(|snapshot| InnerMarkup {
                        snapshot,
                        raw: inner.to_string(),
                    }),
                };
                element.markup = Some(Box::new(markup));
            }
        }

        doc.elements.push(element);
        self.spans.push(span);
        Ok(())
    }

    fn decode_payload(
        &self,
        kind: ElementKind,
        tag: &StartTag<'src>,
        inner: &str,
        children: &[XmlNode<'src>],
        offset: usize,
    ) -> DecodeResult<ElementData> {
        let mut attrs = AttributeSet::new(tag.attributes.clone());
        let body = inner.to_string();

        let block = |attrs: AttributeSet, body: String| Block {
            body,
            attributes: attrs.rest(),
        };
        let reply = |mut attrs: AttributeSet, body: String| {
            let id = attrs.take("id");
            let name = attrs.take("name");
            ToolReply {
                id,
                name,
                body,
                attributes: attrs.rest(),
            }
        };
        let media = |mut attrs: AttributeSet, body: String| {
            let src = attrs.take("src");
            let alt = attrs.take("alt");
            let syntax = attrs.take("syntax");
            Media {
                src,
                alt,
                syntax,
                body,
                attributes: attrs.rest(),
            }
        };

        let data = match kind {
            ElementKind::Meta => {
                let mut meta = Meta::default();
                for child in children {
                    let text = decode_text(child.inner).trim().to_string();
                    match child.name {
                        "id" => meta.id = text,
                        "version" => meta.version = text,
                        "owner" => meta.owner = text,
                        _ => {}
                    }
                }
                meta.attributes = attrs.rest();
                ElementData::Meta(meta)
            }
            ElementKind::Role => ElementData::Role(block(attrs, body)),
            ElementKind::Task => ElementData::Task(block(attrs, body)),
            ElementKind::Hint => ElementData::Hint(block(attrs, body)),
            ElementKind::Example => ElementData::Example(block(attrs, body)),
            ElementKind::ContentPart => ElementData::ContentPart(block(attrs, body)),
            ElementKind::OutputFormat => ElementData::OutputFormat(block(attrs, body)),
            ElementKind::Input => {
                let name = attrs.take("name");
                let required = match attrs.take_opt("required") {
                    Some(value) => self.parse_flag("required", &value, offset)?,
                    None => false,
                };
                ElementData::Input(Input {
                    name,
                    required,
                    body,
                    attributes: attrs.rest(),
                })
            }
            ElementKind::Document => {
                let src = attrs.take("src");
                ElementData::Document(DocRef {
                    src,
                    body,
                    attributes: attrs.rest(),
                })
            }
            ElementKind::Style => {
                let outputs = children
                    .iter()
                    .filter(|child| child.name == "output")
                    .map(|child| {
                        let mut attrs = AttributeSet::new(child.attributes.clone());
                        let format = attrs.take("format");
                        Output {
                            format,
                            body: child.inner.to_string(),
                            attributes: attrs.rest(),
                        }
                    })
                    .collect();
                ElementData::Style(Style {
                    outputs,
                    attributes: attrs.rest(),
                })
            }
            ElementKind::HumanMsg | ElementKind::AssistantMsg | ElementKind::SystemMsg => {
                let role = match kind {
                    ElementKind::AssistantMsg => MessageRole::Assistant,
                    ElementKind::SystemMsg => MessageRole::System,
                    _ => MessageRole::Human,
                };
                ElementData::Message(Message {
                    role,
                    body,
                    attributes: attrs.rest(),
                })
            }
            ElementKind::ToolDefinition => {
                let name = attrs.take("name");
                let description = attrs.take("description");
                ElementData::ToolDefinition(ToolDefinition {
                    name,
                    description,
                    body,
                    attributes: attrs.rest(),
                })
            }
            ElementKind::ToolRequest => {
                let id = attrs.take("id");
                let name = attrs.take("name");
                let parameters = attrs.take("parameters");
                ElementData::ToolRequest(ToolRequest {
                    id,
                    name,
                    parameters,
                    body,
                    attributes: attrs.rest(),
                })
            }
            ElementKind::ToolResponse => ElementData::ToolResponse(reply(attrs, body)),
            ElementKind::ToolResult => ElementData::ToolResult(reply(attrs, body)),
            ElementKind::ToolError => ElementData::ToolError(reply(attrs, body)),
            ElementKind::OutputSchema => ElementData::OutputSchema(OutputSchema {
                body,
                attributes: attrs.rest(),
            }),
            ElementKind::Runtime => ElementData::Runtime(Runtime::new(attrs.rest())),
            ElementKind::Image => ElementData::Image(media(attrs, body)),
            ElementKind::Audio => ElementData::Audio(media(attrs, body)),
            ElementKind::Video => ElementData::Video(media(attrs, body)),
            ElementKind::Object => {
                let data = attrs.take("data");
                let syntax = attrs.take("syntax");
                ElementData::Object(ObjectTag {
                    data,
                    syntax,
                    body,
                    attributes: attrs.rest(),
                })
            }
            ElementKind::Diagram => {
                ElementData::Diagram(Diagram::from_parts(self.source, attrs.rest(), children)?)
            }
            ElementKind::Unknown => ElementData::unknown(tag.name, inner),
        };

        Ok(data)
    }

    fn parse_flag(&self, name: &str, value: &str, offset: usize) -> DecodeResult<bool> {
        parse_bool(value).ok_or_else(|| {
            DecodeError::invalid_syntax(
                self.source,
                offset,
                format!("invalid boolean '{}' for attribute '{}'", value, name),
            )
        })
    }
}

/// Parse a document with the given options
pub fn parse(source: &str, options: ParseOptions) -> PomlResult<Document> {
    Parser::with_options(source, options).parse()
}

/// Parse in fidelity mode without validating
pub fn parse_str(source: &str) -> PomlResult<Document> {
    parse(source, ParseOptions::default())
}

/// Parse in fidelity mode and fail on validation issues
pub fn parse_str_strict(source: &str) -> PomlResult<Document> {
    parse(source, ParseOptions::strict())
}

/// Parse typed content only
pub fn parse_str_fast(source: &str) -> PomlResult<Document> {
    parse(source, ParseOptions::fast())
}

pub fn parse_file(path: impl AsRef<Path>, options: ParseOptions) -> PomlResult<Document> {
    let source = std::fs::read_to_string(path)?;
    parse(&source, options)
}

pub fn parse_reader<R: Read>(mut reader: R, options: ParseOptions) -> PomlResult<Document> {
    let mut source = String::new();
    reader.read_to_string(&mut source)?;
    parse(&source, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PomlError;
    use crate::payload::Payload;

    fn decode(source: &str) -> DecodeResult<Document> {
        Parser::new(source).parse_document()
    }

    #[test]
    fn test_parse_basic_document() {
        let source = r#"<poml>
  <meta><id>demo</id><version>1.0</version><owner>me</owner></meta>
  <role>You are terse.</role>
  <task>Summarize.</task>
  <task>Translate.</task>
  <input name="topic" required="true">Rust</input>
</poml>"#;
        let doc = decode(source).unwrap();

        let kinds: Vec<ElementKind> = doc.elements().iter().map(|el| el.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ElementKind::Meta,
                ElementKind::Role,
                ElementKind::Task,
                ElementKind::Task,
                ElementKind::Input,
            ]
        );
        assert_eq!(doc.meta.as_ref().unwrap().id, "demo");
        assert_eq!(doc.role_text(), "You are terse.");
        assert_eq!(doc.task_bodies(), vec!["Summarize.", "Translate."]);
        assert!(doc.inputs[0].required);
        assert_eq!(doc.elements()[3].slot_index, Some(1));
        assert_eq!(doc.elements()[0].slot_index, None);
    }

    #[test]
    fn test_trivia_attribution() {
        let source = "<poml>\n  <task>a</task>\n  <!-- note -->\n  <hint>h</hint>\n</poml>\n";
        let doc = decode(source).unwrap();
        let els = doc.elements();

        assert_eq!(els[0].leading_trivia, "\n  ");
        assert_eq!(els[0].trailing_trivia, "");
        assert_eq!(els[1].leading_trivia, "\n  <!-- note -->\n  ");
        assert_eq!(els[1].trailing_trivia, "\n");
        assert_eq!(doc.root.epilogue, "\n");
    }

    #[test]
    fn test_fast_mode_drops_trivia() {
        let doc = parse_str_fast("<poml>\n  <task>a</task>\n</poml>").unwrap();
        let el = &doc.elements()[0];
        assert!(el.leading_trivia.is_empty());
        assert!(el.trailing_trivia.is_empty());
        assert!(!el.has_source_markup());
    }

    #[test]
    fn test_unknown_tag_kept_verbatim() {
        let source = r#"<poml><x-note kind="a">text <b>bold</b></x-note></poml>"#;
        let doc = decode(source).unwrap();
        let el = &doc.elements()[0];

        assert!(el.is_unknown());
        assert_eq!(el.display_name, "x-note");
        assert_eq!(el.raw_text, r#"<x-note kind="a">text <b>bold</b></x-note>"#);
        assert_eq!(el.slot_index, None);
    }

    #[test]
    fn test_aliases_are_recorded() {
        let doc = decode(r#"<poml><tool name="search"/><ai-msg>hi</ai-msg></poml>"#).unwrap();
        assert_eq!(doc.elements()[0].kind, ElementKind::ToolDefinition);
        assert_eq!(doc.elements()[0].tag_name(), "tool");
        assert_eq!(doc.elements()[1].kind, ElementKind::AssistantMsg);
        assert_eq!(doc.messages[0].role, MessageRole::Assistant);
    }

    #[test]
    fn test_any_root_name_is_accepted() {
        let doc = decode("<root><task>t</task></root>").unwrap();
        assert_eq!(doc.root_name(), "root");
    }

    #[test]
    fn test_expect_root_rejects_other_names() {
        let err = Parser::new("\n<root/>")
            .expect_root("poml")
            .parse_document()
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedRoot { line: 2, .. }));
    }

    #[test]
    fn test_mismatched_tag_reports_line() {
        let err = decode("<poml>\n<task>\n</hint>\n</poml>").unwrap_err();
        match err {
            DecodeError::MismatchedTag {
                line,
                expected,
                found,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(expected, "task");
                assert_eq!(found, "hint");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_premature_eof() {
        let err = decode("<poml>\n<task>t</task>\n").unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { line: 3, .. }));
        assert!(err.to_string().contains("</poml>"));

        let err = decode("<!-- only a comment -->").unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_content_outside_root_is_rejected() {
        assert!(decode("hello <poml/>").is_err());
        assert!(decode("<poml/><task>t</task>").is_err());
        assert!(decode("<poml/> trailing").is_err());
        assert!(decode("<?xml version=\"1.0\"?>\n<poml/>\n<!-- ok -->\n").is_ok());
    }

    #[test]
    fn test_invalid_boolean_attribute() {
        let err = decode("<poml>\n<input name=\"a\" required=\"maybe\"/></poml>").unwrap_err();
        assert_eq!(err.line(), 2);
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn test_duplicate_singletons_are_all_recorded() {
        let doc = decode("<poml><role>first</role><role>second</role></poml>").unwrap();
        let roles: Vec<_> = doc
            .elements()
            .iter()
            .filter(|el| el.kind == ElementKind::Role)
            .collect();
        assert_eq!(roles.len(), 2);
        assert_eq!(doc.role_text(), "second");
        assert_eq!(roles[0].raw_text, "<role>first</role>");
        assert!(roles[1].raw_text.is_empty());
    }

    #[test]
    fn test_structured_children() {
        let source = r#"<poml><style><output format="json">{"a":1}</output><output format="text"/></style></poml>"#;
        let doc = decode(source).unwrap();
        let style = &doc.styles[0];
        assert_eq!(style.outputs.len(), 2);
        assert_eq!(style.outputs[0].format, "json");
        assert_eq!(style.outputs[0].body, r#"{"a":1}"#);
        assert_eq!(style.outputs[1].body, "");
    }

    #[test]
    fn test_diagram_children() {
        let source = r#"<poml><diagram id="d"><graph><node id="a"><data key="k">v</data></node><node id="b"/><edge from="a" to="b" directed="true"/></graph><camera azimuth="30"/></diagram></poml>"#;
        let doc = decode(source).unwrap();
        let diagram = &doc.diagrams[0];
        assert_eq!(diagram.graph.nodes.len(), 2);
        assert_eq!(diagram.graph.nodes[0].data[0].body, "v");
        assert_eq!(diagram.graph.edges[0].directed, Some(true));
        assert_eq!(diagram.camera.as_ref().unwrap().azimuth, "30");
    }

    #[test]
    fn test_build_nodes_nesting() {
        let source = "<a><b x=\"1\"/><c>t<d/></c></a>";
        let events = tokenize(source).unwrap();
        let nodes = build_nodes(source, &events);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children.len(), 2);
        assert_eq!(nodes[0].children[1].inner, "t<d/>");
        assert_eq!(nodes[0].children[1].children[0].name, "d");
    }

    #[test]
    fn test_strict_parse_fails_on_validation() {
        let err = parse_str_strict("<poml><task>t</task></poml>").unwrap_err();
        match err {
            PomlError::Validation(issues) => assert!(issues.len() >= 2),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parse_reader() {
        let doc = parse_reader("<poml><hint>h</hint></poml>".as_bytes(), ParseOptions::fast()).unwrap();
        let el = &doc.elements()[0];
        assert!(matches!(doc.payload(el), Some(Payload::Hint(_))));
    }
}
