use crate::ast::{Attribute, CanonicalAttributes, Meta, Style};
use crate::document::Document;
use crate::element::{Element, Markup};
use crate::error::PomlResult;
use crate::payload::Payload;
use crate::tokenizer::{escape_attr, escape_text};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Declaration written when `include_header` is set
pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Encode configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeOptions {
    pub indent: String,
    pub include_header: bool,
    /// Follow the handle list; otherwise use the canonical kind order
    pub preserve_order: bool,
    /// Re-emit recorded trivia and source markup
    pub preserve_trivia: bool,
    pub compact: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            include_header: false,
            preserve_order: true,
            preserve_trivia: false,
            compact: false,
        }
    }
}

impl EncodeOptions {
    /// Lossless re-emission of a document parsed in fidelity mode
    pub fn fidelity() -> Self {
        Self {
            preserve_trivia: true,
            ..Self::default()
        }
    }

    pub fn compact() -> Self {
        Self {
            indent: String::new(),
            compact: true,
            ..Self::default()
        }
    }

    /// Canonical kind order, pretty-printed
    pub fn canonical() -> Self {
        Self {
            preserve_order: false,
            ..Self::default()
        }
    }

    pub fn with_header(mut self) -> Self {
        self.include_header = true;
        self
    }
}

/// Generated markup for structured inner content
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fragment {
    Element {
        name: String,
        attributes: Vec<Attribute>,
        children: Vec<Fragment>,
    },
    /// Text written as-is
    Raw(String),
}

impl Fragment {
    pub fn element(name: &str, attributes: Vec<Attribute>, children: Vec<Fragment>) -> Self {
        Fragment::Element {
            name: name.to_string(),
            attributes,
            children,
        }
    }
}

/// Serializer converts a Document back to POML text
///
/// Elements parsed in fidelity mode keep their source text: start tags,
/// end tags and structured inner markup are copied verbatim unless the
/// typed values they encoded have since changed, in which case only that
/// part is regenerated.
pub struct Serializer<'a> {
    options: &'a EncodeOptions,
    indent_level: usize,
    indent_string: String,
    pretty: bool,
}

impl<'a> Serializer<'a> {
    pub fn new(options: &'a EncodeOptions) -> Self {
        Self {
            options,
            indent_level: 0,
            indent_string: options.indent.clone(),
            pretty: !options.compact && !options.indent.is_empty(),
        }
    }

    /// Serialize a Document to text
    pub fn serialize(&mut self, doc: &Document) -> String {
        let mut output = String::new();
        let root = &doc.root;
        let trivia = self.options.preserve_trivia;

        let has_declaration = trivia && root.prolog.trim_start().starts_with("<?xml");
        if self.options.include_header && !has_declaration {
            output.push_str(XML_HEADER);
        }
        if trivia {
            output.push_str(&root.prolog);
        }

        let order = self.element_order(doc);
        let verbatim_head = root
            .head
            .as_deref()
            .filter(|_| trivia && (!root.self_closing || order.is_empty()));

        match verbatim_head {
            Some(head) if root.self_closing => output.push_str(head),
            Some(head) => {
                output.push_str(head);
                self.serialize_children(doc, &order, &mut output);
                match &root.close {
                    Some(close) => output.push_str(close),
                    None => self.close_tag(doc.root_name(), &mut output),
                }
            }
            None if order.is_empty() => {
                self.open_tag(doc.root_name(), doc.root_attributes(), &mut output);
                output.push_str("/>");
            }
            None => {
                self.open_tag(doc.root_name(), doc.root_attributes(), &mut output);
                output.push('>');
                self.serialize_children(doc, &order, &mut output);
                self.close_tag(doc.root_name(), &mut output);
            }
        }

        if trivia {
            output.push_str(&root.epilogue);
        } else if self.pretty {
            output.push('\n');
        }

        output
    }

    fn element_order<'d>(&self, doc: &'d Document) -> Cow<'d, [Element]> {
        let order = doc.resolve_order();
        if self.options.preserve_order {
            return order;
        }

        let mut seen = HashSet::new();
        let mut elements: Vec<Element> = order
            .iter()
            .filter(|el| {
                !el.kind.is_singleton() || (el.raw_text.is_empty() && seen.insert(el.kind))
            })
            .cloned()
            .collect();
        elements.sort_by_key(|el| (el.kind.canonical_rank(), el.slot_index.unwrap_or(0)));
        Cow::Owned(elements)
    }

    fn serialize_children(&mut self, doc: &Document, order: &[Element], output: &mut String) {
        let trivia = self.options.preserve_trivia;

        if order.is_empty() {
            if trivia {
                output.push_str(&doc.root.empty_inner);
            }
            return;
        }

        self.indent_level += 1;
        for el in order {
            let Some(payload) = doc.payload(el) else {
                warn!(id = %el.id, kind = %el.kind, "Skipping element without payload");
                continue;
            };

            if trivia && (el.has_source_markup() || !el.leading_trivia.is_empty()) {
                output.push_str(&el.leading_trivia);
            } else {
                self.newline(output);
            }

            self.serialize_element(el, payload, output);

            if trivia {
                output.push_str(&el.trailing_trivia);
            }
        }
        self.indent_level -= 1;

        let closed = order
            .last()
            .map_or(false, |last| trivia && (last.has_source_markup() || !last.trailing_trivia.is_empty()));
        if !closed {
            self.newline(output);
        }
    }

    fn serialize_element(&mut self, el: &Element, payload: Payload<'_>, output: &mut String) {
        if el.is_unknown() || (el.kind.is_singleton() && !el.raw_text.is_empty()) {
            output.push_str(&el.raw_text);
            return;
        }

        let name = el.tag_name();
        let attributes = payload.canonical_attributes();
        let markup = el
            .markup
            .as_deref()
            .filter(|_| self.options.preserve_trivia);

        match markup {
            Some(markup) if markup.attributes == attributes => output.push_str(&markup.head),
            _ => self.open_tag(name, &attributes, output),
        }

        let content = self.inner_content(payload, markup);
        match markup {
            _ if !content.is_empty() => {
                output.push('>');
                output.push_str(&content);
                match markup {
                    Some(markup) if !markup.tail.is_empty() => output.push_str(&markup.tail),
                    _ => self.close_tag(name, output),
                }
            }
            Some(markup) if !markup.self_closing => {
                output.push('>');
                output.push_str(&markup.tail);
            }
            _ => output.push_str("/>"),
        }
    }

    fn inner_content(&mut self, payload: Payload<'_>, markup: Option<&Markup>) -> String {
        if let Some(inner) = markup.and_then(|markup| markup.inner.as_ref()) {
            if inner.snapshot.matches(&payload) {
                return inner.raw.clone();
            }
        }

        match payload {
            Payload::Meta(meta) => self.serialize_fragments(&meta_fragments(meta)),
            Payload::Style(style) => self.serialize_fragments(&style_fragments(style)),
            Payload::Diagram(diagram) => self.serialize_fragments(&diagram.inner_fragments()),
            Payload::Runtime(_) => String::new(),
            other => other.body().unwrap_or_default().to_string(),
        }
    }

    /// Children of the element at the current level, one level deeper
    fn serialize_fragments(&mut self, fragments: &[Fragment]) -> String {
        let mut output = String::new();
        if fragments.is_empty() {
            return output;
        }

        self.indent_level += 1;
        for fragment in fragments {
            self.newline(&mut output);
            self.serialize_fragment(fragment, &mut output);
        }
        self.indent_level -= 1;
        self.newline(&mut output);

        output
    }

    fn serialize_fragment(&mut self, fragment: &Fragment, output: &mut String) {
        let (name, attributes, children) = match fragment {
            Fragment::Raw(text) => {
                output.push_str(text);
                return;
            }
            Fragment::Element {
                name,
                attributes,
                children,
            } => (name, attributes, children),
        };

        self.open_tag(name, attributes, output);
        if children.is_empty() {
            output.push_str("/>");
            return;
        }
        output.push('>');

        if children.iter().all(|child| matches!(child, Fragment::Raw(_))) {
            for child in children {
                self.serialize_fragment(child, output);
            }
        } else {
            let inner = self.serialize_fragments(children);
            output.push_str(&inner);
        }
        self.close_tag(name, output);
    }

    fn open_tag(&self, name: &str, attributes: &[Attribute], output: &mut String) {
        output.push('<');
        output.push_str(name);
        for attr in attributes {
            output.push(' ');
            output.push_str(&attr.name);
            output.push_str("=\"");
            output.push_str(&escape_attr(&attr.value));
            output.push('"');
        }
    }

    fn close_tag(&self, name: &str, output: &mut String) {
        output.push_str("</");
        output.push_str(name);
        output.push('>');
    }

    fn newline(&self, output: &mut String) {
        if self.pretty {
            output.push('\n');
            output.push_str(&self.indent_string.repeat(self.indent_level));
        }
    }
}

fn text_fragment(name: &str, value: &str) -> Option<Fragment> {
    if value.is_empty() {
        return None;
    }
    Some(Fragment::element(
        name,
        Vec::new(),
        vec![Fragment::Raw(escape_text(value).into_owned())],
    ))
}

fn meta_fragments(meta: &Meta) -> Vec<Fragment> {
    [
        text_fragment("id", &meta.id),
        text_fragment("version", &meta.version),
        text_fragment("owner", &meta.owner),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn style_fragments(style: &Style) -> Vec<Fragment> {
    style
        .outputs
        .iter()
        .map(|output| {
            let children = if output.body.is_empty() {
                Vec::new()
            } else {
                vec![Fragment::Raw(output.body.clone())]
            };
            Fragment::element("output", output.canonical_attributes(), children)
        })
        .collect()
}

/// Encode a document to text
#[instrument(skip(doc, options), fields(elements = doc.elements().len(), preserve_trivia = options.preserve_trivia))]
pub fn encode(doc: &Document, options: &EncodeOptions) -> String {
    Serializer::new(options).serialize(doc)
}

pub fn encode_to_writer<W: Write>(
    doc: &Document,
    options: &EncodeOptions,
    mut writer: W,
) -> PomlResult<()> {
    writer.write_all(encode(doc, options).as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Write the encoded document to `path` through a temporary sibling file,
/// so a failure never leaves a partial file behind.
pub fn dump_file(
    doc: &Document,
    path: impl AsRef<Path>,
    options: &EncodeOptions,
) -> PomlResult<()> {
    let path = path.as_ref();
    let text = encode(doc, options);

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Err(err) = write_atomically(&tmp, path, text.as_bytes()) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }

    debug!(path = %path.display(), bytes = text.len(), "Wrote document");
    Ok(())
}

fn write_atomically(tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, path)
}
