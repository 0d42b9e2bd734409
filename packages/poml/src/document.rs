//! # Element Store
//!
//! A [`Document`] owns one typed collection per element kind plus the
//! ordered list of [`Element`] handles pointing into them. The handle list
//! is the authoritative serialization order; `slot_index` on a handle is an
//! index into its kind's collection and is rewritten only by parsing and by
//! the re-index pass.

use crate::ast::*;
use crate::diagram::Diagram;
use crate::element::{Collection, Element, ElementId, ElementKind};
use crate::error::{PomlResult, ValidationError};
use crate::id_generator::IdGenerator;
use crate::payload::{message_kind, ElementData, Payload, PayloadMut};
use crate::serializer::{self, EncodeOptions};
use crate::validator;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// Root element name used for documents built in memory
pub const DEFAULT_ROOT: &str = "poml";

/// Root tag and the text around it, as recorded in fidelity mode
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RootMarkup {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Text before the root start tag (XML declaration, comments)
    pub prolog: String,
    /// Verbatim root start tag, including its `>` or `/>`
    pub head: Option<String>,
    pub self_closing: bool,
    /// Trivia inside a root that has no elements
    pub empty_inner: String,
    /// Verbatim root end tag
    pub close: Option<String>,
    /// Text after the root end tag
    pub epilogue: String,
}

/// A parsed or programmatically built POML document
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub meta: Option<Meta>,
    pub role: Option<Block>,
    pub tasks: Vec<Block>,
    pub inputs: Vec<Input>,
    pub documents: Vec<DocRef>,
    pub styles: Vec<Style>,
    pub hints: Vec<Block>,
    pub examples: Vec<Block>,
    pub content_parts: Vec<Block>,
    pub output_formats: Vec<Block>,
    pub messages: Vec<Message>,
    pub tool_definitions: Vec<ToolDefinition>,
    pub tool_requests: Vec<ToolRequest>,
    pub tool_responses: Vec<ToolReply>,
    pub tool_results: Vec<ToolReply>,
    pub tool_errors: Vec<ToolReply>,
    pub schema: Option<OutputSchema>,
    pub runtimes: Vec<Runtime>,
    pub images: Vec<Media>,
    pub audios: Vec<Media>,
    pub videos: Vec<Media>,
    pub objects: Vec<ObjectTag>,
    pub diagrams: Vec<Diagram>,

    pub(crate) elements: Vec<Element>,
    pub(crate) root: RootMarkup,
    pub(crate) ids: IdGenerator,
}

fn push_slot<T>(items: &mut Vec<T>, item: T) -> Option<usize> {
    items.push(item);
    Some(items.len() - 1)
}

/// Move the payloads of `collection` into root-list order, dropping the
/// ones no handle points at, and renumber the handles.
fn permute<T>(items: &mut Vec<T>, elements: &mut [Element], collection: Collection) {
    let mut slots: Vec<Option<T>> = std::mem::take(items).into_iter().map(Some).collect();
    for el in elements
        .iter_mut()
        .filter(|el| el.kind.collection() == Some(collection))
    {
        el.slot_index = match el
            .slot_index
            .and_then(|slot| slots.get_mut(slot))
            .and_then(Option::take)
        {
            Some(item) => push_slot(items, item),
            None => None,
        };
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the root element
    pub fn root_name(&self) -> &str {
        if self.root.name.is_empty() {
            DEFAULT_ROOT
        } else {
            &self.root.name
        }
    }

    pub fn root_attributes(&self) -> &[Attribute] {
        &self.root.attributes
    }

    /// Handles in serialization order
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Number of ids allocated so far
    pub fn ids_allocated(&self) -> u64 {
        self.ids.count()
    }

    /// Append a payload and a handle for it (builder path)
    pub fn push(&mut self, data: ElementData) -> Element {
        let element = self.store(data);
        self.elements.push(element.clone());
        element
    }

    /// Append a payload to its collection and allocate a handle for it
    /// without placing the handle in the root list.
    pub(crate) fn store(&mut self, data: ElementData) -> Element {
        let kind = data.kind();
        let id = self.ids.new_id();

        let slot = match data {
            ElementData::Unknown { name, raw } => {
                let mut element = Element::new(kind, None, id);
                element.display_name = name;
                element.raw_text = raw;
                return element;
            }
            ElementData::Meta(v) => {
                self.meta = Some(v);
                None
            }
            ElementData::Role(v) => {
                self.role = Some(v);
                None
            }
            ElementData::OutputSchema(v) => {
                self.schema = Some(v);
                None
            }
            ElementData::Task(v) => push_slot(&mut self.tasks, v),
            ElementData::Input(v) => push_slot(&mut self.inputs, v),
            ElementData::Document(v) => push_slot(&mut self.documents, v),
            ElementData::Style(v) => push_slot(&mut self.styles, v),
            ElementData::Hint(v) => push_slot(&mut self.hints, v),
            ElementData::Example(v) => push_slot(&mut self.examples, v),
            ElementData::ContentPart(v) => push_slot(&mut self.content_parts, v),
            ElementData::OutputFormat(v) => push_slot(&mut self.output_formats, v),
            ElementData::Message(v) => push_slot(&mut self.messages, v),
            ElementData::ToolDefinition(v) => push_slot(&mut self.tool_definitions, v),
            ElementData::ToolRequest(v) => push_slot(&mut self.tool_requests, v),
            ElementData::ToolResponse(v) => push_slot(&mut self.tool_responses, v),
            ElementData::ToolResult(v) => push_slot(&mut self.tool_results, v),
            ElementData::ToolError(v) => push_slot(&mut self.tool_errors, v),
            ElementData::Runtime(v) => push_slot(&mut self.runtimes, v),
            ElementData::Image(v) => push_slot(&mut self.images, v),
            ElementData::Audio(v) => push_slot(&mut self.audios, v),
            ElementData::Video(v) => push_slot(&mut self.videos, v),
            ElementData::Object(v) => push_slot(&mut self.objects, v),
            ElementData::Diagram(v) => push_slot(&mut self.diagrams, v),
        };

        Element::new(kind, slot, id)
    }

    /// Typed view of the payload `el` points at
    pub fn payload<'a>(&'a self, el: &'a Element) -> Option<Payload<'a>> {
        match el.kind {
            ElementKind::Unknown => Some(Payload::Unknown(&el.raw_text)),
            kind => self.slot_payload(kind, el.slot_index),
        }
    }

    fn slot_payload(&self, kind: ElementKind, slot: Option<usize>) -> Option<Payload<'_>> {
        let payload = match kind {
            ElementKind::Meta => Payload::Meta(self.meta.as_ref()?),
            ElementKind::Role => Payload::Role(self.role.as_ref()?),
            ElementKind::OutputSchema => Payload::OutputSchema(self.schema.as_ref()?),
            ElementKind::Task => Payload::Task(self.tasks.get(slot?)?),
            ElementKind::Input => Payload::Input(self.inputs.get(slot?)?),
            ElementKind::Document => Payload::Document(self.documents.get(slot?)?),
            ElementKind::Style => Payload::Style(self.styles.get(slot?)?),
            ElementKind::Hint => Payload::Hint(self.hints.get(slot?)?),
            ElementKind::Example => Payload::Example(self.examples.get(slot?)?),
            ElementKind::ContentPart => Payload::ContentPart(self.content_parts.get(slot?)?),
            ElementKind::OutputFormat => Payload::OutputFormat(self.output_formats.get(slot?)?),
            ElementKind::HumanMsg | ElementKind::AssistantMsg | ElementKind::SystemMsg => {
                Payload::Message(self.messages.get(slot?)?)
            }
            ElementKind::ToolDefinition => {
                Payload::ToolDefinition(self.tool_definitions.get(slot?)?)
            }
            ElementKind::ToolRequest => Payload::ToolRequest(self.tool_requests.get(slot?)?),
            ElementKind::ToolResponse => Payload::ToolResponse(self.tool_responses.get(slot?)?),
            ElementKind::ToolResult => Payload::ToolResult(self.tool_results.get(slot?)?),
            ElementKind::ToolError => Payload::ToolError(self.tool_errors.get(slot?)?),
            ElementKind::Runtime => Payload::Runtime(self.runtimes.get(slot?)?),
            ElementKind::Image => Payload::Image(self.images.get(slot?)?),
            ElementKind::Audio => Payload::Audio(self.audios.get(slot?)?),
            ElementKind::Video => Payload::Video(self.videos.get(slot?)?),
            ElementKind::Object => Payload::Object(self.objects.get(slot?)?),
            ElementKind::Diagram => Payload::Diagram(self.diagrams.get(slot?)?),
            ElementKind::Unknown => return None,
        };
        Some(payload)
    }

    pub(crate) fn payload_mut(&mut self, el: &Element) -> Option<PayloadMut<'_>> {
        let slot = el.slot_index;
        let payload = match el.kind {
            ElementKind::Meta => PayloadMut::Meta(self.meta.as_mut()?),
            ElementKind::Role => PayloadMut::Role(self.role.as_mut()?),
            ElementKind::OutputSchema => PayloadMut::OutputSchema(self.schema.as_mut()?),
            ElementKind::Task => PayloadMut::Task(self.tasks.get_mut(slot?)?),
            ElementKind::Input => PayloadMut::Input(self.inputs.get_mut(slot?)?),
            ElementKind::Document => PayloadMut::Document(self.documents.get_mut(slot?)?),
            ElementKind::Style => PayloadMut::Style(self.styles.get_mut(slot?)?),
            ElementKind::Hint => PayloadMut::Hint(self.hints.get_mut(slot?)?),
            ElementKind::Example => PayloadMut::Example(self.examples.get_mut(slot?)?),
            ElementKind::ContentPart => PayloadMut::ContentPart(self.content_parts.get_mut(slot?)?),
            ElementKind::OutputFormat => {
                PayloadMut::OutputFormat(self.output_formats.get_mut(slot?)?)
            }
            ElementKind::HumanMsg | ElementKind::AssistantMsg | ElementKind::SystemMsg => {
                PayloadMut::Message(self.messages.get_mut(slot?)?)
            }
            ElementKind::ToolDefinition => {
                PayloadMut::ToolDefinition(self.tool_definitions.get_mut(slot?)?)
            }
            ElementKind::ToolRequest => PayloadMut::ToolRequest(self.tool_requests.get_mut(slot?)?),
            ElementKind::ToolResponse => {
                PayloadMut::ToolResponse(self.tool_responses.get_mut(slot?)?)
            }
            ElementKind::ToolResult => PayloadMut::ToolResult(self.tool_results.get_mut(slot?)?),
            ElementKind::ToolError => PayloadMut::ToolError(self.tool_errors.get_mut(slot?)?),
            ElementKind::Runtime => PayloadMut::Runtime(self.runtimes.get_mut(slot?)?),
            ElementKind::Image => PayloadMut::Image(self.images.get_mut(slot?)?),
            ElementKind::Audio => PayloadMut::Audio(self.audios.get_mut(slot?)?),
            ElementKind::Video => PayloadMut::Video(self.videos.get_mut(slot?)?),
            ElementKind::Object => PayloadMut::Object(self.objects.get_mut(slot?)?),
            ElementKind::Diagram => PayloadMut::Diagram(self.diagrams.get_mut(slot?)?),
            ElementKind::Unknown => return None,
        };
        Some(payload)
    }

    fn collection_len(&self, collection: Collection) -> usize {
        match collection {
            Collection::Tasks => self.tasks.len(),
            Collection::Inputs => self.inputs.len(),
            Collection::Documents => self.documents.len(),
            Collection::Styles => self.styles.len(),
            Collection::Hints => self.hints.len(),
            Collection::Examples => self.examples.len(),
            Collection::ContentParts => self.content_parts.len(),
            Collection::OutputFormats => self.output_formats.len(),
            Collection::Messages => self.messages.len(),
            Collection::ToolDefinitions => self.tool_definitions.len(),
            Collection::ToolRequests => self.tool_requests.len(),
            Collection::ToolResponses => self.tool_responses.len(),
            Collection::ToolResults => self.tool_results.len(),
            Collection::ToolErrors => self.tool_errors.len(),
            Collection::Runtimes => self.runtimes.len(),
            Collection::Images => self.images.len(),
            Collection::Audios => self.audios.len(),
            Collection::Videos => self.videos.len(),
            Collection::Objects => self.objects.len(),
            Collection::Diagrams => self.diagrams.len(),
        }
    }

    fn singleton_present(&self, kind: ElementKind) -> bool {
        match kind {
            ElementKind::Meta => self.meta.is_some(),
            ElementKind::Role => self.role.is_some(),
            ElementKind::OutputSchema => self.schema.is_some(),
            _ => false,
        }
    }

    /// Handles for payloads that were pushed straight into the public
    /// collections, in canonical order, with the ids adoption would assign.
    fn orphan_handles(&self) -> Vec<Element> {
        let mut referenced: HashMap<Collection, HashSet<usize>> = HashMap::new();
        let mut singletons: HashSet<ElementKind> = HashSet::new();
        for el in &self.elements {
            match (el.kind.collection(), el.slot_index) {
                (Some(collection), Some(slot)) => {
                    referenced.entry(collection).or_default().insert(slot);
                }
                _ if el.kind.is_singleton() => {
                    singletons.insert(el.kind);
                }
                _ => {}
            }
        }

        let mut orphans = Vec::new();
        for kind in ElementKind::ALL {
            if kind.is_singleton() {
                if self.singleton_present(kind) && !singletons.contains(&kind) {
                    let id = self.ids.peek(orphans.len() as u64 + 1);
                    orphans.push(Element::new(kind, None, id));
                }
                continue;
            }
            // the message collection is walked once, under HumanMsg
            if matches!(kind, ElementKind::AssistantMsg | ElementKind::SystemMsg) {
                continue;
            }
            let Some(collection) = kind.collection() else {
                continue;
            };
            let seen = referenced.get(&collection);
            for slot in 0..self.collection_len(collection) {
                if seen.map_or(false, |slots| slots.contains(&slot)) {
                    continue;
                }
                let kind = match collection {
                    Collection::Messages => message_kind(self.messages[slot].role),
                    _ => kind,
                };
                let id = self.ids.peek(orphans.len() as u64 + 1);
                orphans.push(Element::new(kind, Some(slot), id));
            }
        }
        orphans
    }

    /// Give every payload without a handle a handle of its own, appended
    /// to the root list in canonical order.
    pub fn adopt_orphans(&mut self) -> usize {
        let orphans = self.orphan_handles();
        let adopted = orphans.len();
        for mut el in orphans {
            el.id = self.ids.new_id();
            self.elements.push(el);
        }
        if adopted > 0 {
            debug!(adopted, "Adopted payloads without handles");
        }
        adopted
    }

    /// Handle list including synthesized handles for orphan payloads
    pub(crate) fn resolve_order(&self) -> Cow<'_, [Element]> {
        let orphans = self.orphan_handles();
        if orphans.is_empty() {
            Cow::Borrowed(&self.elements)
        } else {
            let mut all = self.elements.clone();
            all.extend(orphans);
            Cow::Owned(all)
        }
    }

    /// Recompute every `slot_index` from the root list.
    ///
    /// Collections are reordered to follow the root list and payloads with
    /// no handle are adopted first, so nothing is lost.
    pub fn reindex(&mut self) {
        self.adopt_orphans();
        self.restack();
    }

    /// Permute every collection into root-list order, drop payloads no
    /// handle references and renumber the handles. O(n) in handles.
    pub(crate) fn restack(&mut self) {
        let elements = &mut self.elements;
        permute(&mut self.tasks, elements, Collection::Tasks);
        permute(&mut self.inputs, elements, Collection::Inputs);
        permute(&mut self.documents, elements, Collection::Documents);
        permute(&mut self.styles, elements, Collection::Styles);
        permute(&mut self.hints, elements, Collection::Hints);
        permute(&mut self.examples, elements, Collection::Examples);
        permute(&mut self.content_parts, elements, Collection::ContentParts);
        permute(&mut self.output_formats, elements, Collection::OutputFormats);
        permute(&mut self.messages, elements, Collection::Messages);
        permute(&mut self.tool_definitions, elements, Collection::ToolDefinitions);
        permute(&mut self.tool_requests, elements, Collection::ToolRequests);
        permute(&mut self.tool_responses, elements, Collection::ToolResponses);
        permute(&mut self.tool_results, elements, Collection::ToolResults);
        permute(&mut self.tool_errors, elements, Collection::ToolErrors);
        permute(&mut self.runtimes, elements, Collection::Runtimes);
        permute(&mut self.images, elements, Collection::Images);
        permute(&mut self.audios, elements, Collection::Audios);
        permute(&mut self.videos, elements, Collection::Videos);
        permute(&mut self.objects, elements, Collection::Objects);
        permute(&mut self.diagrams, elements, Collection::Diagrams);

        for kind in [ElementKind::Meta, ElementKind::Role, ElementKind::OutputSchema] {
            self.settle_singleton(kind);
        }

        for el in &self.elements {
            if el.kind.collection().is_some() && el.slot_index.is_none() {
                warn!(id = %el.id, kind = %el.kind, "Handle has no payload after re-index");
            }
        }
    }

    /// Keep a singleton slot in step with its handles. When the owning
    /// handle is gone the last shadowed occurrence is decoded into the
    /// slot; with no handle left the slot is cleared.
    fn settle_singleton(&mut self, kind: ElementKind) {
        let mut owned = false;
        let mut shadowed = None;
        for (idx, el) in self.elements.iter().enumerate() {
            if el.kind != kind {
                continue;
            }
            if el.raw_text.is_empty() {
                owned = true;
            } else {
                shadowed = Some(idx);
            }
        }
        if owned {
            return;
        }
        self.clear_singleton(kind);
        let Some(idx) = shadowed else {
            return;
        };

        let wrapped = format!(
            "<{root}>{}</{root}>",
            self.elements[idx].raw_text,
            root = DEFAULT_ROOT
        );
        let mut fragment = match crate::parser::parse_str(&wrapped) {
            Ok(fragment) => fragment,
            Err(err) => {
                warn!(
                    id = %self.elements[idx].id,
                    kind = %kind,
                    error = %err,
                    "Shadowed section no longer decodes"
                );
                return;
            }
        };
        let Some(decoded) = fragment.elements.first().cloned() else {
            return;
        };
        match kind {
            ElementKind::Meta => self.meta = fragment.meta.take(),
            ElementKind::Role => self.role = fragment.role.take(),
            ElementKind::OutputSchema => self.schema = fragment.schema.take(),
            _ => return,
        }

        let el = &mut self.elements[idx];
        debug!(id = %el.id, kind = %kind, "Promoted shadowed section");
        el.raw_text.clear();
        el.display_name = decoded.display_name;
        el.markup = decoded.markup;
    }

    fn clear_singleton(&mut self, kind: ElementKind) {
        match kind {
            ElementKind::Meta => self.meta = None,
            ElementKind::Role => self.role = None,
            ElementKind::OutputSchema => self.schema = None,
            _ => {}
        }
    }

    /// Visit every element with its payload, in serialization order
    pub fn walk<E, F>(&self, mut visitor: F) -> Result<(), E>
    where
        F: FnMut(&Element, Payload<'_>) -> Result<(), E>,
    {
        let order = self.resolve_order();
        for el in order.iter() {
            match self.payload(el) {
                Some(payload) => visitor(el, payload)?,
                None => warn!(id = %el.id, kind = %el.kind, "Skipping element without payload"),
            }
        }
        Ok(())
    }

    /// Look up a live element by id
    pub fn element_by_id(&self, id: &str) -> Option<(Element, Payload<'_>)> {
        if let Some(el) = self.elements.iter().find(|el| el.id == *id) {
            return self.payload(el).map(|payload| (el.clone(), payload));
        }
        let el = self
            .orphan_handles()
            .into_iter()
            .find(|el| el.id == *id)?;
        let payload = self.slot_payload(el.kind, el.slot_index)?;
        Some((el, payload))
    }

    /// Element ids in serialization order
    pub fn ids(&self) -> Vec<ElementId> {
        self.resolve_order().iter().map(|el| el.id.clone()).collect()
    }

    /// Trimmed text of the role section
    pub fn role_text(&self) -> String {
        self.role.as_ref().map(Block::text).unwrap_or_default()
    }

    /// Trimmed text of every task, in order
    pub fn task_bodies(&self) -> Vec<String> {
        self.tasks.iter().map(Block::text).collect()
    }

    pub fn encode(&self, options: &EncodeOptions) -> String {
        serializer::encode(self, options)
    }

    /// Atomically write the encoded document to `path`
    pub fn dump_file(&self, path: impl AsRef<Path>, options: &EncodeOptions) -> PomlResult<()> {
        serializer::dump_file(self, path, options)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validator::validate(self)
    }
}
