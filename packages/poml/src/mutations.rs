//! # Mutation Passes
//!
//! Structural edits run inside [`Document::mutate`]. The visitor sees a
//! snapshot of the handle list taken when the pass starts, so removals never
//! skip or repeat a handle and elements inserted during the pass are not
//! visited by it.
//!
//! Edits are batched. Body replacement and insertion touch the typed
//! collections immediately (insertions append); removals and the new root
//! order are applied once, at commit, followed by a single re-index.

use crate::document::Document;
use crate::element::{Element, ElementId};
use crate::payload::{ElementData, Payload, PayloadMut};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// Edit handle passed to a mutation visitor
pub struct Mutator<'doc> {
    doc: &'doc mut Document,
    /// Ids in the snapshot the pass iterates
    snapshot: HashSet<ElementId>,
    /// Ids inserted during the pass
    pending: HashSet<ElementId>,
    removed: HashSet<ElementId>,
    before: HashMap<ElementId, Vec<Element>>,
    after: HashMap<ElementId, Vec<Element>>,
    structural: bool,
    modified: usize,
}

enum Step {
    Visit(Element),
    Emit(Element),
}

impl<'doc> Mutator<'doc> {
    fn new(doc: &'doc mut Document, snapshot: &[Element]) -> Self {
        Self {
            doc,
            snapshot: snapshot.iter().map(|el| el.id.clone()).collect(),
            pending: HashSet::new(),
            removed: HashSet::new(),
            before: HashMap::new(),
            after: HashMap::new(),
            structural: false,
            modified: 0,
        }
    }

    /// Whether `id` names an element that still exists in this pass
    pub fn is_live(&self, id: &ElementId) -> bool {
        !self.removed.contains(id) && (self.snapshot.contains(id) || self.pending.contains(id))
    }

    pub fn payload<'a>(&'a self, el: &'a Element) -> Option<Payload<'a>> {
        if !self.is_live(&el.id) {
            return None;
        }
        self.doc.payload(el)
    }

    /// Mutable access to an element's record
    pub fn payload_mut(&mut self, el: &Element) -> Option<PayloadMut<'_>> {
        if !self.is_live(&el.id) {
            return None;
        }
        self.modified += 1;
        self.doc.payload_mut(el)
    }

    /// Overwrite the textual body in place. No-op returning `false` for
    /// kinds without a body, a style without outputs, or a dead handle.
    pub fn replace_body(&mut self, el: &Element, text: impl Into<String>) -> bool {
        if !self.is_live(&el.id) {
            return false;
        }
        match self.doc.payload_mut(el).and_then(PayloadMut::body_mut) {
            Some(body) => {
                *body = text.into();
                self.modified += 1;
                true
            }
            None => false,
        }
    }

    /// Remove the element and its payload. The id is retired.
    pub fn remove(&mut self, el: &Element) -> bool {
        if !self.is_live(&el.id) {
            return false;
        }
        self.removed.insert(el.id.clone());
        self.structural = true;
        true
    }

    /// Insert a new element directly after `anchor`.
    ///
    /// Each call places its element right next to the anchor, so repeated
    /// calls on the same anchor in one pass come out in reverse call order.
    pub fn insert_after(&mut self, anchor: &Element, data: ElementData) -> Option<Element> {
        let element = self.insert(anchor, data)?;
        self.after
            .entry(anchor.id.clone())
            .or_default()
            .insert(0, element.clone());
        Some(element)
    }

    /// Insert a new element directly before `anchor`. Repeated calls on the
    /// same anchor keep call order.
    pub fn insert_before(&mut self, anchor: &Element, data: ElementData) -> Option<Element> {
        let element = self.insert(anchor, data)?;
        self.before
            .entry(anchor.id.clone())
            .or_default()
            .push(element.clone());
        Some(element)
    }

    fn insert(&mut self, anchor: &Element, data: ElementData) -> Option<Element> {
        if !self.is_live(&anchor.id) {
            return None;
        }
        let mut element = self.doc.store(data);
        element.parent_id = anchor.parent_id.clone();
        self.pending.insert(element.id.clone());
        self.structural = true;
        Some(element)
    }

    fn commit(self) {
        let Mutator {
            doc,
            removed,
            mut before,
            mut after,
            structural,
            modified,
            pending,
            ..
        } = self;

        if !structural {
            debug!(modified, "Committed mutation pass");
            return;
        }

        let old = std::mem::take(&mut doc.elements);
        let old_last = old
            .last()
            .map(|el| (el.id.clone(), el.trailing_trivia.clone()));

        let mut order = Vec::with_capacity(old.len() + pending.len());
        let mut stack: Vec<Step> = old.into_iter().rev().map(Step::Visit).collect();
        while let Some(step) = stack.pop() {
            match step {
                Step::Emit(el) => order.push(el),
                Step::Visit(el) => {
                    if let Some(inserted) = after.remove(&el.id) {
                        stack.extend(inserted.into_iter().rev().map(Step::Visit));
                    }
                    let inserted = before.remove(&el.id);
                    if !removed.contains(&el.id) {
                        stack.push(Step::Emit(el));
                    }
                    if let Some(inserted) = inserted {
                        stack.extend(inserted.into_iter().rev().map(Step::Visit));
                    }
                }
            }
        }

        // closing trivia follows the last element
        if let Some((last_id, trivia)) = old_last {
            let still_last = order.last().map_or(false, |el| el.id == last_id);
            if !still_last && !trivia.is_empty() {
                if let Some(prev) = order.iter_mut().find(|el| el.id == last_id) {
                    prev.trailing_trivia.clear();
                }
                match order.last_mut() {
                    Some(last) => last.trailing_trivia.push_str(&trivia),
                    None => doc.root.empty_inner = trivia,
                }
            }
        }

        doc.elements = order;
        doc.restack();

        debug!(
            removed = removed.len(),
            inserted = pending.len(),
            modified,
            elements = doc.elements.len(),
            "Committed mutation pass"
        );
    }
}

impl Document {
    /// Run a batched mutation pass over a snapshot of the elements.
    ///
    /// The pass stops at the first visitor error; edits made up to that
    /// point are still committed.
    #[instrument(skip(self, visitor), fields(elements = self.elements.len()))]
    pub fn mutate<E, F>(&mut self, mut visitor: F) -> Result<(), E>
    where
        F: FnMut(&Element, &mut Mutator<'_>) -> Result<(), E>,
    {
        self.adopt_orphans();
        let snapshot = self.elements.clone();
        let mut mutator = Mutator::new(self, &snapshot);

        let mut result = Ok(());
        for el in &snapshot {
            if mutator.removed.contains(&el.id) {
                continue;
            }
            if let Err(err) = visitor(el, &mut mutator) {
                result = Err(err);
                break;
            }
        }

        mutator.commit();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Block;
    use crate::element::ElementKind;
    use crate::parser::parse_str;
    use crate::serializer::EncodeOptions;
    use std::convert::Infallible;

    fn tasks(doc: &mut Document, bodies: &[&str]) -> Vec<Element> {
        bodies
            .iter()
            .map(|body| doc.push(ElementData::task(*body)))
            .collect()
    }

    fn check_slots(doc: &Document) {
        for el in doc.elements() {
            if el.kind.collection().is_some() {
                assert!(doc.payload(el).is_some(), "dangling handle {}", el.id);
            }
        }
    }

    #[test]
    fn test_remove_middle_keeps_ids_and_slots() {
        let mut doc = Document::new();
        let els = tasks(&mut doc, &["a", "b", "c"]);

        doc.mutate(|el, m| {
            if el.id == els[1].id {
                m.remove(el);
            }
            Ok::<_, Infallible>(())
        })
        .unwrap();

        let ids: Vec<&str> = doc.elements().iter().map(|el| el.id.as_str()).collect();
        assert_eq!(ids, vec!["el-1", "el-3"]);
        assert_eq!(doc.task_bodies(), vec!["a", "c"]);
        assert_eq!(doc.elements()[1].slot_index, Some(1));
        check_slots(&doc);
    }

    #[test]
    fn test_insert_positions() {
        let mut doc = Document::new();
        let els = tasks(&mut doc, &["a", "b"]);

        doc.mutate(|el, m| {
            if el.id == els[0].id {
                m.insert_before(el, ElementData::hint("before-1"));
                m.insert_before(el, ElementData::hint("before-2"));
                m.insert_after(el, ElementData::hint("after-2"));
                m.insert_after(el, ElementData::hint("after-1"));
            }
            Ok::<_, Infallible>(())
        })
        .unwrap();

        let bodies: Vec<&str> = doc
            .elements()
            .iter()
            .filter_map(|el| doc.payload(el).and_then(|p| p.body()))
            .collect();
        assert_eq!(bodies, vec!["before-1", "before-2", "a", "after-1", "after-2", "b"]);
        check_slots(&doc);
    }

    #[test]
    fn test_inserted_elements_are_not_visited() {
        let mut doc = Document::new();
        tasks(&mut doc, &["a", "b"]);

        let mut visited = 0;
        doc.mutate(|el, m| {
            visited += 1;
            m.insert_after(el, ElementData::task("new"));
            Ok::<_, Infallible>(())
        })
        .unwrap();

        assert_eq!(visited, 2);
        assert_eq!(doc.task_bodies(), vec!["a", "new", "b", "new"]);
    }

    #[test]
    fn test_insert_relative_to_pending_element() {
        let mut doc = Document::new();
        tasks(&mut doc, &["a"]);

        doc.mutate(|el, m| {
            if let Some(new) = m.insert_after(el, ElementData::task("b")) {
                m.insert_after(&new, ElementData::task("c"));
            }
            Ok::<_, Infallible>(())
        })
        .unwrap();

        assert_eq!(doc.task_bodies(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dead_handles_are_no_ops() {
        let mut doc = Document::new();
        let els = tasks(&mut doc, &["a"]);
        let ghost = Element::new(ElementKind::Task, Some(0), ElementId::from_counter(99));

        doc.mutate(|el, m| {
            assert!(m.remove(el));
            assert!(!m.remove(el));
            assert!(!m.replace_body(el, "x"));
            assert!(m.insert_after(el, ElementData::task("t")).is_none());
            assert!(!m.replace_body(&ghost, "x"));
            assert!(m.payload(&ghost).is_none());
            Ok::<_, Infallible>(())
        })
        .unwrap();

        assert!(doc.elements().is_empty());
        assert!(doc.tasks.is_empty());
        assert!(doc.element_by_id(els[0].id.as_str()).is_none());
    }

    #[test]
    fn test_replace_body_per_kind() {
        let mut doc = Document::new();
        doc.push(ElementData::task("old"));
        doc.push(ElementData::Runtime(Default::default()));

        doc.mutate(|el, m| {
            let replaced = m.replace_body(el, "new");
            assert_eq!(replaced, el.kind == ElementKind::Task);
            Ok::<_, Infallible>(())
        })
        .unwrap();

        assert_eq!(doc.task_bodies(), vec!["new"]);
    }

    #[test]
    fn test_visitor_error_still_commits() {
        let mut doc = Document::new();
        tasks(&mut doc, &["a", "b", "c"]);

        let result = doc.mutate(|el, m| {
            m.remove(el);
            if el.id == "el-2" {
                return Err("stop");
            }
            Ok(())
        });

        assert_eq!(result, Err("stop"));
        assert_eq!(doc.task_bodies(), vec!["c"]);
    }

    #[test]
    fn test_removing_singleton_clears_payload() {
        let mut doc = Document::new();
        doc.push(ElementData::role("r"));
        doc.push(ElementData::task("t"));

        doc.mutate(|el, m| {
            if el.kind == ElementKind::Role {
                m.remove(el);
            }
            Ok::<_, Infallible>(())
        })
        .unwrap();

        assert!(doc.role.is_none());
        assert_eq!(doc.elements().len(), 1);
    }

    #[test]
    fn test_orphans_are_adopted_before_the_pass() {
        let mut doc = Document::new();
        doc.tasks.push(Block::new("orphan"));

        let mut seen = Vec::new();
        doc.mutate(|el, _| {
            seen.push(el.id.clone());
            Ok::<_, Infallible>(())
        })
        .unwrap();

        assert_eq!(seen.len(), 1);
        assert_eq!(doc.elements()[0].slot_index, Some(0));
    }

    #[test]
    fn test_closing_trivia_moves_to_new_last() {
        let source = "<poml>\n  <task>a</task>\n  <task>b</task>\n</poml>";
        let mut doc = parse_str(source).unwrap();

        doc.mutate(|el, m| {
            if el.id == "el-2" {
                m.remove(el);
            }
            Ok::<_, Infallible>(())
        })
        .unwrap();
        assert_eq!(
            doc.encode(&EncodeOptions::fidelity()),
            "<poml>\n  <task>a</task>\n</poml>"
        );

        doc.mutate(|el, m| {
            m.insert_after(el, ElementData::task("c"));
            Ok::<_, Infallible>(())
        })
        .unwrap();
        assert_eq!(
            doc.encode(&EncodeOptions::fidelity()),
            "<poml>\n  <task>a</task>\n  <task>c</task>\n</poml>"
        );

        doc.mutate(|el, m| {
            m.remove(el);
            Ok::<_, Infallible>(())
        })
        .unwrap();
        assert_eq!(doc.encode(&EncodeOptions::fidelity()), "<poml>\n</poml>");
    }
}
