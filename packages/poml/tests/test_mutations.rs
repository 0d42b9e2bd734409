//! Mutation passes over parsed documents: stable ids, re-indexing and
//! encoder output after structural edits

use poml::{parse_str, ElementData, ElementId, ElementKind, EncodeOptions, Payload};
use std::convert::Infallible;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

const PROMPT: &str = r#"<root><meta><id>x</id><version>1</version><owner>me</owner></meta><role>r</role><task>t</task></root>"#;

#[test]
fn test_removing_role_leaves_one_issue() {
    init_tracing();
    let mut doc = parse_str(PROMPT).unwrap();
    assert!(doc.validate().is_ok());

    doc.mutate(|el, m| {
        if el.kind == ElementKind::Role {
            m.remove(el);
        }
        Ok::<_, Infallible>(())
    })
    .unwrap();

    let err = doc.validate().unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err.issues[0].kind, Some(ElementKind::Role));
    assert!(doc.role.is_none());
}

#[test]
fn test_inserted_task_follows_last_task_in_canonical_order() {
    init_tracing();
    let source = "<poml><hint>h</hint><task>t1</task><role>r</role><task>t2</task></poml>";
    let mut doc = parse_str(source).unwrap();
    let last_task = doc
        .elements()
        .iter()
        .rev()
        .find(|el| el.kind == ElementKind::Task)
        .cloned()
        .unwrap();

    doc.mutate(|el, m| {
        if el.id == last_task.id {
            m.insert_after(el, ElementData::task("t3"));
        }
        Ok::<_, Infallible>(())
    })
    .unwrap();

    let options = EncodeOptions {
        compact: true,
        ..EncodeOptions::canonical()
    };
    assert_eq!(
        doc.encode(&options),
        "<poml><role>r</role><task>t1</task><task>t2</task><task>t3</task><hint>h</hint></poml>"
    );
    assert_eq!(doc.task_bodies(), vec!["t1", "t2", "t3"]);
}

#[test]
fn test_ids_survive_unrelated_edits() {
    let mut doc = parse_str("<poml><task>a</task><task>b</task><task>c</task></poml>").unwrap();
    let before = doc.ids();

    doc.mutate(|el, m| {
        if el.id == before[0] {
            m.remove(el);
        }
        if el.id == before[2] {
            m.insert_before(el, ElementData::hint("h"));
        }
        Ok::<_, Infallible>(())
    })
    .unwrap();

    let after = doc.ids();
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[1]);
    assert_eq!(after[2], before[2]);
    assert!(!after.contains(&before[0]));

    // retired ids are never handed out again
    let fresh = doc.push(ElementData::task("d"));
    assert!(!before.contains(&fresh.id));
    assert_ne!(fresh.id, after[1]);
}

#[test]
fn test_lookup_by_id_after_restack() {
    let mut doc = parse_str("<poml><task>a</task><task>b</task></poml>").unwrap();
    let second: ElementId = doc.ids()[1].clone();

    doc.mutate(|el, m| {
        if el.id != second {
            m.remove(el);
        }
        Ok::<_, Infallible>(())
    })
    .unwrap();

    let (el, payload) = doc.element_by_id(second.as_str()).unwrap();
    assert_eq!(el.slot_index, Some(0));
    assert!(matches!(payload, Payload::Task(block) if block.body == "b"));
}

#[test]
fn test_replace_body_keeps_source_layout() {
    let source = "<poml>\n  <role id=\"r\">old</role>\n  <!-- keep -->\n  <task>t</task>\n</poml>\n";
    let mut doc = parse_str(source).unwrap();

    doc.mutate(|el, m| {
        if el.kind == ElementKind::Role {
            assert!(m.replace_body(el, "new"));
        }
        Ok::<_, Infallible>(())
    })
    .unwrap();

    assert_eq!(
        doc.encode(&EncodeOptions::fidelity()),
        "<poml>\n  <role id=\"r\">new</role>\n  <!-- keep -->\n  <task>t</task>\n</poml>\n"
    );
}

#[test]
fn test_direct_collection_edits_are_adopted() {
    let mut doc = parse_str("<poml><task>a</task></poml>").unwrap();
    doc.hints.push(poml::Block::new("appended"));
    doc.reindex();

    let kinds: Vec<ElementKind> = doc.elements().iter().map(|el| el.kind).collect();
    assert_eq!(kinds, vec![ElementKind::Task, ElementKind::Hint]);
    assert_eq!(
        doc.encode(&EncodeOptions::compact()),
        "<poml><task>a</task><hint>appended</hint></poml>"
    );
}

const TWO_METAS: &str = "<poml><meta><id>a</id><version>1</version><owner>o</owner></meta><meta><id>b</id><version>2</version><owner>o</owner></meta><role>r</role><task>t</task></poml>";

#[test]
fn test_removing_live_singleton_promotes_earlier_occurrence() {
    init_tracing();
    let mut doc = parse_str(TWO_METAS).unwrap();
    assert_eq!(doc.meta.as_ref().unwrap().id, "b");
    let first = doc.ids()[0].clone();

    doc.mutate(|el, m| {
        if el.kind == ElementKind::Meta && el.raw_text.is_empty() {
            m.remove(el);
        }
        Ok::<_, Infallible>(())
    })
    .unwrap();

    assert_eq!(doc.meta.as_ref().unwrap().id, "a");
    let (el, payload) = doc.element_by_id(first.as_str()).unwrap();
    assert!(el.raw_text.is_empty());
    assert!(matches!(payload, Payload::Meta(meta) if meta.version == "1"));
    assert_eq!(
        doc.encode(&EncodeOptions::fidelity()),
        "<poml><meta><id>a</id><version>1</version><owner>o</owner></meta><role>r</role><task>t</task></poml>"
    );
    assert!(doc.validate().is_ok());
}

#[test]
fn test_removing_shadowed_singleton_keeps_live_one() {
    let mut doc = parse_str(TWO_METAS).unwrap();

    doc.mutate(|el, m| {
        if el.kind == ElementKind::Meta && !el.raw_text.is_empty() {
            m.remove(el);
        }
        Ok::<_, Infallible>(())
    })
    .unwrap();
    assert_eq!(doc.meta.as_ref().unwrap().id, "b");

    doc.mutate(|el, m| {
        if el.kind == ElementKind::Meta {
            m.remove(el);
        }
        Ok::<_, Infallible>(())
    })
    .unwrap();
    assert!(doc.meta.is_none());
    assert_eq!(
        doc.encode(&EncodeOptions::fidelity()),
        "<poml><role>r</role><task>t</task></poml>"
    );
}
