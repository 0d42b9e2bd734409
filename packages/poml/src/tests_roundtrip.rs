// Round-trip suite: fidelity re-emission, canonical re-encoding and edits
// on top of parsed documents.

use crate::*;
use std::convert::Infallible;

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- prompt for the docs bot -->
<poml lang="en">
  <meta>
    <id>docs-bot</id>
    <version>1.2</version>
    <owner>docs&amp;tools</owner>
  </meta>

  <role>You answer questions about the <b>manual</b>.</role>
  <task caption='Main'>Answer using <![CDATA[<context>]]> only.</task>
  <!-- inputs -->
  <input name="question" required="1"/>
  <input  name = "audience" >beginners &amp; experts</input>
  <Document src="manual.md"></Document>
  <style>
    <output format="markdown">Use headings.</output>
  </style>
  <x-custom flag="on"><nested a='1'/>text</x-custom>
  <tool name="search" description="Search the manual">{"type":"object"}</tool>
  <tool-request id="c1" name="search" parameters="{&quot;q&quot;:&quot;install&quot;}"/>
  <tool-response id="c1" name="search">found 3 pages</tool-response>
  <ai-msg>Here is what I found.</ai-msg>
  <runtime temperature="0.2"><!-- defaults --></runtime>
  <img src="diagram.png" alt="overview"/>
  <diagram id="flow" layout="dag">
    <graph>
      <node id="a" label="Start"><style color="green"/></node>
      <node id="b" label="End"/>
      <edge from="a" to="b" directed="1"/>
    </graph>
  </diagram>
  <output-schema>{'type': 'object',}</output-schema>
</poml>
<!-- end -->
"#;

fn summary(doc: &Document) -> Vec<(ElementKind, String, String)> {
    doc.elements()
        .iter()
        .map(|el| (el.kind, el.tag_name().to_string(), el.raw_text.clone()))
        .collect()
}

fn assert_same_content(a: &Document, b: &Document) {
    assert_eq!(summary(a), summary(b));
    assert_eq!(a.root_name(), b.root_name());
    assert_eq!(a.root_attributes(), b.root_attributes());
    assert_eq!(a.meta, b.meta);
    assert_eq!(a.role, b.role);
    assert_eq!(a.tasks, b.tasks);
    assert_eq!(a.inputs, b.inputs);
    assert_eq!(a.documents, b.documents);
    assert_eq!(a.styles, b.styles);
    assert_eq!(a.messages, b.messages);
    assert_eq!(a.tool_definitions, b.tool_definitions);
    assert_eq!(a.tool_requests, b.tool_requests);
    assert_eq!(a.tool_responses, b.tool_responses);
    assert_eq!(a.runtimes, b.runtimes);
    assert_eq!(a.images, b.images);
    assert_eq!(a.diagrams, b.diagrams);
    assert_eq!(a.schema, b.schema);
}

#[test]
fn test_fidelity_round_trip_is_exact() {
    let doc = parse_str(SAMPLE).unwrap();
    assert_eq!(encode(&doc, &EncodeOptions::fidelity()), SAMPLE);
}

#[test]
fn test_small_documents_round_trip() {
    for source in [
        "<poml/>",
        "<poml></poml>",
        "<poml>\n</poml>\n",
        "<root><task>t</task></root>",
        "<poml>\r\n  <task>crlf</task>\r\n</poml>\r\n",
        "<poml><!-- only trivia --></poml>",
        "<poml>stray text<task>t</task>more</poml>",
    ] {
        let doc = parse_str(source).unwrap();
        assert_eq!(encode(&doc, &EncodeOptions::fidelity()), source);
    }
}

#[test]
fn test_sample_decodes_typed_content() {
    let doc = parse_str(SAMPLE).unwrap();

    assert_eq!(doc.root_attributes(), &[Attribute::new("lang", "en")]);
    let meta = doc.meta.as_ref().unwrap();
    assert_eq!(meta.owner, "docs&tools");
    assert!(doc.inputs[0].required);
    assert_eq!(doc.inputs[1].name, "audience");
    assert_eq!(doc.documents[0].src, "manual.md");
    assert_eq!(doc.tasks[0].text(), "Answer using <context> only.");
    assert_eq!(doc.tool_requests[0].parameters, r#"{"q":"install"}"#);
    assert!(doc.tool_requests[0].arguments().is_json());
    assert!(doc.schema.as_ref().unwrap().json().is_json());
    assert_eq!(doc.runtimes[0].get("temperature"), Some("0.2"));
    assert_eq!(doc.diagrams[0].graph.nodes[0].styles[0].color, "green");
    assert!(doc.diagrams[0].validate().is_ok());

    let unknown = doc.elements().iter().find(|el| el.is_unknown()).unwrap();
    assert_eq!(unknown.raw_text, r#"<x-custom flag="on"><nested a='1'/>text</x-custom>"#);
}

#[test]
fn test_canonical_reencode_is_lossless() {
    let first = parse_str(SAMPLE).unwrap();
    for options in [
        EncodeOptions::default(),
        EncodeOptions::compact(),
        EncodeOptions::default().with_header(),
    ] {
        let text = encode(&first, &options);
        let second = parse_str(&text).unwrap();
        assert_same_content(&first, &second);
    }
}

#[test]
fn test_unknown_tag_survives_plain_encoding() {
    let doc = parse_str_fast(SAMPLE).unwrap();
    let text = encode(&doc, &EncodeOptions::default());
    assert!(text.contains(r#"<x-custom flag="on"><nested a='1'/>text</x-custom>"#));
    assert!(text.contains("<ai-msg>Here is what I found.</ai-msg>"));
    assert!(text.contains("<Document src=\"manual.md\"/>"));
}

#[test]
fn test_edited_body_changes_only_that_element() {
    let mut doc = parse_str(SAMPLE).unwrap();
    doc.mutate(|el, m| {
        if el.kind == ElementKind::Task {
            m.replace_body(el, "Answer briefly.");
        }
        Ok::<_, Infallible>(())
    })
    .unwrap();

    let expected = SAMPLE.replace("Answer using <![CDATA[<context>]]> only.", "Answer briefly.");
    assert_eq!(encode(&doc, &EncodeOptions::fidelity()), expected);
}

#[test]
fn test_edited_attribute_regenerates_start_tag() {
    let mut doc = parse_str(SAMPLE).unwrap();
    doc.images[0].alt = "system overview".to_string();

    let expected = SAMPLE.replace(
        r#"<img src="diagram.png" alt="overview"/>"#,
        r#"<img src="diagram.png" alt="system overview"/>"#,
    );
    assert_eq!(encode(&doc, &EncodeOptions::fidelity()), expected);
}

#[test]
fn test_removed_element_takes_its_leading_trivia() {
    let mut doc = parse_str(SAMPLE).unwrap();
    doc.mutate(|el, m| {
        if el.is_unknown() {
            m.remove(el);
        }
        Ok::<_, Infallible>(())
    })
    .unwrap();

    let expected = SAMPLE.replace("\n  <x-custom flag=\"on\"><nested a='1'/>text</x-custom>", "");
    assert_eq!(encode(&doc, &EncodeOptions::fidelity()), expected);
}

#[test]
fn test_insert_after_last_element_keeps_closing_layout() {
    let mut doc = parse_str(SAMPLE).unwrap();
    doc.mutate(|el, m| {
        if el.kind == ElementKind::OutputSchema {
            m.insert_after(el, ElementData::hint("Be brief."));
        }
        Ok::<_, Infallible>(())
    })
    .unwrap();

    let expected = SAMPLE.replace(
        "</output-schema>\n</poml>",
        "</output-schema>\n  <hint>Be brief.</hint>\n</poml>",
    );
    assert_eq!(encode(&doc, &EncodeOptions::fidelity()), expected);
}

#[test]
fn test_header_is_added_once() {
    let doc = parse_str("<poml><task>t</task></poml>").unwrap();
    assert_eq!(
        encode(&doc, &EncodeOptions::fidelity().with_header()),
        format!("{}<poml><task>t</task></poml>", XML_HEADER)
    );

    let doc = parse_str(SAMPLE).unwrap();
    assert_eq!(encode(&doc, &EncodeOptions::fidelity().with_header()), SAMPLE);
}

#[test]
fn test_multibyte_text_decodes_and_round_trips() {
    let source = "<poml>\n  <meta><id>été</id><version>1</version><owner>Zoë &amp; Ålund</owner></meta>\n  <role>Ünicode rôle</role>\n  <task>Résumé&amp;ü<![CDATA[<x>]]>ß</task>\n</poml>\n";
    let doc = parse_str(source).unwrap();

    let meta = doc.meta.as_ref().unwrap();
    assert_eq!(meta.id, "été");
    assert_eq!(meta.owner, "Zoë & Ålund");
    assert_eq!(doc.role_text(), "Ünicode rôle");
    assert_eq!(doc.task_bodies(), vec!["Résumé&ü<x>ß"]);
    assert_eq!(encode(&doc, &EncodeOptions::fidelity()), source);
}
