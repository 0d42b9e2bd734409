//! Structural validation of whole documents

use poml::{parse_str, parse_str_strict, Document, ElementData, ElementKind, PomlError, Validator};

const VALID: &str = r#"<poml>
  <meta><id>agent</id><version>2</version><owner>ops</owner></meta>
  <role>You operate the deploy tool.</role>
  <task>Roll back the last release.</task>
  <tool name="deploy" description="Deploy a build">{"type": "object"}</tool>
  <tool-request id="call-1" name="deploy" parameters='{"build": 41}'/>
  <tool-result id="call-1" name="deploy">ok</tool-result>
</poml>"#;

#[test]
fn test_empty_document_reports_three_sections() {
    let err = Document::new().validate().unwrap_err();
    let kinds: Vec<_> = err.issues.iter().map(|issue| issue.kind).collect();
    assert_eq!(
        kinds,
        vec![
            Some(ElementKind::Meta),
            Some(ElementKind::Role),
            Some(ElementKind::Task)
        ]
    );
}

#[test]
fn test_complete_document_is_valid() {
    let doc = parse_str_strict(VALID).unwrap();
    assert_eq!(doc.tool_results.len(), 1);
}

#[test]
fn test_cross_references_are_checked() {
    let source = VALID
        .replace(r#"<tool-result id="call-1""#, r#"<tool-result id="call-2""#)
        .replace(
            r#"<tool-request id="call-1" name="deploy""#,
            r#"<tool-request id="call-1" name="rollback""#,
        );
    let doc = parse_str(&source).unwrap();
    let err = doc.validate().unwrap_err();

    let messages: Vec<&str> = err.issues.iter().map(|issue| issue.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "tool-request \"call-1\" references unknown tool-definition \"rollback\"",
            "tool-result id \"call-2\" does not match a tool-request",
        ]
    );
}

#[test]
fn test_reply_with_other_tool_is_mismatched() {
    let source = VALID.replace(
        r#"<tool-result id="call-1" name="deploy">"#,
        r#"<tool-result id="call-1" name="status">"#,
    );
    let source = source.replace(
        "</tool>",
        "</tool>\n  <tool name=\"status\" description=\"Status\"/>",
    );
    let err = parse_str(&source).unwrap().validate().unwrap_err();

    assert_eq!(err.len(), 1);
    assert!(err.mentions("mismatched tool"));
    assert_eq!(err.issues[0].field.as_deref(), Some("name"));
}

#[test]
fn test_strict_parse_surfaces_validation_error() {
    let err = parse_str_strict("<poml><role>r</role></poml>").unwrap_err();
    let issues = err.as_validation().unwrap();
    assert!(issues.mentions("meta section is required"));
    assert!(issues.mentions("at least one task is required"));
    assert!(err.as_decode().is_none());
    assert!(matches!(err, PomlError::Validation(_)));
}

#[test]
fn test_validator_collects_every_issue() {
    let mut doc = Document::new();
    doc.push(ElementData::Meta(poml::Meta::new("", "1", "")));
    doc.push(ElementData::role("r"));
    doc.push(ElementData::task("t"));
    doc.push(ElementData::input("", false, ""));
    doc.push(ElementData::hint("  "));

    let err = Validator::new().validate(&doc).unwrap_err();
    assert_eq!(
        err.to_string(),
        "poml validation failed: meta.id is required; meta.owner is required; input.name is required; hint[0] requires body content"
    );
}

#[test]
fn test_diagram_issues_are_attributed() {
    let source = r#"<poml>
  <meta><id>a</id><version>1</version><owner>o</owner></meta>
  <role>r</role>
  <task>t</task>
  <diagram id="g"><graph><node id="a"/><edge from="a" to="z" directed="false"/></graph></diagram>
</poml>"#;
    let err = parse_str(source).unwrap().validate().unwrap_err();

    assert_eq!(err.len(), 1);
    assert_eq!(err.issues[0].kind, Some(ElementKind::Diagram));
    assert_eq!(
        err.issues[0].message,
        "diagram[0]: edge to references missing node z"
    );
}
