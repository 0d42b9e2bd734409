//! Error types for the POML document model

use crate::element::ElementKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for decoding operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for the public entry points
pub type PomlResult<T> = Result<T, PomlError>;

/// Malformed input. There is never a partial document alongside one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid syntax at line {line}: {message}")]
    InvalidSyntax {
        line: usize,
        offset: usize,
        message: String,
    },

    #[error("Unexpected end of input at line {line}: expected {expected}")]
    UnexpectedEof {
        line: usize,
        offset: usize,
        expected: String,
    },

    #[error("Mismatched end tag at line {line}: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        line: usize,
        offset: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected root element at line {line}: expected <{expected}>, found <{found}>")]
    UnexpectedRoot {
        line: usize,
        offset: usize,
        expected: String,
        found: String,
    },
}

impl DecodeError {
    pub fn invalid_syntax(source: &str, offset: usize, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            line: line_of(source, offset),
            offset,
            message: message.into(),
        }
    }

    pub fn unexpected_eof(source: &str, expected: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            line: line_of(source, source.len()),
            offset: source.len(),
            expected: expected.into(),
        }
    }

    pub fn mismatched_tag(
        source: &str,
        offset: usize,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::MismatchedTag {
            line: line_of(source, offset),
            offset,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unexpected_root(
        source: &str,
        offset: usize,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::UnexpectedRoot {
            line: line_of(source, offset),
            offset,
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// 1-based line of the offending input
    pub fn line(&self) -> usize {
        match self {
            DecodeError::InvalidSyntax { line, .. }
            | DecodeError::UnexpectedEof { line, .. }
            | DecodeError::MismatchedTag { line, .. }
            | DecodeError::UnexpectedRoot { line, .. } => *line,
        }
    }

    /// Byte offset of the offending input
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::InvalidSyntax { offset, .. }
            | DecodeError::UnexpectedEof { offset, .. }
            | DecodeError::MismatchedTag { offset, .. }
            | DecodeError::UnexpectedRoot { offset, .. } => *offset,
        }
    }

    fn label(&self) -> String {
        match self {
            DecodeError::InvalidSyntax { message, .. } => message.clone(),
            DecodeError::UnexpectedEof { expected, .. } => format!("expected {}", expected),
            DecodeError::MismatchedTag { expected, .. } => format!("expected </{}>", expected),
            DecodeError::UnexpectedRoot { expected, .. } => format!("expected <{}>", expected),
        }
    }
}

/// Computes the 1-based line containing `offset`.
pub(crate) fn line_of(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

/// One structural problem found by the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Offending kind. Sub-validators may leave this empty; the document
    /// validator fills in the parent kind when merging.
    pub kind: Option<ElementKind>,
    pub field: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(kind: ElementKind, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            field: None,
            message: message.into(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.field) {
            (Some(kind), Some(field)) => write!(f, "[{}.{}] {}", kind, field, self.message),
            (Some(kind), None) => write!(f, "[{}] {}", kind, self.message),
            (None, Some(field)) => write!(f, "[{}] {}", field, self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

/// Every violation found in one validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Issues reported against `kind`
    pub fn for_kind(&self, kind: ElementKind) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |issue| issue.kind == Some(kind))
    }

    /// Whether any issue message contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.issues.iter().any(|issue| issue.message.contains(needle))
    }

    pub(crate) fn into_result(self) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poml validation failed: ")?;
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(&issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Error returned by the public parse/encode entry points
#[derive(Error, Debug)]
pub enum PomlError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PomlError {
    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            PomlError::Decode(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            PomlError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Pretty-print a decode error with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_error(source: &str, filename: &str, error: &DecodeError) -> String {
    use ariadne::{Color, Config, Label, Report, ReportKind, Source};

    // ariadne spans count chars, decode offsets count bytes
    let offset = error.offset();
    let chars = source.chars().count();
    let start = source
        .char_indices()
        .take_while(|(idx, _)| *idx < offset)
        .count()
        .min(chars.saturating_sub(1));
    let end = (start + 1).min(chars).max(start);

    let mut output = Vec::new();
    let report = Report::build(ReportKind::Error, filename, start)
        .with_config(Config::default().with_color(false))
        .with_message(error.to_string())
        .with_label(
            Label::new((filename, start..end))
                .with_color(Color::Red)
                .with_message(error.label()),
        )
        .finish();

    if report
        .write((filename, Source::from(source)), &mut output)
        .is_err()
    {
        return error.to_string();
    }

    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}
