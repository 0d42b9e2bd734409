//! POML document model
//!
//! Parses prompt markup into typed collections plus an ordered list of
//! element handles, supports batched structural edits with stable ids,
//! validates structure and encodes back to text, byte-for-byte when the
//! document was parsed in fidelity mode.

pub mod ast;
pub mod diagram;
pub mod document;
pub mod element;
pub mod error;
pub mod id_generator;
pub mod json;
pub mod mutations;
pub mod parser;
pub mod payload;
pub mod serializer;
pub mod tokenizer;
pub mod validator;

#[cfg(test)]
mod tests_roundtrip;

pub use ast::*;
pub use diagram::{
    Diagram, DiagramCamera, DiagramData, DiagramEdge, DiagramGraph, DiagramLayer, DiagramNode,
    DiagramStyle,
};
pub use document::Document;
pub use element::{Element, ElementId, ElementKind};
pub use error::{DecodeError, DecodeResult, PomlError, PomlResult, ValidationError, ValidationIssue};
#[cfg(feature = "pretty-errors")]
pub use error::format_error;
pub use json::{parse_lenient, JsonPayload};
pub use mutations::Mutator;
pub use parser::{
    parse, parse_file, parse_reader, parse_str, parse_str_fast, parse_str_strict, ParseOptions,
    Parser,
};
pub use payload::{ElementData, Payload, PayloadMut};
pub use serializer::{dump_file, encode, encode_to_writer, EncodeOptions, Serializer, XML_HEADER};
pub use tokenizer::{tokenize, Event, EventKind, Token};
pub use validator::{validate, Validator};
