//! Token reader for POML markup
//!
//! The lexer frames the input into markup events (start tag, end tag, text,
//! comment, CDATA, processing instruction, declaration). Start tags are
//! decoded into a name plus attributes; everything else is kept as a span
//! into the source so callers can slice the exact original text.

use crate::ast::Attribute;
use crate::error::{DecodeError, DecodeResult};
use logos::{Lexer, Logos};
use std::borrow::Cow;
use std::ops::Range;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    #[token("<!--", lex_comment)]
    Comment,

    #[token("<![CDATA[", lex_cdata)]
    CData,

    #[token("<?", lex_instruction)]
    Instruction,

    #[regex(r"<![A-Za-z]", lex_declaration)]
    Declaration,

    #[token("</", lex_end_tag)]
    EndTag,

    #[regex(r"<[A-Za-z_:]", lex_start_tag)]
    StartTag,

    #[regex(r"[^<]+")]
    Text,
}

fn bump_past(lex: &mut Lexer<Token>, terminator: &str) -> bool {
    match lex.remainder().find(terminator) {
        Some(idx) => {
            lex.bump(idx + terminator.len());
            true
        }
        None => false,
    }
}

fn lex_comment(lex: &mut Lexer<Token>) -> bool {
    bump_past(lex, "-->")
}

fn lex_cdata(lex: &mut Lexer<Token>) -> bool {
    bump_past(lex, "]]>")
}

fn lex_instruction(lex: &mut Lexer<Token>) -> bool {
    bump_past(lex, "?>")
}

fn lex_declaration(lex: &mut Lexer<Token>) -> bool {
    bump_past(lex, ">")
}

fn lex_end_tag(lex: &mut Lexer<Token>) -> bool {
    let rest = lex.remainder();
    match rest.find(|c: char| c == '>' || c == '<') {
        Some(idx) if rest.as_bytes()[idx] == b'>' => {
            lex.bump(idx + 1);
            true
        }
        _ => false,
    }
}

/// Scans to the closing `>` of a start tag, skipping quoted attribute values.
fn lex_start_tag(lex: &mut Lexer<Token>) -> bool {
    let rest = lex.remainder();
    let mut quote: Option<u8> = None;
    for (idx, &byte) in rest.as_bytes().iter().enumerate() {
        match quote {
            Some(q) if byte == q => quote = None,
            Some(_) => {}
            None => match byte {
                b'"' | b'\'' => quote = Some(byte),
                b'>' => {
                    lex.bump(idx + 1);
                    return true;
                }
                b'<' => return false,
                _ => {}
            },
        }
    }
    false
}

/// A decoded start tag
#[derive(Debug, Clone, PartialEq)]
pub struct StartTag<'src> {
    pub name: &'src str,
    pub attributes: Vec<Attribute>,
    pub self_closing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind<'src> {
    StartTag(StartTag<'src>),
    EndTag { name: &'src str },
    Text,
    CData,
    Comment,
    Instruction,
    Declaration,
}

/// One framed piece of markup with its byte span in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Event<'src> {
    pub kind: EventKind<'src>,
    pub span: Range<usize>,
}

impl<'src> Event<'src> {
    /// Text, comments and other markup that may sit between elements
    pub fn is_trivia(&self) -> bool {
        !matches!(self.kind, EventKind::StartTag(_) | EventKind::EndTag { .. })
    }

    pub fn start_tag(&self) -> Option<&StartTag<'src>> {
        match &self.kind {
            EventKind::StartTag(tag) => Some(tag),
            _ => None,
        }
    }
}

/// Frame the whole input into events
pub fn tokenize(source: &str) -> DecodeResult<Vec<Event<'_>>> {
    let mut lexer = Token::lexer(source);
    let mut events = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let token = match result {
            Ok(token) => token,
            Err(()) => return Err(lex_error(source, span.start)),
        };

        let kind = match token {
            Token::StartTag => EventKind::StartTag(parse_start_tag(source, span.clone())?),
            Token::EndTag => EventKind::EndTag {
                name: parse_end_tag(source, span.clone())?,
            },
            Token::Text => {
                if let Err(err) = decode_entities(&source[span.clone()]) {
                    return Err(DecodeError::invalid_syntax(
                        source,
                        span.start + err.offset,
                        err.message,
                    ));
                }
                EventKind::Text
            }
            Token::CData => EventKind::CData,
            Token::Comment => EventKind::Comment,
            Token::Instruction => EventKind::Instruction,
            Token::Declaration => EventKind::Declaration,
        };

        events.push(Event { kind, span });
    }

    Ok(events)
}

fn lex_error(source: &str, offset: usize) -> DecodeError {
    let rest = &source[offset..];
    let message = if rest.starts_with("<!--") {
        "unterminated comment"
    } else if rest.starts_with("<![CDATA[") {
        "unterminated CDATA section"
    } else if rest.starts_with("<?") {
        "unterminated processing instruction"
    } else if rest.starts_with("</") {
        "malformed end tag"
    } else if rest.starts_with("<!") {
        "malformed declaration"
    } else if rest.len() > 1 && is_name_start(rest[1..].chars().next().unwrap_or(' ')) {
        "malformed start tag"
    } else {
        "unexpected '<'"
    };
    DecodeError::invalid_syntax(source, offset, message)
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-' || c == '.'
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start(first) => chars.all(is_name_char),
        _ => false,
    }
}

fn parse_end_tag(source: &str, span: Range<usize>) -> DecodeResult<&str> {
    let text = &source[span.clone()];
    let name = text[2..text.len() - 1].trim_end();
    if !is_valid_name(name) {
        return Err(DecodeError::invalid_syntax(
            source,
            span.start,
            format!("invalid end tag name '{}'", name),
        ));
    }
    Ok(name)
}

fn parse_start_tag(source: &str, span: Range<usize>) -> DecodeResult<StartTag<'_>> {
    let text = &source[span.clone()];
    let (inner, self_closing) = if text.ends_with("/>") {
        (&text[1..text.len() - 2], true)
    } else {
        (&text[1..text.len() - 1], false)
    };

    let name_end = inner
        .find(|c: char| c.is_whitespace())
        .unwrap_or(inner.len());
    let name = &inner[..name_end];
    if !is_valid_name(name) {
        return Err(DecodeError::invalid_syntax(
            source,
            span.start,
            format!("invalid tag name '{}'", name),
        ));
    }

    let attributes = parse_attributes(source, &inner[name_end..], span.start + 1 + name_end)?;

    Ok(StartTag {
        name,
        attributes,
        self_closing,
    })
}

fn parse_attributes(source: &str, text: &str, base: usize) -> DecodeResult<Vec<Attribute>> {
    let mut attributes: Vec<Attribute> = Vec::new();
    let bytes = text.as_bytes();
    let mut pos = 0;

    let skip_ws = |pos: &mut usize| {
        let start = *pos;
        while *pos < bytes.len() && bytes[*pos].is_ascii_whitespace() {
            *pos += 1;
        }
        *pos - start
    };

    loop {
        let ws = skip_ws(&mut pos);
        if pos >= bytes.len() {
            break;
        }
        let at = base + pos;
        if ws == 0 {
            return Err(DecodeError::invalid_syntax(
                source,
                at,
                "expected whitespace between attributes",
            ));
        }

        let name_start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'=' {
            pos += 1;
        }
        let name = &text[name_start..pos];
        if !is_valid_name(name) {
            return Err(DecodeError::invalid_syntax(
                source,
                at,
                format!("invalid attribute name '{}'", name),
            ));
        }

        skip_ws(&mut pos);
        if pos >= bytes.len() || bytes[pos] != b'=' {
            return Err(DecodeError::invalid_syntax(
                source,
                at,
                format!("attribute '{}' has no value", name),
            ));
        }
        pos += 1;
        skip_ws(&mut pos);

        let quote = match bytes.get(pos) {
            Some(&q) if q == b'"' || q == b'\'' => q,
            _ => {
                return Err(DecodeError::invalid_syntax(
                    source,
                    base + pos,
                    format!("value of attribute '{}' must be quoted", name),
                ))
            }
        };
        let value_start = pos + 1;
        let value_len = match bytes[value_start..].iter().position(|b| *b == quote) {
            Some(len) => len,
            None => {
                return Err(DecodeError::invalid_syntax(
                    source,
                    base + pos,
                    format!("unterminated value for attribute '{}'", name),
                ))
            }
        };
        let raw = &text[value_start..value_start + value_len];
        pos = value_start + value_len + 1;

        if let Some(lt) = raw.find('<') {
            return Err(DecodeError::invalid_syntax(
                source,
                base + value_start + lt,
                format!("unescaped '<' in attribute '{}'", name),
            ));
        }
        let value = decode_entities(raw).map_err(|err| {
            DecodeError::invalid_syntax(source, base + value_start + err.offset, err.message)
        })?;

        if attributes.iter().any(|attr| attr.name == name) {
            return Err(DecodeError::invalid_syntax(
                source,
                at,
                format!("duplicate attribute '{}'", name),
            ));
        }
        attributes.push(Attribute::new(name, value));
    }

    Ok(attributes)
}

/// Failure to decode an entity reference, relative to the decoded text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityError {
    pub offset: usize,
    pub message: String,
}

/// Decode the predefined and numeric character references in `raw`.
pub fn decode_entities(raw: &str) -> Result<Cow<'_, str>, EntityError> {
    if !raw.contains('&') {
        return Ok(Cow::Borrowed(raw));
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut consumed = 0;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let offset = consumed + amp;
        let after = &rest[amp + 1..];
        let semi = after.find(';').ok_or_else(|| EntityError {
            offset,
            message: "unterminated entity reference".to_string(),
        })?;
        let entity = &after[..semi];
        let decoded = resolve_entity(entity).ok_or_else(|| EntityError {
            offset,
            message: format!("invalid entity reference '&{};'", entity),
        })?;
        out.push(decoded);

        let advance = amp + 1 + semi + 1;
        rest = &rest[advance..];
        consumed += advance;
    }
    out.push_str(rest);

    Ok(Cow::Owned(out))
}

fn resolve_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// Character data of a raw body: CDATA sections unwrapped, entity
/// references decoded. Nested markup is left untouched and unknown
/// references are kept as written.
pub fn decode_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<![CDATA[") {
            match after.find("]]>") {
                Some(end) => {
                    out.push_str(&after[..end]);
                    rest = &after[end + 3..];
                }
                None => {
                    out.push_str(after);
                    rest = "";
                }
            }
            continue;
        }

        if rest.starts_with('&') {
            if let Some(semi) = rest.find(';') {
                if let Some(c) = resolve_entity(&rest[1..semi]) {
                    out.push(c);
                    rest = &rest[semi + 1..];
                    continue;
                }
            }
            out.push('&');
            rest = &rest[1..];
            continue;
        }

        let first = rest.chars().next().map_or(1, char::len_utf8);
        let next = rest[first..]
            .find(|c: char| c == '&' || c == '<')
            .map(|idx| idx + first)
            .unwrap_or(rest.len());
        out.push_str(&rest[..next]);
        rest = &rest[next..];
    }

    out
}

/// Escape character data for use between tags
pub fn escape_text(text: &str) -> Cow<'_, str> {
    if !text.contains(&['&', '<', '>'][..]) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Escape an attribute value for use inside double quotes
pub fn escape_attr(value: &str) -> Cow<'_, str> {
    if !value.contains(&['&', '<', '>', '"', '\n', '\r', '\t'][..]) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' => out.push_str("&#x9;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}
