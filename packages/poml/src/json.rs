//! Best-effort JSON for free-form bodies and attributes
//!
//! Tool arguments, schemas and object payloads are usually JSON but are
//! written by hand. Strict JSON is always accepted; failing that, a tolerant
//! pass accepts single-quoted strings, unquoted object keys and trailing
//! commas. Anything else is handed back as the raw string.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonPayload {
    Json(Value),
    Raw(String),
}

impl JsonPayload {
    pub fn is_json(&self) -> bool {
        matches!(self, JsonPayload::Json(_))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            JsonPayload::Json(value) => Some(value),
            JsonPayload::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            JsonPayload::Raw(raw) => Some(raw),
            JsonPayload::Json(_) => None,
        }
    }
}

/// Parse `text` as JSON if at all reasonable, else keep it raw.
pub fn parse_lenient(text: &str) -> JsonPayload {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return JsonPayload::Raw(text.to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return JsonPayload::Json(value);
    }

    if let Some(normalized) = normalize(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(&normalized) {
            return JsonPayload::Json(value);
        }
    }

    JsonPayload::Raw(text.to_string())
}

/// Rewrite the tolerated JSON-isms into strict JSON. Returns `None` when
/// the input cannot be JSON-like at all (e.g. an unterminated string).
fn normalize(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = string_end(&chars, i, '"')?;
                out.extend(&chars[i..=end]);
                i = end + 1;
            }
            '\'' => {
                let end = string_end(&chars, i, '\'')?;
                out.push('"');
                let mut j = i + 1;
                while j < end {
                    match chars[j] {
                        '\\' if chars.get(j + 1) == Some(&'\'') => {
                            out.push('\'');
                            j += 2;
                        }
                        '\\' => {
                            out.push('\\');
                            if let Some(next) = chars.get(j + 1) {
                                out.push(*next);
                            }
                            j += 2;
                        }
                        '"' => {
                            out.push_str("\\\"");
                            j += 1;
                        }
                        other => {
                            out.push(other);
                            j += 1;
                        }
                    }
                }
                out.push('"');
                i = end + 1;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(',');
                }
                i += 1;
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '$' | '-'))
                {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let next = chars[i..].iter().find(|c| !c.is_whitespace());
                if next == Some(&':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    Some(out)
}

/// Index of the quote closing the string that opens at `start`
fn string_end(chars: &[char], start: usize, quote: char) -> Option<usize> {
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == quote => return Some(j),
            _ => j += 1,
        }
    }
    None
}
