//! Recovery of the `data` object from free-form model output.
//!
//! Models wrap the JSON they were asked for in prose ("Sure! Here is...",
//! "Let me know if..."), and sometimes emit JSON-ish text with bare keys,
//! single quotes or trailing commas. Extraction slices from the first `{`
//! to the last `}`, tries a strict parse and falls back to a repair pass.

use crate::loaders::FlatContent;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponseParseError {
    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("response JSON could not be repaired: {0}")]
    Unrepairable(String),

    #[error("response JSON has no data object")]
    MissingData,
}

/// Extract the translated `data` map from a model response.
///
/// When `data` is itself a string, it is searched once more for an embedded
/// object.
pub fn extract_data(text: &str) -> Result<FlatContent, ResponseParseError> {
    let outer = extract_object(text)?;
    match outer.get("data") {
        Some(Value::Object(data)) => Ok(data.clone()),
        Some(Value::String(inner)) => {
            let nested = extract_object(inner)?;
            match nested.get("data") {
                Some(Value::Object(data)) => Ok(data.clone()),
                Some(_) => Err(ResponseParseError::MissingData),
                None => Ok(nested),
            }
        }
        _ => Err(ResponseParseError::MissingData),
    }
}

/// Find and parse the outermost JSON object in `text`.
pub fn extract_object(text: &str) -> Result<Map<String, Value>, ResponseParseError> {
    let start = text.find('{').ok_or(ResponseParseError::NoJsonObject)?;
    let candidate = match text.rfind('}') {
        Some(end) if end > start => &text[start..=end],
        _ => return Err(ResponseParseError::NoJsonObject),
    };

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
        return Ok(map);
    }

    let repaired = repair_json(candidate);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ResponseParseError::NoJsonObject),
        Err(e) => Err(ResponseParseError::Unrepairable(e.to_string())),
    }
}

/// Best-effort conversion of JSON-like text into strict JSON.
///
/// Handles bare keys, single-quoted strings, trailing commas, comments and
/// Python/JavaScript literals. Unclosed strings and containers are left
/// open, so truncated output still fails to parse.
pub fn repair_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut open: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out);
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
                continue;
            }
            '{' | '[' => {
                open.push(c);
                out.push(c);
            }
            '}' | ']' => {
                drop_trailing_comma(&mut out);
                let expected = if c == '}' { '{' } else { '[' };
                if open.last() == Some(&expected) {
                    open.pop();
                    out.push(c);
                }
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '.' | '-' | '+'))
                {
                    i += 1;
                }
                let token: String = chars[start..i].iter().collect();
                out.push_str(token.trim_start_matches('+'));
                continue;
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '$' | '-' | '.'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let is_key = chars[i..]
                    .iter()
                    .find(|ch| !ch.is_whitespace())
                    .is_some_and(|ch| *ch == ':');
                match literal(&word) {
                    Some(lit) if !is_key => out.push_str(lit),
                    _ => out.push_str(&quote(&word)),
                }
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }

    out
}

/// Copy a string literal starting at `start`, re-quoted with `"`.
/// Returns the index after the closing quote.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote_char = chars[start];
    let mut i = start + 1;
    out.push('"');
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                match chars.get(i + 1) {
                    // \' is not a JSON escape
                    Some('\'') => out.push('\''),
                    Some(next) => {
                        out.push('\\');
                        out.push(*next);
                    }
                    None => {}
                }
                i += 2;
                continue;
            }
            c if c == quote_char => {
                out.push('"');
                return i + 1;
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
        i += 1;
    }
    i
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

fn literal(word: &str) -> Option<&'static str> {
    match word {
        "true" | "True" => Some("true"),
        "false" | "False" => Some("false"),
        "null" | "None" | "Null" | "undefined" | "nil" => Some("null"),
        _ => None,
    }
}

fn quote(word: &str) -> String {
    Value::String(word.to_string()).to_string()
}
