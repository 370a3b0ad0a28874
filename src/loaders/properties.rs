//! Java-style `.properties` files.
//!
//! Comments, blank lines and key order of the default-locale file are kept
//! when pushing; entries are re-rendered as `key=value` and keys unknown to
//! the template are appended at the end.

use super::{FlatContent, Loader, LoaderError, LocaleState};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Entry { key: String },
    Verbatim(String),
}

#[derive(Debug, Default)]
pub struct PropertiesLoader {
    state: LocaleState,
    template: Option<Vec<Line>>,
}

impl PropertiesLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Parse into template lines plus the decoded entries. A repeated key keeps
/// its last value and its last position.
fn parse(input: &str) -> (Vec<Line>, FlatContent) {
    let mut lines = Vec::new();
    let mut content = FlatContent::new();
    let mut physical = input.lines();

    while let Some(raw) = physical.next() {
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            lines.push(Line::Verbatim(raw.to_string()));
            continue;
        }

        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match physical.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        if content.contains_key(&key) {
            lines.retain(|line| !matches!(line, Line::Entry { key: seen } if *seen == key));
        }
        lines.push(Line::Entry { key: key.clone() });
        content.insert(key, Value::String(value));
    }

    (lines, content)
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (String, String) {
    let mut key_end = line.len();
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' || c.is_whitespace() {
            key_end = index;
            break;
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start();
    if let Some(stripped) = rest.strip_prefix(|c: char| c == '=' || c == ':') {
        rest = stripped.trim_start();
    }
    (unescape(key), unescape(rest))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || index == 0 => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}

fn render_entry(key: &str, value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("{}={}", escape(key, true), escape(&text, false))
}

impl Loader for PropertiesLoader {
    type Input = String;
    type Output = String;

    fn set_default_locale(&mut self, locale: &str) {
        self.state.set(locale);
    }

    fn pull(&mut self, locale: &str, input: String) -> Result<FlatContent, LoaderError> {
        let is_default = self.state.check(locale)?;
        let (lines, content) = parse(&input);

        if is_default {
            if content.is_empty() {
                return Err(LoaderError::Empty(locale.to_string()));
            }
            self.template = Some(lines);
        }
        Ok(content)
    }

    fn push(&mut self, locale: &str, content: FlatContent) -> Result<String, LoaderError> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| LoaderError::PushBeforePull(locale.to_string()))?;

        let mut written = HashSet::new();
        let mut output = Vec::with_capacity(template.len());
        for line in template {
            match line {
                Line::Verbatim(raw) => output.push(raw.clone()),
                Line::Entry { key } => {
                    if let Some(value) = content.get(key) {
                        if written.insert(key.as_str()) {
                            output.push(render_entry(key, value));
                        }
                    }
                }
            }
        }
        for (key, value) in &content {
            if !written.contains(key.as_str()) {
                output.push(render_entry(key, value));
            }
        }

        let mut text = output.join("\n");
        text.push('\n');
        Ok(text)
    }
}
