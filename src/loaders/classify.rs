//! Classification of values that carry no human-language text.
//!
//! Only the stored type and shape count: `1` and `true` are unlocalizable,
//! while the strings `"1.0"` and `"false"` stay translatable.

use super::FlatContent;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

fn system_id_regex() -> &'static Regex {
    static SYSTEM_ID: OnceLock<Regex> = OnceLock::new();
    SYSTEM_ID.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{20,}$").expect("Invalid system ID regex"))
}

/// Whether `value` should be kept out of translation.
pub fn is_unlocalizable(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(text) => is_unlocalizable_text(text.trim()),
    }
}

fn is_unlocalizable_text(text: &str) -> bool {
    text.is_empty() || is_iso_date(text) || is_url(text) || is_system_id(text)
}

fn is_iso_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

fn is_url(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    match Url::parse(text) {
        Ok(url) => url.host().is_some() || url.scheme() == "mailto",
        Err(_) => false,
    }
}

/// Long opaque tokens such as database IDs or API keys.
fn is_system_id(text: &str) -> bool {
    system_id_regex().is_match(text)
        && text.chars().any(|c| c.is_ascii_digit())
        && text.chars().any(|c| c.is_ascii_alphabetic())
}

/// Split content into `(localizable, unlocalizable)`, both in source order.
pub fn partition(content: FlatContent) -> (FlatContent, FlatContent) {
    let mut localizable = FlatContent::new();
    let mut unlocalizable = FlatContent::new();
    for (key, value) in content {
        if is_unlocalizable(&value) {
            unlocalizable.insert(key, value);
        } else {
            localizable.insert(key, value);
        }
    }
    (localizable, unlocalizable)
}
