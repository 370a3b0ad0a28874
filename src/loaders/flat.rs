//! Flattening of nested documents into [`FlatContent`] and back.

use super::FlatContent;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Separator between path segments in flat keys (`nav/items/0/label`).
pub const KEY_SEPARATOR: char = '/';

/// Structural facts lost by flattening, needed to rebuild the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shape {
    /// Flat paths of containers that were arrays
    arrays: HashSet<String>,
}

impl Shape {
    pub fn is_array(&self, path: &str) -> bool {
        self.arrays.contains(path)
    }
}

/// Flatten a document into leaf paths. Scalars and nested empty containers
/// are leaves; non-empty objects and arrays are descended into. An empty
/// root flattens to no keys.
pub fn flatten(value: &Value) -> (FlatContent, Shape) {
    let mut content = FlatContent::new();
    let mut shape = Shape::default();
    walk("", value, &mut content, &mut shape);
    (content, shape)
}

/// `~` becomes `~0` and the separator `~1`, as in JSON Pointer, so keys
/// containing `/` survive a round trip.
fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace(KEY_SEPARATOR, "~1")
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", &KEY_SEPARATOR.to_string()).replace("~0", "~")
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        escape(segment)
    } else {
        format!("{}{}{}", prefix, KEY_SEPARATOR, escape(segment))
    }
}

fn walk(prefix: &str, value: &Value, content: &mut FlatContent, shape: &mut Shape) {
    let is_root = prefix.is_empty();
    match value {
        Value::Object(map) if !map.is_empty() || is_root => {
            for (key, child) in map {
                walk(&join(prefix, key), child, content, shape);
            }
        }
        Value::Array(items) if !items.is_empty() || is_root => {
            shape.arrays.insert(prefix.to_string());
            for (index, child) in items.iter().enumerate() {
                walk(&join(prefix, &index.to_string()), child, content, shape);
            }
        }
        leaf => {
            content.insert(prefix.to_string(), leaf.clone());
        }
    }
}

/// Rebuild a nested document from flat content, restoring arrays recorded
/// in `shape`. Array elements missing from `content` are compacted away.
pub fn unflatten(content: &FlatContent, shape: &Shape) -> Value {
    let mut root = Value::Object(Map::new());
    for (key, value) in content {
        insert_path(&mut root, key, value.clone());
    }
    restore_arrays(&mut root, "", shape);
    root
}

fn insert_path(root: &mut Value, key: &str, value: Value) {
    let mut current = root;
    let mut segments = key.split(KEY_SEPARATOR).peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        let segment = unescape(segment);
        if segments.peek().is_none() {
            map.insert(segment, value);
            return;
        }
        current = map
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

fn restore_arrays(value: &mut Value, path: &str, shape: &Shape) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map.iter_mut() {
        restore_arrays(child, &join(path, key), shape);
    }
    if !shape.is_array(path) {
        return;
    }

    let mut indexed = Vec::with_capacity(map.len());
    for (key, child) in map.iter() {
        match key.parse::<usize>() {
            Ok(index) => indexed.push((index, child.clone())),
            // Not index-keyed anymore; keep it an object
            Err(_) => return,
        }
    }
    indexed.sort_by_key(|(index, _)| *index);
    *value = Value::Array(indexed.into_iter().map(|(_, child)| child).collect());
}
