use super::flat::{flatten, unflatten, Shape};
use super::{FlatContent, Loader, LoaderError, LocaleState};
use serde_json::{Map, Value};

const FORMAT: &str = "yaml";

/// YAML documents, optionally nested under a single `<locale>:` root key.
#[derive(Debug, Default)]
pub struct YamlLoader {
    state: LocaleState,
    root_key: bool,
    shape: Option<Shape>,
}

impl YamlLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents shaped as `<locale>: { ... }`.
    pub fn with_root_key() -> Self {
        Self {
            root_key: true,
            ..Self::default()
        }
    }

    fn unwrap_root(&self, locale: &str, value: Value) -> Value {
        if !self.root_key {
            return value;
        }
        let Value::Object(mut map) = value else {
            return value;
        };
        if map.contains_key(locale) {
            return map.remove(locale).unwrap_or(Value::Null);
        }
        // A file read on behalf of another locale still has a single root key
        if map.len() == 1 {
            return map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null);
        }
        Value::Null
    }
}

impl Loader for YamlLoader {
    type Input = String;
    type Output = String;

    fn set_default_locale(&mut self, locale: &str) {
        self.state.set(locale);
    }

    fn pull(&mut self, locale: &str, input: String) -> Result<FlatContent, LoaderError> {
        let is_default = self.state.check(locale)?;

        let parsed: Value = if input.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(&input).map_err(|e| LoaderError::Parse {
                format: FORMAT,
                message: e.to_string(),
            })?
        };

        let value = match self.unwrap_root(locale, parsed) {
            Value::Null => Value::Object(Map::new()),
            value @ Value::Object(_) => value,
            _ => {
                return Err(LoaderError::Parse {
                    format: FORMAT,
                    message: "document root must be a mapping".to_string(),
                })
            }
        };

        let (content, shape) = flatten(&value);
        if is_default {
            if content.is_empty() {
                return Err(LoaderError::Empty(locale.to_string()));
            }
            self.shape = Some(shape);
        }
        Ok(content)
    }

    fn push(&mut self, locale: &str, content: FlatContent) -> Result<String, LoaderError> {
        let shape = self
            .shape
            .as_ref()
            .ok_or_else(|| LoaderError::PushBeforePull(locale.to_string()))?;

        let mut value = unflatten(&content, shape);
        if self.root_key {
            let mut root = Map::new();
            root.insert(locale.to_string(), value);
            value = Value::Object(root);
        }

        serde_yaml::to_string(&value).map_err(|e| LoaderError::Serialize {
            format: FORMAT,
            message: e.to_string(),
        })
    }
}
