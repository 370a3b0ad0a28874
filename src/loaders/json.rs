use super::flat::{flatten, unflatten, Shape};
use super::{FlatContent, Loader, LoaderError, LocaleState};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

const FORMAT: &str = "json";

/// Nested JSON documents with an object at the root.
#[derive(Debug, Default)]
pub struct JsonLoader {
    state: LocaleState,
    template: Option<JsonTemplate>,
}

/// Layout of the default-locale document, reused for every push.
#[derive(Debug)]
struct JsonTemplate {
    shape: Shape,
    indent: String,
    trailing_newline: bool,
}

impl JsonLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Leading whitespace of the first indented line, two spaces if none.
fn detect_indent(input: &str) -> String {
    input
        .lines()
        .skip(1)
        .map(|line| {
            let body = line.trim_start();
            &line[..line.len() - body.len()]
        })
        .find(|indent| !indent.is_empty())
        .unwrap_or("  ")
        .to_string()
}

impl Loader for JsonLoader {
    type Input = String;
    type Output = String;

    fn set_default_locale(&mut self, locale: &str) {
        self.state.set(locale);
    }

    fn pull(&mut self, locale: &str, input: String) -> Result<FlatContent, LoaderError> {
        let is_default = self.state.check(locale)?;

        if input.trim().is_empty() {
            if is_default {
                return Err(LoaderError::Empty(locale.to_string()));
            }
            return Ok(FlatContent::new());
        }

        let value: Value = serde_json::from_str(&input).map_err(|e| LoaderError::Parse {
            format: FORMAT,
            message: e.to_string(),
        })?;
        if !value.is_object() {
            return Err(LoaderError::Parse {
                format: FORMAT,
                message: "document root must be an object".to_string(),
            });
        }

        let (content, shape) = flatten(&value);
        if is_default {
            if content.is_empty() {
                return Err(LoaderError::Empty(locale.to_string()));
            }
            self.template = Some(JsonTemplate {
                shape,
                indent: detect_indent(&input),
                trailing_newline: input.ends_with('\n'),
            });
        }
        Ok(content)
    }

    fn push(&mut self, locale: &str, content: FlatContent) -> Result<String, LoaderError> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| LoaderError::PushBeforePull(locale.to_string()))?;

        let value = unflatten(&content, &template.shape);

        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(template.indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        value
            .serialize(&mut serializer)
            .map_err(|e| LoaderError::Serialize {
                format: FORMAT,
                message: e.to_string(),
            })?;

        let mut output = String::from_utf8(buffer).map_err(|e| LoaderError::Serialize {
            format: FORMAT,
            message: e.to_string(),
        })?;
        if template.trailing_newline {
            output.push('\n');
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SOURCE: &str = "{\n    \"greeting\": \"Hello\",\n    \"menu\": {\n        \"items\": [\"Home\", \"About\"]\n    }\n}\n";

    fn loader() -> JsonLoader {
        JsonLoader::new().with_default_locale("en")
    }

    #[test]
    fn test_pull_flattens_document() {
        let mut loader = loader();
        let content = loader.pull("en", SOURCE.to_string()).expect("Should pull");

        assert_eq!(content["greeting"], json!("Hello"));
        assert_eq!(content["menu/items/1"], json!("About"));
        assert_eq!(content.len(), 3);
    }

    #[test]
    fn test_push_keeps_indentation_and_arrays() {
        let mut loader = loader();
        let mut content = loader.pull("en", SOURCE.to_string()).expect("Should pull");
        content.insert("greeting".to_string(), json!("Hola"));
        content.insert("menu/items/0".to_string(), json!("Inicio"));
        content.insert("menu/items/1".to_string(), json!("Acerca de"));

        let output = loader.push("es", content).expect("Should push");

        assert_eq!(
            output,
            "{\n    \"greeting\": \"Hola\",\n    \"menu\": {\n        \"items\": [\n            \"Inicio\",\n            \"Acerca de\"\n        ]\n    }\n}\n"
        );
    }

    #[test]
    fn test_default_locale_round_trip_is_stable() {
        let source = "{\n  \"a\": \"x\",\n  \"b\": {\n    \"c\": \"y\"\n  }\n}\n";
        let mut loader = loader();
        let content = loader.pull("en", source.to_string()).expect("Should pull");
        assert_eq!(loader.push("en", content).expect("Should push"), source);
    }

    #[test]
    fn test_keys_with_slashes_keep_their_structure() {
        let source = "{\n  \"errors/404\": \"Not found\",\n  \"a\": \"b\"\n}\n";
        let mut loader = loader();
        let mut content = loader.pull("en", source.to_string()).expect("Should pull");
        assert_eq!(content["errors~1404"], json!("Not found"));

        content.insert("errors~1404".to_string(), json!("No encontrado"));
        assert_eq!(
            loader.push("es", content).expect("Should push"),
            "{\n  \"errors/404\": \"No encontrado\",\n  \"a\": \"b\"\n}\n"
        );
    }

    #[test]
    fn test_empty_source_fails() {
        let mut loader = loader();
        assert!(matches!(
            loader.pull("en", "   ".to_string()),
            Err(LoaderError::Empty(_))
        ));
        assert!(matches!(
            loader.pull("en", "{}".to_string()),
            Err(LoaderError::Empty(_))
        ));
    }

    #[test]
    fn test_empty_target_is_allowed() {
        let mut loader = loader();
        let content = loader.pull("es", String::new()).expect("Should pull");
        assert!(content.is_empty());
    }

    #[test]
    fn test_non_object_root_fails() {
        let mut loader = loader();
        assert!(matches!(
            loader.pull("en", "[1, 2]".to_string()),
            Err(LoaderError::Parse { .. })
        ));
    }

    #[test]
    fn test_push_before_pull_fails() {
        let mut loader = loader();
        assert!(matches!(
            loader.push("es", FlatContent::new()),
            Err(LoaderError::PushBeforePull(_))
        ));
    }
}
