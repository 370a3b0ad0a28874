use super::{FlatContent, Loader, LoaderError, LocaleState};
use serde_json::Value;

/// Plain text pulled out of a rendered document, one entry per paragraph
/// keyed by its index. Read-only: there is no document to render back into.
#[derive(Debug, Default)]
pub struct ExtractedTextLoader {
    state: LocaleState,
}

impl ExtractedTextLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

impl Loader for ExtractedTextLoader {
    type Input = String;
    type Output = String;

    fn set_default_locale(&mut self, locale: &str) {
        self.state.set(locale);
    }

    fn pull(&mut self, locale: &str, input: String) -> Result<FlatContent, LoaderError> {
        let is_default = self.state.check(locale)?;
        let content: FlatContent = paragraphs(&input)
            .into_iter()
            .enumerate()
            .map(|(index, paragraph)| (index.to_string(), Value::String(paragraph)))
            .collect();

        if is_default && content.is_empty() {
            return Err(LoaderError::Empty(locale.to_string()));
        }
        Ok(content)
    }

    fn push(&mut self, _locale: &str, _content: FlatContent) -> Result<String, LoaderError> {
        Err(LoaderError::PushUnsupported("extracted"))
    }

    fn supports_push(&self) -> bool {
        false
    }
}
