use super::{FlatContent, Loader, LoaderError, LocaleState};

/// Identity loader for content that already arrives flat, such as the
/// `{key: sourceText}` dictionaries produced by a source-code scanner.
#[derive(Debug, Default)]
pub struct DictionaryLoader {
    state: LocaleState,
    default_pulled: bool,
}

impl DictionaryLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Loader for DictionaryLoader {
    type Input = FlatContent;
    type Output = FlatContent;

    fn set_default_locale(&mut self, locale: &str) {
        self.state.set(locale);
    }

    fn pull(&mut self, locale: &str, input: FlatContent) -> Result<FlatContent, LoaderError> {
        if self.state.check(locale)? {
            if input.is_empty() {
                return Err(LoaderError::Empty(locale.to_string()));
            }
            self.default_pulled = true;
        }
        Ok(input)
    }

    fn push(&mut self, locale: &str, content: FlatContent) -> Result<FlatContent, LoaderError> {
        if !self.default_pulled {
            return Err(LoaderError::PushBeforePull(locale.to_string()));
        }
        Ok(content)
    }
}
