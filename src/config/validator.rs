//! Structural and semantic validation of the raw configuration document.
//!
//! Validation never stops at the first problem: every check runs and each
//! failure records an error message together with an actionable suggestion,
//! so a bulk config surfaces all of its defects in one pass.

use super::{BucketType, I18nConfig, LOCALE_PLACEHOLDER};
use crate::translate::ProviderId;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub error: String,
    pub suggestion: String,
}

/// Every failed check of one validation pass, in the order they ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create a new empty validation report
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, error: impl Into<String>, suggestion: impl Into<String>) {
        self.issues.push(ValidationIssue {
            error: error.into(),
            suggestion: suggestion.into(),
        });
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Error messages; index `i` pairs with `suggestions()[i]`.
    pub fn errors(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.error.as_str()).collect()
    }

    pub fn suggestions(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.suggestion.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(Box<I18nConfig>),
    Invalid(ValidationReport),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }
}

static LOCALE_REGEX: OnceLock<Regex> = OnceLock::new();

fn is_locale_code(code: &str) -> bool {
    let regex = LOCALE_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z]{2,3}([-_][a-zA-Z0-9]{2,8})*$").expect("locale regex is valid")
    });
    regex.is_match(code)
}

/// Validate a raw `i18n.json` document.
pub fn validate(raw: &Value) -> Validation {
    let mut report = ValidationReport::new();

    let Some(root) = raw.as_object() else {
        report.push(
            "Configuration must be a JSON object",
            "Start from `{\"locale\": {\"source\": \"en\", \"targets\": [\"es\"]}}`",
        );
        return Validation::Invalid(report);
    };

    check_locale(root, &mut report);
    if let Some(buckets) = root.get("buckets") {
        check_buckets(buckets, &mut report);
    }
    if let Some(provider) = root.get("provider").filter(|p| !p.is_null()) {
        check_provider(provider, &mut report);
    }

    if !report.is_empty() {
        return Validation::Invalid(report);
    }

    match serde_json::from_value::<I18nConfig>(raw.clone()) {
        Ok(config) => Validation::Valid(Box::new(config)),
        Err(e) => {
            report.push(
                format!("Configuration could not be parsed: {}", e),
                "Check the configuration against the documented i18n.json schema",
            );
            Validation::Invalid(report)
        }
    }
}

fn check_locale(root: &Map<String, Value>, report: &mut ValidationReport) {
    let Some(locale) = root.get("locale").and_then(Value::as_object) else {
        report.push(
            "Missing `locale` section",
            "Add `locale`, e.g. `{\"source\": \"en\", \"targets\": [\"es\", \"fr\"]}`",
        );
        return;
    };

    let source = match locale.get("source") {
        Some(Value::String(s)) if !s.is_empty() => {
            if is_locale_code(s) {
                Some(s.clone())
            } else {
                report.push(
                    format!("`locale.source` has an invalid locale code `{}`", s),
                    "Use a BCP-47 locale code for `locale.source`, e.g. `\"en\"` or `\"en-US\"`",
                );
                None
            }
        }
        _ => {
            report.push(
                "Missing `locale.source`",
                "Add `locale.source`, e.g. `\"en\"`",
            );
            None
        }
    };

    match locale.get("targets") {
        Some(Value::Array(targets)) if targets.is_empty() => report.push(
            "`locale.targets` is empty",
            "Add at least one target locale to `locale.targets`, e.g. `[\"es\", \"fr\"]`",
        ),
        Some(Value::Array(targets)) => {
            let mut seen = HashSet::new();
            for target in targets {
                let Some(code) = target.as_str() else {
                    report.push(
                        format!("`locale.targets` contains a non-string entry `{}`", target),
                        "List target locales as strings, e.g. `[\"es\", \"fr\"]`",
                    );
                    continue;
                };
                if !is_locale_code(code) {
                    report.push(
                        format!("`locale.targets` has an invalid locale code `{}`", code),
                        format!("Replace `{}` with a BCP-47 locale code such as `es` or `pt-BR`", code),
                    );
                }
                if !seen.insert(code) {
                    report.push(
                        format!("`locale.targets` lists `{}` more than once", code),
                        format!("Remove the duplicate `{}` from `locale.targets`", code),
                    );
                }
                if source.as_deref() == Some(code) {
                    report.push(
                        format!("`locale.targets` contains the source locale `{}`", code),
                        format!(
                            "Remove `{}` from `locale.targets`; the source locale is never a translation target",
                            code
                        ),
                    );
                }
            }
        }
        _ => report.push(
            "Missing `locale.targets`",
            "Add `locale.targets`, e.g. `[\"es\", \"fr\"]`",
        ),
    }

    match locale.get("extraSource") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if is_locale_code(s) => {}
        Some(other) => report.push(
            format!("`locale.extraSource` has an invalid value `{}`", other),
            "Set `locale.extraSource` to a locale code such as `\"en-US\"` or remove it",
        ),
    }
}

fn check_buckets(buckets: &Value, report: &mut ValidationReport) {
    let Some(buckets) = buckets.as_object() else {
        report.push(
            "`buckets` must be an object keyed by bucket type",
            "Write buckets as `{\"json\": {\"include\": [\"locales/[locale].json\"]}}`",
        );
        return;
    };

    let supported = BucketType::ALL
        .iter()
        .map(BucketType::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    for (name, entry) in buckets {
        if BucketType::from_name(name).is_none() {
            report.push(
                format!("Unsupported bucket type `{}`", name),
                format!("Use one of the supported bucket types: {}", supported),
            );
        }

        let Some(entry) = entry.as_object() else {
            report.push(
                format!("Bucket `{}` must be an object", name),
                format!(
                    "Write bucket `{}` as `{{\"include\": [\"path/[locale].ext\"]}}`",
                    name
                ),
            );
            continue;
        };

        match entry.get("include") {
            Some(Value::Array(items)) if !items.is_empty() => {
                check_patterns(name, "include", items, report)
            }
            _ => report.push(
                format!("Bucket `{}` has no `include` patterns", name),
                format!(
                    "Add `include` to bucket `{}`, e.g. `[\"locales/[locale].json\"]`",
                    name
                ),
            ),
        }

        match entry.get("exclude") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => check_patterns(name, "exclude", items, report),
            Some(_) => report.push(
                format!("Bucket `{}` has a malformed `exclude` list", name),
                format!("Make `exclude` in bucket `{}` an array of path patterns", name),
            ),
        }

        for field in ["lockedKeys", "ignoredKeys", "injectLocale"] {
            check_string_list(name, field, entry.get(field), report);
        }

        if let Some(Value::Array(patterns)) = entry.get("lockedPatterns") {
            for pattern in patterns {
                match pattern.as_str().map(Regex::new) {
                    Some(Ok(_)) => {}
                    Some(Err(e)) => report.push(
                        format!(
                            "Bucket `{}` locked pattern `{}` is not a valid regex: {}",
                            name,
                            pattern.as_str().unwrap_or_default(),
                            e
                        ),
                        "Fix the regular expression syntax of the locked pattern",
                    ),
                    None => report.push(
                        format!("Bucket `{}` has a non-string locked pattern `{}`", name, pattern),
                        "Write locked patterns as regular expression strings",
                    ),
                }
            }
        } else {
            check_string_list(name, "lockedPatterns", entry.get("lockedPatterns"), report);
        }
    }
}

fn check_patterns(bucket: &str, field: &str, items: &[Value], report: &mut ValidationReport) {
    for item in items {
        let path = match item {
            Value::String(path) => path.as_str(),
            Value::Object(obj) => {
                match obj.get("delimiter") {
                    None | Some(Value::Null) => {}
                    Some(Value::String(d)) if d == "-" || d == "_" => {}
                    Some(other) => report.push(
                        format!(
                            "Bucket `{}` {} pattern has an unsupported delimiter `{}`",
                            bucket, field, other
                        ),
                        "Use `\"-\"`, `\"_\"` or `null` as the locale delimiter",
                    ),
                }
                match obj.get("path").and_then(Value::as_str) {
                    Some(path) => path,
                    None => {
                        report.push(
                            format!("Bucket `{}` {} entry `{}` has no `path`", bucket, field, item),
                            "Write object entries as `{\"path\": \"locales/[locale].json\", \"delimiter\": \"-\"}`",
                        );
                        continue;
                    }
                }
            }
            other => {
                report.push(
                    format!("Bucket `{}` {} entry `{}` is malformed", bucket, field, other),
                    "Write each entry as a path string or a `{\"path\", \"delimiter\"}` object",
                );
                continue;
            }
        };

        if !path.contains(LOCALE_PLACEHOLDER) {
            report.push(
                format!(
                    "Bucket `{}` {} pattern `{}` is missing the [locale] placeholder",
                    bucket, field, path
                ),
                format!(
                    "Add the `[locale]` placeholder to `{}` so each locale has its own file, e.g. `locales/[locale].json`",
                    path
                ),
            );
        }

        let escapes_root = path.starts_with('/')
            || path.split(['/', '\\']).any(|segment| segment == "..");
        if escapes_root {
            report.push(
                format!("Bucket `{}` {} pattern `{}` points outside the project", bucket, field, path),
                "Use a path relative to the directory containing i18n.json",
            );
        }
    }
}

fn check_string_list(bucket: &str, field: &str, value: Option<&Value>, report: &mut ValidationReport) {
    match value {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
        Some(_) => report.push(
            format!("Bucket `{}` has a malformed `{}` list", bucket, field),
            format!("Make `{}` in bucket `{}` an array of strings", field, bucket),
        ),
    }
}

fn check_provider(provider: &Value, report: &mut ValidationReport) {
    let Some(provider) = provider.as_object() else {
        report.push(
            "`provider` must be an object",
            "Remove `provider` to use the managed backend, or set `{\"id\", \"model\", \"prompt\"}`",
        );
        return;
    };

    let supported = ProviderId::ALL
        .iter()
        .map(ProviderId::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    match provider.get("id").and_then(Value::as_str) {
        Some(id) if id.parse::<ProviderId>().is_ok() => {}
        Some(id) => report.push(
            format!("Unsupported provider `{}`", id),
            format!(
                "Use a supported provider ({}) or remove `provider` to use the managed backend",
                supported
            ),
        ),
        None => report.push(
            "Missing `provider.id`",
            format!("Set `provider.id` to a supported provider ({})", supported),
        ),
    }

    for (field, example) in [("model", "gpt-4o-mini"), ("prompt", "Translate from {source} to {target}")] {
        match provider.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            _ => report.push(
                format!("Missing `provider.{}`", field),
                format!("Set `provider.{}`, e.g. `\"{}\"`", field, example),
            ),
        }
    }

    match provider.get("baseUrl") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if url::Url::parse(s).is_ok() => {}
        Some(other) => report.push(
            format!("`provider.baseUrl` is not a valid URL: {}", other),
            "Set `provider.baseUrl` to an absolute URL such as `http://localhost:11434/v1`",
        ),
    }

    let Some(settings) = provider.get("settings").filter(|s| !s.is_null()) else {
        return;
    };
    let Some(settings) = settings.as_object() else {
        report.push(
            "`provider.settings` must be an object",
            "Write settings as `{\"temperature\": 0.2}`",
        );
        return;
    };

    match settings.get("temperature") {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) if n.as_f64().is_some_and(|t| (0.0..=2.0).contains(&t)) => {}
        Some(other) => report.push(
            format!("`provider.settings.temperature` is out of range: {}", other),
            "Set `provider.settings.temperature` to a number between 0 and 2",
        ),
    }

    match settings.get("batchSize") {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) if n.as_u64().is_some_and(|b| b >= 1) => {}
        Some(other) => report.push(
            format!("`provider.settings.batchSize` must be a positive integer, got {}", other),
            "Set `provider.settings.batchSize` to 1 or more, or remove it to send one batch",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report_of(raw: Value) -> ValidationReport {
        match validate(&raw) {
            Validation::Invalid(report) => report,
            Validation::Valid(config) => panic!("expected invalid config, got {:?}", config),
        }
    }

    // ==================== Valid Config Tests ====================

    #[test]
    fn test_valid_minimal_config() {
        let result = validate(&json!({
            "locale": { "source": "en", "targets": ["es", "fr"] }
        }));
        assert!(result.is_valid());
    }

    #[test]
    fn test_valid_complete_config() {
        let result = validate(&json!({
            "$schema": "https://example.com/schema/i18n.json",
            "version": "1.10",
            "locale": { "source": "en", "targets": ["es", "fr", "de"], "extraSource": "en-US" },
            "provider": {
                "id": "openai",
                "model": "gpt-4",
                "prompt": "Translate this text",
                "baseUrl": "https://api.openai.com",
                "settings": { "temperature": 0.1 }
            },
            "buckets": {
                "json": {
                    "include": ["locales/[locale].json", { "path": "data/[locale].json", "delimiter": "-" }],
                    "exclude": ["locales/[locale].backup.json"],
                    "lockedKeys": ["api_key"],
                    "lockedPatterns": ["^\\{\\{.*\\}\\}$"],
                    "ignoredKeys": ["debug_info"],
                    "injectLocale": ["current_locale"]
                }
            }
        }));

        match result {
            Validation::Valid(config) => {
                assert_eq!(config.locale.extra_source.as_deref(), Some("en-US"));
                assert_eq!(config.buckets[&BucketType::Json].locked_keys, vec!["api_key"]);
            }
            Validation::Invalid(report) => panic!("unexpected errors: {:?}", report.errors()),
        }
    }

    // ==================== Locale Tests ====================

    #[test]
    fn test_missing_locale_source() {
        let report = report_of(json!({ "locale": { "targets": ["es"] } }));
        assert!(report.suggestions().iter().any(|s| s.contains("locale.source")));
    }

    #[test]
    fn test_missing_locale_targets() {
        let report = report_of(json!({ "locale": { "source": "en" } }));
        assert!(report
            .suggestions()
            .iter()
            .any(|s| s.contains("Add `locale.targets`, e.g. `[\"es\", \"fr\"]`")));
    }

    #[test]
    fn test_empty_locale_targets() {
        let report = report_of(json!({ "locale": { "source": "en", "targets": [] } }));
        assert!(report.suggestions().iter().any(|s| s.contains("at least one target")));
    }

    #[test]
    fn test_source_in_targets() {
        let report = report_of(json!({ "locale": { "source": "en", "targets": ["es", "en"] } }));
        assert_eq!(report.len(), 1);
        assert!(report.errors()[0].contains("source locale `en`"));
    }

    #[test]
    fn test_duplicate_and_invalid_targets() {
        let report = report_of(json!({
            "locale": { "source": "en", "targets": ["es", "es", "not a locale", 7] }
        }));
        let errors = report.errors();
        assert!(errors.iter().any(|e| e.contains("more than once")));
        assert!(errors.iter().any(|e| e.contains("invalid locale code `not a locale`")));
        assert!(errors.iter().any(|e| e.contains("non-string")));
    }

    #[test]
    fn test_non_object_root() {
        let report = report_of(json!(["en"]));
        assert_eq!(report.len(), 1);
    }

    // ==================== Bucket Tests ====================

    #[test]
    fn test_missing_locale_placeholder_in_include() {
        let report = report_of(json!({
            "locale": { "source": "en", "targets": ["es"] },
            "buckets": { "json": { "include": ["locales/en.json"] } }
        }));
        assert!(report.errors().iter().any(|e| e.contains("[locale] placeholder")));
        assert!(report.suggestions().iter().any(|s| s.contains("[locale]")));
    }

    #[test]
    fn test_every_missing_placeholder_is_reported() {
        let report = report_of(json!({
            "locale": { "source": "en", "targets": ["es"] },
            "buckets": {
                "json": {
                    "include": [
                        "locales/en.json",
                        "locales/[locale].json",
                        { "path": "data/en.json" },
                        "more/en/strings.json"
                    ]
                }
            }
        }));

        let placeholder_issues: Vec<_> = report
            .issues()
            .iter()
            .filter(|i| i.error.contains("[locale] placeholder"))
            .collect();
        assert_eq!(placeholder_issues.len(), 3);
        assert!(placeholder_issues
            .iter()
            .all(|i| i.suggestion.contains("`[locale]` placeholder")));
    }

    #[test]
    fn test_missing_locale_placeholder_in_exclude() {
        let report = report_of(json!({
            "locale": { "source": "en", "targets": ["es"] },
            "buckets": {
                "json": {
                    "include": ["locales/[locale].json"],
                    "exclude": ["locales/backup.json"]
                }
            }
        }));
        assert!(report.errors().iter().any(|e| e.contains("exclude pattern")));
    }

    #[test]
    fn test_unsupported_bucket_type_and_bad_delimiter() {
        let report = report_of(json!({
            "locale": { "source": "en", "targets": ["es"] },
            "buckets": {
                "xliff": { "include": ["a/[locale].xlf"] },
                "json": { "include": [{ "path": "b/[locale].json", "delimiter": "." }] }
            }
        }));
        let errors = report.errors();
        assert!(errors.iter().any(|e| e.contains("Unsupported bucket type `xliff`")));
        assert!(errors.iter().any(|e| e.contains("unsupported delimiter")));
    }

    #[test]
    fn test_pattern_outside_project() {
        let report = report_of(json!({
            "locale": { "source": "en", "targets": ["es"] },
            "buckets": { "json": { "include": ["../shared/[locale].json"] } }
        }));
        assert!(report.errors().iter().any(|e| e.contains("outside the project")));
    }

    #[test]
    fn test_invalid_locked_pattern() {
        let report = report_of(json!({
            "locale": { "source": "en", "targets": ["es"] },
            "buckets": { "json": { "include": ["[locale].json"], "lockedPatterns": ["(unclosed"] } }
        }));
        assert!(report.errors().iter().any(|e| e.contains("not a valid regex")));
    }

    // ==================== Provider Tests ====================

    #[test]
    fn test_invalid_provider_id() {
        let report = report_of(json!({
            "locale": { "source": "en", "targets": ["es"] },
            "provider": { "id": "invalid-provider", "model": "test", "prompt": "test" }
        }));
        assert!(report.suggestions().iter().any(|s| s.contains("supported provider")));
    }

    #[test]
    fn test_invalid_temperature_value() {
        let report = report_of(json!({
            "locale": { "source": "en", "targets": ["es"] },
            "provider": {
                "id": "openai",
                "model": "gpt-4",
                "prompt": "test",
                "settings": { "temperature": 2.5 }
            }
        }));
        assert!(report.suggestions().iter().any(|s| s.contains("between 0 and 2")));
    }

    #[test]
    fn test_provider_missing_model_and_prompt() {
        let report = report_of(json!({
            "locale": { "source": "en", "targets": ["es"] },
            "provider": { "id": "ollama" }
        }));
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_errors_and_suggestions_are_parallel() {
        let report = report_of(json!({
            "locale": { "source": "en", "targets": [] },
            "buckets": { "json": { "include": ["a.json", "b.json"] } },
            "provider": { "id": "nope", "model": "m", "prompt": "p" }
        }));
        assert_eq!(report.errors().len(), report.suggestions().len());
        assert_eq!(report.len(), 4);
    }
}
