//! Integration tests for the localization pipeline
//!
//! These tests drive whole runs through the public API: a config file on
//! disk, real locale files in a temp directory, and a mocked translation
//! backend.

use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

use l10n_pipeline::config::{self, ConfigError};
use l10n_pipeline::loaders::LoaderError;
use l10n_pipeline::pipeline::{
    discover, Lockfile, Pipeline, RunOptions, UnitError, UnitState, LOCKFILE_NAME,
};
use l10n_pipeline::retry::RetryConfig;
use l10n_pipeline::settings::{Settings, SettingsFile};
use l10n_pipeline::translate::{TranslateError, Translator, TranslatorOptions};

// ==================== Test Helpers ====================

fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("Failed to create dirs");
    fs::write(path, content).expect("Failed to write file");
}

fn write_config(root: &Path, config: Value) -> config::I18nConfig {
    let path = root.join(config::DEFAULT_CONFIG_FILE);
    fs::write(&path, serde_json::to_string_pretty(&config).expect("serialize"))
        .expect("Failed to write config");
    config::load(&path).expect("Config should be valid")
}

fn read_json(root: &Path, relative: &str) -> Value {
    let text = fs::read_to_string(root.join(relative)).expect("Failed to read output");
    serde_json::from_str(&text).expect("Output should be JSON")
}

fn no_retry() -> TranslatorOptions {
    TranslatorOptions {
        retry: RetryConfig::disabled(),
        retry_parse_errors: false,
    }
}

/// Settings as if only the given environment variables were set.
fn settings_with(vars: &[(&str, String)]) -> Settings {
    let vars = vars.to_vec();
    Settings::from_sources(
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
        },
        &SettingsFile::default(),
    )
}

/// Managed backend stub: uppercases every value and tags it with the locale.
fn managed_echo(request: &Request) -> ResponseTemplate {
    let body: Value = serde_json::from_slice(&request.body).expect("JSON body");
    let target = body["targetLocale"].as_str().unwrap_or_default().to_string();
    let data: serde_json::Map<String, Value> = body["data"]
        .as_object()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let text = value.as_str().unwrap_or_default().to_uppercase();
            (key, json!(format!("{}:{}", target, text)))
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
}

fn managed_translator(server: &MockServer) -> Translator {
    let settings = settings_with(&[
        ("L10N_API_KEY", "test-key".to_string()),
        ("L10N_API_URL", server.uri()),
    ]);
    Translator::resolve(None, &settings, no_retry()).expect("Managed backend should resolve")
}

// ==================== End-to-End Run Tests ====================

#[tokio::test]
async fn test_managed_run_writes_every_format() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    write_file(
        root,
        "locales/en.json",
        r#"{
  "home": { "title": "Welcome", "links": ["Docs", "Blog"] },
  "homepage": "https://example.com",
  "released": "2025-02-21"
}
"#,
    );
    write_file(root, "config/en.yml", "en:\n  save: Save\n  retries: 3\n");
    write_file(
        root,
        "res/messages_en.properties",
        "# Buttons\nbutton.ok=OK\nbutton.cancel=Cancel\n",
    );

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/i18n"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(managed_echo)
        .mount(&server)
        .await;

    let config = write_config(
        root,
        json!({
            "locale": { "source": "en", "targets": ["de"] },
            "buckets": {
                "json": { "include": ["locales/[locale].json"] },
                "yaml-root-key": { "include": ["config/[locale].yml"] },
                "properties": { "include": ["res/messages_[locale].properties"] }
            }
        }),
    );

    let pipeline = Pipeline::new(
        config,
        root,
        managed_translator(&server),
        RunOptions::default(),
    );
    let summary = pipeline.run().await.expect("Run should complete");

    assert!(summary.is_success(), "failed units: {:?}", summary.failed().collect::<Vec<_>>());
    assert_eq!(summary.units.len(), 3);
    assert!(summary.units.iter().all(|u| u.state == UnitState::Written));

    assert_eq!(
        read_json(root, "locales/de.json"),
        json!({
            "home": { "title": "de:WELCOME", "links": ["de:DOCS", "de:BLOG"] },
            "homepage": "https://example.com",
            "released": "2025-02-21"
        })
    );

    let yaml: serde_yaml::Value = serde_yaml::from_str(
        &fs::read_to_string(root.join("config/de.yml")).expect("read yaml"),
    )
    .expect("valid YAML");
    assert_eq!(yaml["de"]["save"], serde_yaml::Value::from("de:SAVE"));
    assert_eq!(yaml["de"]["retries"], serde_yaml::Value::from(3));

    let properties =
        fs::read_to_string(root.join("res/messages_de.properties")).expect("read properties");
    assert!(properties.starts_with("# Buttons\n"));
    assert!(properties.contains("button.ok=de:OK"));
    assert!(properties.contains("button.cancel=de:CANCEL"));

    let lockfile = Lockfile::load(&root.join(LOCKFILE_NAME)).expect("Lockfile should load");
    assert_eq!(lockfile.checksums.len(), 3);
}

#[tokio::test]
async fn test_rerun_without_source_changes_makes_no_requests() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    write_file(root, "locales/en.json", "{\n  \"title\": \"Welcome\"\n}\n");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/i18n"))
        .respond_with(managed_echo)
        .expect(2)
        .mount(&server)
        .await;

    let config = write_config(
        root,
        json!({
            "locale": { "source": "en", "targets": ["de", "fr"] },
            "buckets": { "json": { "include": ["locales/[locale].json"] } }
        }),
    );

    let first = Pipeline::new(
        config.clone(),
        root,
        managed_translator(&server),
        RunOptions::default(),
    )
    .run()
    .await
    .expect("Run should complete");
    assert_eq!(first.metrics.units_written, 2);

    let second = Pipeline::new(
        config,
        root,
        managed_translator(&server),
        RunOptions::default(),
    )
    .run()
    .await
    .expect("Run should complete");
    assert!(second.is_success());
    assert_eq!(second.metrics.units_unchanged, 2);
    assert_eq!(second.metrics.api_calls, 0);
}

#[tokio::test]
async fn test_force_retranslates_everything() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    write_file(root, "locales/en.json", r#"{"title": "Welcome"}"#);
    write_file(root, "locales/de.json", r#"{"title": "Hand-edited"}"#);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/i18n"))
        .respond_with(managed_echo)
        .mount(&server)
        .await;

    let config = write_config(
        root,
        json!({
            "locale": { "source": "en", "targets": ["de"] },
            "buckets": { "json": { "include": ["locales/[locale].json"] } }
        }),
    );

    let summary = Pipeline::new(
        config.clone(),
        root,
        managed_translator(&server),
        RunOptions::default(),
    )
    .run()
    .await
    .expect("Run should complete");
    assert!(summary.is_success());
    assert_eq!(summary.metrics.api_calls, 0);
    assert_eq!(read_json(root, "locales/de.json"), json!({"title": "Hand-edited"}));

    let forced = Pipeline::new(
        config,
        root,
        managed_translator(&server),
        RunOptions {
            force: true,
            ..RunOptions::default()
        },
    )
    .run()
    .await
    .expect("Run should complete");
    assert_eq!(forced.units[0].state, UnitState::Written);
    assert_eq!(read_json(root, "locales/de.json"), json!({"title": "de:WELCOME"}));
}

// ==================== Raw Provider Tests ====================

#[tokio::test]
async fn test_raw_provider_chatty_response() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    write_file(root, "locales/en.json", r#"{"cta": "Sign up", "brand": "Acme"}"#);

    let reply = "Sure! Here is the translation:\n\n{\n  \"sourceLocale\": \"en\",\n  \"targetLocale\": \"es\",\n  \"data\": {\n    \"cta\": \"Regístrate\"\n  }\n}\n\nLet me know if you need anything else!";

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": reply } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = write_config(
        root,
        json!({
            "locale": { "source": "en", "targets": ["es"] },
            "buckets": {
                "json": { "include": ["locales/[locale].json"], "lockedKeys": ["brand"] }
            },
            "provider": {
                "id": "openai",
                "model": "gpt-4o-mini",
                "prompt": "Translate from {source} to {target}.",
                "baseUrl": server.uri()
            }
        }),
    );

    let settings = settings_with(&[("OPENAI_API_KEY", "sk-test".to_string())]);
    let translator = Translator::resolve(config.provider.as_ref(), &settings, no_retry())
        .expect("Provider should resolve");
    assert_eq!(translator.backend_name(), "OpenAI");

    let summary = Pipeline::new(config, root, translator, RunOptions::default())
        .run()
        .await
        .expect("Run should complete");

    assert!(summary.is_success());
    assert_eq!(
        read_json(root, "locales/es.json"),
        json!({"cta": "Regístrate", "brand": "Acme"})
    );
}

#[tokio::test]
async fn test_unparseable_response_fails_only_that_unit() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    write_file(root, "locales/en.json", r#"{"cta": "Sign up"}"#);

    // The French request gets prose without any JSON in it
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(|request: &Request| {
            let body = String::from_utf8_lossy(&request.body);
            let content = if body.contains("To fr") {
                "I cannot help with that."
            } else {
                "{\"data\": {\"cta\": \"Anmelden\"}}"
            };
            ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            }))
        })
        .mount(&server)
        .await;

    let config = write_config(
        root,
        json!({
            "locale": { "source": "en", "targets": ["de", "fr"] },
            "buckets": { "json": { "include": ["locales/[locale].json"] } },
            "provider": {
                "id": "ollama",
                "model": "llama3",
                "prompt": "To {target}",
                "baseUrl": server.uri()
            }
        }),
    );

    let translator = Translator::resolve(config.provider.as_ref(), &settings_with(&[]), no_retry())
        .expect("Ollama needs no key");
    let summary = Pipeline::new(config, root, translator, RunOptions::default())
        .run()
        .await
        .expect("Run should complete");

    assert!(!summary.is_success());
    let failed: Vec<_> = summary.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id.locale, "fr");
    assert!(matches!(
        failed[0].error,
        Some(UnitError::Translate(TranslateError::Parse { .. }))
    ));

    assert_eq!(read_json(root, "locales/de.json"), json!({"cta": "Anmelden"}));
    assert!(!root.join("locales/fr.json").exists());
    assert!(!root.join(LOCKFILE_NAME).exists());
}

#[tokio::test]
async fn test_truncated_response_is_not_written() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    write_file(root, "locales/en.json", r#"{"title": "Hello", "body": "Text"}"#);

    // Output cut off mid-value, as when the model hits its token limit
    let reply = "Sure! {\"sourceLocale\":\"en\",\"targetLocale\":\"es\",\"data\":{\"title\":\"Hola\",\"body\":\"Tex";
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": reply } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = write_config(
        root,
        json!({
            "locale": { "source": "en", "targets": ["es"] },
            "buckets": { "json": { "include": ["locales/[locale].json"] } },
            "provider": {
                "id": "ollama",
                "model": "llama3",
                "prompt": "To {target}",
                "baseUrl": server.uri()
            }
        }),
    );

    let translator = Translator::resolve(config.provider.as_ref(), &settings_with(&[]), no_retry())
        .expect("Ollama needs no key");
    let summary = Pipeline::new(config, root, translator, RunOptions::default())
        .run()
        .await
        .expect("Run should complete");

    assert!(!summary.is_success());
    assert!(matches!(
        summary.units[0].error,
        Some(UnitError::Translate(TranslateError::Parse { .. }))
    ));
    assert!(!root.join("locales/es.json").exists());
    assert!(!root.join(LOCKFILE_NAME).exists());
}

// ==================== Failure Isolation Tests ====================

#[tokio::test]
async fn test_backend_error_is_reported_per_unit() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    write_file(root, "locales/en.json", r#"{"title": "Welcome"}"#);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/i18n"))
        .and(body_partial_json(json!({"targetLocale": "ja"})))
        .respond_with(ResponseTemplate::new(400).set_body_string("unsupported locale"))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/i18n"))
        .respond_with(managed_echo)
        .mount(&server)
        .await;

    let config = write_config(
        root,
        json!({
            "locale": { "source": "en", "targets": ["de", "ja", "fr"] },
            "buckets": { "json": { "include": ["locales/[locale].json"] } }
        }),
    );

    let summary = Pipeline::new(
        config,
        root,
        managed_translator(&server),
        RunOptions {
            concurrency: 2,
            ..RunOptions::default()
        },
    )
    .run()
    .await
    .expect("Run should complete");

    assert_eq!(summary.metrics.units_written, 2);
    assert_eq!(summary.metrics.units_failed, 1);
    let failed: Vec<_> = summary.failed().collect();
    assert_eq!(failed[0].id.locale, "ja");
    assert!(matches!(
        failed[0].error,
        Some(UnitError::Translate(TranslateError::Api { status: 400, .. }))
    ));
    assert!(root.join("locales/de.json").exists());
    assert!(root.join("locales/fr.json").exists());
}

#[tokio::test]
async fn test_read_only_bucket_fails_before_translating() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    write_file(root, "docs/en.txt", "First paragraph.\n\nSecond paragraph.\n");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/i18n"))
        .respond_with(managed_echo)
        .expect(0)
        .mount(&server)
        .await;

    let config = write_config(
        root,
        json!({
            "locale": { "source": "en", "targets": ["de"] },
            "buckets": { "extracted": { "include": ["docs/[locale].txt"] } }
        }),
    );

    let summary = Pipeline::new(
        config,
        root,
        managed_translator(&server),
        RunOptions::default(),
    )
    .run()
    .await
    .expect("Run should complete");

    assert_eq!(summary.units[0].state, UnitState::Errored);
    assert!(matches!(
        summary.units[0].error,
        Some(UnitError::Loader(LoaderError::PushUnsupported(_)))
    ));
    assert!(!root.join("docs/de.txt").exists());
}

// ==================== Config & Discovery Tests ====================

#[test]
fn test_invalid_config_reports_every_missing_placeholder() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join(config::DEFAULT_CONFIG_FILE);
    fs::write(
        &path,
        json!({
            "locale": { "source": "en", "targets": ["de"] },
            "buckets": { "json": { "include": ["a/en.json", "b/en.json"] } }
        })
        .to_string(),
    )
    .expect("Failed to write config");

    match config::load(&path) {
        Err(ConfigError::Invalid(report)) => {
            let placeholder_issues = report
                .suggestions()
                .into_iter()
                .filter(|s| s.contains("[locale]"))
                .count();
            assert!(placeholder_issues >= 2);
        }
        other => panic!("Expected validation failure, got {:?}", other),
    }
}

#[test]
fn test_files_matrix_from_globs() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    write_file(root, "content/en/home.json", "{}");
    write_file(root, "content/en/blog/post.json", "{}");
    write_file(root, "content/en/draft.json", "{}");

    let config = write_config(
        root,
        json!({
            "locale": { "source": "en", "targets": ["de", "pt-BR"] },
            "buckets": {
                "json": {
                    "include": ["content/[locale]/**/*.json"],
                    "exclude": ["content/[locale]/draft.json"]
                }
            }
        }),
    );

    let files = discover(&config, root).expect("Discovery should succeed");
    let matrix: Vec<String> = files
        .iter()
        .flat_map(|file| {
            config
                .all_locales()
                .into_iter()
                .map(|locale| file.relative_path(locale))
                .collect::<Vec<_>>()
        })
        .collect();

    assert_eq!(
        matrix,
        vec![
            "content/en/blog/post.json",
            "content/de/blog/post.json",
            "content/pt-BR/blog/post.json",
            "content/en/home.json",
            "content/de/home.json",
            "content/pt-BR/home.json",
        ]
    );
}
