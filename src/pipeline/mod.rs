//! Pipeline driver.
//!
//! Every (bucket, file, locale) combination is one unit of work:
//!
//! ```text
//! Discovered -> Pulled -> Unchanged
//!                      -> Stale -> Translating -> Merged -> Written
//! ```
//!
//! with `Errored` reachable from any step. A dry run stops at `Stale` and
//! reports the delta without calling the backend. Units run concurrently
//! under a bounded limit; a failing unit is reported and never stops its
//! siblings.

mod discovery;
mod lockfile;
mod policy;

pub use discovery::{discover, DiscoveryError, FileTemplate};
pub use lockfile::{checksum, Lockfile, LockfileError, LOCKFILE_NAME};
pub use policy::{stale_keys, BucketPolicy};

use crate::config::{BucketType, I18nConfig, KeySet};
use crate::loaders::{create_loader, FlatContent, LoaderError, LoaderOptions};
use crate::metrics::MetricsReport;
use crate::translate::{TranslateError, Translator};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Fatal run-level failures. Everything else is reported per unit.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Lockfile(#[from] LockfileError),
}

#[derive(Debug, Error)]
pub enum UnitError {
    #[error("source file unusable: {0}")]
    Source(Arc<LoaderError>),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Units processed at the same time
    pub concurrency: usize,

    /// Target locales to process; empty means all
    pub locales: Vec<String>,

    /// Buckets to process; empty means all
    pub buckets: Vec<BucketType>,

    /// Retranslate every key, ignoring existing translations
    pub force: bool,

    /// Compute each unit's delta without translating or writing
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            locales: Vec::new(),
            buckets: Vec::new(),
            force: false,
            dry_run: false,
        }
    }
}

/// Whole-run cancellation. Units that have not started when the flag is
/// set are skipped; units already running finish their write.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Discovered,
    Pulled,
    Unchanged,
    Stale,
    Translating,
    Merged,
    Written,
    Errored,
    Cancelled,
}

impl UnitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitState::Discovered => "discovered",
            UnitState::Pulled => "pulled",
            UnitState::Unchanged => "unchanged",
            UnitState::Stale => "stale",
            UnitState::Translating => "translating",
            UnitState::Merged => "merged",
            UnitState::Written => "written",
            UnitState::Errored => "errored",
            UnitState::Cancelled => "cancelled",
        }
    }

    /// Terminal states that count as success. `Stale` is terminal only in
    /// dry runs.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            UnitState::Written | UnitState::Unchanged | UnitState::Stale
        )
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitId {
    pub bucket: BucketType,
    pub template: String,
    pub locale: String,

    /// Concrete path of the target file, relative to the project root
    pub path: String,
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.bucket, self.path, self.locale)
    }
}

/// Key counts of one unit before translation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitDelta {
    /// Keys pulled from the source file
    pub source_keys: usize,

    /// Keys already in the target file
    pub target_keys: usize,

    /// Stale keys missing from the target
    pub added: usize,

    /// Stale keys the target has but whose source value changed (or forced)
    pub updated: usize,
}

impl UnitDelta {
    /// Keys that need translating.
    pub fn to_translate(&self) -> usize {
        self.added + self.updated
    }
}

impl fmt::Display for UnitDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} source key(s), {} in target, {} to translate ({} added, {} updated)",
            self.source_keys,
            self.target_keys,
            self.to_translate(),
            self.added,
            self.updated
        )
    }
}

#[derive(Debug)]
pub struct UnitReport {
    pub id: UnitId,
    pub state: UnitState,
    pub error: Option<UnitError>,
    pub keys_translated: usize,
    pub delta: UnitDelta,
}

#[derive(Debug)]
pub struct RunSummary {
    pub units: Vec<UnitReport>,
    pub metrics: MetricsReport,
}

impl RunSummary {
    pub fn failed(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|unit| !unit.state.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Source content of one file, read once and shared by its target units.
struct SourceSnapshot {
    text: Arc<String>,
    content: FlatContent,
}

/// What `process` ended with for one unit.
struct Outcome {
    state: UnitState,
    keys_translated: usize,
    delta: UnitDelta,
}

struct Unit<'a> {
    id: UnitId,
    file: &'a FileTemplate,
    source: &'a Result<SourceSnapshot, Arc<LoaderError>>,
    checksums: Option<&'a BTreeMap<String, String>>,
}

pub struct Pipeline {
    config: I18nConfig,
    root: PathBuf,
    translator: Translator,
    options: RunOptions,
    cancel: CancelFlag,
}

impl Pipeline {
    /// `root` is the project directory that bucket paths are relative to.
    pub fn new(
        config: I18nConfig,
        root: impl Into<PathBuf>,
        translator: Translator,
        options: RunOptions,
    ) -> Self {
        Self {
            config,
            root: root.into(),
            translator,
            options,
            cancel: CancelFlag::default(),
        }
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Discovered files, restricted to the selected buckets.
    pub fn files(&self) -> Result<Vec<FileTemplate>, PipelineError> {
        let files = discover(&self.config, &self.root)?;
        Ok(files
            .into_iter()
            .filter(|file| {
                self.options.buckets.is_empty() || self.options.buckets.contains(&file.bucket)
            })
            .collect())
    }

    /// Target locales to process, in config order.
    pub fn target_locales(&self) -> Vec<&str> {
        for requested in &self.options.locales {
            if !self.config.locale.targets.contains(requested) {
                warn!("Locale {} is not a configured target, skipping", requested);
            }
        }
        self.config
            .locale
            .targets
            .iter()
            .filter(|locale| self.options.locales.is_empty() || self.options.locales.contains(locale))
            .map(String::as_str)
            .collect()
    }

    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let files = self.files()?;
        let locales = self.target_locales();
        let lockfile_path = self.root.join(LOCKFILE_NAME);
        let mut lockfile = Lockfile::load(&lockfile_path)?;

        info!(
            "{} {} file(s) x {} locale(s) with {} ({} at a time)",
            if self.options.dry_run { "Analyzing" } else { "Processing" },
            files.len(),
            locales.len(),
            self.translator.backend_name(),
            self.options.concurrency.max(1)
        );

        let snapshots: Vec<_> = files.iter().map(|file| self.read_source(file)).collect();

        let mut units = Vec::new();
        for (file, source) in files.iter().zip(&snapshots) {
            for locale in &locales {
                let id = UnitId {
                    bucket: file.bucket,
                    template: file.template.clone(),
                    locale: locale.to_string(),
                    path: file.relative_path(locale),
                };
                debug!("{}: {}", id, UnitState::Discovered);
                units.push(Unit {
                    id,
                    file,
                    source,
                    checksums: lockfile.file_checksums(&file.template),
                });
            }
        }

        let reports: Vec<UnitReport> = stream::iter(units)
            .map(|unit| self.run_unit(unit))
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        // Checksums describe every target, so a partial locale selection
        // must not record them.
        let all_targets = !self.options.dry_run
            && !locales.is_empty()
            && locales.len() == self.config.locale.targets.len();
        let mut recorded = 0;
        for (file, source) in files.iter().zip(&snapshots) {
            let Ok(snapshot) = source else { continue };
            let mut file_units = reports.iter().filter(|r| r.id.template == file.template);
            if all_targets && file_units.all(|r| r.state.is_success()) {
                lockfile.record(&file.template, &snapshot.content);
                recorded += 1;
            }
        }
        if recorded > 0 {
            lockfile.save(&lockfile_path)?;
            debug!("Updated {} with {} file(s)", LOCKFILE_NAME, recorded);
        }

        let metrics = self.translator.metrics().report();
        info!("{}", metrics);
        Ok(RunSummary {
            units: reports,
            metrics,
        })
    }

    fn read_source(&self, file: &FileTemplate) -> Result<SourceSnapshot, Arc<LoaderError>> {
        let locale = &self.config.locale;
        let mut path = file.path_for(&self.root, &locale.source);
        if !path.is_file() {
            if let Some(extra) = &locale.extra_source {
                let fallback = file.path_for(&self.root, extra);
                if fallback.is_file() {
                    debug!(
                        "Using {} as source for {}",
                        fallback.display(),
                        file.template
                    );
                    path = fallback;
                }
            }
        }
        if !path.is_file() {
            error!("Source file {} is missing", path.display());
            return Err(Arc::new(LoaderError::Missing(path)));
        }

        let text = std::fs::read_to_string(&path).map_err(|source| {
            Arc::new(LoaderError::Read {
                path: path.clone(),
                source,
            })
        })?;
        if text.trim().is_empty() {
            error!("Source file {} is empty", path.display());
            return Err(Arc::new(LoaderError::Empty(locale.source.clone())));
        }

        let mut chain = self.loader_for(file.bucket);
        chain.set_default_locale(&locale.source);
        let content = chain
            .pull(&locale.source, text.clone())
            .map_err(Arc::new)?;

        Ok(SourceSnapshot {
            text: Arc::new(text),
            content,
        })
    }

    fn loader_for(&self, bucket: BucketType) -> crate::loaders::TextLoader {
        let ignored = self
            .config
            .buckets
            .get(&bucket)
            .map(|config| KeySet::new(&config.ignored_keys))
            .unwrap_or_default();
        create_loader(
            bucket,
            &LoaderOptions {
                cache_restoration: false,
                return_unlocalized_keys: false,
                ignored_keys: ignored,
            },
        )
    }

    async fn run_unit(&self, unit: Unit<'_>) -> UnitReport {
        let metrics = self.translator.metrics();
        if self.cancel.is_cancelled() {
            warn!("{}: {}", unit.id, UnitState::Cancelled);
            metrics.record_cancelled();
            return UnitReport {
                id: unit.id,
                state: UnitState::Cancelled,
                error: None,
                keys_translated: 0,
                delta: UnitDelta::default(),
            };
        }

        match self.process(&unit).await {
            Ok(outcome) => {
                match outcome.state {
                    UnitState::Written => metrics.record_written(),
                    UnitState::Stale => metrics.record_stale(),
                    _ => metrics.record_unchanged(),
                }
                info!("{}: {}", unit.id, outcome.state);
                UnitReport {
                    id: unit.id,
                    state: outcome.state,
                    error: None,
                    keys_translated: outcome.keys_translated,
                    delta: outcome.delta,
                }
            }
            Err(e) => {
                error!("{}: {}: {}", unit.id, UnitState::Errored, e);
                metrics.record_failed();
                UnitReport {
                    id: unit.id,
                    state: UnitState::Errored,
                    error: Some(e),
                    keys_translated: 0,
                    delta: UnitDelta::default(),
                }
            }
        }
    }

    /// Pull, translate, merge and push one unit.
    async fn process(&self, unit: &Unit<'_>) -> Result<Outcome, UnitError> {
        let id = &unit.id;
        let source_locale = self.config.locale.source.as_str();
        let snapshot = unit
            .source
            .as_ref()
            .map_err(|e| UnitError::Source(Arc::clone(e)))?;

        let mut chain = self.loader_for(id.bucket);
        chain.set_default_locale(source_locale);
        let source = chain.pull(source_locale, snapshot.text.to_string())?;

        let target_path = unit.file.path_for(&self.root, &id.locale);
        let existing_text = read_existing(&target_path)?;
        let existing = match &existing_text {
            Some(text) => chain.pull(&id.locale, text.clone())?,
            None => FlatContent::new(),
        };
        debug!(
            "{}: {} ({} source key(s), {} existing)",
            id,
            UnitState::Pulled,
            source.len(),
            existing.len()
        );

        if !chain.supports_push() {
            return Err(LoaderError::PushUnsupported(id.bucket.as_str()).into());
        }

        let policy = self
            .config
            .buckets
            .get(&id.bucket)
            .map(BucketPolicy::from_config)
            .unwrap_or_default();
        let processable = policy.processable(&source);
        let stale = stale_keys(&processable, &existing, unit.checksums, self.options.force);
        let added = stale.keys().filter(|key| !existing.contains_key(*key)).count();
        let delta = UnitDelta {
            source_keys: source.len(),
            target_keys: existing.len(),
            added,
            updated: stale.len() - added,
        };

        if self.options.dry_run {
            info!("{}: {}", id, delta);
            let state = if stale.is_empty() {
                UnitState::Unchanged
            } else {
                UnitState::Stale
            };
            return Ok(Outcome {
                state,
                keys_translated: 0,
                delta,
            });
        }

        let translated = if stale.is_empty() {
            FlatContent::new()
        } else {
            debug!("{}: {} ({} key(s))", id, UnitState::Stale, stale.len());
            debug!("{}: {}", id, UnitState::Translating);
            self.translator
                .translate(source_locale, &id.locale, &stale)
                .await?
        };

        let merged = policy.merge(&id.locale, &source, &translated, &existing);
        debug!("{}: {}", id, UnitState::Merged);
        let output = chain.push(&id.locale, merged)?;

        if stale.is_empty() && existing_text.as_deref() == Some(output.as_str()) {
            return Ok(Outcome {
                state: UnitState::Unchanged,
                keys_translated: 0,
                delta,
            });
        }

        write_atomic(&target_path, output.as_bytes()).map_err(|source| UnitError::Write {
            path: target_path.clone(),
            source,
        })?;
        Ok(Outcome {
            state: UnitState::Written,
            keys_translated: translated.len(),
            delta,
        })
    }
}

fn read_existing(path: &Path) -> Result<Option<String>, LoaderError> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(None),
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LoaderError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write through a temp file in the target directory, then rename over the
/// target, so readers never see a partial file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.flush()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
