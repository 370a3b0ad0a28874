use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use l10n_pipeline::config::{self, BucketType, ConfigError, I18nConfig, ValidationReport};
use l10n_pipeline::pipeline::{Pipeline, RunOptions, DEFAULT_CONCURRENCY};
use l10n_pipeline::retry::RetryConfig;
use l10n_pipeline::settings::Settings;
use l10n_pipeline::translate::{Translator, TranslatorOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "l10n")]
#[command(version)]
#[command(about = "Translate locale files described by an i18n.json config")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate every stale key of every bucket file into each target locale
    Run {
        /// Path to the project config
        #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Units processed at the same time
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Only translate these target locales
        #[arg(short, long = "locale", value_name = "LOCALE")]
        locales: Vec<String>,

        /// Only process these buckets
        #[arg(short, long = "bucket", value_name = "BUCKET", value_parser = parse_bucket)]
        buckets: Vec<BucketType>,

        /// Retranslate every key, ignoring existing translations
        #[arg(long)]
        force: bool,

        /// Show what each file would translate, without calling the backend
        #[arg(long)]
        dry_run: bool,

        /// Attempts per backend request, including the first
        #[arg(long, default_value_t = 3)]
        max_attempts: u32,

        /// Also retry responses that could not be parsed
        #[arg(long)]
        retry_parse_errors: bool,

        /// Debug logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// List every locale file the config describes, without translating
    Files {
        #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Only source-locale files
        #[arg(long, conflicts_with = "target")]
        source: bool,

        /// Only target-locale files
        #[arg(long)]
        target: bool,
    },

    /// Check the config and print every problem with its fix
    Validate {
        #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

fn parse_bucket(name: &str) -> Result<BucketType, String> {
    BucketType::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = BucketType::ALL.iter().map(|b| b.as_str()).collect();
        format!("unknown bucket '{}' (expected one of: {})", name, known.join(", "))
    })
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("l10n_pipeline={}", level).parse()?),
        )
        .init();
    Ok(())
}

fn print_report(report: &ValidationReport) {
    eprintln!("Configuration is invalid:");
    for issue in report.issues() {
        eprintln!("  error:      {}", issue.error);
        eprintln!("  suggestion: {}", issue.suggestion);
    }
}

/// Load the config; validation problems are printed and yield `None`.
fn load_config(path: &Path) -> Result<Option<I18nConfig>> {
    match config::load(path) {
        Ok(config) => Ok(Some(config)),
        Err(ConfigError::Invalid(report)) => {
            print_report(&report);
            Ok(None)
        }
        Err(e) => Err(e).context("Failed to load config"),
    }
}

/// Bucket paths are relative to the directory holding the config.
fn project_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file so backend keys can live next to the project
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    init_logging(verbose)?;

    match cli.command {
        Commands::Run {
            config,
            concurrency,
            locales,
            buckets,
            force,
            dry_run,
            max_attempts,
            retry_parse_errors,
            ..
        } => {
            let Some(project) = load_config(&config)? else {
                return Ok(ExitCode::FAILURE);
            };
            let settings = Settings::load().context("Failed to read user settings")?;
            let translator = Translator::resolve(
                project.provider.as_ref(),
                &settings,
                TranslatorOptions {
                    retry: RetryConfig::translation().with_max_attempts(max_attempts),
                    retry_parse_errors,
                },
            )?;

            let pipeline = Pipeline::new(
                project,
                project_root(&config),
                translator,
                RunOptions {
                    concurrency,
                    locales,
                    buckets,
                    force,
                    dry_run,
                },
            );

            let cancel = pipeline.cancel_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, finishing in-flight files");
                    cancel.cancel();
                }
            });

            let summary = pipeline.run().await.context("Translation run failed")?;

            if dry_run {
                println!("[dry run] nothing was translated or written");
                for unit in summary.units.iter().filter(|u| u.state.is_success()) {
                    println!("  {}: {}", unit.id, unit.delta);
                }
            }
            println!("{}", summary.metrics);
            let failed: Vec<_> = summary.failed().collect();
            if failed.is_empty() {
                info!("All {} unit(s) succeeded", summary.units.len());
                return Ok(ExitCode::SUCCESS);
            }
            eprintln!("{} unit(s) failed:", failed.len());
            for unit in failed {
                match &unit.error {
                    Some(error) => eprintln!("  {}: {}", unit.id, error),
                    None => eprintln!("  {}: {}", unit.id, unit.state),
                }
            }
            Ok(ExitCode::FAILURE)
        }

        Commands::Files {
            config,
            source,
            target,
        } => {
            let Some(project) = load_config(&config)? else {
                return Ok(ExitCode::FAILURE);
            };
            let root = project_root(&config);
            let files = l10n_pipeline::pipeline::discover(&project, &root)
                .context("Failed to expand bucket patterns")?;

            let mut locales = Vec::new();
            if !target {
                locales.push(project.locale.source.as_str());
            }
            if !source {
                locales.extend(project.locale.targets.iter().map(String::as_str));
            }

            for file in &files {
                for locale in &locales {
                    println!("{}\t{}\t{}", file.bucket, locale, file.relative_path(locale));
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate { config } => match load_config(&config)? {
            Some(project) => {
                println!(
                    "Configuration is valid: {} bucket(s), {} target locale(s)",
                    project.buckets.len(),
                    project.locale.targets.len()
                );
                Ok(ExitCode::SUCCESS)
            }
            None => Ok(ExitCode::FAILURE),
        },
    }
}
