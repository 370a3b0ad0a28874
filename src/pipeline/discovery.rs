//! Expansion of bucket include/exclude patterns into concrete files.
//!
//! Patterns are matched against the source locale's files; each match
//! becomes a [`FileTemplate`] whose `[locale]` placeholders can be filled in
//! for any target locale.

use crate::config::{
    format_locale, BucketItem, BucketType, I18nConfig, LocaleDelimiter, LOCALE_PLACEHOLDER,
};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("pattern '{0}' points outside the project directory")]
    OutsideRoot(String),

    #[error("pattern '{pattern}' could not be compiled: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One file of a bucket, with the locale left as a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileTemplate {
    pub bucket: BucketType,

    /// `/`-separated path relative to the project root, containing `[locale]`
    pub template: String,

    pub delimiter: Option<LocaleDelimiter>,
}

impl FileTemplate {
    /// Relative path of this file for `locale`.
    pub fn relative_path(&self, locale: &str) -> String {
        self.template
            .replace(LOCALE_PLACEHOLDER, &format_locale(locale, self.delimiter))
    }

    pub fn path_for(&self, root: &Path, locale: &str) -> PathBuf {
        root.join(self.relative_path(locale))
    }
}

fn has_glob(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

fn escapes_root(pattern: &str) -> bool {
    let path = Path::new(pattern);
    path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
}

/// Glob syntax to regex syntax: `**/` any directories, `**` anything,
/// `*` within one segment, `?` one character.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::new();
    let mut rest = glob;
    while let Some(c) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("**/") {
            out.push_str("(?:.*/)?");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("**") {
            out.push_str(".*");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('*') {
            out.push_str("[^/]*");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('?') {
            out.push_str("[^/]");
            rest = tail;
        } else {
            out.push_str(&regex::escape(&c.to_string()));
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// Regex matching the pattern's files for `locale`. Each placeholder
/// becomes a capture group so matches can be turned back into templates.
fn pattern_regex(pattern: &str, locale: &str) -> Result<Regex, DiscoveryError> {
    let locale_group = format!("({})", regex::escape(locale));
    let body = pattern
        .split(LOCALE_PLACEHOLDER)
        .map(glob_to_regex)
        .collect::<Vec<_>>()
        .join(&locale_group);
    Regex::new(&format!("^{}$", body)).map_err(|source| DiscoveryError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Leading directories of the pattern that contain no glob or placeholder.
fn literal_prefix(pattern: &str) -> PathBuf {
    let segments: Vec<&str> = pattern.split('/').collect();
    let mut prefix = PathBuf::new();
    for segment in &segments[..segments.len().saturating_sub(1)] {
        if has_glob(segment) || segment.contains(LOCALE_PLACEHOLDER) {
            break;
        }
        prefix.push(segment);
    }
    prefix
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Replace every captured locale occurrence with the placeholder.
fn to_template(path: &str, regex: &Regex) -> Option<String> {
    let captures = regex.captures(path)?;
    let mut template = path.to_string();
    let mut groups: Vec<_> = captures.iter().skip(1).flatten().collect();
    groups.sort_by_key(|m| std::cmp::Reverse(m.start()));
    for group in groups {
        template.replace_range(group.range(), LOCALE_PLACEHOLDER);
    }
    Some(template)
}

fn expand_item(
    item: &BucketItem,
    root: &Path,
    source_locale: &str,
) -> Result<Vec<String>, DiscoveryError> {
    let pattern = item.path();
    if escapes_root(pattern) {
        return Err(DiscoveryError::OutsideRoot(pattern.to_string()));
    }
    if !has_glob(pattern) {
        return Ok(vec![pattern.to_string()]);
    }

    let locale = format_locale(source_locale, item.delimiter());
    let regex = pattern_regex(pattern, &locale)?;
    let base = root.join(literal_prefix(pattern));
    if !base.is_dir() {
        debug!("Nothing to match for {}: {} is not a directory", pattern, base.display());
        return Ok(Vec::new());
    }

    let mut templates = Vec::new();
    for entry in WalkDir::new(&base).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable path while expanding {}: {}", pattern, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = relative_slash_path(root, entry.path()) else {
            continue;
        };
        if let Some(template) = to_template(&relative, &regex) {
            templates.push(template);
        }
    }
    Ok(templates)
}

fn is_excluded(
    template: &str,
    excludes: &[Regex],
    source_locale: &str,
    delimiter: Option<LocaleDelimiter>,
) -> bool {
    let source_path = template.replace(LOCALE_PLACEHOLDER, &format_locale(source_locale, delimiter));
    excludes.iter().any(|regex| regex.is_match(&source_path))
}

/// Every file of every bucket, sorted and de-duplicated.
pub fn discover(config: &I18nConfig, root: &Path) -> Result<Vec<FileTemplate>, DiscoveryError> {
    let source = config.locale.source.as_str();
    let mut files = Vec::new();

    for (bucket, bucket_config) in &config.buckets {
        let mut excludes = Vec::new();
        for item in &bucket_config.exclude {
            if escapes_root(item.path()) {
                return Err(DiscoveryError::OutsideRoot(item.path().to_string()));
            }
            let locale = format_locale(source, item.delimiter());
            excludes.push(pattern_regex(item.path(), &locale)?);
        }

        for item in &bucket_config.include {
            for template in expand_item(item, root, source)? {
                if is_excluded(&template, &excludes, source, item.delimiter()) {
                    debug!("Excluded {} from bucket {}", template, bucket);
                    continue;
                }
                files.push(FileTemplate {
                    bucket: *bucket,
                    template,
                    delimiter: item.delimiter(),
                });
            }
        }
    }

    files.sort();
    files.dedup();
    debug!("Discovered {} file(s)", files.len());
    Ok(files)
}
