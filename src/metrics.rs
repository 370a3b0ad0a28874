//! Run metrics.
//!
//! Counters for one pipeline run: units by outcome, keys sent for
//! translation, and backend calls. One instance is shared (via `Arc`) by the
//! driver and the translator for the duration of a run.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct RunMetrics {
    /// Units whose target file was written
    units_written: AtomicUsize,

    /// Units with nothing to translate and identical output
    units_unchanged: AtomicUsize,

    /// Dry-run units with keys left to translate
    units_stale: AtomicUsize,

    /// Units that failed at any step
    units_failed: AtomicUsize,

    /// Units never started because the run was cancelled
    units_cancelled: AtomicUsize,

    /// Keys handed to the translation backend
    keys_translated: AtomicUsize,

    /// Requests made to the translation backend (including retries)
    api_calls: AtomicUsize,

    /// Requests that failed
    api_failures: AtomicUsize,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_written(&self) {
        self.units_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unchanged(&self) {
        self.units_unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.units_stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.units_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.units_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_keys_translated(&self, count: usize) {
        self.keys_translated.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a request to the translation backend.
    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed request to the translation backend.
    pub fn record_api_failure(&self) {
        self.api_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::Relaxed)
    }

    pub fn api_failures(&self) -> usize {
        self.api_failures.load(Ordering::Relaxed)
    }

    /// Snapshot the counters.
    pub fn report(&self) -> MetricsReport {
        let calls = self.api_calls();
        let failures = self.api_failures();
        let api_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            units_written: self.units_written.load(Ordering::Relaxed),
            units_unchanged: self.units_unchanged.load(Ordering::Relaxed),
            units_stale: self.units_stale.load(Ordering::Relaxed),
            units_failed: self.units_failed.load(Ordering::Relaxed),
            units_cancelled: self.units_cancelled.load(Ordering::Relaxed),
            keys_translated: self.keys_translated.load(Ordering::Relaxed),
            api_calls: calls,
            api_failures: failures,
            api_success_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub units_written: usize,
    pub units_unchanged: usize,
    pub units_stale: usize,
    pub units_failed: usize,
    pub units_cancelled: usize,
    pub keys_translated: usize,
    pub api_calls: usize,
    pub api_failures: usize,

    /// API success rate as a percentage (0-100)
    pub api_success_rate: f64,
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} unchanged, {} stale, {} failed, {} cancelled; {} key(s) translated in {} request(s) ({} failed, {:.1}% success)",
            self.units_written,
            self.units_unchanged,
            self.units_stale,
            self.units_failed,
            self.units_cancelled,
            self.keys_translated,
            self.api_calls,
            self.api_failures,
            self.api_success_rate
        )
    }
}
