//! Service counters: document cache effectiveness, AI suggestion calls, and
//! persisted document writes.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters shared by the service and the HTTP layer.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    suggestion_calls: AtomicUsize,
    suggestion_failures: AtomicUsize,
    documents_written: AtomicUsize,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suggestion_call(&self) {
        self.suggestion_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suggestion_failure(&self) {
        self.suggestion_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` documents (base or translation) persisted.
    pub fn record_documents_written(&self, count: usize) {
        self.documents_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let calls = self.suggestion_calls.load(Ordering::Relaxed);
        let failures = self.suggestion_failures.load(Ordering::Relaxed);

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate: rate(hits, hits + misses),
            suggestion_calls: calls,
            suggestion_failures: failures,
            suggestion_success_rate: rate(calls.saturating_sub(failures), calls),
            documents_written: self.documents_written.load(Ordering::Relaxed),
        }
    }
}

fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64) * 100.0
}

/// Point-in-time snapshot of [`ServiceMetrics`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Percentage (0-100)
    pub cache_hit_rate: f64,
    pub suggestion_calls: usize,
    pub suggestion_failures: usize,
    /// Percentage (0-100)
    pub suggestion_success_rate: f64,
    pub documents_written: usize,
}
