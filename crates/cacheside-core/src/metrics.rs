//! Cache metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_READ_FAILURES_TOTAL: &str = "cache_read_failures_total";
    pub const CACHE_SOURCE_LOADS_TOTAL: &str = "cache_source_loads_total";
    pub const CACHE_WRITEBACK_FAILURES_TOTAL: &str = "cache_writeback_failures_total";
}

/// Outcome label for source-of-truth loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOutcome {
    Success,
    /// Failed, but cache hits were still returned.
    Degraded,
    /// Failed with nothing to return.
    Failed,
}

impl SourceOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceOutcome::Success => "success",
            SourceOutcome::Degraded => "degraded",
            SourceOutcome::Failed => "failed",
        }
    }
}

pub fn record_cache_hits(namespace: &str, count: usize) {
    if count > 0 {
        counter!(names::CACHE_HITS_TOTAL, "namespace" => namespace.to_string())
            .increment(count as u64);
    }
}

pub fn record_cache_misses(namespace: &str, count: usize) {
    if count > 0 {
        counter!(names::CACHE_MISSES_TOTAL, "namespace" => namespace.to_string())
            .increment(count as u64);
    }
}

pub fn record_cache_read_failure(namespace: &str) {
    counter!(names::CACHE_READ_FAILURES_TOTAL, "namespace" => namespace.to_string()).increment(1);
}

pub fn record_source_load(namespace: &str, outcome: SourceOutcome) {
    counter!(
        names::CACHE_SOURCE_LOADS_TOTAL,
        "namespace" => namespace.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_writeback_failure(namespace: &str) {
    counter!(names::CACHE_WRITEBACK_FAILURES_TOTAL, "namespace" => namespace.to_string())
        .increment(1);
}
