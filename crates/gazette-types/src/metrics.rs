//! Explicit, per-run metrics sink.
//!
//! A value owned by the pipeline's `Context`/`Run` and threaded explicitly,
//! rather than a process-wide singleton.

use std::collections::HashMap;
use std::time::Duration;

/// Running counters for one external collaborator (the text extractor or
/// the search engine).
#[derive(Debug, Default, Clone)]
pub struct CollaboratorStats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration: Duration,
    /// Count of failures by a short error-type tag, for the end-of-run
    /// histogram.
    pub error_histogram: HashMap<String, u64>,
}

impl CollaboratorStats {
    pub fn record_success(&mut self, duration: Duration) {
        self.requests += 1;
        self.successes += 1;
        self.total_duration += duration;
    }

    pub fn record_failure(&mut self, duration: Duration, error_tag: impl Into<String>) {
        self.requests += 1;
        self.failures += 1;
        self.total_duration += duration;
        *self.error_histogram.entry(error_tag.into()).or_insert(0) += 1;
    }

    pub fn average_duration(&self) -> Duration {
        if self.requests == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.requests as u32
        }
    }
}

/// Accumulates per-collaborator stats for one pipeline run. Owned by the
/// `Run`/`Context` value and passed by reference; never a global.
#[derive(Debug, Default)]
pub struct RunMetrics {
    pub extractor: CollaboratorStats,
    pub search_index: CollaboratorStats,
    pub gazettes_processed: u64,
    pub gazettes_skipped: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One structured summary line's worth of fields, emitted by the
    /// caller via `tracing::info!` at process exit.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            gazettes_processed: self.gazettes_processed,
            gazettes_skipped: self.gazettes_skipped,
            extractor_requests: self.extractor.requests,
            extractor_failures: self.extractor.failures,
            extractor_avg_duration_ms: self.extractor.average_duration().as_millis() as u64,
            search_requests: self.search_index.requests,
            search_failures: self.search_index.failures,
            search_avg_duration_ms: self.search_index.average_duration().as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummary {
    pub gazettes_processed: u64,
    pub gazettes_skipped: u64,
    pub extractor_requests: u64,
    pub extractor_failures: u64,
    pub extractor_avg_duration_ms: u64,
    pub search_requests: u64,
    pub search_failures: u64,
    pub search_avg_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_duration_is_zero_with_no_requests() {
        let stats = CollaboratorStats::default();
        assert_eq!(stats.average_duration(), Duration::ZERO);
    }

    #[test]
    fn failure_increments_histogram() {
        let mut stats = CollaboratorStats::default();
        stats.record_failure(Duration::from_millis(10), "timeout");
        stats.record_failure(Duration::from_millis(20), "timeout");
        stats.record_failure(Duration::from_millis(5), "connection_refused");
        assert_eq!(stats.error_histogram.get("timeout"), Some(&2));
        assert_eq!(stats.failures, 3);
    }
}
