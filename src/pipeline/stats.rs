//! Run statistics aggregation
//!
//! Counters are mutated only by the coordinator as page outcomes are
//! collected (a single consumer, so no updates can be lost) and are flushed
//! into one summary log entry at the end of the run.

use crate::pipeline::processor::PageOutcome;
use std::time::Duration;

/// Accumulated latency for one pipeline stage
#[derive(Debug, Clone, Default)]
pub struct StageLatency {
    total: Duration,
    samples: u64,
}

impl StageLatency {
    pub fn record(&mut self, duration: Duration) {
        self.total += duration;
        self.samples += 1;
    }

    /// Average over recorded samples, zero when nothing was recorded
    pub fn average(&self) -> Duration {
        if self.samples == 0 {
            return Duration::ZERO;
        }
        self.total / self.samples as u32
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

/// Statistics for one crawl run
#[derive(Debug, Clone, Default)]
pub struct RunStatistics {
    /// Pages dispatched to the processor
    pub pages_attempted: u64,

    /// Pages that produced at least one accepted record
    pub pages_succeeded: u64,

    /// Pages that failed terminally after exhausting retries
    pub pages_failed: u64,

    /// Pages whose extraction succeeded but yielded no accepted record
    pub pages_rejected: u64,

    /// Individual records dropped by schema validation
    pub validation_failures: u64,

    /// Records accepted into the output
    pub records_accepted: u64,

    /// Records skipped because their key value was already seen
    pub duplicates_skipped: u64,

    pub fetch_latency: StageLatency,
    pub extract_latency: StageLatency,
    pub validate_latency: StageLatency,
}

impl RunStatistics {
    /// Folds one page outcome into the counters
    pub fn record_outcome(&mut self, outcome: &PageOutcome) {
        self.pages_attempted += 1;

        match outcome {
            PageOutcome::Accepted {
                records,
                invalid,
                duplicates,
                timings,
                ..
            } => {
                self.pages_succeeded += 1;
                self.records_accepted += records.len() as u64;
                self.validation_failures += *invalid as u64;
                self.duplicates_skipped += *duplicates as u64;
                self.fetch_latency.record(timings.fetch);
                self.extract_latency.record(timings.extract);
                self.validate_latency.record(timings.validate);
            }
            PageOutcome::Rejected {
                invalid,
                duplicates,
                timings,
                ..
            } => {
                self.pages_rejected += 1;
                self.validation_failures += *invalid as u64;
                self.duplicates_skipped += *duplicates as u64;
                self.fetch_latency.record(timings.fetch);
                self.extract_latency.record(timings.extract);
                self.validate_latency.record(timings.validate);
            }
            PageOutcome::Failed { .. } => {
                self.pages_failed += 1;
            }
        }
    }

    /// Key/value pairs for the end-of-run summary log entry
    pub fn summary_context(&self) -> Vec<(String, String)> {
        vec![
            ("pages_attempted".into(), self.pages_attempted.to_string()),
            ("pages_succeeded".into(), self.pages_succeeded.to_string()),
            ("pages_failed".into(), self.pages_failed.to_string()),
            ("pages_rejected".into(), self.pages_rejected.to_string()),
            (
                "validation_failures".into(),
                self.validation_failures.to_string(),
            ),
            ("records_accepted".into(), self.records_accepted.to_string()),
            (
                "duplicates_skipped".into(),
                self.duplicates_skipped.to_string(),
            ),
            (
                "avg_fetch_ms".into(),
                self.fetch_latency.average().as_millis().to_string(),
            ),
            (
                "avg_extract_ms".into(),
                self.extract_latency.average().as_millis().to_string(),
            ),
            (
                "avg_validate_ms".into(),
                self.validate_latency.average().as_millis().to_string(),
            ),
        ]
    }
}
