//! Per-page processing: fetch, extract, validate, under one retry chain
//!
//! The processor is a shared service (one instance behind an `Arc`, driven
//! concurrently by the coordinator). Fetch and extraction run inside a single
//! retry chain per page, so a transient extraction failure re-fetches the
//! page on the next attempt. Validation never retries: an invalid record is
//! a data problem, not a transient one.

use crate::extract::{RawRecord, RecordExtractor};
use crate::fetch::{FailureKind, PageFetcher};
use crate::logging::{Component, CrawlLogger, ErrorId, LogEntry, Severity};
use crate::retry::{AttemptDecision, RetryPolicy, RetryState, Sleeper};
use crate::validate::{self, FieldSpec, ValidationStatus};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

/// Wall-clock time spent in each stage of a successful page
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    pub fetch: Duration,
    pub extract: Duration,
    pub validate: Duration,
}

/// One extracted record together with its validation verdict
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub url: String,
    pub fields: RawRecord,
    pub status: ValidationStatus,
    pub violations: Vec<String>,
}

impl ExtractionResult {
    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Valid
    }
}

/// Terminal outcome of processing one page
///
/// Every dispatched page lands in exactly one variant: `Accepted` when at
/// least one record survived validation and dedup, `Rejected` when the page
/// was fetched and extracted but produced no accepted record, `Failed` when
/// the retry chain exhausted.
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Accepted {
        url: String,
        records: Vec<RawRecord>,
        /// Records dropped by validation
        invalid: u32,
        /// Valid records skipped because their key was already seen
        duplicates: u32,
        timings: StageTimings,
    },
    Rejected {
        url: String,
        invalid: u32,
        duplicates: u32,
        timings: StageTimings,
    },
    Failed {
        url: String,
        /// Identifier of the final ERROR entry for this page
        error_id: ErrorId,
        attempts: u32,
        reason: String,
    },
}

impl PageOutcome {
    pub fn url(&self) -> &str {
        match self {
            Self::Accepted { url, .. } | Self::Rejected { url, .. } | Self::Failed { url, .. } => {
                url
            }
        }
    }
}

enum StageVerdict {
    /// Backoff already slept; re-run the attempt loop
    Retry,
    /// Chain is over; the id belongs to the final ERROR entry
    Abort(ErrorId),
}

/// Shared per-run page processing service
pub struct PageProcessor {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn RecordExtractor>,
    policy: RetryPolicy,
    logger: Arc<CrawlLogger>,
    sleeper: Arc<dyn Sleeper>,
    fields: Vec<FieldSpec>,
    key_field: String,
    schema_hint: String,
    /// Key values accepted so far across the whole run
    seen_keys: Mutex<HashSet<String>>,
    cancel: Arc<AtomicBool>,
}

impl PageProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn RecordExtractor>,
        policy: RetryPolicy,
        logger: Arc<CrawlLogger>,
        sleeper: Arc<dyn Sleeper>,
        fields: Vec<FieldSpec>,
        key_field: String,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let schema_hint = schema_hint(&fields);
        Self {
            fetcher,
            extractor,
            policy,
            logger,
            sleeper,
            fields,
            key_field,
            schema_hint,
            seen_keys: Mutex::new(HashSet::new()),
            cancel,
        }
    }

    /// Runs one page through the full pipeline to a terminal outcome
    pub async fn process(&self, url: Url) -> PageOutcome {
        let mut state = RetryState::new();
        let mut timings = StageTimings::default();

        loop {
            let attempt = state.begin_attempt();

            let fetch_start = Instant::now();
            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => {
                    timings.fetch += fetch_start.elapsed();
                    self.logger.log(
                        LogEntry::new(Severity::Debug, Component::Fetch, "Fetched page")
                            .with_context("url", url.as_str())
                            .with_context("bytes", page.html.len().to_string())
                            .with_context("attempt", attempt.to_string()),
                    );
                    page
                }
                Err(failure) => {
                    timings.fetch += fetch_start.elapsed();
                    match self
                        .stage_failure(
                            &url,
                            attempt,
                            &mut state,
                            Component::Fetch,
                            &failure.kind,
                            &failure.message,
                            None,
                        )
                        .await
                    {
                        StageVerdict::Retry => continue,
                        StageVerdict::Abort(error_id) => {
                            return PageOutcome::Failed {
                                url: url.to_string(),
                                error_id,
                                attempts: state.attempt,
                                reason: failure.message,
                            }
                        }
                    }
                }
            };

            let extract_start = Instant::now();
            let records = match self.extractor.extract(&page, &self.schema_hint).await {
                Ok(records) => {
                    timings.extract += extract_start.elapsed();
                    records
                }
                Err(failure) => {
                    timings.extract += extract_start.elapsed();
                    match self
                        .stage_failure(
                            &url,
                            attempt,
                            &mut state,
                            Component::Extract,
                            &failure.kind,
                            &failure.message,
                            failure.response_sample.as_deref(),
                        )
                        .await
                    {
                        StageVerdict::Retry => continue,
                        StageVerdict::Abort(error_id) => {
                            return PageOutcome::Failed {
                                url: url.to_string(),
                                error_id,
                                attempts: state.attempt,
                                reason: failure.message,
                            }
                        }
                    }
                }
            };

            state.succeed();
            return self.finalize(&url, records, timings);
        }
    }

    /// Logs a stage failure, consults the policy, and sleeps before a retry
    async fn stage_failure(
        &self,
        url: &Url,
        attempt: u32,
        state: &mut RetryState,
        component: Component,
        kind: &FailureKind,
        message: &str,
        sample: Option<&str>,
    ) -> StageVerdict {
        let mut entry = LogEntry::new(
            Severity::Error,
            component,
            format!("{} failed", component.as_str()),
        )
        .with_context("url", url.as_str())
        .with_context("attempt", attempt.to_string())
        .with_context("kind", kind.to_string())
        .with_cause(message);

        if let Some(sample) = sample {
            entry = entry.with_context("response_sample", sample);
        }

        let error_id = self.logger.error(entry);

        match self.policy.on_failure(state, kind, message) {
            AttemptDecision::Retry { delay } => {
                if self.cancel.load(Ordering::Relaxed) {
                    self.logger.log(
                        LogEntry::new(Severity::Warn, component, "Abandoning retry, run cancelled")
                            .with_context("url", url.as_str())
                            .with_context("error_id", error_id.to_string()),
                    );
                    return StageVerdict::Abort(error_id);
                }

                self.logger.log(
                    LogEntry::new(Severity::Info, component, "Retrying after backoff")
                        .with_context("url", url.as_str())
                        .with_context("delay_ms", delay.as_millis().to_string())
                        .with_context("next_attempt", (attempt + 1).to_string())
                        .with_context("error_id", error_id.to_string()),
                );
                self.sleeper.sleep(delay).await;
                StageVerdict::Retry
            }
            AttemptDecision::Exhausted => {
                self.logger.log(
                    LogEntry::new(Severity::Warn, component, "Giving up on page")
                        .with_context("url", url.as_str())
                        .with_context("attempts", state.attempt.to_string())
                        .with_context("error_id", error_id.to_string()),
                );
                StageVerdict::Abort(error_id)
            }
        }
    }

    /// Validates and deduplicates the extracted records
    fn finalize(&self, url: &Url, raw: Vec<RawRecord>, mut timings: StageTimings) -> PageOutcome {
        let validate_start = Instant::now();

        if raw.is_empty() {
            self.logger.log(
                LogEntry::new(Severity::Warn, Component::Extract, "No records on page")
                    .with_context("url", url.as_str()),
            );
            timings.validate = validate_start.elapsed();
            return PageOutcome::Rejected {
                url: url.to_string(),
                invalid: 0,
                duplicates: 0,
                timings,
            };
        }

        let total = raw.len();
        let results = self.validate_records(url, raw);

        let mut accepted = Vec::new();
        let mut invalid = 0u32;
        let mut duplicates = 0u32;

        for result in results {
            if !result.is_valid() {
                invalid += 1;
                continue;
            }

            let key = result
                .fields
                .get(&self.key_field)
                .map(render_key)
                .unwrap_or_default();

            if self.already_seen(&key) {
                duplicates += 1;
                self.logger.log(
                    LogEntry::new(Severity::Info, Component::Validate, "Skipping duplicate")
                        .with_context("url", url.as_str())
                        .with_context(self.key_field.clone(), key),
                );
                continue;
            }

            accepted.push(result.fields);
        }

        timings.validate = validate_start.elapsed();

        self.logger.log(
            LogEntry::new(Severity::Info, Component::Validate, "Page validated")
                .with_context("url", url.as_str())
                .with_context("extracted", total.to_string())
                .with_context("accepted", accepted.len().to_string())
                .with_context("invalid", invalid.to_string())
                .with_context("duplicates", duplicates.to_string()),
        );

        if accepted.is_empty() {
            PageOutcome::Rejected {
                url: url.to_string(),
                invalid,
                duplicates,
                timings,
            }
        } else {
            PageOutcome::Accepted {
                url: url.to_string(),
                records: accepted,
                invalid,
                duplicates,
                timings,
            }
        }
    }

    /// Normalizes and validates each record, logging a WARN per invalid one
    fn validate_records(&self, url: &Url, raw: Vec<RawRecord>) -> Vec<ExtractionResult> {
        raw.into_iter()
            .map(|mut record| {
                validate::normalize(&mut record, &self.fields);
                let outcome = validate::validate(&record, &self.fields);

                if !outcome.is_valid() {
                    // Each rejected record gets its own identifier so it can
                    // be chased through the logs independently
                    let error_id = self.logger.mint();
                    self.logger.log(
                        LogEntry::new(Severity::Warn, Component::Validate, "Record rejected")
                            .with_context("url", url.as_str())
                            .with_context("violations", outcome.describe())
                            .with_context("error_id", error_id.to_string()),
                    );
                }

                ExtractionResult {
                    url: url.to_string(),
                    fields: record,
                    status: outcome.status,
                    violations: outcome.violations.iter().map(|v| v.to_string()).collect(),
                }
            })
            .collect()
    }

    /// Checks and records the key atomically; true when already present
    fn already_seen(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        match self.seen_keys.lock() {
            Ok(mut seen) => !seen.insert(key.to_string()),
            Err(_) => false,
        }
    }
}

/// Comma-separated `name (kind)` list handed to the extractor
fn schema_hint(fields: &[FieldSpec]) -> String {
    fields
        .iter()
        .map(|f| format!("{} ({})", f.name, format!("{:?}", f.kind).to_lowercase()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
