//! Crawl run coordination: bounded concurrency, cancellation, statistics
//!
//! The coordinator dispatches pages to the shared [`PageProcessor`] through a
//! semaphore-bounded `JoinSet`. Outcomes are folded into [`RunStatistics`] by
//! the single collection loop, so counters need no atomics. A cancellation
//! flag is honored at dispatch: in-flight pages run to completion, pending
//! pages are dropped.

use crate::extract::RawRecord;
use crate::logging::{Component, CrawlLogger, LogEntry, Severity};
use crate::pipeline::processor::{PageOutcome, PageProcessor};
use crate::pipeline::stats::RunStatistics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Everything a finished run produced
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Accepted records in completion order
    pub records: Vec<RawRecord>,
    pub stats: RunStatistics,
    pub failed_urls: Vec<String>,
    pub rejected_urls: Vec<String>,
}

/// Drives a crawl run over a page list
pub struct CrawlCoordinator {
    processor: Arc<PageProcessor>,
    logger: Arc<CrawlLogger>,
    concurrency: usize,
    cancel: Arc<AtomicBool>,
}

impl CrawlCoordinator {
    pub fn new(
        processor: Arc<PageProcessor>,
        logger: Arc<CrawlLogger>,
        concurrency: usize,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            processor,
            logger,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Shared flag that requests a graceful stop when set
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Processes every page and returns the aggregated report
    ///
    /// Each dispatched page reaches exactly one terminal outcome and is
    /// counted exactly once; pages skipped by cancellation are never
    /// dispatched and never counted as attempted.
    pub async fn run(&self, pages: Vec<Url>) -> CrawlReport {
        let total = pages.len();
        self.logger.log(
            LogEntry::new(Severity::Info, Component::System, "Starting crawl run")
                .with_context("pages", total.to_string())
                .with_context("concurrency", self.concurrency.to_string()),
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();
        let mut skipped = 0usize;

        for url in pages {
            if self.cancel.load(Ordering::Relaxed) {
                skipped += 1;
                continue;
            }

            // Closed semaphore is unreachable here; treat it like cancellation
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                skipped += 1;
                continue;
            };

            let processor = Arc::clone(&self.processor);
            workers.spawn(async move {
                let outcome = processor.process(url).await;
                drop(permit);
                outcome
            });
        }

        if skipped > 0 {
            self.logger.log(
                LogEntry::new(Severity::Warn, Component::System, "Run cancelled")
                    .with_context("pages_skipped", skipped.to_string()),
            );
        }

        let mut report = CrawlReport::default();

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => {
                    report.stats.record_outcome(&outcome);
                    match outcome {
                        PageOutcome::Accepted { records, .. } => {
                            report.records.extend(records);
                        }
                        PageOutcome::Rejected { url, .. } => {
                            report.rejected_urls.push(url);
                        }
                        PageOutcome::Failed { url, .. } => {
                            report.failed_urls.push(url);
                        }
                    }
                }
                Err(join_error) => {
                    self.logger.log(
                        LogEntry::new(Severity::Error, Component::System, "Page worker panicked")
                            .with_cause(join_error.to_string()),
                    );
                }
            }
        }

        let mut summary =
            LogEntry::new(Severity::Info, Component::System, "Crawl run complete");
        for (key, value) in report.stats.summary_context() {
            summary = summary.with_context(key, value);
        }
        self.logger.log(summary);
        self.logger.flush();

        report
    }
}
