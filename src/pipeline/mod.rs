//! Crawl pipeline: per-page processing and run coordination

mod coordinator;
mod processor;
mod stats;

pub use coordinator::{CrawlCoordinator, CrawlReport};
pub use processor::{ExtractionResult, PageOutcome, PageProcessor, StageTimings};
pub use stats::{RunStatistics, StageLatency};
