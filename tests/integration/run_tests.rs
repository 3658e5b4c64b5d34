//! Integration tests for the extraction pipeline
//!
//! These tests use wiremock to stand in for both the page server and the
//! LLM service, and exercise the full fetch -> extract -> validate -> output
//! cycle end-to-end.

use pagemill::config::{ExtractionConfig, RetryConfig};
use pagemill::extract::LlmExtractor;
use pagemill::fetch::HttpFetcher;
use pagemill::logging::CrawlLogger;
use pagemill::output::{CsvSink, RecordSink};
use pagemill::pipeline::{CrawlCoordinator, CrawlReport, PageProcessor};
use pagemill::retry::{RetryPolicy, TokioSleeper};
use pagemill::validate::{FieldKind, FieldSpec};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn schema() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("name", FieldKind::Text),
        FieldSpec::new("price", FieldKind::Number),
        FieldSpec::new("images", FieldKind::List),
    ]
}

/// Chat-completions envelope whose content is the given model output
fn chat_envelope(content: &str) -> serde_json::Value {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    })
}

/// Wires a coordinator against the two mock servers
fn build_pipeline(
    llm_uri: &str,
    retry: RetryConfig,
    logger: Arc<CrawlLogger>,
) -> CrawlCoordinator {
    let extraction = ExtractionConfig {
        base_url: format!("{}/v1/chat/completions", llm_uri),
        model: "test-model".to_string(),
        api_key_env: "UNUSED".to_string(),
    };

    let fetcher = Arc::new(HttpFetcher::new().unwrap());
    let extractor = Arc::new(LlmExtractor::new(&extraction, "test-key".to_string()).unwrap());
    let cancel = Arc::new(AtomicBool::new(false));

    let processor = Arc::new(PageProcessor::new(
        fetcher,
        extractor,
        RetryPolicy::new(&retry),
        Arc::clone(&logger),
        Arc::new(TokioSleeper),
        schema(),
        "name".to_string(),
        Arc::clone(&cancel),
    ));

    CrawlCoordinator::new(processor, logger, 4, cancel)
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 10,
    }
}

async fn mount_page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

async fn mount_llm(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_envelope(content)))
        .mount(server)
        .await;
}

fn page_urls(server: &MockServer, routes: &[&str]) -> Vec<Url> {
    routes
        .iter()
        .map(|r| Url::parse(&format!("{}{}", server.uri(), r)).unwrap())
        .collect()
}

#[tokio::test]
async fn test_full_cycle_writes_accepted_records_to_csv() {
    let pages = MockServer::start().await;
    let llm = MockServer::start().await;

    mount_page(&pages, "/listing", "<html>Отели Мальдив</html>").await;
    mount_llm(
        &llm,
        r#"[
            {"name": "Heritance Aarah", "price": 250000, "images": ["a.png", "b.png"], "error": false},
            {"name": "Пляжный отель", "price": "от 180 000", "images": "solo.png"}
        ]"#,
    )
    .await;

    let logger = Arc::new(CrawlLogger::console_only());
    let coordinator = build_pipeline(&llm.uri(), fast_retry(), logger);
    let report = coordinator.run(page_urls(&pages, &["/listing"])).await;

    assert_eq!(report.stats.pages_attempted, 1);
    assert_eq!(report.stats.pages_succeeded, 1);
    assert_eq!(report.stats.records_accepted, 2);
    // Normalization salvaged the stringy price and the scalar image
    assert_eq!(report.records[1]["price"], json!(180000));
    assert_eq!(report.records[1]["images"], json!(["solo.png"]));
    // The per-item error marker never reaches the output
    assert!(!report.records[0].contains_key("error"));

    let dir = tempdir().unwrap();
    let csv_path = dir.path().join("records.csv");
    write_report(&report, &csv_path);

    let content = std::fs::read_to_string(&csv_path).unwrap();
    assert!(content.starts_with("name,price,images"));
    assert!(content.contains("a.png|b.png"));
    assert!(content.contains("Пляжный отель"));
}

fn write_report(report: &CrawlReport, csv_path: &Path) {
    let columns = vec![
        "name".to_string(),
        "price".to_string(),
        "images".to_string(),
    ];
    let mut sink = CsvSink::create(csv_path, columns).unwrap();
    for record in &report.records {
        sink.append(record).unwrap();
    }
    sink.flush().unwrap();
}

#[tokio::test]
async fn test_transient_fetch_failures_recover_within_budget() {
    let pages = MockServer::start().await;
    let llm = MockServer::start().await;

    // Two 503s, then the real page
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&pages)
        .await;
    mount_page(&pages, "/flaky", "<html>ok</html>").await;
    mount_llm(
        &llm,
        r#"[{"name": "Recovered", "price": 1, "images": ["x.png"]}]"#,
    )
    .await;

    let logger = Arc::new(CrawlLogger::console_only());
    let coordinator = build_pipeline(&llm.uri(), fast_retry(), logger);
    let report = coordinator.run(page_urls(&pages, &["/flaky"])).await;

    assert_eq!(report.stats.pages_succeeded, 1);
    assert_eq!(report.records[0]["name"], json!("Recovered"));
}

#[tokio::test]
async fn test_permanent_failure_attempted_exactly_once() {
    let pages = MockServer::start().await;
    let llm = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&pages)
        .await;

    let logger = Arc::new(CrawlLogger::console_only());
    let coordinator = build_pipeline(&llm.uri(), fast_retry(), logger);
    let report = coordinator.run(page_urls(&pages, &["/gone"])).await;

    assert_eq!(report.stats.pages_failed, 1);
    assert_eq!(report.failed_urls.len(), 1);
    assert!(report.records.is_empty());
    // Mock expectation of exactly one request is verified on drop
}

#[tokio::test]
async fn test_rate_limited_extraction_retries() {
    let pages = MockServer::start().await;
    let llm = MockServer::start().await;

    mount_page(&pages, "/listing", "<html>ok</html>").await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&llm)
        .await;
    mount_llm(
        &llm,
        r#"[{"name": "After backoff", "price": 5, "images": ["y.png"]}]"#,
    )
    .await;

    let logger = Arc::new(CrawlLogger::console_only());
    let coordinator = build_pipeline(&llm.uri(), fast_retry(), logger);
    let report = coordinator.run(page_urls(&pages, &["/listing"])).await;

    assert_eq!(report.stats.pages_succeeded, 1);
    // The retry re-fetched the page before calling the service again
    assert!(pages.received_requests().await.unwrap().len() >= 2);
}

#[tokio::test]
async fn test_invalid_records_rejected_and_logged_with_error_ids() {
    let pages = MockServer::start().await;
    let llm = MockServer::start().await;

    mount_page(&pages, "/listing", "<html>ok</html>").await;
    // First record fine, second misses price and has an empty name
    mount_llm(
        &llm,
        r#"[
            {"name": "Valid one", "price": 9, "images": ["z.png"]},
            {"name": "", "images": []}
        ]"#,
    )
    .await;

    let log_dir = tempdir().unwrap();
    let logger = Arc::new(CrawlLogger::with_directory(log_dir.path(), 1024 * 1024, 5));
    let coordinator = build_pipeline(&llm.uri(), fast_retry(), Arc::clone(&logger));
    let report = coordinator.run(page_urls(&pages, &["/listing"])).await;

    assert_eq!(report.stats.records_accepted, 1);
    assert_eq!(report.stats.validation_failures, 1);

    logger.flush();
    let content = std::fs::read_to_string(logger.file_path().unwrap()).unwrap();
    assert!(content.contains("Record rejected"));
    assert!(content.contains("empty field name"));
    assert!(content.contains("missing field price"));
    assert!(content.contains("error_id: "));
}

#[tokio::test]
async fn test_failed_page_error_block_written_to_log_file() {
    let pages = MockServer::start().await;
    let llm = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&pages)
        .await;

    let log_dir = tempdir().unwrap();
    let logger = Arc::new(CrawlLogger::with_directory(log_dir.path(), 1024 * 1024, 5));
    let coordinator = build_pipeline(&llm.uri(), fast_retry(), Arc::clone(&logger));
    let report = coordinator.run(page_urls(&pages, &["/broken"])).await;

    assert_eq!(report.stats.pages_failed, 1);

    logger.flush();
    let content = std::fs::read_to_string(logger.file_path().unwrap()).unwrap();
    // Three attempts, each with a delimited error block carrying an id
    assert_eq!(content.matches("Error ID: ").count(), 3);
    assert!(content.contains("FETCH failed"));
    assert!(content.contains("Crawl run complete"));
    assert!(content.contains("pages_failed: 1"));
}

#[tokio::test]
async fn test_duplicate_records_across_pages_written_once() {
    let pages = MockServer::start().await;
    let llm = MockServer::start().await;

    mount_page(&pages, "/one", "<html>a</html>").await;
    mount_page(&pages, "/two", "<html>b</html>").await;
    // Same record from both pages
    mount_llm(
        &llm,
        r#"[{"name": "Same hotel", "price": 7, "images": ["s.png"]}]"#,
    )
    .await;

    let logger = Arc::new(CrawlLogger::console_only());
    let coordinator = build_pipeline(&llm.uri(), fast_retry(), logger);
    let report = coordinator.run(page_urls(&pages, &["/one", "/two"])).await;

    assert_eq!(report.stats.pages_attempted, 2);
    assert_eq!(report.stats.records_accepted, 1);
    assert_eq!(report.stats.duplicates_skipped, 1);
}
