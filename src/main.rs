//! Pagemill main entry point
//!
//! This is the command-line interface for the Pagemill extraction pipeline.

use clap::Parser;
use pagemill::config::{load_config_with_hash, resolve_api_key, Config};
use pagemill::extract::LlmExtractor;
use pagemill::fetch::HttpFetcher;
use pagemill::logging::{Component, CrawlLogger};
use pagemill::output::{CsvSink, RecordSink};
use pagemill::pipeline::{CrawlCoordinator, CrawlReport, PageProcessor};
use pagemill::retry::{RetryPolicy, TokioSleeper};
use pagemill::validate::FieldSpec;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Pagemill: LLM-assisted structured extraction from web pages
///
/// Pagemill fetches configured pages, asks an LLM service to extract
/// structured records from each one, validates the records against a
/// required-field schema, and appends the survivors to a CSV file. Every
/// failure along the way is logged with a unique error identifier.
#[derive(Parser, Debug)]
#[command(name = "pagemill")]
#[command(version)]
#[command(about = "LLM-assisted structured extraction from web pages", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be processed without running
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> pagemill::Result<()> {
    let cli = Cli::parse();

    // A local .env file may hold the API key during development
    dotenvy::dotenv().ok();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &config_hash)?;
        return Ok(());
    }

    handle_run(config).await
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagemill=info,warn"),
            1 => EnvFilter::new("pagemill=debug,info"),
            2 => EnvFilter::new("pagemill=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --dry-run: validates config and shows what would be processed
fn handle_dry_run(config: &Config, config_hash: &str) -> pagemill::Result<()> {
    println!("=== Pagemill Dry Run ===\n");

    println!("Configuration hash: {}", config_hash);

    println!("\nCrawler:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Max attempts per page: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms base, {}ms cap",
        config.retry.base_delay_ms, config.retry.max_delay_ms
    );

    println!("\nExtraction:");
    println!("  Endpoint: {}", config.extraction.base_url);
    println!("  Model: {}", config.extraction.model);
    println!("  API key variable: {}", config.extraction.api_key_env);
    match resolve_api_key(config) {
        Ok(_) => println!("  API key: present"),
        Err(e) => println!("  API key: MISSING ({})", e),
    }

    println!("\nSchema ({} fields):", config.schema.fields.len());
    println!("  Key field: {}", config.schema.key_field);
    for field in &config.schema.fields {
        println!("  - {} ({})", field.name, field.kind);
    }

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path);
    println!("  Logs: {}", config.logging.directory);

    println!("\nPages ({}):", config.pages.len());
    for page in &config.pages {
        println!("  - {}", page.url);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would process {} pages", config.pages.len());

    Ok(())
}

/// Runs the full extraction pipeline
async fn handle_run(config: Config) -> pagemill::Result<()> {
    // Missing credentials are the one fatal startup error; everything later
    // is recorded per page and the run continues
    let api_key = match resolve_api_key(&config) {
        Ok(key) => key,
        Err(e) => {
            tracing::error!("Cannot start: {}", e);
            return Err(e.into());
        }
    };

    let pages: Vec<Url> = config
        .pages
        .iter()
        .map(|p| Url::parse(&p.url))
        .collect::<Result<_, _>>()?;

    let logger = Arc::new(CrawlLogger::new(&config.logging));
    let fetcher = Arc::new(HttpFetcher::new()?);
    let extractor = Arc::new(LlmExtractor::new(&config.extraction, api_key)?);
    let fields = FieldSpec::from_schema(&config.schema);
    let cancel = Arc::new(AtomicBool::new(false));

    let processor = Arc::new(PageProcessor::new(
        fetcher,
        extractor,
        RetryPolicy::new(&config.retry),
        Arc::clone(&logger),
        Arc::new(TokioSleeper),
        fields,
        config.schema.key_field.clone(),
        Arc::clone(&cancel),
    ));

    let coordinator = CrawlCoordinator::new(
        processor,
        Arc::clone(&logger),
        config.crawler.concurrency as usize,
        Arc::clone(&cancel),
    );

    // First Ctrl-C requests a graceful stop; in-flight pages finish
    tokio::spawn({
        let cancel = Arc::clone(&cancel);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight pages");
                cancel.store(true, Ordering::Relaxed);
            }
        }
    });

    let report = coordinator.run(pages).await;

    write_output(&config, &report, &logger)?;

    tracing::info!(
        "Run finished: {} pages attempted, {} records written, {} pages failed",
        report.stats.pages_attempted,
        report.records.len(),
        report.stats.pages_failed
    );

    Ok(())
}

/// Writes accepted records to the configured CSV file
fn write_output(
    config: &Config,
    report: &CrawlReport,
    logger: &CrawlLogger,
) -> pagemill::Result<()> {
    if report.records.is_empty() {
        tracing::warn!("No records accepted; skipping CSV output");
        return Ok(());
    }

    let columns: Vec<String> = config
        .schema
        .fields
        .iter()
        .map(|f| f.name.clone())
        .collect();

    let mut sink = CsvSink::create(Path::new(&config.output.csv_path), columns)?;
    for record in &report.records {
        sink.append(record)?;
    }
    sink.flush()?;

    logger.info(
        Component::System,
        format!(
            "Wrote {} records to {}",
            report.records.len(),
            config.output.csv_path
        ),
    );

    Ok(())
}
