//! `crawl` — a thin CLI front-end over [`politecrawl`]'s crawl engine.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser as ClapParser;
use politecrawl::crawl_engine::LoggingProgress;
use politecrawl::{storage_for_path, CrawlConfig, CrawlEngine};
use tracing_subscriber::EnvFilter;

/// A polite, concurrent web crawler.
#[derive(Debug, ClapParser)]
#[command(name = "crawl", version, about)]
struct Cli {
    /// One or more seed URLs to start crawling from.
    #[arg(required = true)]
    seeds: Vec<String>,

    /// Stop after this many pages have been processed.
    #[arg(long, default_value_t = 1000)]
    max_pages: usize,

    /// Maximum link-following depth below the seeds.
    #[arg(long, default_value_t = 3)]
    max_depth: u32,

    /// Maximum number of requests in flight across all hosts.
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// Maximum number of requests in flight per host.
    #[arg(long, default_value_t = 2)]
    per_host_concurrency: usize,

    /// Target requests per second, per host.
    #[arg(long, default_value_t = 1.0)]
    rps: f64,

    /// Ignore robots.txt entirely.
    #[arg(long)]
    no_robots: bool,

    /// Disable TLS certificate verification.
    #[arg(long)]
    insecure: bool,

    /// Output path. The extension selects the storage backend:
    /// `.csv` -> CSV, `.db`/`.sqlite` -> SQLite, anything else -> JSONL.
    #[arg(long, default_value = "crawl-output.jsonl")]
    out: PathBuf,

    /// Tracing filter directive, e.g. "info" or "crawl=debug".
    #[arg(long, default_value = "info")]
    log_level: String,
}

const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = CrawlConfig::default()
        .with_max_pages(cli.max_pages)
        .with_max_depth(cli.max_depth)
        .with_max_concurrent(cli.concurrency)
        .with_per_host_concurrent(cli.per_host_concurrency)
        .with_requests_per_second(cli.rps)
        .with_respect_robots(!cli.no_robots)
        .with_verify_tls(!cli.insecure);

    let storage: Arc<dyn politecrawl::Storage> = match storage_for_path(&cli.out).await {
        Ok(storage) => Arc::from(storage),
        Err(err) => {
            tracing::error!(error = %err, path = %cli.out.display(), "failed to initialize storage");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let engine = match CrawlEngine::new(config, storage) {
        Ok(engine) => Arc::new(engine.with_progress(Arc::new(LoggingProgress))),
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize crawl engine");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let cancellation = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, draining in-flight requests");
            cancellation.cancel();
        }
    });

    let interrupted = engine.cancellation_token();
    let report = engine.crawl(&cli.seeds).await;

    tracing::info!(
        processed = report.processed,
        failed = report.failed,
        queued = report.stats.queued,
        elapsed_s = report.elapsed.as_secs(),
        "crawl finished"
    );

    if interrupted.is_cancelled() {
        ExitCode::from(EXIT_INTERRUPTED)
    } else {
        ExitCode::SUCCESS
    }
}
