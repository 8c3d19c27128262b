//! Sumi-Fetch main entry point
//!
//! Command-line front end for the politeness-aware fetch scheduler.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumi_fetch::config::{load_config_with_hash, Config};
use sumi_fetch::grouping::DnsResolver;
use sumi_fetch::output::{print_statistics, CrawlStats, RunStatus, SqliteSink};
use sumi_fetch::{FetchScheduler, HttpFetcher};
use tracing_subscriber::EnvFilter;

/// Sumi-Fetch: a politeness-aware fetch scheduler
///
/// Reads candidate URLs, groups them by target, honors robots.txt and crawl
/// delays, and records every outcome in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "sumi-fetch")]
#[command(version = "1.0.0")]
#[command(about = "A politeness-aware fetch scheduler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// File with one URL per line, optionally followed by a tab and a score
    #[arg(short, long, value_name = "FILE")]
    urls: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and URL file without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let entries = read_url_file(&cli.urls)?;
    tracing::info!("Read {} URLs from {}", entries.len(), cli.urls.display());

    if cli.dry_run {
        handle_dry_run(&config, entries.len());
        return Ok(());
    }

    handle_fetch(config, &config_hash, entries).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_fetch=info,warn"),
            1 => EnvFilter::new("sumi_fetch=debug,info"),
            2 => EnvFilter::new("sumi_fetch=trace,debug"),
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

/// Reads `url[<TAB>score]` lines, skipping blanks and `#` comments
fn read_url_file(path: &Path) -> anyhow::Result<Vec<(String, f64)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read URL file {}", path.display()))?;

    let mut entries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if let Some(entry) = parse_url_line(line)
            .with_context(|| format!("{}:{}", path.display(), index + 1))?
        {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn parse_url_line(line: &str) -> anyhow::Result<Option<(String, f64)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split('\t');
    let url = fields.next().unwrap_or_default().trim().to_string();
    let score = match fields.next().map(str::trim) {
        Some(raw) if !raw.is_empty() => raw
            .parse::<f64>()
            .with_context(|| format!("invalid score '{}'", raw))?,
        _ => 1.0,
    };
    if !score.is_finite() {
        bail!("score must be finite, got {}", score);
    }
    Ok(Some((url, score)))
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, url_count: usize) {
    let fetcher = &config.fetcher;
    println!("=== Sumi-Fetch Dry Run ===\n");

    println!("Scheduler:");
    println!("  Workers: {}", fetcher.worker_count);
    println!("  Max queued items: {}", fetcher.max_queued_items);
    println!("  Max queue size: {}", fetcher.max_queue_size);
    println!("  URLs per set: {}", fetcher.max_urls_per_set);
    println!("  URLs per server: {}", fetcher.max_urls_per_server);
    println!("  Threads per host: {}", fetcher.threads_per_host);
    println!("  Fetch policy: {:?}", fetcher.fetch_policy);
    println!("  Grouping: {:?}", fetcher.grouping);

    println!("\nPoliteness:");
    println!("  Default crawl delay: {}ms", fetcher.default_crawl_delay);
    println!("  Minimum crawl delay: {}ms", fetcher.min_crawl_delay);
    match fetcher.crawl_end_time {
        Some(end) => println!("  Crawl end time: {}", end.to_rfc3339()),
        None => println!("  Fetch window: {}ms", fetcher.fetch_window),
    }

    println!("\nLimits:");
    println!("  Max content size: {} bytes", fetcher.max_content_size);
    println!("  Min response rate: {} B/s", fetcher.min_response_rate);
    println!("  Max redirects: {}", fetcher.max_redirects);
    println!("  Max robots.txt redirects: {}", fetcher.max_robots_redirects);

    println!("\nUser Agent: {}", config.user_agent.header_value());
    println!("Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
    println!("✓ Would submit {} URLs", url_count);
}

/// Handles the main fetch run
async fn handle_fetch(
    config: Config,
    config_hash: &str,
    entries: Vec<(String, f64)>,
) -> anyhow::Result<()> {
    let sink = Arc::new(SqliteSink::new(
        Path::new(&config.output.database_path),
        config_hash,
    )?);
    let stats = Arc::new(CrawlStats::new());
    let fetcher = Arc::new(HttpFetcher::new(&config.user_agent, &config.fetcher)?);

    let scheduler = FetchScheduler::new(
        &config,
        fetcher,
        Arc::new(DnsResolver),
        sink.clone(),
        stats.clone(),
    );
    scheduler.start()?;
    tracing::info!("Starting fetch run {}", sink.run_id());

    let run = async {
        for (url, score) in &entries {
            scheduler.submit(url, *score).await?;
        }
        scheduler.run_until_done().await
    };

    let mut failure = None;
    let status = tokio::select! {
        result = run => match result {
            Ok(()) => RunStatus::Completed,
            Err(e) => {
                tracing::error!("Fetch run failed: {}", e);
                failure = Some(e);
                RunStatus::Failed
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, shutting down");
            scheduler.shutdown().await;
            RunStatus::Interrupted
        }
    };

    sink.complete_run(status)?;
    print_statistics(&stats.snapshot());

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
