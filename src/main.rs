//! Shelfscan main entry point
//!
//! This is the command-line interface for the Shelfscan catalogue crawler.

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::Parser;
use shelfscan::config::{load_config_with_hash, Config};
use shelfscan::crawler::{run_crawl_until, Extractor};
use shelfscan::output::print_summary;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Shelfscan: a daily catalogue crawler for e-commerce sites
///
/// Shelfscan walks every category of a site, follows pagination, and appends
/// the products it finds to one CSV file per site and day. Raw pages are kept
/// next to the records, so an interrupted day can be re-run without fetching
/// the same page twice.
#[derive(Parser, Debug)]
#[command(name = "shelfscan")]
#[command(version)]
#[command(about = "A daily catalogue crawler for e-commerce sites", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Site to crawl; repeat for several (default: every configured site)
    #[arg(short, long = "site", value_name = "NAME")]
    sites: Vec<String>,

    /// Date of the run as YYYY-MM-DD (default: today)
    #[arg(short, long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Override the number of workers
    #[arg(short, long)]
    workers: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}': {}", value, e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if let Some(workers) = cli.workers {
        if workers == 0 {
            bail!("--workers must be at least 1");
        }
        config.crawler.max_workers = workers;
    }

    let sites = selected_sites(&config, &cli.sites)?;
    let date = cli.date.unwrap_or_else(|| Local::now().date_naive());

    if cli.dry_run {
        handle_dry_run(&config, &sites, date)
    } else {
        handle_crawl(&config, &sites, date, cli.quiet).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelfscan=info,warn"),
            1 => EnvFilter::new("shelfscan=debug,info"),
            2 => EnvFilter::new("shelfscan=trace,debug"),
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

/// Resolves `--site` arguments against the configuration
fn selected_sites(config: &Config, requested: &[String]) -> anyhow::Result<Vec<String>> {
    if requested.is_empty() {
        if config.sites.is_empty() {
            bail!("No [[site]] entries in the configuration");
        }
        return Ok(config.sites.iter().map(|s| s.name.clone()).collect());
    }

    for name in requested {
        if config.site(name).is_none() {
            bail!("Unknown site '{}'", name);
        }
    }
    Ok(requested.to_vec())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, sites: &[String], date: NaiveDate) -> anyhow::Result<()> {
    println!("=== Shelfscan Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.max_workers);
    println!("  Attempts per page: {}", config.crawler.attempt_limit);
    println!("  Attempts for top-level pages: {}", config.crawler.seed_attempt_limit);
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout_ms);
    println!("  Retry delay: {}ms", config.crawler.retry_delay_ms);
    match config.crawler.run_deadline_secs {
        Some(secs) => println!("  Run deadline: {}s", secs),
        None => println!("  Run deadline: none"),
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Pages: {}", config.output.html_dir);
    println!("  Records: {}", config.output.csv_dir);

    println!("\nSites ({}) for {}:", sites.len(), date);
    for name in sites {
        let Some(site) = config.site(name) else {
            continue;
        };
        let extractor = Extractor::new(site)?;
        let pagination = match extractor.pagination_mode() {
            Some(mode) => format!("{:?}", mode).to_lowercase(),
            None => "none".to_string(),
        };
        println!("  - {} ({}, pagination: {})", site.name, site.base_url, pagination);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main crawl operation, one site after the other
async fn handle_crawl(config: &Config, sites: &[String], date: NaiveDate, quiet: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing pages in flight");
                cancel.cancel();
            }
        });
    }

    let mut failed = Vec::new();
    for name in sites {
        if cancel.is_cancelled() {
            break;
        }

        match run_crawl_until(config, name, date, cancel.clone()).await {
            Ok(summary) => {
                if !quiet {
                    print_summary(&summary);
                }
            }
            Err(e) => {
                tracing::error!("Crawl of {} failed: {}", name, e);
                failed.push(name.as_str());
            }
        }
    }

    if !failed.is_empty() {
        bail!("Crawl failed for: {}", failed.join(", "));
    }
    Ok(())
}
