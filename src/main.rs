//! Catalog-Crawler main entry point
//!
//! This is the command-line interface for the Catalog-Crawler category crawler.

use anyhow::Context;
use catalog_crawler::config::{load_config_with_hash, validate, Config};
use catalog_crawler::crawler::run;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Catalog-Crawler: a paced category crawler for GraphQL product catalogs
///
/// Catalog-Crawler pages through the search results of every configured
/// category, one worker per category, and emits each product at most once
/// per freshness window.
#[derive(Parser, Debug)]
#[command(name = "catalog-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A paced category crawler for GraphQL product catalogs", long_about = None)]
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

    /// Result offset every category starts from (overrides the config file)
    #[arg(long, value_name = "N")]
    offset: Option<u64>,

    /// Crawl only these categories (repeatable, overrides the config file)
    #[arg(long = "category", value_name = "ID")]
    categories: Vec<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    apply_overrides(&mut config, &cli)?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_crawler=info,warn"),
            1 => EnvFilter::new("catalog_crawler=debug,info"),
            2 => EnvFilter::new("catalog_crawler=trace,debug"),
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

/// Applies command-line overrides and re-checks the result
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(offset) = cli.offset {
        config.crawler.start_offset = offset;
    }
    if !cli.categories.is_empty() {
        config.catalog.categories = cli.categories.clone();
    }

    validate(config).context("invalid command-line overrides")?;
    Ok(())
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Crawler Dry Run ===\n");

    println!("Catalog:");
    println!("  Origin: {}", config.catalog.origin);
    println!("  GraphQL path: {}", config.catalog.graphql_path);
    println!("  Store: {}", config.catalog.store_id);
    println!("  Warm-up request: {}", config.catalog.warm_up);

    println!("\nPagination:");
    println!("  Start offset: {}", config.crawler.start_offset);
    println!("  Page size: {}", config.crawler.page_size);
    println!("  Cycle delay: {}ms", config.crawler.cycle_delay_ms);
    println!("  Cooldown: {}s", config.crawler.cooldown_secs);
    println!("  Freshness window: {}h", config.crawler.freshness_hours);
    println!("  Launch interval: {}ms", config.crawler.launch_interval_ms);

    println!("\nTransport:");
    println!("  User agent: {}", config.transport.user_agent);
    match &config.transport.proxy {
        Some(proxy) => println!("  Proxy: {}", proxy),
        None => println!("  Proxy: none"),
    }

    println!("\nOutput:");
    println!("  Kind: {:?}", config.output.kind);
    if let Some(path) = &config.output.path {
        println!("  Path: {}", path);
    }

    println!("\nCategories ({}):", config.catalog.categories.len());
    for category in &config.catalog.categories {
        println!("  - {}", category);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would launch {} workers",
        config.catalog.categories.len()
    );
}

/// Runs the crawl until Ctrl-C, then stops every worker
///
/// The interrupt handler is installed before any worker is launched, so an
/// interrupt during the staggered launch also shuts down cooperatively.
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Categories: {}, start offset: {}, page size: {}",
        config.catalog.categories.len(),
        config.crawler.start_offset,
        config.crawler.page_size
    );

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let supervisor = match run(config, cancel.clone()).await {
        Ok(supervisor) => supervisor,
        Err(e) => {
            watcher.abort();
            return Err(e).context("crawler failed to start");
        }
    };

    let stats = supervisor.wait().await;
    tracing::info!("Crawl stopped: {}", stats);
    Ok(())
}

/// Cancels `cancel` on the first Ctrl-C
async fn cancel_on_interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Interrupt received, stopping workers");
            cancel.cancel();
        }
        Err(e) => {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        }
    }
}
