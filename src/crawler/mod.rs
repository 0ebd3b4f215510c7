//! Crawler module for category pagination
//!
//! This module contains the core crawling logic, including:
//! - Fetching search pages from the catalog's GraphQL endpoint
//! - Turning page items into product records
//! - Per-category pagination workers with dedup filtering
//! - The work queue and scheduler that launch and supervise workers

mod backoff;
mod fetcher;
mod product;
mod queue;
mod scheduler;
mod stats;
mod worker;

pub use backoff::RetryBackoff;
pub use fetcher::{
    build_http_client, decode_search_page, search_body, GraphqlPageFetcher, PageFetcher,
    PageRequest, SEARCH_QUERY,
};
pub use product::{
    round_price, substitute_image_size, ProductNormalizer, ProductRecord, RawItem, SearchPage,
    IMAGE_SIZE_TOKEN,
};
pub use queue::{category_queue, fan_out, CategoryProducer, CategoryQueue};
pub use scheduler::{Scheduler, SchedulerSettings, Supervisor};
pub use stats::{CrawlStats, StatsSnapshot};
pub use worker::{CategoryWorker, CycleOutcome, WorkerDeps, WorkerSettings};

use crate::config::Config;
use crate::dedup::DedupCache;
use crate::output::{build_sink, ProductSink};
use crate::CrawlerError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A configured crawler, ready to launch workers
pub struct Crawler {
    deps: WorkerDeps,
    scheduler_settings: SchedulerSettings,
}

impl Crawler {
    /// Creates a crawler around the given fetcher and sink
    pub fn new(config: &Config, fetcher: Arc<dyn PageFetcher>, sink: Arc<dyn ProductSink>) -> Self {
        let deps = WorkerDeps {
            fetcher,
            sink,
            dedup: Arc::new(DedupCache::new(config.crawler.freshness_window())),
            normalizer: Arc::new(ProductNormalizer::new(
                &config.catalog.origin,
                &config.catalog.image_size,
            )),
            stats: Arc::new(CrawlStats::new()),
            settings: WorkerSettings::from_config(&config.crawler, &config.catalog),
        };

        Self {
            deps,
            scheduler_settings: SchedulerSettings::from_config(&config.crawler),
        }
    }

    /// Builds the HTTP fetcher and output sink described by the configuration
    ///
    /// Any failure here happens before a single worker starts.
    pub async fn from_config(config: &Config) -> Result<Self, CrawlerError> {
        let fetcher = GraphqlPageFetcher::new(
            &config.catalog,
            &config.transport,
            config.crawler.request_timeout(),
        )?;
        let sink = build_sink(&config.output).await?;

        tracing::info!(
            endpoint = fetcher.endpoint(),
            store_id = %config.catalog.store_id,
            "Catalog fetcher ready"
        );

        Ok(Self::new(config, Arc::new(fetcher), sink))
    }

    pub fn dedup(&self) -> Arc<DedupCache> {
        self.deps.dedup.clone()
    }

    pub fn stats(&self) -> Arc<CrawlStats> {
        self.deps.stats.clone()
    }

    /// Launches one worker per category, starting at `start_offset`
    ///
    /// Returns once every category has a running worker.
    pub async fn run(&self, category_ids: &[String], start_offset: u64) -> Supervisor {
        self.run_with_cancellation(category_ids, start_offset, CancellationToken::new())
            .await
    }

    /// Like [`Crawler::run`], with a caller-owned shutdown token
    pub async fn run_with_cancellation(
        &self,
        category_ids: &[String],
        start_offset: u64,
        cancel: CancellationToken,
    ) -> Supervisor {
        let mut deps = self.deps.clone();
        deps.settings.start_offset = start_offset;

        tracing::info!(
            categories = category_ids.len(),
            start_offset,
            page_size = deps.settings.page_size,
            "Beginning crawl"
        );

        Scheduler::new(deps, self.scheduler_settings.clone())
            .launch(category_ids, cancel)
            .await
    }
}

/// Runs a crawl for the configured categories
///
/// This is the main entry point. It will:
/// 1. Build the HTTP fetcher and output sink
/// 2. Enqueue every configured category
/// 3. Launch one worker per category, staggered by the launch interval
///
/// Cancelling `cancel` stops the run at any point, including while workers
/// are still being launched.
///
/// # Returns
///
/// * `Ok(Supervisor)` - Launching finished or was interrupted by `cancel`
/// * `Err(CrawlerError)` - Startup failed; no worker was started
pub async fn run(config: Config, cancel: CancellationToken) -> Result<Supervisor, CrawlerError> {
    let crawler = Crawler::from_config(&config).await?;
    Ok(crawler
        .run_with_cancellation(&config.catalog.categories, config.crawler.start_offset, cancel)
        .await)
}
