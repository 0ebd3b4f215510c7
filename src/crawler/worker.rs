//! Category crawl worker
//!
//! One worker owns one category's pagination cursor and runs until it is
//! cancelled:
//!
//! 1. Fetch the page at the cursor (bounded by the request deadline)
//! 2. On failure, keep the cursor and retry after an exponential backoff
//! 3. Capture the category total on the first page of a pass
//! 4. Claim each item in the dedup cache; only fresh items become records
//! 5. Hand the batch to the sink (failures are logged, never retried)
//! 6. Advance the cursor, or reset it and cool down once it passes the total
//! 7. Sleep the cycle delay before the next cycle

use crate::config::{CatalogConfig, CrawlerConfig};
use crate::crawler::backoff::RetryBackoff;
use crate::crawler::fetcher::{PageFetcher, PageRequest};
use crate::crawler::product::{ProductNormalizer, ProductRecord, RawItem};
use crate::crawler::stats::CrawlStats;
use crate::dedup::DedupCache;
use crate::output::ProductSink;
use crate::state::{Advance, CategoryState};
use crate::{CrawlerError, FetchError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pacing and request parameters shared by every worker
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub start_offset: u64,
    pub page_size: u64,
    pub store_id: String,
    pub cycle_delay: Duration,
    pub cooldown: Duration,
    pub request_timeout: Duration,
    pub max_backoff: Duration,
}

impl WorkerSettings {
    pub fn from_config(crawler: &CrawlerConfig, catalog: &CatalogConfig) -> Self {
        Self {
            start_offset: crawler.start_offset,
            page_size: crawler.page_size,
            store_id: catalog.store_id.clone(),
            cycle_delay: crawler.cycle_delay(),
            cooldown: crawler.cooldown(),
            request_timeout: crawler.request_timeout(),
            max_backoff: crawler.max_backoff(),
        }
    }
}

/// Collaborators a worker is built from
///
/// Cloning is cheap; every worker of a run shares the same fetcher, sink,
/// dedup cache and counters.
#[derive(Clone)]
pub struct WorkerDeps {
    pub fetcher: Arc<dyn PageFetcher>,
    pub sink: Arc<dyn ProductSink>,
    pub dedup: Arc<DedupCache>,
    pub normalizer: Arc<ProductNormalizer>,
    pub stats: Arc<CrawlStats>,
    pub settings: WorkerSettings,
}

impl WorkerDeps {
    /// Builds a fresh worker for `category_id`
    pub fn worker(&self, category_id: &str) -> CategoryWorker {
        CategoryWorker::new(category_id, self.clone())
    }
}

/// What a single cycle did
#[derive(Debug)]
pub enum CycleOutcome {
    /// The page could not be fetched; the cursor did not move
    FetchFailed { error: FetchError, retry_in: Duration },

    /// A page was processed and more pages remain
    Advanced { emitted: usize, next_index: u64 },

    /// A page was processed and the category is exhausted for this pass
    Exhausted { emitted: usize },
}

impl CycleOutcome {
    /// Time to wait before the next cycle
    pub fn delay(&self, settings: &WorkerSettings) -> Duration {
        match self {
            Self::FetchFailed { retry_in, .. } => *retry_in,
            Self::Advanced { .. } => settings.cycle_delay,
            Self::Exhausted { .. } => settings.cooldown + settings.cycle_delay,
        }
    }
}

/// Crawls one category forever
pub struct CategoryWorker {
    state: CategoryState,
    deps: WorkerDeps,
    backoff: RetryBackoff,
}

impl CategoryWorker {
    pub fn new(category_id: &str, deps: WorkerDeps) -> Self {
        let settings = &deps.settings;
        let state = CategoryState::new(category_id, settings.start_offset, settings.page_size);
        let backoff = RetryBackoff::new(settings.cycle_delay, settings.max_backoff);

        Self {
            state,
            deps,
            backoff,
        }
    }

    pub fn state(&self) -> &CategoryState {
        &self.state
    }

    pub fn category_id(&self) -> &str {
        &self.state.category_id
    }

    /// Runs cycles until `cancel` fires
    ///
    /// Cancellation is observed before every cycle, while a fetch or emit is
    /// in flight, and during every sleep.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            category = %self.category_id(),
            start_index = self.state.start_index,
            "Worker started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.run_cycle() => Some(result),
            };
            let Some(result) = result else {
                break;
            };

            let delay = match result {
                Ok(outcome) => {
                    let delay = outcome.delay(&self.deps.settings);
                    if let CycleOutcome::Exhausted { .. } = outcome {
                        tracing::info!(
                            category = %self.category_id(),
                            cooldown_secs = self.deps.settings.cooldown.as_secs(),
                            "Category exhausted, cooling down"
                        );
                    }
                    delay
                }
                Err(e) => {
                    tracing::error!(
                        category = %self.category_id(),
                        error = %e,
                        "Cursor in an unexpected state, starting a new pass"
                    );
                    self.restart_pass();
                    self.deps.settings.cycle_delay
                }
            };

            if !sleep_or_cancel(&cancel, delay).await {
                break;
            }
        }

        self.state.stop();
        tracing::info!(category = %self.category_id(), "Worker stopped");
    }

    /// Runs one fetch/filter/emit/advance cycle without sleeping
    ///
    /// If the previous cycle exhausted the category, this begins the new pass
    /// first.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CrawlerError> {
        if !self.state.phase().is_fetching() {
            self.state.begin_pass()?;
        }

        let request = PageRequest {
            category_id: self.state.category_id.clone(),
            start_index: self.state.start_index,
            store_id: self.deps.settings.store_id.clone(),
            page_size: self.deps.settings.page_size,
        };

        let fetched = tokio::time::timeout(
            self.deps.settings.request_timeout,
            self.deps.fetcher.fetch_page(&request),
        )
        .await
        .unwrap_or_else(|_| Err(FetchError::Timeout(self.deps.settings.request_timeout)));

        let page = match fetched {
            Ok(page) => page,
            Err(error) => {
                self.deps.stats.fetch_failed();
                let retry_in = self.backoff.record_failure();
                tracing::warn!(
                    category = %request.category_id,
                    start_index = request.start_index,
                    attempt = self.backoff.failures(),
                    retry_in_ms = retry_in.as_millis() as u64,
                    error = %error,
                    "Failed to fetch page"
                );
                return Ok(CycleOutcome::FetchFailed { error, retry_in });
            }
        };

        self.backoff.reset();
        self.deps.stats.page_fetched();

        if self.state.record_total(page.total_products) {
            tracing::info!(
                category = %request.category_id,
                total_products = page.total_products,
                "Captured category total"
            );
        }

        let batch = self.claim_fresh(&page.items);
        let emitted = batch.len();

        match self.deps.sink.emit(&batch).await {
            Ok(()) => {
                self.deps.stats.records_emitted(emitted);
                tracing::debug!(
                    category = %request.category_id,
                    start_index = request.start_index,
                    items = page.items.len(),
                    emitted,
                    "Page processed"
                );
            }
            Err(e) => {
                // Items stay marked in the dedup cache; the batch is lost
                self.deps.stats.emit_failed();
                tracing::error!(
                    category = %request.category_id,
                    sink = self.deps.sink.name(),
                    records = emitted,
                    error = %e,
                    "Failed to emit records"
                );
            }
        }

        match self.state.advance()? {
            Advance::NextPage { next_index } => Ok(CycleOutcome::Advanced {
                emitted,
                next_index,
            }),
            Advance::Exhausted => {
                self.deps.stats.category_exhausted();
                Ok(CycleOutcome::Exhausted { emitted })
            }
        }
    }

    /// Turns the items not emitted within the freshness window into records
    ///
    /// Each item is claimed individually, so an identifier repeated within the
    /// same page yields a single record.
    fn claim_fresh(&self, items: &[RawItem]) -> Vec<ProductRecord> {
        let mut batch = Vec::with_capacity(items.len());
        for item in items {
            if self.deps.dedup.try_claim(&item.item_id) {
                batch.push(self.deps.normalizer.normalize(item));
            }
        }

        let suppressed = items.len() - batch.len();
        if suppressed > 0 {
            self.deps.stats.records_suppressed(suppressed);
        }
        batch
    }

    fn restart_pass(&mut self) {
        let settings = &self.deps.settings;
        self.state = CategoryState::new(
            self.state.category_id.clone(),
            settings.start_offset,
            settings.page_size,
        );
    }
}

/// Sleeps for `delay` unless cancelled first; returns false on cancellation
pub(crate) async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
