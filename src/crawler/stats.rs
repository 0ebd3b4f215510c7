//! Crawl counters shared by all workers

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide crawl counters
#[derive(Debug, Default)]
pub struct CrawlStats {
    pages_fetched: AtomicU64,
    fetch_errors: AtomicU64,
    records_emitted: AtomicU64,
    records_suppressed: AtomicU64,
    emit_errors: AtomicU64,
    exhaustions: AtomicU64,
    worker_restarts: AtomicU64,
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub pages_fetched: u64,
    pub fetch_errors: u64,
    pub records_emitted: u64,
    pub records_suppressed: u64,
    pub emit_errors: u64,
    pub exhaustions: u64,
    pub worker_restarts: u64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_failed(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_emitted(&self, count: usize) {
        self.records_emitted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn records_suppressed(&self, count: usize) {
        self.records_suppressed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn emit_failed(&self) {
        self.emit_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn category_exhausted(&self) {
        self.exhaustions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_restarted(&self) {
        self.worker_restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            records_suppressed: self.records_suppressed.load(Ordering::Relaxed),
            emit_errors: self.emit_errors.load(Ordering::Relaxed),
            exhaustions: self.exhaustions.load(Ordering::Relaxed),
            worker_restarts: self.worker_restarts.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pages={} fetch_errors={} emitted={} suppressed={} emit_errors={} exhaustions={} restarts={}",
            self.pages_fetched,
            self.fetch_errors,
            self.records_emitted,
            self.records_suppressed,
            self.emit_errors,
            self.exhaustions,
            self.worker_restarts
        )
    }
}
