//! Output sink trait and error types
//!
//! The crawl workers hand every batch of fresh product records to a
//! [`ProductSink`]. Delivery is at-most-once: a failed batch is logged by the
//! worker and never offered again.

use crate::crawler::ProductRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while emitting records
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for downstream record sinks
///
/// Implementations are shared by every category worker and must be safe to
/// call concurrently. An empty batch must succeed without side effects.
#[async_trait]
pub trait ProductSink: Send + Sync {
    /// Hands one batch of records to the sink
    ///
    /// # Arguments
    ///
    /// * `records` - Records produced by one crawl cycle (possibly empty)
    async fn emit(&self, records: &[ProductRecord]) -> OutputResult<()>;

    /// Short name used in log lines
    fn name(&self) -> &'static str;
}
