//! Output module for delivering product records downstream
//!
//! This module handles:
//! - The `ProductSink` emit capability used by crawl workers
//! - JSON Lines, SQLite and log-only sink implementations
//! - Building the configured sink at startup

mod jsonl;
mod log_sink;
mod sqlite_output;
mod traits;

pub use jsonl::JsonLinesSink;
pub use log_sink::LogSink;
pub use sqlite_output::{SqliteSink, StoredProduct};
pub use traits::{OutputError, OutputResult, ProductSink};

use crate::config::{OutputConfig, OutputKind};
use std::path::Path;
use std::sync::Arc;

/// Builds the sink described by the output configuration
///
/// Failures here are startup errors and abort the run before any worker
/// is launched.
pub async fn build_sink(config: &OutputConfig) -> OutputResult<Arc<dyn ProductSink>> {
    let path = || {
        config
            .path
            .as_deref()
            .map(Path::new)
            .ok_or_else(|| OutputError::Unavailable(format!("no path for {:?} sink", config.kind)))
    };

    let sink: Arc<dyn ProductSink> = match config.kind {
        OutputKind::Jsonl => Arc::new(JsonLinesSink::open(path()?).await?),
        OutputKind::Sqlite => Arc::new(SqliteSink::open(path()?)?),
        OutputKind::Log => Arc::new(LogSink),
    };

    tracing::info!(sink = sink.name(), "Output sink ready");
    Ok(sink)
}
