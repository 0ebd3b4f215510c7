//! Sink that only logs what would have been delivered

use crate::crawler::ProductRecord;
use crate::output::traits::{OutputResult, ProductSink};
use async_trait::async_trait;

/// Logs every emitted record at debug level and a batch summary at info
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl ProductSink for LogSink {
    async fn emit(&self, records: &[ProductRecord]) -> OutputResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        for record in records {
            tracing::debug!(
                sku = %record.sku,
                brand = %record.brand,
                price = ?record.price,
                "{}",
                record.name
            );
        }
        tracing::info!(count = records.len(), "Emitted batch");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
