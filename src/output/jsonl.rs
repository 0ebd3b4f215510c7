//! JSON Lines file sink

use crate::crawler::ProductRecord;
use crate::output::traits::{OutputResult, ProductSink};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends one JSON object per record to a file
///
/// A whole batch is written with a single `write_all` while the file lock is
/// held, so lines from concurrent workers never interleave.
pub struct JsonLinesSink {
    file: Mutex<File>,
}

impl JsonLinesSink {
    /// Opens (or creates) the output file in append mode
    pub async fn open(path: &Path) -> OutputResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl ProductSink for JsonLinesSink {
    async fn emit(&self, records: &[ProductRecord]) -> OutputResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::with_capacity(records.len() * 256);
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        let mut file = self.file.lock().await;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
