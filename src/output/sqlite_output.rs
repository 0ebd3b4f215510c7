//! SQLite product sink
//!
//! Records are upserted by sku into a `products` table, so the table holds the
//! latest values of every product ever emitted plus when it was first seen.

use crate::crawler::ProductRecord;
use crate::output::traits::{OutputResult, ProductSink};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQL schema for the product table
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    sku TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    brand TEXT NOT NULL,
    image TEXT NOT NULL,
    url TEXT NOT NULL,
    price INTEGER,
    first_seen_at TEXT NOT NULL,
    last_emitted_at TEXT NOT NULL,
    emit_count INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_products_brand ON products(brand);
"#;

const UPSERT_SQL: &str = "
INSERT INTO products (sku, name, brand, image, url, price, first_seen_at, last_emitted_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
ON CONFLICT(sku) DO UPDATE SET
    name = excluded.name,
    brand = excluded.brand,
    image = excluded.image,
    url = excluded.url,
    price = excluded.price,
    last_emitted_at = excluded.last_emitted_at,
    emit_count = emit_count + 1
";

/// A stored product row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProduct {
    pub record: ProductRecord,
    pub first_seen_at: String,
    pub last_emitted_at: String,
    pub emit_count: i64,
}

/// Sink that writes each batch in a single transaction
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Opens or creates the database file and ensures the schema exists
    pub fn open(path: &Path) -> OutputResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    pub fn open_in_memory() -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of distinct products stored
    pub fn count(&self) -> OutputResult<u64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Looks up a stored product by sku
    pub fn get(&self, sku: &str) -> OutputResult<Option<StoredProduct>> {
        let conn = self.conn();
        let product = conn
            .query_row(
                "SELECT sku, name, brand, image, url, price, first_seen_at, last_emitted_at, emit_count
                 FROM products WHERE sku = ?1",
                params![sku],
                |row| {
                    Ok(StoredProduct {
                        record: ProductRecord {
                            sku: row.get(0)?,
                            name: row.get(1)?,
                            brand: row.get(2)?,
                            image: row.get(3)?,
                            url: row.get(4)?,
                            price: row.get(5)?,
                        },
                        first_seen_at: row.get(6)?,
                        last_emitted_at: row.get(7)?,
                        emit_count: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(product)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ProductSink for SqliteSink {
    async fn emit(&self, records: &[ProductRecord]) -> OutputResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
            for record in records {
                stmt.execute(params![
                    record.sku,
                    record.name,
                    record.brand,
                    record.image,
                    record.url,
                    record.price,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sku: &str, price: Option<i64>) -> ProductRecord {
        ProductRecord {
            sku: sku.to_string(),
            name: "Bath Fan".to_string(),
            brand: "Acme".to_string(),
            image: "https://images.example.com/fan-300.jpg".to_string(),
            url: "https://www.example.com/p/fan".to_string(),
            price,
        }
    }

    #[tokio::test]
    async fn test_emit_inserts_records() {
        let sink = SqliteSink::open_in_memory().unwrap();
        sink.emit(&[record("1", Some(20)), record("2", None)])
            .await
            .unwrap();

        assert_eq!(sink.count().unwrap(), 2);
        let stored = sink.get("2").unwrap().unwrap();
        assert_eq!(stored.record.price, None);
        assert_eq!(stored.emit_count, 1);
    }

    #[tokio::test]
    async fn test_re_emission_updates_in_place() {
        let sink = SqliteSink::open_in_memory().unwrap();
        sink.emit(&[record("1", Some(20))]).await.unwrap();
        let first = sink.get("1").unwrap().unwrap();

        sink.emit(&[record("1", Some(18))]).await.unwrap();
        let second = sink.get("1").unwrap().unwrap();

        assert_eq!(sink.count().unwrap(), 1);
        assert_eq!(second.record.price, Some(18));
        assert_eq!(second.emit_count, 2);
        assert_eq!(second.first_seen_at, first.first_seen_at);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let sink = SqliteSink::open_in_memory().unwrap();
        sink.emit(&[]).await.unwrap();
        assert_eq!(sink.count().unwrap(), 0);
        assert!(sink.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteSink::open(&dir.path().join("products.db")).unwrap();
        assert_eq!(sink.count().unwrap(), 0);
    }
}
