//! Catalog-Crawler: a paced category crawler for GraphQL product catalogs
//!
//! This crate walks the paginated search results of a product catalog, one
//! independent worker per category, and emits normalized product records while
//! suppressing items already reported within a freshness window.

pub mod config;
pub mod crawler;
pub mod dedup;
pub mod output;
pub mod state;

use thiserror::Error;

/// Main error type for Catalog-Crawler operations
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::WorkerPhase,
        to: state::WorkerPhase,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors produced while fetching one page of search results
///
/// Every variant is treated as transient by the crawl workers.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed search payload: {0}")]
    Payload(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Failed to build request: {0}")]
    Build(String),
}

/// Result type alias for Catalog-Crawler operations
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for page fetches
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run, Crawler, ProductRecord, RawItem, SearchPage, Supervisor};
pub use dedup::DedupCache;
pub use state::{CategoryState, WorkerPhase};
