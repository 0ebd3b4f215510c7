use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Catalog-Crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Pagination and pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Offset every category starts from, and returns to after exhaustion
    #[serde(rename = "start-offset", default)]
    pub start_offset: u64,

    /// Number of products requested per page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u64,

    /// Delay between two cycles of the same worker (milliseconds)
    #[serde(rename = "cycle-delay-ms", default = "default_cycle_delay_ms")]
    pub cycle_delay_ms: u64,

    /// Sleep after a category is exhausted (seconds)
    #[serde(rename = "cooldown-secs", default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Minimum age before an emitted item may be emitted again (hours)
    #[serde(rename = "freshness-hours", default = "default_freshness_hours")]
    pub freshness_hours: u64,

    /// Delay between two worker launches (milliseconds)
    #[serde(rename = "launch-interval-ms", default = "default_launch_interval_ms")]
    pub launch_interval_ms: u64,

    /// Deadline for a single page fetch (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound of the retry delay after consecutive fetch failures (milliseconds)
    #[serde(rename = "max-backoff-ms", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Base delay before restarting a crashed worker (milliseconds)
    #[serde(rename = "restart-backoff-ms", default = "default_restart_backoff_ms")]
    pub restart_backoff_ms: u64,

    /// How often stale dedup entries are swept (seconds)
    #[serde(rename = "sweep-interval-secs", default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl CrawlerConfig {
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Freshness window, saturating at the largest representable duration
    pub fn freshness_window(&self) -> chrono::Duration {
        i64::try_from(self.freshness_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn launch_interval(&self) -> Duration {
        Duration::from_millis(self.launch_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_offset: 0,
            page_size: default_page_size(),
            cycle_delay_ms: default_cycle_delay_ms(),
            cooldown_secs: default_cooldown_secs(),
            freshness_hours: default_freshness_hours(),
            launch_interval_ms: default_launch_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_backoff_ms: default_max_backoff_ms(),
            restart_backoff_ms: default_restart_backoff_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Catalog endpoint and category selection
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Site origin, e.g. "https://www.example.com"
    pub origin: String,

    /// Path (and query) of the GraphQL search endpoint, relative to the origin
    #[serde(rename = "graphql-path", default = "default_graphql_path")]
    pub graphql_path: String,

    /// Store whose pricing is requested
    #[serde(rename = "store-id")]
    pub store_id: String,

    /// Value substituted for the `<SIZE>` token in image URLs
    #[serde(rename = "image-size", default = "default_image_size")]
    pub image_size: String,

    /// Whether to load the home page before each search to refresh cookies
    #[serde(rename = "warm-up", default = "default_true")]
    pub warm_up: bool,

    /// Category identifiers (navigation parameters) to crawl
    pub categories: Vec<String>,
}

/// HTTP transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Optional proxy URL applied to every request
    #[serde(default)]
    pub proxy: Option<String>,

    /// Optional Referer header sent with search requests
    #[serde(default)]
    pub referer: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            proxy: None,
            referer: None,
        }
    }
}

/// Where emitted product records go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// One JSON object per line, appended to a file
    Jsonl,
    /// Upserted into a SQLite table
    Sqlite,
    /// Logged only
    #[default]
    Log,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub kind: OutputKind,

    /// Destination file for the jsonl and sqlite sinks
    #[serde(default)]
    pub path: Option<String>,
}

fn default_page_size() -> u64 {
    48
}

fn default_cycle_delay_ms() -> u64 {
    500
}

fn default_cooldown_secs() -> u64 {
    60 * 60
}

fn default_freshness_hours() -> u64 {
    24
}

fn default_launch_interval_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_restart_backoff_ms() -> u64 {
    1_000
}

fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

fn default_graphql_path() -> String {
    "/federation-gateway/graphql?opname=searchModel".to_string()
}

fn default_image_size() -> String {
    "300".to_string()
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/110.0".to_string()
}
