use crate::config::types::{
    CatalogConfig, Config, CrawlerConfig, OutputConfig, OutputKind, TransportConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_catalog_config(&config.catalog)?;
    validate_transport_config(&config.transport)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Largest accepted `start-offset`
const MAX_START_OFFSET: u64 = 1_000_000_000;

/// Largest accepted freshness window, in hours (one year)
const MAX_FRESHNESS_HOURS: u64 = 24 * 365;

/// Largest accepted value for the seconds-based settings (seven days)
const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Largest accepted value for the millisecond-based settings (one hour)
const MAX_DELAY_MS: u64 = 60 * 60 * 1000;

/// Validates pagination and pacing settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 || config.page_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 1000, got {}",
            config.page_size
        )));
    }

    check_max("start_offset", config.start_offset, MAX_START_OFFSET)?;

    if config.cycle_delay_ms < 1 {
        return Err(ConfigError::Validation(
            "cycle_delay_ms must be >= 1ms".to_string(),
        ));
    }
    check_max("cycle_delay_ms", config.cycle_delay_ms, MAX_DELAY_MS)?;
    check_max("launch_interval_ms", config.launch_interval_ms, MAX_DELAY_MS)?;
    check_max("max_backoff_ms", config.max_backoff_ms, MAX_DELAY_MS)?;
    check_max("restart_backoff_ms", config.restart_backoff_ms, MAX_DELAY_MS)?;

    if config.freshness_hours < 1 {
        return Err(ConfigError::Validation(format!(
            "freshness_hours must be >= 1, got {}",
            config.freshness_hours
        )));
    }
    check_max("freshness_hours", config.freshness_hours, MAX_FRESHNESS_HOURS)?;

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }
    check_max("request_timeout_secs", config.request_timeout_secs, MAX_INTERVAL_SECS)?;
    check_max("cooldown_secs", config.cooldown_secs, MAX_INTERVAL_SECS)?;

    if config.max_backoff_ms < config.cycle_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max_backoff_ms ({}) must not be below cycle_delay_ms ({})",
            config.max_backoff_ms, config.cycle_delay_ms
        )));
    }

    if config.sweep_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "sweep_interval_secs must be >= 1".to_string(),
        ));
    }
    check_max("sweep_interval_secs", config.sweep_interval_secs, MAX_INTERVAL_SECS)?;

    Ok(())
}

fn check_max(name: &str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::Validation(format!(
            "{} must be <= {}, got {}",
            name, max, value
        )));
    }
    Ok(())
}

/// Validates the catalog endpoint and category list
fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    let origin = Url::parse(&config.origin)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid origin '{}': {}", config.origin, e)))?;

    if origin.scheme() != "https" && origin.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "origin '{}' must use http or https",
            config.origin
        )));
    }

    if !config.graphql_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "graphql_path must start with '/', got '{}'",
            config.graphql_path
        )));
    }

    if config.store_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "store_id cannot be empty".to_string(),
        ));
    }

    validate_categories(&config.categories)
}

/// Validates a category list: non-empty, no blanks, no duplicates
pub(crate) fn validate_categories(categories: &[String]) -> Result<(), ConfigError> {
    if categories.is_empty() {
        return Err(ConfigError::Validation(
            "at least one category must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for category in categories {
        if category.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category identifiers cannot be empty".to_string(),
            ));
        }
        if !seen.insert(category.as_str()) {
            return Err(ConfigError::Validation(format!(
                "category '{}' is listed more than once",
                category
            )));
        }
    }

    Ok(())
}

fn validate_transport_config(config: &TransportConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    match config.kind {
        OutputKind::Jsonl | OutputKind::Sqlite => {
            let missing = config.path.as_deref().map_or(true, |p| p.trim().is_empty());
            if missing {
                return Err(ConfigError::Validation(format!(
                    "output path is required for the {:?} sink",
                    config.kind
                )));
            }
        }
        OutputKind::Log => {}
    }

    Ok(())
}
