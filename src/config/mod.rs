// Application configuration
use serde::{Serialize, Deserialize};

use crate::batch::BatchConfig;
use crate::cache::CacheConfig;
use crate::client::ApiConfig;
use crate::logging::LoggingConfig;
use crate::retry::RetryConfig;
use crate::storage::StorageConfig;

pub mod manager;

pub use manager::ConfigManager;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.api.base_url.is_empty() {
            errors.push("API base URL cannot be empty".to_string());
        }

        if self.api.requests_per_second == 0 {
            errors.push("Requests per second must be greater than 0".to_string());
        }

        if self.retry.multiplier < 1.0 {
            errors.push("Retry multiplier must be at least 1.0".to_string());
        }

        if self.retry.initial_delay.is_zero() {
            errors.push("Retry initial delay must be greater than 0".to_string());
        }

        if self.retry.max_delay < self.retry.initial_delay {
            errors.push("Retry max delay must not be below the initial delay".to_string());
        }

        if self.cache.max_size_bytes == 0 {
            errors.push("Cache size budget must be greater than 0".to_string());
        }

        if self.batch.destination.is_empty() {
            errors.push("Batch destination key cannot be empty".to_string());
        }

        if !["error", "warn", "info", "debug", "trace"].contains(&self.logging.level.as_str()) {
            errors.push("Invalid logging level".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
