// Configuration management and loading
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::AppConfig;

/// Handles loading and saving the application configuration, with
/// environment variables layered over file values.
pub struct ConfigManager {
    config_path: PathBuf,
    config: Arc<RwLock<AppConfig>>,
    auto_save: bool,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            config: Arc::new(RwLock::new(AppConfig::default())),
            auto_save: false,
        }
    }

    pub fn with_auto_save(config_path: PathBuf) -> Self {
        Self {
            config_path,
            config: Arc::new(RwLock::new(AppConfig::default())),
            auto_save: true,
        }
    }

    /// Load configuration from file. A missing file is not an error: the
    /// defaults are written out instead.
    pub async fn load(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.config_path.exists() {
            info!("Loading configuration from: {:?}", self.config_path);

            let content = fs::read_to_string(&self.config_path)?;
            let loaded: AppConfig = if self.is_json() {
                serde_json::from_str(&content)?
            } else {
                serde_yaml::from_str(&content)?
            };

            let mut config = self.config.write().await;
            *config = loaded;

            debug!("Configuration loaded successfully");
        } else {
            info!(
                "Configuration file not found, using defaults: {:?}",
                self.config_path
            );
            self.save().await?;
        }

        Ok(())
    }

    /// Save the current configuration to file.
    pub async fn save(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config = self.config.read().await;
        let content = if self.is_json() {
            serde_json::to_string_pretty(&*config)?
        } else {
            serde_yaml::to_string(&*config)?
        };

        fs::write(&self.config_path, content)?;
        debug!("Configuration saved to {:?}", self.config_path);

        Ok(())
    }

    /// Layer `LASTFM_*` environment variables over the loaded values.
    pub async fn load_from_env(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut config = self.config.write().await;

        if let Ok(api_key) = std::env::var("LASTFM_API_KEY") {
            config.api.api_key = api_key;
        }

        if let Ok(base_url) = std::env::var("LASTFM_BASE_URL") {
            config.api.base_url = base_url;
        }

        if let Ok(rps) = std::env::var("LASTFM_REQUESTS_PER_SECOND") {
            if let Ok(rps) = rps.parse::<u32>() {
                config.api.requests_per_second = rps;
            }
        }

        if let Ok(timeout) = std::env::var("LASTFM_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse::<u64>() {
                config.api.request_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(data_dir) = std::env::var("LASTFM_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(destination) = std::env::var("LASTFM_DESTINATION") {
            config.batch.destination = destination;
        }

        if let Ok(level) = std::env::var("LASTFM_LOG_LEVEL") {
            config.logging.level = level;
        }

        info!("Configuration loaded from environment variables");

        if self.auto_save {
            drop(config); // Release the lock before saving
            self.save().await?;
        }

        Ok(())
    }

    pub async fn get_config(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    pub async fn update_config(
        &self,
        new_config: AppConfig,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }

    pub async fn validate(&self) -> Result<(), Vec<String>> {
        self.config.read().await.validate()
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    fn is_json(&self) -> bool {
        self.config_path.extension().and_then(|ext| ext.to_str()) == Some("json")
    }
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            config_path: self.config_path.clone(),
            config: self.config.clone(),
            auto_save: self.auto_save,
        }
    }
}
