// Logging configuration and initialization
use serde::{Serialize, Deserialize};
use tracing_subscriber::EnvFilter;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub enable_colors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    Text,
    Compact,
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            enable_colors: true,
        }
    }
}

/// Global tracing subscriber setup.
pub struct Logger;

impl Logger {
    pub fn init_default() {
        Self::init(&LoggingConfig::default());
    }

    /// Install the subscriber. `RUST_LOG` wins over the configured level.
    /// Re-initialization (common in tests) is ignored.
    pub fn init(config: &LoggingConfig) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.level));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(config.enable_colors);

        let _ = match config.format {
            LogFormat::Text => builder.try_init(),
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
            LogFormat::Json => builder.json().try_init(),
        };
    }
}
