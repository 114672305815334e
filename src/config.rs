//! Configuration management for the station panel
//!
//! Loads panel configuration from environment variables with validation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default admission-token rotation interval in seconds
const DEFAULT_ROTATION_INTERVAL_SECS: u64 = 30;

/// Default hard bound on total queue entries
const DEFAULT_QUEUE_CAPACITY: usize = 200;

/// Default retention for activity log lines (newest-first)
const DEFAULT_LOG_RETENTION: usize = 20;

/// Default retention for history records (newest-first)
const DEFAULT_HISTORY_RETENTION: usize = 100;

/// Default notification display duration in seconds
const DEFAULT_NOTIFICATION_TTL_SECS: u64 = 5;

/// Panel configuration for one station
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Admission-token rotation interval in seconds
    pub rotation_interval_secs: u64,

    /// Hard upper bound on total queue entries (active + terminal)
    pub queue_capacity: usize,

    /// Most-recent-N retention for the activity log
    pub log_retention: usize,

    /// Most-recent-N retention for history records
    pub history_retention: usize,

    /// Auto-expiry for the single-slot notification, in seconds
    pub notification_ttl_secs: u64,

    /// Periodic reconciliation interval in seconds
    pub sync_interval_secs: u64,

    /// Bounded timeout for any single backend request, in seconds
    pub backend_timeout_secs: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            rotation_interval_secs: DEFAULT_ROTATION_INTERVAL_SECS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            log_retention: DEFAULT_LOG_RETENTION,
            history_retention: DEFAULT_HISTORY_RETENTION,
            notification_ttl_secs: DEFAULT_NOTIFICATION_TTL_SECS,
            sync_interval_secs: 60,
            backend_timeout_secs: 10,
        }
    }
}

impl PanelConfig {
    /// Load panel configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let config = Self {
            rotation_interval_secs: env_parse(
                "TPS_ROTATION_INTERVAL_SECS",
                DEFAULT_ROTATION_INTERVAL_SECS,
            )?,
            queue_capacity: env_parse("TPS_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
            log_retention: env_parse("TPS_LOG_RETENTION", DEFAULT_LOG_RETENTION)?,
            history_retention: env_parse("TPS_HISTORY_RETENTION", DEFAULT_HISTORY_RETENTION)?,
            notification_ttl_secs: env_parse(
                "TPS_NOTIFICATION_TTL_SECS",
                DEFAULT_NOTIFICATION_TTL_SECS,
            )?,
            sync_interval_secs: env_parse("TPS_SYNC_INTERVAL_SECS", 60)?,
            backend_timeout_secs: env_parse("TPS_BACKEND_TIMEOUT_SECS", 10)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration for testing with tightened values
    pub fn for_testing() -> Self {
        Self {
            rotation_interval_secs: 30,
            queue_capacity: 5,
            log_retention: 10,
            history_retention: 20,
            notification_ttl_secs: 2,
            sync_interval_secs: 1,
            backend_timeout_secs: 2,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.rotation_interval_secs == 0 {
            return Err(Error::internal("Rotation interval must be positive"));
        }

        if self.queue_capacity == 0 {
            return Err(Error::internal("Queue capacity must be positive"));
        }

        if self.backend_timeout_secs == 0 {
            return Err(Error::internal("Backend timeout must be positive"));
        }

        if self.notification_ttl_secs == 0 {
            return Err(Error::internal("Notification TTL must be positive"));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::internal(format!("Invalid {name}"))),
        Err(_) => Ok(default),
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub panel: PanelConfig,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self> {
        let panel = PanelConfig::from_env()?;

        let logging = LoggingConfig {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
        };

        Ok(Self { panel, logging })
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        Self {
            panel: PanelConfig::for_testing(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PanelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rotation_interval_secs, 30);
        assert_eq!(config.queue_capacity, 200);
    }

    #[test]
    fn test_testing_config_is_valid() {
        let config = PanelConfig::for_testing();
        assert!(config.validate().is_ok());
        assert!(config.queue_capacity < PanelConfig::default().queue_capacity);
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let config = PanelConfig {
            rotation_interval_secs: 0,
            ..PanelConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PanelConfig {
            queue_capacity: 0,
            ..PanelConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
