//! Configuration module for Lookout
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`LOOKOUT_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use lookout::config::LookoutConfig;
//!
//! // Load defaults
//! let config = LookoutConfig::default();
//! assert_eq!(config.poll.interval_seconds, 60);
//!
//! // Parse from TOML
//! let toml = r#"
//! [service]
//! user = "alice"
//! "#;
//! let config: LookoutConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.service.user, "alice");
//! ```

pub mod error;
pub mod logging;
pub mod poll;
pub mod service;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use poll::PollConfig;
pub use service::ServiceConfig;

// Re-export StreamConfig from the stream module
pub use crate::stream::StreamConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the Lookout client.
///
/// Aggregates the service connection, roster polling, streaming, and logging
/// sections.
///
/// # Example
///
/// ```rust
/// use lookout::config::LookoutConfig;
///
/// let config = LookoutConfig::default();
/// assert_eq!(config.service.base_url, "https://jobs.example.com");
/// assert_eq!(config.stream.idle_timeout_seconds, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LookoutConfig {
    /// Job service connection settings
    pub service: ServiceConfig,
    /// Roster polling cadence
    pub poll: PollConfig,
    /// Stream timeouts and buffer sizes
    pub stream: StreamConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl LookoutConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports LOOKOUT_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        // Service settings
        if let Ok(base_url) = std::env::var("LOOKOUT_BASE_URL") {
            self.service.base_url = base_url;
        }
        if let Ok(user) = std::env::var("LOOKOUT_USER") {
            self.service.user = user;
        }

        // Logging settings
        if let Ok(level) = std::env::var("LOOKOUT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOOKOUT_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        // Polling
        if let Ok(interval) = std::env::var("LOOKOUT_POLL_INTERVAL") {
            if let Ok(i) = interval.parse() {
                self.poll.interval_seconds = i;
            }
        }
        if let Ok(auto) = std::env::var("LOOKOUT_AUTO_REFRESH") {
            self.poll.auto_refresh = auto.to_lowercase() == "true";
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.base_url.is_empty() {
            return Err(ConfigError::Validation {
                field: "service.base_url".to_string(),
                message: "base URL cannot be empty".to_string(),
            });
        }

        if self.poll.interval_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "poll.interval_seconds".to_string(),
                message: "interval must be non-zero".to_string(),
            });
        }

        if self.stream.idle_timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "stream.idle_timeout_seconds".to_string(),
                message: "idle timeout must be non-zero".to_string(),
            });
        }
        if self.stream.max_idle_timeout_seconds < self.stream.idle_timeout_seconds {
            return Err(ConfigError::Validation {
                field: "stream.max_idle_timeout_seconds".to_string(),
                message: "cap must not be below the initial idle timeout".to_string(),
            });
        }
        if self.stream.log_buffer_lines == 0 {
            return Err(ConfigError::Validation {
                field: "stream.log_buffer_lines".to_string(),
                message: "log buffer must hold at least one line".to_string(),
            });
        }

        Ok(())
    }
}
