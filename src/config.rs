//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `SEAS_*` environment variable overrides.

use crate::integrations::{DashboardConfig, GeocodingConfig};
use crate::query::{AggregationFn, Granularity, QueryError, ValuesRequest, DEFAULT_RANGE};
use crate::store::{MetadataStore, TimeSeriesStore};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub geocoding: GeocodingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store locations
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_timeseries_path")]
    pub timeseries_path: String,

    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,

    /// How long a connection waits on a locked database (ms)
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("seas-analytics"))
        .unwrap_or_else(|| PathBuf::from("./seas_data"))
}

fn default_timeseries_path() -> String {
    data_dir().join("timeseries.db").to_string_lossy().to_string()
}

fn default_metadata_path() -> String {
    data_dir().join("metadata.db").to_string_lossy().to_string()
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeseries_path: default_timeseries_path(),
            metadata_path: default_metadata_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl StoreConfig {
    pub fn timeseries(&self) -> TimeSeriesStore {
        TimeSeriesStore::new(
            &self.timeseries_path,
            Duration::from_millis(self.busy_timeout_ms),
        )
    }

    pub fn metadata(&self) -> MetadataStore {
        MetadataStore::new(
            &self.metadata_path,
            Duration::from_millis(self.busy_timeout_ms),
        )
    }
}

/// Query defaults
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_range")]
    pub default_range: String,

    #[serde(default = "default_granularity")]
    pub default_granularity: String,

    #[serde(default = "default_aggregation")]
    pub default_aggregation: String,
}

fn default_range() -> String {
    DEFAULT_RANGE.to_string()
}

fn default_granularity() -> String {
    Granularity::default().as_str().to_string()
}

fn default_aggregation() -> String {
    AggregationFn::default().to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_range: default_range(),
            default_granularity: default_granularity(),
            default_aggregation: default_aggregation(),
        }
    }
}

impl QueryConfig {
    /// Values request built from these defaults, overridden where given
    pub fn request(
        &self,
        range: Option<&str>,
        granularity: Option<&str>,
        aggregation: Option<&str>,
    ) -> Result<ValuesRequest, QueryError> {
        let aggregation = AggregationFn::parse(aggregation.unwrap_or(&self.default_aggregation))?;
        Ok(ValuesRequest::new()
            .range(range.unwrap_or(&self.default_range))
            .granularity(Granularity::parse_or_default(
                granularity.unwrap_or(&self.default_granularity),
            ))
            .aggregation(aggregation))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Config file locations, in lookup order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("seas-analytics").join("config.toml")),
            Some(PathBuf::from("/etc/seas-analytics/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Store overrides
        if let Some(path) = lookup("SEAS_TIMESERIES_PATH") {
            self.store.timeseries_path = path;
        }
        if let Some(path) = lookup("SEAS_METADATA_PATH") {
            self.store.metadata_path = path;
        }

        // Dashboard overrides
        if let Some(url) = lookup("SEAS_DASHBOARD_URL") {
            self.dashboard.base_url = url;
        }
        if let Some(user) = lookup("SEAS_DASHBOARD_USER") {
            self.dashboard.username = user;
        }
        if let Some(password) = lookup("SEAS_DASHBOARD_PASSWORD") {
            self.dashboard.password = password;
        }

        // Geocoding overrides
        if let Some(key) = lookup("SEAS_GEOCODING_API_KEY") {
            self.geocoding.api_key = Some(key).filter(|k| !k.is_empty());
        }

        // Logging overrides
        if let Some(level) = lookup("SEAS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SEAS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# SEAS Analytics Configuration
#
# Environment variables override these settings:
# - SEAS_TIMESERIES_PATH
# - SEAS_METADATA_PATH
# - SEAS_DASHBOARD_URL
# - SEAS_DASHBOARD_USER
# - SEAS_DASHBOARD_PASSWORD
# - SEAS_GEOCODING_API_KEY
# - SEAS_LOG_LEVEL
# - SEAS_LOG_FORMAT

[store]
# SQLite database holding the time-series readings
timeseries_path = "~/.local/share/seas-analytics/timeseries.db"

# SQLite database holding point and entity metadata
metadata_path = "~/.local/share/seas-analytics/metadata.db"

# How long a connection waits on a locked database (ms)
busy_timeout_ms = 5000

[query]
# Range used when none is given: 24h, 30m, 7 days, 3 months, today, yesterday,
# or explicit dates "2024-03-01,2024-03-15"
default_range = "24h"

# Bucket size: day, hour, minute, second
default_granularity = "minute"

# Aggregation: avg, sum, min, max, count
default_aggregation = "avg"

[dashboard]
# Enable the dashboard service
enabled = true

# Dashboard service URL
base_url = "http://localhost:3000"

# Basic auth credentials
username = "admin"
password = "admin"

# Directory holding point-dashboard.json and ahu-dashboard.json
templates_dir = "data/dashboard"

# Request timeout in seconds
request_timeout_secs = 10

# Skip TLS certificate verification
accept_invalid_certs = true

[geocoding]
# Google API key; geocoding is disabled when unset
# api_key = ""

# Geocode endpoint
base_url = "https://maps.googleapis.com/maps/api/geocode/json"

# Request timeout in seconds
request_timeout_secs = 10

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
