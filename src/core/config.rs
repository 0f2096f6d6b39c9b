//! Configuration management for the telemetry repository.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - CLI argument overrides
//! - Validation and defaults

use crate::core::{RepositoryError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete configuration for the repository and its tooling
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage limits
    pub storage: StorageConfig,
    /// Query limits
    pub query: QueryConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Storage limits applied by the typed stores and ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Maximum number of traces kept across all resources
    pub max_traces: usize,
    /// Maximum number of log entries kept per resource
    pub max_logs_per_resource: usize,
    /// Maximum number of points kept per metric dimension series
    pub max_metric_points: usize,
    /// Maximum attributes kept per span, log, event or link
    pub max_attribute_count: usize,
    /// Maximum characters kept per string attribute value
    pub max_attribute_length: Option<usize>,
    /// Maximum events kept per span
    pub max_span_events: usize,
    /// Buffered change notifications per subscriber
    pub event_channel_capacity: usize,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Largest page a single query may request
    pub max_page_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Log file path
    pub file: Option<PathBuf>,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            max_traces: 10_000,
            max_logs_per_resource: 10_000,
            max_metric_points: 1_000,
            max_attribute_count: 128,
            max_attribute_length: None,
            max_span_events: 1_000,
            event_channel_capacity: 1024,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            max_page_size: 10_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            file: None,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let storage = &self.storage;

        if storage.max_traces == 0 {
            return Err(RepositoryError::config("max_traces must be greater than 0"));
        }

        if storage.max_logs_per_resource == 0 {
            return Err(RepositoryError::config(
                "max_logs_per_resource must be greater than 0",
            ));
        }

        if storage.max_metric_points == 0 {
            return Err(RepositoryError::config("max_metric_points must be greater than 0"));
        }

        if storage.max_attribute_count == 0 {
            return Err(RepositoryError::config("max_attribute_count must be greater than 0"));
        }

        if storage.max_attribute_length == Some(0) {
            return Err(RepositoryError::config(
                "max_attribute_length must be greater than 0 when set",
            ));
        }

        if storage.event_channel_capacity == 0 {
            return Err(RepositoryError::config(
                "event_channel_capacity must be greater than 0",
            ));
        }

        if self.query.max_page_size == 0 {
            return Err(RepositoryError::config("max_page_size must be greater than 0"));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| RepositoryError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set the global trace limit
    pub fn max_traces(mut self, count: usize) -> Self {
        self.config.storage.max_traces = count;
        self
    }

    /// Set the per-resource log limit
    pub fn max_logs_per_resource(mut self, count: usize) -> Self {
        self.config.storage.max_logs_per_resource = count;
        self
    }

    /// Set the per-series metric point limit
    pub fn max_metric_points(mut self, count: usize) -> Self {
        self.config.storage.max_metric_points = count;
        self
    }

    /// Set the attribute count limit
    pub fn max_attribute_count(mut self, count: usize) -> Self {
        self.config.storage.max_attribute_count = count;
        self
    }

    /// Set the attribute value length limit
    pub fn max_attribute_length(mut self, length: usize) -> Self {
        self.config.storage.max_attribute_length = Some(length);
        self
    }

    /// Set the span event limit
    pub fn max_span_events(mut self, count: usize) -> Self {
        self.config.storage.max_span_events = count;
        self
    }

    /// Set the largest page a query may request
    pub fn max_page_size(mut self, size: usize) -> Self {
        self.config.query.max_page_size = size;
        self
    }

    /// Set the log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
