//! Configuration management
//!
//! This module handles loading and managing configuration from:
//! - Command-line arguments
//! - Environment variables (`RUST_LOG` for the log filter)
//! - Configuration files (TOML)
//! - Defaults

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub chart: ChartConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path
    pub file: Option<PathBuf>,
}

/// Chart settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChartConfig {
    /// Chart declaration used when a command is given no file
    pub path: Option<PathBuf>,
}

/// Proxy driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Service name reported in logs and transition events
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Actions buffered before senders wait
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "statechart".to_string()
}

fn default_queue_capacity() -> usize {
    64
}

// Default implementations

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

        Self::from_toml(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./statechart.toml
    /// 2. ~/.statechart/config.toml
    /// 3. /etc/statechart/config.toml
    pub fn load() -> Result<Self> {
        let mut paths = vec![PathBuf::from("statechart.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".statechart").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/statechart/config.toml"));

        for path in paths {
            if path.exists() {
                tracing::info!("Loading config from {:?}", path);
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Chart file from the command line, falling back to `[chart] path`
    pub fn chart_path(&self, explicit: Option<PathBuf>) -> Result<PathBuf> {
        explicit.or_else(|| self.chart.path.clone()).ok_or_else(|| {
            Error::Config(
                "No chart file given. Pass one on the command line or set [chart] path".to_string(),
            )
        })
    }
}
