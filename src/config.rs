//! Configuration management
//!
//! This module handles loading and managing configuration from:
//! - Command-line arguments
//! - Configuration files (TOML)
//! - Defaults

use crate::engine::{BuildOptions, ColorPolicy, NodeMarkers};
use crate::error::{Error, Result};
use crate::source::{InputFormat, LoadOptions, RecordShape};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub markers: NodeMarkers,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Graph construction and filtering defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphConfig {
    /// Drop transitions from a state to itself
    #[serde(default)]
    pub ignore_self_loops: bool,

    #[serde(default)]
    pub color_policy: ColorPolicy,

    /// Threshold as a percentage of the busiest transition, applied when the
    /// command line gives none
    pub threshold_percent: Option<f64>,
}

/// Input file defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InputConfig {
    #[serde(default)]
    pub shape: RecordShape,

    #[serde(default)]
    pub format: InputFormat,

    /// Single-character field delimiter for delimited formats
    pub delimiter: Option<char>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&contents).map_err(|e| Error::ConfigParse {
            file: path.clone(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./tutor-path-graph.toml
    /// 2. ~/.tutor-path-graph/config.toml
    /// 3. /etc/tutor-path-graph/config.toml
    pub fn load() -> Result<Self> {
        let mut paths = vec![PathBuf::from("tutor-path-graph.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".tutor-path-graph").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/tutor-path-graph/config.toml"));

        for path in paths {
            if path.exists() {
                tracing::info!("Loading config from {:?}", path);
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Graph build options from the `[graph]` section
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions::default()
            .ignore_self_loops(self.graph.ignore_self_loops)
            .color_policy(self.graph.color_policy)
    }

    /// Load options from the `[input]` section
    pub fn load_options(&self) -> Result<LoadOptions> {
        let options = LoadOptions::new(self.input.shape, self.input.format);
        match self.input.delimiter {
            Some(c) => Ok(options.with_delimiter(delimiter_byte(c)?)),
            None => Ok(options),
        }
    }
}

/// Convert a delimiter character into the single byte the csv reader expects
pub fn delimiter_byte(c: char) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| Error::Config(format!("Delimiter {:?} is not a single ASCII character", c)))
}
