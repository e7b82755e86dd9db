//! Runtime settings, optionally loaded from a TOML file.
//!
//! ```toml
//! [logging]
//! filter = "saga_reducer=debug"
//!
//! [runner]
//! unhandled_errors = "escalate"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors that can occur when loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Root settings container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub runner: RunnerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerSettings {
    #[serde(default)]
    pub unhandled_errors: UnhandledErrorPolicy,
}

/// Fate of a process failure when no error handler was supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnhandledErrorPolicy {
    /// Log at error level; only the failing process tree stops.
    #[default]
    Log,
    /// Panic the failing task.
    Escalate,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Settings {
    /// `<config_dir>/saga-reducer/config.toml`, or the current directory
    /// if no config dir is known.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("saga-reducer").join("config.toml")
    }

    /// Load from the default path; defaults if the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Settings::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Checks that the log filter is a valid `EnvFilter` directive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        EnvFilter::try_new(&self.logging.filter).map_err(|e| ConfigError::ValidationError {
            message: format!("invalid log filter '{}': {}", self.logging.filter, e),
        })?;
        Ok(())
    }
}
