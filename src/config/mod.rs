/// Server settings and database configuration
///
/// Settings are resolved once at startup (defaults, then an optional JSON
/// file, then `APP_USAGE_*` environment variables, then command-line flags)
/// and handed to the service explicitly. Nothing here is global.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::validation::is_truthy;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "APP_USAGE_";

const VALID_LOG_LEVELS: &[&str] = &["TRACE", "DEBUG", "INFO", "WARN", "WARNING", "ERROR"];

/// Errors that can occur while resolving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of TRACE, DEBUG, INFO, WARNING, ERROR")]
    InvalidLogLevel(String),

    #[error("Invalid setting {name}: {message}")]
    InvalidSetting { name: String, message: String },

    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Database file not found: {0}")]
    DatabaseNotFound(PathBuf),
}

/// Where and how to open the usage database
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    path: PathBuf,
    busy_timeout: Duration,
}

impl DatabaseConfig {
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

    /// Point at an existing database file
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.exists() {
            return Err(ConfigError::DatabaseNotFound(path));
        }

        Ok(Self {
            path,
            busy_timeout: Self::DEFAULT_BUSY_TIMEOUT,
        })
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How long SQLite waits on a locked database before failing
    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }
}

/// Server-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub log_level: String,
    /// Maximum number of rows materialised per query
    pub max_query_results: usize,
    /// Request-level timeout for one tool call
    pub query_timeout_secs: u64,
    /// Gates the heavier analysis tools
    pub enable_advanced_analytics: bool,
    pub database_path: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            max_query_results: 1000,
            query_timeout_secs: 30,
            enable_advanced_analytics: true,
            database_path: None,
        }
    }
}

impl ServerSettings {
    /// Defaults, optionally overlaid by a JSON file, then by the environment
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let settings = settings.with_env_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `APP_USAGE_*` overrides read through `lookup`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(value) = var("MAX_QUERY_RESULTS") {
            self.max_query_results = parse_number("max_query_results", &value)?;
        }
        if let Some(value) = var("QUERY_TIMEOUT") {
            self.query_timeout_secs = parse_number("query_timeout_secs", &value)?;
        }
        if let Some(value) = var("ENABLE_ADVANCED_ANALYTICS") {
            self.enable_advanced_analytics = is_truthy(&value);
        }
        if let Some(value) = var("DATABASE") {
            self.database_path = Some(PathBuf::from(value));
        }

        Ok(self)
    }

    /// Check every setting is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_ascii_uppercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log_level.clone()));
        }

        if self.max_query_results == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "max_query_results".to_string(),
                message: "must be positive".to_string(),
            });
        }

        if self.query_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "query_timeout_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }

        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// `tracing` filter directive for the configured level
    pub fn tracing_level(&self) -> &'static str {
        match self.log_level.to_ascii_uppercase().as_str() {
            "TRACE" => "trace",
            "DEBUG" => "debug",
            "WARN" | "WARNING" => "warn",
            "ERROR" => "error",
            _ => "info",
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidSetting {
        name: name.to_string(),
        message: format!("'{}' is not a valid number", value),
    })
}
