//! Explicit configuration values for the storage core.
//!
//! # Responsibility
//! - Describe connection pool and logging settings as plain data.
//! - Provide defaults so partial documents deserialize cleanly.
//!
//! # Invariants
//! - Configuration is constructed once by the host process and passed by
//!   reference; the core keeps no global copy.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Top-level configuration consumed by the core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StoreConfig {
    /// Checks cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.logging.validate()
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:` for a private in-memory database served
    /// by a single connection. Missing parent directories are created.
    #[serde(default = "DatabaseConfig::default_connection_string")]
    pub connection_string: String,
    #[serde(default = "DatabaseConfig::default_max_idle_connections")]
    pub max_idle_connections: u32,
    #[serde(default = "DatabaseConfig::default_max_open_connections")]
    pub max_open_connections: u32,
    /// How long a statement waits on a locked database before failing.
    #[serde(default = "DatabaseConfig::default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// How long a caller waits for a pooled connection before failing.
    #[serde(default = "DatabaseConfig::default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

impl DatabaseConfig {
    fn default_connection_string() -> String {
        "./database/database.db".to_string()
    }

    fn default_max_idle_connections() -> u32 {
        3
    }

    fn default_max_open_connections() -> u32 {
        100
    }

    fn default_busy_timeout_ms() -> u64 {
        5_000
    }

    fn default_connection_timeout_ms() -> u64 {
        30_000
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.connection_string.trim().is_empty() {
            return Err(ConfigError::EmptyConnectionString);
        }
        if self.max_open_connections == 0 {
            return Err(ConfigError::ZeroMaxOpenConnections);
        }
        if self.max_idle_connections > self.max_open_connections {
            return Err(ConfigError::IdleExceedsOpen {
                max_idle: self.max_idle_connections,
                max_open: self.max_open_connections,
            });
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection_string: Self::default_connection_string(),
            max_idle_connections: Self::default_max_idle_connections(),
            max_open_connections: Self::default_max_open_connections(),
            busy_timeout_ms: Self::default_busy_timeout_ms(),
            connection_timeout_ms: Self::default_connection_timeout_ms(),
        }
    }
}

/// Rolling file log settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// Absolute directory for rolling log files.
    #[serde(default = "LoggingConfig::default_log_dir")]
    pub log_dir: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        crate::logging::default_log_level().to_string()
    }

    fn default_log_dir() -> String {
        std::env::temp_dir()
            .join("bookshelf-logs")
            .to_string_lossy()
            .into_owned()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.log_dir.trim().is_empty() {
            return Err(ConfigError::EmptyLogDir);
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            log_dir: Self::default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyConnectionString,
    ZeroMaxOpenConnections,
    IdleExceedsOpen { max_idle: u32, max_open: u32 },
    EmptyLogDir,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyConnectionString => write!(f, "database.connection_string cannot be empty"),
            Self::ZeroMaxOpenConnections => {
                write!(f, "database.max_open_connections must be at least 1")
            }
            Self::IdleExceedsOpen { max_idle, max_open } => write!(
                f,
                "database.max_idle_connections ({max_idle}) exceeds max_open_connections ({max_open})"
            ),
            Self::EmptyLogDir => write!(f, "logging.log_dir cannot be empty"),
        }
    }
}

impl Error for ConfigError {}
