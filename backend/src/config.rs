//! Configuration management for the task manager.
//!
//! Configuration is read from environment variables so that deployment
//! overlays can set it per environment:
//! - `HOST` - Optional. Listen address. Defaults to `0.0.0.0`.
//! - `PORT` - Optional. Listen port. Defaults to `3000`.
//! - `DATABASE_PATH` - Optional. SQLite database file, or `:memory:`. Defaults to `data/tasks.db`.
//! - `RUST_LOG` - Optional. Log filter directive. Defaults to [`DEFAULT_LOG_FILTER`].

use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_LOG_FILTER: &str = "task_manager=info,tower_http=info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// SQLite database location
    pub database_path: PathBuf,

    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_path: PathBuf::from("data/tasks.db"),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `PORT` is not a valid port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = non_empty("HOST").unwrap_or(defaults.host);

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?,
            None => defaults.port,
        };

        let database_path = non_empty("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let log_filter = non_empty("RUST_LOG").unwrap_or(defaults.log_filter);

        Ok(Self {
            host,
            port,
            database_path,
            log_filter,
        })
    }

    /// `host:port` string for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
