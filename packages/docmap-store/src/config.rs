//! Store connection configuration.
//!
//! Supports TOML config files, environment variable overrides, and defaults.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Connection and persistence settings for a document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Host of the store (default: "localhost")
    pub host: String,
    /// Port of the store (default: 27017)
    pub port: u16,
    /// Database name (default: "docmap")
    pub database: String,
    /// User name, empty for none
    pub username: String,
    /// Password, empty for none
    pub password: String,
    /// Database holding the credentials (default: "admin")
    pub auth_database: String,
    /// Directory for on-disk snapshots; `None` keeps data in memory only
    pub data_dir: Option<PathBuf>,
    /// Log every store call at info level
    pub log_queries: bool,
    /// Maximum retry attempts for transient I/O errors
    pub persistence_max_retries: u32,
    /// Delay between retry attempts in milliseconds
    pub persistence_retry_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 27017,
            database: "docmap".to_string(),
            username: String::new(),
            password: String::new(),
            auth_database: "admin".to_string(),
            data_dir: None,
            log_queries: false,
            persistence_max_retries: 3,
            persistence_retry_delay_ms: 100,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration for the named database with default settings.
    pub fn for_database(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| StoreError::ConfigError(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, StoreError> {
        toml::from_str(toml_str).map_err(|e| StoreError::ConfigError(format!("Invalid TOML: {}", e)))
    }

    /// Applies environment variable overrides.
    ///
    /// Variables are prefixed with `DOCMAP_`, e.g. `DOCMAP_DATABASE=test`
    /// overrides `database`.
    pub fn apply_env_overrides(&mut self) -> Result<(), StoreError> {
        if let Ok(val) = env::var("DOCMAP_HOST") {
            self.host = val;
        }
        if let Ok(val) = env::var("DOCMAP_PORT") {
            self.port = val
                .parse()
                .map_err(|_| StoreError::ConfigError(format!("Invalid port: {}", val)))?;
        }
        if let Ok(val) = env::var("DOCMAP_DATABASE") {
            self.database = val;
        }
        if let Ok(val) = env::var("DOCMAP_USERNAME") {
            self.username = val;
        }
        if let Ok(val) = env::var("DOCMAP_PASSWORD") {
            self.password = val;
        }
        if let Ok(val) = env::var("DOCMAP_AUTH_DATABASE") {
            self.auth_database = val;
        }
        if let Ok(val) = env::var("DOCMAP_DATA_DIR") {
            self.data_dir = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
        if let Ok(val) = env::var("DOCMAP_LOG_QUERIES") {
            self.log_queries = val
                .parse()
                .map_err(|_| StoreError::ConfigError(format!("Invalid log_queries: {}", val)))?;
        }
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.database.is_empty() {
            return Err(StoreError::ConfigError(
                "database name must not be empty".to_string(),
            ));
        }
        if self
            .database
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '.' | ' ' | '"' | '$'))
        {
            return Err(StoreError::ConfigError(format!(
                "invalid database name '{}'",
                self.database
            )));
        }
        if self.host.is_empty() {
            return Err(StoreError::ConfigError("host must not be empty".to_string()));
        }
        Ok(())
    }

    /// Returns a connection string with the password masked.
    pub fn connection_url(&self) -> String {
        let credentials = if self.username.is_empty() {
            String::new()
        } else {
            format!("{}:***@", self.username)
        };
        format!(
            "mongodb://{}{}:{}/{}?authSource={}",
            credentials, self.host, self.port, self.database, self.auth_database
        )
    }
}
