//! Mapper configuration.
//!
//! The combined file has a `[store]` table with the connection settings
//! and a `[mapper]` table:
//!
//! ```toml
//! [store]
//! database = "docmap_test"
//!
//! [mapper]
//! strict_mode = true
//! ```

use std::env;
use std::path::Path;

use docmap_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::MapperError;

/// Settings of a mapper session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Reject entity types without a registered map (default: false)
    pub strict_mode: bool,
}

/// Store and mapper settings read from one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocmapConfig {
    pub store: StoreConfig,
    pub mapper: MapperConfig,
}

impl DocmapConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MapperError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MapperError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, MapperError> {
        toml::from_str(toml_str).map_err(|e| MapperError::Config(format!("Invalid TOML: {}", e)))
    }

    /// Applies `DOCMAP_*` environment overrides to both sections.
    ///
    /// `DOCMAP_STRICT_MODE` overrides `mapper.strict_mode`.
    pub fn apply_env_overrides(&mut self) -> Result<(), MapperError> {
        self.store.apply_env_overrides()?;
        if let Ok(val) = env::var("DOCMAP_STRICT_MODE") {
            self.mapper.strict_mode = val
                .parse()
                .map_err(|_| MapperError::Config(format!("Invalid strict_mode: {}", val)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), MapperError> {
        self.store.validate().map_err(MapperError::from)
    }
}
