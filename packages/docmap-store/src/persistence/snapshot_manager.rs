//! Snapshot manager for collection data files.
//!
//! Layout under `<data_dir>/<database>/`:
//! - `<collection>.json` - JSON array of the collection's documents
//! - `manifest.json` - format version and crc32 checksum per collection

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::collection::CollectionData;
use crate::config::StoreConfig;
use crate::document::Document;
use crate::error::StoreError;

use super::io_utils::{classify_io_error, RetryPolicy};

const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_VERSION: u32 = 1;

/// Snapshot manifest listing every persisted collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version
    pub version: u32,
    /// Collection name to crc32 of its data file
    pub checksums: BTreeMap<String, u32>,
}

/// Writes and reads collection snapshots for one database.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    /// Directory holding this database's files
    root: PathBuf,
    /// Retries for transient write failures
    retry: RetryPolicy,
}

impl SnapshotManager {
    /// Creates a manager rooted at `<data_dir>/<database>`, if the
    /// configuration enables on-disk snapshots.
    pub fn from_config(config: &StoreConfig) -> Option<Self> {
        config.data_dir.as_ref().map(|data_dir| Self {
            root: data_dir.join(&config.database),
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Returns the directory holding this database's files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes every given collection, then the manifest.
    ///
    /// Each file is written to a temporary path and renamed into place so
    /// a crash never leaves a half-written snapshot behind.
    pub fn flush(&self, collections: &[(String, Arc<CollectionData>)]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| classify_io_error(e, "Failed to create data directory"))?;

        let mut manifest = Manifest {
            version: MANIFEST_VERSION,
            checksums: BTreeMap::new(),
        };

        for (name, data) in collections {
            let documents: Vec<&Document> = data.documents().collect();
            let bytes = serde_json::to_vec_pretty(&documents)
                .map_err(|e| StoreError::SerializationError(e.to_string()))?;
            let file_name = format!("{}.json", name);
            self.retry
                .run(&file_name, || self.write_atomic(&file_name, &bytes))?;
            manifest.checksums.insert(name.clone(), checksum(&bytes));
        }

        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        self.retry
            .run(MANIFEST_FILE, || self.write_atomic(MANIFEST_FILE, &manifest_bytes))?;

        tracing::debug!(
            "Flushed {} collections to {}",
            collections.len(),
            self.root.display()
        );
        Ok(())
    }

    /// Loads every collection listed in the manifest.
    ///
    /// # Returns
    /// Collection name and documents, sorted by name. A missing manifest
    /// means an empty database.
    pub fn load(&self) -> Result<Vec<(String, Vec<Document>)>, StoreError> {
        let manifest = match self.read_manifest()? {
            Some(manifest) => manifest,
            None => return Ok(Vec::new()),
        };

        let mut collections = Vec::with_capacity(manifest.checksums.len());
        for (name, expected) in &manifest.checksums {
            let path = self.root.join(format!("{}.json", name));
            let bytes = fs::read(&path)
                .map_err(|e| classify_io_error(e, "Failed to read collection file"))?;

            let actual = checksum(&bytes);
            if actual != *expected {
                return Err(StoreError::DataCorruption(format!(
                    "Checksum mismatch for collection '{}': expected {:08x}, got {:08x}",
                    name, expected, actual
                )));
            }

            let documents: Vec<Document> = serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::SerializationError(format!("Failed to parse '{}': {}", name, e))
            })?;
            collections.push((name.clone(), documents));
        }

        tracing::debug!(
            "Loaded {} collections from {}",
            collections.len(),
            self.root.display()
        );
        Ok(collections)
    }

    /// Reads the manifest, if one exists.
    pub fn read_manifest(&self) -> Result<Option<Manifest>, StoreError> {
        let path = self.root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| classify_io_error(e, "Failed to read manifest"))?;
        let manifest: Manifest = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::SerializationError(format!("Failed to parse manifest: {}", e)))?;
        if manifest.version != MANIFEST_VERSION {
            return Err(StoreError::SerializationError(format!(
                "Unsupported manifest version: {}",
                manifest.version
            )));
        }
        Ok(Some(manifest))
    }

    /// Removes every file of this database.
    pub fn remove_all(&self) -> Result<(), StoreError> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .map_err(|e| classify_io_error(e, "Failed to remove data directory"))?;
        }
        Ok(())
    }

    fn write_atomic(&self, file_name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let temp_path = self.root.join(format!("{}.tmp", file_name));
        let final_path = self.root.join(file_name);

        let mut file = File::create(&temp_path)
            .map_err(|e| classify_io_error(e, "Failed to create temp file"))?;
        file.write_all(bytes)
            .map_err(|e| classify_io_error(e, "Failed to write snapshot"))?;
        file.sync_all()
            .map_err(|e| classify_io_error(e, "Failed to sync snapshot"))?;

        fs::rename(&temp_path, &final_path)
            .map_err(|e| classify_io_error(e, "Failed to rename snapshot file"))?;
        Ok(())
    }
}

fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}
