//! Database container managing named collections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::collection::{Collection, CollectionData};
use crate::config::StoreConfig;
use crate::document::{Document, DocumentId};
use crate::error::StoreError;
use crate::filter::Filter;
use crate::persistence::SnapshotManager;
use crate::store::DocumentStore;

/// Operation counters of a database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Documents inserted
    pub inserts: u64,
    /// Documents updated
    pub updates: u64,
    /// Read queries (`find_by_id` and `find`)
    pub reads: u64,
}

impl StoreStats {
    /// Total write operations.
    pub fn writes(&self) -> u64 {
        self.inserts + self.updates
    }
}

#[derive(Debug, Default)]
struct Counters {
    inserts: AtomicU64,
    updates: AtomicU64,
    reads: AtomicU64,
}

/// In-process document database holding named collections.
#[derive(Debug)]
pub struct Database {
    /// Connection settings
    config: StoreConfig,
    /// Map of collection name to collection
    collections: RwLock<HashMap<String, Arc<Collection>>>,
    /// Cleared by `disconnect`; every operation fails while unset
    connected: AtomicBool,
    /// Operation counters
    counters: Counters,
    /// On-disk snapshots, when a data directory is configured
    snapshots: Option<SnapshotManager>,
}

impl Database {
    /// Creates an empty database without reading any snapshot.
    pub fn new(config: StoreConfig) -> Self {
        let snapshots = SnapshotManager::from_config(&config);
        Self {
            config,
            collections: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(true),
            counters: Counters::default(),
            snapshots,
        }
    }

    /// Opens a database, loading snapshots from the data directory if one
    /// is configured.
    ///
    /// # Returns
    /// `Result<Database, StoreError>` with the loaded database, or an
    /// error if the configuration is invalid or a snapshot is corrupt.
    pub fn connect(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let db = Self::new(config);

        if let Some(snapshots) = &db.snapshots {
            let loaded = snapshots.load()?;
            let mut collections = db.collections.write();
            for (name, documents) in loaded {
                let data = CollectionData::from_documents(&name, documents)?;
                collections.insert(name.clone(), Arc::new(Collection::with_data(name, data)));
            }
        }

        tracing::debug!(
            "Connected to {} ({} collections)",
            db.config.connection_url(),
            db.collections.read().len()
        );
        Ok(db)
    }

    /// Returns the connection settings.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns `true` until `disconnect` is called.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Closes the connection. Subsequent operations fail with
    /// [`StoreError::Unavailable`] until `reconnect` is called.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        tracing::debug!("Disconnected from {}", self.config.database);
    }

    /// Reopens a closed connection.
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::Release);
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            reads: self.counters.reads.load(Ordering::Relaxed),
        }
    }

    /// Resets the operation counters to zero.
    pub fn reset_stats(&self) {
        self.counters.inserts.store(0, Ordering::Relaxed);
        self.counters.updates.store(0, Ordering::Relaxed);
        self.counters.reads.store(0, Ordering::Relaxed);
    }

    /// Returns the number of documents in a collection (0 if it does not exist).
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.load().len())
            .unwrap_or(0)
    }

    /// Writes every collection to the data directory.
    ///
    /// Does nothing for a purely in-memory database.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.ensure_connected()?;
        let Some(snapshots) = &self.snapshots else {
            return Ok(());
        };
        let mut data: Vec<(String, Arc<CollectionData>)> = self
            .collections
            .read()
            .iter()
            .map(|(name, collection)| (name.clone(), collection.load()))
            .collect();
        data.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots.flush(&data)
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "connection to {} is closed",
                self.config.connection_url()
            )))
        }
    }

    fn existing(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    fn get_or_create(&self, name: &str) -> Result<Arc<Collection>, StoreError> {
        validate_collection_name(name)?;
        if let Some(collection) = self.existing(name) {
            return Ok(collection);
        }
        let mut collections = self.collections.write();
        Ok(collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Collection::new(name)))
            .clone())
    }

    fn log_query(&self, operation: &str, collection: &str, detail: &dyn std::fmt::Debug) {
        if self.config.log_queries {
            tracing::info!(
                "{}.{}.{} {:?}",
                self.config.database,
                collection,
                operation,
                detail
            );
        }
    }
}

impl DocumentStore for Database {
    fn insert(&self, collection: &str, document: Document) -> Result<DocumentId, StoreError> {
        self.ensure_connected()?;
        self.log_query("insert", collection, &document);
        let id = self.get_or_create(collection)?.insert(document)?;
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Inserted {} into {}", id, collection);
        Ok(id)
    }

    fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        set: Document,
        unset: &[String],
    ) -> Result<(), StoreError> {
        self.ensure_connected()?;
        self.log_query("update", collection, &(&set, unset));
        let target = self
            .existing(collection)
            .ok_or_else(|| StoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        target.update(id, set, unset)?;
        self.counters.updates.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Updated {} in {}", id, collection);
        Ok(())
    }

    fn find_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        self.ensure_connected()?;
        self.log_query("find_by_id", collection, id);
        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .existing(collection)
            .and_then(|c| c.load().get(id).cloned()))
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        self.ensure_connected()?;
        self.log_query("find", collection, filter);
        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        Ok(match self.existing(collection) {
            Some(c) => filter.apply(c.load().documents()),
            None => Vec::new(),
        })
    }

    fn drop_database(&self) -> Result<(), StoreError> {
        self.ensure_connected()?;
        self.collections.write().clear();
        if let Some(snapshots) = &self.snapshots {
            snapshots.remove_all()?;
        }
        tracing::debug!("Dropped database {}", self.config.database);
        Ok(())
    }

    fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        self.ensure_connected()?;
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name == "manifest"
        || name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '\0' | '$') || c.is_whitespace());
    if invalid {
        Err(StoreError::InvalidCollectionName(name.to_string()))
    } else {
        Ok(())
    }
}
