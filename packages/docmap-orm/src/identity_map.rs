//! Per-session cache of loaded documents keyed by type and identity.

use std::collections::HashMap;

use docmap_store::{Document, DocumentId};

/// Cache of the last known stored document for each (type, identity).
///
/// Lookups by identity consult this map before the store. Each hit
/// hydrates a fresh entity, so callers never share mutable state.
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: HashMap<(String, DocumentId), Document>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_type: &str, id: &DocumentId) -> Option<&Document> {
        self.entries.get(&(entity_type.to_string(), id.clone()))
    }

    pub fn contains(&self, entity_type: &str, id: &DocumentId) -> bool {
        self.get(entity_type, id).is_some()
    }

    /// Caches a document, replacing any earlier version.
    pub fn insert(&mut self, entity_type: &str, id: DocumentId, document: Document) {
        self.entries.insert((entity_type.to_string(), id), document);
    }

    pub fn remove(&mut self, entity_type: &str, id: &DocumentId) -> Option<Document> {
        self.entries.remove(&(entity_type.to_string(), id.clone()))
    }

    /// Drops every cached document.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
