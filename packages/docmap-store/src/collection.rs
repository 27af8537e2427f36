//! Copy-on-write document collections using ArcSwap.
//!
//! Readers load an immutable snapshot without blocking; writers clone the
//! current snapshot, modify it, and publish it atomically. Writers on the
//! same collection are serialized so concurrent edits are not lost, and
//! the last write to a document wins.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::document::{Document, DocumentId, ID_FIELD};
use crate::error::StoreError;

/// Immutable snapshot of a collection's documents.
///
/// Documents are shared between snapshots, so publishing a new snapshot
/// copies pointers and only the written document is cloned.
#[derive(Debug, Clone, Default)]
pub struct CollectionData {
    /// Documents in insertion order
    documents: Vec<Arc<Document>>,
    /// Identity to position in `documents`
    index: HashMap<DocumentId, usize>,
}

impl CollectionData {
    /// Builds a snapshot from documents, rejecting missing or duplicate ids.
    pub fn from_documents(name: &str, documents: Vec<Document>) -> Result<Self, StoreError> {
        let mut index = HashMap::with_capacity(documents.len());
        for (position, document) in documents.iter().enumerate() {
            let id = DocumentId::of(document).ok_or_else(|| {
                StoreError::InvalidDocument(format!(
                    "document at position {} in '{}' has no {}",
                    position, name, ID_FIELD
                ))
            })?;
            if index.insert(id.clone(), position).is_some() {
                return Err(StoreError::DuplicateId {
                    collection: name.to_string(),
                    id: id.to_string(),
                });
            }
        }
        Ok(Self {
            documents: documents.into_iter().map(Arc::new).collect(),
            index,
        })
    }

    /// Returns the documents in insertion order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> + '_ {
        self.documents.iter().map(|document| document.as_ref())
    }

    /// Looks up a document by identity.
    pub fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.index
            .get(id)
            .map(|&position| self.documents[position].as_ref())
    }

    /// Returns the number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if the collection holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A named collection with lock-free reads.
#[derive(Debug)]
pub struct Collection {
    /// Collection name
    name: String,
    /// Current published snapshot
    inner: ArcSwap<CollectionData>,
    /// Serializes writers
    write_lock: Mutex<()>,
}

impl Collection {
    /// Creates an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_data(name, CollectionData::default())
    }

    /// Creates a collection from an existing snapshot.
    pub fn with_data(name: impl Into<String>, data: CollectionData) -> Self {
        Self {
            name: name.into(),
            inner: ArcSwap::new(Arc::new(data)),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loads the current snapshot for read access.
    pub fn load(&self) -> Arc<CollectionData> {
        self.inner.load_full()
    }

    /// Appends a document, assigning an identity if it has none.
    ///
    /// # Returns
    /// The identity of the stored document.
    pub fn insert(&self, mut document: Document) -> Result<DocumentId, StoreError> {
        let _guard = self.write_lock.lock();
        let current = self.inner.load_full();

        let id = match document.get(ID_FIELD) {
            None | Some(serde_json::Value::Null) => DocumentId::generate(),
            Some(value) => DocumentId::from_value(value).ok_or_else(|| {
                StoreError::InvalidDocument(format!("'{}' is not a valid {}", value, ID_FIELD))
            })?,
        };
        if current.index.contains_key(&id) {
            return Err(StoreError::DuplicateId {
                collection: self.name.clone(),
                id: id.to_string(),
            });
        }
        document.insert(ID_FIELD.to_string(), (&id).into());

        let mut next = (*current).clone();
        next.index.insert(id.clone(), next.documents.len());
        next.documents.push(Arc::new(document));
        self.inner.store(Arc::new(next));

        Ok(id)
    }

    /// Sets the fields in `set` and removes the fields named in `unset`
    /// on an existing document.
    ///
    /// Other fields are left untouched. The identity field cannot be
    /// changed or removed.
    pub fn update(
        &self,
        id: &DocumentId,
        set: Document,
        unset: &[String],
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let current = self.inner.load_full();

        let position = *current
            .index
            .get(id)
            .ok_or_else(|| StoreError::DocumentNotFound {
                collection: self.name.clone(),
                id: id.to_string(),
            })?;

        let mut next = (*current).clone();
        let target = Arc::make_mut(&mut next.documents[position]);
        for (field, value) in set {
            if field != ID_FIELD {
                target.insert(field, value);
            }
        }
        for field in unset {
            if field != ID_FIELD {
                target.remove(field);
            }
        }
        self.inner.store(Arc::new(next));

        Ok(())
    }
}
