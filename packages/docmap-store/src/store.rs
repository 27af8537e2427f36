//! The document store contract consumed by the mapper.

use crate::document::{Document, DocumentId};
use crate::error::StoreError;
use crate::filter::Filter;

/// Operations a document store must support.
///
/// Every call blocks until the store has completed it. Connectivity
/// failures surface as [`StoreError::Unavailable`].
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Inserts a document, assigning an identity when `_id` is absent.
    fn insert(&self, collection: &str, document: Document) -> Result<DocumentId, StoreError>;

    /// Sets the fields in `set` and removes the fields named in `unset`
    /// on the document with the given identity.
    fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        set: Document,
        unset: &[String],
    ) -> Result<(), StoreError>;

    /// Fetches a document by identity.
    fn find_by_id(&self, collection: &str, id: &DocumentId)
        -> Result<Option<Document>, StoreError>;

    /// Returns all documents matching the filter, in insertion order.
    ///
    /// A collection that does not exist yields no documents.
    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    /// Removes every collection of the database.
    fn drop_database(&self) -> Result<(), StoreError>;

    /// Lists collection names in sorted order.
    fn collection_names(&self) -> Result<Vec<String>, StoreError>;
}
