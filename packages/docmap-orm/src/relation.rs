//! Relation descriptors and relation field states.

use docmap_store::{DocumentId, ID_FIELD};

use crate::collection::EntityCollection;
use crate::entity::Entity;
use crate::error::MapperError;
use crate::proxy::LazyCollectionProxy;

/// A belongs-to-many relation stored as an array of related identities
/// on the owning document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDescriptor {
    owner_type: String,
    name: String,
    related_type: String,
    foreign_key: String,
}

impl RelationDescriptor {
    /// Declares `owner_type.name` as a list of `related_type` entities
    /// whose identities are stored under `foreign_key`.
    pub fn belongs_to_many(
        owner_type: impl Into<String>,
        name: impl Into<String>,
        related_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            owner_type: owner_type.into(),
            name: name.into(),
            related_type: related_type.into(),
            foreign_key: foreign_key.into(),
        }
    }

    pub fn owner_type(&self) -> &str {
        &self.owner_type
    }

    /// Name of the relation field on the owning entity.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn related_type(&self) -> &str {
        &self.related_type
    }

    /// Name of the document field holding the identity array.
    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    /// Checks the descriptor on its own, without looking at other maps.
    pub(crate) fn validate(&self) -> Result<(), MapperError> {
        let fail = |reason: String| Err(MapperError::misconfigured(&self.owner_type, reason));
        if self.name.is_empty() {
            return fail("relation name must not be empty".to_string());
        }
        if self.related_type.is_empty() {
            return fail(format!("relation '{}' has no related type", self.name));
        }
        if self.foreign_key.is_empty() {
            return fail(format!("relation '{}' has no foreign key", self.name));
        }
        if self.name == ID_FIELD || self.foreign_key == ID_FIELD {
            return fail(format!(
                "relation '{}' cannot use the identity field {}",
                self.name, ID_FIELD
            ));
        }
        if self.name == self.foreign_key {
            return fail(format!(
                "relation '{}' cannot store its keys under its own name",
                self.name
            ));
        }
        Ok(())
    }
}

/// The value held in an entity's relation field.
#[derive(Debug, Clone)]
pub enum RelationField {
    /// Explicitly cleared; persisted as an empty key array
    Null,
    /// An in-memory collection
    Loaded(EntityCollection),
    /// Not loaded yet; resolves on first access
    Lazy(LazyCollectionProxy),
}

impl RelationField {
    /// Returns `false` only for a proxy that has not been resolved.
    pub fn is_resolved(&self) -> bool {
        match self {
            RelationField::Lazy(proxy) => proxy.is_resolved(),
            RelationField::Null | RelationField::Loaded(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RelationField::Null)
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, RelationField::Lazy(_))
    }

    /// Returns the in-memory collection without triggering a load.
    pub fn as_loaded(&self) -> Option<&EntityCollection> {
        match self {
            RelationField::Loaded(collection) => Some(collection),
            RelationField::Lazy(proxy) => proxy.as_loaded(),
            RelationField::Null => None,
        }
    }

    /// Returns the collection for editing, resolving a proxy first.
    ///
    /// # Returns
    /// `None` for a null relation.
    pub fn collection_mut(&mut self) -> Result<Option<&mut EntityCollection>, MapperError> {
        match self {
            RelationField::Null => Ok(None),
            RelationField::Loaded(collection) => Ok(Some(collection)),
            RelationField::Lazy(proxy) => proxy.resolve().map(Some),
        }
    }

    /// Number of related entities, resolving a proxy first.
    pub fn len(&mut self) -> Result<usize, MapperError> {
        Ok(self.collection_mut()?.map_or(0, |c| c.len()))
    }

    pub fn is_empty(&mut self) -> Result<bool, MapperError> {
        Ok(self.len()? == 0)
    }

    /// Returns the first related entity, resolving a proxy first.
    pub fn first_mut(&mut self) -> Result<Option<&mut Entity>, MapperError> {
        Ok(self.collection_mut()?.and_then(|c| c.first_mut()))
    }
}

impl From<EntityCollection> for RelationField {
    fn from(collection: EntityCollection) -> Self {
        RelationField::Loaded(collection)
    }
}

impl From<LazyCollectionProxy> for RelationField {
    fn from(proxy: LazyCollectionProxy) -> Self {
        RelationField::Lazy(proxy)
    }
}

/// How a relation's foreign-key array is written on store.
pub(crate) enum KeySync<'a> {
    /// Untouched proxy: the stored array is kept as is
    Keep(Vec<DocumentId>),
    /// Null or never set: written as `[]`
    Empty,
    /// In-memory collection: members are stored, then their identities
    /// written in order
    Members(&'a mut EntityCollection),
}

impl<'a> KeySync<'a> {
    pub(crate) fn plan(field: Option<&'a mut RelationField>) -> Self {
        match field {
            None | Some(RelationField::Null) => KeySync::Empty,
            Some(RelationField::Loaded(collection)) => KeySync::Members(collection),
            Some(RelationField::Lazy(proxy)) => {
                if !proxy.is_resolved() {
                    return KeySync::Keep(proxy.foreign_keys().unwrap_or_default().to_vec());
                }
                match proxy.loaded_mut() {
                    Some(collection) => KeySync::Members(collection),
                    None => KeySync::Empty,
                }
            }
        }
    }
}
