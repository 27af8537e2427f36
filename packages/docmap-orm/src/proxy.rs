//! Deferred loading of related collections.

use std::fmt;
use std::sync::{Arc, Weak};

use docmap_store::DocumentId;

use crate::collection::EntityCollection;
use crate::entity::Entity;
use crate::error::MapperError;
use crate::relation::RelationDescriptor;

/// Loads related entities by identity, in key order.
pub(crate) trait RelationLoader: Send + Sync {
    fn load_related(
        self: Arc<Self>,
        relation: &RelationDescriptor,
        keys: &[DocumentId],
    ) -> Result<EntityCollection, MapperError>;
}

#[derive(Clone)]
enum ProxyState {
    Unresolved {
        loader: Weak<dyn RelationLoader>,
        keys: Vec<DocumentId>,
    },
    Resolved(EntityCollection),
}

/// Placeholder for a related collection that has not been loaded.
///
/// The proxy holds the foreign keys read with its owner and a handle to
/// the session that produced it. The first access that needs the
/// members issues one query and caches the result; later accesses reuse
/// it. A proxy that was never accessed is reported as unresolved and its
/// stored keys are left alone when the owner is stored.
#[derive(Clone)]
pub struct LazyCollectionProxy {
    relation: Arc<RelationDescriptor>,
    owner_id: DocumentId,
    state: ProxyState,
}

impl LazyCollectionProxy {
    pub(crate) fn new(
        loader: Weak<dyn RelationLoader>,
        relation: Arc<RelationDescriptor>,
        owner_id: DocumentId,
        keys: Vec<DocumentId>,
    ) -> Self {
        Self {
            relation,
            owner_id,
            state: ProxyState::Unresolved { loader, keys },
        }
    }

    /// Returns `true` once the related collection has been loaded.
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, ProxyState::Resolved(_))
    }

    pub fn relation(&self) -> &RelationDescriptor {
        &self.relation
    }

    /// Identity of the entity owning this relation.
    pub fn owner_id(&self) -> &DocumentId {
        &self.owner_id
    }

    /// The stored foreign keys, while unresolved.
    pub fn foreign_keys(&self) -> Option<&[DocumentId]> {
        match &self.state {
            ProxyState::Unresolved { keys, .. } => Some(keys),
            ProxyState::Resolved(_) => None,
        }
    }

    /// The loaded collection, without triggering a load.
    pub fn as_loaded(&self) -> Option<&EntityCollection> {
        match &self.state {
            ProxyState::Resolved(collection) => Some(collection),
            ProxyState::Unresolved { .. } => None,
        }
    }

    pub(crate) fn loaded_mut(&mut self) -> Option<&mut EntityCollection> {
        match &mut self.state {
            ProxyState::Resolved(collection) => Some(collection),
            ProxyState::Unresolved { .. } => None,
        }
    }

    /// Loads the related collection if needed and returns it.
    ///
    /// An empty key array resolves to an empty collection without a
    /// query. A failed load leaves the proxy unresolved.
    ///
    /// # Returns
    /// `Result<&mut EntityCollection, MapperError>`, failing with
    /// [`MapperError::SessionClosed`] if the session is gone or with the
    /// store's error.
    pub fn resolve(&mut self) -> Result<&mut EntityCollection, MapperError> {
        if let ProxyState::Unresolved { loader, keys } = &self.state {
            let collection = if keys.is_empty() {
                EntityCollection::new()
            } else {
                let loader = loader.upgrade().ok_or(MapperError::SessionClosed)?;
                loader.load_related(&self.relation, keys)?
            };
            tracing::debug!(
                "Resolved {}.{} of {} ({} entities)",
                self.relation.owner_type(),
                self.relation.name(),
                self.owner_id,
                collection.len()
            );
            self.state = ProxyState::Resolved(collection);
        }
        match &mut self.state {
            ProxyState::Resolved(collection) => Ok(collection),
            ProxyState::Unresolved { .. } => unreachable!("proxy state set above"),
        }
    }

    pub fn len(&mut self) -> Result<usize, MapperError> {
        Ok(self.resolve()?.len())
    }

    pub fn is_empty(&mut self) -> Result<bool, MapperError> {
        Ok(self.resolve()?.is_empty())
    }

    pub fn first_mut(&mut self) -> Result<Option<&mut Entity>, MapperError> {
        Ok(self.resolve()?.first_mut())
    }

    pub fn get_mut(&mut self, index: usize) -> Result<Option<&mut Entity>, MapperError> {
        Ok(self.resolve()?.get_mut(index))
    }

    pub fn iter(&mut self) -> Result<std::slice::Iter<'_, Entity>, MapperError> {
        Ok(self.resolve()?.iter())
    }

    /// Appends an entity after loading the existing members.
    pub fn push(&mut self, entity: Entity) -> Result<(), MapperError> {
        self.resolve()?.push(entity);
        Ok(())
    }

    /// Applies `f` to every member after loading them.
    pub fn map<F>(&mut self, f: F) -> Result<(), MapperError>
    where
        F: FnMut(&mut Entity),
    {
        self.resolve()?.map(f);
        Ok(())
    }

    /// Consumes the proxy, returning the loaded collection.
    pub fn into_collection(mut self) -> Result<EntityCollection, MapperError> {
        self.resolve()?;
        match self.state {
            ProxyState::Resolved(collection) => Ok(collection),
            ProxyState::Unresolved { .. } => unreachable!("proxy resolved above"),
        }
    }
}

impl fmt::Debug for LazyCollectionProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("LazyCollectionProxy");
        out.field("relation", &self.relation.name())
            .field("owner_id", &self.owner_id);
        match &self.state {
            ProxyState::Unresolved { keys, .. } => out.field("keys", keys),
            ProxyState::Resolved(collection) => out.field("loaded", &collection.len()),
        };
        out.finish()
    }
}
