//! Mapper sessions: registry, identity map, and events shared by mappers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use docmap_store::{Document, DocumentId, DocumentStore};
use parking_lot::{Mutex, RwLock};

use crate::collection::EntityCollection;
use crate::config::MapperConfig;
use crate::entity::Entity;
use crate::entity_map::EntityMap;
use crate::error::MapperError;
use crate::events::{EntityEvent, EventDispatcher};
use crate::identity_map::IdentityMap;
use crate::mapper::Mapper;
use crate::proxy::RelationLoader;
use crate::relation::RelationDescriptor;

/// Builds a [`Session`], validating every entity map up front.
#[derive(Debug)]
pub struct SessionBuilder {
    store: Arc<dyn DocumentStore>,
    config: MapperConfig,
    maps: Vec<EntityMap>,
}

impl SessionBuilder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            config: MapperConfig::default(),
            maps: Vec::new(),
        }
    }

    pub fn config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.config.strict_mode = strict;
        self
    }

    pub fn register(mut self, map: EntityMap) -> Self {
        self.maps.push(map);
        self
    }

    /// Validates the registered maps and creates the session.
    ///
    /// # Returns
    /// `Result<Session, MapperError>`, failing with
    /// [`MapperError::Misconfigured`] for a duplicate type, an invalid
    /// relation descriptor, or, in strict mode, a relation to a type that
    /// is not registered.
    pub fn build(self) -> Result<Session, MapperError> {
        let mut types = HashSet::new();
        for map in &self.maps {
            if !types.insert(map.entity_type().to_string()) {
                return Err(MapperError::misconfigured(
                    map.entity_type(),
                    "entity type registered twice",
                ));
            }
        }

        let strict = self.config.strict_mode;
        let is_known = |t: &str| !strict || types.contains(t);
        for map in &self.maps {
            map.validate(&is_known)?;
        }

        let maps = self
            .maps
            .into_iter()
            .map(|map| (map.entity_type().to_string(), Arc::new(map)))
            .collect::<HashMap<_, _>>();
        tracing::debug!(
            "Session ready with {} entity maps (strict: {})",
            maps.len(),
            strict
        );

        Ok(Session {
            state: Arc::new(SessionState {
                store: self.store,
                config: self.config,
                maps: RwLock::new(maps),
                identity_map: Mutex::new(IdentityMap::new()),
                events: EventDispatcher::new(),
            }),
        })
    }
}

#[derive(Debug)]
pub(crate) struct SessionState {
    store: Arc<dyn DocumentStore>,
    config: MapperConfig,
    maps: RwLock<HashMap<String, Arc<EntityMap>>>,
    identity_map: Mutex<IdentityMap>,
    events: EventDispatcher,
}

/// Handle to a mapper session.
///
/// Clones share the same registry, identity map, and listeners. Lazy
/// proxies keep only a weak handle, so once every clone is dropped they
/// fail with [`MapperError::SessionClosed`] instead of loading.
#[derive(Debug, Clone)]
pub struct Session {
    state: Arc<SessionState>,
}

impl Session {
    pub fn builder(store: Arc<dyn DocumentStore>) -> SessionBuilder {
        SessionBuilder::new(store)
    }

    pub fn document_store(&self) -> &Arc<dyn DocumentStore> {
        &self.state.store
    }

    pub fn config(&self) -> &MapperConfig {
        &self.state.config
    }

    pub fn is_strict(&self) -> bool {
        self.state.config.strict_mode
    }

    /// Registers another entity map after the session was built.
    pub fn register(&self, map: EntityMap) -> Result<(), MapperError> {
        let mut maps = self.state.maps.write();
        if maps.contains_key(map.entity_type()) {
            return Err(MapperError::misconfigured(
                map.entity_type(),
                "entity type registered twice",
            ));
        }
        let strict = self.is_strict();
        map.validate(&|t: &str| !strict || maps.contains_key(t))?;
        maps.insert(map.entity_type().to_string(), Arc::new(map));
        Ok(())
    }

    /// Returns the map for an entity type.
    ///
    /// Outside strict mode an unregistered type gets a default map, which
    /// is registered on first use.
    pub fn entity_map(&self, entity_type: &str) -> Result<Arc<EntityMap>, MapperError> {
        if let Some(map) = self.state.maps.read().get(entity_type) {
            return Ok(map.clone());
        }
        if self.is_strict() {
            return Err(MapperError::UnmappedEntity(entity_type.to_string()));
        }
        let mut maps = self.state.maps.write();
        let map = maps
            .entry(entity_type.to_string())
            .or_insert_with(|| {
                tracing::debug!("Using default entity map for {}", entity_type);
                Arc::new(EntityMap::default_for(entity_type))
            })
            .clone();
        Ok(map)
    }

    /// Returns the mapper for an entity type.
    pub fn mapper(&self, entity_type: &str) -> Result<Mapper, MapperError> {
        Ok(Mapper::new(self.clone(), self.entity_map(entity_type)?))
    }

    /// Returns the mapper for the entity's type.
    pub fn mapper_for(&self, entity: &Entity) -> Result<Mapper, MapperError> {
        self.mapper(entity.entity_type())
    }

    /// Creates a new entity with every declared relation empty.
    pub fn make(&self, entity_type: &str) -> Result<Entity, MapperError> {
        Ok(self.entity_map(entity_type)?.new_entity())
    }

    /// Stores an entity with the mapper for its type.
    pub fn store(&self, entity: &mut Entity) -> Result<(), MapperError> {
        self.mapper_for(entity)?.store(entity)
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.state.events
    }

    /// Logs every lifecycle event at info level.
    pub fn log_events(&self) {
        self.state.events.listen_all(|event, entity| {
            let id = entity.id().map(DocumentId::to_string).unwrap_or_default();
            tracing::info!("{} {} {}", entity.entity_type(), id, event);
        });
    }

    /// Empties the identity map; later lookups go to the store.
    pub fn clear_cache(&self) {
        self.state.identity_map.lock().clear();
    }

    /// Number of documents in the identity map.
    pub fn cached_count(&self) -> usize {
        self.state.identity_map.lock().len()
    }

    pub(crate) fn cached(&self, entity_type: &str, id: &DocumentId) -> Option<Document> {
        self.state.identity_map.lock().get(entity_type, id).cloned()
    }

    pub(crate) fn remember(&self, entity_type: &str, id: DocumentId, document: Document) {
        self.state
            .identity_map
            .lock()
            .insert(entity_type, id, document);
    }

    pub(crate) fn dispatch(&self, event: EntityEvent, entity: &Entity) {
        self.state.events.dispatch(event, entity);
    }

    pub(crate) fn loader(&self) -> Weak<dyn RelationLoader> {
        let weak: Weak<SessionState> = Arc::downgrade(&self.state);
        weak
    }
}

impl RelationLoader for SessionState {
    fn load_related(
        self: Arc<Self>,
        relation: &RelationDescriptor,
        keys: &[DocumentId],
    ) -> Result<EntityCollection, MapperError> {
        let session = Session { state: self };
        session.mapper(relation.related_type())?.find_many(keys)
    }
}
