//! Per-type mappers: lookups, queries, and store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use docmap_store::{Document, DocumentId, Filter, StoreError, ID_FIELD};
use serde_json::Value;

use crate::collection::EntityCollection;
use crate::entity::{Entity, Snapshot};
use crate::entity_map::EntityMap;
use crate::error::MapperError;
use crate::proxy::LazyCollectionProxy;
use crate::query::Query;
use crate::relation::RelationField;
use crate::session::Session;
use crate::unit_of_work::UnitOfWork;

/// Loads and stores entities of one type.
#[derive(Debug, Clone)]
pub struct Mapper {
    session: Session,
    map: Arc<EntityMap>,
}

impl Mapper {
    pub(crate) fn new(session: Session, map: Arc<EntityMap>) -> Self {
        Self { session, map }
    }

    pub fn entity_map(&self) -> &EntityMap {
        &self.map
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Creates a new entity of this type with empty relations.
    pub fn new_entity(&self) -> Entity {
        self.map.new_entity()
    }

    /// Persists an entity and its loaded relations.
    ///
    /// New entities are inserted and receive an identity. Existing ones
    /// are updated only with what changed since they were loaded. Every
    /// in-memory related entity is stored first, then the relation's
    /// foreign-key array is written in collection order. Relations that
    /// were never accessed keep their stored keys.
    ///
    /// # Returns
    /// `Result<(), MapperError>`. A store failure part way leaves the
    /// writes already made in place.
    pub fn store(&self, entity: &mut Entity) -> Result<(), MapperError> {
        if entity.entity_type() != self.map.entity_type() {
            return Err(MapperError::WrongEntityType {
                expected: self.map.entity_type().to_string(),
                actual: entity.entity_type().to_string(),
            });
        }
        let mut unit = UnitOfWork::new(&self.session);
        unit.store(&self.map, entity)?;
        tracing::debug!(
            "Stored {} {} ({} writes)",
            self.map.entity_type(),
            entity.id().map(DocumentId::as_str).unwrap_or_default(),
            unit.writes()
        );
        Ok(())
    }

    /// Stores every entity of a collection in order.
    pub fn store_all(&self, entities: &mut EntityCollection) -> Result<(), MapperError> {
        for entity in entities.iter_mut() {
            self.store(entity)?;
        }
        Ok(())
    }

    /// Loads an entity by identity.
    ///
    /// The identity map is consulted first; a miss queries the store.
    /// Relations come back as unresolved proxies.
    pub fn find(&self, id: &DocumentId) -> Result<Entity, MapperError> {
        let document = match self.session.cached(self.map.entity_type(), id) {
            Some(document) => document,
            None => {
                let document = self
                    .session
                    .document_store()
                    .find_by_id(self.map.collection(), id)?
                    .ok_or_else(|| MapperError::NotFound {
                        entity_type: self.map.entity_type().to_string(),
                        id: id.to_string(),
                    })?;
                self.session
                    .remember(self.map.entity_type(), id.clone(), document.clone());
                document
            }
        };
        self.hydrate(document)
    }

    /// Loads entities by identity with a single query.
    ///
    /// The result follows `ids` exactly, repeating an entity for a
    /// repeated identity. Identities with no stored document are skipped
    /// with a warning. An empty list returns without a query.
    pub fn find_many(&self, ids: &[DocumentId]) -> Result<EntityCollection, MapperError> {
        if ids.is_empty() {
            return Ok(EntityCollection::new());
        }
        let documents = self.fetch(&Filter::ids_in(&unique(ids)))?;
        self.assemble(ids, &index_by_id(documents))
    }

    /// Loads every entity of this type.
    pub fn all(&self) -> Result<EntityCollection, MapperError> {
        self.query().get()
    }

    /// Starts a query.
    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    /// Starts a query that eagerly loads the named relation.
    pub fn with(&self, relation: &str) -> Query {
        self.query().with(relation)
    }

    /// Starts a query with one condition.
    pub fn where_(&self, field: impl Into<String>, op: &str, value: impl Into<Value>) -> Query {
        self.query().where_(field, op, value)
    }

    /// Runs a store query and caches every returned document.
    pub(crate) fn fetch(&self, filter: &Filter) -> Result<Vec<Document>, MapperError> {
        let documents = self
            .session
            .document_store()
            .find(self.map.collection(), filter)?;
        for document in &documents {
            if let Some(id) = DocumentId::of(document) {
                self.session
                    .remember(self.map.entity_type(), id, document.clone());
            }
        }
        Ok(documents)
    }

    /// Builds an entity from a stored document.
    ///
    /// The identity and foreign-key fields are lifted out of the
    /// attributes; each declared relation becomes an unresolved proxy
    /// over its stored keys.
    pub(crate) fn hydrate(&self, mut attributes: Document) -> Result<Entity, MapperError> {
        let entity_type = self.map.entity_type();
        let id = DocumentId::of(&attributes).ok_or_else(|| {
            MapperError::Store(StoreError::InvalidDocument(format!(
                "{} document in '{}' has no {}",
                entity_type,
                self.map.collection(),
                ID_FIELD
            )))
        })?;
        attributes.remove(ID_FIELD);

        let mut foreign_keys = BTreeMap::new();
        let mut relations = BTreeMap::new();
        for relation in self.map.relations() {
            attributes.remove(relation.name());
            let stored = attributes.remove(relation.foreign_key());
            let keys = DocumentId::list_from_value(stored.as_ref()).map_err(|e| {
                MapperError::invalid_relation(entity_type, relation.name(), e.to_string())
            })?;
            if matches!(stored, Some(Value::Array(_))) {
                foreign_keys.insert(relation.foreign_key().to_string(), keys.clone());
            }
            let proxy = LazyCollectionProxy::new(
                self.session.loader(),
                relation.clone(),
                id.clone(),
                keys,
            );
            relations.insert(relation.name().to_string(), RelationField::Lazy(proxy));
        }

        let snapshot = Snapshot {
            attributes: attributes.clone(),
            foreign_keys,
        };
        Ok(Entity::hydrated(entity_type, id, attributes, relations, snapshot))
    }

    /// Replaces the named relation on every entity with its loaded
    /// collection, using one query for all of them.
    pub(crate) fn eager_load(
        &self,
        entities: &mut [Entity],
        relation_name: &str,
    ) -> Result<(), MapperError> {
        let relation = self
            .map
            .relation(relation_name)
            .cloned()
            .ok_or_else(|| MapperError::UnknownRelation {
                entity_type: self.map.entity_type().to_string(),
                relation: relation_name.to_string(),
            })?;
        let related = self.session.mapper(relation.related_type())?;

        let keys: Vec<Vec<DocumentId>> = entities
            .iter()
            .map(|entity| match entity.relation(relation.name()) {
                Some(RelationField::Lazy(proxy)) => {
                    proxy.foreign_keys().unwrap_or_default().to_vec()
                }
                _ => Vec::new(),
            })
            .collect();
        let all_keys: Vec<DocumentId> = keys.iter().flatten().cloned().collect();

        let documents = if all_keys.is_empty() {
            HashMap::new()
        } else {
            index_by_id(related.fetch(&Filter::ids_in(&unique(&all_keys)))?)
        };

        for (entity, keys) in entities.iter_mut().zip(keys) {
            let collection = related.assemble(&keys, &documents)?;
            entity
                .relations_mut()
                .insert(relation.name().to_string(), RelationField::Loaded(collection));
        }
        Ok(())
    }

    fn assemble(
        &self,
        keys: &[DocumentId],
        documents: &HashMap<DocumentId, Document>,
    ) -> Result<EntityCollection, MapperError> {
        let mut collection = EntityCollection::new();
        for key in keys {
            match documents.get(key) {
                Some(document) => collection.push(self.hydrate(document.clone())?),
                None => tracing::warn!(
                    "{} {} is referenced but missing from '{}'; skipping",
                    self.map.entity_type(),
                    key,
                    self.map.collection()
                ),
            }
        }
        Ok(collection)
    }
}

fn unique(ids: &[DocumentId]) -> Vec<DocumentId> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}

fn index_by_id(documents: Vec<Document>) -> HashMap<DocumentId, Document> {
    documents
        .into_iter()
        .filter_map(|document| DocumentId::of(&document).map(|id| (id, document)))
        .collect()
}
