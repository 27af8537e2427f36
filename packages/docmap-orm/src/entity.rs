//! Entities: attribute bags with an identity and relation fields.

use std::collections::BTreeMap;

use docmap_store::{DocumentId, ID_FIELD};
use serde_json::{Map, Value};

use crate::collection::EntityCollection;
use crate::error::MapperError;
use crate::relation::RelationField;

/// Named entity attributes.
pub type Attributes = Map<String, Value>;

/// State of an entity as last read from or written to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Snapshot {
    pub(crate) attributes: Attributes,
    /// Foreign-key arrays present in the stored document
    pub(crate) foreign_keys: BTreeMap<String, Vec<DocumentId>>,
}

/// A domain object managed by a mapper.
///
/// An entity carries its type name, an identity once persisted, plain
/// attributes, and one field per relation. Dirty checking compares the
/// attributes against the snapshot taken at the last load or store.
#[derive(Debug, Clone)]
pub struct Entity {
    entity_type: String,
    id: Option<DocumentId>,
    attributes: Attributes,
    relations: BTreeMap<String, RelationField>,
    snapshot: Option<Snapshot>,
}

impl Entity {
    /// Creates a new, unsaved entity with no attributes.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: None,
            attributes: Attributes::new(),
            relations: BTreeMap::new(),
            snapshot: None,
        }
    }

    /// Creates a new, unsaved entity with the given attributes.
    pub fn with_attributes(entity_type: impl Into<String>, attributes: Attributes) -> Self {
        let mut entity = Self::new(entity_type);
        entity.fill(attributes);
        entity
    }

    pub(crate) fn hydrated(
        entity_type: &str,
        id: DocumentId,
        attributes: Attributes,
        relations: BTreeMap<String, RelationField>,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            id: Some(id),
            attributes,
            relations,
            snapshot: Some(snapshot),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the identity, if one has been assigned.
    pub fn id(&self) -> Option<&DocumentId> {
        self.id.as_ref()
    }

    /// Assigns an identity before the first store.
    pub fn set_id(&mut self, id: impl Into<DocumentId>) {
        self.id = Some(id.into());
    }

    /// Returns `true` once the entity has been loaded from or written to
    /// the store.
    pub fn exists(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Sets an attribute.
    ///
    /// Setting `_id` assigns the identity instead; values that are not a
    /// valid identity are ignored.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if key == ID_FIELD {
            if let Some(id) = DocumentId::from_value(&value) {
                self.id = Some(id);
            }
            return;
        }
        self.attributes.insert(key, value);
    }

    /// Sets every given attribute.
    pub fn fill(&mut self, attributes: Attributes) {
        for (key, value) in attributes {
            self.set(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns `true` if the entity is new or any attribute differs from
    /// the last persisted state.
    pub fn is_dirty(&self) -> bool {
        match &self.snapshot {
            Some(snapshot) => snapshot.attributes != self.attributes,
            None => true,
        }
    }

    /// Returns the attributes added or changed since the last persisted
    /// state. For a new entity every attribute is dirty.
    pub fn dirty_attributes(&self) -> Attributes {
        let Some(snapshot) = &self.snapshot else {
            return self.attributes.clone();
        };
        self.attributes
            .iter()
            .filter(|(key, value)| snapshot.attributes.get(key.as_str()) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Names of persisted attributes that have since been removed.
    ///
    /// They are removed from the stored document on the next store.
    pub fn removed_attributes(&self) -> Vec<String> {
        match &self.snapshot {
            Some(snapshot) => snapshot
                .attributes
                .keys()
                .filter(|key| !self.attributes.contains_key(key.as_str()))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns the relation field with the given name.
    pub fn relation(&self, name: &str) -> Option<&RelationField> {
        self.relations.get(name)
    }

    pub fn relation_mut(&mut self, name: &str) -> Option<&mut RelationField> {
        self.relations.get_mut(name)
    }

    /// Names of the relation fields present on this entity.
    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Replaces a relation field.
    ///
    /// A field whose collection is already in memory cannot be replaced by
    /// an unresolved proxy, since that would discard pending edits.
    pub fn set_relation(
        &mut self,
        name: impl Into<String>,
        field: RelationField,
    ) -> Result<(), MapperError> {
        let name = name.into();
        if let Some(current) = self.relations.get(&name) {
            if current.is_resolved() && !field.is_resolved() {
                return Err(MapperError::invalid_relation(
                    &self.entity_type,
                    &name,
                    "a loaded collection cannot be replaced by an unresolved proxy",
                ));
            }
        }
        self.relations.insert(name, field);
        Ok(())
    }

    /// Assigns an in-memory collection to a relation.
    pub fn set_related(&mut self, name: impl Into<String>, collection: EntityCollection) {
        self.relations
            .insert(name.into(), RelationField::Loaded(collection));
    }

    /// Sets a relation to null. It is persisted as an empty key array.
    pub fn clear_relation(&mut self, name: impl Into<String>) {
        self.relations.insert(name.into(), RelationField::Null);
    }

    /// Returns the related collection for editing, loading it if needed.
    ///
    /// A null or absent relation becomes an empty collection.
    pub fn related_mut(&mut self, name: &str) -> Result<&mut EntityCollection, MapperError> {
        let field = self
            .relations
            .entry(name.to_string())
            .or_insert_with(|| RelationField::Loaded(EntityCollection::new()));
        if matches!(field, RelationField::Null) {
            *field = RelationField::Loaded(EntityCollection::new());
        }
        match field.collection_mut()? {
            Some(collection) => Ok(collection),
            None => Err(MapperError::invalid_relation(
                &self.entity_type,
                name,
                "relation is null",
            )),
        }
    }

    pub(crate) fn relations_mut(&mut self) -> &mut BTreeMap<String, RelationField> {
        &mut self.relations
    }

    pub(crate) fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub(crate) fn mark_persisted(&mut self, id: DocumentId, snapshot: Snapshot) {
        self.id = Some(id);
        self.snapshot = Some(snapshot);
    }
}
