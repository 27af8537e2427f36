//! Write planning for a single store call.
//!
//! Storing an entity walks its in-memory relations depth first: each
//! related entity is stored before the owner, so the owner's
//! foreign-key arrays can be written with identities that all exist.

use std::collections::BTreeMap;

use docmap_store::{Document, DocumentId, ID_FIELD};
use serde_json::Value;

use crate::entity::{Entity, Snapshot};
use crate::entity_map::EntityMap;
use crate::error::MapperError;
use crate::events::EntityEvent;
use crate::relation::KeySync;
use crate::session::Session;

/// Foreign keys a relation contributes to the owner's document.
enum RelationKeys {
    /// Unchanged from the stored array
    Kept(Vec<DocumentId>),
    /// Rebuilt from the in-memory collection
    Synced(Vec<DocumentId>),
}

pub(crate) struct UnitOfWork<'s> {
    session: &'s Session,
    writes: usize,
}

impl<'s> UnitOfWork<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self { session, writes: 0 }
    }

    /// Number of inserts and updates issued so far.
    pub(crate) fn writes(&self) -> usize {
        self.writes
    }

    pub(crate) fn store(&mut self, map: &EntityMap, entity: &mut Entity) -> Result<(), MapperError> {
        self.session.dispatch(EntityEvent::Storing, entity);

        check_relation_fields(map, entity)?;
        let keys = self.sync_relations(map, entity)?;
        if entity.exists() {
            self.update(map, entity, keys)?;
        } else {
            self.insert(map, entity, keys)?;
        }

        self.session.dispatch(EntityEvent::Stored, entity);
        Ok(())
    }

    /// Stores the members of every in-memory relation and collects the
    /// key arrays to write.
    fn sync_relations(
        &mut self,
        map: &EntityMap,
        entity: &mut Entity,
    ) -> Result<Vec<(String, RelationKeys)>, MapperError> {
        let mut result = Vec::with_capacity(map.relations().len());
        for relation in map.relations() {
            let plan = KeySync::plan(entity.relations_mut().get_mut(relation.name()));
            let keys = match plan {
                KeySync::Keep(keys) => RelationKeys::Kept(keys),
                KeySync::Empty => RelationKeys::Synced(Vec::new()),
                KeySync::Members(collection) => {
                    let related_map = self.session.entity_map(relation.related_type())?;
                    let mut ids = Vec::with_capacity(collection.len());
                    for member in collection.iter_mut() {
                        if member.entity_type() != related_map.entity_type() {
                            return Err(MapperError::invalid_relation(
                                map.entity_type(),
                                relation.name(),
                                format!(
                                    "expected {} entities, found {}",
                                    related_map.entity_type(),
                                    member.entity_type()
                                ),
                            ));
                        }
                        self.store(&related_map, member)?;
                        let id = member.id().cloned().ok_or_else(|| {
                            MapperError::invalid_relation(
                                map.entity_type(),
                                relation.name(),
                                "related entity has no identity after store",
                            )
                        })?;
                        ids.push(id);
                    }
                    RelationKeys::Synced(ids)
                }
            };
            result.push((relation.foreign_key().to_string(), keys));
        }
        Ok(result)
    }

    fn insert(
        &mut self,
        map: &EntityMap,
        entity: &mut Entity,
        keys: Vec<(String, RelationKeys)>,
    ) -> Result<(), MapperError> {
        let mut document = entity.attributes().clone();
        let mut foreign_keys = BTreeMap::new();
        for (field, keys) in keys {
            let (RelationKeys::Kept(ids) | RelationKeys::Synced(ids)) = keys;
            document.insert(field.clone(), DocumentId::list_to_value(&ids));
            foreign_keys.insert(field, ids);
        }
        if let Some(id) = entity.id() {
            document.insert(ID_FIELD.to_string(), id.into());
        }

        self.session.dispatch(EntityEvent::Creating, entity);
        let id = self
            .session
            .document_store()
            .insert(map.collection(), document.clone())?;
        self.writes += 1;

        document.insert(ID_FIELD.to_string(), (&id).into());
        let snapshot = Snapshot {
            attributes: entity.attributes().clone(),
            foreign_keys,
        };
        entity.mark_persisted(id.clone(), snapshot);
        self.session.remember(map.entity_type(), id, document);
        self.session.dispatch(EntityEvent::Created, entity);
        Ok(())
    }

    fn update(
        &mut self,
        map: &EntityMap,
        entity: &mut Entity,
        keys: Vec<(String, RelationKeys)>,
    ) -> Result<(), MapperError> {
        let id = entity.id().cloned().ok_or_else(|| MapperError::NotFound {
            entity_type: map.entity_type().to_string(),
            id: String::new(),
        })?;
        let previous = entity.snapshot().cloned().unwrap_or_default();

        let mut changes = entity.dirty_attributes();
        let removed = entity.removed_attributes();
        let mut foreign_keys = previous.foreign_keys.clone();
        for (field, keys) in keys {
            if let RelationKeys::Synced(ids) = keys {
                if previous.foreign_keys.get(&field) != Some(&ids) {
                    changes.insert(field.clone(), DocumentId::list_to_value(&ids));
                    foreign_keys.insert(field, ids);
                }
            }
        }
        if changes.is_empty() && removed.is_empty() {
            tracing::trace!("{} {} is clean", map.entity_type(), id);
            return Ok(());
        }

        self.session.dispatch(EntityEvent::Updating, entity);
        self.session
            .document_store()
            .update(map.collection(), &id, changes.clone(), &removed)?;
        self.writes += 1;

        let mut document = match self.session.cached(map.entity_type(), &id) {
            Some(cached) => cached,
            None => stored_form(&id, &previous),
        };
        for (field, value) in changes {
            document.insert(field, value);
        }
        for field in &removed {
            document.remove(field);
        }
        let snapshot = Snapshot {
            attributes: entity.attributes().clone(),
            foreign_keys,
        };
        entity.mark_persisted(id.clone(), snapshot);
        self.session.remember(map.entity_type(), id, document);
        self.session.dispatch(EntityEvent::Updated, entity);
        Ok(())
    }
}

/// Rejects relation fields the mapper cannot persist and turns a null
/// attribute under a relation's name into a null relation.
fn check_relation_fields(map: &EntityMap, entity: &mut Entity) -> Result<(), MapperError> {
    for relation in map.relations() {
        match entity.get(relation.name()).cloned() {
            None => {}
            Some(Value::Null) => {
                entity.remove(relation.name());
                entity.clear_relation(relation.name());
            }
            Some(other) => {
                return Err(MapperError::invalid_relation(
                    map.entity_type(),
                    relation.name(),
                    format!("expected a collection, found attribute value {}", other),
                ));
            }
        }
        if entity.get(relation.foreign_key()).is_some() {
            return Err(MapperError::invalid_relation(
                map.entity_type(),
                relation.name(),
                format!(
                    "'{}' is maintained from the relation and cannot be set directly",
                    relation.foreign_key()
                ),
            ));
        }
    }

    let undeclared = entity
        .relation_names()
        .find(|name| map.relation(name).is_none())
        .map(str::to_string);
    if let Some(name) = undeclared {
        return Err(MapperError::invalid_relation(
            map.entity_type(),
            &name,
            "relation is not declared for this entity type",
        ));
    }
    Ok(())
}

/// Document as last stored, rebuilt from a snapshot.
fn stored_form(id: &DocumentId, snapshot: &Snapshot) -> Document {
    let mut document = snapshot.attributes.clone();
    for (field, ids) in &snapshot.foreign_keys {
        document.insert(field.clone(), DocumentId::list_to_value(ids));
    }
    document.insert(ID_FIELD.to_string(), id.into());
    document
}
