//! Per-type mapping metadata.

use std::collections::HashSet;
use std::sync::Arc;

use docmap_store::ID_FIELD;

use crate::collection::EntityCollection;
use crate::entity::Entity;
use crate::error::MapperError;
use crate::relation::RelationDescriptor;

/// Maps an entity type to its collection and declares its relations.
///
/// ```
/// use docmap_orm::EntityMap;
///
/// let users = EntityMap::new("User", "users").belongs_to_many("roles", "Role", "role_ids");
/// assert_eq!(users.relation("roles").unwrap().foreign_key(), "role_ids");
/// ```
#[derive(Debug, Clone)]
pub struct EntityMap {
    entity_type: String,
    collection: String,
    relations: Vec<Arc<RelationDescriptor>>,
}

impl EntityMap {
    pub fn new(entity_type: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            collection: collection.into(),
            relations: Vec::new(),
        }
    }

    /// Map used for unregistered types outside strict mode: the
    /// collection is the lowercased type name plus `s`, with no relations.
    pub fn default_for(entity_type: &str) -> Self {
        Self::new(entity_type, format!("{}s", entity_type.to_lowercase()))
    }

    /// Declares a belongs-to-many relation.
    pub fn belongs_to_many(
        mut self,
        name: impl Into<String>,
        related_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        let descriptor =
            RelationDescriptor::belongs_to_many(&self.entity_type, name, related_type, foreign_key);
        self.relations.push(Arc::new(descriptor));
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Name of the collection holding this type's documents.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Declared relations, in declaration order.
    pub fn relations(&self) -> &[Arc<RelationDescriptor>] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&Arc<RelationDescriptor>> {
        self.relations.iter().find(|r| r.name() == name)
    }

    /// Returns `true` if `field` holds a declared relation's keys.
    pub fn is_foreign_key(&self, field: &str) -> bool {
        self.relations.iter().any(|r| r.foreign_key() == field)
    }

    /// Creates a new entity of this type with every relation set to an
    /// empty collection.
    pub fn new_entity(&self) -> Entity {
        let mut entity = Entity::new(&self.entity_type);
        for relation in &self.relations {
            entity.set_related(relation.name(), EntityCollection::new());
        }
        entity
    }

    /// Checks the map on its own and against the set of known entity
    /// types.
    pub(crate) fn validate(&self, is_known_type: &dyn Fn(&str) -> bool) -> Result<(), MapperError> {
        if self.entity_type.is_empty() {
            return Err(MapperError::misconfigured(
                "<unnamed>",
                "entity type must not be empty",
            ));
        }
        if self.collection.is_empty() || self.collection.chars().any(char::is_whitespace) {
            return Err(MapperError::misconfigured(
                &self.entity_type,
                format!("invalid collection name '{}'", self.collection),
            ));
        }

        let mut fields: HashSet<&str> = HashSet::new();
        fields.insert(ID_FIELD);
        for relation in &self.relations {
            relation.validate()?;
            for field in [relation.name(), relation.foreign_key()] {
                if !fields.insert(field) {
                    return Err(MapperError::misconfigured(
                        &self.entity_type,
                        format!(
                            "field '{}' of relation '{}' is already in use",
                            field,
                            relation.name()
                        ),
                    ));
                }
            }
            if relation.related_type() != self.entity_type && !is_known_type(relation.related_type())
            {
                return Err(MapperError::misconfigured(
                    &self.entity_type,
                    format!(
                        "relation '{}' targets unregistered type '{}'",
                        relation.name(),
                        relation.related_type()
                    ),
                ));
            }
        }
        Ok(())
    }
}
