//! Query builder returned by [`Mapper::query`](crate::Mapper::query).

use docmap_store::{Filter, Operator};
use serde_json::Value;

use crate::collection::EntityCollection;
use crate::entity::Entity;
use crate::error::MapperError;
use crate::mapper::Mapper;

/// Conditions, paging, and eager-loaded relations for one query.
///
/// Building never fails; an invalid operator or unknown relation is
/// reported when the query runs.
#[derive(Debug, Clone)]
pub struct Query {
    mapper: Mapper,
    filter: Filter,
    eager: Vec<String>,
    error: Option<MapperError>,
}

impl Query {
    pub(crate) fn new(mapper: Mapper) -> Self {
        Self {
            mapper,
            filter: Filter::new(),
            eager: Vec::new(),
            error: None,
        }
    }

    /// Loads the named relation for every result with one extra query.
    pub fn with(mut self, relation: &str) -> Self {
        if !self.eager.iter().any(|r| r == relation) {
            self.eager.push(relation.to_string());
        }
        self
    }

    /// Adds a `field <op> value` condition.
    ///
    /// Supported operators are `=`, `!=` (or `<>`), `>`, `>=`, `<`, `<=`
    /// and `in`.
    pub fn where_(mut self, field: impl Into<String>, op: &str, value: impl Into<Value>) -> Self {
        match op.parse::<Operator>() {
            Ok(op) => self.filter = self.filter.and(field, op, value),
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e.into());
                }
            }
        }
        self
    }

    /// Adds a condition with an already parsed operator.
    pub fn where_op(mut self, field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.filter = self.filter.and(field, op, value);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.filter = self.filter.limit(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.filter = self.filter.offset(offset);
        self
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Runs the query.
    ///
    /// # Returns
    /// Matching entities in store order, with eager relations loaded and
    /// every other relation left as a proxy.
    pub fn get(self) -> Result<EntityCollection, MapperError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let map = self.mapper.entity_map();
        if let Some(unknown) = self.eager.iter().find(|r| map.relation(r).is_none()) {
            return Err(MapperError::UnknownRelation {
                entity_type: map.entity_type().to_string(),
                relation: unknown.clone(),
            });
        }

        let documents = self.mapper.fetch(&self.filter)?;
        let mut entities = documents
            .into_iter()
            .map(|document| self.mapper.hydrate(document))
            .collect::<Result<Vec<Entity>, MapperError>>()?;

        for relation in &self.eager {
            self.mapper.eager_load(&mut entities, relation)?;
        }
        Ok(entities.into())
    }

    /// Runs the query and returns the first match, if any.
    pub fn first(mut self) -> Result<Option<Entity>, MapperError> {
        self.filter = self.filter.limit(1);
        Ok(self.get()?.into_iter().next())
    }
}
