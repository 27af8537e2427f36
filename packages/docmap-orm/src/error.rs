//! Mapper error types.

use docmap_store::StoreError;
use thiserror::Error;

/// Mapper operation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapperError {
    /// No document with the given identity
    #[error("{entity_type} '{id}' not found")]
    NotFound { entity_type: String, id: String },

    /// A relation field holds something the mapper cannot persist
    #[error("Invalid state for relation '{relation}' on {entity_type}: {reason}")]
    InvalidRelationState {
        entity_type: String,
        relation: String,
        reason: String,
    },

    /// The document store could not be reached
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// An entity map failed validation at registration
    #[error("Misconfigured entity map for {entity_type}: {reason}")]
    Misconfigured { entity_type: String, reason: String },

    /// Strict mode and no entity map registered for the type
    #[error("No entity map registered for '{0}'")]
    UnmappedEntity(String),

    /// Entity handed to a mapper of another type
    #[error("Mapper for {expected} cannot handle {actual} entities")]
    WrongEntityType { expected: String, actual: String },

    /// Relation name not declared by the entity map
    #[error("Unknown relation '{relation}' on {entity_type}")]
    UnknownRelation {
        entity_type: String,
        relation: String,
    },

    /// Query could not be built
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// No factory definition for the entity type
    #[error("No factory definition for '{0}'")]
    UndefinedFactory(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A lazy relation was accessed after its session ended
    #[error("Session closed before relation could be loaded")]
    SessionClosed,

    /// Any other store failure
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for MapperError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => MapperError::StoreUnavailable(msg),
            StoreError::UnknownOperator(op) => {
                MapperError::InvalidQuery(format!("unknown operator '{}'", op))
            }
            StoreError::ConfigError(msg) => MapperError::Config(msg),
            other => MapperError::Store(other),
        }
    }
}

impl MapperError {
    /// Returns `true` for a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MapperError::NotFound { .. })
    }

    pub(crate) fn invalid_relation(
        entity_type: &str,
        relation: &str,
        reason: impl Into<String>,
    ) -> Self {
        MapperError::InvalidRelationState {
            entity_type: entity_type.to_string(),
            relation: relation.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn misconfigured(entity_type: &str, reason: impl Into<String>) -> Self {
        MapperError::Misconfigured {
            entity_type: entity_type.to_string(),
            reason: reason.into(),
        }
    }
}
