//! Document and identity types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Name of the identity field carried by every stored document.
pub const ID_FIELD: &str = "_id";

/// A stored document: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Identity of a stored document.
///
/// Serialized as a plain string so it can be embedded in foreign-key
/// arrays and compared against query values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generates a fresh random identity.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads an identity out of a JSON value.
    ///
    /// Strings are taken as-is; integers are accepted so callers can
    /// supply numeric ids the way fixture factories do.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// Returns the `_id` of a document, if it has a usable one.
    pub fn of(document: &Document) -> Option<Self> {
        document.get(ID_FIELD).and_then(Self::from_value)
    }

    /// Reads a foreign-key array into identities.
    ///
    /// A missing or `null` field yields an empty list. Non-array values
    /// are rejected.
    pub fn list_from_value(value: Option<&Value>) -> Result<Vec<Self>, StoreError> {
        match value {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    Self::from_value(item).ok_or_else(|| {
                        StoreError::InvalidDocument(format!("'{}' is not a valid identity", item))
                    })
                })
                .collect(),
            Some(other) => Err(StoreError::InvalidDocument(format!(
                "expected an array of identities, got {}",
                other
            ))),
        }
    }

    /// Builds the JSON array form of a list of identities.
    pub fn list_to_value(ids: &[DocumentId]) -> Value {
        Value::Array(ids.iter().map(Value::from).collect())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<DocumentId> for Value {
    fn from(id: DocumentId) -> Self {
        Value::String(id.0)
    }
}

impl From<&DocumentId> for Value {
    fn from(id: &DocumentId) -> Self {
        Value::String(id.0.clone())
    }
}
