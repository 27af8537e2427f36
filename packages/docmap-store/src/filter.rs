//! Query filters over documents.

use std::cmp::Ordering;
use std::str::FromStr;

use serde_json::Value;

use crate::document::{Document, DocumentId, ID_FIELD};
use crate::error::StoreError;

/// Comparison operator of a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FromStr for Operator {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::Ne),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            "in" => Ok(Operator::In),
            _ => Err(StoreError::UnknownOperator(s.to_string())),
        }
    }
}

/// A single `field <op> value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Field name
    pub field: String,
    /// Comparison operator
    pub op: Operator,
    /// Value compared against
    pub value: Value,
}

impl Condition {
    /// Returns `true` if the document satisfies this condition.
    ///
    /// Missing fields compare as `null`. When the stored value is an
    /// array, equality matches if any element is equal.
    pub fn matches(&self, document: &Document) -> bool {
        let stored = document.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            Operator::Eq => equals(stored, &self.value),
            Operator::Ne => !equals(stored, &self.value),
            Operator::Gt => compare(stored, &self.value) == Some(Ordering::Greater),
            Operator::Gte => matches!(
                compare(stored, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lt => compare(stored, &self.value) == Some(Ordering::Less),
            Operator::Lte => matches!(
                compare(stored, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::In => match &self.value {
                Value::Array(candidates) => candidates.iter().any(|c| equals(stored, c)),
                _ => false,
            },
        }
    }
}

fn equals(stored: &Value, expected: &Value) -> bool {
    if stored == expected {
        return true;
    }
    match stored {
        Value::Array(items) if !expected.is_array() => items.iter().any(|item| item == expected),
        Value::Number(a) => match (a.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => false,
    }
}

fn compare(stored: &Value, expected: &Value) -> Option<Ordering> {
    match (stored, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Conjunction of conditions plus paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Conditions that must all hold
    pub conditions: Vec<Condition>,
    /// Maximum number of documents to return
    pub limit: Option<usize>,
    /// Number of matching documents to skip
    pub offset: Option<usize>,
}

impl Filter {
    /// Creates a filter matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter matching a single identity.
    pub fn by_id(id: &DocumentId) -> Self {
        Self::new().and(ID_FIELD, Operator::Eq, id)
    }

    /// Creates a filter matching any of the given identities.
    pub fn ids_in(ids: &[DocumentId]) -> Self {
        Self::new().and(ID_FIELD, Operator::In, DocumentId::list_to_value(ids))
    }

    /// Adds a condition.
    pub fn and(mut self, field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Sets the maximum number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of matches to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns `true` if the document satisfies every condition.
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|c| c.matches(document))
    }

    /// Applies the filter to documents in order, honoring offset and limit.
    pub fn apply<'a, I>(&self, documents: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let skip_count = self.offset.unwrap_or(0);
        let take_count = self.limit.unwrap_or(usize::MAX);
        documents
            .into_iter()
            .filter(|doc| self.matches(doc))
            .skip(skip_count)
            .take(take_count)
            .cloned()
            .collect()
    }
}
