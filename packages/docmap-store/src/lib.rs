//! Document store backing the docmap mapper.
//!
//! Provides named collections of JSON documents with copy-on-write
//! snapshots, simple filter queries, optional on-disk snapshots, and
//! connection configuration.

pub mod collection;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod filter;
pub mod persistence;
pub mod store;

pub use config::StoreConfig;
pub use database::{Database, StoreStats};
pub use document::{Document, DocumentId, ID_FIELD};
pub use error::StoreError;
pub use filter::{Condition, Filter, Operator};
pub use store::DocumentStore;
