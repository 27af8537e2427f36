//! Integration test suite for the mapper.
//!
//! 1. Belongs-to-many relation scenarios
//! 2. Mapper properties: idempotence, ordering, query counts, errors
//! 3. Sessions over snapshot-backed stores
//! 4. Property tests for key arrays

pub mod belongs_to_many;
pub mod helpers;
pub mod mapper_properties;
pub mod persistence_tests;
pub mod relation_properties;
