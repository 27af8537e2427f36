//! Shared fixtures for the integration suite.

use std::sync::Arc;

use docmap_orm::{Attributes, Entity, EntityMap, Factory, Mapper, Session};
use docmap_store::{Database, DocumentStore, Filter, Operator, StoreConfig};
use serde_json::Value;

pub const TEST_DATABASE: &str = "docmap_orm_test";

/// Entity maps used across the suite.
pub fn entity_maps() -> Vec<EntityMap> {
    vec![
        EntityMap::new("User", "users").belongs_to_many("roles", "Role", "role_ids"),
        EntityMap::new("Role", "roles"),
    ]
}

/// A strict-mode session over a fresh in-memory database, with factory
/// definitions for users and roles. The database is dropped on teardown.
pub struct TestContext {
    pub db: Arc<Database>,
    pub session: Session,
    pub factory: Factory,
}

impl TestContext {
    pub fn new() -> Self {
        let db = Arc::new(Database::new(StoreConfig::for_database(TEST_DATABASE)));
        let mut builder = Session::builder(db.clone()).strict_mode(true);
        for map in entity_maps() {
            builder = builder.register(map);
        }
        let session = builder.build().expect("test entity maps are valid");
        session.log_events();

        let mut factory = Factory::new(session.clone());
        factory
            .define("User", |faker| {
                attributes(&[("email", faker.email().into()), ("name", faker.name().into())])
            })
            .define("Role", |faker| attributes(&[("name", faker.word().into())]));

        Self {
            db,
            session,
            factory,
        }
    }

    pub fn mapper(&self, entity_type: &str) -> Mapper {
        self.session
            .mapper(entity_type)
            .expect("entity type is registered")
    }

    /// Builds an unsaved entity from the factory definition.
    pub fn make(&self, entity_type: &str) -> Entity {
        self.factory
            .make(entity_type, Attributes::new())
            .expect("factory definition exists")
    }

    /// Asserts that a document in `collection` has every field of
    /// `expected` with exactly that value.
    pub fn see_in_database(&self, collection: &str, expected: Value) {
        assert!(
            self.count_in_database(collection, &expected) > 0,
            "no document in '{}' matches {}",
            collection,
            expected
        );
    }

    pub fn dont_see_in_database(&self, collection: &str, expected: Value) {
        assert_eq!(
            self.count_in_database(collection, &expected),
            0,
            "unexpected document in '{}' matching {}",
            collection,
            expected
        );
    }

    fn count_in_database(&self, collection: &str, expected: &Value) -> usize {
        let fields = expected.as_object().expect("expected fields as an object");
        let filter = fields.iter().fold(Filter::new(), |filter, (field, value)| {
            filter.and(field.as_str(), Operator::Eq, value.clone())
        });
        self.db
            .find(collection, &filter)
            .expect("store is reachable")
            .into_iter()
            .filter(|document| {
                // Eq matches array membership; require the exact value.
                fields.iter().all(|(field, value)| document.get(field) == Some(value))
            })
            .count()
    }

    /// Number of read queries since the last reset.
    pub fn reads(&self) -> u64 {
        self.db.stats().reads
    }

    pub fn writes(&self) -> u64 {
        self.db.stats().writes()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.db.reconnect();
        if let Err(e) = self.db.drop_database() {
            eprintln!("Failed to drop test database: {}", e);
        }
    }
}

/// Builds an attribute map from pairs.
pub fn attributes(pairs: &[(&str, Value)]) -> Attributes {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}
