//! Data-mapper over a document store.
//!
//! Entities are plain attribute bags mapped to collections by an
//! [`EntityMap`]. Belongs-to-many relations are stored on the owning
//! document as an array of related identities and loaded either eagerly
//! with [`Query::with`] or lazily through a [`LazyCollectionProxy`].
//!
//! ```
//! use std::sync::Arc;
//! use docmap_orm::{EntityMap, Session};
//! use docmap_store::{Database, StoreConfig};
//!
//! let db = Arc::new(Database::new(StoreConfig::for_database("doc_example")));
//! let session = Session::builder(db)
//!     .register(EntityMap::new("User", "users").belongs_to_many("roles", "Role", "role_ids"))
//!     .register(EntityMap::new("Role", "roles"))
//!     .build()
//!     .unwrap();
//!
//! let mut role = session.make("Role").unwrap();
//! role.set("name", "Admin");
//! let mut user = session.make("User").unwrap();
//! user.set("email", "admin@example.com");
//! user.related_mut("roles").unwrap().push(role);
//! session.store(&mut user).unwrap();
//!
//! let users = session.mapper("User").unwrap();
//! let mut found = users.find(user.id().unwrap()).unwrap();
//! assert_eq!(found.related_mut("roles").unwrap().len(), 1);
//! ```

pub mod collection;
pub mod config;
pub mod entity;
pub mod entity_map;
pub mod error;
pub mod events;
pub mod factory;
pub mod identity_map;
pub mod mapper;
pub mod proxy;
pub mod query;
pub mod relation;
pub mod session;
mod unit_of_work;

pub use collection::EntityCollection;
pub use config::{DocmapConfig, MapperConfig};
pub use entity::{Attributes, Entity};
pub use entity_map::EntityMap;
pub use error::MapperError;
pub use events::{EntityEvent, EventDispatcher};
pub use factory::{Factory, Faker};
pub use identity_map::IdentityMap;
pub use mapper::Mapper;
pub use proxy::LazyCollectionProxy;
pub use query::Query;
pub use relation::{RelationDescriptor, RelationField};
pub use session::{Session, SessionBuilder};
