//! Test-data factories.
//!
//! A [`Factory`] holds one attribute definition per entity type and
//! builds entities from it, optionally storing them. Definitions receive
//! a [`Faker`] for random values.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::collection::EntityCollection;
use crate::entity::{Attributes, Entity};
use crate::error::MapperError;
use crate::session::Session;

/// Attribute name that `make_uid` fills with a unique integer.
pub const UID_FIELD: &str = "id";

/// Largest value handed out by `make_uid`.
const MAX_UID: u64 = 10_000_000;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Dennis", "Edsger", "Grace", "Ken", "Linus", "Margaret", "Niklaus",
];
const LAST_NAMES: &[&str] = &[
    "Hopper", "Kernighan", "Knuth", "Lamport", "Liskov", "Lovelace", "Ritchie", "Thompson",
    "Torvalds", "Wirth",
];
const WORDS: &[&str] = &[
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliet",
    "kilo", "lima", "mike", "november", "oscar", "papa",
];
const DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];

/// Random value generator for factory definitions.
#[derive(Debug)]
pub struct Faker {
    rng: StdRng,
}

impl Faker {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a faker that produces the same sequence on every run.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick(&mut self, items: &[&'static str]) -> &'static str {
        items.choose(&mut self.rng).copied().unwrap_or_default()
    }

    pub fn first_name(&mut self) -> String {
        self.pick(FIRST_NAMES).to_string()
    }

    pub fn name(&mut self) -> String {
        format!("{} {}", self.pick(FIRST_NAMES), self.pick(LAST_NAMES))
    }

    pub fn word(&mut self) -> String {
        self.pick(WORDS).to_string()
    }

    /// Space separated words, capitalized, ending in a period.
    pub fn sentence(&mut self, words: usize) -> String {
        let mut text = (0..words.max(1))
            .map(|_| self.pick(WORDS))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(first) = text.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        text.push('.');
        text
    }

    pub fn email(&mut self) -> String {
        let number: u32 = self.rng.gen_range(1..10_000);
        format!(
            "{}.{}{}@{}",
            self.pick(FIRST_NAMES).to_lowercase(),
            self.pick(LAST_NAMES).to_lowercase(),
            number,
            self.pick(DOMAINS)
        )
    }

    /// Uniform integer in `min..=max`.
    pub fn number_between(&mut self, min: i64, max: i64) -> i64 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    pub fn boolean(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }
}

impl Default for Faker {
    fn default() -> Self {
        Self::new()
    }
}

type Definition = Box<dyn Fn(&mut Faker) -> Attributes + Send + Sync>;

/// Builds entities from per-type definitions.
pub struct Factory {
    session: Session,
    definitions: HashMap<String, Definition>,
    faker: Mutex<Faker>,
    used_uids: Mutex<HashSet<u64>>,
}

impl Factory {
    pub fn new(session: Session) -> Self {
        Self::with_faker(session, Faker::new())
    }

    pub fn with_faker(session: Session, faker: Faker) -> Self {
        Self {
            session,
            definitions: HashMap::new(),
            faker: Mutex::new(faker),
            used_uids: Mutex::new(HashSet::new()),
        }
    }

    /// Sets the attribute definition for an entity type.
    pub fn define<F>(&mut self, entity_type: impl Into<String>, definition: F) -> &mut Self
    where
        F: Fn(&mut Faker) -> Attributes + Send + Sync + 'static,
    {
        self.definitions
            .insert(entity_type.into(), Box::new(definition));
        self
    }

    pub fn is_defined(&self, entity_type: &str) -> bool {
        self.definitions.contains_key(entity_type)
    }

    /// Builds an unsaved entity from the definition, then applies
    /// `overrides`.
    pub fn make(&self, entity_type: &str, overrides: Attributes) -> Result<Entity, MapperError> {
        let definition = self
            .definitions
            .get(entity_type)
            .ok_or_else(|| MapperError::UndefinedFactory(entity_type.to_string()))?;
        let attributes = {
            let mut faker = self.faker.lock();
            definition(&mut *faker)
        };

        let mut entity = self.session.make(entity_type)?;
        entity.fill(attributes);
        entity.fill(overrides);
        Ok(entity)
    }

    /// Like [`make`](Self::make), also setting the `id` attribute to an
    /// integer this factory has not handed out before.
    pub fn make_uid(&self, entity_type: &str, overrides: Attributes) -> Result<Entity, MapperError> {
        let mut entity = self.make(entity_type, overrides)?;
        entity.set(UID_FIELD, self.next_uid());
        Ok(entity)
    }

    /// Builds `count` unsaved entities.
    pub fn make_many(
        &self,
        entity_type: &str,
        count: usize,
        overrides: Attributes,
    ) -> Result<EntityCollection, MapperError> {
        (0..count)
            .map(|_| self.make(entity_type, overrides.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map(EntityCollection::from)
    }

    /// Builds an entity and stores it.
    pub fn create(&self, entity_type: &str, overrides: Attributes) -> Result<Entity, MapperError> {
        let mut entity = self.make(entity_type, overrides)?;
        self.session.store(&mut entity)?;
        Ok(entity)
    }

    /// Builds an entity with a unique `id` attribute and stores it.
    pub fn create_uid(
        &self,
        entity_type: &str,
        overrides: Attributes,
    ) -> Result<Entity, MapperError> {
        let mut entity = self.make_uid(entity_type, overrides)?;
        self.session.store(&mut entity)?;
        Ok(entity)
    }

    fn next_uid(&self) -> u64 {
        let mut used = self.used_uids.lock();
        let mut faker = self.faker.lock();
        loop {
            let candidate = faker.rng.gen_range(1..=MAX_UID);
            if used.insert(candidate) {
                return candidate;
            }
        }
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&String> = self.definitions.keys().collect();
        types.sort();
        f.debug_struct("Factory")
            .field("definitions", &types)
            .field("used_uids", &self.used_uids.lock().len())
            .finish()
    }
}
