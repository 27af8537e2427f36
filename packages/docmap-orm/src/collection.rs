//! Ordered, in-memory collections of entities.

use docmap_store::DocumentId;

use crate::entity::Entity;

/// An ordered list of entities.
///
/// Order is preserved exactly as built, including duplicates. Related
/// collections are loaded in foreign-key order.
#[derive(Debug, Clone, Default)]
pub struct EntityCollection {
    items: Vec<Entity>,
}

impl EntityCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entity.
    pub fn push(&mut self, entity: Entity) {
        self.items.push(entity);
    }

    /// Removes and returns the entity at `index`, if any.
    pub fn remove(&mut self, index: usize) -> Option<Entity> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    /// Returns the number of entities.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the collection holds no entities.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entity> {
        self.items.get_mut(index)
    }

    pub fn first(&self) -> Option<&Entity> {
        self.items.first()
    }

    pub fn first_mut(&mut self) -> Option<&mut Entity> {
        self.items.first_mut()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity> {
        self.items.iter_mut()
    }

    /// Applies `f` to every entity in place.
    pub fn map<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Entity),
    {
        for entity in &mut self.items {
            f(entity);
        }
    }

    /// Returns the identities of entities that have one, in order.
    pub fn ids(&self) -> Vec<DocumentId> {
        self.items.iter().filter_map(|e| e.id().cloned()).collect()
    }

    /// Consumes the collection, returning the entities.
    pub fn into_vec(self) -> Vec<Entity> {
        self.items
    }
}

impl From<Vec<Entity>> for EntityCollection {
    fn from(items: Vec<Entity>) -> Self {
        Self { items }
    }
}

impl FromIterator<Entity> for EntityCollection {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for EntityCollection {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntityCollection {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a mut EntityCollection {
    type Item = &'a mut Entity;
    type IntoIter = std::slice::IterMut<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter_mut()
    }
}
