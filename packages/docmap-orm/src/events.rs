//! Lifecycle events fired while storing entities.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entity::Entity;

/// Entity lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEvent {
    /// Before any write for the entity
    Storing,
    /// After the entity and its relations were written
    Stored,
    /// Before a new entity is inserted
    Creating,
    /// After a new entity was inserted
    Created,
    /// Before changes to an existing entity are written
    Updating,
    /// After changes were written
    Updated,
}

impl EntityEvent {
    pub const ALL: [EntityEvent; 6] = [
        EntityEvent::Storing,
        EntityEvent::Stored,
        EntityEvent::Creating,
        EntityEvent::Created,
        EntityEvent::Updating,
        EntityEvent::Updated,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityEvent::Storing => "storing",
            EntityEvent::Stored => "stored",
            EntityEvent::Creating => "creating",
            EntityEvent::Created => "created",
            EntityEvent::Updating => "updating",
            EntityEvent::Updated => "updated",
        }
    }
}

impl fmt::Display for EntityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback invoked with the event and the entity it concerns.
pub type Listener = Arc<dyn Fn(EntityEvent, &Entity) + Send + Sync>;

/// Registry of global event listeners.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<HashMap<EntityEvent, Vec<Listener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for one event.
    pub fn listen<F>(&self, event: EntityEvent, listener: F)
    where
        F: Fn(EntityEvent, &Entity) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .entry(event)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Registers a listener for every event.
    pub fn listen_all<F>(&self, listener: F)
    where
        F: Fn(EntityEvent, &Entity) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let mut listeners = self.listeners.write();
        for event in EntityEvent::ALL {
            listeners.entry(event).or_default().push(listener.clone());
        }
    }

    pub fn listener_count(&self, event: EntityEvent) -> usize {
        self.listeners.read().get(&event).map_or(0, Vec::len)
    }

    /// Calls every listener of `event` in registration order.
    ///
    /// Listeners run outside the registry lock, so they may register
    /// further listeners.
    pub fn dispatch(&self, event: EntityEvent, entity: &Entity) {
        let listeners: Vec<Listener> = match self.listeners.read().get(&event) {
            Some(listeners) => listeners.clone(),
            None => return,
        };
        for listener in listeners {
            listener(event, entity);
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read();
        let counts: HashMap<&str, usize> = listeners
            .iter()
            .map(|(event, list)| (event.name(), list.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}
