//! Scene nodes that must be re-parented under the origin frame on every shift

use hecs::Entity;
use tracing::trace;

/// Identity set of entities registered at runtime
#[derive(Debug, Clone, Default)]
pub struct TrackedObjects {
    entities: Vec<Entity>,
}

impl TrackedObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `entity`; returns false if it was already tracked
    pub fn register(&mut self, entity: Entity) -> bool {
        if self.entities.contains(&entity) {
            return false;
        }
        self.entities.push(entity);
        trace!(entity = ?entity, count = self.entities.len(), "Registered dynamic object");
        true
    }

    /// Stop tracking `entity`; returns false if it was not tracked
    pub fn unregister(&mut self, entity: Entity) -> bool {
        match self.entities.iter().position(|e| *e == entity) {
            Some(index) => {
                self.entities.swap_remove(index);
                trace!(entity = ?entity, count = self.entities.len(), "Unregistered dynamic object");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().copied()
    }
}
