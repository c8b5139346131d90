//! World wrapper providing helper methods for entity management

use super::components::{Anchor, Name, OriginFrame, Parent, Transform};
use hecs::Entity;
use tracing::debug;

/// Wrapper around hecs::World providing additional helper methods
pub struct World {
    inner: hecs::World,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create a new empty world
    pub fn new() -> Self {
        Self {
            inner: hecs::World::new(),
        }
    }

    /// Spawn a new entity with the given components
    pub fn spawn(&mut self, components: impl hecs::DynamicBundle) -> Entity {
        self.inner.spawn(components)
    }

    /// Get a reference to a component on an entity
    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<'_, T>, hecs::ComponentError> {
        self.inner.get::<&T>(entity)
    }

    /// Query a single entity for a mutable component reference
    pub fn query_one_mut<Q: hecs::Query>(
        &mut self,
        entity: Entity,
    ) -> Result<Q::Item<'_>, hecs::QueryOneError> {
        self.inner.query_one_mut::<Q>(entity)
    }

    /// Insert a component into an entity
    pub fn insert_one(
        &mut self,
        entity: Entity,
        component: impl hecs::Component,
    ) -> Result<(), hecs::NoSuchEntity> {
        self.inner.insert_one(entity, component)
    }

    /// Remove a component from an entity
    pub fn remove_one<T: hecs::Component>(
        &mut self,
        entity: Entity,
    ) -> Result<T, hecs::ComponentError> {
        self.inner.remove_one::<T>(entity)
    }

    /// Query entities with specific components
    pub fn query<Q: hecs::Query>(&self) -> hecs::QueryBorrow<'_, Q> {
        self.inner.query()
    }

    /// Despawn an entity and all its components
    pub fn despawn(&mut self, entity: Entity) -> Result<(), hecs::NoSuchEntity> {
        self.inner.despawn(entity)
    }

    /// Check if an entity exists
    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.contains(entity)
    }

    /// Spawn an entity, adding a default `Transform` if the bundle lacks one
    pub fn spawn_with_transform(&mut self, components: impl hecs::DynamicBundle) -> Entity {
        let entity = self.spawn(components);

        if self.get::<Transform>(entity).is_err() {
            let _ = self.insert_one(entity, Transform::default());
            debug!(entity = ?entity, "Auto-added Transform component");
        }

        entity
    }

    /// Spawn the origin frame with an anchor as its first child
    ///
    /// Returns `(frame, anchor)`. Both start at the origin.
    pub fn spawn_origin_rig(&mut self) -> (Entity, Entity) {
        let frame = self.spawn_with_transform((OriginFrame, Name::new("OriginFrame")));
        let anchor = self.spawn_with_transform((
            Anchor,
            Name::new("Anchor"),
            Parent(frame),
        ));
        debug!(frame = ?frame, anchor = ?anchor, "Spawned origin rig");
        (frame, anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_world_spawn() {
        let mut world = World::new();
        let entity = world.spawn((Transform::default(),));
        assert!(world.contains(entity));
    }

    #[test]
    fn test_spawn_with_transform() {
        let mut world = World::new();
        let entity = world.spawn_with_transform(());

        assert!(world.get::<Transform>(entity).is_ok());
    }

    #[test]
    fn test_spawn_with_transform_existing() {
        let mut world = World::new();

        let custom_transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let entity = world.spawn_with_transform((custom_transform,));

        let transform = world.get::<Transform>(entity).unwrap();
        assert_eq!(transform.position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_spawn_origin_rig() {
        let mut world = World::new();
        let (frame, anchor) = world.spawn_origin_rig();

        assert!(world.get::<OriginFrame>(frame).is_ok());
        assert!(world.get::<Anchor>(anchor).is_ok());
        assert_eq!(world.get::<Parent>(anchor).unwrap().0, frame);
    }

    #[test]
    fn test_remove_one() {
        let mut world = World::new();
        let parent = world.spawn((Transform::default(),));
        let child = world.spawn((Transform::default(), Parent(parent)));

        let removed = world.remove_one::<Parent>(child).unwrap();
        assert_eq!(removed.0, parent);
        assert!(world.get::<Parent>(child).is_err());
    }
}
