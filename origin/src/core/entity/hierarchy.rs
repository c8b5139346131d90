//! Hierarchy helpers for computing world poses and re-parenting nodes
//!
//! Re-parenting always keeps the node's world-space pose: the local transform
//! is recomputed against the new parent. This is what lets the origin frame be
//! reset to zero without anything visibly moving.

use super::components::{Parent, Transform};
use super::world::World;
use glam::{Mat4, Vec3};
use hecs::Entity;
use tracing::{error, trace};

/// Deepest parent chain walked before assuming a cycle
const MAX_HIERARCHY_DEPTH: usize = 1024;

/// Errors raised by hierarchy operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("Entity {0:?} has no Transform")]
    MissingTransform(Entity),

    #[error("Parenting {child:?} under {parent:?} would create a cycle")]
    Cycle { child: Entity, parent: Entity },
}

/// Compute the world matrix of an entity by walking its parent chain
///
/// Returns `None` if the entity (or an ancestor) has no `Transform`, or if
/// the chain is cyclic.
pub fn world_matrix(world: &World, entity: Entity) -> Option<Mat4> {
    let mut matrix = world.get::<Transform>(entity).ok()?.to_matrix();
    let mut current = world.get::<Parent>(entity).ok().map(|p| p.0);
    let mut depth = 0;

    while let Some(parent) = current {
        depth += 1;
        if depth > MAX_HIERARCHY_DEPTH {
            error!(entity = ?entity, "Cyclic parent chain detected while computing world matrix");
            return None;
        }
        let parent_matrix = world.get::<Transform>(parent).ok()?.to_matrix();
        matrix = parent_matrix * matrix;
        current = world.get::<Parent>(parent).ok().map(|p| p.0);
    }

    Some(matrix)
}

/// World-space position of an entity
pub fn world_position(world: &World, entity: Entity) -> Option<Vec3> {
    world_matrix(world, entity).map(|m| m.w_axis.truncate())
}

/// Move an entity so its world-space position is `target`
///
/// Rotation and scale are untouched. Fails if the entity or an ancestor has
/// no `Transform`.
pub fn set_world_position(world: &mut World, entity: Entity, target: Vec3) -> Result<(), HierarchyError> {
    let local_target = match world.get::<Parent>(entity).ok().map(|p| p.0) {
        Some(parent) => world_matrix(world, parent)
            .ok_or(HierarchyError::MissingTransform(parent))?
            .inverse()
            .transform_point3(target),
        None => target,
    };

    let transform = world
        .query_one_mut::<&mut Transform>(entity)
        .map_err(|_| HierarchyError::MissingTransform(entity))?;
    transform.position = local_target;
    Ok(())
}

/// Check whether `ancestor` appears in the parent chain of `entity` (or is it)
fn is_self_or_ancestor(world: &World, ancestor: Entity, entity: Entity) -> bool {
    let mut current = Some(entity);
    let mut depth = 0;
    while let Some(e) = current {
        if e == ancestor {
            return true;
        }
        depth += 1;
        if depth > MAX_HIERARCHY_DEPTH {
            return true;
        }
        current = world.get::<Parent>(e).ok().map(|p| p.0);
    }
    false
}

/// Re-parent `child` under `parent` (or make it a root) keeping its world pose
pub fn set_parent_keep_world(
    world: &mut World,
    child: Entity,
    parent: Option<Entity>,
) -> Result<(), HierarchyError> {
    let child_world = world_matrix(world, child).ok_or(HierarchyError::MissingTransform(child))?;

    let local = match parent {
        Some(parent) => {
            if is_self_or_ancestor(world, child, parent) {
                return Err(HierarchyError::Cycle { child, parent });
            }
            let parent_world =
                world_matrix(world, parent).ok_or(HierarchyError::MissingTransform(parent))?;
            // Exact when the parent sits at identity, which is the common case after a reset.
            if parent_world == Mat4::IDENTITY {
                child_world
            } else {
                parent_world.inverse() * child_world
            }
        }
        None => child_world,
    };

    let transform = world
        .query_one_mut::<&mut Transform>(child)
        .map_err(|_| HierarchyError::MissingTransform(child))?;
    // Decomposition of an unchanged matrix is lossy, so only write when it moved.
    if local != transform.to_matrix() {
        *transform = Transform::from_matrix(local);
    }

    match parent {
        Some(parent) => {
            let _ = world.insert_one(child, Parent(parent));
        }
        None => {
            let _ = world.remove_one::<Parent>(child);
        }
    }

    trace!(child = ?child, parent = ?parent, "Re-parented entity");
    Ok(())
}

/// Direct children of an entity
pub fn children_of(world: &World, parent: Entity) -> Vec<Entity> {
    world
        .query::<&Parent>()
        .iter()
        .filter(|(_, p)| p.0 == parent)
        .map(|(entity, _)| entity)
        .collect()
}

/// Detach every direct child of `parent`, keeping their world poses
///
/// Returns the detached children.
pub fn detach_children(world: &mut World, parent: Entity) -> Vec<Entity> {
    let children = children_of(world, parent);
    for &child in &children {
        if let Err(e) = set_parent_keep_world(world, child, None) {
            error!(child = ?child, error = %e, "Failed to detach child");
        }
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn assert_close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-3, "{a:?} != {b:?}");
    }

    #[test]
    fn test_world_position_multi_level() {
        let mut world = World::new();
        let grandparent = world.spawn((Transform::from_position(Vec3::X),));
        let parent = world.spawn((Transform::from_position(Vec3::Y), Parent(grandparent)));
        let child = world.spawn((Transform::from_position(Vec3::Z), Parent(parent)));

        assert_eq!(world_position(&world, child), Some(Vec3::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_set_parent_keeps_world_pose() {
        let mut world = World::new();
        let parent = world.spawn((Transform {
            position: Vec3::new(10.0, 0.0, 0.0),
            rotation: Quat::from_rotation_y(1.0),
            scale: Vec3::ONE,
        },));
        let child = world.spawn((Transform::from_position_rotation(
            Vec3::new(3.0, 4.0, 5.0),
            Quat::from_rotation_x(0.3),
        ),));

        let before = world_matrix(&world, child).unwrap();
        set_parent_keep_world(&mut world, child, Some(parent)).unwrap();
        let after = world_matrix(&world, child).unwrap();

        assert_eq!(world.get::<Parent>(child).unwrap().0, parent);
        assert_close(before.w_axis.truncate(), after.w_axis.truncate());
        let (_, r0, _) = before.to_scale_rotation_translation();
        let (_, r1, _) = after.to_scale_rotation_translation();
        assert!(r0.angle_between(r1) < 1e-3);
    }

    #[test]
    fn test_detach_children_keeps_world_pose() {
        let mut world = World::new();
        let parent = world.spawn((Transform::from_position(Vec3::new(-150.0, 0.0, 0.0)),));
        let a = world.spawn((Transform::from_position(Vec3::new(5.0, 0.0, 0.0)), Parent(parent)));
        let b = world.spawn((Transform::from_position(Vec3::new(0.0, 2.0, 0.0)), Parent(parent)));

        let detached = detach_children(&mut world, parent);
        assert_eq!(detached.len(), 2);

        assert!(world.get::<Parent>(a).is_err());
        assert!(world.get::<Parent>(b).is_err());
        assert_close(world_position(&world, a).unwrap(), Vec3::new(-145.0, 0.0, 0.0));
        assert_close(world_position(&world, b).unwrap(), Vec3::new(-150.0, 2.0, 0.0));
    }

    #[test]
    fn test_reparent_under_identity_is_exact() {
        let mut world = World::new();
        let frame = world.spawn((Transform::default(),));
        let original = Transform::from_position_rotation(
            Vec3::new(123.456, -7.89, 0.001),
            Quat::from_rotation_z(0.77),
        );
        let node = world.spawn((original,));

        set_parent_keep_world(&mut world, node, Some(frame)).unwrap();

        assert_eq!(*world.get::<Transform>(node).unwrap(), original);
    }

    #[test]
    fn test_set_world_position_under_parent() {
        let mut world = World::new();
        let parent = world.spawn((Transform::from_position_rotation(
            Vec3::new(-200.0, 0.0, 0.0),
            Quat::from_rotation_y(0.5),
        ),));
        let child = world.spawn((Transform::default(), Parent(parent)));

        set_world_position(&mut world, child, Vec3::new(10.0, 2.0, -3.0)).unwrap();

        assert_close(world_position(&world, child).unwrap(), Vec3::new(10.0, 2.0, -3.0));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut world = World::new();
        let a = world.spawn((Transform::default(),));
        let b = world.spawn((Transform::default(), Parent(a)));

        let result = set_parent_keep_world(&mut world, a, Some(b));
        assert_eq!(result, Err(HierarchyError::Cycle { child: a, parent: b }));
        assert!(world.get::<Parent>(a).is_err());
    }

    #[test]
    fn test_missing_transform() {
        let mut world = World::new();
        let bare = world.spawn((crate::core::entity::components::Name::new("bare"),));
        let parent = world.spawn((Transform::default(),));

        assert_eq!(
            set_parent_keep_world(&mut world, bare, Some(parent)),
            Err(HierarchyError::MissingTransform(bare))
        );
    }
}
