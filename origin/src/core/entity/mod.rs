//! Scene graph functionality
//!
//! A thin layer over hecs providing transforms, parenting and the marker
//! components the floating origin looks for.

pub mod components;
pub mod hierarchy;
pub mod world;

pub use components::{Anchor, Name, OriginFrame, Parent, Transform};
pub use hierarchy::{
    children_of, detach_children, set_parent_keep_world, set_world_position, world_matrix,
    world_position, HierarchyError,
};
pub use world::World;

// Re-export hecs types that users will need
pub use hecs::Entity;
