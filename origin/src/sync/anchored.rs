//! Replication of a single placed object, relative to the anchor
//!
//! Used for things one participant places in the world for everyone else,
//! such as a portal. The owner publishes the object's offset from its own
//! anchor and every receiver puts it at the same offset from theirs.

use super::entity_sync::SyncRole;
use super::SyncError;
use crate::core::coordinates::OriginListener;
use crate::core::entity::hierarchy::{set_parent_keep_world, set_world_position, world_position};
use crate::core::entity::{Anchor, Entity, Parent, World};
use crate::player::PlayerId;
use glam::Vec3;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct AnchoredObjectSync {
    entity: Entity,
    owner: PlayerId,
    role: SyncRole,
    /// Object position relative to the anchor
    synced_position: Vec3,
    anchor_position: Vec3,
}

impl AnchoredObjectSync {
    pub fn new(entity: Entity, owner: PlayerId, role: SyncRole) -> Self {
        Self {
            entity,
            owner,
            role,
            synced_position: Vec3::ZERO,
            anchor_position: Vec3::ZERO,
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn synced_position(&self) -> Vec3 {
        self.synced_position
    }

    /// Owner side: read the object's position into the replicated field
    pub fn capture(&mut self, world: &World) -> Option<Vec3> {
        if self.role != SyncRole::LocallyOwned {
            return None;
        }
        let position = world_position(world, self.entity)?;
        self.synced_position = position - self.anchor_position;
        Some(self.synced_position)
    }

    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        Ok(serde_json::to_vec(&self.synced_position)?)
    }

    /// Receiver side: decode a payload and place the object
    ///
    /// Malformed payloads are logged and dropped.
    pub fn receive_payload(&mut self, world: &mut World, payload: &[u8]) -> bool {
        let decoded = serde_json::from_slice::<Vec3>(payload)
            .map_err(SyncError::from)
            .and_then(|p| if p.is_finite() { Ok(p) } else { Err(SyncError::NonFinitePosition) });

        match decoded {
            Ok(position) => {
                self.synced_position = position;
                self.apply(world)
            }
            Err(e) => {
                warn!(entity = ?self.entity, error = %e, "Dropping malformed object update");
                false
            }
        }
    }

    /// Receiver side: move the object to the synced offset from the local anchor
    ///
    /// The object is parented under the anchor so later local shifts carry it.
    pub fn apply(&self, world: &mut World) -> bool {
        if self.role != SyncRole::RemoteObserved {
            return false;
        }
        if let Err(e) = set_world_position(world, self.entity, self.synced_position + self.anchor_position) {
            debug!(entity = ?self.entity, error = %e, "Cannot place anchored object");
            return false;
        }
        self.attach_to_anchor(world);
        true
    }

    fn attach_to_anchor(&self, world: &mut World) {
        let anchor = world.query::<&Anchor>().iter().map(|(entity, _)| entity).next();
        let Some(anchor) = anchor else {
            debug!(entity = ?self.entity, "No anchor in world, object left unparented");
            return;
        };
        if world.get::<Parent>(self.entity).is_ok_and(|parent| parent.0 == anchor) {
            return;
        }
        if let Err(e) = set_parent_keep_world(world, self.entity, Some(anchor)) {
            warn!(entity = ?self.entity, error = %e, "Failed to attach object to anchor");
        }
    }
}

impl OriginListener for AnchoredObjectSync {
    fn on_origin_shifted(&mut self, anchor_position: Vec3) {
        self.anchor_position = anchor_position;
    }
}
