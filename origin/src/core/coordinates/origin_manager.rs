//! Origin management for large multiplayer worlds
//!
//! Keeps the local player near (0,0,0) by periodically moving the whole world
//! under them. Every shift translates the origin frame, relocates the player,
//! then re-parents the tracked scene so that no node is left holding a large
//! local position. Remote participants never see the shift directly; they only
//! see anchor-relative poses, so each participant can shift independently.

use super::listeners::{ListenerRegistry, SharedListener};
use super::render_params::GlobalRenderParams;
use super::tracked::TrackedObjects;
use crate::config::OriginConfig;
use crate::core::entity::hierarchy::{
    children_of, detach_children, set_parent_keep_world, world_position,
};
use crate::core::entity::{Anchor, Entity, OriginFrame, Transform, World};
use crate::error::OriginError;
use crate::player::{PlayerApi, PlayerId};
use glam::{DVec3, Vec3};
use tracing::{debug, error, info, trace, warn};

/// Coordinates origin shifts for one world
///
/// Exactly one may exist per world; [`OriginManager::from_world`] refuses to
/// build a second coordinate authority.
#[derive(Debug)]
pub struct OriginManager {
    distance_threshold: f32,
    check_interval: f32,
    history_limit: usize,
    frame: Entity,
    anchor: Entity,
    /// Children of the frame at construction time
    root_objects: Vec<Entity>,
    dynamic_objects: TrackedObjects,
    listeners: ListenerRegistry,
    /// The local player is in a seat owned by another system
    in_external_authority: bool,
    local_player: Option<PlayerId>,
    distance_check_loop_started: bool,
    render_params: GlobalRenderParams,
    /// Sum of every shift, in absolute (session start) coordinates
    total_origin_offset: DVec3,
    shifts_performed: usize,
    origin_shift_history: Vec<OriginShift>,
}

/// Record of an origin shift operation
#[derive(Debug, Clone)]
pub struct OriginShift {
    /// Wall time when the shift occurred
    pub timestamp: std::time::Instant,
    /// Translation applied to the world
    pub delta: Vec3,
    /// Anchor position after the shift
    pub anchor_position: Vec3,
    /// Whether the local player was moved along with the world
    pub relocated_player: bool,
}

impl OriginManager {
    /// Validate the world and build the manager
    ///
    /// The world must hold exactly one [`OriginFrame`] and one [`Anchor`].
    /// The frame's current children become the root objects that are
    /// re-parented on every shift.
    pub fn from_world(world: &World, config: &OriginConfig) -> Result<Self, OriginError> {
        let frames: Vec<Entity> = world
            .query::<&OriginFrame>()
            .iter()
            .map(|(entity, _)| entity)
            .collect();
        let frame = match frames.as_slice() {
            [] => {
                error!("No origin frame present, floating origin disabled");
                return Err(OriginError::MissingFrame);
            }
            [frame] => *frame,
            _ => {
                error!(count = frames.len(), "Multiple origin frames present");
                return Err(OriginError::MultipleCoordinators(frames.len()));
            }
        };

        let anchors: Vec<Entity> = world
            .query::<&Anchor>()
            .iter()
            .map(|(entity, _)| entity)
            .collect();
        let anchor = match anchors.as_slice() {
            [] => {
                error!("No anchor present, floating origin disabled");
                return Err(OriginError::MissingAnchor);
            }
            [anchor] => *anchor,
            _ => {
                error!(count = anchors.len(), "Multiple anchors present");
                return Err(OriginError::MultipleAnchors(anchors.len()));
            }
        };

        if world.get::<Transform>(frame).is_err() {
            error!(frame = ?frame, "Origin frame has no Transform");
            return Err(OriginError::MissingFrame);
        }
        let anchor_position = world_position(world, anchor).ok_or_else(|| {
            error!(anchor = ?anchor, "Anchor has no Transform");
            OriginError::MissingAnchor
        })?;

        let config = config.clone().sanitized();
        let root_objects = children_of(world, frame);

        let mut render_params = GlobalRenderParams::new();
        render_params.set_world_offset(anchor_position);

        info!(
            frame = ?frame,
            anchor = ?anchor,
            root_objects = root_objects.len(),
            threshold = config.distance_move_threshold,
            "Origin manager ready"
        );

        Ok(Self {
            distance_threshold: config.distance_move_threshold,
            check_interval: config.check_interval,
            history_limit: config.history_limit.max(2),
            frame,
            anchor,
            root_objects,
            dynamic_objects: TrackedObjects::new(),
            listeners: ListenerRegistry::new(),
            in_external_authority: false,
            local_player: None,
            distance_check_loop_started: false,
            render_params,
            total_origin_offset: DVec3::ZERO,
            shifts_performed: 0,
            origin_shift_history: Vec::new(),
        })
    }

    pub fn frame(&self) -> Entity {
        self.frame
    }

    pub fn anchor(&self) -> Entity {
        self.anchor
    }

    pub fn distance_threshold(&self) -> f32 {
        self.distance_threshold
    }

    /// Set the distance threshold, clamped to `>= 0`
    pub fn set_distance_threshold(&mut self, threshold: f32) {
        debug!("Setting origin shift threshold to: {}", threshold);
        self.distance_threshold = if threshold >= 0.0 { threshold } else { 0.0 };
    }

    pub fn check_interval(&self) -> f32 {
        self.check_interval
    }

    pub fn in_external_authority(&self) -> bool {
        self.in_external_authority
    }

    pub fn local_player(&self) -> Option<PlayerId> {
        self.local_player
    }

    pub fn render_params(&self) -> &GlobalRenderParams {
        &self.render_params
    }

    /// Current anchor position, falling back to the last published offset
    pub fn anchor_position(&self, world: &World) -> Vec3 {
        world_position(world, self.anchor).unwrap_or_else(|| self.render_params.world_offset())
    }

    /// Record the local player's seat as the local authority
    ///
    /// Returns true the first time, when the caller should start the distance
    /// check loop.
    pub fn register_local_seat(&mut self, player: PlayerId) -> bool {
        self.local_player = Some(player);
        info!(player = %player, "Local seat registered");
        self.start_distance_check_loop()
    }

    fn start_distance_check_loop(&mut self) -> bool {
        if self.distance_check_loop_started {
            return false;
        }
        self.distance_check_loop_started = true;
        true
    }

    pub fn distance_check_loop_started(&self) -> bool {
        self.distance_check_loop_started
    }

    /// The local player entered a seat owned by another system
    pub fn external_authority_entered(&mut self) {
        debug!("External authority entered");
        self.in_external_authority = true;
    }

    /// The local player left a seat owned by another system
    pub fn external_authority_exited(&mut self) {
        debug!("External authority exited");
        self.in_external_authority = false;
    }

    pub fn subscribe(&mut self, world: &World, listener: SharedListener) {
        let anchor_position = self.anchor_position(world);
        self.listeners.subscribe(listener, anchor_position);
    }

    pub fn unsubscribe(&mut self, listener: &SharedListener) {
        self.listeners.unsubscribe(listener);
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn register_dynamic_object(&mut self, entity: Entity) {
        self.dynamic_objects.register(entity);
    }

    pub fn unregister_dynamic_object(&mut self, entity: Entity) {
        self.dynamic_objects.unregister(entity);
    }

    pub fn dynamic_objects(&self) -> &TrackedObjects {
        &self.dynamic_objects
    }

    pub fn root_objects(&self) -> &[Entity] {
        &self.root_objects
    }

    /// Check the player's distance from the origin and shift if it is too far
    ///
    /// Returns true if a shift happened. Without tracking data this is a no-op.
    pub fn check_distance(&mut self, world: &mut World, player: &mut dyn PlayerApi) -> bool {
        if !player.is_valid() {
            return false;
        }
        let Some(tracking) = player.origin_tracking() else {
            trace!("No tracking data yet, skipping distance check");
            return false;
        };

        let distance = tracking.position.length();
        if distance < self.distance_threshold {
            trace!(distance, threshold = self.distance_threshold, "Within threshold");
            return false;
        }

        self.shift(world, Some(player), -tracking.position);
        true
    }

    /// Move the world by `delta` and bring everything along
    ///
    /// The player is only relocated when one is given and no external system
    /// currently owns their placement.
    pub fn shift(&mut self, world: &mut World, player: Option<&mut dyn PlayerApi>, delta: Vec3) {
        match world.query_one_mut::<&mut Transform>(self.frame) {
            Ok(frame) => frame.translate(delta),
            Err(_) => {
                warn!(frame = ?self.frame, "Origin frame missing, skipping shift");
                return;
            }
        }

        let relocated_player = match player {
            Some(player) if !self.in_external_authority => self.relocate_player(player, delta),
            _ => false,
        };

        // Nodes far from zero lose precision, so hand everything back with the
        // frame sitting at the origin.
        detach_children(world, self.frame);
        if let Ok(frame) = world.query_one_mut::<&mut Transform>(self.frame) {
            frame.position = Vec3::ZERO;
        }
        let tracked = self.root_objects.iter().copied().chain(self.dynamic_objects.iter());
        for entity in tracked {
            if !world.contains(entity) {
                debug!(entity = ?entity, "Tracked object no longer exists, skipping");
                continue;
            }
            if let Err(e) = set_parent_keep_world(world, entity, Some(self.frame)) {
                warn!(entity = ?entity, error = %e, "Failed to re-parent tracked object");
            }
        }

        let anchor_position = self.anchor_position(world);
        self.listeners.notify(anchor_position);
        self.render_params.set_world_offset(anchor_position);

        self.record_shift(delta, anchor_position, relocated_player);
    }

    fn relocate_player(&self, player: &mut dyn PlayerApi, delta: Vec3) -> bool {
        let Some(tracking) = player.origin_tracking() else {
            return false;
        };
        let velocity = player.velocity();
        player.teleport_to(tracking.position + delta, tracking.rotation);
        if self.local_player.is_some() {
            player.use_attached_seat();
        }
        player.set_velocity(velocity);
        true
    }

    fn record_shift(&mut self, delta: Vec3, anchor_position: Vec3, relocated_player: bool) {
        self.origin_shift_history.push(OriginShift {
            timestamp: std::time::Instant::now(),
            delta,
            anchor_position,
            relocated_player,
        });

        // Limit history size to prevent memory growth
        if self.origin_shift_history.len() > self.history_limit {
            self.origin_shift_history.drain(..self.history_limit / 2);
        }

        self.total_origin_offset -= delta.as_dvec3();
        self.shifts_performed += 1;

        info!(
            distance = delta.length(),
            anchor = ?anchor_position,
            relocated_player,
            "Moved origin"
        );
    }

    /// Convert an absolute (session start) position to the current frame
    pub fn world_to_current(&self, world_pos: DVec3) -> DVec3 {
        world_pos - self.total_origin_offset
    }

    /// Convert a current frame position to absolute (session start) coordinates
    pub fn current_to_world(&self, current_pos: DVec3) -> DVec3 {
        current_pos + self.total_origin_offset
    }

    pub fn total_origin_offset(&self) -> DVec3 {
        self.total_origin_offset
    }

    /// Get information about recent origin shifts
    pub fn origin_shift_history(&self) -> &[OriginShift] {
        &self.origin_shift_history
    }

    pub fn clear_history(&mut self) {
        self.origin_shift_history.clear();
    }

    /// Get statistics about the origin manager
    pub fn stats(&self) -> OriginStats {
        OriginStats {
            total_origin_offset: self.total_origin_offset,
            world_offset: self.render_params.world_offset(),
            origin_shifts_performed: self.shifts_performed,
            in_external_authority: self.in_external_authority,
            distance_threshold: self.distance_threshold,
            listener_count: self.listeners.len(),
            dynamic_object_count: self.dynamic_objects.len(),
        }
    }
}

/// Statistics about the origin manager state
#[derive(Debug, Clone)]
pub struct OriginStats {
    /// Total offset from the session start origin
    pub total_origin_offset: DVec3,
    /// Anchor offset last pushed to rendering
    pub world_offset: Vec3,
    /// Number of origin shifts performed
    pub origin_shifts_performed: usize,
    /// Whether an external system owns the local player's placement
    pub in_external_authority: bool,
    /// Current origin shift threshold
    pub distance_threshold: f32,
    pub listener_count: usize,
    pub dynamic_object_count: usize,
}
