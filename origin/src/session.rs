//! One participant's view of a floating-origin world
//!
//! The session owns the scene, the origin manager, the timers, the local
//! player's synchronizer and hand-off state, and one synchronizer per remote
//! participant. The embedding application feeds it frames and external events.

use crate::config::OriginConfig;
use crate::core::coordinates::{OriginManager, SharedListener};
use crate::core::entity::{Entity, World};
use crate::core::scheduler::Scheduler;
use crate::error::OriginError;
use crate::handoff::{AuthorityHandoff, StationEvent};
use crate::player::{PlayerApi, PlayerId};
use crate::sync::{DeserializationInfo, EntitySync, RenderedPose, ReplicationChannel, SyncRole};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Timer events driven by the session's scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    DistanceCheck,
    ForceSeat,
}

/// What happened during one [`OriginSession::update`]
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// The origin moved this frame
    pub shifted: bool,
    /// World-space poses of remote participants
    pub rendered: Vec<(PlayerId, RenderedPose)>,
}

struct LocalEntity {
    id: PlayerId,
    sync: Rc<RefCell<EntitySync>>,
    handoff: AuthorityHandoff,
}

pub struct OriginSession {
    config: OriginConfig,
    world: World,
    manager: OriginManager,
    scheduler: Scheduler<SessionEvent>,
    local: Option<LocalEntity>,
    remotes: HashMap<PlayerId, Rc<RefCell<EntitySync>>>,
}

impl OriginSession {
    /// Build a session over a world holding one origin rig
    pub fn new(world: World, config: OriginConfig) -> Result<Self, OriginError> {
        let config = config.sanitized();
        let manager = OriginManager::from_world(&world, &config)?;
        Ok(Self {
            config,
            world,
            manager,
            scheduler: Scheduler::new(),
            local: None,
            remotes: HashMap::new(),
        })
    }

    pub fn config(&self) -> &OriginConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn manager(&self) -> &OriginManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut OriginManager {
        &mut self.manager
    }

    pub fn scheduler(&self) -> &Scheduler<SessionEvent> {
        &self.scheduler
    }

    pub fn local_sync(&self) -> Option<Rc<RefCell<EntitySync>>> {
        self.local.as_ref().map(|local| Rc::clone(&local.sync))
    }

    pub fn local_handoff(&self) -> Option<&AuthorityHandoff> {
        self.local.as_ref().map(|local| &local.handoff)
    }

    pub fn remote_sync(&self, owner: PlayerId) -> Option<Rc<RefCell<EntitySync>>> {
        self.remotes.get(&owner).map(Rc::clone)
    }

    /// Take ownership of the local player's synchronizer and seat
    ///
    /// Starts the distance check loop (first check next frame) and the
    /// force-seat loop.
    pub fn assign_local_player(&mut self, player: &dyn PlayerApi) {
        let id = player.id();
        if self.local.as_ref().is_some_and(|local| local.id == id) {
            debug!(player = %id, "Local player already assigned");
            return;
        }
        if let Some(previous) = self.local.take() {
            let listener: SharedListener = previous.sync;
            self.manager.unsubscribe(&listener);
        }

        let sync = Rc::new(RefCell::new(EntitySync::new(
            id,
            SyncRole::LocallyOwned,
            player.is_in_vr(),
            &self.config,
        )));
        self.manager.subscribe(&self.world, sync.clone());
        self.local = Some(LocalEntity {
            id,
            sync,
            handoff: AuthorityHandoff::new(&self.config),
        });

        if self.manager.register_local_seat(id) {
            self.scheduler.schedule_frames(SessionEvent::DistanceCheck, 1);
        }
        self.restart_force_seat();
        info!(player = %id, "Local player assigned");
    }

    /// Start observing a remote participant
    pub fn assign_remote_player(&mut self, owner: PlayerId, owner_in_vr: bool) -> Rc<RefCell<EntitySync>> {
        if let Some(existing) = self.remotes.get(&owner) {
            return Rc::clone(existing);
        }
        let sync = Rc::new(RefCell::new(EntitySync::new(
            owner,
            SyncRole::RemoteObserved,
            owner_in_vr,
            &self.config,
        )));
        self.manager.subscribe(&self.world, sync.clone());
        self.remotes.insert(owner, Rc::clone(&sync));
        info!(owner = %owner, owner_in_vr, "Remote player assigned");
        sync
    }

    /// Stop observing a remote participant
    pub fn remove_remote_player(&mut self, owner: PlayerId) -> bool {
        match self.remotes.remove(&owner) {
            Some(sync) => {
                let listener: SharedListener = sync;
                self.manager.unsubscribe(&listener);
                info!(owner = %owner, "Remote player removed");
                true
            }
            None => false,
        }
    }

    pub fn subscribe(&mut self, listener: SharedListener) {
        self.manager.subscribe(&self.world, listener);
    }

    pub fn unsubscribe(&mut self, listener: &SharedListener) {
        self.manager.unsubscribe(listener);
    }

    pub fn register_dynamic_object(&mut self, entity: Entity) {
        self.manager.register_dynamic_object(entity);
    }

    pub fn unregister_dynamic_object(&mut self, entity: Entity) {
        self.manager.unregister_dynamic_object(entity);
    }

    /// Run one frame
    ///
    /// Fires due timers, advances the local broadcast timer and renders every
    /// remote participant.
    pub fn update(
        &mut self,
        delta_time: f32,
        player: &mut dyn PlayerApi,
        channel: &mut dyn ReplicationChannel,
    ) -> FrameReport {
        let mut report = FrameReport::default();

        for event in self.scheduler.advance(delta_time) {
            match event {
                SessionEvent::DistanceCheck => {
                    report.shifted |= self.manager.check_distance(&mut self.world, player);
                    self.scheduler
                        .schedule_seconds(SessionEvent::DistanceCheck, self.manager.check_interval());
                }
                SessionEvent::ForceSeat => {
                    let Some(local) = self.local.as_mut() else {
                        continue;
                    };
                    if let Some(delay) = local.handoff.force_seat_step(player) {
                        self.scheduler.schedule_seconds(SessionEvent::ForceSeat, delay);
                    }
                }
            }
        }

        if let Some(local) = &self.local {
            if local.sync.borrow_mut().tick_owner(delta_time) {
                channel.request_serialization(local.id);
            }
        }

        for (owner, sync) in &self.remotes {
            if let Some(pose) = sync.borrow_mut().interpolate(delta_time, &*channel) {
                report.rendered.push((*owner, pose));
            }
        }
        report.rendered.sort_by_key(|(owner, _)| *owner);

        report
    }

    /// Write the local player's pose and encode it for the wire
    pub fn serialize_local(&mut self, player: &dyn PlayerApi) -> Option<Vec<u8>> {
        let local = self.local.as_ref()?;
        let pose = local.sync.borrow_mut().pre_serialization(player)?;
        match pose.encode() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(player = %local.id, error = %e, "Failed to encode local pose");
                None
            }
        }
    }

    /// Report whether the last serialized pose went out
    pub fn post_serialization(&mut self, sent: bool) {
        if let Some(local) = &self.local {
            local.sync.borrow_mut().post_serialization(sent);
        }
    }

    /// Hand a received payload to the sender's synchronizer
    pub fn receive(&mut self, sender: PlayerId, payload: &[u8], info: DeserializationInfo) -> bool {
        match self.remotes.get(&sender) {
            Some(sync) => sync.borrow_mut().receive_payload(payload, info),
            None => {
                debug!(sender = %sender, "Update for unknown participant");
                false
            }
        }
    }

    /// Route a filtered seat event from an external seat
    pub fn handle_station_event(&mut self, event: StationEvent) {
        match event {
            StationEvent::Entered => self.external_authority_entered(),
            StationEvent::Exited => self.external_authority_exited(),
        }
    }

    pub fn external_authority_entered(&mut self) {
        self.manager.external_authority_entered();
        let Some(local) = self.local.as_mut() else {
            return;
        };
        local.handoff.on_external_entered(&mut local.sync.borrow_mut());
        self.scheduler.cancel(&SessionEvent::ForceSeat);
    }

    pub fn external_authority_exited(&mut self) {
        self.manager.external_authority_exited();
        let Some(local) = self.local.as_mut() else {
            return;
        };
        if local.handoff.on_external_exited(&mut local.sync.borrow_mut()) {
            self.restart_force_seat();
        }
    }

    /// The local player sat down in their own seat
    pub fn seat_entered(&mut self) {
        if let Some(local) = self.local.as_mut() {
            local.handoff.seat_entered();
        }
    }

    /// The local player left their own seat
    pub fn seat_exited(&mut self) {
        let restart = self
            .local
            .as_mut()
            .is_some_and(|local| local.handoff.seat_exited());
        if restart {
            self.restart_force_seat();
        }
    }

    /// The local player respawned
    pub fn respawn(&mut self) {
        if let Some(local) = self.local.as_mut() {
            local.handoff.respawn(&mut local.sync.borrow_mut());
        }
    }

    fn restart_force_seat(&mut self) {
        self.scheduler.cancel(&SessionEvent::ForceSeat);
        self.scheduler.schedule_frames(SessionEvent::ForceSeat, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::KinematicPlayer;
    use crate::sync::LoopbackChannel;

    fn session() -> OriginSession {
        let mut world = World::new();
        world.spawn_origin_rig();
        OriginSession::new(world, OriginConfig::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_world_without_rig() {
        let result = OriginSession::new(World::new(), OriginConfig::default());
        assert!(matches!(result, Err(OriginError::MissingFrame)));
    }

    #[test]
    fn test_assign_local_schedules_loops_once() {
        let mut session = session();
        let player = KinematicPlayer::new(PlayerId(1));

        session.assign_local_player(&player);
        session.assign_local_player(&player);

        assert!(session.scheduler().is_scheduled(&SessionEvent::DistanceCheck));
        assert!(session.scheduler().is_scheduled(&SessionEvent::ForceSeat));
        assert_eq!(session.scheduler().len(), 2);
        assert_eq!(session.manager().listeners().len(), 1);
    }

    #[test]
    fn test_first_distance_check_runs_next_frame() {
        let mut session = session();
        let mut player = KinematicPlayer::new(PlayerId(1)).at(glam::Vec3::new(250.0, 0.0, 0.0));
        let mut channel = LoopbackChannel::new(0.0, 0.0);
        session.assign_local_player(&player);

        let report = session.update(0.0, &mut player, &mut channel);
        assert!(report.shifted);
        assert_eq!(session.manager().stats().origin_shifts_performed, 1);
    }

    #[test]
    fn test_remote_player_lifecycle() {
        let mut session = session();
        session.assign_remote_player(PlayerId(2), false);
        session.assign_remote_player(PlayerId(2), false);
        assert_eq!(session.manager().listeners().len(), 1);

        assert!(session.remove_remote_player(PlayerId(2)));
        assert!(!session.remove_remote_player(PlayerId(2)));
        assert!(session.manager().listeners().is_empty());
    }

    #[test]
    fn test_unknown_sender_is_ignored() {
        let mut session = session();
        let info = DeserializationInfo {
            send_time: 0.0,
            receive_time: 0.0,
        };
        assert!(!session.receive(PlayerId(9), b"{}", info));
    }

    #[test]
    fn test_external_authority_cancels_force_seat() {
        let mut session = session();
        session.assign_local_player(&KinematicPlayer::new(PlayerId(1)));

        session.external_authority_entered();
        assert!(!session.scheduler().is_scheduled(&SessionEvent::ForceSeat));
        assert!(session.manager().in_external_authority());

        session.external_authority_exited();
        assert!(session.scheduler().is_scheduled(&SessionEvent::ForceSeat));
        assert!(!session.manager().in_external_authority());
    }
}
