//! Per-entity pose replication
//!
//! One [`EntitySync`] exists per participant on every machine. On the owner's
//! machine it writes anchor-relative poses at a fixed rate. Everywhere else it
//! buffers what arrives and renders the owner a little in the past.

use super::channel::{DeserializationInfo, ReplicationChannel};
use super::pose::{quantize_yaw, SyncedPose};
use super::ring_buffer::{PlayoutBuffer, PoseSample};
use super::smoothing::smooth_damp;
use crate::config::OriginConfig;
use crate::core::coordinates::OriginListener;
use crate::player::{PlayerApi, PlayerId};
use glam::{Quat, Vec3};
use tracing::{debug, trace, warn};

/// Which side of the replication this machine is on, fixed at assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRole {
    LocallyOwned,
    RemoteObserved,
}

/// World-space pose produced by interpolation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedPose {
    pub position: Vec3,
    pub rotation: Quat,
    /// The pose was taken verbatim from a discontinuous sample
    pub snapped: bool,
}

#[derive(Debug, Clone)]
pub struct EntitySync {
    owner: PlayerId,
    role: SyncRole,
    owner_in_vr: bool,
    active: bool,

    sync_rate: f32,
    vr_smooth_time: f32,
    vr_playout_delay: f32,
    since_last_sync: f32,

    synced: SyncedPose,
    anchor_position: Vec3,

    buffer: PlayoutBuffer,
    network_time: f32,
    smoothed_network_time: f32,
    smoothing_velocity: f32,
    last_rendered: Option<RenderedPose>,
    /// Bumped each time a discontinuity is flagged
    discontinuity_generation: u32,
    /// Generation carried by the last serialized pose
    serialized_generation: Option<u32>,
}

impl EntitySync {
    /// Assign `owner` and fix the role for the lifetime of this synchronizer
    pub fn new(owner: PlayerId, role: SyncRole, owner_in_vr: bool, config: &OriginConfig) -> Self {
        let config = config.clone().sanitized();
        debug!(owner = %owner, role = ?role, owner_in_vr, "Entity sync assigned");
        Self {
            owner,
            role,
            owner_in_vr,
            active: true,
            sync_rate: config.sync_rate,
            vr_smooth_time: config.vr_smooth_time,
            vr_playout_delay: config.vr_playout_delay,
            since_last_sync: 0.0,
            synced: SyncedPose::default(),
            anchor_position: Vec3::ZERO,
            buffer: PlayoutBuffer::new(),
            network_time: 0.0,
            smoothed_network_time: 0.0,
            smoothing_velocity: 0.0,
            last_rendered: None,
            discontinuity_generation: 0,
            serialized_generation: None,
        }
    }

    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn role(&self) -> SyncRole {
        self.role
    }

    pub fn is_owned_locally(&self) -> bool {
        self.role == SyncRole::LocallyOwned
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Suspend or resume replication
    ///
    /// A suspended owner stops broadcasting and a suspended receiver stops
    /// rendering. Buffered samples are kept.
    pub fn set_active(&mut self, active: bool) {
        if self.active != active {
            debug!(owner = %self.owner, active, "Entity sync activity changed");
        }
        self.active = active;
        if !active {
            self.since_last_sync = 0.0;
        }
    }

    /// Last written (owner) or received (observer) replicated state
    pub fn synced(&self) -> &SyncedPose {
        &self.synced
    }

    pub fn anchor_position(&self) -> Vec3 {
        self.anchor_position
    }

    pub fn buffer(&self) -> &PlayoutBuffer {
        &self.buffer
    }

    /// Latest `receive - send` measurement for a VR owner
    pub fn network_time(&self) -> f32 {
        self.network_time
    }

    pub fn last_rendered(&self) -> Option<RenderedPose> {
        self.last_rendered
    }

    /// Make receivers snap to the next broadcast instead of blending into it
    pub fn flag_discontinuity(&mut self) {
        trace!(owner = %self.owner, "Flagging discontinuity");
        self.synced.discontinuity = true;
        self.discontinuity_generation = self.discontinuity_generation.wrapping_add(1);
    }

    /// The owner respawned somewhere else
    pub fn respawn(&mut self) {
        self.flag_discontinuity();
    }

    /// Advance the owner's broadcast timer
    ///
    /// Returns true when a serialization should be requested.
    pub fn tick_owner(&mut self, delta_time: f32) -> bool {
        if !self.is_owned_locally() || !self.active {
            return false;
        }
        self.since_last_sync += delta_time;
        if self.since_last_sync >= self.sync_rate {
            self.since_last_sync = 0.0;
            return true;
        }
        false
    }

    /// Write the owner's current pose into the replicated fields
    ///
    /// Returns the state to broadcast, or `None` when nothing should be sent.
    pub fn pre_serialization(&mut self, owner: &dyn PlayerApi) -> Option<SyncedPose> {
        if !self.is_owned_locally() || !self.active {
            return None;
        }
        if !owner.is_valid() {
            return None;
        }

        self.synced.position = owner.position() - self.anchor_position;
        self.synced.rotation_yaw = quantize_yaw(owner.avatar_root_rotation());
        self.serialized_generation = Some(self.discontinuity_generation);
        Some(self.synced)
    }

    /// Clear the discontinuity flag once it has actually gone out
    ///
    /// A flag raised after the last `pre_serialization` survives, since that
    /// broadcast never carried it.
    pub fn post_serialization(&mut self, sent: bool) {
        let serialized = self.serialized_generation.take();
        if !sent {
            debug!(owner = %self.owner, "Broadcast failed, keeping discontinuity flag");
            return;
        }
        if serialized == Some(self.discontinuity_generation) {
            self.synced.discontinuity = false;
        } else if self.synced.discontinuity {
            debug!(owner = %self.owner, "Discontinuity flagged after serialization, keeping it");
        }
    }

    /// Buffer a received pose
    pub fn on_deserialization(&mut self, pose: SyncedPose, info: DeserializationInfo) {
        if self.is_owned_locally() {
            debug!(owner = %self.owner, "Ignoring update for a locally owned entity");
            return;
        }

        if self.owner_in_vr {
            self.network_time = info.receive_time - info.send_time;
            if self.buffer.is_empty() {
                self.smoothed_network_time = self.network_time;
            }
        }

        self.synced = pose;
        self.buffer.capture(PoseSample {
            position: pose.position,
            rotation: pose.rotation(),
            discontinuity: pose.discontinuity,
            timestamp: info.send_time,
        });
    }

    /// Decode a wire payload and buffer it; malformed data is logged and dropped
    pub fn receive_payload(&mut self, payload: &[u8], info: DeserializationInfo) -> bool {
        match SyncedPose::decode(payload) {
            Ok(pose) => {
                self.on_deserialization(pose, info);
                true
            }
            Err(e) => {
                warn!(owner = %self.owner, error = %e, "Dropping malformed pose update");
                false
            }
        }
    }

    /// Render the remote owner at the current playout time
    pub fn interpolate(&mut self, delta_time: f32, channel: &dyn ReplicationChannel) -> Option<RenderedPose> {
        if self.is_owned_locally() || !self.active {
            return None;
        }

        let playout_time = if self.owner_in_vr {
            self.smoothed_network_time = smooth_damp(
                self.smoothed_network_time,
                self.network_time,
                &mut self.smoothing_velocity,
                self.vr_smooth_time,
                delta_time,
            );
            channel.realtime() - self.smoothed_network_time - self.vr_playout_delay
        } else {
            channel.simulation_time(self.owner)
        };

        let pose = self.buffer.sample(playout_time)?;
        let snapped = self
            .buffer
            .get(pose.right)
            .is_some_and(|right| right.discontinuity);

        let rendered = RenderedPose {
            position: pose.position + self.anchor_position,
            rotation: pose.rotation,
            snapped,
        };
        self.last_rendered = Some(rendered);
        Some(rendered)
    }
}

impl OriginListener for EntitySync {
    fn on_origin_shifted(&mut self, anchor_position: Vec3) {
        self.anchor_position = anchor_position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::KinematicPlayer;

    struct FixedClock {
        now: f32,
        simulation: f32,
    }

    impl ReplicationChannel for FixedClock {
        fn request_serialization(&mut self, _sender: PlayerId) {}

        fn simulation_time(&self, _owner: PlayerId) -> f32 {
            self.simulation
        }

        fn realtime(&self) -> f32 {
            self.now
        }
    }

    fn owner() -> EntitySync {
        EntitySync::new(PlayerId(1), SyncRole::LocallyOwned, false, &OriginConfig::default())
    }

    fn observer(in_vr: bool) -> EntitySync {
        EntitySync::new(PlayerId(1), SyncRole::RemoteObserved, in_vr, &OriginConfig::default())
    }

    fn pose(x: f32, discontinuity: bool) -> SyncedPose {
        SyncedPose {
            position: Vec3::new(x, 0.0, 0.0),
            rotation_yaw: 0,
            discontinuity,
        }
    }

    fn at(send_time: f32) -> DeserializationInfo {
        DeserializationInfo {
            send_time,
            receive_time: send_time + 0.1,
        }
    }

    #[test]
    fn test_owner_requests_at_sync_rate() {
        let mut sync = owner();
        assert!(!sync.tick_owner(0.1));
        assert!(!sync.tick_owner(0.1));
        assert!(sync.tick_owner(0.1));
        assert!(!sync.tick_owner(0.1));
    }

    #[test]
    fn test_suspended_owner_never_requests() {
        let mut sync = owner();
        sync.set_active(false);
        assert!(!sync.tick_owner(10.0));
    }

    #[test]
    fn test_pre_serialization_is_anchor_relative() {
        let mut sync = owner();
        sync.on_origin_shifted(Vec3::new(-100.0, 0.0, 0.0));
        let mut player = KinematicPlayer::new(PlayerId(1)).at(Vec3::new(-90.0, 0.0, 5.0));
        player.avatar_rotation = Quat::from_rotation_y(90f32.to_radians());

        let written = sync.pre_serialization(&player).unwrap();
        assert!((written.position - Vec3::new(10.0, 0.0, 5.0)).length() < 1e-4);
        assert_eq!(written.rotation_yaw, 90);
        assert!(written.discontinuity);
    }

    #[test]
    fn test_invalid_owner_is_skipped() {
        let mut sync = owner();
        let mut player = KinematicPlayer::new(PlayerId(1));
        player.valid = false;
        assert!(sync.pre_serialization(&player).is_none());
    }

    #[test]
    fn test_discontinuity_cleared_only_after_send() {
        let player = KinematicPlayer::new(PlayerId(1));
        let mut sync = owner();
        assert!(sync.pre_serialization(&player).unwrap().discontinuity);
        sync.post_serialization(false);
        assert!(sync.synced().discontinuity);
        sync.pre_serialization(&player);
        sync.post_serialization(true);
        assert!(!sync.synced().discontinuity);

        sync.respawn();
        assert!(sync.synced().discontinuity);
    }

    #[test]
    fn test_discontinuity_raised_after_serialization_survives_send() {
        let player = KinematicPlayer::new(PlayerId(1));
        let mut sync = owner();
        sync.pre_serialization(&player);
        sync.post_serialization(true);
        assert!(!sync.pre_serialization(&player).unwrap().discontinuity);

        sync.respawn();
        sync.post_serialization(true);
        assert!(sync.synced().discontinuity);

        assert!(sync.pre_serialization(&player).unwrap().discontinuity);
        sync.post_serialization(true);
        assert!(!sync.synced().discontinuity);
    }

    #[test]
    fn test_send_without_serialization_keeps_discontinuity() {
        let mut sync = owner();
        sync.post_serialization(true);
        assert!(sync.synced().discontinuity);
    }

    #[test]
    fn test_observer_never_serializes() {
        let mut sync = observer(false);
        assert!(!sync.tick_owner(1.0));
        assert!(sync.pre_serialization(&KinematicPlayer::new(PlayerId(1))).is_none());
    }

    #[test]
    fn test_observer_renders_relative_to_local_anchor() {
        let mut sync = observer(false);
        sync.on_origin_shifted(Vec3::new(50.0, 0.0, 0.0));
        sync.on_deserialization(pose(0.0, false), at(1.0));
        sync.on_deserialization(pose(10.0, false), at(2.0));

        let clock = FixedClock {
            now: 3.0,
            simulation: 1.5,
        };
        let rendered = sync.interpolate(0.016, &clock).unwrap();
        assert!((rendered.position - Vec3::new(55.0, 0.0, 0.0)).length() < 1e-4);
        assert!(!rendered.snapped);
    }

    #[test]
    fn test_discontinuous_sample_snaps() {
        let mut sync = observer(false);
        sync.on_deserialization(pose(0.0, false), at(1.0));
        sync.on_deserialization(pose(900.0, true), at(2.0));

        let clock = FixedClock {
            now: 3.0,
            simulation: 1.01,
        };
        let rendered = sync.interpolate(0.016, &clock).unwrap();
        assert_eq!(rendered.position.x, 900.0);
        assert!(rendered.snapped);
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let mut sync = observer(false);
        assert!(!sync.receive_payload(b"not json", at(1.0)));
        assert!(sync.buffer().is_empty());

        let good = pose(1.0, false).encode().unwrap();
        assert!(sync.receive_payload(&good, at(1.0)));
        assert_eq!(sync.buffer().len(), 1);
    }

    #[test]
    fn test_vr_owner_records_network_time() {
        let mut sync = observer(true);
        sync.on_deserialization(pose(0.0, false), at(4.0));
        assert!((sync.network_time() - 0.1).abs() < 1e-5);

        // Playout is realtime minus the smoothed latency and the VR delay.
        sync.on_deserialization(pose(10.0, false), at(5.0));
        let clock = FixedClock {
            now: 5.1,
            simulation: 0.0,
        };
        let rendered = sync.interpolate(0.016, &clock).unwrap();
        assert!((rendered.position.x - 5.0).abs() < 1e-2, "{:?}", rendered.position);
    }

    #[test]
    fn test_nothing_rendered_before_first_sample() {
        let mut sync = observer(false);
        let clock = FixedClock {
            now: 1.0,
            simulation: 1.0,
        };
        assert!(sync.interpolate(0.016, &clock).is_none());
        assert!(sync.last_rendered().is_none());
    }
}
