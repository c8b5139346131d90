//! The locally-controlled player as seen by the floating origin
//!
//! The embedding application owns locomotion. This module only describes the
//! boundary: what the origin manager and synchronizers need to read from a
//! player and the few commands they issue back.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Network identity of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Pose of a tracked point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingData {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Capabilities the floating origin needs from a player
pub trait PlayerApi {
    /// Network identity
    fn id(&self) -> PlayerId;

    /// False once the player has disconnected
    fn is_valid(&self) -> bool {
        true
    }

    /// Whether this player is controlled on this machine
    fn is_local(&self) -> bool;

    /// Whether this player uses a VR headset
    fn is_in_vr(&self) -> bool;

    /// Pose of the play-space origin, `None` until tracking is available
    fn origin_tracking(&self) -> Option<TrackingData>;

    /// Avatar position in world space
    fn position(&self) -> Vec3;

    /// Avatar root rotation in world space
    fn avatar_root_rotation(&self) -> Quat;

    fn velocity(&self) -> Vec3;

    fn set_velocity(&mut self, velocity: Vec3);

    /// Move the play-space origin to `position` facing `rotation`
    fn teleport_to(&mut self, position: Vec3, rotation: Quat);

    /// Put the player back into the seat attached to them
    fn use_attached_seat(&mut self);
}

/// Teleport so the avatar (not the play-space origin) lands on `target`
///
/// Keeps the current play-space rotation and the avatar's offset inside the
/// play space. Does nothing while tracking is unavailable.
pub fn teleport_avatar_to(player: &mut dyn PlayerApi, target: Vec3) {
    let Some(origin) = player.origin_tracking() else {
        return;
    };
    let offset = player.position() - origin.position;
    player.teleport_to(target - offset, origin.rotation);
}

/// Minimal kinematic player used by headless runs and tests
///
/// The avatar sits at a fixed offset from the play-space origin and drifts
/// with `velocity` on every [`KinematicPlayer::step`].
#[derive(Debug, Clone)]
pub struct KinematicPlayer {
    pub id: PlayerId,
    pub local: bool,
    pub in_vr: bool,
    pub valid: bool,
    pub tracking_available: bool,
    pub origin: TrackingData,
    pub avatar_offset: Vec3,
    pub avatar_rotation: Quat,
    pub velocity: Vec3,
    pub seated: bool,
    /// Number of `use_attached_seat` calls received
    pub seat_requests: u32,
    /// Number of teleports received
    pub teleports: u32,
}

impl KinematicPlayer {
    /// Create a local desktop player at the origin
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            local: true,
            in_vr: false,
            valid: true,
            tracking_available: true,
            origin: TrackingData {
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
            },
            avatar_offset: Vec3::ZERO,
            avatar_rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            seated: false,
            seat_requests: 0,
            teleports: 0,
        }
    }

    /// Place the play-space origin
    pub fn at(mut self, position: Vec3) -> Self {
        self.origin.position = position;
        self
    }

    /// Integrate velocity over `delta_time`
    pub fn step(&mut self, delta_time: f32) {
        self.origin.position += self.velocity * delta_time;
    }
}

impl PlayerApi for KinematicPlayer {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn is_local(&self) -> bool {
        self.local
    }

    fn is_in_vr(&self) -> bool {
        self.in_vr
    }

    fn origin_tracking(&self) -> Option<TrackingData> {
        self.tracking_available.then_some(self.origin)
    }

    fn position(&self) -> Vec3 {
        self.origin.position + self.origin.rotation * self.avatar_offset
    }

    fn avatar_root_rotation(&self) -> Quat {
        self.origin.rotation * self.avatar_rotation
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn teleport_to(&mut self, position: Vec3, rotation: Quat) {
        self.origin = TrackingData { position, rotation };
        // Teleporting pulls the player out of any seat and zeroes momentum.
        self.seated = false;
        self.velocity = Vec3::ZERO;
        self.teleports += 1;
    }

    fn use_attached_seat(&mut self) {
        self.seated = true;
        self.seat_requests += 1;
    }
}
