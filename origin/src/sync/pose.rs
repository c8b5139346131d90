//! Replicated pose fields and their wire encoding

use super::SyncError;
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Pose state written by the owner and replicated to everyone else
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncedPose {
    /// Avatar position relative to the owner's anchor
    pub position: Vec3,
    /// Yaw in whole degrees
    pub rotation_yaw: i16,
    /// Receivers must snap to this sample instead of blending into it
    pub discontinuity: bool,
}

impl Default for SyncedPose {
    /// Starts flagged so a freshly assigned owner is never blended from zero.
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation_yaw: 0,
            discontinuity: true,
        }
    }
}

impl SyncedPose {
    /// Rotation about the up axis described by `rotation_yaw`
    pub fn rotation(&self) -> Quat {
        yaw_to_rotation(self.rotation_yaw)
    }

    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SyncError> {
        let pose: SyncedPose = serde_json::from_slice(bytes)?;
        if !pose.position.is_finite() {
            return Err(SyncError::NonFinitePosition);
        }
        Ok(pose)
    }
}

/// Quantize a rotation's yaw to whole degrees in `[0, 360)`
///
/// Pitch and roll are discarded. Halves round to even.
pub fn quantize_yaw(rotation: Quat) -> i16 {
    let (yaw, _, _) = rotation.to_euler(EulerRot::YXZ);
    let degrees = yaw.to_degrees().rem_euclid(360.0);
    // Rounding can land on 360 itself.
    degrees.round_ties_even().rem_euclid(360.0) as i16
}

/// Rebuild a rotation from a quantized yaw
pub fn yaw_to_rotation(yaw_degrees: i16) -> Quat {
    Quat::from_rotation_y(f32::from(yaw_degrees).to_radians())
}
