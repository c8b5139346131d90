//! Anchor-relative replication of entity poses
//!
//! Owners broadcast poses relative to their own anchor, so every participant
//! can shift its origin independently. Receivers buffer the samples, play them
//! back slightly in the past and add their local anchor on top.

pub mod anchored;
pub mod channel;
pub mod entity_sync;
pub mod pose;
pub mod ring_buffer;
pub mod smoothing;

pub use anchored::AnchoredObjectSync;
pub use channel::{DeserializationInfo, Delivery, LoopbackChannel, ReplicationChannel};
pub use entity_sync::{EntitySync, RenderedPose, SyncRole};
pub use pose::{quantize_yaw, yaw_to_rotation, SyncedPose};
pub use ring_buffer::{InterpolatedPose, PlayoutBuffer, PoseSample};
pub use smoothing::smooth_damp;

/// Errors raised while decoding replicated state
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Replicated position is not finite")]
    NonFinitePosition,
}
