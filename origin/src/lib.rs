//! Floating origin for large multiplayer worlds
//!
//! Keeps the local player close to (0,0,0) by moving the world under them,
//! and replicates player poses relative to a shared anchor so that every
//! participant can shift independently.

pub mod config;
pub mod core;
pub mod error;
pub mod handoff;
pub mod player;
pub mod session;
pub mod sync;

// Re-export commonly used types
pub mod prelude {
    // Scene types
    pub use crate::core::entity::{
        set_parent_keep_world, world_position, Anchor, Entity, Name, OriginFrame, Parent,
        Transform, World,
    };

    // Origin types
    pub use crate::core::coordinates::{
        GlobalRenderParams, OriginListener, OriginManager, OriginStats, SharedListener,
    };
    pub use crate::core::scheduler::Scheduler;

    // Replication types
    pub use crate::sync::{
        DeserializationInfo, EntitySync, LoopbackChannel, RenderedPose, ReplicationChannel,
        SyncRole, SyncedPose,
    };

    // Hand-off types
    pub use crate::handoff::{AuthorityHandoff, AuthorityState, StationEvent, StationNotifier};

    pub use crate::config::OriginConfig;
    pub use crate::error::OriginError;
    pub use crate::player::{KinematicPlayer, PlayerApi, PlayerId};
    pub use crate::session::{FrameReport, OriginSession};

    // Math types
    pub use glam::{Quat, Vec3};
}

/// Initialize logging for the floating origin
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
