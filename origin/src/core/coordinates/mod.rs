//! Floating origin coordinate management
//!
//! Single-precision transforms lose precision far from (0,0,0). The origin
//! manager keeps the local player near the origin by shifting the world, and
//! tells dependents where the anchor ended up so they can keep their
//! anchor-relative state consistent.

pub mod listeners;
pub mod origin_manager;
pub mod render_params;
pub mod tracked;


pub use listeners::{ListenerRegistry, OriginListener, SharedListener};
pub use origin_manager::{OriginManager, OriginShift, OriginStats};
pub use render_params::GlobalRenderParams;
pub use tracked::TrackedObjects;
