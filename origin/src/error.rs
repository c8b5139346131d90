//! Setup errors for the floating origin
//!
//! These are configuration faults. They are reported once at construction and
//! halt any further automated setup; nothing here is recoverable at runtime.

use crate::config::ConfigError;

/// Errors raised while building an origin manager or session
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    #[error("Found {0} origin frames in the world, exactly one coordinate authority may exist")]
    MultipleCoordinators(usize),

    #[error("No origin frame found in the world")]
    MissingFrame,

    #[error("No anchor found in the world")]
    MissingAnchor,

    #[error("Found {0} anchors in the world, exactly one is allowed")]
    MultipleAnchors(usize),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
