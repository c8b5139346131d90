//! Configuration for the floating origin

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Capacity of every playout ring buffer
pub const BUFFER_CAPACITY: usize = 10;

/// Name of the global render parameter that carries the anchor offset
pub const WORLD_OFFSET_PARAM: &str = "_FO_WorldOffset";

/// Errors that can occur while loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunables for origin shifting and pose replication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Minimum distance (meters) from the origin before the world is moved
    pub distance_move_threshold: f32,
    /// Seconds between distance checks
    pub check_interval: f32,
    /// Seconds between pose broadcasts from the owner
    pub sync_rate: f32,
    /// Seconds between attempts to put the player back in their seat
    pub force_seat_interval: f32,
    /// SmoothDamp time used for VR owners' network time
    pub vr_smooth_time: f32,
    /// Extra playout delay (seconds) applied for VR owners
    pub vr_playout_delay: f32,
    /// Number of shift records kept for diagnostics
    pub history_limit: usize,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            distance_move_threshold: 100.0,
            check_interval: 3.0,
            sync_rate: 0.25,
            force_seat_interval: 0.5,
            vr_smooth_time: 0.2,
            vr_playout_delay: 0.5,
            history_limit: 100,
        }
    }
}

impl OriginConfig {
    /// Return a copy with every duration and distance clamped to `>= 0`
    ///
    /// NaN counts as invalid and becomes zero.
    pub fn sanitized(mut self) -> Self {
        self.distance_move_threshold = clamp_non_negative("distance_move_threshold", self.distance_move_threshold);
        self.check_interval = clamp_non_negative("check_interval", self.check_interval);
        self.sync_rate = clamp_non_negative("sync_rate", self.sync_rate);
        self.force_seat_interval = clamp_non_negative("force_seat_interval", self.force_seat_interval);
        self.vr_smooth_time = clamp_non_negative("vr_smooth_time", self.vr_smooth_time);
        self.vr_playout_delay = clamp_non_negative("vr_playout_delay", self.vr_playout_delay);
        self
    }

    /// Load configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults. The result is sanitized.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: OriginConfig = serde_json::from_str(&contents)?;
        debug!(path = ?path, "Loaded origin config");
        Ok(config.sanitized())
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

fn clamp_non_negative(field: &str, value: f32) -> f32 {
    if value >= 0.0 {
        value
    } else {
        warn!(field, value, "Clamping invalid config value to 0");
        0.0
    }
}
