//! Hand-off of the local player to systems that move them on their own
//!
//! While the player sits in a vehicle or any other externally driven seat,
//! that system owns their placement. The local synchronizer is suspended and
//! the seat-enforcement loop stands down until the player gets out again.

pub mod notifier;

pub use notifier::{StationEvent, StationNotifier};

use crate::config::OriginConfig;
use crate::player::PlayerApi;
use crate::sync::EntitySync;
use tracing::{debug, info, trace};

/// Who currently owns the local player's placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityState {
    /// The player's own attached seat
    Seated,
    /// A seat owned by another system
    ExternalAuthority,
}

#[derive(Debug, Clone)]
pub struct AuthorityHandoff {
    state: AuthorityState,
    /// The player currently occupies their own attached seat
    seated: bool,
    force_seat_interval: f32,
}

impl AuthorityHandoff {
    pub fn new(config: &OriginConfig) -> Self {
        Self {
            state: AuthorityState::Seated,
            seated: false,
            force_seat_interval: config.clone().sanitized().force_seat_interval,
        }
    }

    pub fn state(&self) -> AuthorityState {
        self.state
    }

    pub fn is_seated(&self) -> bool {
        self.seated
    }

    pub fn in_external_authority(&self) -> bool {
        self.state == AuthorityState::ExternalAuthority
    }

    pub fn force_seat_interval(&self) -> f32 {
        self.force_seat_interval
    }

    /// The player entered an externally owned seat
    pub fn on_external_entered(&mut self, sync: &mut EntitySync) {
        info!(owner = %sync.owner(), "Handing placement to external authority");
        self.state = AuthorityState::ExternalAuthority;
        self.seated = false;
        sync.set_active(false);
    }

    /// The player left an externally owned seat
    ///
    /// Returns true when the force-seat loop should start on the next frame.
    pub fn on_external_exited(&mut self, sync: &mut EntitySync) -> bool {
        if self.state != AuthorityState::ExternalAuthority {
            debug!("External exit without a matching enter");
        }
        info!(owner = %sync.owner(), "Taking placement back from external authority");
        self.state = AuthorityState::Seated;
        sync.set_active(true);
        // The player reappears wherever the vehicle left them.
        sync.flag_discontinuity();
        true
    }

    /// The player sat down in their own attached seat
    pub fn seat_entered(&mut self) {
        trace!("Own seat entered");
        self.seated = true;
    }

    /// The player left their own attached seat
    ///
    /// Returns true when the force-seat loop should restart.
    pub fn seat_exited(&mut self) -> bool {
        trace!("Own seat exited");
        self.seated = false;
        true
    }

    /// The local player respawned
    pub fn respawn(&mut self, sync: &mut EntitySync) {
        debug!(owner = %sync.owner(), "Local respawn");
        sync.respawn();
    }

    /// One iteration of the force-seat loop
    ///
    /// Returns the delay before the next iteration, or `None` once the loop
    /// should stop.
    pub fn force_seat_step(&mut self, player: &mut dyn PlayerApi) -> Option<f32> {
        if self.seated || self.in_external_authority() {
            trace!(seated = self.seated, state = ?self.state, "Force-seat loop stopping");
            return None;
        }
        if player.is_valid() {
            player.use_attached_seat();
        }
        Some(self.force_seat_interval)
    }
}
