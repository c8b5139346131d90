//! Seat hooks placed on externally driven seats

use crate::player::PlayerApi;
use tracing::trace;

/// Seat event worth routing to the local session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationEvent {
    Entered,
    Exited,
}

/// Attached to each external seat; forwards only the local player's events
#[derive(Debug, Clone, Default)]
pub struct StationNotifier {
    name: String,
}

impl StationNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn player_entered(&self, player: &dyn PlayerApi) -> Option<StationEvent> {
        self.filter(player, StationEvent::Entered)
    }

    pub fn player_exited(&self, player: &dyn PlayerApi) -> Option<StationEvent> {
        self.filter(player, StationEvent::Exited)
    }

    fn filter(&self, player: &dyn PlayerApi, event: StationEvent) -> Option<StationEvent> {
        if !player.is_valid() || !player.is_local() {
            trace!(station = %self.name, player = %player.id(), "Ignoring non-local seat event");
            return None;
        }
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{KinematicPlayer, PlayerId};

    #[test]
    fn test_forwards_local_player_only() {
        let notifier = StationNotifier::new("boat");
        let local = KinematicPlayer::new(PlayerId(1));
        let mut remote = KinematicPlayer::new(PlayerId(2));
        remote.local = false;

        assert_eq!(notifier.player_entered(&local), Some(StationEvent::Entered));
        assert_eq!(notifier.player_exited(&local), Some(StationEvent::Exited));
        assert_eq!(notifier.player_entered(&remote), None);
    }

    #[test]
    fn test_ignores_invalid_player() {
        let notifier = StationNotifier::new("boat");
        let mut gone = KinematicPlayer::new(PlayerId(1));
        gone.valid = false;

        assert_eq!(notifier.player_exited(&gone), None);
    }
}
