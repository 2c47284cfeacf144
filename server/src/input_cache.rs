//! Latest-known input per player.
//!
//! The tick loop repeats the most recent controls of each player until a
//! newer message arrives. Host actions are one-shot and drained every tick.

use log::debug;
use shared::{HostActions, InputMessage, PlayerControls, PlayerId};
use std::collections::BTreeMap;

/// Inputs consumed by one call to `SimulationEngine::advance`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickInputs {
    pub controls: BTreeMap<PlayerId, PlayerControls>,
    pub actions: Vec<(PlayerId, HostActions)>,
}

impl TickInputs {
    /// Controls for `player`; the all-zero default when nothing was received.
    pub fn controls_for(&self, player: PlayerId) -> PlayerControls {
        self.controls.get(&player).copied().unwrap_or_default()
    }

    pub fn with_controls(mut self, player: PlayerId, controls: PlayerControls) -> Self {
        self.controls.insert(player, controls);
        self
    }

    pub fn with_actions(mut self, player: PlayerId, actions: HostActions) -> Self {
        self.actions.push((player, actions));
        self
    }
}

#[derive(Debug, Default)]
pub struct InputCache {
    latest: BTreeMap<PlayerId, PlayerControls>,
    last_sequence: BTreeMap<PlayerId, u32>,
    pending_actions: Vec<(PlayerId, HostActions)>,
}

impl InputCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `message` as the newest input of its player.
    /// Returns false if the message was stale and dropped.
    pub fn submit(&mut self, message: &InputMessage) -> bool {
        // Sequence 0 marks an unsequenced sender.
        if message.sequence != 0 {
            if let Some(last) = self.last_sequence.get(&message.player) {
                if message.sequence <= *last {
                    debug!(
                        "Dropping stale input {} from {} (last {})",
                        message.sequence, message.player, last
                    );
                    return false;
                }
            }
            self.last_sequence.insert(message.player, message.sequence);
        }

        self.latest
            .insert(message.player, message.controls.sanitized());
        if !message.actions.is_empty() {
            self.pending_actions.push((message.player, message.actions));
        }
        true
    }

    /// Snapshot of the cache for one tick. Actions are handed out once.
    pub fn frame(&mut self) -> TickInputs {
        TickInputs {
            controls: self.latest.clone(),
            actions: std::mem::take(&mut self.pending_actions),
        }
    }

    /// Drops everything known about `player`, e.g. after a disconnect.
    pub fn forget(&mut self, player: PlayerId) {
        self.latest.remove(&player);
        self.last_sequence.remove(&player);
        self.pending_actions.retain(|(p, _)| *p != player);
    }

    pub fn last_sequence(&self, player: PlayerId) -> Option<u32> {
        self.last_sequence.get(&player).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{UpgradeSlot, Vec2, GUEST_PLAYER, HOST_PLAYER};

    fn message(player: PlayerId, sequence: u32, fire: bool) -> InputMessage {
        InputMessage {
            player,
            sequence,
            controls: PlayerControls {
                movement: Vec2::new(1.0, 0.0),
                aim: Vec2::new(0.0, 1.0),
                fire,
            },
            actions: HostActions::default(),
        }
    }

    #[test]
    fn test_missing_player_defaults_to_zero() {
        let mut cache = InputCache::new();
        let frame = cache.frame();
        assert_eq!(frame.controls_for(GUEST_PLAYER), PlayerControls::default());
        assert!(frame.actions.is_empty());
    }

    #[test]
    fn test_latest_input_repeats() {
        let mut cache = InputCache::new();
        assert!(cache.submit(&message(GUEST_PLAYER, 1, true)));

        for _ in 0..3 {
            let frame = cache.frame();
            assert!(frame.controls_for(GUEST_PLAYER).fire);
        }
    }

    #[test]
    fn test_stale_sequence_dropped() {
        let mut cache = InputCache::new();
        assert!(cache.submit(&message(GUEST_PLAYER, 5, true)));
        assert!(!cache.submit(&message(GUEST_PLAYER, 4, false)));
        assert!(!cache.submit(&message(GUEST_PLAYER, 5, false)));
        assert!(cache.frame().controls_for(GUEST_PLAYER).fire);
        assert_eq!(cache.last_sequence(GUEST_PLAYER), Some(5));

        // Sequences are tracked per player.
        assert!(cache.submit(&message(HOST_PLAYER, 1, false)));
    }

    #[test]
    fn test_actions_are_one_shot() {
        let mut cache = InputCache::new();
        let mut msg = message(HOST_PLAYER, 1, false);
        msg.actions.buy = Some(UpgradeSlot::FireRate);
        cache.submit(&msg);

        let first = cache.frame();
        assert_eq!(first.actions.len(), 1);
        assert_eq!(first.actions[0].0, HOST_PLAYER);
        assert!(cache.frame().actions.is_empty());
    }

    #[test]
    fn test_forget_resets_sequence() {
        let mut cache = InputCache::new();
        cache.submit(&message(GUEST_PLAYER, 10, true));
        cache.forget(GUEST_PLAYER);

        assert_eq!(cache.frame().controls_for(GUEST_PLAYER), PlayerControls::default());
        // A reconnecting client starts counting from 1 again.
        assert!(cache.submit(&message(GUEST_PLAYER, 1, false)));
    }

    #[test]
    fn test_controls_sanitized_on_submit() {
        let mut cache = InputCache::new();
        let mut msg = message(GUEST_PLAYER, 1, false);
        msg.controls.movement = Vec2::new(50.0, f32::INFINITY);
        cache.submit(&msg);
        assert_eq!(
            cache.frame().controls_for(GUEST_PLAYER).movement,
            Vec2::new(1.0, 0.0)
        );
    }
}
