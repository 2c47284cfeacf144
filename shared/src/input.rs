//! Local input management with sequencing.
//!
//! Both the host and the client feed `LocalCommand`s from their front end
//! into an `InputManager`, which turns them into sequenced `InputMessage`s.

use crate::entity::PlayerId;
use crate::math::Vec2;
use crate::protocol::{HostActions, InputMessage, PlayerControls};
use crate::world::UpgradeSlot;

/// A single command coming from the local front end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalCommand {
    Move(Vec2),
    Aim(Vec2),
    Fire(bool),
    Buy(UpgradeSlot),
    SkipShop,
    Restart,
    Quit,
}

/// Collects local commands and hands out sequenced input messages.
pub struct InputManager {
    player: PlayerId,
    next_sequence: u32,
    controls: PlayerControls,
    pending: HostActions,
}

impl InputManager {
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            next_sequence: 1,
            controls: PlayerControls::default(),
            pending: HostActions::default(),
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Folds a command into the current control state.
    /// Returns false for `Quit`, which the caller handles.
    pub fn apply(&mut self, command: LocalCommand) -> bool {
        match command {
            LocalCommand::Move(direction) => self.controls.movement = direction.clamp_unit(),
            LocalCommand::Aim(direction) => self.controls.aim = direction.clamp_unit(),
            LocalCommand::Fire(on) => self.controls.fire = on,
            LocalCommand::Buy(slot) => self.pending.buy = Some(slot),
            LocalCommand::SkipShop => self.pending.skip_shop = true,
            LocalCommand::Restart => self.pending.restart = true,
            LocalCommand::Quit => return false,
        }
        true
    }

    pub fn controls(&self) -> &PlayerControls {
        &self.controls
    }

    pub fn has_pending_actions(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Builds the next message. Continuous controls repeat every call,
    /// one-shot actions are sent once.
    pub fn next_message(&mut self) -> InputMessage {
        let message = InputMessage {
            player: self.player,
            sequence: self.next_sequence,
            controls: self.controls,
            actions: std::mem::take(&mut self.pending),
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);
        message
    }
}
