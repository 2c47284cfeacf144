//! Wire vocabulary exchanged between host and client.
//!
//! Every message is one `Packet`, encoded as a compact JSON object carrying a
//! `"type"` tag. Framing lives in `framing`.

use crate::entity::{Entity, PlayerId};
use crate::events::GameEvent;
use crate::math::Vec2;
use crate::world::{UpgradeLevels, UpgradeSlot, WavePhase, WorldState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    // Client -> host
    Hello { protocol_version: u32 },
    Input(InputMessage),
    Goodbye,

    // Host -> client
    Welcome { player: PlayerId, tick: u64 },
    Rejected { reason: String },
    Snapshot(SnapshotMessage),
}

/// Continuous control state of one player. The all-zero value means
/// "standing still, not firing".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerControls {
    /// Desired movement direction, components in `[-1, 1]`.
    #[serde(default)]
    pub movement: Vec2,
    /// Aim direction; only its direction matters.
    #[serde(default)]
    pub aim: Vec2,
    #[serde(default)]
    pub fire: bool,
}

impl PlayerControls {
    /// Clamps stick values and strips non-finite numbers.
    pub fn sanitized(&self) -> PlayerControls {
        PlayerControls {
            movement: self.movement.clamp_unit(),
            aim: self.aim.clamp_unit(),
            fire: self.fire,
        }
    }
}

/// One-shot actions only honoured when they come from the host player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostActions {
    #[serde(default)]
    pub restart: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy: Option<UpgradeSlot>,
    #[serde(default)]
    pub skip_shop: bool,
}

impl HostActions {
    pub fn is_empty(&self) -> bool {
        !self.restart && self.buy.is_none() && !self.skip_shop
    }

    /// Folds `other` into `self`; a later purchase replaces an earlier one.
    pub fn merge(&mut self, other: HostActions) {
        self.restart |= other.restart;
        self.skip_shop |= other.skip_shop;
        if other.buy.is_some() {
            self.buy = other.buy;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputMessage {
    pub player: PlayerId,
    #[serde(default)]
    pub sequence: u32,
    #[serde(flatten)]
    pub controls: PlayerControls,
    #[serde(default, skip_serializing_if = "HostActions::is_empty")]
    pub actions: HostActions,
}

/// Full world view for one tick, as sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMessage {
    pub tick: u64,
    pub wave: u32,
    pub phase: WavePhase,
    pub shop_open: bool,
    pub game_over: bool,
    #[serde(default)]
    pub victory: bool,
    #[serde(default)]
    pub shop_remaining: f32,
    pub coins: BTreeMap<PlayerId, u32>,
    #[serde(default)]
    pub upgrades: BTreeMap<PlayerId, UpgradeLevels>,
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<GameEvent>,
}

impl SnapshotMessage {
    /// Captures `world` after all mutations of a tick.
    pub fn capture(world: &WorldState, events: Vec<GameEvent>) -> Self {
        Self {
            tick: world.tick,
            wave: world.wave,
            phase: world.phase,
            shop_open: world.shop_open(),
            game_over: world.game_over(),
            victory: world.victory,
            shop_remaining: world.shop_remaining,
            coins: world.coins.clone(),
            upgrades: world.upgrades.clone(),
            entities: world.entities.values().cloned().collect(),
            events,
        }
    }

    /// Replaces the replicated parts of `world` with this snapshot.
    /// Entities missing from the snapshot are dropped, unknown ones are
    /// created as-is.
    pub fn apply_to(&self, world: &mut WorldState) {
        world.tick = self.tick;
        world.wave = self.wave;
        world.phase = self.phase;
        world.victory = self.victory;
        world.shop_remaining = self.shop_remaining;
        world.coins = self.coins.clone();
        world.upgrades = self.upgrades.clone();
        world.entities = self
            .entities
            .iter()
            .map(|entity| (entity.id, entity.clone()))
            .collect();
    }
}
