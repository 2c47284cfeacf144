//! Discrete per-tick events emitted by the simulation for presentation and audio.

use crate::entity::{EntityId, EntityVariant, PlayerId, PowerUpKind};
use crate::world::UpgradeSlot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyCause {
    Killed,
    Expired,
    Collected,
    /// A projectile that struck its target.
    Impact,
    /// An enemy that reached and damaged the core.
    ReachedCore,
    /// Removed because its boss went down.
    Dispersed,
}

/// Why the engine refused a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseRejection {
    #[error("only the host may buy upgrades")]
    NotHost,
    #[error("the shop is closed")]
    ShopClosed,
    #[error("upgrade is already at its maximum level")]
    MaxLevel,
    #[error("costs {cost} coins but only {balance} available")]
    InsufficientCoins { cost: u32, balance: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    WaveStarted {
        wave: u32,
        boss: bool,
    },
    WaveCleared {
        wave: u32,
    },
    ShopOpened {
        wave: u32,
    },
    EntityDestroyed {
        id: EntityId,
        variant: EntityVariant,
        cause: DestroyCause,
    },
    PlayerDowned {
        player: PlayerId,
    },
    PlayerRespawned {
        player: PlayerId,
    },
    PowerUpCollected {
        player: PlayerId,
        kind: PowerUpKind,
    },
    PurchaseAccepted {
        player: PlayerId,
        slot: UpgradeSlot,
        level: u8,
        cost: u32,
    },
    PurchaseRejected {
        player: PlayerId,
        slot: UpgradeSlot,
        reason: PurchaseRejection,
    },
    GameOver {
        wave: u32,
    },
    Victory {
        wave: u32,
    },
    Restarted,
}
