//! Entity representation shared by the host simulation and the client mirror.
//!
//! Every simulated object is one `Entity`: the spatial and vital fields are
//! common, the variant-specific payload lives in `EntityKind`.

use crate::math::Vec2;
use crate::{
    BOSS_HIT_RADIUS, CORE_HIT_RADIUS, ENEMY_RADIUS, PICKUP_RADIUS, PLAYER_RADIUS,
    PROJECTILE_RADIUS,
};
use serde::{Deserialize, Serialize};

pub type EntityId = u32;

/// Identifies one of the (at most two) participants of a session.
///
/// Serialized as a bare integer. As a JSON map key it becomes a string, so
/// deserialization accepts both forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(pub u8);

impl Serialize for PlayerId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PlayerIdVisitor;

        impl<'de> serde::de::Visitor<'de> for PlayerIdVisitor {
            type Value = PlayerId;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a player number")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<PlayerId, E> {
                u8::try_from(v)
                    .map(PlayerId)
                    .map_err(|_| E::custom(format!("player number {} out of range", v)))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<PlayerId, E> {
                u8::try_from(v)
                    .map(PlayerId)
                    .map_err(|_| E::custom(format!("player number {} out of range", v)))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<PlayerId, E> {
                v.parse::<u8>()
                    .map(PlayerId)
                    .map_err(|_| E::custom(format!("invalid player number {:?}", v)))
            }
        }

        deserializer.deserialize_any(PlayerIdVisitor)
    }
}

/// The player driven by the machine running the simulation.
pub const HOST_PLAYER: PlayerId = PlayerId(1);
/// The player driven by the remote client.
pub const GUEST_PLAYER: PlayerId = PlayerId(2);

impl PlayerId {
    pub fn is_host(&self) -> bool {
        *self == HOST_PLAYER
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Facing or aim angle in radians.
    pub facing: f32,
    pub health: u32,
    pub max_health: u32,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum EntityKind {
    Player(PlayerState),
    Enemy(EnemyState),
    Boss(BossState),
    Projectile(ProjectileState),
    Pickup(PickupState),
    CoreObjective,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerState {
    pub player: PlayerId,
    /// Seconds until the weapon may fire again.
    pub cooldown: f32,
    pub shield_remaining: f32,
    pub overdrive_remaining: f32,
    pub magnet_remaining: f32,
    pub downed: bool,
    pub respawn_remaining: f32,
}

impl Default for PlayerId {
    fn default() -> Self {
        HOST_PLAYER
    }
}

impl PlayerState {
    pub fn shield_active(&self) -> bool {
        self.shield_remaining > 0.0
    }

    pub fn overdrive_active(&self) -> bool {
        self.overdrive_remaining > 0.0
    }

    pub fn magnet_active(&self) -> bool {
        self.magnet_remaining > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyState {
    pub speed: f32,
    pub coin_value: u32,
    /// Player credited if this enemy dies before reaching the core.
    pub last_hit_by: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossState {
    /// Attack pattern index, cycles 0 → 1 → 2.
    pub phase: u8,
    pub phase_timer: f32,
    pub last_hit_by: Option<PlayerId>,
}

/// Which side a projectile damages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    /// Fired by a player, damages enemies and bosses.
    Player(PlayerId),
    /// Fired by a boss, damages players.
    Hostile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    pub faction: Faction,
    pub damage: u32,
    pub ttl: f32,
    pub pierce: bool,
    /// Targets already struck by a piercing projectile.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub struck: Vec<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    Health,
    Shield,
    Overdrive,
    Magnet,
    Orbital,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 5] = [
        PowerUpKind::Health,
        PowerUpKind::Shield,
        PowerUpKind::Overdrive,
        PowerUpKind::Magnet,
        PowerUpKind::Orbital,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupState {
    pub power_up: PowerUpKind,
    pub ttl: f32,
}

/// Tag-only view of `EntityKind`, used in events and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityVariant {
    Player,
    Enemy,
    Boss,
    Projectile,
    Pickup,
    CoreObjective,
}

impl Entity {
    pub fn new(id: EntityId, position: Vec2, health: u32, kind: EntityKind) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            facing: 0.0,
            health,
            max_health: health,
            kind,
        }
    }

    pub fn variant(&self) -> EntityVariant {
        match self.kind {
            EntityKind::Player(_) => EntityVariant::Player,
            EntityKind::Enemy(_) => EntityVariant::Enemy,
            EntityKind::Boss(_) => EntityVariant::Boss,
            EntityKind::Projectile(_) => EntityVariant::Projectile,
            EntityKind::Pickup(_) => EntityVariant::Pickup,
            EntityKind::CoreObjective => EntityVariant::CoreObjective,
        }
    }

    /// Collision radius used by the per-tick overlap pass.
    pub fn radius(&self) -> f32 {
        match self.kind {
            EntityKind::Player(_) => PLAYER_RADIUS,
            EntityKind::Enemy(_) => ENEMY_RADIUS,
            EntityKind::Boss(_) => BOSS_HIT_RADIUS,
            EntityKind::Projectile(_) => PROJECTILE_RADIUS,
            EntityKind::Pickup(_) => PICKUP_RADIUS,
            EntityKind::CoreObjective => CORE_HIT_RADIUS,
        }
    }

    /// Enemies and bosses: the variants that keep a wave alive.
    pub fn is_hostile_unit(&self) -> bool {
        matches!(self.kind, EntityKind::Enemy(_) | EntityKind::Boss(_))
    }

    /// Subtracts `amount` from health without going below zero.
    /// Returns true if this hit brought the entity to zero.
    pub fn apply_damage(&mut self, amount: u32) -> bool {
        let was_alive = self.health > 0;
        self.health = self.health.saturating_sub(amount);
        was_alive && self.health == 0
    }

    pub fn heal(&mut self, amount: u32) {
        self.health = self.health.saturating_add(amount).min(self.max_health);
    }

    pub fn as_player(&self) -> Option<&PlayerState> {
        match &self.kind {
            EntityKind::Player(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            EntityKind::Player(state) => Some(state),
            _ => None,
        }
    }
}
