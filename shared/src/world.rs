//! The World State aggregate.
//!
//! `WorldState` is plain data owned by whoever runs a session: the host's
//! simulation engine mutates it, the client overwrites it from snapshots.
//! Maps are ordered so that two identical worlds always serialize to
//! identical bytes.

use crate::entity::{Entity, EntityId, EntityKind, PlayerId, PlayerState};
use crate::math::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Session phase driving the wave loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WavePhase {
    /// The next wave is being set up. Lasts one tick.
    #[default]
    Spawning,
    Combat,
    /// All hostiles of the wave are gone. Lasts one tick.
    Cleared,
    Shop,
    GameOver,
}

/// One of the four purchasable upgrade tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeSlot {
    FireRate,
    Damage,
    Spread,
    Piercing,
}

impl UpgradeSlot {
    pub const ALL: [UpgradeSlot; 4] = [
        UpgradeSlot::FireRate,
        UpgradeSlot::Damage,
        UpgradeSlot::Spread,
        UpgradeSlot::Piercing,
    ];

    /// Maps the shop keys 1–4 onto slots.
    pub fn from_key(key: u8) -> Option<UpgradeSlot> {
        match key {
            1 => Some(UpgradeSlot::FireRate),
            2 => Some(UpgradeSlot::Damage),
            3 => Some(UpgradeSlot::Spread),
            4 => Some(UpgradeSlot::Piercing),
            _ => None,
        }
    }

    pub fn max_level(&self) -> u8 {
        match self {
            UpgradeSlot::FireRate => 5,
            UpgradeSlot::Damage => 5,
            UpgradeSlot::Spread => 2,
            UpgradeSlot::Piercing => 1,
        }
    }

    fn base_cost(&self) -> u32 {
        match self {
            UpgradeSlot::FireRate => 20,
            UpgradeSlot::Damage => 30,
            UpgradeSlot::Spread => 60,
            UpgradeSlot::Piercing => 120,
        }
    }

    /// Price of the next level when the slot is at `current_level`.
    /// Returns None once the slot is maxed out.
    pub fn cost(&self, current_level: u8) -> Option<u32> {
        if current_level >= self.max_level() {
            return None;
        }
        Some(self.base_cost() * (current_level as u32 + 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpgradeLevels {
    pub fire_rate: u8,
    pub damage: u8,
    pub spread: u8,
    pub piercing: u8,
}

impl UpgradeLevels {
    pub fn level(&self, slot: UpgradeSlot) -> u8 {
        match slot {
            UpgradeSlot::FireRate => self.fire_rate,
            UpgradeSlot::Damage => self.damage,
            UpgradeSlot::Spread => self.spread,
            UpgradeSlot::Piercing => self.piercing,
        }
    }

    pub fn level_mut(&mut self, slot: UpgradeSlot) -> &mut u8 {
        match slot {
            UpgradeSlot::FireRate => &mut self.fire_rate,
            UpgradeSlot::Damage => &mut self.damage,
            UpgradeSlot::Spread => &mut self.spread,
            UpgradeSlot::Piercing => &mut self.piercing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldState {
    /// Incremented once per `advance`; never reset within a session.
    pub tick: u64,
    pub wave: u32,
    pub phase: WavePhase,
    pub entities: BTreeMap<EntityId, Entity>,
    pub coins: BTreeMap<PlayerId, u32>,
    pub upgrades: BTreeMap<PlayerId, UpgradeLevels>,
    /// Seconds left before the shop closes on its own.
    pub shop_remaining: f32,
    /// Seconds left in the current wave's spawn window.
    pub wave_timer: f32,
    pub enemies_to_spawn: u32,
    pub spawn_cooldown: f32,
    pub victory: bool,
    next_entity_id: EntityId,
}

impl WorldState {
    /// An empty world at wave 1, before the first spawn tick.
    pub fn new() -> Self {
        Self {
            wave: 1,
            next_entity_id: 1,
            ..Default::default()
        }
    }

    /// Hands out the next entity id. Ids are never reused within a world.
    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub fn next_entity_id(&self) -> EntityId {
        self.next_entity_id
    }

    /// Inserts an entity built around a freshly allocated id.
    pub fn spawn(&mut self, position: Vec2, health: u32, kind: EntityKind) -> EntityId {
        let id = self.allocate_id();
        self.entities
            .insert(id, Entity::new(id, position, health, kind));
        id
    }

    pub fn shop_open(&self) -> bool {
        self.phase == WavePhase::Shop
    }

    pub fn game_over(&self) -> bool {
        self.phase == WavePhase::GameOver
    }

    pub fn is_boss_wave(&self) -> bool {
        self.wave % crate::BOSS_WAVE_INTERVAL == 0
    }

    /// Coins earned by `player` and not yet spent.
    pub fn coins_of(&self, player: PlayerId) -> u32 {
        self.coins.get(&player).copied().unwrap_or(0)
    }

    /// The shared purse: every player's coins together.
    pub fn team_coins(&self) -> u32 {
        self.coins.values().sum()
    }

    /// Takes `amount` from the shared purse, emptying `payer`'s balance
    /// first and then the others in player order. Returns false, leaving
    /// every balance as it was, when the purse is short.
    pub fn spend_team_coins(&mut self, payer: PlayerId, amount: u32) -> bool {
        if self.team_coins() < amount {
            return false;
        }
        let mut order: Vec<PlayerId> = self.coins.keys().copied().collect();
        order.sort_by_key(|player| *player != payer);

        let mut remaining = amount;
        for player in order {
            if remaining == 0 {
                break;
            }
            if let Some(balance) = self.coins.get_mut(&player) {
                let taken = remaining.min(*balance);
                *balance -= taken;
                remaining -= taken;
            }
        }
        true
    }

    pub fn upgrades_of(&self, player: PlayerId) -> UpgradeLevels {
        self.upgrades.get(&player).copied().unwrap_or_default()
    }

    /// Finds the avatar entity of `player`.
    pub fn player_entity(&self, player: PlayerId) -> Option<&Entity> {
        self.entities
            .values()
            .find(|e| e.as_player().map(|p| p.player) == Some(player))
    }

    pub fn player_entity_mut(&mut self, player: PlayerId) -> Option<&mut Entity> {
        self.entities
            .values_mut()
            .find(|e| e.as_player().map(|p| p.player) == Some(player))
    }

    /// Players that currently have an avatar, in id order.
    pub fn players(&self) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self
            .entities
            .values()
            .filter_map(|e| e.as_player().map(|p| p.player))
            .collect();
        players.sort();
        players
    }

    pub fn player_states(&self) -> impl Iterator<Item = (&Entity, &PlayerState)> {
        self.entities
            .values()
            .filter_map(|e| e.as_player().map(|p| (e, p)))
    }

    pub fn core(&self) -> Option<&Entity> {
        self.entities
            .values()
            .find(|e| matches!(e.kind, EntityKind::CoreObjective))
    }

    /// Number of enemies and bosses still alive.
    pub fn hostile_count(&self) -> usize {
        self.entities
            .values()
            .filter(|e| e.is_hostile_unit())
            .count()
    }

    pub fn boss_count(&self) -> usize {
        self.entities
            .values()
            .filter(|e| matches!(e.kind, EntityKind::Boss(_)))
            .count()
    }

    pub fn enemy_count(&self) -> usize {
        self.entities
            .values()
            .filter(|e| matches!(e.kind, EntityKind::Enemy(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EnemyState, GUEST_PLAYER, HOST_PLAYER};

    #[test]
    fn test_new_world() {
        let world = WorldState::new();
        assert_eq!(world.tick, 0);
        assert_eq!(world.wave, 1);
        assert_eq!(world.phase, WavePhase::Spawning);
        assert!(world.entities.is_empty());
        assert!(!world.shop_open());
        assert!(!world.game_over());
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut world = WorldState::new();
        let kind = EntityKind::Enemy(EnemyState {
            speed: 1.0,
            coin_value: 1,
            last_hit_by: None,
        });
        let a = world.spawn(Vec2::ZERO, 1, kind.clone());
        world.entities.remove(&a);
        let b = world.spawn(Vec2::ZERO, 1, kind);
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_upgrade_costs_increase() {
        for slot in UpgradeSlot::ALL {
            let mut last = 0;
            for level in 0..slot.max_level() {
                let cost = slot.cost(level).unwrap();
                assert!(cost > last, "{:?} cost must grow", slot);
                last = cost;
            }
            assert_eq!(slot.cost(slot.max_level()), None);
        }
    }

    #[test]
    fn test_upgrade_slot_keys() {
        assert_eq!(UpgradeSlot::from_key(1), Some(UpgradeSlot::FireRate));
        assert_eq!(UpgradeSlot::from_key(4), Some(UpgradeSlot::Piercing));
        assert_eq!(UpgradeSlot::from_key(0), None);
        assert_eq!(UpgradeSlot::from_key(5), None);
    }

    #[test]
    fn test_player_lookup() {
        let mut world = WorldState::new();
        world.spawn(
            Vec2::new(1.0, 2.0),
            220,
            EntityKind::Player(PlayerState {
                player: HOST_PLAYER,
                ..Default::default()
            }),
        );
        assert_eq!(world.players(), vec![HOST_PLAYER]);
        assert_eq!(
            world.player_entity(HOST_PLAYER).map(|e| e.position),
            Some(Vec2::new(1.0, 2.0))
        );
        assert_eq!(world.coins_of(HOST_PLAYER), 0);
    }

    #[test]
    fn test_coin_map_serializes_with_player_keys() {
        let mut world = WorldState::new();
        world.coins.insert(HOST_PLAYER, 12);
        let json = serde_json::to_string(&world).unwrap();
        let back: WorldState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.coins_of(HOST_PLAYER), 12);
        assert_eq!(back, world);
    }

    #[test]
    fn test_team_purse_spends_payer_first() {
        let mut world = WorldState::new();
        world.coins.insert(HOST_PLAYER, 15);
        world.coins.insert(GUEST_PLAYER, 40);
        assert_eq!(world.team_coins(), 55);

        assert!(world.spend_team_coins(HOST_PLAYER, 20));
        assert_eq!(world.coins_of(HOST_PLAYER), 0);
        assert_eq!(world.coins_of(GUEST_PLAYER), 35);

        let before = world.clone();
        assert!(!world.spend_team_coins(HOST_PLAYER, 36));
        assert_eq!(world, before);
    }
}
