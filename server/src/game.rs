//! The simulation engine: one fixed step of the authoritative world.

use crate::input_cache::TickInputs;
use crate::{combat, physics, powerups, shop, waves};
use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shared::{
    DestroyCause, EntityId, EntityKind, GameEvent, HostActions, PlayerId, PlayerState, Vec2,
    WavePhase, WorldState, CORE_MAX_HEALTH, FINAL_WAVE, GUEST_PLAYER, HOST_PLAYER,
    PLAYER_MAX_HEALTH,
};

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// RNG seed. Same seed and same inputs give the same world.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

/// Where a player's avatar appears on the planet.
pub fn spawn_point(player: PlayerId) -> Vec2 {
    if player == HOST_PLAYER {
        Vec2::new(0.0, -110.0)
    } else if player == GUEST_PLAYER {
        Vec2::new(0.0, 70.0)
    } else {
        Vec2::new(-70.0, 0.0)
    }
}

/// Drives a `WorldState` forward. Owns the session's random stream, which
/// only advances inside `advance`.
pub struct SimulationEngine {
    rng: ChaCha8Rng,
    config: SimConfig,
}

impl SimulationEngine {
    pub fn new(config: SimConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// A fresh world with the core and one avatar per player in `players`.
    pub fn new_world(&self, players: &[PlayerId]) -> WorldState {
        let mut world = WorldState::new();
        populate(&mut world, players);
        world
    }

    /// Adds an avatar for `player` unless one already exists.
    pub fn join_player(&mut self, world: &mut WorldState, player: PlayerId) -> EntityId {
        if let Some(existing) = world.player_entity(player) {
            return existing.id;
        }
        let id = spawn_avatar(world, player);
        info!("{} joined as entity {}", player, id);
        id
    }

    /// Removes the avatar of `player`. Its coins and upgrades are kept.
    pub fn leave_player(&mut self, world: &mut WorldState, player: PlayerId) -> Option<EntityId> {
        let id = world.player_entity(player)?.id;
        world.entities.remove(&id);
        info!("{} left, removed entity {}", player, id);
        Some(id)
    }

    /// Resets the world to wave 1. The tick counter and id allocator carry on.
    pub fn restart(&mut self, world: &mut WorldState) {
        let mut players = world.players();
        if players.is_empty() {
            players.push(HOST_PLAYER);
        }

        world.entities.clear();
        world.wave = 1;
        world.phase = WavePhase::Spawning;
        world.coins.clear();
        world.upgrades.clear();
        world.shop_remaining = 0.0;
        world.wave_timer = 0.0;
        world.enemies_to_spawn = 0;
        world.spawn_cooldown = 0.0;
        world.victory = false;
        populate(world, &players);
        info!("World restarted at tick {}", world.tick);
    }

    /// Advances `world` by one step of `dt` seconds and returns what happened.
    pub fn advance(
        &mut self,
        world: &mut WorldState,
        inputs: &TickInputs,
        dt: f32,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();
        world.tick += 1;

        let host_actions = collect_host_actions(inputs);
        if host_actions.restart {
            self.restart(world);
            events.push(GameEvent::Restarted);
            return events;
        }

        // Purchases are only honoured while the shop is open; anything else is
        // reported back as a rejection.
        for (player, actions) in &inputs.actions {
            if let Some(slot) = actions.buy {
                shop::purchase_with_event(world, *player, slot, &mut events);
            }
        }

        match world.phase {
            WavePhase::GameOver => {}
            WavePhase::Spawning => {
                waves::begin_wave(world, &mut self.rng, &mut events);
                world.phase = WavePhase::Combat;
                self.combat_step(world, inputs, dt, &mut events);
            }
            WavePhase::Combat => self.combat_step(world, inputs, dt, &mut events),
            WavePhase::Cleared => shop::open_shop(world, &mut events),
            WavePhase::Shop => {
                if shop::tick_shop(world, dt, host_actions.skip_shop) {
                    shop::close_shop(world, &mut events);
                    world.wave += 1;
                    world.phase = WavePhase::Spawning;
                    debug!("Shop closed, next wave {}", world.wave);
                }
            }
        }

        events
    }

    fn combat_step(
        &mut self,
        world: &mut WorldState,
        inputs: &TickInputs,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) {
        // Input first, then movement, spawns and collisions.
        for entity in world.entities.values_mut() {
            let Some((player, downed)) = entity.as_player().map(|s| (s.player, s.downed)) else {
                continue;
            };
            if downed {
                entity.velocity = Vec2::ZERO;
                continue;
            }
            let controls = inputs.controls_for(player);
            physics::steer_player(entity, &controls, dt);
        }
        physics::separate_players(world);

        combat::fire_weapons(world, inputs, dt);
        combat::move_projectiles(world, dt, events);
        waves::update_enemies(world, dt, events);
        waves::update_bosses(world, &mut self.rng, dt);
        waves::trickle_spawn(world, &mut self.rng, dt);

        combat::resolve_hits(world, events);
        powerups::update_pickups(world, dt, events);
        combat::reap_hostiles(world, &mut self.rng, events);
        powerups::tick_effects(world, dt);
        combat::update_player_vitals(world, dt, events);

        if self.check_defeat(world, events) {
            return;
        }

        if world.hostile_count() == 0 && world.enemies_to_spawn == 0 {
            self.clear_wave(world, events);
        }
    }

    fn check_defeat(&mut self, world: &mut WorldState, events: &mut Vec<GameEvent>) -> bool {
        let core = world.core().map(|c| (c.id, c.health));
        let core_destroyed = match core {
            Some((id, 0)) => {
                combat::destroy(world, id, DestroyCause::Killed, events);
                true
            }
            _ => false,
        };

        let all_downed = {
            let mut players = world.player_states().peekable();
            players.peek().is_some() && players.all(|(_, state)| state.downed)
        };

        if core_destroyed || all_downed {
            world.phase = WavePhase::GameOver;
            events.push(GameEvent::GameOver { wave: world.wave });
            info!(
                "Game over on wave {} ({})",
                world.wave,
                if core_destroyed {
                    "core destroyed"
                } else {
                    "all players down"
                }
            );
            return true;
        }
        false
    }

    fn clear_wave(&mut self, world: &mut WorldState, events: &mut Vec<GameEvent>) {
        // Shots still in flight would hit nothing during the shop.
        let projectiles: Vec<EntityId> = world
            .entities
            .values()
            .filter(|e| matches!(e.kind, EntityKind::Projectile(_)))
            .map(|e| e.id)
            .collect();
        for id in projectiles {
            combat::destroy(world, id, DestroyCause::Expired, events);
        }

        world.phase = WavePhase::Cleared;
        events.push(GameEvent::WaveCleared { wave: world.wave });
        info!("Wave {} cleared", world.wave);

        if world.wave >= FINAL_WAVE && !world.victory {
            world.victory = true;
            events.push(GameEvent::Victory { wave: world.wave });
            info!("Final wave {} cleared", world.wave);
        }
    }
}

/// Merges the actions of the host. Restart and skip from anyone else are ignored.
fn collect_host_actions(inputs: &TickInputs) -> HostActions {
    let mut merged = HostActions::default();
    for (player, actions) in &inputs.actions {
        if player.is_host() {
            merged.merge(*actions);
        }
    }
    merged
}

fn spawn_avatar(world: &mut WorldState, player: PlayerId) -> EntityId {
    world.coins.entry(player).or_insert(0);
    world.upgrades.entry(player).or_default();
    world.spawn(
        spawn_point(player),
        PLAYER_MAX_HEALTH,
        EntityKind::Player(PlayerState {
            player,
            ..Default::default()
        }),
    )
}

fn populate(world: &mut WorldState, players: &[PlayerId]) {
    world.spawn(Vec2::ZERO, CORE_MAX_HEALTH, EntityKind::CoreObjective);
    for player in players {
        spawn_avatar(world, *player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        EnemyState, PlayerControls, PurchaseRejection, UpgradeSlot, ENEMY_COIN_VALUE,
        SHOP_DURATION,
    };

    const DT: f32 = 1.0 / 30.0;

    fn engine() -> SimulationEngine {
        SimulationEngine::new(SimConfig { seed: 1234 })
    }

    fn two_player_world(engine: &SimulationEngine) -> WorldState {
        engine.new_world(&[HOST_PLAYER, GUEST_PLAYER])
    }

    fn buy(slot: UpgradeSlot) -> HostActions {
        HostActions {
            buy: Some(slot),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_world_layout() {
        let engine = engine();
        let world = two_player_world(&engine);
        assert_eq!(world.wave, 1);
        assert_eq!(world.phase, WavePhase::Spawning);
        assert!(world.core().is_some());
        assert_eq!(world.players(), vec![HOST_PLAYER, GUEST_PLAYER]);
        assert_eq!(world.coins_of(GUEST_PLAYER), 0);
    }

    #[test]
    fn test_first_tick_starts_wave() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        let events = engine.advance(&mut world, &TickInputs::default(), DT);

        assert_eq!(world.tick, 1);
        assert_eq!(world.phase, WavePhase::Combat);
        assert!(events.contains(&GameEvent::WaveStarted {
            wave: 1,
            boss: false
        }));
        // The first roster enemy arrives on the same tick.
        assert_eq!(world.enemy_count(), 1);
    }

    #[test]
    fn test_determinism() {
        let run = || {
            let mut engine = engine();
            let mut world = two_player_world(&engine);
            let inputs = TickInputs::default().with_controls(
                GUEST_PLAYER,
                PlayerControls {
                    movement: Vec2::new(0.5, -1.0),
                    aim: Vec2::new(1.0, 0.3),
                    fire: true,
                },
            );
            let mut log = Vec::new();
            for _ in 0..300 {
                log.extend(engine.advance(&mut world, &inputs, DT));
            }
            (serde_json::to_string(&world).unwrap(), log)
        };

        let (world_a, events_a) = run();
        let (world_b, events_b) = run();
        assert_eq!(world_a, world_b);
        assert_eq!(events_a, events_b);
    }

    #[test]
    fn test_wave_four_last_enemy_scenario() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        world.wave = 4;
        world.phase = WavePhase::Combat;
        world.enemies_to_spawn = 0;
        if let Some(guest) = world.player_entity_mut(GUEST_PLAYER) {
            guest.position = Vec2::new(100.0, 0.0);
        }
        let enemy = world.spawn(
            Vec2::new(120.0, 0.0),
            1,
            EntityKind::Enemy(EnemyState {
                speed: 0.0,
                coin_value: ENEMY_COIN_VALUE,
                last_hit_by: None,
            }),
        );

        let inputs = TickInputs::default().with_controls(
            GUEST_PLAYER,
            PlayerControls {
                movement: Vec2::ZERO,
                aim: Vec2::new(1.0, 0.0),
                fire: true,
            },
        );
        let events = engine.advance(&mut world, &inputs, DT);

        assert!(!world.entities.contains_key(&enemy));
        assert_eq!(world.coins_of(GUEST_PLAYER), ENEMY_COIN_VALUE);
        assert!(events.contains(&GameEvent::WaveCleared { wave: 4 }));
        assert!(!world.shop_open());

        let events = engine.advance(&mut world, &TickInputs::default(), DT);
        assert!(world.shop_open());
        assert!(events.contains(&GameEvent::ShopOpened { wave: 4 }));
        assert_eq!(world.wave, 4);
    }

    #[test]
    fn test_boss_cadence() {
        let mut engine = engine();
        for wave in 1..=20 {
            let mut world = two_player_world(&engine);
            world.wave = wave;
            engine.advance(&mut world, &TickInputs::default(), DT);
            if wave % 5 == 0 {
                assert_eq!(world.boss_count(), 1, "wave {}", wave);
                assert_eq!(world.enemies_to_spawn, 0);
            } else {
                assert_eq!(world.boss_count(), 0, "wave {}", wave);
                assert!(world.enemies_to_spawn > 0);
            }
        }
    }

    #[test]
    fn test_non_host_purchase_rejected() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        world.phase = WavePhase::Shop;
        world.shop_remaining = SHOP_DURATION;
        world.coins.insert(GUEST_PLAYER, 500);
        world.coins.insert(HOST_PLAYER, 500);
        let coins_before = world.coins.clone();
        let upgrades_before = world.upgrades.clone();

        let inputs = TickInputs::default().with_actions(GUEST_PLAYER, buy(UpgradeSlot::Damage));
        let events = engine.advance(&mut world, &inputs, DT);

        assert_eq!(world.coins, coins_before);
        assert_eq!(world.upgrades, upgrades_before);
        assert!(events.contains(&GameEvent::PurchaseRejected {
            player: GUEST_PLAYER,
            slot: UpgradeSlot::Damage,
            reason: PurchaseRejection::NotHost,
        }));
    }

    #[test]
    fn test_host_purchase_in_shop() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        world.phase = WavePhase::Shop;
        world.shop_remaining = SHOP_DURATION;
        world.coins.insert(HOST_PLAYER, 35);

        let inputs = TickInputs::default().with_actions(HOST_PLAYER, buy(UpgradeSlot::Damage));
        let events = engine.advance(&mut world, &inputs, DT);

        assert_eq!(world.coins_of(HOST_PLAYER), 5);
        assert_eq!(world.upgrades_of(HOST_PLAYER).damage, 1);
        assert!(events.contains(&GameEvent::PurchaseAccepted {
            player: HOST_PLAYER,
            slot: UpgradeSlot::Damage,
            level: 1,
            cost: 30,
        }));
    }

    #[test]
    fn test_purchase_outside_shop_rejected() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        world.coins.insert(HOST_PLAYER, 500);

        let inputs = TickInputs::default().with_actions(HOST_PLAYER, buy(UpgradeSlot::FireRate));
        let events = engine.advance(&mut world, &inputs, DT);
        assert_eq!(world.coins_of(HOST_PLAYER), 500);
        assert!(events.contains(&GameEvent::PurchaseRejected {
            player: HOST_PLAYER,
            slot: UpgradeSlot::FireRate,
            reason: PurchaseRejection::ShopClosed,
        }));
    }

    #[test]
    fn test_shop_skip_starts_next_wave() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        world.wave = 2;
        world.phase = WavePhase::Shop;
        world.shop_remaining = SHOP_DURATION;

        // The guest cannot skip.
        let guest_skip = TickInputs::default().with_actions(
            GUEST_PLAYER,
            HostActions {
                skip_shop: true,
                ..Default::default()
            },
        );
        engine.advance(&mut world, &guest_skip, DT);
        assert!(world.shop_open());

        let host_skip = TickInputs::default().with_actions(
            HOST_PLAYER,
            HostActions {
                skip_shop: true,
                ..Default::default()
            },
        );
        engine.advance(&mut world, &host_skip, DT);
        assert_eq!(world.wave, 3);
        assert_eq!(world.phase, WavePhase::Spawning);

        let events = engine.advance(&mut world, &TickInputs::default(), DT);
        assert!(events.contains(&GameEvent::WaveStarted {
            wave: 3,
            boss: false
        }));
    }

    #[test]
    fn test_shop_times_out() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        world.phase = WavePhase::Shop;
        world.shop_remaining = SHOP_DURATION;

        let ticks = (SHOP_DURATION / DT).ceil() as usize + 1;
        for _ in 0..ticks {
            engine.advance(&mut world, &TickInputs::default(), DT);
            if !world.shop_open() {
                break;
            }
        }
        assert_eq!(world.wave, 2);
    }

    #[test]
    fn test_core_destroyed_freezes_world() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        world.phase = WavePhase::Combat;
        world.enemies_to_spawn = 5;
        let core = world.core().map(|c| c.id).unwrap();
        if let Some(c) = world.entities.get_mut(&core) {
            c.apply_damage(CORE_MAX_HEALTH);
        }

        let events = engine.advance(&mut world, &TickInputs::default(), DT);
        assert!(world.game_over());
        assert!(events.contains(&GameEvent::GameOver { wave: 1 }));

        let frozen = world.entities.clone();
        let inputs = TickInputs::default().with_controls(
            HOST_PLAYER,
            PlayerControls {
                movement: Vec2::new(1.0, 0.0),
                aim: Vec2::new(1.0, 0.0),
                fire: true,
            },
        );
        for _ in 0..10 {
            assert!(engine.advance(&mut world, &inputs, DT).is_empty());
        }
        assert_eq!(world.entities, frozen);
        assert_eq!(world.tick, 11);
    }

    #[test]
    fn test_all_players_down_is_game_over() {
        let mut engine = engine();
        let mut world = engine.new_world(&[HOST_PLAYER]);
        world.phase = WavePhase::Combat;
        world.enemies_to_spawn = 5;
        if let Some(host) = world.player_entity_mut(HOST_PLAYER) {
            host.apply_damage(PLAYER_MAX_HEALTH);
        }

        let events = engine.advance(&mut world, &TickInputs::default(), DT);
        assert!(events.contains(&GameEvent::PlayerDowned {
            player: HOST_PLAYER
        }));
        assert!(world.game_over());
    }

    #[test]
    fn test_restart_from_game_over() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        world.wave = 7;
        world.phase = WavePhase::GameOver;
        world.coins.insert(HOST_PLAYER, 99);
        let next_id = world.next_entity_id();

        // Only the host may restart.
        let guest = TickInputs::default().with_actions(
            GUEST_PLAYER,
            HostActions {
                restart: true,
                ..Default::default()
            },
        );
        engine.advance(&mut world, &guest, DT);
        assert!(world.game_over());

        let host = TickInputs::default().with_actions(
            HOST_PLAYER,
            HostActions {
                restart: true,
                ..Default::default()
            },
        );
        let events = engine.advance(&mut world, &host, DT);
        assert_eq!(events, vec![GameEvent::Restarted]);
        assert_eq!(world.wave, 1);
        assert_eq!(world.phase, WavePhase::Spawning);
        assert_eq!(world.tick, 2);
        assert_eq!(world.coins_of(HOST_PLAYER), 0);
        assert_eq!(world.players(), vec![HOST_PLAYER, GUEST_PLAYER]);
        // Ids keep counting up across a restart.
        assert!(world.entities.keys().all(|id| *id >= next_id));
    }

    #[test]
    fn test_wave_monotonic_over_long_run() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        let skip = TickInputs::default().with_actions(
            HOST_PLAYER,
            HostActions {
                skip_shop: true,
                ..Default::default()
            },
        );
        let mut last_wave = world.wave;
        for _ in 0..2_000 {
            engine.advance(&mut world, &skip, DT);
            assert!(world.wave >= last_wave);
            last_wave = world.wave;
            for entity in world.entities.values() {
                assert!(entity.health <= entity.max_health);
            }
        }
    }

    #[test]
    fn test_dead_entities_never_outlive_their_tick() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        let mut dead_last_tick: Vec<EntityId> = Vec::new();

        for tick in 0..3_000u32 {
            let aim = Vec2::from_angle(tick as f32 * 0.07);
            let inputs = TickInputs::default()
                .with_controls(
                    HOST_PLAYER,
                    PlayerControls {
                        movement: Vec2::ZERO,
                        aim,
                        fire: true,
                    },
                )
                .with_controls(
                    GUEST_PLAYER,
                    PlayerControls {
                        movement: Vec2::ZERO,
                        aim: aim.scale(-1.0),
                        fire: true,
                    },
                )
                .with_actions(
                    HOST_PLAYER,
                    HostActions {
                        skip_shop: true,
                        ..Default::default()
                    },
                );
            engine.advance(&mut world, &inputs, DT);

            for id in &dead_last_tick {
                assert!(
                    !world.entities.contains_key(id),
                    "entity {} still present at tick {}",
                    id,
                    world.tick
                );
            }
            dead_last_tick = world
                .entities
                .values()
                .filter(|e| e.health == 0 && e.as_player().is_none())
                .map(|e| e.id)
                .collect();
        }
    }

    #[test]
    fn test_guest_kill_funds_host_upgrade() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        world.phase = WavePhase::Shop;
        world.shop_remaining = SHOP_DURATION;
        world.coins.insert(GUEST_PLAYER, 200);

        let inputs = TickInputs::default()
            .with_actions(HOST_PLAYER, buy(UpgradeSlot::FireRate))
            .with_actions(GUEST_PLAYER, buy(UpgradeSlot::Damage));
        let events = engine.advance(&mut world, &inputs, DT);

        assert!(events.contains(&GameEvent::PurchaseAccepted {
            player: HOST_PLAYER,
            slot: UpgradeSlot::FireRate,
            level: 1,
            cost: 20,
        }));
        assert!(events.contains(&GameEvent::PurchaseRejected {
            player: GUEST_PLAYER,
            slot: UpgradeSlot::Damage,
            reason: PurchaseRejection::NotHost,
        }));
        assert_eq!(world.upgrades_of(HOST_PLAYER).fire_rate, 1);
        assert_eq!(world.coins_of(GUEST_PLAYER), 180);
        assert_eq!(world.team_coins(), 180);
    }

    #[test]
    fn test_join_and_leave() {
        let mut engine = engine();
        let mut world = engine.new_world(&[HOST_PLAYER]);
        let id = engine.join_player(&mut world, GUEST_PLAYER);
        assert_eq!(engine.join_player(&mut world, GUEST_PLAYER), id);
        assert_eq!(world.players(), vec![HOST_PLAYER, GUEST_PLAYER]);

        assert_eq!(engine.leave_player(&mut world, GUEST_PLAYER), Some(id));
        assert_eq!(world.players(), vec![HOST_PLAYER]);
        assert_eq!(engine.leave_player(&mut world, GUEST_PLAYER), None);
    }

    #[test]
    fn test_victory_after_final_wave() {
        let mut engine = engine();
        let mut world = two_player_world(&engine);
        world.wave = FINAL_WAVE;
        world.phase = WavePhase::Combat;
        world.enemies_to_spawn = 0;

        let events = engine.advance(&mut world, &TickInputs::default(), DT);
        assert!(events.contains(&GameEvent::Victory { wave: FINAL_WAVE }));
        assert!(world.victory);

        // Play goes on into the shop.
        engine.advance(&mut world, &TickInputs::default(), DT);
        assert!(world.shop_open());
    }
}
