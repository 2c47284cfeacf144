//! Wave setup, the enemy trickle spawner, enemy steering and boss behaviour.

use crate::combat::{self, spawn_projectile};
use crate::physics;
use log::info;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use shared::{
    BossState, DestroyCause, EnemyState, EntityId, EntityKind, Faction, GameEvent,
    ProjectileState, Vec2, WorldState, HOST_PLAYER,
};
use shared::{
    BOSS_ADD_CHANCE_PER_SECOND, BOSS_AIMED_DAMAGE, BOSS_AIMED_JITTER, BOSS_AIMED_SPEED,
    BOSS_BASE_HEALTH, BOSS_FIRST_PHASE_DELAY, BOSS_HEALTH_PER_TIER, BOSS_ORBIT_RADIUS,
    BOSS_ORBIT_SPEED, BOSS_PHASE_DELAY, BOSS_RING_DAMAGE, BOSS_RING_SHOTS, BOSS_RING_SPEED,
    BOSS_SHOT_LIFETIME, BOSS_WAVE_INTERVAL, CORE_HIT_RADIUS, ENEMY_BASE_HEALTH, ENEMY_BASE_SPEED,
    ENEMY_COIN_VALUE, ENEMY_CORE_DAMAGE, ENEMY_RADIUS, ENEMY_SPAWN_RADIUS, LATE_SPAWN_INTERVAL,
    WAVE_BASE_ROSTER, WAVE_SPAWN_WINDOW,
};
use std::f32::consts::TAU;

/// Number of regular enemies trickled in during `wave`.
pub fn roster_size(wave: u32) -> u32 {
    let n = WAVE_BASE_ROSTER + wave.saturating_sub(1);
    if wave <= 3 {
        n.saturating_sub(2).max(3)
    } else {
        n
    }
}

pub fn boss_health(wave: u32) -> u32 {
    let tier = (wave / BOSS_WAVE_INTERVAL).saturating_sub(1);
    BOSS_BASE_HEALTH + tier * BOSS_HEALTH_PER_TIER
}

/// Sets up the current wave: either arms the trickle spawner or places the
/// boss. Boss waves have no roster.
pub fn begin_wave(world: &mut WorldState, rng: &mut ChaCha8Rng, events: &mut Vec<GameEvent>) {
    let boss = world.is_boss_wave();
    world.wave_timer = WAVE_SPAWN_WINDOW;
    world.spawn_cooldown = 0.0;

    if boss {
        world.enemies_to_spawn = 0;
        let side = if rng.gen::<bool>() { 1.0 } else { -1.0 };
        let health = boss_health(world.wave);
        world.spawn(
            Vec2::new(side * BOSS_ORBIT_RADIUS, 0.0),
            health,
            EntityKind::Boss(BossState {
                phase: 0,
                phase_timer: BOSS_FIRST_PHASE_DELAY,
                last_hit_by: None,
            }),
        );
        info!("Wave {} started: boss with {} hp", world.wave, health);
    } else {
        world.enemies_to_spawn = roster_size(world.wave);
        info!(
            "Wave {} started: {} enemies",
            world.wave, world.enemies_to_spawn
        );
    }

    events.push(GameEvent::WaveStarted {
        wave: world.wave,
        boss,
    });
}

/// Places one enemy on the spawn ring at a random angle.
pub fn spawn_enemy(world: &mut WorldState, rng: &mut ChaCha8Rng, hp_bonus: u32) -> EntityId {
    let angle = rng.gen_range(0.0..TAU);
    let position = Vec2::from_angle(angle).scale(ENEMY_SPAWN_RADIUS);
    world.spawn(
        position,
        ENEMY_BASE_HEALTH + hp_bonus,
        EntityKind::Enemy(EnemyState {
            speed: ENEMY_BASE_SPEED + hp_bonus as f32 * 0.7,
            coin_value: ENEMY_COIN_VALUE,
            last_hit_by: None,
        }),
    )
}

/// Spreads the remaining roster over what is left of the spawn window.
pub fn trickle_spawn(world: &mut WorldState, rng: &mut ChaCha8Rng, dt: f32) {
    if world.enemies_to_spawn == 0 {
        return;
    }

    world.wave_timer = (world.wave_timer - dt).max(0.0);
    world.spawn_cooldown -= dt;
    if world.spawn_cooldown > 0.0 {
        return;
    }

    let bonus = world.wave.saturating_sub(1) / 3;
    spawn_enemy(world, rng, bonus);
    world.enemies_to_spawn -= 1;

    if world.enemies_to_spawn > 0 {
        world.spawn_cooldown = if world.wave_timer > 0.0 {
            world.wave_timer / world.enemies_to_spawn as f32
        } else {
            LATE_SPAWN_INTERVAL
        };
    }
}

/// Walks enemies towards the core. An enemy that reaches it damages the core
/// and is removed. Its coins still go into the purse: to the last player who
/// hit it, or to the host when nobody did.
pub fn update_enemies(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) {
    let core_id = world.core().map(|c| c.id);
    let reach = ENEMY_RADIUS + CORE_HIT_RADIUS;
    let mut arrived = Vec::new();

    for entity in world.entities.values_mut() {
        let speed = match &entity.kind {
            EntityKind::Enemy(state) => state.speed,
            _ => continue,
        };
        let heading = (Vec2::ZERO - entity.position).normalize();
        entity.velocity = heading.scale(speed);
        entity.facing = heading.angle();
        physics::integrate(entity, dt);

        if entity.position.magnitude_squared() <= reach * reach {
            arrived.push(entity.id);
        }
    }

    for id in arrived {
        let removed = combat::destroy(world, id, DestroyCause::ReachedCore, events);
        if let Some(core) = core_id.and_then(|id| world.entities.get_mut(&id)) {
            core.apply_damage(ENEMY_CORE_DAMAGE);
        }
        if let Some(EntityKind::Enemy(state)) = removed.map(|e| e.kind) {
            let payee = state.last_hit_by.unwrap_or(HOST_PLAYER);
            *world.coins.entry(payee).or_insert(0) += state.coin_value;
        }
    }
}

/// Orbits bosses around the planet and runs their attack cycle.
pub fn update_bosses(world: &mut WorldState, rng: &mut ChaCha8Rng, dt: f32) {
    let bosses: Vec<EntityId> = world
        .entities
        .values()
        .filter(|e| matches!(e.kind, EntityKind::Boss(_)) && e.health > 0)
        .map(|e| e.id)
        .collect();

    for id in bosses {
        let Some(boss) = world.entities.get_mut(&id) else {
            continue;
        };
        let EntityKind::Boss(state) = &mut boss.kind else {
            continue;
        };

        let direction = if state.phase % 2 == 0 { 1.0 } else { -1.0 };
        state.phase_timer -= dt;
        let attack = if state.phase_timer <= 0.0 {
            let phase = state.phase;
            state.phase_timer = BOSS_PHASE_DELAY;
            state.phase = (state.phase + 1) % 3;
            Some(phase)
        } else {
            None
        };

        let previous = boss.position;
        let angle = previous.angle() + BOSS_ORBIT_SPEED * dt * direction;
        boss.position = Vec2::from_angle(angle).scale(BOSS_ORBIT_RADIUS);
        if dt > 0.0 {
            boss.velocity = (boss.position - previous).scale(1.0 / dt);
        }
        boss.facing = (Vec2::ZERO - boss.position).angle();
        let origin = boss.position;

        match attack {
            Some(0) => ring_volley(world, rng, origin),
            Some(1) => aimed_volley(world, rng, origin),
            Some(_) => {
                let adds = 2 + world.wave / 8;
                let bonus = world.wave / 2;
                for _ in 0..adds {
                    spawn_enemy(world, rng, bonus);
                }
            }
            None => {}
        }

        if rng.gen::<f32>() < BOSS_ADD_CHANCE_PER_SECOND * dt {
            let bonus = world.wave / 3;
            spawn_enemy(world, rng, bonus);
        }
    }
}

fn hostile_shot(damage: u32) -> ProjectileState {
    ProjectileState {
        faction: Faction::Hostile,
        damage,
        ttl: BOSS_SHOT_LIFETIME,
        pierce: false,
        struck: Vec::new(),
    }
}

fn ring_volley(world: &mut WorldState, rng: &mut ChaCha8Rng, origin: Vec2) {
    for k in 0..BOSS_RING_SHOTS {
        let angle = k as f32 * (TAU / BOSS_RING_SHOTS as f32) + rng.gen_range(-0.06..0.06);
        spawn_projectile(
            world,
            origin,
            Vec2::from_angle(angle),
            BOSS_RING_SPEED,
            hostile_shot(BOSS_RING_DAMAGE),
        );
    }
}

fn aimed_volley(world: &mut WorldState, rng: &mut ChaCha8Rng, origin: Vec2) {
    let target = world
        .player_states()
        .filter(|(_, state)| !state.downed)
        .map(|(entity, _)| entity.position)
        .min_by(|a, b| {
            a.distance_squared(origin)
                .total_cmp(&b.distance_squared(origin))
        });
    let Some(target) = target else {
        return;
    };

    let shots = 3 + world.wave / 6;
    for _ in 0..shots {
        let jitter = Vec2::new(
            rng.gen_range(-BOSS_AIMED_JITTER..BOSS_AIMED_JITTER),
            rng.gen_range(-BOSS_AIMED_JITTER..BOSS_AIMED_JITTER),
        );
        let direction = target - origin + jitter;
        spawn_projectile(
            world,
            origin,
            direction,
            BOSS_AIMED_SPEED,
            hostile_shot(BOSS_AIMED_DAMAGE),
        );
    }
}
