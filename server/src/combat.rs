//! Weapons, projectile hits, deaths and rewards.

use crate::input_cache::TickInputs;
use crate::physics;
use log::debug;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use shared::math::circles_overlap;
use shared::{
    DestroyCause, Entity, EntityId, EntityKind, Faction, GameEvent, PickupState, PlayerId,
    PowerUpKind, ProjectileState, UpgradeLevels, Vec2, WorldState,
};
use shared::{
    MIN_FIRE_DELAY, PICKUP_LIFETIME, PLAYER_FIRE_DELAY, POWERUP_DROP_CHANCE, PROJECTILE_DAMAGE,
    PROJECTILE_LIFETIME, PROJECTILE_SPEED, RESPAWN_DELAY, RESPAWN_HEALTH_FRACTION, SPREAD_ARC,
};

/// Seconds between shots for the given upgrades.
pub fn fire_delay(upgrades: &UpgradeLevels, overdrive: bool) -> f32 {
    let mut delay = PLAYER_FIRE_DELAY * 0.85f32.powi(upgrades.fire_rate as i32);
    delay = delay.max(MIN_FIRE_DELAY);
    if overdrive {
        delay *= 0.5;
    }
    delay
}

pub fn shot_damage(upgrades: &UpgradeLevels) -> u32 {
    (PROJECTILE_DAMAGE as f32 * 1.25f32.powi(upgrades.damage as i32)) as u32
}

/// Angle offsets of one volley, centred on the aim direction.
pub fn spread_offsets(spread_level: u8) -> Vec<f32> {
    let count = 1 + spread_level as usize * 2;
    if count == 1 {
        return vec![0.0];
    }
    (0..count)
        .map(|i| {
            let t = i as f32 - (count - 1) as f32 / 2.0;
            t / (count - 1) as f32 * SPREAD_ARC
        })
        .collect()
}

/// Spawns a hostile or friendly projectile travelling along `direction`.
pub fn spawn_projectile(
    world: &mut WorldState,
    origin: Vec2,
    direction: Vec2,
    speed: f32,
    state: ProjectileState,
) -> EntityId {
    let id = world.spawn(origin, 1, EntityKind::Projectile(state));
    if let Some(projectile) = world.entities.get_mut(&id) {
        projectile.velocity = direction.normalize().scale(speed);
        projectile.facing = direction.angle();
    }
    id
}

/// Ticks weapon cooldowns and fires for every standing player holding fire.
pub fn fire_weapons(world: &mut WorldState, inputs: &TickInputs, dt: f32) {
    let mut volleys: Vec<(PlayerId, Vec2, Vec2)> = Vec::new();

    for entity in world.entities.values_mut() {
        let position = entity.position;
        let Some(state) = entity.as_player_mut() else {
            continue;
        };
        state.cooldown -= dt;
        if state.downed {
            state.cooldown = state.cooldown.max(0.0);
            continue;
        }

        let controls = inputs.controls_for(state.player);
        let aim = controls.aim.normalize();
        if controls.fire && aim != Vec2::ZERO && state.cooldown <= 0.0 {
            volleys.push((state.player, position, aim));
        } else if state.cooldown < 0.0 {
            state.cooldown = 0.0;
        }
    }

    for (player, origin, aim) in volleys {
        let upgrades = world.upgrades_of(player);
        let damage = shot_damage(&upgrades);
        let pierce = upgrades.piercing > 0;

        for offset in spread_offsets(upgrades.spread) {
            spawn_projectile(
                world,
                origin,
                aim.rotate(offset),
                PROJECTILE_SPEED,
                ProjectileState {
                    faction: Faction::Player(player),
                    damage,
                    ttl: PROJECTILE_LIFETIME,
                    pierce,
                    struck: Vec::new(),
                },
            );
        }

        if let Some(state) = world
            .player_entity_mut(player)
            .and_then(|e| e.as_player_mut())
        {
            state.cooldown = fire_delay(&upgrades, state.overdrive_active());
        }
    }
}

/// Moves projectiles and expires the ones out of time or out of the arena.
pub fn move_projectiles(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) {
    let mut expired = Vec::new();

    for entity in world.entities.values_mut() {
        if let EntityKind::Projectile(state) = &mut entity.kind {
            state.ttl -= dt;
            let out_of_time = state.ttl <= 0.0;
            physics::integrate(entity, dt);
            if out_of_time || physics::outside_arena(entity.position) {
                expired.push(entity.id);
            }
        }
    }

    for id in expired {
        destroy(world, id, DestroyCause::Expired, events);
    }
}

/// Removes an entity and reports it.
pub fn destroy(
    world: &mut WorldState,
    id: EntityId,
    cause: DestroyCause,
    events: &mut Vec<GameEvent>,
) -> Option<Entity> {
    let entity = world.entities.remove(&id)?;
    events.push(GameEvent::EntityDestroyed {
        id,
        variant: entity.variant(),
        cause,
    });
    Some(entity)
}

/// Records `player` as the one who last damaged a hostile unit.
pub fn credit_hit(entity: &mut Entity, player: PlayerId) {
    match &mut entity.kind {
        EntityKind::Enemy(state) => state.last_hit_by = Some(player),
        EntityKind::Boss(state) => state.last_hit_by = Some(player),
        _ => {}
    }
}

fn hostile_targets(world: &WorldState) -> Vec<(EntityId, Vec2, f32)> {
    world
        .entities
        .values()
        .filter(|e| e.is_hostile_unit() && e.health > 0)
        .map(|e| (e.id, e.position, e.radius()))
        .collect()
}

fn standing_players(world: &WorldState) -> Vec<(EntityId, Vec2, f32)> {
    world
        .entities
        .values()
        .filter(|e| e.as_player().map(|p| !p.downed).unwrap_or(false))
        .map(|e| (e.id, e.position, e.radius()))
        .collect()
}

/// One overlap pass between projectiles and their targets.
pub fn resolve_hits(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let projectiles: Vec<EntityId> = world
        .entities
        .values()
        .filter(|e| matches!(e.kind, EntityKind::Projectile(_)))
        .map(|e| e.id)
        .collect();

    for projectile_id in projectiles {
        let Some(projectile) = world.entities.get(&projectile_id) else {
            continue;
        };
        let EntityKind::Projectile(state) = &projectile.kind else {
            continue;
        };
        let origin = projectile.position;
        let radius = projectile.radius();
        let faction = state.faction;
        let damage = state.damage;
        let pierce = state.pierce;
        let already_struck = state.struck.clone();

        let targets = match faction {
            Faction::Player(_) => hostile_targets(world),
            Faction::Hostile => standing_players(world),
        };

        let mut struck = Vec::new();
        for (target_id, position, target_radius) in targets {
            if already_struck.contains(&target_id)
                || !circles_overlap(origin, radius, position, target_radius)
            {
                continue;
            }
            struck.push(target_id);
            if !pierce {
                break;
            }
        }

        if struck.is_empty() {
            continue;
        }

        for target_id in &struck {
            let Some(target) = world.entities.get_mut(target_id) else {
                continue;
            };
            match faction {
                Faction::Player(player) => {
                    credit_hit(target, player);
                    target.apply_damage(damage);
                }
                Faction::Hostile => {
                    let shielded = target
                        .as_player()
                        .map(|p| p.shield_active())
                        .unwrap_or(false);
                    if !shielded {
                        target.apply_damage(damage);
                    }
                }
            }
        }

        if pierce {
            if let Some(EntityKind::Projectile(state)) =
                world.entities.get_mut(&projectile_id).map(|e| &mut e.kind)
            {
                state.struck.extend(struck);
            }
        } else {
            destroy(world, projectile_id, DestroyCause::Impact, events);
        }
    }
}

/// Removes dead enemies and bosses, pays out coins and rolls drops.
/// A dead boss takes its remaining adds with it.
pub fn reap_hostiles(world: &mut WorldState, rng: &mut ChaCha8Rng, events: &mut Vec<GameEvent>) {
    let dead: Vec<EntityId> = world
        .entities
        .values()
        .filter(|e| e.is_hostile_unit() && e.health == 0)
        .map(|e| e.id)
        .collect();

    let mut boss_down = false;
    for id in dead {
        let Some(entity) = destroy(world, id, DestroyCause::Killed, events) else {
            continue;
        };
        let (credited, coins, guaranteed_drop) = match &entity.kind {
            EntityKind::Enemy(state) => (state.last_hit_by, state.coin_value, false),
            EntityKind::Boss(state) => {
                boss_down = true;
                (state.last_hit_by, shared::BOSS_COIN_VALUE, true)
            }
            _ => continue,
        };

        if let Some(player) = credited {
            *world.coins.entry(player).or_insert(0) += coins;
            debug!("{} earned {} coins", player, coins);
        }

        if guaranteed_drop || rng.gen::<f32>() < POWERUP_DROP_CHANCE {
            let kind = PowerUpKind::ALL[rng.gen_range(0..PowerUpKind::ALL.len())];
            spawn_pickup(world, entity.position, kind);
        }
    }

    if boss_down && world.boss_count() == 0 {
        let adds: Vec<EntityId> = world
            .entities
            .values()
            .filter(|e| matches!(e.kind, EntityKind::Enemy(_)))
            .map(|e| e.id)
            .collect();
        for id in adds {
            destroy(world, id, DestroyCause::Dispersed, events);
        }
    }
}

pub fn spawn_pickup(world: &mut WorldState, position: Vec2, kind: PowerUpKind) -> EntityId {
    world.spawn(
        position,
        1,
        EntityKind::Pickup(PickupState {
            power_up: kind,
            ttl: PICKUP_LIFETIME,
        }),
    )
}

/// Downs players at zero health and respawns the ones whose timer ran out,
/// as long as someone is still standing.
pub fn update_player_vitals(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) {
    for entity in world.entities.values_mut() {
        let health = entity.health;
        let Some(state) = entity.as_player_mut() else {
            continue;
        };
        if !state.downed && health == 0 {
            state.downed = true;
            state.respawn_remaining = RESPAWN_DELAY;
            state.shield_remaining = 0.0;
            events.push(GameEvent::PlayerDowned {
                player: state.player,
            });
        }
    }

    let anyone_standing = world
        .player_states()
        .any(|(_, state)| !state.downed);
    if !anyone_standing {
        return;
    }

    for entity in world.entities.values_mut() {
        let max_health = entity.max_health;
        let mut revived = None;
        if let Some(state) = entity.as_player_mut() {
            if state.downed {
                state.respawn_remaining -= dt;
                if state.respawn_remaining <= 0.0 {
                    state.downed = false;
                    state.respawn_remaining = 0.0;
                    revived = Some(state.player);
                }
            }
        }
        if let Some(player) = revived {
            entity.health = ((max_health as f32 * RESPAWN_HEALTH_FRACTION) as u32).max(1);
            entity.velocity = Vec2::ZERO;
            events.push(GameEvent::PlayerRespawned { player });
        }
    }
}
