//! Pickups on the ground and the timed effects they grant.

use crate::combat::{self, credit_hit};
use shared::{
    DestroyCause, EntityId, EntityKind, GameEvent, PlayerId, PowerUpKind, Vec2, WorldState,
};
use shared::{
    HEALTH_PICKUP_FRACTION, MAGNET_DURATION, MAGNET_PULL_SPEED, MAGNET_RANGE, ORBITAL_DAMAGE,
    ORBITAL_RADIUS, OVERDRIVE_DURATION, PICKUP_RADIUS, SHIELD_DURATION,
};

/// Ages pickups, pulls them towards magnetised players and hands them to
/// whoever touches them first.
pub fn update_pickups(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) {
    let collectors: Vec<(PlayerId, EntityId, Vec2, bool)> = world
        .player_states()
        .filter(|(_, state)| !state.downed)
        .map(|(entity, state)| (state.player, entity.id, entity.position, state.magnet_active()))
        .collect();

    let mut expired = Vec::new();
    let mut collected: Vec<(EntityId, PlayerId, PowerUpKind)> = Vec::new();

    for entity in world.entities.values_mut() {
        let EntityKind::Pickup(state) = &mut entity.kind else {
            continue;
        };
        state.ttl -= dt;
        if state.ttl <= 0.0 {
            expired.push(entity.id);
            continue;
        }
        let kind = state.power_up;

        for (_, _, position, magnet) in &collectors {
            if !magnet {
                continue;
            }
            let offset = *position - entity.position;
            let distance = offset.magnitude();
            if distance < MAGNET_RANGE && distance > 0.1 {
                let step = (MAGNET_PULL_SPEED * dt).min(distance);
                entity.position += offset.scale(step / distance);
            }
        }

        let taker = collectors
            .iter()
            .find(|(_, _, position, _)| entity.position.distance(*position) <= PICKUP_RADIUS);
        if let Some((player, _, _, _)) = taker {
            collected.push((entity.id, *player, kind));
        }
    }

    for id in expired {
        combat::destroy(world, id, DestroyCause::Expired, events);
    }

    for (id, player, kind) in collected {
        combat::destroy(world, id, DestroyCause::Collected, events);
        apply_power_up(world, player, kind);
        events.push(GameEvent::PowerUpCollected { player, kind });
    }
}

/// Grants `kind` to `player`.
pub fn apply_power_up(world: &mut WorldState, player: PlayerId, kind: PowerUpKind) {
    let Some(entity) = world.player_entity_mut(player) else {
        return;
    };
    let position = entity.position;

    match kind {
        PowerUpKind::Health => {
            let amount = (entity.max_health as f32 * HEALTH_PICKUP_FRACTION) as u32;
            entity.heal(amount);
        }
        PowerUpKind::Shield => {
            if let Some(state) = entity.as_player_mut() {
                state.shield_remaining = SHIELD_DURATION;
            }
        }
        PowerUpKind::Overdrive => {
            if let Some(state) = entity.as_player_mut() {
                state.overdrive_remaining = OVERDRIVE_DURATION;
            }
        }
        PowerUpKind::Magnet => {
            if let Some(state) = entity.as_player_mut() {
                state.magnet_remaining = MAGNET_DURATION;
            }
        }
        PowerUpKind::Orbital => orbital_strike(world, player, position),
    }
}

/// Damages every enemy around `center`. Kills are paid out by the reaper.
pub fn orbital_strike(world: &mut WorldState, player: PlayerId, center: Vec2) {
    for entity in world.entities.values_mut() {
        if !matches!(entity.kind, EntityKind::Enemy(_)) {
            continue;
        }
        if entity.position.distance(center) <= ORBITAL_RADIUS && entity.health > 0 {
            credit_hit(entity, player);
            entity.apply_damage(ORBITAL_DAMAGE);
        }
    }
}

/// Counts down shield, overdrive and magnet.
pub fn tick_effects(world: &mut WorldState, dt: f32) {
    for entity in world.entities.values_mut() {
        if let Some(state) = entity.as_player_mut() {
            state.shield_remaining = (state.shield_remaining - dt).max(0.0);
            state.overdrive_remaining = (state.overdrive_remaining - dt).max(0.0);
            state.magnet_remaining = (state.magnet_remaining - dt).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::spawn_pickup;
    use assert_approx_eq::assert_approx_eq;
    use shared::{EnemyState, PlayerState, HOST_PLAYER};

    fn world_with_host(position: Vec2) -> (WorldState, EntityId) {
        let mut world = WorldState::new();
        let id = world.spawn(
            position,
            220,
            EntityKind::Player(PlayerState {
                player: HOST_PLAYER,
                ..Default::default()
            }),
        );
        (world, id)
    }

    fn host_state(world: &WorldState) -> PlayerState {
        world
            .player_entity(HOST_PLAYER)
            .and_then(|e| e.as_player())
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_pickup_collected_on_touch() {
        let (mut world, _) = world_with_host(Vec2::ZERO);
        let pickup = spawn_pickup(&mut world, Vec2::new(10.0, 0.0), PowerUpKind::Shield);

        let mut events = Vec::new();
        update_pickups(&mut world, 0.1, &mut events);

        assert!(!world.entities.contains_key(&pickup));
        assert_approx_eq!(host_state(&world).shield_remaining, SHIELD_DURATION, 1e-6);
        assert!(events.contains(&GameEvent::PowerUpCollected {
            player: HOST_PLAYER,
            kind: PowerUpKind::Shield,
        }));
    }

    #[test]
    fn test_pickup_expires() {
        let (mut world, _) = world_with_host(Vec2::ZERO);
        let pickup = spawn_pickup(&mut world, Vec2::new(150.0, 0.0), PowerUpKind::Health);
        if let Some(EntityKind::Pickup(state)) = world.entities.get_mut(&pickup).map(|e| &mut e.kind) {
            state.ttl = 0.05;
        }

        let mut events = Vec::new();
        update_pickups(&mut world, 0.1, &mut events);
        assert!(!world.entities.contains_key(&pickup));
        assert!(matches!(
            events.as_slice(),
            [GameEvent::EntityDestroyed {
                cause: DestroyCause::Expired,
                ..
            }]
        ));
    }

    #[test]
    fn test_magnet_pulls_pickups() {
        let (mut world, host) = world_with_host(Vec2::ZERO);
        if let Some(state) = world.entities.get_mut(&host).and_then(|e| e.as_player_mut()) {
            state.magnet_remaining = 5.0;
        }
        let pickup = spawn_pickup(&mut world, Vec2::new(150.0, 0.0), PowerUpKind::Overdrive);

        update_pickups(&mut world, 0.1, &mut Vec::new());
        assert_approx_eq!(world.entities[&pickup].position.x, 150.0 - MAGNET_PULL_SPEED * 0.1, 1e-3);
    }

    #[test]
    fn test_health_pickup_caps() {
        let (mut world, host) = world_with_host(Vec2::ZERO);
        if let Some(e) = world.entities.get_mut(&host) {
            e.apply_damage(150);
        }
        apply_power_up(&mut world, HOST_PLAYER, PowerUpKind::Health);
        assert_eq!(world.entities[&host].health, 70 + 99);

        apply_power_up(&mut world, HOST_PLAYER, PowerUpKind::Health);
        assert_eq!(world.entities[&host].health, 220);
    }

    #[test]
    fn test_orbital_strike_hits_nearby_enemies() {
        let (mut world, _) = world_with_host(Vec2::ZERO);
        let near = world.spawn(
            Vec2::new(100.0, 0.0),
            100,
            EntityKind::Enemy(EnemyState {
                speed: 72.0,
                coin_value: 3,
                last_hit_by: None,
            }),
        );
        let far = world.spawn(
            Vec2::new(300.0, 0.0),
            100,
            EntityKind::Enemy(EnemyState {
                speed: 72.0,
                coin_value: 3,
                last_hit_by: None,
            }),
        );

        apply_power_up(&mut world, HOST_PLAYER, PowerUpKind::Orbital);
        assert_eq!(world.entities[&near].health, 40);
        assert_eq!(world.entities[&far].health, 100);
        match &world.entities[&near].kind {
            EntityKind::Enemy(state) => assert_eq!(state.last_hit_by, Some(HOST_PLAYER)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_effects_expire() {
        let (mut world, _) = world_with_host(Vec2::ZERO);
        apply_power_up(&mut world, HOST_PLAYER, PowerUpKind::Overdrive);
        assert!(host_state(&world).overdrive_active());

        for _ in 0..11 {
            tick_effects(&mut world, 1.0);
        }
        let state = host_state(&world);
        assert!(!state.overdrive_active());
        assert_eq!(state.overdrive_remaining, 0.0);
    }
}
