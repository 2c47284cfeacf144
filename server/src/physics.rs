//! Movement integration and body separation on the planet disc.

use shared::{Entity, EntityId, PlayerControls, Vec2, WorldState, ARENA_RADIUS};
use shared::{PLAYER_ACCELERATION, PLAYER_BOUNDS_RADIUS, PLAYER_DAMPING};

/// Velocity kept when a player hits the edge of the planet.
const EDGE_BOUNCE: f32 = 0.2;
/// Velocity kept by both players after bumping into each other.
const BUMP_RESTITUTION: f32 = 0.8;

///Applies one tick of player controls: acceleration, damping, integration
///and the planet boundary.
pub fn steer_player(entity: &mut Entity, controls: &PlayerControls, dt: f32) {
    let acceleration = controls.movement.scale(PLAYER_ACCELERATION);
    entity.velocity += acceleration * dt;
    entity.velocity = entity.velocity * (1.0 - (PLAYER_DAMPING * dt).min(1.0));
    integrate(entity, dt);

    if entity.position.clamp_to_disc(PLAYER_BOUNDS_RADIUS) {
        entity.velocity = entity.velocity * EDGE_BOUNCE;
    }

    if controls.aim.magnitude_squared() > 0.0 {
        entity.facing = controls.aim.angle();
    }
}

///Moves the entity along its velocity.
pub fn integrate(entity: &mut Entity, dt: f32) {
    entity.position += entity.velocity * dt;
}

///True once a position has left the playable arena.
pub fn outside_arena(position: Vec2) -> bool {
    position.magnitude_squared() > ARENA_RADIUS * ARENA_RADIUS
}

///Pushes two overlapping bodies apart along the line between their centres
///and exchanges their velocities with some loss.
///Returns true if the bodies overlapped.
pub fn resolve_overlap(a: &mut Entity, b: &mut Entity) -> bool {
    let reach = a.radius() + b.radius();
    let delta = b.position - a.position;
    let distance = delta.magnitude();

    if distance >= reach {
        return false;
    }

    // Coincident centres: split along the x axis.
    let normal = if distance < 0.001 {
        Vec2::new(1.0, 0.0)
    } else {
        delta.scale(1.0 / distance)
    };

    let separation = (reach - distance) / 2.0;
    a.position = a.position - normal.scale(separation);
    b.position += normal.scale(separation);
    a.position.clamp_to_disc(PLAYER_BOUNDS_RADIUS);
    b.position.clamp_to_disc(PLAYER_BOUNDS_RADIUS);

    let a_velocity = a.velocity;
    a.velocity = b.velocity * BUMP_RESTITUTION;
    b.velocity = a_velocity * BUMP_RESTITUTION;
    true
}

///Keeps standing player avatars from stacking on top of each other.
pub fn separate_players(world: &mut WorldState) {
    let ids: Vec<EntityId> = world
        .entities
        .values()
        .filter(|e| e.as_player().map(|p| !p.downed).unwrap_or(false))
        .map(|e| e.id)
        .collect();

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let (Some(mut first), Some(mut second)) = (
                world.entities.get(&ids[i]).cloned(),
                world.entities.get(&ids[j]).cloned(),
            ) else {
                continue;
            };

            if resolve_overlap(&mut first, &mut second) {
                world.entities.insert(first.id, first);
                world.entities.insert(second.id, second);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{EntityKind, PlayerState, GUEST_PLAYER, HOST_PLAYER, PLAYER_RADIUS};

    fn player_at(id: EntityId, player: shared::PlayerId, x: f32, y: f32) -> Entity {
        Entity::new(
            id,
            Vec2::new(x, y),
            220,
            EntityKind::Player(PlayerState {
                player,
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_steer_accelerates_and_damps() {
        let mut p = player_at(1, HOST_PLAYER, 0.0, 0.0);
        let controls = PlayerControls {
            movement: Vec2::new(1.0, 0.0),
            aim: Vec2::new(0.0, 1.0),
            fire: false,
        };
        let dt = 1.0 / 30.0;
        steer_player(&mut p, &controls, dt);

        let expected_velocity = 400.0 * dt * (1.0 - 8.0 * dt);
        assert_approx_eq!(p.velocity.x, expected_velocity, 1e-4);
        assert_approx_eq!(p.position.x, expected_velocity * dt, 1e-4);
        assert_approx_eq!(p.facing, std::f32::consts::FRAC_PI_2, 1e-6);
    }

    #[test]
    fn test_steer_without_aim_keeps_facing() {
        let mut p = player_at(1, HOST_PLAYER, 0.0, 0.0);
        p.facing = 1.25;
        steer_player(&mut p, &PlayerControls::default(), 0.1);
        assert_eq!(p.facing, 1.25);
        assert_eq!(p.position, Vec2::ZERO);
    }

    #[test]
    fn test_player_clamped_to_planet() {
        let mut p = player_at(1, HOST_PLAYER, 200.0, 0.0);
        p.velocity = Vec2::new(600.0, 0.0);
        steer_player(&mut p, &PlayerControls::default(), 0.1);

        assert!(p.position.magnitude() <= PLAYER_BOUNDS_RADIUS + 1e-3);
        assert!(p.velocity.x < 600.0 * EDGE_BOUNCE);
    }

    #[test]
    fn test_resolve_overlap_separates() {
        let mut a = player_at(1, HOST_PLAYER, 0.0, 0.0);
        let mut b = player_at(2, GUEST_PLAYER, 10.0, 0.0);
        a.velocity = Vec2::new(100.0, -50.0);
        b.velocity = Vec2::new(-75.0, 25.0);

        assert!(resolve_overlap(&mut a, &mut b));
        assert_approx_eq!(a.position.distance(b.position), PLAYER_RADIUS * 2.0, 1e-3);
        assert_approx_eq!(a.velocity.x, -75.0 * 0.8, 0.01);
        assert_approx_eq!(a.velocity.y, 25.0 * 0.8, 0.01);
        assert_approx_eq!(b.velocity.x, 100.0 * 0.8, 0.01);
        assert_approx_eq!(b.velocity.y, -50.0 * 0.8, 0.01);
    }

    #[test]
    fn test_resolve_overlap_same_position() {
        let mut a = player_at(1, HOST_PLAYER, 5.0, 5.0);
        let mut b = player_at(2, GUEST_PLAYER, 5.0, 5.0);
        assert!(resolve_overlap(&mut a, &mut b));
        assert_ne!(a.position.x, b.position.x);
    }

    #[test]
    fn test_no_overlap_untouched() {
        let mut a = player_at(1, HOST_PLAYER, 0.0, 0.0);
        let mut b = player_at(2, GUEST_PLAYER, 100.0, 0.0);
        assert!(!resolve_overlap(&mut a, &mut b));
        assert_eq!(b.position, Vec2::new(100.0, 0.0));
    }

    #[test]
    fn test_separate_players_in_world() {
        let mut world = WorldState::new();
        let a = world.spawn(
            Vec2::new(0.0, 0.0),
            220,
            EntityKind::Player(PlayerState {
                player: HOST_PLAYER,
                ..Default::default()
            }),
        );
        let b = world.spawn(
            Vec2::new(4.0, 0.0),
            220,
            EntityKind::Player(PlayerState {
                player: GUEST_PLAYER,
                ..Default::default()
            }),
        );
        separate_players(&mut world);

        let pa = world.entities[&a].position;
        let pb = world.entities[&b].position;
        assert!(pa.distance(pb) >= PLAYER_RADIUS * 2.0 - 1e-3);
    }

    #[test]
    fn test_outside_arena() {
        assert!(!outside_arena(Vec2::new(400.0, 0.0)));
        assert!(outside_arena(Vec2::new(421.0, 0.0)));
    }
}
