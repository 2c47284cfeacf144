//! The joining side's copy of the world. It never simulates; it only takes
//! the host's snapshots in tick order.

use log::debug;
use shared::{EntityId, SnapshotMessage, WorldState};
use std::collections::BTreeSet;

/// What applying one snapshot did to the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Applied {
        /// Entities seen for the first time.
        spawned: Vec<EntityId>,
        /// Entities that were known and are now gone.
        despawned: Vec<EntityId>,
    },
    /// Not newer than the last applied snapshot; ignored.
    Stale { tick: u64, last_applied: u64 },
}

#[derive(Debug, Default)]
pub struct ClientWorld {
    world: WorldState,
    last_applied: Option<u64>,
    known: BTreeSet<EntityId>,
    stale_dropped: u64,
}

impl ClientWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn last_applied_tick(&self) -> Option<u64> {
        self.last_applied
    }

    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped
    }

    /// Replaces the mirror with `snapshot` unless it is older than, or the
    /// same as, the last one applied.
    pub fn apply(&mut self, snapshot: &SnapshotMessage) -> SnapshotOutcome {
        if let Some(last_applied) = self.last_applied {
            if snapshot.tick <= last_applied {
                self.stale_dropped += 1;
                debug!(
                    "Discarding snapshot {} (last applied {})",
                    snapshot.tick, last_applied
                );
                return SnapshotOutcome::Stale {
                    tick: snapshot.tick,
                    last_applied,
                };
            }
        }

        snapshot.apply_to(&mut self.world);
        self.last_applied = Some(snapshot.tick);

        let current: BTreeSet<EntityId> = snapshot.entities.iter().map(|e| e.id).collect();
        let spawned = current.difference(&self.known).copied().collect();
        let despawned = self.known.difference(&current).copied().collect();
        self.known = current;

        SnapshotOutcome::Applied { spawned, despawned }
    }

    /// Forgets everything, e.g. when joining a new session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Entity, EntityKind, Vec2};

    fn snapshot(tick: u64, ids: &[EntityId]) -> SnapshotMessage {
        let mut world = WorldState::new();
        world.tick = tick;
        for id in ids {
            world.entities.insert(
                *id,
                Entity::new(*id, Vec2::new(*id as f32, 0.0), 10, EntityKind::CoreObjective),
            );
        }
        SnapshotMessage::capture(&world, Vec::new())
    }

    #[test]
    fn test_first_snapshot_applies() {
        let mut mirror = ClientWorld::new();
        assert_eq!(mirror.last_applied_tick(), None);

        let outcome = mirror.apply(&snapshot(0, &[1, 2]));
        assert_eq!(
            outcome,
            SnapshotOutcome::Applied {
                spawned: vec![1, 2],
                despawned: vec![],
            }
        );
        assert_eq!(mirror.last_applied_tick(), Some(0));
        assert_eq!(mirror.world().entities.len(), 2);
    }

    #[test]
    fn test_stale_and_duplicate_ticks_ignored() {
        let mut mirror = ClientWorld::new();
        mirror.apply(&snapshot(10, &[1]));

        assert_eq!(
            mirror.apply(&snapshot(10, &[1, 2])),
            SnapshotOutcome::Stale {
                tick: 10,
                last_applied: 10
            }
        );
        assert!(matches!(
            mirror.apply(&snapshot(7, &[])),
            SnapshotOutcome::Stale { .. }
        ));
        assert_eq!(mirror.world().entities.len(), 1);
        assert_eq!(mirror.stale_dropped(), 2);
    }

    #[test]
    fn test_spawn_and_despawn_tracking() {
        let mut mirror = ClientWorld::new();
        mirror.apply(&snapshot(1, &[1, 2, 3]));

        let outcome = mirror.apply(&snapshot(4, &[2, 3, 9]));
        assert_eq!(
            outcome,
            SnapshotOutcome::Applied {
                spawned: vec![9],
                despawned: vec![1],
            }
        );
        assert_eq!(mirror.world().tick, 4);
        let kept = &mirror.world().entities[&9];
        assert_approx_eq!(kept.position.x, 9.0, 1e-6);
        assert_approx_eq!(kept.position.y, 0.0, 1e-6);
    }

    #[test]
    fn test_reset() {
        let mut mirror = ClientWorld::new();
        mirror.apply(&snapshot(5, &[1]));
        mirror.reset();
        assert_eq!(mirror.last_applied_tick(), None);
        assert!(matches!(
            mirror.apply(&snapshot(1, &[1])),
            SnapshotOutcome::Applied { .. }
        ));
    }
}
