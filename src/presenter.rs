//! Headless presentation: logs session status, game events and a periodic
//! summary of the world.

use log::{debug, info, warn};
use shared::{
    DestroyCause, EntityKind, EntityVariant, GameEvent, PresentationEvent, SessionStatus,
    SnapshotMessage,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Frames between two summary lines.
const SUMMARY_INTERVAL: u64 = 150;

#[derive(Debug, Default)]
pub struct Presenter {
    frames: u64,
    last_summary_tick: Option<u64>,
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn handle(&mut self, event: PresentationEvent) {
        match event {
            PresentationEvent::Status(status) => log_status(&status),
            PresentationEvent::Frame(frame) => self.frame(&frame),
        }
    }

    fn frame(&mut self, frame: &SnapshotMessage) {
        self.frames += 1;
        for event in &frame.events {
            match describe_event(event) {
                Some(line) => info!("{}", line),
                None => debug!("{:?}", event),
            }
        }

        let due = match self.last_summary_tick {
            Some(last) => frame.tick >= last + SUMMARY_INTERVAL,
            None => true,
        };
        if due {
            self.last_summary_tick = Some(frame.tick);
            info!("{}", summarize(frame));
        }
    }
}

fn log_status(status: &SessionStatus) {
    match status {
        SessionStatus::Listening(addr) => info!("Waiting for a second player on {}", addr),
        SessionStatus::SinglePlayer => info!("Playing solo"),
        SessionStatus::PeerJoined { player, addr } => info!("{} joined from {}", player, addr),
        SessionStatus::PeerLeft { player, reason } => info!("{} left ({})", player, reason),
        SessionStatus::Connected { player } => info!("Connected as {}", player),
        SessionStatus::ConnectionLost(reason) => warn!("Connection lost: {}", reason),
        SessionStatus::Stopped => info!("Session stopped"),
    }
}

/// A human readable line for the events worth showing. Routine removals
/// such as spent projectiles return None.
pub fn describe_event(event: &GameEvent) -> Option<String> {
    let line = match event {
        GameEvent::WaveStarted { wave, boss: true } => format!("Wave {}: the boss arrives", wave),
        GameEvent::WaveStarted { wave, boss: false } => format!("Wave {} begins", wave),
        GameEvent::WaveCleared { wave } => format!("Wave {} cleared", wave),
        GameEvent::ShopOpened { wave } => format!("Shop open after wave {} (keys 1-4, skip)", wave),
        GameEvent::EntityDestroyed {
            variant: EntityVariant::Boss,
            cause: DestroyCause::Killed,
            ..
        } => "Boss destroyed".to_string(),
        GameEvent::EntityDestroyed {
            variant: EntityVariant::CoreObjective,
            ..
        } => "The core has fallen".to_string(),
        GameEvent::EntityDestroyed { .. } => return None,
        GameEvent::PlayerDowned { player } => format!("{} is down", player),
        GameEvent::PlayerRespawned { player } => format!("{} is back", player),
        GameEvent::PowerUpCollected { player, kind } => {
            format!("{} picked up {:?}", player, kind)
        }
        GameEvent::PurchaseAccepted {
            slot, level, cost, ..
        } => format!("Bought {:?} level {} for {} coins", slot, level, cost),
        GameEvent::PurchaseRejected { slot, reason, .. } => {
            format!("Cannot buy {:?}: {}", slot, reason)
        }
        GameEvent::GameOver { wave } => format!("Game over on wave {} (restart to play again)", wave),
        GameEvent::Victory { wave } => format!("Victory! Wave {} survived", wave),
        GameEvent::Restarted => "Restarted at wave 1".to_string(),
    };
    Some(line)
}

/// One line with the state of the match.
pub fn summarize(frame: &SnapshotMessage) -> String {
    let core = frame
        .entities
        .iter()
        .find(|e| matches!(e.kind, EntityKind::CoreObjective))
        .map(|e| format!("{}/{}", e.health, e.max_health))
        .unwrap_or_else(|| "destroyed".to_string());
    let hostiles = frame.entities.iter().filter(|e| e.is_hostile_unit()).count();
    let players: Vec<String> = frame
        .entities
        .iter()
        .filter_map(|e| {
            e.as_player().map(|p| {
                let coins = frame.coins.get(&p.player).copied().unwrap_or_default();
                if p.downed {
                    format!("{} down ({} coins)", p.player, coins)
                } else {
                    format!("{} {}hp ({} coins)", p.player, e.health, coins)
                }
            })
        })
        .collect();

    format!(
        "tick {} | wave {} {:?} | core {} | {} hostiles | {}",
        frame.tick,
        frame.wave,
        frame.phase,
        core,
        hostiles,
        players.join(", ")
    )
}

/// Spawns the task that drains presentation events until every sender is
/// gone.
pub fn spawn(mut presenter_rx: mpsc::UnboundedReceiver<PresentationEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut presenter = Presenter::new();
        while let Some(event) = presenter_rx.recv().await {
            presenter.handle(event);
        }
        debug!("Presenter finished after {} frames", presenter.frames());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        PlayerState, PurchaseRejection, UpgradeSlot, Vec2, WorldState, HOST_PLAYER,
    };
    use std::sync::Arc;

    #[test]
    fn test_describe_events() {
        assert_eq!(
            describe_event(&GameEvent::WaveStarted { wave: 5, boss: true }).unwrap(),
            "Wave 5: the boss arrives"
        );
        assert_eq!(
            describe_event(&GameEvent::PurchaseRejected {
                player: HOST_PLAYER,
                slot: UpgradeSlot::Damage,
                reason: PurchaseRejection::ShopClosed,
            })
            .unwrap(),
            "Cannot buy Damage: the shop is closed"
        );
        assert!(describe_event(&GameEvent::EntityDestroyed {
            id: 9,
            variant: EntityVariant::Projectile,
            cause: DestroyCause::Expired,
        })
        .is_none());
    }

    #[test]
    fn test_summary_line() {
        let mut world = WorldState::new();
        world.tick = 12;
        world.spawn(Vec2::ZERO, 320, EntityKind::CoreObjective);
        world.spawn(
            Vec2::new(0.0, -110.0),
            220,
            EntityKind::Player(PlayerState {
                player: HOST_PLAYER,
                ..Default::default()
            }),
        );
        world.coins.insert(HOST_PLAYER, 7);
        let frame = SnapshotMessage::capture(&world, Vec::new());

        assert_eq!(
            summarize(&frame),
            "tick 12 | wave 1 Spawning | core 320/320 | 0 hostiles | P1 220hp (7 coins)"
        );
    }

    #[test]
    fn test_presenter_counts_frames() {
        let mut presenter = Presenter::new();
        let frame = SnapshotMessage::capture(&WorldState::new(), Vec::new());
        presenter.handle(PresentationEvent::Frame(Arc::new(frame)));
        presenter.handle(PresentationEvent::Status(SessionStatus::Stopped));
        assert_eq!(presenter.frames(), 1);
    }
}
