//! The inter-wave shop: purchases, opening and closing.

use log::info;
use shared::{
    GameEvent, PlayerId, PurchaseRejection, UpgradeSlot, WavePhase, WorldState,
    RESPAWN_HEALTH_FRACTION, SHOP_CLOSE_HEAL, SHOP_DURATION,
};

/// Buys the next level of `slot` for `player`.
///
/// Only the host may buy, and only while the shop is open. Coins come from
/// the team purse, so whatever the guest earned is spent too, the host's own
/// balance first. A rejected purchase leaves the world untouched. Returns
/// the new level.
pub fn purchase(
    world: &mut WorldState,
    player: PlayerId,
    slot: UpgradeSlot,
) -> Result<u8, PurchaseRejection> {
    if !player.is_host() {
        return Err(PurchaseRejection::NotHost);
    }
    if !world.shop_open() {
        return Err(PurchaseRejection::ShopClosed);
    }

    let level = world.upgrades_of(player).level(slot);
    let cost = slot.cost(level).ok_or(PurchaseRejection::MaxLevel)?;
    if !world.spend_team_coins(player, cost) {
        return Err(PurchaseRejection::InsufficientCoins {
            cost,
            balance: world.team_coins(),
        });
    }

    let levels = world.upgrades.entry(player).or_default();
    *levels.level_mut(slot) += 1;
    Ok(level + 1)
}

/// Runs `purchase` and reports the outcome as an event.
pub fn purchase_with_event(
    world: &mut WorldState,
    player: PlayerId,
    slot: UpgradeSlot,
    events: &mut Vec<GameEvent>,
) {
    let cost = slot.cost(world.upgrades_of(player).level(slot));
    match purchase(world, player, slot) {
        Ok(level) => {
            let cost = cost.unwrap_or_default();
            info!("{} bought {:?} level {} for {} coins", player, slot, level, cost);
            events.push(GameEvent::PurchaseAccepted {
                player,
                slot,
                level,
                cost,
            });
        }
        Err(reason) => {
            info!("{} could not buy {:?}: {}", player, slot, reason);
            events.push(GameEvent::PurchaseRejected {
                player,
                slot,
                reason,
            });
        }
    }
}

pub fn open_shop(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    world.phase = WavePhase::Shop;
    world.shop_remaining = SHOP_DURATION;
    events.push(GameEvent::ShopOpened { wave: world.wave });
}

/// Counts the shop down. Returns true once it should close.
pub fn tick_shop(world: &mut WorldState, dt: f32, skip: bool) -> bool {
    world.shop_remaining = (world.shop_remaining - dt).max(0.0);
    skip || world.shop_remaining <= 0.0
}

/// Heals every player and revives the downed ones before the next wave.
pub fn close_shop(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    world.shop_remaining = 0.0;
    for entity in world.entities.values_mut() {
        let max_health = entity.max_health;
        let Some(state) = entity.as_player_mut() else {
            continue;
        };
        let revived = state.downed;
        if revived {
            state.downed = false;
            state.respawn_remaining = 0.0;
            let player = state.player;
            entity.health = (max_health as f32 * RESPAWN_HEALTH_FRACTION) as u32;
            events.push(GameEvent::PlayerRespawned { player });
        }
        entity.heal(SHOP_CLOSE_HEAL);
    }
}
