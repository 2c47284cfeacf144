//! World model, wire protocol and tuning shared by host and client.

pub mod entity;
pub mod events;
pub mod framing;
pub mod input;
pub mod math;
pub mod protocol;
pub mod session;
pub mod world;

pub use entity::{
    BossState, EnemyState, Entity, EntityId, EntityKind, EntityVariant, Faction, PickupState,
    PlayerId, PlayerState, PowerUpKind, ProjectileState, GUEST_PLAYER, HOST_PLAYER,
};
pub use events::{DestroyCause, GameEvent, PurchaseRejection};
pub use framing::{encode_frame, write_packet, FrameDecoder, FrameError, FramedReader};
pub use input::{InputManager, LocalCommand};
pub use math::Vec2;
pub use protocol::{HostActions, InputMessage, Packet, PlayerControls, SnapshotMessage};
pub use session::{PresentationEvent, SessionConfig, SessionError, SessionStatus};
pub use world::{UpgradeLevels, UpgradeSlot, WavePhase, WorldState};

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_TICK_RATE: u32 = 30;

// World geometry
pub const PLANET_RADIUS: f32 = 220.0;
pub const PLAYER_BOUNDS_RADIUS: f32 = 202.0;
pub const ARENA_RADIUS: f32 = 420.0;
pub const CORE_HIT_RADIUS: f32 = 30.0;
pub const CORE_MAX_HEALTH: u32 = 320;

// Players
pub const PLAYER_MAX_HEALTH: u32 = 220;
pub const PLAYER_RADIUS: f32 = 14.0;
pub const PLAYER_ACCELERATION: f32 = 400.0;
pub const PLAYER_DAMPING: f32 = 8.0;
pub const PLAYER_FIRE_DELAY: f32 = 0.08;
pub const MIN_FIRE_DELAY: f32 = 0.03;
pub const RESPAWN_DELAY: f32 = 6.0;
pub const RESPAWN_HEALTH_FRACTION: f32 = 0.5;

// Player projectiles
pub const PROJECTILE_RADIUS: f32 = 4.0;
pub const PROJECTILE_SPEED: f32 = 760.0;
pub const PROJECTILE_LIFETIME: f32 = 1.2;
pub const PROJECTILE_DAMAGE: u32 = 18;
pub const SPREAD_ARC: f32 = 0.28;

// Enemies
pub const ENEMY_RADIUS: f32 = 16.0;
pub const ENEMY_BASE_HEALTH: u32 = 22;
pub const ENEMY_BASE_SPEED: f32 = 72.0;
pub const ENEMY_SPAWN_RADIUS: f32 = 280.0;
pub const ENEMY_CORE_DAMAGE: u32 = 8;
pub const ENEMY_COIN_VALUE: u32 = 3;

// Waves
pub const BOSS_WAVE_INTERVAL: u32 = 5;
pub const FINAL_WAVE: u32 = 20;
pub const WAVE_BASE_ROSTER: u32 = 25;
pub const WAVE_SPAWN_WINDOW: f32 = 30.0;
pub const LATE_SPAWN_INTERVAL: f32 = 0.2;

// Boss
pub const BOSS_BASE_HEALTH: u32 = 260;
pub const BOSS_HEALTH_PER_TIER: u32 = 120;
pub const BOSS_HIT_RADIUS: f32 = 44.0;
pub const BOSS_ORBIT_RADIUS: f32 = 360.0;
pub const BOSS_ORBIT_SPEED: f32 = 0.14;
pub const BOSS_FIRST_PHASE_DELAY: f32 = 2.0;
pub const BOSS_PHASE_DELAY: f32 = 1.8;
pub const BOSS_RING_SHOTS: u32 = 14;
pub const BOSS_RING_SPEED: f32 = 260.0;
pub const BOSS_RING_DAMAGE: u32 = 12;
pub const BOSS_AIMED_SPEED: f32 = 360.0;
pub const BOSS_AIMED_DAMAGE: u32 = 32;
pub const BOSS_AIMED_JITTER: f32 = 80.0;
pub const BOSS_SHOT_LIFETIME: f32 = 2.0;
pub const BOSS_ADD_CHANCE_PER_SECOND: f32 = 0.2;
pub const BOSS_COIN_VALUE: u32 = 80;

// Shop
pub const SHOP_DURATION: f32 = 8.0;
pub const SHOP_CLOSE_HEAL: u32 = 28;

// Power-ups
pub const POWERUP_DROP_CHANCE: f32 = 0.18;
pub const PICKUP_RADIUS: f32 = 28.0;
pub const PICKUP_LIFETIME: f32 = 12.0;
pub const HEALTH_PICKUP_FRACTION: f32 = 0.45;
pub const SHIELD_DURATION: f32 = 6.0;
pub const OVERDRIVE_DURATION: f32 = 10.0;
pub const MAGNET_DURATION: f32 = 12.0;
pub const MAGNET_RANGE: f32 = 200.0;
pub const MAGNET_PULL_SPEED: f32 = 240.0;
pub const ORBITAL_DAMAGE: u32 = 60;
pub const ORBITAL_RADIUS: f32 = 180.0;
