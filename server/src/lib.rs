//! # Tiny Planet: Siege host
//!
//! The authoritative side of a game. The host owns the only `WorldState`,
//! advances it at a fixed tick rate with the latest known input of every
//! player and publishes a snapshot after each step.
//!
//! ## Module Organization
//!
//! - `game`: the simulation engine and its phase machine
//! - `physics`, `combat`, `waves`, `shop`, `powerups`: the systems a combat
//!   step is made of
//! - `input_cache`: latest input per player, one-shot actions per tick
//! - `client_manager`: seats and liveness of remote peers
//! - `network`: the host session (listener, peer tasks, tick loop)
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::HostSession;
//! use shared::SessionConfig;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = HostSession::bind("0.0.0.0:7777", SessionConfig::default()).await?;
//!     let (_local_tx, local_rx) = mpsc::unbounded_channel();
//!     let (presenter_tx, _presenter_rx) = mpsc::unbounded_channel();
//!     host.run(local_rx, presenter_tx).await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod combat;
pub mod game;
pub mod input_cache;
pub mod network;
pub mod physics;
pub mod powerups;
pub mod shop;
pub mod waves;

pub use game::{SimConfig, SimulationEngine};
pub use input_cache::{InputCache, TickInputs};
pub use network::HostSession;
