//! # Tiny Planet: Siege client
//!
//! The joining side of a two-player game. It does not simulate anything:
//! local input is sampled into `InputMessage`s and sent to the host at a
//! fixed rate, and the host's snapshots replace the local mirror of the
//! world in tick order.
//!
//! ## Module Organization
//!
//! - `game`: `ClientWorld`, the snapshot-fed mirror with its tick guard
//! - `network`: `ClientSession`, the TCP connection with its reader and
//!   writer tasks
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::ClientSession;
//! use shared::SessionConfig;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ClientSession::connect("127.0.0.1:7777", SessionConfig::default()).await?;
//!     let (_local_tx, local_rx) = mpsc::unbounded_channel();
//!     let (presenter_tx, _presenter_rx) = mpsc::unbounded_channel();
//!     session.run(local_rx, presenter_tx).await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;

pub use game::{ClientWorld, SnapshotOutcome};
pub use network::ClientSession;
