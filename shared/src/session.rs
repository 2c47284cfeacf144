//! Types shared by the host and client session managers.

use crate::entity::PlayerId;
use crate::protocol::SnapshotMessage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle notices handed to the presentation adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Listening(SocketAddr),
    SinglePlayer,
    PeerJoined { player: PlayerId, addr: SocketAddr },
    PeerLeft { player: PlayerId, reason: String },
    Connected { player: PlayerId },
    ConnectionLost(String),
    Stopped,
}

/// What the presentation adapter receives from a running session.
#[derive(Debug, Clone)]
pub enum PresentationEvent {
    Frame(Arc<SnapshotMessage>),
    Status(SessionStatus),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
    /// The connection broke before the host answered the hello.
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("host rejected the connection: {0}")]
    Rejected(String),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl SessionError {
    /// True for failures that happen before a session is established.
    ///
    /// Only `ConnectionLost` is raised once a session runs; everything else
    /// comes out of binding, connecting or the hello exchange.
    pub fn is_setup_failure(&self) -> bool {
        !matches!(self, SessionError::ConnectionLost(_))
    }
}

/// Tunables for a session. Defaults match the shipped game.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick_rate: u32,
    pub handshake_timeout: Duration,
    pub input_rate: u32,
    pub max_malformed_frames: u32,
    pub idle_timeout: Duration,
    pub outbound_queue: usize,
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::DEFAULT_TICK_RATE,
            handshake_timeout: Duration::from_secs(5),
            input_rate: crate::DEFAULT_TICK_RATE,
            max_malformed_frames: 5,
            idle_timeout: Duration::from_secs(10),
            outbound_queue: 64,
            seed: 0,
        }
    }
}

impl SessionConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn input_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.input_rate.max(1) as f64)
    }

    /// Fixed simulation step in seconds.
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}
