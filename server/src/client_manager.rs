//! Bookkeeping for remote peers connected to a hosted session.
//!
//! The host plays locally as player 1, so remote peers only ever fill the
//! guest seats. A seat is freed when its peer says goodbye, disconnects or
//! goes quiet for longer than the idle timeout.

use log::info;
use shared::{PlayerId, GUEST_PLAYER};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Identifies one TCP connection for the lifetime of the session.
pub type ConnId = u64;

/// A connected peer and the seat it occupies.
#[derive(Debug)]
pub struct Client {
    pub conn_id: ConnId,
    pub addr: SocketAddr,
    pub player: PlayerId,
    /// Last time any frame arrived from this peer
    pub last_seen: Instant,
    /// Highest input sequence accepted from this peer
    pub last_sequence: u32,
    pub inputs_received: u64,
}

impl Client {
    pub fn new(conn_id: ConnId, addr: SocketAddr, player: PlayerId) -> Self {
        Self {
            conn_id,
            addr,
            player,
            last_seen: Instant::now(),
            last_sequence: 0,
            inputs_received: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Tracks which guest seats are taken and by whom.
pub struct ClientManager {
    clients: HashMap<ConnId, Client>,
    seats: Vec<PlayerId>,
    idle_timeout: Duration,
}

impl ClientManager {
    /// A manager with a single guest seat.
    pub fn new(idle_timeout: Duration) -> Self {
        Self::with_seats(vec![GUEST_PLAYER], idle_timeout)
    }

    pub fn with_seats(seats: Vec<PlayerId>, idle_timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            seats,
            idle_timeout,
        }
    }

    /// Seats a new peer. Returns the player it was given, or None if every
    /// seat is taken.
    pub fn admit(&mut self, conn_id: ConnId, addr: SocketAddr) -> Option<PlayerId> {
        let player = self
            .seats
            .iter()
            .copied()
            .find(|seat| !self.clients.values().any(|c| c.player == *seat))?;

        info!("Peer {} from {} seated as {}", conn_id, addr, player);
        self.clients
            .insert(conn_id, Client::new(conn_id, addr, player));
        Some(player)
    }

    /// Frees the seat held by `conn_id`.
    pub fn remove(&mut self, conn_id: ConnId) -> Option<Client> {
        let client = self.clients.remove(&conn_id)?;
        info!("Peer {} ({}) removed", client.conn_id, client.player);
        Some(client)
    }

    pub fn get(&self, conn_id: ConnId) -> Option<&Client> {
        self.clients.get(&conn_id)
    }

    pub fn player_of(&self, conn_id: ConnId) -> Option<PlayerId> {
        self.get(conn_id).map(|c| c.player)
    }

    /// Marks the peer as alive without recording an input.
    pub fn touch(&mut self, conn_id: ConnId) -> bool {
        match self.clients.get_mut(&conn_id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Records an accepted input from `conn_id`.
    pub fn record_input(&mut self, conn_id: ConnId, sequence: u32) -> bool {
        let Some(client) = self.clients.get_mut(&conn_id) else {
            return false;
        };
        client.touch();
        client.inputs_received += 1;
        client.last_sequence = client.last_sequence.max(sequence);
        true
    }

    /// Removes peers that have been silent longer than the idle timeout and
    /// returns them.
    pub fn check_timeouts(&mut self) -> Vec<Client> {
        let timeout = self.idle_timeout;
        let timed_out: Vec<ConnId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.conn_id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|conn_id| self.remove(conn_id))
            .collect()
    }

    pub fn conn_ids(&self) -> Vec<ConnId> {
        self.clients.keys().copied().collect()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.seats.len()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
