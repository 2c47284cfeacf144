//! Host session: TCP listener, per-peer reader/writer tasks and the fixed
//! tick loop that drives the simulation engine.

use crate::client_manager::{ClientManager, ConnId};
use crate::game::{SimConfig, SimulationEngine};
use crate::input_cache::InputCache;
use log::{debug, error, info, warn};
use shared::framing::MalformedBudget;
use shared::{
    encode_frame, write_packet, FramedReader, InputManager, InputMessage,
    LocalCommand, Packet, PlayerId, PresentationEvent, SessionConfig, SessionError,
    SessionStatus, SnapshotMessage, WorldState, HOST_PLAYER, PROTOCOL_VERSION,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Messages sent from network tasks to the tick loop
#[derive(Debug)]
pub enum ServerMessage {
    /// A peer finished the hello exchange and waits for a seat.
    ///
    /// `outbound` feeds the peer's writer task. `seat` carries the answer
    /// back to the connection task. Firing or dropping `kick` stops the
    /// connection's read loop, which is how the tick loop closes a peer it
    /// has given up on.
    PeerArrived {
        conn_id: ConnId,
        addr: SocketAddr,
        outbound: mpsc::Sender<GameMessage>,
        seat: oneshot::Sender<Option<PlayerId>>,
        kick: oneshot::Sender<()>,
    },
    /// A decoded input from a seated peer. The tick loop stamps the
    /// peer's seat onto it before caching, so a client cannot steer the
    /// other avatar.
    InputReceived {
        conn_id: ConnId,
        input: InputMessage,
    },
    /// The read loop ended: goodbye, EOF, IO error or too many bad frames.
    PeerGone {
        conn_id: ConnId,
        reason: String,
    },
    ClientTimeout {
        conn_id: ConnId,
        player: PlayerId,
    },
}

/// Messages sent from the tick loop to a peer's writer task
#[derive(Debug, Clone)]
pub enum GameMessage {
    /// An already encoded frame, shared between peers.
    SendFrame(Arc<Vec<u8>>),
    /// Flush nothing more and shut the write half down.
    Disconnect,
}

/// Tick-loop side of a seated peer: its outbound queue and the switch that
/// ends its read loop.
struct Peer {
    outbound: mpsc::Sender<GameMessage>,
    kick: oneshot::Sender<()>,
}

impl Peer {
    /// Closes the connection. The writer is asked to stop and the read loop
    /// is kicked, which also aborts a writer that is still stuck.
    fn close(self) {
        let _ = self.outbound.try_send(GameMessage::Disconnect);
        let _ = self.kick.send(());
    }
}

/// The authoritative side of a game. Runs with or without a listener; the
/// latter is single-player.
///
/// The session owns the world and the simulation engine outright. Network
/// tasks never touch either: they talk to the tick loop through
/// `ServerMessage`, and the loop answers with encoded frames through each
/// peer's `GameMessage` queue.
///
/// At most one guest is seated at a time. The host's own input comes from
/// the `LocalCommand` channel passed to `run`, so the same loop serves
/// hosting and single-player.
pub struct HostSession {
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    config: SessionConfig,
    clients: Arc<RwLock<ClientManager>>,
    engine: SimulationEngine,
    world: WorldState,
    inputs: InputCache,
    local_input: InputManager,
    peers: HashMap<ConnId, Peer>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl HostSession {
    /// Binds the listener. Failing to bind is the only fatal host error.
    ///
    /// Nothing is accepted until `run` starts; connections made before that
    /// wait in the listen backlog.
    pub async fn bind(addr: &str, config: SessionConfig) -> Result<Self, SessionError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| SessionError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| SessionError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("Hosting on {}", local_addr);

        let mut session = Self::build(config);
        session.listener = Some(listener);
        session.local_addr = Some(local_addr);
        Ok(session)
    }

    /// A session with no network at all.
    pub fn single_player(config: SessionConfig) -> Self {
        info!("Starting single-player session");
        Self::build(config)
    }

    fn build(config: SessionConfig) -> Self {
        let engine = SimulationEngine::new(SimConfig { seed: config.seed });
        debug!("Simulation seed {}", engine.config().seed);
        let world = engine.new_world(&[HOST_PLAYER]);
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Self {
            listener: None,
            local_addr: None,
            clients: Arc::new(RwLock::new(ClientManager::new(config.idle_timeout))),
            config,
            engine,
            world,
            inputs: InputCache::new(),
            local_input: InputManager::new(HOST_PLAYER),
            peers: HashMap::new(),
            server_tx,
            server_rx,
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Spawns the task accepting new TCP connections.
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let mut next_conn_id: ConnId = 1;
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if server_tx.is_closed() {
                            break;
                        }
                        let conn_id = next_conn_id;
                        next_conn_id += 1;
                        debug!("Accepted connection {} from {}", conn_id, addr);
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            conn_id,
                            config.clone(),
                            server_tx.clone(),
                        ));
                    }
                    Err(e) => {
                        if server_tx.is_closed() {
                            break;
                        }
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that monitors peer timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;
                if server_tx.is_closed() {
                    return;
                }

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client in timed_out {
                    let message = ServerMessage::ClientTimeout {
                        conn_id: client.conn_id,
                        player: client.player,
                    };
                    if server_tx.send(message).is_err() {
                        return;
                    }
                }
            }
        });
    }

    /// Runs the tick loop until a local quit or until `local_rx` closes.
    ///
    /// Each tick the loop samples the cached inputs, advances the world by
    /// one fixed step, hands the snapshot to the presenter and queues it for
    /// every peer. Peer traffic and local commands are handled between ticks.
    ///
    /// Losing a peer never ends the host; it reports `PeerLeft` and keeps
    /// playing. On exit every peer connection is closed and `Stopped` is
    /// reported.
    pub async fn run(
        mut self,
        mut local_rx: mpsc::UnboundedReceiver<LocalCommand>,
        presenter_tx: mpsc::UnboundedSender<PresentationEvent>,
    ) -> Result<(), SessionError> {
        let status = match self.local_addr {
            Some(addr) => SessionStatus::Listening(addr),
            None => SessionStatus::SinglePlayer,
        };
        notify(&presenter_tx, status);

        if self.listener.is_some() {
            self.spawn_acceptor();
            self.spawn_timeout_checker();
        }

        let mut tick_interval = interval(self.config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let dt = self.config.dt();

        loop {
            tokio::select! {
                command = local_rx.recv() => {
                    let Some(command) = command else {
                        info!("Local input closed, stopping host");
                        break;
                    };
                    if !self.local_input.apply(command) {
                        info!("Quit requested, stopping host");
                        break;
                    }
                },

                message = self.server_rx.recv() => {
                    // The loop holds a sender itself, so this never yields None.
                    if let Some(message) = message {
                        self.handle_message(message, &presenter_tx).await;
                    }
                },

                _ = tick_interval.tick() => {
                    self.step(dt, &presenter_tx);
                },
            }
        }

        for (_, peer) in self.peers.drain() {
            peer.close();
        }
        notify(&presenter_tx, SessionStatus::Stopped);
        Ok(())
    }

    /// One fixed step: sample inputs, advance, then publish the snapshot.
    fn step(&mut self, dt: f32, presenter_tx: &mpsc::UnboundedSender<PresentationEvent>) {
        let local = self.local_input.next_message();
        self.inputs.submit(&local);

        let frame = self.inputs.frame();
        let events = self.engine.advance(&mut self.world, &frame, dt);
        let snapshot = Arc::new(SnapshotMessage::capture(&self.world, events));

        if !self.peers.is_empty() {
            self.broadcast_snapshot(&snapshot);
        }

        if presenter_tx
            .send(PresentationEvent::Frame(Arc::clone(&snapshot)))
            .is_err()
        {
            debug!("Presenter gone, dropping frame {}", snapshot.tick);
        }

        if self.world.tick % 300 == 0 {
            debug!(
                "Tick {}: wave {} {:?}, {} entities, {} peers",
                self.world.tick,
                self.world.wave,
                self.world.phase,
                self.world.entities.len(),
                self.peers.len()
            );
        }
    }

    /// Encodes the snapshot once and queues it for every peer. A peer whose
    /// queue is full misses this frame.
    fn broadcast_snapshot(&self, snapshot: &SnapshotMessage) {
        let frame = match encode_frame(&Packet::Snapshot(snapshot.clone())) {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                error!("Failed to encode snapshot {}: {}", snapshot.tick, e);
                return;
            }
        };

        for (conn_id, peer) in &self.peers {
            match peer.outbound.try_send(GameMessage::SendFrame(Arc::clone(&frame))) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("Outbound queue of peer {} full, skipping frame", conn_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Peer {} writer closed", conn_id);
                }
            }
        }
    }

    async fn handle_message(
        &mut self,
        message: ServerMessage,
        presenter_tx: &mpsc::UnboundedSender<PresentationEvent>,
    ) {
        match message {
            ServerMessage::PeerArrived {
                conn_id,
                addr,
                outbound,
                seat,
                kick,
            } => {
                let player = {
                    let mut clients = self.clients.write().await;
                    clients.admit(conn_id, addr)
                };

                let Some(player) = player else {
                    info!("Rejecting {} from {}: session full", conn_id, addr);
                    queue_packet(
                        &outbound,
                        &Packet::Rejected {
                            reason: "session full".to_string(),
                        },
                    );
                    let _ = outbound.try_send(GameMessage::Disconnect);
                    let _ = seat.send(None);
                    return;
                };

                self.engine.join_player(&mut self.world, player);
                queue_packet(
                    &outbound,
                    &Packet::Welcome {
                        player,
                        tick: self.world.tick,
                    },
                );
                self.peers.insert(conn_id, Peer { outbound, kick });
                if seat.send(Some(player)).is_err() {
                    warn!("Peer {} vanished during handshake", conn_id);
                }
                notify(presenter_tx, SessionStatus::PeerJoined { player, addr });
            }

            ServerMessage::InputReceived { conn_id, mut input } => {
                let mut clients = self.clients.write().await;
                let Some(player) = clients.player_of(conn_id) else {
                    return;
                };
                // Peers cannot speak for anyone else.
                input.player = player;
                if self.inputs.submit(&input) {
                    clients.record_input(conn_id, input.sequence);
                } else {
                    clients.touch(conn_id);
                }
            }

            ServerMessage::PeerGone { conn_id, reason } => {
                let removed = {
                    let mut clients = self.clients.write().await;
                    clients.remove(conn_id)
                };
                if let Some(client) = removed {
                    self.drop_peer(conn_id, client.player, reason, presenter_tx);
                } else {
                    self.peers.remove(&conn_id);
                }
            }

            ServerMessage::ClientTimeout { conn_id, player } => {
                warn!("Peer {} ({}) timed out", conn_id, player);
                self.drop_peer(conn_id, player, "timed out".to_string(), presenter_tx);
            }
        }
    }

    fn drop_peer(
        &mut self,
        conn_id: ConnId,
        player: PlayerId,
        reason: String,
        presenter_tx: &mpsc::UnboundedSender<PresentationEvent>,
    ) {
        if let Some(peer) = self.peers.remove(&conn_id) {
            peer.close();
        }
        self.inputs.forget(player);
        self.engine.leave_player(&mut self.world, player);
        info!("{} left the session: {}", player, reason);
        notify(presenter_tx, SessionStatus::PeerLeft { player, reason });
    }
}

fn notify(presenter_tx: &mpsc::UnboundedSender<PresentationEvent>, status: SessionStatus) {
    if presenter_tx.send(PresentationEvent::Status(status)).is_err() {
        debug!("Presenter gone, status dropped");
    }
}

fn queue_packet(outbound: &mpsc::Sender<GameMessage>, packet: &Packet) {
    match encode_frame(packet) {
        Ok(frame) => {
            if outbound
                .try_send(GameMessage::SendFrame(Arc::new(frame)))
                .is_err()
            {
                warn!("Could not queue {:?}", packet);
            }
        }
        Err(e) => error!("Failed to encode packet: {}", e),
    }
}

/// Drives one TCP connection: hello exchange, seat request, then the read
/// loop. The writer runs in its own task.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    conn_id: ConnId,
    config: SessionConfig,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = FramedReader::new(read_half);

    let hello = match timeout(config.handshake_timeout, reader.next_packet()).await {
        Ok(Ok(Some(Ok(packet)))) => packet,
        Ok(Ok(Some(Err(e)))) => {
            warn!("Malformed hello from {}: {}", addr, e);
            reject(&mut write_half, "malformed hello").await;
            return;
        }
        Ok(Ok(None)) => {
            debug!("{} closed before saying hello", addr);
            return;
        }
        Ok(Err(e)) => {
            warn!("Read error during handshake with {}: {}", addr, e);
            return;
        }
        Err(_) => {
            warn!("Handshake with {} timed out", addr);
            return;
        }
    };

    match hello {
        Packet::Hello { protocol_version } if protocol_version == PROTOCOL_VERSION => {}
        Packet::Hello { protocol_version } => {
            info!(
                "Rejecting {}: protocol version {} (expected {})",
                addr, protocol_version, PROTOCOL_VERSION
            );
            reject(
                &mut write_half,
                &format!(
                    "protocol version {} not supported, expected {}",
                    protocol_version, PROTOCOL_VERSION
                ),
            )
            .await;
            return;
        }
        other => {
            warn!("Expected hello from {}, got {:?}", addr, other);
            reject(&mut write_half, "expected hello").await;
            return;
        }
    }

    let (outbound, outbound_rx) = mpsc::channel(config.outbound_queue.max(1));
    let writer = tokio::spawn(run_writer(conn_id, write_half, outbound_rx));

    let (seat_tx, seat_rx) = oneshot::channel();
    let (kick_tx, kick_rx) = oneshot::channel();
    let arrived = ServerMessage::PeerArrived {
        conn_id,
        addr,
        outbound,
        seat: seat_tx,
        kick: kick_tx,
    };
    if server_tx.send(arrived).is_err() {
        return;
    }
    match seat_rx.await {
        Ok(Some(_)) => {}
        _ => return,
    }

    tokio::select! {
        reason = read_inputs(conn_id, &mut reader, &config, &server_tx) => {
            let _ = server_tx.send(ServerMessage::PeerGone { conn_id, reason });
        }
        _ = kick_rx => {
            // A peer that stopped reading can leave the writer stuck in a
            // write; abort it so the socket is released with the reader.
            writer.abort();
            debug!("Closed connection of peer {}", conn_id);
        }
    }
}

/// Forwards inputs until the peer leaves. Returns why the connection ended.
async fn read_inputs<R: AsyncRead + Unpin>(
    conn_id: ConnId,
    reader: &mut FramedReader<R>,
    config: &SessionConfig,
    server_tx: &mpsc::UnboundedSender<ServerMessage>,
) -> String {
    let mut budget = MalformedBudget::new(config.max_malformed_frames);

    loop {
        match reader.next_packet().await {
            Ok(Some(Ok(Packet::Input(input)))) => {
                budget.reset();
                if server_tx
                    .send(ServerMessage::InputReceived { conn_id, input })
                    .is_err()
                {
                    return "host stopped".to_string();
                }
            }
            Ok(Some(Ok(Packet::Goodbye))) => return "goodbye".to_string(),
            Ok(Some(Ok(other))) => {
                warn!("Unexpected packet from peer {}: {:?}", conn_id, other);
                if budget.strike() {
                    return "too many invalid frames".to_string();
                }
            }
            Ok(Some(Err(e))) => {
                warn!("Peer {} sent a bad frame: {}", conn_id, e);
                if budget.strike() {
                    return "too many invalid frames".to_string();
                }
            }
            Ok(None) => return "connection closed".to_string(),
            Err(e) => return e.to_string(),
        }
    }
}

async fn run_writer(
    conn_id: ConnId,
    mut write_half: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<GameMessage>,
) {
    while let Some(message) = outbound_rx.recv().await {
        match message {
            GameMessage::SendFrame(frame) => {
                if let Err(e) = write_half.write_all(&frame).await {
                    debug!("Write to peer {} failed: {}", conn_id, e);
                    break;
                }
            }
            GameMessage::Disconnect => break,
        }
    }
    let _ = write_half.shutdown().await;
    debug!("Writer for peer {} finished", conn_id);
}

async fn reject(write_half: &mut OwnedWriteHalf, reason: &str) {
    let packet = Packet::Rejected {
        reason: reason.to_string(),
    };
    if let Err(e) = write_packet(write_half, &packet).await {
        debug!("Could not send rejection: {}", e);
    }
    let _ = write_half.shutdown().await;
}
