//! Join session: connects to a host, streams local input at a fixed rate and
//! applies incoming snapshots to the local mirror.

use crate::game::{ClientWorld, SnapshotOutcome};
use log::{debug, error, info, warn};
use shared::framing::MalformedBudget;
use shared::{
    write_packet, FramedReader, InputManager, LocalCommand, Packet, PlayerId,
    PresentationEvent, SessionConfig, SessionError, SessionStatus, PROTOCOL_VERSION,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Messages sent from the network tasks to the session loop
#[derive(Debug)]
pub enum ClientMessage {
    PacketReceived(Packet),
    /// Either task gave up on the socket; carries a readable reason.
    ConnectionLost(String),
}

/// A joined session. Built by `connect`, consumed by `run`.
///
/// The client never simulates. It streams the local player's controls to
/// the host at the configured input rate and mirrors whatever snapshots
/// come back, skipping any that arrive out of order.
pub struct ClientSession {
    reader: FramedReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    player: PlayerId,
    welcome_tick: u64,
    config: SessionConfig,
    mirror: ClientWorld,
    input: InputManager,
}

impl ClientSession {
    /// Connects and completes the hello exchange within the handshake
    /// timeout.
    ///
    /// Every failure here is a setup failure: refused or unreachable hosts,
    /// a rejection (protocol mismatch, full session), an unexpected reply or
    /// the host hanging up before answering.
    pub async fn connect(addr: &str, config: SessionConfig) -> Result<Self, SessionError> {
        let limit = config.handshake_timeout;
        match timeout(limit, Self::handshake(addr, config)).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::HandshakeTimeout(limit)),
        }
    }

    async fn handshake(addr: &str, config: SessionConfig) -> Result<Self, SessionError> {
        info!("Connecting to {}...", addr);
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| SessionError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY: {}", e);
        }

        let (read_half, mut writer) = stream.into_split();
        let mut reader = FramedReader::new(read_half);

        write_packet(
            &mut writer,
            &Packet::Hello {
                protocol_version: PROTOCOL_VERSION,
            },
        )
        .await
        .map_err(|e| SessionError::Handshake(e.to_string()))?;

        let reply = reader
            .next_packet()
            .await
            .map_err(|e| SessionError::Handshake(e.to_string()))?;

        match reply {
            Some(Ok(Packet::Welcome { player, tick })) => {
                info!("Joined as {} at host tick {}", player, tick);
                Ok(Self {
                    reader,
                    writer,
                    player,
                    welcome_tick: tick,
                    config,
                    mirror: ClientWorld::new(),
                    input: InputManager::new(player),
                })
            }
            Some(Ok(Packet::Rejected { reason })) => Err(SessionError::Rejected(reason)),
            Some(Ok(other)) => Err(SessionError::Protocol(format!(
                "expected welcome, got {:?}",
                other
            ))),
            Some(Err(e)) => Err(SessionError::Protocol(e.to_string())),
            None => Err(SessionError::Handshake(
                "host closed the connection".to_string(),
            )),
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn welcome_tick(&self) -> u64 {
        self.welcome_tick
    }

    /// Spawns task that turns incoming frames into session messages
    fn spawn_network_receiver<R>(
        mut reader: FramedReader<R>,
        max_malformed: u32,
        client_tx: mpsc::UnboundedSender<ClientMessage>,
    ) where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut budget = MalformedBudget::new(max_malformed);

            let reason = loop {
                match reader.next_packet().await {
                    Ok(Some(Ok(packet))) => {
                        budget.reset();
                        if client_tx.send(ClientMessage::PacketReceived(packet)).is_err() {
                            return;
                        }
                    }
                    Ok(Some(Err(e))) => {
                        warn!("Bad frame from host: {}", e);
                        if budget.strike() {
                            break format!(
                                "{} malformed frames in a row",
                                budget.consecutive()
                            );
                        }
                    }
                    Ok(None) => break "host closed the connection".to_string(),
                    Err(e) => break e.to_string(),
                }
            };

            let _ = client_tx.send(ClientMessage::ConnectionLost(reason));
        });
    }

    /// Spawns task that writes queued packets to the host
    fn spawn_network_sender(
        mut writer: OwnedWriteHalf,
        mut packet_rx: mpsc::UnboundedReceiver<Packet>,
        client_tx: mpsc::UnboundedSender<ClientMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(packet) = packet_rx.recv().await {
                if let Err(e) = write_packet(&mut writer, &packet).await {
                    error!("Failed to send packet to host: {}", e);
                    let _ = client_tx.send(ClientMessage::ConnectionLost(e.to_string()));
                    return;
                }
            }
            let _ = writer.shutdown().await;
        })
    }

    /// Runs until the local player quits (Ok) or the host goes away (Err).
    ///
    /// A quit sends `goodbye` and waits briefly for the sender to flush it.
    /// Connection loss, a broken snapshot run or a host shutdown is reported
    /// to the presenter as `ConnectionLost` before returning.
    pub async fn run(
        self,
        mut local_rx: mpsc::UnboundedReceiver<LocalCommand>,
        presenter_tx: mpsc::UnboundedSender<PresentationEvent>,
    ) -> Result<(), SessionError> {
        let ClientSession {
            reader,
            writer,
            player,
            config,
            mut mirror,
            mut input,
            ..
        } = self;
        let (client_tx, mut client_rx) = mpsc::unbounded_channel();
        let (packet_tx, packet_rx) = mpsc::unbounded_channel();

        Self::spawn_network_receiver(reader, config.max_malformed_frames, client_tx.clone());
        let sender = Self::spawn_network_sender(writer, packet_rx, client_tx);

        notify(&presenter_tx, SessionStatus::Connected { player });

        let mut input_interval = interval(config.input_interval());
        input_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                command = local_rx.recv() => {
                    let keep_going = match command {
                        Some(command) => input.apply(command),
                        None => false,
                    };
                    if !keep_going {
                        info!("Leaving the session");
                        let _ = packet_tx.send(Packet::Goodbye);
                        break Ok(());
                    }
                },

                message = client_rx.recv() => {
                    match message {
                        Some(ClientMessage::PacketReceived(packet)) => {
                            if let Err(e) = handle_packet(&mut mirror, packet, &presenter_tx) {
                                break Err(e);
                            }
                        },
                        Some(ClientMessage::ConnectionLost(reason)) => {
                            break Err(SessionError::ConnectionLost(reason));
                        },
                        None => {
                            break Err(SessionError::ConnectionLost("network tasks stopped".to_string()));
                        }
                    }
                },

                _ = input_interval.tick() => {
                    let message = input.next_message();
                    let sequence = message.sequence;
                    if packet_tx.send(Packet::Input(message)).is_err() {
                        debug!("Sender gone, input {} dropped", sequence);
                    }
                },
            }
        };

        // Let the writer flush the goodbye before the socket closes.
        drop(packet_tx);
        if timeout(Duration::from_secs(1), sender).await.is_err() {
            debug!("Writer did not finish in time");
        }

        match &outcome {
            Ok(()) => notify(&presenter_tx, SessionStatus::Stopped),
            Err(e) => {
                warn!("Session ended: {}", e);
                notify(&presenter_tx, SessionStatus::ConnectionLost(e.to_string()));
            }
        }
        outcome
    }
}

/// Applies one packet from the host. Only a rejection ends the session.
fn handle_packet(
    mirror: &mut ClientWorld,
    packet: Packet,
    presenter_tx: &mpsc::UnboundedSender<PresentationEvent>,
) -> Result<(), SessionError> {
    match packet {
        Packet::Snapshot(snapshot) => {
            match mirror.apply(&snapshot) {
                SnapshotOutcome::Applied { spawned, despawned } => {
                    if !spawned.is_empty() || !despawned.is_empty() {
                        debug!(
                            "Tick {}: {} new, {} gone",
                            snapshot.tick,
                            spawned.len(),
                            despawned.len()
                        );
                    }
                    let _ = presenter_tx.send(PresentationEvent::Frame(Arc::new(snapshot)));
                }
                SnapshotOutcome::Stale { .. } => {}
            }
            Ok(())
        }
        Packet::Rejected { reason } => Err(SessionError::ConnectionLost(format!(
            "host ended the session: {}",
            reason
        ))),
        other => {
            warn!("Unexpected packet from host: {:?}", other);
            Ok(())
        }
    }
}

fn notify(presenter_tx: &mpsc::UnboundedSender<PresentationEvent>, status: SessionStatus) {
    if presenter_tx.send(PresentationEvent::Status(status)).is_err() {
        debug!("Presenter gone, status dropped");
    }
}
