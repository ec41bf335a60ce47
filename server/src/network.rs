//! Server network layer handling UDP communications and the match loop

use crate::ability::CastTarget;
use crate::connections::ConnectionTable;
use crate::lifecycle::MatchLifecycleController;
use crate::transport::{self, ChannelTransport, GameMessage};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{MatchPhase, Packet, ParticipantId, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        participant: ParticipantId,
    },
    Shutdown,
}

/// Loop timing and lobby rules
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub tick_duration: Duration,
    pub max_clients: usize,
    /// Ticks between full roster and selection snapshots
    pub snapshot_interval: u32,
    /// Hero selection opens once this many participants are connected
    pub min_participants: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(33),
            max_clients: 10,
            snapshot_interval: 30,
            min_participants: 2,
        }
    }
}

/// Main server coordinating networking and the match
pub struct Server {
    socket: Arc<UdpSocket>,
    connections: Arc<RwLock<ConnectionTable>>,
    controller: MatchLifecycleController,
    settings: ServerSettings,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        mut controller: MatchLifecycleController,
        settings: ServerSettings,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        transport::attach(controller.events_mut(), ChannelTransport::new(game_tx.clone()));

        Ok(Server {
            socket,
            connections: Arc::new(RwLock::new(ConnectionTable::new(settings.max_clients))),
            controller,
            settings,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle for stopping the loop from outside
    pub fn shutdown_sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn controller(&self) -> &MatchLifecycleController {
        &self.controller
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let connections = Arc::clone(&self.connections);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::SendToParticipant {
                        packet,
                        participant,
                    } => {
                        let addr = connections.read().await.addr_of(participant);
                        match addr {
                            Some(addr) => {
                                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await
                                {
                                    error!("Failed to send to {}: {}", participant, e);
                                }
                            }
                            None => debug!("Dropping packet for departed {}", participant),
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let addrs = connections.read().await.addrs();

                        for (participant, addr) in addrs {
                            if Some(participant) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to {}: {}", participant, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors participant timeouts
    fn spawn_timeout_checker(&self) {
        let connections = Arc::clone(&self.connections);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = connections.write().await.check_timeouts();

                for participant in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { participant }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket {
            packet,
            exclude: None,
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Processes one inbound packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect {
            client_version,
            display_name,
        } = packet
        {
            self.handle_connect(client_version, display_name, addr).await;
            return;
        }

        // Any packet from a known peer counts as activity
        let participant = {
            let mut connections = self.connections.write().await;
            let participant = connections.find_by_addr(addr);
            if let Some(participant) = participant {
                connections.touch(participant);
            }
            participant
        };
        let Some(participant) = participant else {
            warn!("Packet from unknown peer {}, ignoring", addr);
            return;
        };

        match packet {
            Packet::HeroSelectionSubmit { hero_id } => {
                self.controller.submit_hero_selection(participant, hero_id);
            }

            Packet::ReadySubmit { is_ready } => {
                self.controller.submit_ready(participant, is_ready);
            }

            Packet::TeamChangeRequest { team_id } => {
                self.controller.request_team_change(participant, team_id);
            }

            Packet::UseAbility {
                slot,
                target_position,
                target,
            } => {
                let target = CastTarget {
                    position: target_position,
                    target,
                };
                if !self
                    .controller
                    .use_ability(participant, slot as usize, target)
                {
                    debug!("{} could not use slot {}", participant, slot);
                }
            }

            Packet::Heartbeat => {}

            Packet::Disconnect => {
                self.connections.write().await.remove(participant);
                self.controller.disconnect_participant(participant);
            }

            _ => {
                warn!("Unexpected packet type from {} at {}", participant, addr);
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, display_name: String, addr: SocketAddr) {
        info!(
            "{} connecting from {} (version: {})",
            display_name, addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // Remove existing connection if present
        let existing = self.connections.read().await.find_by_addr(addr);
        if let Some(existing) = existing {
            info!("Replacing existing connection {} from {}", existing, addr);
            self.connections.write().await.remove(existing);
            self.controller.disconnect_participant(existing);
        }

        let participant = self
            .connections
            .write()
            .await
            .add(addr, display_name.clone());

        match participant {
            Some(participant_id) => {
                self.send_packet(Packet::Connected { participant_id }, addr);
                self.controller
                    .connect_participant(participant_id, display_name);
                self.send_full_state(addr);
            }
            None => {
                self.send_packet(
                    Packet::Disconnected {
                        reason: "Server full".to_string(),
                    },
                    addr,
                );
            }
        }
    }

    /// Sends the current phase and snapshots to one peer
    fn send_full_state(&self, addr: SocketAddr) {
        self.send_packet(
            Packet::PhaseChanged {
                phase: self.controller.phase(),
            },
            addr,
        );
        for packet in self.snapshot_packets() {
            self.send_packet(packet, addr);
        }
    }

    fn snapshot_packets(&self) -> Vec<Packet> {
        let (revision, teams) = self.controller.team_roster();
        let mut packets = vec![Packet::TeamRoster { revision, teams }];

        match self.controller.phase() {
            MatchPhase::Lobby => {}
            MatchPhase::HeroSelection => packets.push(Packet::SelectionState {
                snapshot: self.controller.selection_snapshot(),
            }),
            MatchPhase::Gameplay => packets.push(self.hero_states()),
        }
        packets
    }

    fn hero_states(&self) -> Packet {
        Packet::HeroStates {
            tick: self.controller.current_tick(),
            heroes: self.controller.hero_snapshots(),
        }
    }

    /// Advances the match one tick and broadcasts what changed
    async fn tick(&mut self, dt: f32) {
        let connected = self.connections.read().await.len();

        match self.controller.phase() {
            MatchPhase::Lobby => {
                let waiting = self.controller.participant_count();
                if connected > 0 && waiting >= self.settings.min_participants {
                    self.controller.start_hero_selection();
                }
            }
            MatchPhase::Gameplay if self.controller.participant_count() == 0 => {
                info!("Everyone left, ending match");
                self.controller.end_match();
            }
            _ => {}
        }

        self.controller.tick(dt);

        if connected == 0 {
            return;
        }

        let tick = self.controller.current_tick();
        if self.settings.snapshot_interval > 0 && tick % self.settings.snapshot_interval == 0 {
            for packet in self.snapshot_packets() {
                self.broadcast_packet(packet);
            }
        } else if self.controller.phase() == MatchPhase::Gameplay {
            self.broadcast_packet(self.hero_states());
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.settings.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { participant }) => {
                            info!("{} timed out", participant);
                            self.controller.disconnect_participant(participant);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.tick(dt).await;

                    // Periodic performance monitoring
                    let tick = self.controller.current_tick();
                    if tick % 60 == 0 && self.controller.participant_count() > 0 {
                        debug!("Tick {}: {} participants, {:?}, {:.1}Hz",
                               tick, self.controller.participant_count(),
                               self.controller.phase(), 1.0 / dt);
                    }
                },
            }
        }

        Ok(())
    }
}
