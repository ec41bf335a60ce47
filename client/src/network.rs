use crate::projection::MatchView;
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{HeroId, MatchPhase, Packet, ParticipantId, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, Instant};

/// How the headless participant plays
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub display_name: String,
    /// Hero to request; a random one from `hero_pool` when absent
    pub preferred_hero: Option<HeroId>,
    pub hero_pool: Vec<HeroId>,
    pub auto_ready: bool,
    /// Cast at enemies during gameplay
    pub fight: bool,
    /// Seconds between casts
    pub cast_interval: f32,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            display_name: "bot".to_string(),
            preferred_hero: None,
            hero_pool: Vec::new(),
            auto_ready: true,
            fight: true,
            cast_interval: 1.0,
        }
    }
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    settings: BotSettings,
    view: MatchView,
    connected: bool,
    /// Set once the server has dropped us
    closed: bool,
    rng: StdRng,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        settings: BotSettings,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            settings,
            view: MatchView::new(),
            connected: false,
            closed: false,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn view(&self) -> &MatchView {
        &self.view
    }

    pub fn participant_id(&self) -> Option<ParticipantId> {
        self.view.local_id
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server as {}...", self.settings.display_name);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            display_name: self.settings.display_name.clone(),
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Tells the server we are leaving
    pub async fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.connected {
            self.send_packet(&Packet::Disconnect).await?;
            self.connected = false;
        }
        Ok(())
    }

    fn choose_hero(&mut self) -> Option<HeroId> {
        if let Some(hero) = &self.settings.preferred_hero {
            return Some(hero.clone());
        }
        self.settings.hero_pool.choose(&mut self.rng).cloned()
    }

    async fn handle_packet(&mut self, packet: Packet) -> Result<(), Box<dyn std::error::Error>> {
        self.view.apply(&packet);

        match packet {
            Packet::Connected { participant_id } => {
                info!("Connected! Participant ID: {}", participant_id);
                self.connected = true;
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.closed = true;
            }

            Packet::SelectionPhaseStarted { duration, .. } => {
                info!("Hero selection open for {:.0}s", duration);
                if let Some(hero_id) = self.choose_hero() {
                    info!("Requesting {}", hero_id);
                    self.send_packet(&Packet::HeroSelectionSubmit { hero_id })
                        .await?;
                }
            }

            Packet::HeroSelected {
                participant_id,
                hero_id,
                ..
            } => {
                info!("{} picked {}", participant_id, hero_id);
                if Some(participant_id) == self.participant_id() && self.settings.auto_ready {
                    self.send_packet(&Packet::ReadySubmit { is_ready: true })
                        .await?;
                }
            }

            Packet::SelectionRejected { reason } => {
                warn!("Request rejected: {}", reason);
            }

            Packet::SelectionCountdown { seconds, .. } => {
                info!("Everyone ready, match starts in {:.1}s", seconds);
            }

            Packet::PhaseChanged { phase } => {
                info!("Phase is now {:?}", phase);
            }

            Packet::HeroDied { participant_id } => {
                info!("{} died", participant_id);
            }

            _ => {}
        }

        Ok(())
    }

    /// Fires a random ability at a random living enemy
    async fn try_cast(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.view.phase != MatchPhase::Gameplay {
            return Ok(());
        }
        let Some(own) = self.view.local_hero() else {
            return Ok(());
        };
        if !own.alive || own.cooldowns.is_empty() {
            return Ok(());
        }

        let ready_slots: Vec<usize> = own
            .cooldowns
            .iter()
            .enumerate()
            .filter(|(_, remaining)| **remaining <= 0.0)
            .map(|(slot, _)| slot)
            .collect();
        let target = self
            .view
            .living_enemies()
            .choose(&mut self.rng)
            .map(|enemy| (enemy.participant_id, enemy.position));

        let (Some(&slot), Some((target, position))) =
            (ready_slots.choose(&mut self.rng), target)
        else {
            return Ok(());
        };

        let packet = Packet::UseAbility {
            slot: slot as u8,
            target_position: Some(position),
            target: Some(target),
        };
        self.send_packet(&packet).await
    }

    /// Runs until the server drops us or `duration` elapses
    pub async fn run(
        &mut self,
        duration: Option<Duration>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let deadline = duration.map(|d| Instant::now() + d);
        let mut heartbeat_interval = interval(Duration::from_secs(1));
        let cast_every = Duration::from_secs_f32(self.settings.cast_interval.max(0.1));
        let mut cast_interval = interval(cast_every);

        let mut buffer = [0u8; 2048];

        while !self.closed {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                info!("Run time elapsed");
                break;
            }

            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => self.handle_packet(packet).await?,
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        self.send_packet(&Packet::Heartbeat).await?;
                    }
                },

                _ = cast_interval.tick() => {
                    // Skip roughly one cast in five
                    if self.settings.fight && self.rng.gen_bool(0.8) {
                        if let Err(e) = self.try_cast().await {
                            error!("Error sending cast: {}", e);
                        }
                    }
                },
            }
        }

        self.disconnect().await
    }
}
