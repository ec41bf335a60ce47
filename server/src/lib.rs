//! # Arena Server Library
//!
//! This library provides the authoritative server for the arena's match setup
//! and hero simulation. It owns every piece of match state, validates every
//! participant request, and tells observers what changed.
//!
//! ## Core Responsibilities
//!
//! ### Match Setup
//! Participants connect in the lobby, are balanced onto teams, pick heroes
//! during a timed selection phase and ready up. When everyone is ready (after
//! a short grace countdown) or the timer runs out, unselected participants
//! get a random hero and the match moves to gameplay.
//!
//! ### Hero Simulation
//! Each spawned hero carries a stat engine, health and mana, and a set of
//! abilities with level scaling, mana costs and cooldowns. Ability effects
//! are resolved against the other heroes in the arena.
//!
//! ### State Broadcasting
//! Every authoritative change is published synchronously on an event bus.
//! The network layer turns those events into packets, and periodically sends
//! full snapshots so observers can recover from lost datagrams. Selection and
//! team updates carry a revision so stale snapshots can be discarded.
//!
//! ## Module Organization
//!
//! ### Stats (`stats`)
//! Base values from hero definitions plus flat, additive-percent and
//! multiplicative-percent modifiers, and damage mitigation.
//!
//! ### Abilities (`ability`, `targeting`, `effects`)
//! - Per-hero ability runtime: level values, cooldown, mana and activation
//! - Target validation and line of sight against an obstruction map
//! - Arena effects: damage, healing and timed stat buffs
//!
//! ### Heroes (`hero`)
//! Hero instances combining stats, vitals and ability runtimes.
//!
//! ### Teams (`teams`)
//! Team membership, auto-balancing, capacity and spawn points.
//!
//! ### Selection (`selection`)
//! The hero selection phase: picks, ready flags, countdown and substitution.
//!
//! ### Lifecycle (`lifecycle`)
//! Phase transitions and the participant registry. The single entry point
//! for every command a participant can issue.
//!
//! ### Events and Transport (`events`, `transport`)
//! Observer registration with unsubscribe, and the seam between events and
//! whatever carries packets.
//!
//! ### Network (`network`, `connections`)
//! - UDP socket management and packet processing
//! - Connection tracking with timeouts and capacity limits
//! - The fixed-rate match loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::MatchConfig;
//! use server::lifecycle::MatchLifecycleController;
//! use server::network::{Server, ServerSettings};
//! use shared::content::GameContent;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let content = Arc::new(GameContent::builtin()?);
//!     let controller = MatchLifecycleController::new(MatchConfig::default(), content)?;
//!
//!     // Binds the socket and wires match events to the sender task
//!     let mut server = Server::new("127.0.0.1:8080", controller, ServerSettings::default()).await?;
//!
//!     // Runs until shut down:
//!     // - Accepts connections and routes participant commands
//!     // - Opens hero selection once enough participants are in the lobby
//!     // - Ticks selection timers and hero cooldowns
//!     // - Broadcasts events and periodic snapshots
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The server uses internal async tasks that handle:
//! - **Network Receiver**: Continuously listens for incoming packets
//! - **Network Sender**: Resolves participant addresses and sends packets
//! - **Timeout Checker**: Removes participants that went silent
//! - **Main Loop**: Owns the controller, applies commands and ticks the match

pub mod ability;
pub mod config;
pub mod connections;
pub mod effects;
pub mod events;
pub mod hero;
pub mod lifecycle;
pub mod network;
pub mod selection;
pub mod stats;
pub mod targeting;
pub mod teams;
pub mod transport;
