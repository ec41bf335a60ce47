//! # Arena Client Library
//!
//! This library provides a headless participant for the arena server. It
//! connects over UDP, follows the match from the packets it receives and can
//! play on its own: pick a hero, ready up and cast at enemies.
//!
//! ## Architecture Overview
//!
//! The client holds no authority. Everything it knows comes from the server,
//! either as incremental updates published the moment something changes or
//! as periodic full snapshots.
//!
//! ### Revision Gating
//! UDP may reorder datagrams, so a full snapshot can arrive after an update
//! that is newer than it. Selection and team updates carry a monotonic
//! revision; the projection keeps the highest revision it has applied and
//! drops anything older.
//!
//! ### Keep-Alive
//! The server drops connections that stay silent for a few seconds, so the
//! client sends a heartbeat every second.
//!
//! ## Module Organization
//!
//! ### Projection Module (`projection`)
//! The observer view of the match:
//! - Phase and local participant id
//! - Selection picks, ready flags and countdown
//! - Team roster
//! - Latest hero snapshots
//!
//! ### Network Module (`network`)
//! Manages all client-server communication:
//! - UDP socket management and connection handling
//! - Packet serialization and deserialization
//! - Bot behaviour for selection and gameplay
//!
//! ### Catalog Module (`catalog`)
//! Hero and ability listing with tooltips rendered for a chosen level.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{BotSettings, Client};
//! use shared::HeroId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = BotSettings {
//!         display_name: "scout".to_string(),
//!         preferred_hero: Some(HeroId::from("ranger")),
//!         ..BotSettings::default()
//!     };
//!     let mut client = Client::new("127.0.0.1:8080", settings).await?;
//!
//!     // Plays until the server disconnects us
//!     client.run(None).await?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod network;
pub mod projection;
