//! Wire protocol, identifiers and static content shared by the arena server and
//! its observers.
//!
//! Everything that crosses the network is a [`Packet`] encoded with `bincode`.
//! Selection and team updates carry a monotonic `revision` so observers can
//! discard a full snapshot that arrives after a newer incremental update.

pub mod content;
pub mod tooltip;

use serde::{Deserialize, Serialize};
use std::fmt;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_HERO_LEVEL: u32 = 5;
pub const MIN_COOLDOWN: f32 = 0.5;
pub const READY_GRACE_SECONDS: f32 = 5.0;

/// Opaque connection handle assigned by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeroId(pub String);

impl From<&str> for HeroId {
    fn from(s: &str) -> Self {
        HeroId(s.to_string())
    }
}

impl fmt::Display for HeroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityId(pub String);

impl From<&str> for AbilityId {
    fn from(s: &str) -> Self {
        AbilityId(s.to_string())
    }
}

impl fmt::Display for AbilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub u8);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Match setup stage as seen by every participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Lobby,
    HeroSelection,
    Gameplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionState {
    Inactive,
    InProgress,
    AllReadyCountdown,
    Complete,
}

/// Why a participant's request was turned down. Sent to that participant only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    InvalidHero,
    NoHeroSelected,
    PhaseClosed,
    UnknownTeam,
    TeamFull,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectionReason::InvalidHero => "invalid selection",
            RejectionReason::NoHeroSelected => "no hero selected",
            RejectionReason::PhaseClosed => "hero selection is not open",
            RejectionReason::UnknownTeam => "unknown team",
            RejectionReason::TeamFull => "team is full",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    pub revision: u64,
    pub state: SelectionState,
    pub time_remaining: f32,
    pub picks: Vec<(ParticipantId, HeroId)>,
    pub ready: Vec<(ParticipantId, bool)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRosterEntry {
    pub team_id: TeamId,
    pub name: String,
    pub members: Vec<ParticipantId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroSnapshot {
    pub participant_id: ParticipantId,
    pub hero_id: HeroId,
    pub team_id: TeamId,
    pub level: u32,
    pub health: f32,
    pub max_health: f32,
    pub mana: f32,
    pub max_mana: f32,
    pub position: Vec2,
    pub alive: bool,
    pub cooldowns: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Participant -> server
    Connect {
        client_version: u32,
        display_name: String,
    },
    HeroSelectionSubmit {
        hero_id: HeroId,
    },
    ReadySubmit {
        is_ready: bool,
    },
    TeamChangeRequest {
        team_id: TeamId,
    },
    UseAbility {
        slot: u8,
        target_position: Option<Vec2>,
        target: Option<ParticipantId>,
    },
    /// Keeps an otherwise idle connection from timing out
    Heartbeat,
    Disconnect,

    // Server -> participant(s)
    Connected {
        participant_id: ParticipantId,
    },
    Disconnected {
        reason: String,
    },
    PhaseChanged {
        phase: MatchPhase,
    },
    SelectionPhaseStarted {
        duration: f32,
        revision: u64,
    },
    HeroSelected {
        participant_id: ParticipantId,
        hero_id: HeroId,
        revision: u64,
    },
    ReadyChanged {
        participant_id: ParticipantId,
        is_ready: bool,
        revision: u64,
    },
    SelectionCountdown {
        seconds: f32,
        revision: u64,
    },
    SelectionPhaseComplete {
        revision: u64,
    },
    SelectionRejected {
        reason: RejectionReason,
    },
    SelectionState {
        snapshot: SelectionSnapshot,
    },
    TeamChanged {
        participant_id: ParticipantId,
        team_id: TeamId,
        revision: u64,
    },
    TeamRoster {
        revision: u64,
        teams: Vec<TeamRosterEntry>,
    },
    HeroStates {
        tick: u32,
        heroes: Vec<HeroSnapshot>,
    },
    AbilityUsed {
        participant_id: ParticipantId,
        ability_id: AbilityId,
    },
    CooldownComplete {
        participant_id: ParticipantId,
        ability_id: AbilityId,
    },
    AbilityLeveledUp {
        participant_id: ParticipantId,
        ability_id: AbilityId,
        level: u32,
    },
    HeroLeveledUp {
        participant_id: ParticipantId,
        level: u32,
    },
    HeroDied {
        participant_id: ParticipantId,
    },
}
