//! Client-side view of the match built purely from server packets
//!
//! Nothing here is authoritative. Selection and team records remember the
//! revision they were last updated to; anything older, whether a full
//! snapshot or an incremental update, is dropped so a delayed datagram can
//! never roll the view back.

use log::debug;
use shared::{
    HeroId, HeroSnapshot, MatchPhase, Packet, ParticipantId, RejectionReason, SelectionSnapshot,
    SelectionState, TeamId, TeamRosterEntry,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionView {
    pub revision: u64,
    pub state: SelectionState,
    pub time_remaining: f32,
    pub countdown: Option<f32>,
    pub picks: BTreeMap<ParticipantId, HeroId>,
    pub ready: BTreeMap<ParticipantId, bool>,
}

impl Default for SelectionView {
    fn default() -> Self {
        Self {
            revision: 0,
            state: SelectionState::Inactive,
            time_remaining: 0.0,
            countdown: None,
            picks: BTreeMap::new(),
            ready: BTreeMap::new(),
        }
    }
}

impl SelectionView {
    fn apply_snapshot(&mut self, snapshot: &SelectionSnapshot) -> bool {
        if snapshot.revision < self.revision {
            debug!(
                "Ignoring stale selection snapshot r{} (have r{})",
                snapshot.revision, self.revision
            );
            return false;
        }
        self.revision = snapshot.revision;
        self.state = snapshot.state;
        self.time_remaining = snapshot.time_remaining;
        if snapshot.state != SelectionState::AllReadyCountdown {
            self.countdown = None;
        }
        self.picks = snapshot.picks.iter().cloned().collect();
        self.ready = snapshot.ready.iter().copied().collect();
        true
    }

    /// Incremental updates must be strictly newer than what is shown
    fn accepts(&mut self, revision: u64) -> bool {
        if revision <= self.revision {
            return false;
        }
        self.revision = revision;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TeamView {
    pub revision: u64,
    pub teams: BTreeMap<TeamId, TeamRosterEntry>,
}

impl TeamView {
    pub fn team_of(&self, participant: ParticipantId) -> Option<TeamId> {
        self.teams
            .values()
            .find(|entry| entry.members.contains(&participant))
            .map(|entry| entry.team_id)
    }

    fn apply_roster(&mut self, revision: u64, teams: &[TeamRosterEntry]) -> bool {
        if revision < self.revision {
            debug!("Ignoring stale roster r{} (have r{})", revision, self.revision);
            return false;
        }
        self.revision = revision;
        self.teams = teams
            .iter()
            .map(|entry| (entry.team_id, entry.clone()))
            .collect();
        true
    }

    fn apply_change(&mut self, participant: ParticipantId, team: TeamId, revision: u64) -> bool {
        if revision <= self.revision {
            return false;
        }
        self.revision = revision;
        for entry in self.teams.values_mut() {
            entry.members.retain(|member| *member != participant);
        }
        self.teams
            .entry(team)
            .or_insert_with(|| TeamRosterEntry {
                team_id: team,
                name: team.to_string(),
                members: Vec::new(),
            })
            .members
            .push(participant);
        true
    }
}

/// Everything an observer knows about the match
#[derive(Debug, Clone, PartialEq)]
pub struct MatchView {
    pub local_id: Option<ParticipantId>,
    pub phase: MatchPhase,
    pub selection: SelectionView,
    pub teams: TeamView,
    pub heroes: BTreeMap<ParticipantId, HeroSnapshot>,
    pub hero_tick: u32,
    pub last_rejection: Option<RejectionReason>,
}

impl Default for MatchView {
    fn default() -> Self {
        Self {
            local_id: None,
            phase: MatchPhase::Lobby,
            selection: SelectionView::default(),
            teams: TeamView::default(),
            heroes: BTreeMap::new(),
            hero_tick: 0,
            last_rejection: None,
        }
    }
}

impl MatchView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one server packet into the view; returns true if anything changed
    pub fn apply(&mut self, packet: &Packet) -> bool {
        match packet {
            Packet::Connected { participant_id } => {
                self.local_id = Some(*participant_id);
                true
            }
            Packet::Disconnected { .. } => {
                self.local_id = None;
                true
            }
            Packet::PhaseChanged { phase } => {
                if *phase != MatchPhase::Gameplay {
                    self.heroes.clear();
                }
                self.phase = *phase;
                true
            }
            Packet::SelectionPhaseStarted { duration, revision } => {
                if !self.selection.accepts(*revision) {
                    return false;
                }
                let selection = &mut self.selection;
                selection.state = SelectionState::InProgress;
                selection.time_remaining = *duration;
                selection.countdown = None;
                selection.picks.clear();
                selection.ready.clear();
                true
            }
            Packet::HeroSelected {
                participant_id,
                hero_id,
                revision,
            } => {
                if !self.selection.accepts(*revision) {
                    return false;
                }
                self.selection.picks.insert(*participant_id, hero_id.clone());
                true
            }
            Packet::ReadyChanged {
                participant_id,
                is_ready,
                revision,
            } => {
                if !self.selection.accepts(*revision) {
                    return false;
                }
                let selection = &mut self.selection;
                selection.ready.insert(*participant_id, *is_ready);
                if !is_ready {
                    selection.countdown = None;
                    if selection.state == SelectionState::AllReadyCountdown {
                        selection.state = SelectionState::InProgress;
                    }
                }
                true
            }
            Packet::SelectionCountdown { seconds, revision } => {
                if !self.selection.accepts(*revision) {
                    return false;
                }
                self.selection.state = SelectionState::AllReadyCountdown;
                self.selection.countdown = Some(*seconds);
                true
            }
            Packet::SelectionPhaseComplete { revision } => {
                if !self.selection.accepts(*revision) {
                    return false;
                }
                self.selection.state = SelectionState::Complete;
                self.selection.countdown = None;
                true
            }
            Packet::SelectionRejected { reason } => {
                self.last_rejection = Some(*reason);
                true
            }
            Packet::SelectionState { snapshot } => self.selection.apply_snapshot(snapshot),
            Packet::TeamChanged {
                participant_id,
                team_id,
                revision,
            } => self.teams.apply_change(*participant_id, *team_id, *revision),
            Packet::TeamRoster { revision, teams } => self.teams.apply_roster(*revision, teams),
            Packet::HeroStates { tick, heroes } => {
                // Ticks wrap; only a small backwards step counts as reordering
                let behind = self.hero_tick.wrapping_sub(*tick);
                if !self.heroes.is_empty() && behind != 0 && behind < u32::MAX / 2 {
                    return false;
                }
                self.hero_tick = *tick;
                self.heroes = heroes
                    .iter()
                    .map(|hero| (hero.participant_id, hero.clone()))
                    .collect();
                true
            }
            Packet::HeroDied { participant_id } => match self.heroes.get_mut(participant_id) {
                Some(hero) => {
                    hero.alive = false;
                    hero.health = 0.0;
                    true
                }
                None => false,
            },
            Packet::HeroLeveledUp {
                participant_id,
                level,
            } => match self.heroes.get_mut(participant_id) {
                Some(hero) => {
                    hero.level = *level;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    pub fn local_hero(&self) -> Option<&HeroSnapshot> {
        self.local_id.and_then(|id| self.heroes.get(&id))
    }

    pub fn local_pick(&self) -> Option<&HeroId> {
        self.local_id.and_then(|id| self.selection.picks.get(&id))
    }

    /// Living heroes on a different team than the local participant
    pub fn living_enemies(&self) -> Vec<&HeroSnapshot> {
        let Some(own) = self.local_hero() else {
            return Vec::new();
        };
        self.heroes
            .values()
            .filter(|hero| hero.alive && hero.team_id != own.team_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::Vec2;

    const ME: ParticipantId = ParticipantId(1);
    const OTHER: ParticipantId = ParticipantId(2);

    fn snapshot(revision: u64, picks: Vec<(ParticipantId, &str)>) -> Packet {
        Packet::SelectionState {
            snapshot: SelectionSnapshot {
                revision,
                state: SelectionState::InProgress,
                time_remaining: 30.0,
                picks: picks
                    .into_iter()
                    .map(|(p, h)| (p, HeroId::from(h)))
                    .collect(),
                ready: vec![(ME, false), (OTHER, false)],
            },
        }
    }

    fn hero(participant: ParticipantId, team: u8, alive: bool) -> HeroSnapshot {
        HeroSnapshot {
            participant_id: participant,
            hero_id: HeroId::from("mage"),
            team_id: TeamId(team),
            level: 1,
            health: 500.0,
            max_health: 500.0,
            mana: 300.0,
            max_mana: 300.0,
            position: Vec2::default(),
            alive,
            cooldowns: vec![0.0; 3],
        }
    }

    #[test]
    fn test_stale_snapshot_after_incremental_is_ignored() {
        let mut view = MatchView::new();
        assert!(view.apply(&snapshot(4, vec![])));
        assert!(view.apply(&Packet::HeroSelected {
            participant_id: ME,
            hero_id: HeroId::from("knight"),
            revision: 6,
        }));

        // Snapshot taken before the pick arrives late
        assert!(!view.apply(&snapshot(5, vec![])));
        assert_eq!(view.selection.picks.get(&ME), Some(&HeroId::from("knight")));
        assert_eq!(view.selection.revision, 6);
    }

    #[test]
    fn test_newer_snapshot_replaces_view() {
        let mut view = MatchView::new();
        view.apply(&Packet::HeroSelected {
            participant_id: ME,
            hero_id: HeroId::from("knight"),
            revision: 2,
        });
        assert!(view.apply(&snapshot(9, vec![(OTHER, "mage")])));
        assert_eq!(view.selection.picks.len(), 1);
        assert_eq!(view.selection.picks.get(&OTHER), Some(&HeroId::from("mage")));
    }

    #[test]
    fn test_duplicate_incremental_ignored() {
        let mut view = MatchView::new();
        let ready = Packet::ReadyChanged {
            participant_id: ME,
            is_ready: true,
            revision: 3,
        };
        assert!(view.apply(&ready));
        assert!(!view.apply(&ready));
        assert!(!view.apply(&Packet::ReadyChanged {
            participant_id: ME,
            is_ready: false,
            revision: 2,
        }));
        assert_eq!(view.selection.ready.get(&ME), Some(&true));
    }

    #[test]
    fn test_countdown_cleared_by_unready() {
        let mut view = MatchView::new();
        view.apply(&Packet::SelectionCountdown {
            seconds: 5.0,
            revision: 1,
        });
        assert_eq!(view.selection.state, SelectionState::AllReadyCountdown);
        assert_eq!(view.selection.countdown, Some(5.0));

        view.apply(&Packet::ReadyChanged {
            participant_id: OTHER,
            is_ready: false,
            revision: 2,
        });
        assert_eq!(view.selection.countdown, None);
        assert_eq!(view.selection.state, SelectionState::InProgress);
    }

    #[test]
    fn test_late_countdown_after_unready_is_ignored() {
        let mut view = MatchView::new();
        view.apply(&Packet::ReadyChanged {
            participant_id: ME,
            is_ready: true,
            revision: 5,
        });
        view.apply(&Packet::ReadyChanged {
            participant_id: ME,
            is_ready: false,
            revision: 7,
        });

        // Countdown was announced at r6, before the un-ready
        assert!(!view.apply(&Packet::SelectionCountdown {
            seconds: 5.0,
            revision: 6,
        }));
        assert_eq!(view.selection.state, SelectionState::Inactive);
        assert_eq!(view.selection.countdown, None);
        assert_eq!(view.selection.revision, 7);
    }

    #[test]
    fn test_late_phase_start_keeps_picks() {
        let mut view = MatchView::new();
        view.apply(&Packet::SelectionPhaseStarted {
            duration: 60.0,
            revision: 1,
        });
        view.apply(&Packet::HeroSelected {
            participant_id: ME,
            hero_id: HeroId::from("mage"),
            revision: 3,
        });

        assert!(!view.apply(&Packet::SelectionPhaseStarted {
            duration: 60.0,
            revision: 1,
        }));
        assert_eq!(view.selection.picks.get(&ME), Some(&HeroId::from("mage")));
        assert_eq!(view.selection.state, SelectionState::InProgress);
    }

    #[test]
    fn test_late_completion_is_ignored() {
        let mut view = MatchView::new();
        view.apply(&snapshot(10, vec![(ME, "mage")]));

        assert!(!view.apply(&Packet::SelectionPhaseComplete { revision: 8 }));
        assert_eq!(view.selection.state, SelectionState::InProgress);

        assert!(view.apply(&Packet::SelectionPhaseComplete { revision: 11 }));
        assert_eq!(view.selection.state, SelectionState::Complete);
    }

    #[test]
    fn test_team_roster_gating() {
        let mut view = MatchView::new();
        let roster = vec![
            TeamRosterEntry {
                team_id: TeamId(0),
                name: "Dawn".to_string(),
                members: vec![ME],
            },
            TeamRosterEntry {
                team_id: TeamId(1),
                name: "Dusk".to_string(),
                members: vec![],
            },
        ];
        assert!(view.apply(&Packet::TeamRoster {
            revision: 1,
            teams: roster.clone(),
        }));
        assert!(view.apply(&Packet::TeamChanged {
            participant_id: ME,
            team_id: TeamId(1),
            revision: 2,
        }));
        assert_eq!(view.teams.team_of(ME), Some(TeamId(1)));

        assert!(!view.apply(&Packet::TeamRoster {
            revision: 1,
            teams: roster,
        }));
        assert_eq!(view.teams.team_of(ME), Some(TeamId(1)));
        assert!(view.teams.teams[&TeamId(0)].members.is_empty());
    }

    #[test]
    fn test_selection_phase_start_clears_picks() {
        let mut view = MatchView::new();
        view.apply(&snapshot(3, vec![(ME, "mage")]));
        assert!(view.apply(&Packet::SelectionPhaseStarted {
            duration: 60.0,
            revision: 4,
        }));
        assert!(view.selection.picks.is_empty());
        assert_approx_eq!(view.selection.time_remaining, 60.0);
        assert_eq!(view.selection.revision, 4);
    }

    #[test]
    fn test_hero_states_and_enemies() {
        let mut view = MatchView::new();
        view.apply(&Packet::Connected { participant_id: ME });
        view.apply(&Packet::PhaseChanged {
            phase: MatchPhase::Gameplay,
        });
        assert!(view.apply(&Packet::HeroStates {
            tick: 10,
            heroes: vec![
                hero(ME, 0, true),
                hero(OTHER, 1, true),
                hero(ParticipantId(3), 1, false),
            ],
        }));
        assert_eq!(view.living_enemies().len(), 1);

        // Older tick arriving late
        assert!(!view.apply(&Packet::HeroStates {
            tick: 8,
            heroes: vec![],
        }));
        assert_eq!(view.heroes.len(), 3);

        view.apply(&Packet::HeroDied {
            participant_id: OTHER,
        });
        assert!(view.living_enemies().is_empty());
        assert_eq!(view.local_hero().map(|h| h.team_id), Some(TeamId(0)));
    }

    #[test]
    fn test_rejection_recorded() {
        let mut view = MatchView::new();
        view.apply(&Packet::SelectionRejected {
            reason: RejectionReason::NoHeroSelected,
        });
        assert_eq!(view.last_rejection, Some(RejectionReason::NoHeroSelected));
    }
}
