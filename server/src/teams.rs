//! Participant to team membership with size balancing
//!
//! Two indices are kept: members per team (join order) and team per
//! participant. Every mutation updates both before it returns and bumps the
//! roster revision.

use crate::events::{EventBus, MatchEvent};
use log::{debug, info, warn};
use shared::content::TeamConfig;
use shared::{ParticipantId, RejectionReason, TeamId, TeamRosterEntry, Vec2};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct TeamAssignmentService {
    teams: Vec<TeamConfig>,
    default_max_players: usize,
    auto_balance: bool,
    members: HashMap<TeamId, Vec<ParticipantId>>,
    team_by_participant: HashMap<ParticipantId, TeamId>,
    revision: u64,
}

impl TeamAssignmentService {
    /// `default_max_players` applies to teams without their own `max_players`
    pub fn new(teams: Vec<TeamConfig>, default_max_players: usize, auto_balance: bool) -> Self {
        let members = teams.iter().map(|t| (t.id, Vec::new())).collect();
        Self {
            teams,
            default_max_players,
            auto_balance,
            members,
            team_by_participant: HashMap::new(),
            revision: 0,
        }
    }

    /// Returns the participant's team, assigning one if needed
    ///
    /// With auto-balance the strictly smallest team with room wins, earlier
    /// teams winning ties. Without it the first team with room is used.
    /// `None` means every team is full.
    pub fn assign_participant_to_team(
        &mut self,
        participant: ParticipantId,
        events: &mut EventBus,
    ) -> Option<TeamId> {
        if let Some(team) = self.team_of(participant) {
            return Some(team);
        }

        let mut open = self.teams.iter().map(|t| t.id).filter(|id| self.has_room(*id));
        let chosen = if self.auto_balance {
            // min_by_key keeps the first of equal elements
            open.min_by_key(|id| self.team_size(*id))
        } else {
            open.next()
        };

        let Some(team) = chosen else {
            warn!("No team has room for {}", participant);
            return None;
        };

        self.insert(participant, team);
        info!("Assigned {} to {}", participant, team);
        events.publish(MatchEvent::TeamChanged {
            participant,
            from: None,
            to: team,
            revision: self.revision,
        });
        Some(team)
    }

    /// Moves an assigned participant to `team`
    ///
    /// Moving to the current team succeeds without any change. An
    /// unassigned participant is reported as `UnknownTeam`.
    pub fn request_team_change(
        &mut self,
        participant: ParticipantId,
        team: TeamId,
        events: &mut EventBus,
    ) -> Result<TeamId, RejectionReason> {
        if self.config(team).is_none() {
            return Err(RejectionReason::UnknownTeam);
        }

        let Some(current) = self.team_of(participant) else {
            return Err(RejectionReason::UnknownTeam);
        };

        if current == team {
            return Ok(team);
        }

        if !self.has_room(team) {
            debug!("{} cannot join full {}", participant, team);
            return Err(RejectionReason::TeamFull);
        }

        self.detach(participant, current);
        self.insert(participant, team);
        info!("{} moved from {} to {}", participant, current, team);
        events.publish(MatchEvent::TeamChanged {
            participant,
            from: Some(current),
            to: team,
            revision: self.revision,
        });
        Ok(team)
    }

    /// Drops a participant from both indices, returning the team they left
    pub fn remove_participant(&mut self, participant: ParticipantId) -> Option<TeamId> {
        let team = self.team_by_participant.remove(&participant)?;
        if let Some(list) = self.members.get_mut(&team) {
            list.retain(|p| *p != participant);
        }
        self.revision += 1;
        Some(team)
    }

    fn insert(&mut self, participant: ParticipantId, team: TeamId) {
        self.members.entry(team).or_default().push(participant);
        self.team_by_participant.insert(participant, team);
        self.revision += 1;
    }

    fn detach(&mut self, participant: ParticipantId, team: TeamId) {
        if let Some(list) = self.members.get_mut(&team) {
            list.retain(|p| *p != participant);
        }
        self.team_by_participant.remove(&participant);
    }

    fn config(&self, team: TeamId) -> Option<&TeamConfig> {
        self.teams.iter().find(|t| t.id == team)
    }

    pub fn capacity(&self, team: TeamId) -> Option<usize> {
        self.config(team)
            .map(|t| t.max_players.unwrap_or(self.default_max_players))
    }

    fn has_room(&self, team: TeamId) -> bool {
        self.capacity(team)
            .is_some_and(|max| self.team_size(team) < max)
    }

    pub fn team_size(&self, team: TeamId) -> usize {
        self.members.get(&team).map_or(0, Vec::len)
    }

    /// Strictly smallest configured team, earlier teams winning ties
    pub fn smallest_team(&self) -> Option<TeamId> {
        self.teams
            .iter()
            .map(|t| t.id)
            .min_by_key(|id| self.team_size(*id))
    }

    pub fn team_of(&self, participant: ParticipantId) -> Option<TeamId> {
        self.team_by_participant.get(&participant).copied()
    }

    pub fn are_allies(&self, a: ParticipantId, b: ParticipantId) -> bool {
        match (self.team_of(a), self.team_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    pub fn are_enemies(&self, a: ParticipantId, b: ParticipantId) -> bool {
        match (self.team_of(a), self.team_of(b)) {
            (Some(x), Some(y)) => x != y,
            _ => false,
        }
    }

    pub fn members(&self, team: TeamId) -> &[ParticipantId] {
        self.members.get(&team).map_or(&[], Vec::as_slice)
    }

    /// Spawn point for the `slot`-th member, wrapping around the team's list
    pub fn spawn_point(&self, team: TeamId, slot: usize) -> Option<Vec2> {
        let config = self.config(team)?;
        if config.spawn_points.is_empty() {
            return None;
        }
        Some(config.spawn_points[slot % config.spawn_points.len()])
    }

    /// Full membership in configuration order
    pub fn roster(&self) -> Vec<TeamRosterEntry> {
        self.teams
            .iter()
            .map(|t| TeamRosterEntry {
                team_id: t.id,
                name: t.name.clone(),
                members: self.members(t.id).to_vec(),
            })
            .collect()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn teams(&self) -> &[TeamConfig] {
        &self.teams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::record_events;

    fn team(id: u8, max_players: Option<usize>) -> TeamConfig {
        TeamConfig {
            id: TeamId(id),
            name: format!("Team {}", id),
            color: String::new(),
            max_players,
            spawn_points: vec![Vec2::new(id as f32, 0.0), Vec2::new(id as f32, 10.0)],
        }
    }

    fn service(auto_balance: bool) -> TeamAssignmentService {
        TeamAssignmentService::new(vec![team(0, None), team(1, None)], 5, auto_balance)
    }

    #[test]
    fn test_balanced_assignment_of_three() {
        let mut events = EventBus::new();
        let mut teams = service(true);

        for id in 1..=3 {
            teams.assign_participant_to_team(ParticipantId(id), &mut events);
        }

        assert_eq!(teams.team_size(TeamId(0)), 2);
        assert_eq!(teams.team_size(TeamId(1)), 1);
        assert_eq!(teams.team_of(ParticipantId(1)), Some(TeamId(0)));
        assert_eq!(teams.team_of(ParticipantId(2)), Some(TeamId(1)));
        assert_eq!(teams.team_of(ParticipantId(3)), Some(TeamId(0)));
    }

    #[test]
    fn test_assignment_is_idempotent() {
        let mut events = EventBus::new();
        let log = record_events(&mut events);
        let mut teams = service(true);

        let first = teams.assign_participant_to_team(ParticipantId(1), &mut events);
        let second = teams.assign_participant_to_team(ParticipantId(1), &mut events);

        assert_eq!(first, second);
        assert_eq!(teams.team_size(TeamId(0)) + teams.team_size(TeamId(1)), 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_first_team_without_auto_balance() {
        let mut events = EventBus::new();
        let mut teams = service(false);
        for id in 1..=3 {
            teams.assign_participant_to_team(ParticipantId(id), &mut events);
        }
        assert_eq!(teams.team_size(TeamId(0)), 3);
        assert_eq!(teams.team_size(TeamId(1)), 0);
    }

    #[test]
    fn test_full_teams_are_skipped() {
        let mut events = EventBus::new();
        let mut teams =
            TeamAssignmentService::new(vec![team(0, Some(1)), team(1, Some(1))], 5, false);

        assert_eq!(
            teams.assign_participant_to_team(ParticipantId(1), &mut events),
            Some(TeamId(0))
        );
        assert_eq!(
            teams.assign_participant_to_team(ParticipantId(2), &mut events),
            Some(TeamId(1))
        );
        assert_eq!(teams.assign_participant_to_team(ParticipantId(3), &mut events), None);
        assert_eq!(teams.team_of(ParticipantId(3)), None);
    }

    #[test]
    fn test_team_change_updates_both_indices() {
        let mut events = EventBus::new();
        let log = record_events(&mut events);
        let mut teams = service(true);
        teams.assign_participant_to_team(ParticipantId(1), &mut events);

        assert_eq!(
            teams.request_team_change(ParticipantId(1), TeamId(1), &mut events),
            Ok(TeamId(1))
        );
        assert_eq!(teams.team_of(ParticipantId(1)), Some(TeamId(1)));
        assert_eq!(teams.members(TeamId(0)), &[] as &[ParticipantId]);
        assert_eq!(teams.members(TeamId(1)), &[ParticipantId(1)]);

        let log = log.lock().unwrap();
        assert!(matches!(
            log.last(),
            Some(MatchEvent::TeamChanged {
                from: Some(TeamId(0)),
                to: TeamId(1),
                ..
            })
        ));
    }

    #[test]
    fn test_team_change_rejections() {
        let mut events = EventBus::new();
        let mut teams =
            TeamAssignmentService::new(vec![team(0, Some(1)), team(1, Some(1))], 5, true);
        teams.assign_participant_to_team(ParticipantId(1), &mut events);
        teams.assign_participant_to_team(ParticipantId(2), &mut events);

        assert_eq!(
            teams.request_team_change(ParticipantId(1), TeamId(9), &mut events),
            Err(RejectionReason::UnknownTeam)
        );
        assert_eq!(
            teams.request_team_change(ParticipantId(1), TeamId(1), &mut events),
            Err(RejectionReason::TeamFull)
        );
        assert_eq!(
            teams.request_team_change(ParticipantId(7), TeamId(1), &mut events),
            Err(RejectionReason::UnknownTeam)
        );
        assert_eq!(teams.team_of(ParticipantId(1)), Some(TeamId(0)));
    }

    #[test]
    fn test_change_to_own_team_is_noop() {
        let mut events = EventBus::new();
        let mut teams = service(true);
        teams.assign_participant_to_team(ParticipantId(1), &mut events);
        let revision = teams.revision();

        assert_eq!(
            teams.request_team_change(ParticipantId(1), TeamId(0), &mut events),
            Ok(TeamId(0))
        );
        assert_eq!(teams.revision(), revision);
    }

    #[test]
    fn test_remove_participant() {
        let mut events = EventBus::new();
        let mut teams = service(true);
        teams.assign_participant_to_team(ParticipantId(1), &mut events);
        teams.assign_participant_to_team(ParticipantId(2), &mut events);

        assert_eq!(teams.remove_participant(ParticipantId(1)), Some(TeamId(0)));
        assert_eq!(teams.remove_participant(ParticipantId(1)), None);
        assert_eq!(teams.team_size(TeamId(0)), 0);
        assert_eq!(teams.smallest_team(), Some(TeamId(0)));
    }

    #[test]
    fn test_allies_and_enemies() {
        let mut events = EventBus::new();
        let mut teams = service(true);
        for id in 1..=3 {
            teams.assign_participant_to_team(ParticipantId(id), &mut events);
        }

        assert!(teams.are_allies(ParticipantId(1), ParticipantId(3)));
        assert!(teams.are_enemies(ParticipantId(1), ParticipantId(2)));
        assert!(!teams.are_allies(ParticipantId(1), ParticipantId(99)));
        assert!(!teams.are_enemies(ParticipantId(1), ParticipantId(99)));
    }

    #[test]
    fn test_roster_and_revision() {
        let mut events = EventBus::new();
        let mut teams = service(true);
        assert_eq!(teams.revision(), 0);
        teams.assign_participant_to_team(ParticipantId(4), &mut events);
        teams.assign_participant_to_team(ParticipantId(5), &mut events);

        let roster = teams.roster();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].members, vec![ParticipantId(4)]);
        assert_eq!(roster[1].members, vec![ParticipantId(5)]);
        assert_eq!(teams.revision(), 2);
    }

    #[test]
    fn test_spawn_points_wrap() {
        let teams = service(true);
        assert_eq!(teams.spawn_point(TeamId(1), 0), Some(Vec2::new(1.0, 0.0)));
        assert_eq!(teams.spawn_point(TeamId(1), 3), Some(Vec2::new(1.0, 10.0)));
        assert_eq!(teams.spawn_point(TeamId(5), 0), None);
    }
}
