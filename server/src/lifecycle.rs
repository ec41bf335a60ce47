//! Match phases and the authoritative participant registry
//!
//! `Lobby → HeroSelection → Gameplay`, and back to `Lobby` when the match
//! ends. The controller is the only owner of match state: team and selection
//! services see participant ids, never the registry itself. Every command
//! reports failure as a `false` return, plus a rejection notice for the
//! offending participant where one applies.

use crate::ability::CastTarget;
use crate::config::MatchConfig;
use crate::effects::ArenaEffects;
use crate::events::{EventBus, MatchEvent, SubscriptionId};
use crate::hero::HeroInstance;
use crate::selection::HeroSelectionCoordinator;
use crate::targeting::ObstacleMap;
use crate::teams::TeamAssignmentService;
use log::{debug, info, warn};
use shared::content::{AbilityType, ConfigError, GameContent};
use shared::{
    HeroId, HeroSnapshot, MatchPhase, ParticipantId, RejectionReason, SelectionSnapshot, TeamId,
    TeamRosterEntry,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A connected session, distinct from the hero it may control
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub team: Option<TeamId>,
    pub ready: bool,
    pub selected_hero: Option<HeroId>,
}

#[derive(Debug)]
pub struct MatchLifecycleController {
    config: MatchConfig,
    content: Arc<GameContent>,
    phase: MatchPhase,
    participants: BTreeMap<ParticipantId, Participant>,
    teams: TeamAssignmentService,
    selection: HeroSelectionCoordinator,
    heroes: BTreeMap<ParticipantId, HeroInstance>,
    world: ObstacleMap,
    events: EventBus,
    tick: u32,
}

impl MatchLifecycleController {
    pub fn new(config: MatchConfig, content: Arc<GameContent>) -> Result<Self, ConfigError> {
        if !config.selection_duration.is_finite() || config.selection_duration <= 0.0 {
            return Err(ConfigError::InvalidSetting(format!(
                "selection duration must be positive, got {}",
                config.selection_duration
            )));
        }
        if config.max_team_size == 0 {
            return Err(ConfigError::InvalidSetting(
                "max team size must be at least 1".to_string(),
            ));
        }
        if config.ready_grace < 0.0 {
            return Err(ConfigError::InvalidSetting(
                "ready grace must not be negative".to_string(),
            ));
        }

        let teams = TeamAssignmentService::new(
            content.teams().to_vec(),
            config.max_team_size,
            config.auto_balance_teams,
        );
        let world = ObstacleMap::from_config(content.obstacles());
        let hero_pool = content.hero_ids();
        let selection = match config.rng_seed {
            Some(seed) => {
                HeroSelectionCoordinator::with_seed(hero_pool, config.selection_rules(), seed)
            }
            None => HeroSelectionCoordinator::new(hero_pool, config.selection_rules()),
        };

        Ok(Self {
            config,
            content,
            phase: MatchPhase::Lobby,
            participants: BTreeMap::new(),
            teams,
            selection,
            heroes: BTreeMap::new(),
            world,
            events: EventBus::new(),
            tick: 0,
        })
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&MatchEvent) + Send + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    fn set_phase(&mut self, to: MatchPhase) {
        if self.phase == to {
            return;
        }
        let from = std::mem::replace(&mut self.phase, to);
        info!("Match phase {:?} -> {:?}", from, to);
        self.events.publish(MatchEvent::PhaseChanged { from, to });
    }

    fn reject(&mut self, participant: ParticipantId, reason: RejectionReason) -> bool {
        debug!("Rejected request from {}: {}", participant, reason);
        self.events.publish(MatchEvent::Rejected {
            participant,
            reason,
        });
        false
    }

    /// Registers a participant and gives them a team
    ///
    /// Returns false if the id is already registered. A participant who
    /// joins during gameplay watches without a hero until the next match.
    pub fn connect_participant(&mut self, id: ParticipantId, display_name: String) -> bool {
        if self.participants.contains_key(&id) {
            return false;
        }

        self.participants.insert(
            id,
            Participant {
                id,
                display_name: display_name.clone(),
                team: None,
                ready: false,
                selected_hero: None,
            },
        );
        info!("{} ({}) joined during {:?}", id, display_name, self.phase);
        self.events.publish(MatchEvent::ParticipantJoined {
            participant: id,
            display_name,
        });

        let team = self.teams.assign_participant_to_team(id, &mut self.events);
        if let Some(participant) = self.participants.get_mut(&id) {
            participant.team = team;
        }

        if self.phase == MatchPhase::HeroSelection {
            self.selection.add_participant(id);
        }
        true
    }

    pub fn disconnect_participant(&mut self, id: ParticipantId) -> bool {
        if self.participants.remove(&id).is_none() {
            return false;
        }

        self.teams.remove_participant(id);
        self.selection.remove_participant(id, &mut self.events);
        self.heroes.remove(&id);
        info!("{} left", id);
        self.events
            .publish(MatchEvent::ParticipantLeft { participant: id });
        true
    }

    /// Opens hero selection for everyone currently connected
    pub fn start_hero_selection(&mut self) -> bool {
        if self.phase != MatchPhase::Lobby {
            warn!("Cannot start hero selection during {:?}", self.phase);
            return false;
        }
        if self.participants.is_empty() {
            warn!("Cannot start hero selection without participants");
            return false;
        }

        for participant in self.participants.values_mut() {
            participant.ready = false;
            participant.selected_hero = None;
        }

        self.selection.reset();
        self.set_phase(MatchPhase::HeroSelection);
        let participants: Vec<ParticipantId> = self.participants.keys().copied().collect();
        self.selection.start_phase(
            self.config.selection_duration,
            participants,
            &mut self.events,
        );
        true
    }

    pub fn submit_hero_selection(&mut self, id: ParticipantId, hero: HeroId) -> bool {
        if !self.participants.contains_key(&id) {
            return false;
        }
        if self.phase != MatchPhase::HeroSelection {
            return self.reject(id, RejectionReason::PhaseClosed);
        }

        match self.selection.submit_selection(id, hero, &mut self.events) {
            Ok(assigned) => {
                if let Some(participant) = self.participants.get_mut(&id) {
                    participant.selected_hero = Some(assigned);
                }
                true
            }
            Err(reason) => self.reject(id, reason),
        }
    }

    pub fn submit_ready(&mut self, id: ParticipantId, is_ready: bool) -> bool {
        if !self.participants.contains_key(&id) {
            return false;
        }
        if self.phase != MatchPhase::HeroSelection {
            return self.reject(id, RejectionReason::PhaseClosed);
        }

        match self.selection.submit_ready(id, is_ready, &mut self.events) {
            Ok(()) => {
                if let Some(participant) = self.participants.get_mut(&id) {
                    participant.ready = is_ready;
                }
                true
            }
            Err(reason) => self.reject(id, reason),
        }
    }

    /// Team switches are allowed until gameplay starts
    pub fn request_team_change(&mut self, id: ParticipantId, team: TeamId) -> bool {
        if !self.participants.contains_key(&id) {
            return false;
        }
        if self.phase == MatchPhase::Gameplay {
            return self.reject(id, RejectionReason::PhaseClosed);
        }

        match self.teams.request_team_change(id, team, &mut self.events) {
            Ok(team) => {
                if let Some(participant) = self.participants.get_mut(&id) {
                    participant.team = Some(team);
                }
                true
            }
            Err(reason) => self.reject(id, reason),
        }
    }

    /// Advances selection timers or the hero simulation by `delta_time`
    pub fn tick(&mut self, delta_time: f32) {
        self.tick = self.tick.wrapping_add(1);

        match self.phase {
            MatchPhase::Lobby => {}
            MatchPhase::HeroSelection => {
                if let Some(mapping) = self.selection.update(delta_time, &mut self.events) {
                    self.on_hero_selection_complete(mapping);
                }
            }
            MatchPhase::Gameplay => {
                for hero in self.heroes.values_mut() {
                    hero.update(delta_time, &mut self.events);
                }
                let dead: Vec<ParticipantId> = self
                    .heroes
                    .values()
                    .filter(|hero| !hero.is_alive())
                    .map(HeroInstance::participant)
                    .collect();
                self.bury(dead);
            }
        }
    }

    /// Destroys the heroes of the fallen, announcing each death once
    fn bury<I>(&mut self, fallen: I)
    where
        I: IntoIterator<Item = ParticipantId>,
    {
        for participant in fallen {
            if self.heroes.remove(&participant).is_some() {
                info!("{} died", participant);
                self.events.publish(MatchEvent::HeroDied { participant });
            }
        }
    }

    /// Spawns one hero per resolved pick and starts gameplay
    pub fn on_hero_selection_complete(&mut self, mapping: BTreeMap<ParticipantId, HeroId>) -> bool {
        if self.phase != MatchPhase::HeroSelection {
            return false;
        }

        self.heroes.clear();
        let mut spawned_per_team: BTreeMap<TeamId, usize> = BTreeMap::new();

        for (id, hero_id) in mapping {
            if !self.participants.contains_key(&id) {
                continue;
            }
            let Some(definition) = self.content.hero(&hero_id).cloned() else {
                warn!("{} picked unknown hero {}, not spawning", id, hero_id);
                continue;
            };
            let Some(team) = self.teams.assign_participant_to_team(id, &mut self.events) else {
                warn!("{} has no team, not spawning", id);
                continue;
            };

            let slot = spawned_per_team.entry(team).or_insert(0);
            let position = self.teams.spawn_point(team, *slot).unwrap_or_default();
            *slot += 1;

            let abilities = self.content.abilities_for(&definition);
            self.heroes.insert(
                id,
                HeroInstance::new(id, definition, abilities, team, position),
            );

            if let Some(participant) = self.participants.get_mut(&id) {
                participant.team = Some(team);
                participant.selected_hero = Some(hero_id.clone());
                participant.ready = true;
            }
            info!("Spawned {} for {} on {}", hero_id, id, team);
            self.events.publish(MatchEvent::HeroSpawned {
                participant: id,
                hero: hero_id,
                team,
            });
        }

        self.set_phase(MatchPhase::Gameplay);
        true
    }

    /// Casts the ability in `slot` of the participant's hero
    ///
    /// Invalid targets are refused before any mana is spent.
    pub fn use_ability(&mut self, id: ParticipantId, slot: usize, target: CastTarget) -> bool {
        if self.phase != MatchPhase::Gameplay {
            return false;
        }
        let Some(mut caster) = self.heroes.remove(&id) else {
            return false;
        };

        let mut effects = ArenaEffects::new(&mut self.heroes, &self.world);
        let accepted = caster
            .abilities()
            .get(slot)
            .filter(|ability| ability.definition().ability_type != AbilityType::Passive)
            .is_some_and(|ability| effects.accepts(caster.vitals(), ability, &target));

        let (used, fallen) = if accepted {
            let used = caster.use_ability(slot, target, &mut effects, &mut self.events);
            (used, effects.into_fallen())
        } else {
            (false, Vec::new())
        };

        self.heroes.insert(id, caster);
        self.bury(fallen);
        used
    }

    pub fn level_up_hero(&mut self, id: ParticipantId) -> bool {
        match self.heroes.get_mut(&id) {
            Some(hero) => hero.level_up(&mut self.events),
            None => false,
        }
    }

    /// Destroys every hero and returns to the lobby
    pub fn end_match(&mut self) {
        self.heroes.clear();
        self.selection.reset();
        for participant in self.participants.values_mut() {
            participant.ready = false;
            participant.selected_hero = None;
        }
        self.set_phase(MatchPhase::Lobby);
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn hero(&self, id: ParticipantId) -> Option<&HeroInstance> {
        self.heroes.get(&id)
    }

    pub fn teams(&self) -> &TeamAssignmentService {
        &self.teams
    }

    pub fn selection(&self) -> &HeroSelectionCoordinator {
        &self.selection
    }

    pub fn content(&self) -> &GameContent {
        &self.content
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    pub fn selection_snapshot(&self) -> SelectionSnapshot {
        self.selection.snapshot()
    }

    /// Roster revision and membership for a full refresh
    pub fn team_roster(&self) -> (u64, Vec<TeamRosterEntry>) {
        (self.teams.revision(), self.teams.roster())
    }

    pub fn hero_snapshots(&self) -> Vec<HeroSnapshot> {
        self.heroes.values().map(HeroInstance::snapshot).collect()
    }
}
