//! Timed hero pick and ready negotiation
//!
//! `Inactive → InProgress → (AllReadyCountdown) → Complete`. The main phase
//! timer keeps running during the all-ready countdown, so the short grace
//! period can end the phase early but never extend it.

use crate::events::{EventBus, MatchEvent};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared::{HeroId, ParticipantId, RejectionReason, SelectionSnapshot, SelectionState};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRules {
    pub unique_picks: bool,
    pub randomize_if_unselected: bool,
    /// Upper bound of the all-ready countdown
    pub ready_grace: f32,
}

impl Default for SelectionRules {
    fn default() -> Self {
        Self {
            unique_picks: true,
            randomize_if_unselected: true,
            ready_grace: shared::READY_GRACE_SECONDS,
        }
    }
}

#[derive(Debug)]
pub struct HeroSelectionCoordinator {
    heroes: Vec<HeroId>,
    rules: SelectionRules,
    rng: StdRng,
    state: SelectionState,
    participants: BTreeSet<ParticipantId>,
    picks: BTreeMap<ParticipantId, HeroId>,
    ready: BTreeMap<ParticipantId, bool>,
    time_remaining: f32,
    grace_remaining: f32,
    revision: u64,
}

impl HeroSelectionCoordinator {
    pub fn new(heroes: Vec<HeroId>, rules: SelectionRules) -> Self {
        Self::with_rng(heroes, rules, StdRng::from_entropy())
    }

    /// Deterministic coordinator for reproducible substitutions
    pub fn with_seed(heroes: Vec<HeroId>, rules: SelectionRules, seed: u64) -> Self {
        Self::with_rng(heroes, rules, StdRng::seed_from_u64(seed))
    }

    fn with_rng(heroes: Vec<HeroId>, rules: SelectionRules, rng: StdRng) -> Self {
        Self {
            heroes,
            rules,
            rng,
            state: SelectionState::Inactive,
            participants: BTreeSet::new(),
            picks: BTreeMap::new(),
            ready: BTreeMap::new(),
            time_remaining: 0.0,
            grace_remaining: 0.0,
            revision: 0,
        }
    }

    pub fn start_phase<I>(&mut self, duration: f32, participants: I, events: &mut EventBus)
    where
        I: IntoIterator<Item = ParticipantId>,
    {
        self.participants = participants.into_iter().collect();
        self.picks.clear();
        self.ready = self.participants.iter().map(|p| (*p, false)).collect();
        self.time_remaining = duration.max(0.0);
        self.grace_remaining = 0.0;
        self.state = SelectionState::InProgress;
        self.revision += 1;

        info!(
            "Hero selection started for {} participants ({:.0}s)",
            self.participants.len(),
            duration
        );
        events.publish(MatchEvent::SelectionPhaseStarted {
            duration,
            revision: self.revision,
        });
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            SelectionState::InProgress | SelectionState::AllReadyCountdown
        )
    }

    /// Records a pick and returns the hero actually assigned
    ///
    /// With unique picks a hero claimed by someone else is silently replaced
    /// by a random unclaimed one.
    pub fn submit_selection(
        &mut self,
        participant: ParticipantId,
        hero: HeroId,
        events: &mut EventBus,
    ) -> Result<HeroId, RejectionReason> {
        if !self.is_open() || !self.participants.contains(&participant) {
            return Err(RejectionReason::PhaseClosed);
        }
        if !self.heroes.contains(&hero) {
            return Err(RejectionReason::InvalidHero);
        }

        let hero = if self.rules.unique_picks && self.is_claimed_by_other(&hero, participant) {
            let substitute = self
                .random_hero(Some(participant))
                .ok_or(RejectionReason::InvalidHero)?;
            debug!("{} is taken, {} gets {} instead", hero, participant, substitute);
            substitute
        } else {
            hero
        };

        self.record_pick(participant, hero.clone(), events);
        events.publish(MatchEvent::SelectionUpdated {
            snapshot: self.snapshot(),
        });
        Ok(hero)
    }

    pub fn submit_ready(
        &mut self,
        participant: ParticipantId,
        is_ready: bool,
        events: &mut EventBus,
    ) -> Result<(), RejectionReason> {
        if !self.is_open() || !self.participants.contains(&participant) {
            return Err(RejectionReason::PhaseClosed);
        }
        if is_ready && !self.picks.contains_key(&participant) {
            return Err(RejectionReason::NoHeroSelected);
        }

        self.record_ready(participant, is_ready, events);

        if is_ready {
            self.check_all_ready(events);
        } else if self.state == SelectionState::AllReadyCountdown {
            debug!("{} is no longer ready, countdown cancelled", participant);
            self.state = SelectionState::InProgress;
            self.revision += 1;
        }
        Ok(())
    }

    /// Advances the timers and returns the final mapping on the tick the
    /// phase completes
    pub fn update(
        &mut self,
        delta_time: f32,
        events: &mut EventBus,
    ) -> Option<BTreeMap<ParticipantId, HeroId>> {
        if !self.is_open() {
            return None;
        }

        self.time_remaining = (self.time_remaining - delta_time).max(0.0);

        match self.state {
            SelectionState::InProgress if self.time_remaining <= 0.0 => {
                self.resolve_unready(events);
                Some(self.complete(events))
            }
            SelectionState::AllReadyCountdown => {
                self.grace_remaining = (self.grace_remaining - delta_time).max(0.0);
                if self.grace_remaining <= 0.0 || self.time_remaining <= 0.0 {
                    Some(self.complete(events))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// A participant connected while the phase is open
    pub fn add_participant(&mut self, participant: ParticipantId) {
        if !self.is_open() || !self.participants.insert(participant) {
            return;
        }
        self.ready.insert(participant, false);
        if self.state == SelectionState::AllReadyCountdown {
            self.state = SelectionState::InProgress;
        }
        self.revision += 1;
    }

    /// A participant disconnected; their pick is released
    pub fn remove_participant(&mut self, participant: ParticipantId, events: &mut EventBus) {
        if !self.participants.remove(&participant) {
            return;
        }
        self.picks.remove(&participant);
        self.ready.remove(&participant);
        self.revision += 1;

        if self.state == SelectionState::InProgress {
            self.check_all_ready(events);
        }
    }

    /// Returns a completed coordinator to `Inactive`
    pub fn reset(&mut self) {
        self.state = SelectionState::Inactive;
        self.participants.clear();
        self.picks.clear();
        self.ready.clear();
        self.time_remaining = 0.0;
        self.grace_remaining = 0.0;
        self.revision += 1;
    }

    fn record_pick(&mut self, participant: ParticipantId, hero: HeroId, events: &mut EventBus) {
        self.picks.insert(participant, hero.clone());
        self.revision += 1;
        events.publish(MatchEvent::HeroSelected {
            participant,
            hero,
            revision: self.revision,
        });
    }

    fn record_ready(&mut self, participant: ParticipantId, is_ready: bool, events: &mut EventBus) {
        self.ready.insert(participant, is_ready);
        self.revision += 1;
        events.publish(MatchEvent::ReadyChanged {
            participant,
            is_ready,
            revision: self.revision,
        });
    }

    fn all_ready(&self) -> bool {
        !self.participants.is_empty()
            && self.participants.iter().all(|p| {
                self.picks.contains_key(p) && self.ready.get(p).copied().unwrap_or(false)
            })
    }

    fn check_all_ready(&mut self, events: &mut EventBus) {
        if self.state != SelectionState::InProgress || !self.all_ready() {
            return;
        }

        self.grace_remaining = self.rules.ready_grace.min(self.time_remaining);
        self.state = SelectionState::AllReadyCountdown;
        self.revision += 1;
        info!("Everyone is ready, starting in {:.1}s", self.grace_remaining);
        events.publish(MatchEvent::SelectionCountdown {
            seconds: self.grace_remaining,
            revision: self.revision,
        });
    }

    /// Auto-picks and readies everyone who did not finish in time
    fn resolve_unready(&mut self, events: &mut EventBus) {
        let pending: Vec<ParticipantId> = self.participants.iter().copied().collect();
        for participant in pending {
            if !self.picks.contains_key(&participant) {
                if !self.rules.randomize_if_unselected {
                    continue;
                }
                let Some(hero) = self.random_hero(None) else {
                    continue;
                };
                info!("{} ran out of time and was given {}", participant, hero);
                self.record_pick(participant, hero, events);
            }
            if !self.ready.get(&participant).copied().unwrap_or(false) {
                self.record_ready(participant, true, events);
            }
        }
    }

    fn complete(&mut self, events: &mut EventBus) -> BTreeMap<ParticipantId, HeroId> {
        self.state = SelectionState::Complete;
        self.grace_remaining = 0.0;
        self.revision += 1;

        let mapping = self.picks.clone();
        info!("Hero selection complete with {} picks", mapping.len());
        events.publish(MatchEvent::SelectionPhaseComplete {
            picks: mapping.iter().map(|(p, h)| (*p, h.clone())).collect(),
            revision: self.revision,
        });
        mapping
    }

    fn is_claimed_by_other(&self, hero: &HeroId, participant: ParticipantId) -> bool {
        self.picks
            .iter()
            .any(|(owner, picked)| *owner != participant && picked == hero)
    }

    /// Shuffles the pool and takes the first hero nobody else holds,
    /// falling back to the first shuffled hero when all are taken
    fn random_hero(&mut self, on_behalf_of: Option<ParticipantId>) -> Option<HeroId> {
        let mut candidates = self.heroes.clone();
        candidates.shuffle(&mut self.rng);

        if self.rules.unique_picks {
            let unclaimed = candidates.iter().find(|hero| {
                !self
                    .picks
                    .iter()
                    .any(|(owner, picked)| Some(*owner) != on_behalf_of && picked == *hero)
            });
            if let Some(hero) = unclaimed {
                return Some(hero.clone());
            }
        }
        candidates.into_iter().next()
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            revision: self.revision,
            state: self.state,
            time_remaining: self.time_remaining,
            picks: self.picks.iter().map(|(p, h)| (*p, h.clone())).collect(),
            ready: self.ready.iter().map(|(p, r)| (*p, *r)).collect(),
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn time_remaining(&self) -> f32 {
        self.time_remaining
    }

    pub fn grace_remaining(&self) -> f32 {
        self.grace_remaining
    }

    pub fn pick_of(&self, participant: ParticipantId) -> Option<&HeroId> {
        self.picks.get(&participant)
    }

    pub fn is_ready(&self, participant: ParticipantId) -> bool {
        self.ready.get(&participant).copied().unwrap_or(false)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn rules(&self) -> &SelectionRules {
        &self.rules
    }
}
