//! Authoritative change notifications and their observer registry.
//!
//! Every authoritative mutator publishes a [`MatchEvent`] synchronously right
//! after it changes state. Subscribers are called in registration order and
//! stay registered until they are explicitly unsubscribed.

use shared::{
    AbilityId, HeroId, MatchPhase, ParticipantId, RejectionReason, SelectionSnapshot, TeamId,
};

#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    PhaseChanged {
        from: MatchPhase,
        to: MatchPhase,
    },
    ParticipantJoined {
        participant: ParticipantId,
        display_name: String,
    },
    ParticipantLeft {
        participant: ParticipantId,
    },
    SelectionPhaseStarted {
        duration: f32,
        revision: u64,
    },
    HeroSelected {
        participant: ParticipantId,
        hero: HeroId,
        revision: u64,
    },
    ReadyChanged {
        participant: ParticipantId,
        is_ready: bool,
        revision: u64,
    },
    SelectionCountdown {
        seconds: f32,
        revision: u64,
    },
    /// Full selection state after a pick changed it
    SelectionUpdated {
        snapshot: SelectionSnapshot,
    },
    SelectionPhaseComplete {
        picks: Vec<(ParticipantId, HeroId)>,
        revision: u64,
    },
    /// Addressed to `participant` only
    Rejected {
        participant: ParticipantId,
        reason: RejectionReason,
    },
    TeamChanged {
        participant: ParticipantId,
        from: Option<TeamId>,
        to: TeamId,
        revision: u64,
    },
    HeroSpawned {
        participant: ParticipantId,
        hero: HeroId,
        team: TeamId,
    },
    AbilityUsed {
        participant: ParticipantId,
        ability: AbilityId,
    },
    CooldownComplete {
        participant: ParticipantId,
        ability: AbilityId,
    },
    AbilityLeveledUp {
        participant: ParticipantId,
        ability: AbilityId,
        level: u32,
    },
    HeroLeveledUp {
        participant: ParticipantId,
        level: u32,
    },
    HeroDied {
        participant: ParticipantId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&MatchEvent) + Send>;

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Handler)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&MatchEvent) + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push((id, Box::new(handler)));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn publish(&mut self, event: MatchEvent) {
        for (_, handler) in self.subscribers.iter_mut() {
            handler(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Subscribes a collector that keeps every published event
#[cfg(test)]
pub(crate) fn record_events(
    bus: &mut EventBus,
) -> std::sync::Arc<std::sync::Mutex<Vec<MatchEvent>>> {
    let log = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&log);
    bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    log
}
