//! Outbound seam between the match core and whatever carries packets
//!
//! The core only publishes [`MatchEvent`]s. [`attach`] subscribes a transport
//! to the bus and turns every event with a wire form into a packet addressed
//! either to one participant or to everybody.

use crate::events::{EventBus, MatchEvent, SubscriptionId};
use log::error;
use shared::{Packet, ParticipantId};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub trait Transport {
    fn send_to_participant(&mut self, participant: ParticipantId, packet: Packet);
    fn broadcast(&mut self, packet: Packet);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    To(ParticipantId, Packet),
    Broadcast(Packet),
}

/// Wire form of an event, if observers need to hear about it
pub fn outbound_for(event: &MatchEvent) -> Option<Outbound> {
    let outbound = match event {
        MatchEvent::PhaseChanged { to, .. } => {
            Outbound::Broadcast(Packet::PhaseChanged { phase: *to })
        }
        MatchEvent::SelectionPhaseStarted { duration, revision } => {
            Outbound::Broadcast(Packet::SelectionPhaseStarted {
                duration: *duration,
                revision: *revision,
            })
        }
        MatchEvent::HeroSelected {
            participant,
            hero,
            revision,
        } => Outbound::Broadcast(Packet::HeroSelected {
            participant_id: *participant,
            hero_id: hero.clone(),
            revision: *revision,
        }),
        MatchEvent::ReadyChanged {
            participant,
            is_ready,
            revision,
        } => Outbound::Broadcast(Packet::ReadyChanged {
            participant_id: *participant,
            is_ready: *is_ready,
            revision: *revision,
        }),
        MatchEvent::SelectionCountdown { seconds, revision } => {
            Outbound::Broadcast(Packet::SelectionCountdown {
                seconds: *seconds,
                revision: *revision,
            })
        }
        MatchEvent::SelectionUpdated { snapshot } => Outbound::Broadcast(Packet::SelectionState {
            snapshot: snapshot.clone(),
        }),
        MatchEvent::SelectionPhaseComplete { revision, .. } => {
            Outbound::Broadcast(Packet::SelectionPhaseComplete {
                revision: *revision,
            })
        }
        MatchEvent::Rejected {
            participant,
            reason,
        } => Outbound::To(*participant, Packet::SelectionRejected { reason: *reason }),
        MatchEvent::TeamChanged {
            participant,
            to,
            revision,
            ..
        } => Outbound::Broadcast(Packet::TeamChanged {
            participant_id: *participant,
            team_id: *to,
            revision: *revision,
        }),
        MatchEvent::AbilityUsed {
            participant,
            ability,
        } => Outbound::Broadcast(Packet::AbilityUsed {
            participant_id: *participant,
            ability_id: ability.clone(),
        }),
        MatchEvent::CooldownComplete {
            participant,
            ability,
        } => Outbound::To(
            *participant,
            Packet::CooldownComplete {
                participant_id: *participant,
                ability_id: ability.clone(),
            },
        ),
        MatchEvent::AbilityLeveledUp {
            participant,
            ability,
            level,
        } => Outbound::To(
            *participant,
            Packet::AbilityLeveledUp {
                participant_id: *participant,
                ability_id: ability.clone(),
                level: *level,
            },
        ),
        MatchEvent::HeroLeveledUp { participant, level } => {
            Outbound::Broadcast(Packet::HeroLeveledUp {
                participant_id: *participant,
                level: *level,
            })
        }
        MatchEvent::HeroDied { participant } => Outbound::Broadcast(Packet::HeroDied {
            participant_id: *participant,
        }),
        // Covered by the periodic roster and hero snapshots
        MatchEvent::ParticipantJoined { .. }
        | MatchEvent::ParticipantLeft { .. }
        | MatchEvent::HeroSpawned { .. } => return None,
    };
    Some(outbound)
}

pub fn dispatch(transport: &mut dyn Transport, outbound: Outbound) {
    match outbound {
        Outbound::To(participant, packet) => transport.send_to_participant(participant, packet),
        Outbound::Broadcast(packet) => transport.broadcast(packet),
    }
}

/// Forwards every event with a wire form to `transport`
pub fn attach<T>(events: &mut EventBus, mut transport: T) -> SubscriptionId
where
    T: Transport + Send + 'static,
{
    events.subscribe(move |event| {
        if let Some(outbound) = outbound_for(event) {
            dispatch(&mut transport, outbound);
        }
    })
}

/// Messages sent from the match loop to the socket sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    SendToParticipant {
        packet: Packet,
        participant: ParticipantId,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<ParticipantId>,
    },
}

/// Transport backed by the sender task's queue
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<GameMessage>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { tx }
    }
}

impl Transport for ChannelTransport {
    fn send_to_participant(&mut self, participant: ParticipantId, packet: Packet) {
        if let Err(e) = self.tx.send(GameMessage::SendToParticipant {
            packet,
            participant,
        }) {
            error!("Failed to queue packet for {}: {}", participant, e);
        }
    }

    fn broadcast(&mut self, packet: Packet) {
        if let Err(e) = self.tx.send(GameMessage::BroadcastPacket {
            packet,
            exclude: None,
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }
}

/// Keeps every outbound packet in memory, shared between clones
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Outbound>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything recorded so far
    pub fn take(&self) -> Vec<Outbound> {
        match self.sent.lock() {
            Ok(mut sent) => std::mem::take(&mut *sent),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn push(&self, outbound: Outbound) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(outbound),
            Err(poisoned) => poisoned.into_inner().push(outbound),
        }
    }
}

impl Transport for RecordingTransport {
    fn send_to_participant(&mut self, participant: ParticipantId, packet: Packet) {
        self.push(Outbound::To(participant, packet));
    }

    fn broadcast(&mut self, packet: Packet) {
        self.push(Outbound::Broadcast(packet));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{HeroId, RejectionReason, SelectionSnapshot, SelectionState, TeamId};

    #[test]
    fn test_rejection_goes_to_offender_only() {
        let event = MatchEvent::Rejected {
            participant: ParticipantId(4),
            reason: RejectionReason::NoHeroSelected,
        };
        assert_eq!(
            outbound_for(&event),
            Some(Outbound::To(
                ParticipantId(4),
                Packet::SelectionRejected {
                    reason: RejectionReason::NoHeroSelected
                }
            ))
        );
    }

    #[test]
    fn test_selection_events_are_broadcast_with_revision() {
        let event = MatchEvent::HeroSelected {
            participant: ParticipantId(1),
            hero: HeroId::from("mage"),
            revision: 9,
        };
        assert_eq!(
            outbound_for(&event),
            Some(Outbound::Broadcast(Packet::HeroSelected {
                participant_id: ParticipantId(1),
                hero_id: HeroId::from("mage"),
                revision: 9,
            }))
        );
    }

    #[test]
    fn test_complete_drops_picks_from_wire() {
        let event = MatchEvent::SelectionPhaseComplete {
            picks: vec![(ParticipantId(1), HeroId::from("mage"))],
            revision: 12,
        };
        assert_eq!(
            outbound_for(&event),
            Some(Outbound::Broadcast(Packet::SelectionPhaseComplete {
                revision: 12
            }))
        );
    }

    #[test]
    fn test_pick_snapshot_is_broadcast_whole() {
        let snapshot = SelectionSnapshot {
            revision: 4,
            state: SelectionState::InProgress,
            time_remaining: 42.0,
            picks: vec![(ParticipantId(1), HeroId::from("mage"))],
            ready: vec![(ParticipantId(1), false), (ParticipantId(2), false)],
        };
        let event = MatchEvent::SelectionUpdated {
            snapshot: snapshot.clone(),
        };
        assert_eq!(
            outbound_for(&event),
            Some(Outbound::Broadcast(Packet::SelectionState { snapshot }))
        );
    }

    #[test]
    fn test_internal_events_not_sent() {
        let event = MatchEvent::HeroSpawned {
            participant: ParticipantId(1),
            hero: HeroId::from("mage"),
            team: TeamId(0),
        };
        assert_eq!(outbound_for(&event), None);
    }

    #[test]
    fn test_attach_forwards_to_transport() {
        let mut events = EventBus::new();
        let transport = RecordingTransport::new();
        let id = attach(&mut events, transport.clone());

        events.publish(MatchEvent::SelectionCountdown {
            seconds: 3.0,
            revision: 4,
        });
        events.publish(MatchEvent::ParticipantLeft {
            participant: ParticipantId(2),
        });
        assert_eq!(
            transport.take(),
            vec![Outbound::Broadcast(Packet::SelectionCountdown {
                seconds: 3.0,
                revision: 4,
            })]
        );

        assert!(events.unsubscribe(id));
        events.publish(MatchEvent::SelectionCountdown {
            seconds: 2.0,
            revision: 5,
        });
        assert!(transport.take().is_empty());
    }

    #[test]
    fn test_channel_transport_queues_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = ChannelTransport::new(tx);
        transport.send_to_participant(ParticipantId(3), Packet::Disconnect);
        transport.broadcast(Packet::SelectionPhaseComplete { revision: 1 });

        match tokio_test::block_on(rx.recv()) {
            Some(GameMessage::SendToParticipant { participant, .. }) => {
                assert_eq!(participant, ParticipantId(3))
            }
            other => panic!("Expected participant message, got {:?}", other),
        }
        assert!(matches!(
            tokio_test::block_on(rx.recv()),
            Some(GameMessage::BroadcastPacket { exclude: None, .. })
        ));
    }
}
