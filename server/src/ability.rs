//! Per-ability cooldown, level and cost state machine
//!
//! An ability is `Ready` when its cooldown is zero and `OnCooldown` otherwise.
//! `Active` is tracked separately: a cast with a positive duration stays
//! active until the owning hero's effect timer calls [`AbilityRuntime::deactivate`],
//! so an ability can be both active and on cooldown.
//!
//! All validation failures are plain `false` returns.

use crate::events::{EventBus, MatchEvent};
use crate::hero::Combatant;
use crate::targeting::{self, ObstructionQuery, TargetInfo};
use log::debug;
use shared::content::{AbilityDefinition, AbilityType};
use shared::{AbilityId, ParticipantId, Vec2, MAX_HERO_LEVEL};
use std::sync::Arc;

/// Values of an ability at its current level
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelValues {
    pub damage: f32,
    pub healing: f32,
    pub duration: f32,
    pub mana_cost: f32,
    pub cooldown: f32,
}

impl LevelValues {
    pub fn for_level(definition: &AbilityDefinition, level: u32) -> Self {
        Self {
            damage: definition.damage.value(level),
            healing: definition.healing.value(level),
            duration: definition.duration.value(level),
            mana_cost: definition.mana_cost.value(level),
            cooldown: definition.cooldown(level),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    Ready,
    OnCooldown,
}

/// Where a cast is aimed
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CastTarget {
    pub position: Option<Vec2>,
    pub target: Option<ParticipantId>,
}

impl CastTarget {
    pub fn participant(target: ParticipantId) -> Self {
        Self {
            position: None,
            target: Some(target),
        }
    }

    pub fn position(position: Vec2) -> Self {
        Self {
            position: Some(position),
            target: None,
        }
    }
}

/// Everything an effect needs to resolve one cast
///
/// `ability` is the runtime being cast, already paid for and on cooldown.
pub struct CastContext<'a> {
    pub caster: &'a mut dyn Combatant,
    pub ability: &'a AbilityRuntime,
    pub target: CastTarget,
}

/// Ability-specific behavior, applied after mana and cooldown are settled
pub trait AbilityEffect {
    /// Returns true if the effect actually happened
    fn apply(&mut self, ctx: CastContext<'_>) -> bool;
}

#[derive(Debug, Clone)]
pub struct AbilityRuntime {
    definition: Arc<AbilityDefinition>,
    owner: ParticipantId,
    level: u32,
    cooldown_remaining: f32,
    active: bool,
    values: LevelValues,
}

impl AbilityRuntime {
    /// Creates the ability at level 1 without announcing a level-up
    pub fn new(definition: Arc<AbilityDefinition>, owner: ParticipantId) -> Self {
        let values = LevelValues::for_level(&definition, 1);
        Self {
            definition,
            owner,
            level: 1,
            cooldown_remaining: 0.0,
            active: false,
            values,
        }
    }

    pub fn update_for_level(&mut self, level: u32, events: &mut EventBus) {
        let level = level.clamp(1, MAX_HERO_LEVEL);
        let changed = level != self.level;
        self.level = level;
        self.values = LevelValues::for_level(&self.definition, level);

        if changed {
            events.publish(MatchEvent::AbilityLeveledUp {
                participant: self.owner,
                ability: self.definition.id.clone(),
                level,
            });
        }
    }

    pub fn update_cooldown(&mut self, delta_time: f32, events: &mut EventBus) {
        if self.cooldown_remaining <= 0.0 {
            return;
        }

        self.cooldown_remaining = (self.cooldown_remaining - delta_time).max(0.0);
        if self.cooldown_remaining == 0.0 {
            events.publish(MatchEvent::CooldownComplete {
                participant: self.owner,
                ability: self.definition.id.clone(),
            });
        }
    }

    pub fn can_use(&self, owner: Option<&dyn Combatant>) -> bool {
        if self.cooldown_remaining > 0.0 {
            return false;
        }

        let owner = match owner {
            Some(owner) if owner.is_alive() => owner,
            _ => return false,
        };

        if owner.mana() < self.values.mana_cost {
            return false;
        }

        if self.definition.ability_type == AbilityType::Active && self.active {
            return false;
        }

        true
    }

    /// Validates, pays, starts the cooldown and then runs the effect
    ///
    /// The cooldown starts even if the effect reports failure. The return
    /// value is the effect's result.
    pub fn use_ability(
        &mut self,
        owner: &mut dyn Combatant,
        target: CastTarget,
        effect: &mut dyn AbilityEffect,
        events: &mut EventBus,
    ) -> bool {
        if !self.can_use(Some(&*owner)) {
            return false;
        }

        if !owner.try_spend_mana(self.values.mana_cost) {
            return false;
        }

        self.cooldown_remaining = self.values.cooldown;

        let applied = effect.apply(CastContext {
            caster: owner,
            ability: &*self,
            target,
        });

        if applied {
            if self.values.duration > 0.0 {
                self.active = true;
            }
            debug!("{} used {}", self.owner, self.definition.id);
            events.publish(MatchEvent::AbilityUsed {
                participant: self.owner,
                ability: self.definition.id.clone(),
            });
        }

        applied
    }

    /// Ends a running duration effect. Returns false if nothing was active.
    pub fn deactivate(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    pub fn reset_cooldown(&mut self, events: &mut EventBus) {
        self.cooldown_remaining = 0.0;
        events.publish(MatchEvent::CooldownComplete {
            participant: self.owner,
            ability: self.definition.id.clone(),
        });
    }

    pub fn is_valid_target(&self, caster: &dyn Combatant, target: &TargetInfo) -> bool {
        targeting::is_valid_target(&self.definition, caster, target)
    }

    pub fn has_line_of_sight(&self, from: Vec2, to: Vec2, world: &dyn ObstructionQuery) -> bool {
        targeting::has_line_of_sight(from, to, world)
    }

    pub fn state(&self) -> CooldownState {
        if self.cooldown_remaining > 0.0 {
            CooldownState::OnCooldown
        } else {
            CooldownState::Ready
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown_remaining
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn values(&self) -> &LevelValues {
        &self.values
    }

    pub fn id(&self) -> &AbilityId {
        &self.definition.id
    }

    pub fn definition(&self) -> &Arc<AbilityDefinition> {
        &self.definition
    }
}
