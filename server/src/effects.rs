//! Data-driven ability effects resolved against the live arena

use crate::ability::{AbilityEffect, AbilityRuntime, CastContext, CastTarget, LevelValues};
use crate::hero::{Combatant, HeroInstance};
use crate::stats::{ModifierSource, StatModifier};
use crate::targeting::{ObstructionQuery, TargetInfo};
use log::debug;
use shared::content::{AbilityDefinition, EffectSpec, TargetingMode};
use shared::{ParticipantId, Vec2};
use std::collections::BTreeMap;

/// Radius hit by ground-targeted effects
pub const GROUND_EFFECT_RADIUS: f32 = 250.0;

/// Applies [`EffectSpec`] definitions to every hero except the caster
///
/// The caster is taken out of `heroes` for the duration of the cast and is
/// reached through the [`CastContext`] instead.
pub struct ArenaEffects<'a> {
    heroes: &'a mut BTreeMap<ParticipantId, HeroInstance>,
    world: &'a dyn ObstructionQuery,
    fallen: Vec<ParticipantId>,
}

impl<'a> ArenaEffects<'a> {
    pub fn new(
        heroes: &'a mut BTreeMap<ParticipantId, HeroInstance>,
        world: &'a dyn ObstructionQuery,
    ) -> Self {
        Self {
            heroes,
            world,
            fallen: Vec::new(),
        }
    }

    /// Heroes killed by effects applied so far
    pub fn into_fallen(self) -> Vec<ParticipantId> {
        self.fallen
    }

    /// Target and line-of-sight check, done before any mana is spent
    pub fn accepts(
        &self,
        caster: &dyn Combatant,
        ability: &AbilityRuntime,
        target: &CastTarget,
    ) -> bool {
        self.resolve(caster, ability.definition(), target)
            .is_some_and(|info| self.reaches(caster, ability, &info))
    }

    fn reaches(&self, caster: &dyn Combatant, ability: &AbilityRuntime, info: &TargetInfo) -> bool {
        ability.is_valid_target(caster, info)
            && ability.has_line_of_sight(caster.position(), info.position, self.world)
    }

    fn resolve(
        &self,
        caster: &dyn Combatant,
        ability: &AbilityDefinition,
        target: &CastTarget,
    ) -> Option<TargetInfo> {
        if ability.targeting == TargetingMode::Ground {
            return target.position.map(TargetInfo::ground);
        }

        match target.target {
            Some(id) if id == caster.participant() => Some(TargetInfo::of(caster)),
            Some(id) => self.heroes.get(&id).map(|hero| TargetInfo::of(hero.vitals())),
            // Untargeted friendly casts land on the caster
            None => match ability.targeting {
                TargetingMode::SelfCast | TargetingMode::Ally => Some(TargetInfo::of(caster)),
                _ => None,
            },
        }
    }

    fn apply_area(
        &mut self,
        caster: &mut dyn Combatant,
        ability: &AbilityDefinition,
        values: &LevelValues,
        effect: EffectSpec,
        center: Vec2,
    ) {
        let caster_id = caster.participant();
        let caster_team = caster.team();
        let hostile = matches!(effect, EffectSpec::Damage);

        for hero in self.heroes.values_mut() {
            let in_area = hero.position().distance(&center) <= GROUND_EFFECT_RADIUS;
            let relation_ok = (hero.team() != caster_team) == hostile;
            if !hero.is_alive() || !in_area || !relation_ok {
                continue;
            }
            apply_single(hero.vitals_mut(), caster_id, ability, values, effect);
            if !hero.is_alive() {
                self.fallen.push(hero.participant());
            }
        }

        if !hostile && caster.position().distance(&center) <= GROUND_EFFECT_RADIUS {
            apply_single(caster, caster_id, ability, values, effect);
        }
    }
}

fn apply_single(
    target: &mut dyn Combatant,
    caster: ParticipantId,
    ability: &AbilityDefinition,
    values: &LevelValues,
    effect: EffectSpec,
) {
    match effect {
        EffectSpec::Damage => {
            let taken = target.take_damage(values.damage, ability.damage_type);
            debug!("{} hit {} for {:.1}", caster, target.participant(), taken);
        }
        EffectSpec::Heal => {
            let healed = target.heal(values.healing);
            debug!("{} healed {} for {:.1}", caster, target.participant(), healed);
        }
        EffectSpec::StatBuff {
            stat,
            modifier,
            value,
        } => {
            let source = ModifierSource::Ability {
                caster,
                ability: ability.id.clone(),
            };
            target.add_timed_modifier(
                stat,
                StatModifier::new(value, modifier, source),
                values.duration,
            );
        }
    }
}

impl AbilityEffect for ArenaEffects<'_> {
    fn apply(&mut self, ctx: CastContext<'_>) -> bool {
        let CastContext {
            caster,
            ability: runtime,
            target,
        } = ctx;
        let ability = runtime.definition().as_ref();
        let values = *runtime.values();

        let Some(info) = self.resolve(&*caster, ability, &target) else {
            return false;
        };
        if !self.reaches(&*caster, runtime, &info) {
            return false;
        }

        let Some(effect) = ability.effect else {
            return true;
        };

        if ability.targeting == TargetingMode::Ground {
            self.apply_area(caster, ability, &values, effect, info.position);
            return true;
        }

        let caster_id = caster.participant();
        match info.participant {
            Some(id) if id != caster_id => {
                let Some(hero) = self.heroes.get_mut(&id) else {
                    return false;
                };
                apply_single(hero.vitals_mut(), caster_id, ability, &values, effect);
                if !hero.is_alive() {
                    self.fallen.push(id);
                }
            }
            _ => apply_single(caster, caster_id, ability, &values, effect),
        }
        true
    }
}
