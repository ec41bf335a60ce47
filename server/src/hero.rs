//! Runtime hero state owned by the authoritative simulation

use crate::ability::{AbilityEffect, AbilityRuntime, CastTarget};
use crate::events::{EventBus, MatchEvent};
use crate::stats::{ModifierSource, StatEngine, StatModifier};
use log::{debug, info};
use shared::content::{AbilityDefinition, DamageType, HeroDefinition, StatKind};
use shared::{HeroId, HeroSnapshot, ParticipantId, TeamId, Vec2, MAX_HERO_LEVEL};
use std::sync::Arc;

/// Anything that can cast abilities and be hit by them
pub trait Combatant {
    fn participant(&self) -> ParticipantId;
    fn team(&self) -> TeamId;
    fn position(&self) -> Vec2;
    fn is_alive(&self) -> bool;
    fn mana(&self) -> f32;
    /// Deducts mana atomically; false leaves mana untouched
    fn try_spend_mana(&mut self, amount: f32) -> bool;
    /// Returns the damage actually taken after mitigation
    fn take_damage(&mut self, amount: f32, damage_type: DamageType) -> f32;
    /// Returns the health actually restored
    fn heal(&mut self, amount: f32) -> f32;
    fn add_timed_modifier(&mut self, stat: StatKind, modifier: StatModifier, duration: f32);
}

#[derive(Debug, Clone)]
struct TimedModifier {
    source: ModifierSource,
    remaining: f32,
}

/// Health, mana, stats and position of one hero
#[derive(Debug, Clone)]
pub struct HeroVitals {
    participant: ParticipantId,
    team: TeamId,
    position: Vec2,
    health: f32,
    mana: f32,
    alive: bool,
    stats: StatEngine,
    timed_modifiers: Vec<TimedModifier>,
}

impl HeroVitals {
    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn stats(&self) -> &StatEngine {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut StatEngine {
        &mut self.stats
    }

    fn clamp_resources(&mut self) {
        self.health = self.health.min(self.stats.value(StatKind::MaxHealth));
        self.mana = self.mana.min(self.stats.value(StatKind::MaxMana));
    }

    fn tick_modifiers(&mut self, delta_time: f32) {
        let mut expired = Vec::new();
        self.timed_modifiers.retain_mut(|timed| {
            timed.remaining -= delta_time;
            if timed.remaining <= 0.0 {
                expired.push(timed.source.clone());
                false
            } else {
                true
            }
        });

        for source in expired {
            self.stats.remove_modifiers_from_source(&source);
        }
        self.clamp_resources();
    }

    fn regenerate(&mut self, delta_time: f32) {
        if !self.alive {
            return;
        }
        let max_health = self.stats.value(StatKind::MaxHealth);
        let max_mana = self.stats.value(StatKind::MaxMana);
        self.health =
            (self.health + self.stats.value(StatKind::HealthRegen) * delta_time).min(max_health);
        self.mana = (self.mana + self.stats.value(StatKind::ManaRegen) * delta_time).min(max_mana);
    }
}

impl Combatant for HeroVitals {
    fn participant(&self) -> ParticipantId {
        self.participant
    }

    fn team(&self) -> TeamId {
        self.team
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn mana(&self) -> f32 {
        self.mana
    }

    fn try_spend_mana(&mut self, amount: f32) -> bool {
        if !self.alive || amount < 0.0 || self.mana < amount {
            return false;
        }
        self.mana -= amount;
        true
    }

    fn take_damage(&mut self, amount: f32, damage_type: DamageType) -> f32 {
        if !self.alive || amount <= 0.0 {
            return 0.0;
        }
        let taken = self.stats.calculate_damage_taken(amount, damage_type);
        self.health -= taken;
        if self.health <= 0.0 {
            self.health = 0.0;
            self.alive = false;
            info!("{} was killed", self.participant);
        }
        taken
    }

    fn heal(&mut self, amount: f32) -> f32 {
        if !self.alive || amount <= 0.0 {
            return 0.0;
        }
        let before = self.health;
        self.health = (self.health + amount).min(self.stats.value(StatKind::MaxHealth));
        self.health - before
    }

    fn add_timed_modifier(&mut self, stat: StatKind, modifier: StatModifier, duration: f32) {
        // Recasting refreshes instead of stacking
        if self.stats.remove_modifiers_from_source(&modifier.source) {
            self.timed_modifiers.retain(|t| t.source != modifier.source);
        }
        self.timed_modifiers.push(TimedModifier {
            source: modifier.source.clone(),
            remaining: duration,
        });
        self.stats.add_modifier(stat, modifier);
    }
}

#[derive(Debug, Clone)]
struct ActiveTimer {
    slot: usize,
    remaining: f32,
}

#[derive(Debug, Clone)]
pub struct HeroInstance {
    definition: Arc<HeroDefinition>,
    vitals: HeroVitals,
    abilities: Vec<AbilityRuntime>,
    active_timers: Vec<ActiveTimer>,
}

impl HeroInstance {
    pub fn new(
        participant: ParticipantId,
        definition: Arc<HeroDefinition>,
        abilities: Vec<Arc<AbilityDefinition>>,
        team: TeamId,
        position: Vec2,
    ) -> Self {
        let stats = StatEngine::new(Arc::clone(&definition), 1);
        let vitals = HeroVitals {
            participant,
            team,
            position,
            health: stats.value(StatKind::MaxHealth),
            mana: stats.value(StatKind::MaxMana),
            alive: true,
            stats,
            timed_modifiers: Vec::new(),
        };

        Self {
            definition,
            vitals,
            abilities: abilities
                .into_iter()
                .map(|ability| AbilityRuntime::new(ability, participant))
                .collect(),
            active_timers: Vec::new(),
        }
    }

    /// Raises the hero level by one, growing health and mana by the gained maximum
    pub fn level_up(&mut self, events: &mut EventBus) -> bool {
        let level = self.level();
        if level >= MAX_HERO_LEVEL || !self.vitals.alive {
            return false;
        }

        let old_health = self.max_health();
        let old_mana = self.max_mana();
        self.vitals.stats.update_for_level(level + 1);
        self.vitals.health += self.max_health() - old_health;
        self.vitals.mana += self.max_mana() - old_mana;
        self.vitals.clamp_resources();

        for ability in &mut self.abilities {
            ability.update_for_level(level + 1, events);
        }

        events.publish(MatchEvent::HeroLeveledUp {
            participant: self.participant(),
            level: level + 1,
        });
        true
    }

    /// Casts the ability in `slot` and arms its duration timer on success
    pub fn use_ability(
        &mut self,
        slot: usize,
        target: CastTarget,
        effect: &mut dyn AbilityEffect,
        events: &mut EventBus,
    ) -> bool {
        let Some(ability) = self.abilities.get_mut(slot) else {
            return false;
        };

        let used = ability.use_ability(&mut self.vitals, target, effect, events);
        if used && ability.is_active() {
            self.active_timers.retain(|t| t.slot != slot);
            self.active_timers.push(ActiveTimer {
                slot,
                remaining: ability.values().duration,
            });
        }
        used
    }

    pub fn update(&mut self, delta_time: f32, events: &mut EventBus) {
        for ability in &mut self.abilities {
            ability.update_cooldown(delta_time, events);
        }

        let mut finished = Vec::new();
        self.active_timers.retain_mut(|timer| {
            timer.remaining -= delta_time;
            if timer.remaining <= 0.0 {
                finished.push(timer.slot);
                false
            } else {
                true
            }
        });
        for slot in finished {
            if let Some(ability) = self.abilities.get_mut(slot) {
                ability.deactivate();
                debug!("{} effect of {} ended", self.vitals.participant, ability.id());
            }
        }

        self.vitals.tick_modifiers(delta_time);
        self.vitals.regenerate(delta_time);
    }

    pub fn snapshot(&self) -> HeroSnapshot {
        HeroSnapshot {
            participant_id: self.participant(),
            hero_id: self.hero_id().clone(),
            team_id: self.team(),
            level: self.level(),
            health: self.vitals.health,
            max_health: self.max_health(),
            mana: self.vitals.mana,
            max_mana: self.max_mana(),
            position: self.vitals.position,
            alive: self.vitals.alive,
            cooldowns: self
                .abilities
                .iter()
                .map(AbilityRuntime::cooldown_remaining)
                .collect(),
        }
    }

    pub fn participant(&self) -> ParticipantId {
        self.vitals.participant
    }

    pub fn hero_id(&self) -> &HeroId {
        &self.definition.id
    }

    pub fn team(&self) -> TeamId {
        self.vitals.team
    }

    pub fn level(&self) -> u32 {
        self.vitals.stats.level()
    }

    pub fn health(&self) -> f32 {
        self.vitals.health
    }

    pub fn mana(&self) -> f32 {
        self.vitals.mana
    }

    pub fn max_health(&self) -> f32 {
        self.vitals.stats.value(StatKind::MaxHealth)
    }

    pub fn max_mana(&self) -> f32 {
        self.vitals.stats.value(StatKind::MaxMana)
    }

    pub fn is_alive(&self) -> bool {
        self.vitals.alive
    }

    pub fn position(&self) -> Vec2 {
        self.vitals.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.vitals.position = position;
    }

    pub fn stats(&self) -> &StatEngine {
        &self.vitals.stats
    }

    pub fn abilities(&self) -> &[AbilityRuntime] {
        &self.abilities
    }

    pub fn ability_mut(&mut self, slot: usize) -> Option<&mut AbilityRuntime> {
        self.abilities.get_mut(slot)
    }

    pub fn vitals(&self) -> &HeroVitals {
        &self.vitals
    }

    pub fn vitals_mut(&mut self) -> &mut HeroVitals {
        &mut self.vitals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::CastContext;
    use crate::events::record_events;
    use crate::targeting::{is_valid_target, TargetInfo};
    use assert_approx_eq::assert_approx_eq;
    use shared::content::{AbilityType, Archetype, LinearScaling, ModifierKind, TargetingMode};
    use shared::AbilityId;

    fn knight() -> Arc<HeroDefinition> {
        Arc::new(HeroDefinition {
            id: HeroId::from("knight"),
            display_name: "Knight".to_string(),
            archetype: Archetype::Tank,
            max_health: LinearScaling::new(600.0, 100.0),
            max_mana: LinearScaling::new(300.0, 50.0),
            attack_damage: LinearScaling::new(60.0, 4.0),
            attack_speed: LinearScaling::new(0.625, 0.0),
            movement_speed: LinearScaling::new(330.0, 0.0),
            health_regen: LinearScaling::new(10.0, 0.0),
            mana_regen: LinearScaling::new(5.0, 0.0),
            physical_resistance: LinearScaling::new(100.0, 0.0),
            magic_resistance: LinearScaling::new(0.0, 0.0),
            abilities: vec![AbilityId::from("guard")],
        })
    }

    fn guard(targeting: TargetingMode, range: f32) -> Arc<AbilityDefinition> {
        Arc::new(AbilityDefinition {
            id: AbilityId::from("guard"),
            display_name: "Guard".to_string(),
            description: String::new(),
            ability_type: AbilityType::Active,
            targeting,
            range,
            damage_type: DamageType::Physical,
            damage: LinearScaling::default(),
            healing: LinearScaling::default(),
            duration: LinearScaling::new(2.0, 0.0),
            mana_cost: LinearScaling::new(50.0, 0.0),
            base_cooldown: 10.0,
            cooldown_reduction_per_level: 1.0,
            effect: None,
        })
    }

    fn hero(id: u32, team: u8, position: Vec2) -> HeroInstance {
        HeroInstance::new(
            ParticipantId(id),
            knight(),
            vec![guard(TargetingMode::SelfCast, 0.0)],
            TeamId(team),
            position,
        )
    }

    struct SelfBuff;

    impl AbilityEffect for SelfBuff {
        fn apply(&mut self, ctx: CastContext<'_>) -> bool {
            let source = ModifierSource::Ability {
                caster: ctx.caster.participant(),
                ability: ctx.ability.id().clone(),
            };
            ctx.caster.add_timed_modifier(
                StatKind::PhysicalResistance,
                StatModifier::new(50.0, ModifierKind::Flat, source),
                ctx.ability.values().duration,
            );
            true
        }
    }

    #[test]
    fn test_new_hero_starts_full() {
        let hero = hero(1, 0, Vec2::default());
        assert_eq!(hero.level(), 1);
        assert_approx_eq!(hero.health(), 600.0, 0.001);
        assert_approx_eq!(hero.mana(), 300.0, 0.001);
        assert!(hero.is_alive());
        assert_eq!(hero.abilities().len(), 1);
    }

    #[test]
    fn test_level_up_grows_resources_and_abilities() {
        let mut events = EventBus::new();
        let log = record_events(&mut events);
        let mut hero = hero(1, 0, Vec2::default());

        assert!(hero.level_up(&mut events));
        assert_eq!(hero.level(), 2);
        assert_approx_eq!(hero.health(), 700.0, 0.001);
        assert_approx_eq!(hero.max_mana(), 350.0, 0.001);
        assert_eq!(hero.abilities()[0].level(), 2);
        assert_approx_eq!(hero.abilities()[0].values().cooldown, 9.0, 0.001);

        let log = log.lock().unwrap();
        assert!(log
            .iter()
            .any(|e| matches!(e, MatchEvent::HeroLeveledUp { level: 2, .. })));
        assert!(log
            .iter()
            .any(|e| matches!(e, MatchEvent::AbilityLeveledUp { level: 2, .. })));
    }

    #[test]
    fn test_level_capped() {
        let mut events = EventBus::new();
        let mut hero = hero(1, 0, Vec2::default());
        for _ in 0..10 {
            hero.level_up(&mut events);
        }
        assert_eq!(hero.level(), MAX_HERO_LEVEL);
        assert!(!hero.level_up(&mut events));
    }

    #[test]
    fn test_damage_mitigated_and_death() {
        let mut hero = hero(1, 0, Vec2::default());
        let taken = hero.vitals_mut().take_damage(100.0, DamageType::Physical);
        assert_approx_eq!(taken, 50.0, 0.001);
        assert_approx_eq!(hero.health(), 550.0, 0.001);

        hero.vitals_mut().take_damage(1000.0, DamageType::True);
        assert!(!hero.is_alive());
        assert_eq!(hero.health(), 0.0);
        assert_eq!(hero.vitals_mut().heal(100.0), 0.0);
    }

    #[test]
    fn test_heal_capped_at_max() {
        let mut hero = hero(1, 0, Vec2::default());
        hero.vitals_mut().take_damage(40.0, DamageType::True);
        let healed = hero.vitals_mut().heal(100.0);
        assert_approx_eq!(healed, 40.0, 0.001);
        assert_approx_eq!(hero.health(), 600.0, 0.001);
    }

    #[test]
    fn test_spend_mana_is_atomic() {
        let mut hero = hero(1, 0, Vec2::default());
        assert!(!hero.vitals_mut().try_spend_mana(500.0));
        assert_approx_eq!(hero.mana(), 300.0, 0.001);
        assert!(hero.vitals_mut().try_spend_mana(100.0));
        assert_approx_eq!(hero.mana(), 200.0, 0.001);
    }

    #[test]
    fn test_duration_effect_expires() {
        let mut events = EventBus::new();
        let mut hero = hero(1, 0, Vec2::default());

        assert!(hero.use_ability(0, CastTarget::default(), &mut SelfBuff, &mut events));
        assert!(hero.abilities()[0].is_active());
        assert_approx_eq!(hero.stats().value(StatKind::PhysicalResistance), 150.0, 0.001);

        hero.update(1.0, &mut events);
        assert!(hero.abilities()[0].is_active());

        hero.update(1.5, &mut events);
        assert!(!hero.abilities()[0].is_active());
        assert_approx_eq!(hero.stats().value(StatKind::PhysicalResistance), 100.0, 0.001);
    }

    #[test]
    fn test_regeneration() {
        let mut events = EventBus::new();
        let mut hero = hero(1, 0, Vec2::default());
        hero.vitals_mut().take_damage(100.0, DamageType::True);
        hero.vitals_mut().try_spend_mana(100.0);

        hero.update(2.0, &mut events);
        assert_approx_eq!(hero.health(), 520.0, 0.001);
        assert_approx_eq!(hero.mana(), 210.0, 0.001);
    }

    #[test]
    fn test_invalid_slot() {
        let mut events = EventBus::new();
        let mut hero = hero(1, 0, Vec2::default());
        assert!(!hero.use_ability(4, CastTarget::default(), &mut SelfBuff, &mut events));
    }

    #[test]
    fn test_snapshot() {
        let hero = hero(3, 1, Vec2::new(5.0, 6.0));
        let snapshot = hero.snapshot();
        assert_eq!(snapshot.participant_id, ParticipantId(3));
        assert_eq!(snapshot.team_id, TeamId(1));
        assert_eq!(snapshot.hero_id, HeroId::from("knight"));
        assert_eq!(snapshot.cooldowns, vec![0.0]);
        assert_eq!(snapshot.position, Vec2::new(5.0, 6.0));
    }

    #[test]
    fn test_target_relations() {
        let caster = hero(1, 0, Vec2::new(0.0, 0.0));
        let ally = hero(2, 0, Vec2::new(100.0, 0.0));
        let enemy = hero(3, 1, Vec2::new(100.0, 0.0));
        let far_enemy = hero(4, 1, Vec2::new(5000.0, 0.0));

        let enemy_only = guard(TargetingMode::Enemy, 500.0);
        assert!(is_valid_target(&enemy_only, caster.vitals(), &TargetInfo::of(enemy.vitals())));
        assert!(!is_valid_target(&enemy_only, caster.vitals(), &TargetInfo::of(ally.vitals())));
        assert!(!is_valid_target(&enemy_only, caster.vitals(), &TargetInfo::of(far_enemy.vitals())));

        let ally_only = guard(TargetingMode::Ally, 500.0);
        assert!(is_valid_target(&ally_only, caster.vitals(), &TargetInfo::of(ally.vitals())));
        assert!(is_valid_target(&ally_only, caster.vitals(), &TargetInfo::of(caster.vitals())));
        assert!(!is_valid_target(&ally_only, caster.vitals(), &TargetInfo::of(enemy.vitals())));

        let self_only = guard(TargetingMode::SelfCast, 0.0);
        assert!(is_valid_target(&self_only, caster.vitals(), &TargetInfo::of(caster.vitals())));
        assert!(!is_valid_target(&self_only, caster.vitals(), &TargetInfo::of(ally.vitals())));
    }

    #[test]
    fn test_dead_and_terrain_targets_rejected() {
        let caster = hero(1, 0, Vec2::new(0.0, 0.0));
        let mut enemy = hero(3, 1, Vec2::new(100.0, 0.0));
        enemy.vitals_mut().take_damage(10_000.0, DamageType::True);

        let any = guard(TargetingMode::Any, 0.0);
        assert!(!is_valid_target(&any, caster.vitals(), &TargetInfo::of(enemy.vitals())));
        assert!(!is_valid_target(
            &any,
            caster.vitals(),
            &TargetInfo::ground(Vec2::new(10.0, 0.0))
        ));

        let ground = guard(TargetingMode::Ground, 200.0);
        assert!(is_valid_target(
            &ground,
            caster.vitals(),
            &TargetInfo::ground(Vec2::new(10.0, 0.0))
        ));
    }
}
