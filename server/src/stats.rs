//! Hero stat aggregation (base → flat → percent-add → percent-multiply)
//!
//! Every stat is published as:
//!
//! `(base + ΣFlat) × (1 + ΣPercentAdd) × Π(1 + PercentMultiply_i)`
//!
//! Percent-add modifiers are summed before they are applied. Percent-multiply
//! modifiers compound one by one in ascending priority order. Modifiers of the
//! same stat are kept sorted by priority (stable, so insertion order breaks ties).

use log::debug;
use shared::content::{DamageType, HeroDefinition, ModifierKind, StatKind};
use shared::{AbilityId, ParticipantId, MAX_HERO_LEVEL};
use std::collections::HashMap;
use std::sync::Arc;

/// Owner of a modifier, used for bulk removal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModifierSource {
    Ability {
        caster: ParticipantId,
        ability: AbilityId,
    },
    Item(String),
    Buff(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatModifier {
    pub value: f32,
    pub kind: ModifierKind,
    /// Lower values are applied first within the same kind
    pub priority: i32,
    pub source: ModifierSource,
}

impl StatModifier {
    pub fn new(value: f32, kind: ModifierKind, source: ModifierSource) -> Self {
        Self {
            value,
            kind,
            priority: 0,
            source,
        }
    }

    pub fn flat(value: f32, source: ModifierSource) -> Self {
        Self::new(value, ModifierKind::Flat, source)
    }

    pub fn percent_add(value: f32, source: ModifierSource) -> Self {
        Self::new(value, ModifierKind::PercentAdd, source)
    }

    pub fn percent_multiply(value: f32, source: ModifierSource) -> Self {
        Self::new(value, ModifierKind::PercentMultiply, source)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Aggregate a base value with modifiers already sorted by priority
pub fn aggregate(base: f32, modifiers: &[StatModifier]) -> f32 {
    let flat: f32 = modifiers
        .iter()
        .filter(|m| m.kind == ModifierKind::Flat)
        .map(|m| m.value)
        .sum();
    let percent_add: f32 = modifiers
        .iter()
        .filter(|m| m.kind == ModifierKind::PercentAdd)
        .map(|m| m.value)
        .sum();

    let mut value = (base + flat) * (1.0 + percent_add);
    for modifier in modifiers
        .iter()
        .filter(|m| m.kind == ModifierKind::PercentMultiply)
    {
        value *= 1.0 + modifier.value;
    }
    value
}

/// `incoming × (1 - r / (100 + r))`; negative resistance counts as zero
pub fn mitigate(incoming: f32, resistance: f32) -> f32 {
    let resistance = resistance.max(0.0);
    incoming * (1.0 - resistance / (100.0 + resistance))
}

/// Published stat map of one hero
#[derive(Debug, Clone)]
pub struct StatEngine {
    definition: Arc<HeroDefinition>,
    level: u32,
    base: HashMap<StatKind, f32>,
    modifiers: HashMap<StatKind, Vec<StatModifier>>,
    values: HashMap<StatKind, f32>,
}

impl StatEngine {
    pub fn new(definition: Arc<HeroDefinition>, level: u32) -> Self {
        let mut engine = Self {
            definition: Arc::clone(&definition),
            level: 1,
            base: HashMap::new(),
            modifiers: HashMap::new(),
            values: HashMap::new(),
        };
        engine.initialize(definition, level);
        engine
    }

    /// Drops every modifier and rebuilds the base values for `level`
    pub fn initialize(&mut self, definition: Arc<HeroDefinition>, level: u32) {
        self.definition = definition;
        self.base.clear();
        self.modifiers.clear();
        self.values.clear();
        self.set_base_for_level(level);
        self.recalculate_all();
    }

    /// Re-derives base values; existing modifiers stay in place
    pub fn update_for_level(&mut self, level: u32) {
        self.set_base_for_level(level);
        self.recalculate_all();
    }

    fn set_base_for_level(&mut self, level: u32) {
        self.level = level.clamp(1, MAX_HERO_LEVEL);
        for stat in StatKind::ALL {
            self.base
                .insert(stat, self.definition.base_stat(stat, self.level));
        }
    }

    pub fn add_modifier(&mut self, stat: StatKind, modifier: StatModifier) {
        let list = self.modifiers.entry(stat).or_default();
        list.push(modifier);
        list.sort_by_key(|m| m.priority);
        self.recalculate(stat);
    }

    /// Removes every modifier owned by `source` across all stats
    ///
    /// Returns true if anything was removed.
    pub fn remove_modifiers_from_source(&mut self, source: &ModifierSource) -> bool {
        let mut affected = Vec::new();
        for (stat, list) in self.modifiers.iter_mut() {
            let before = list.len();
            list.retain(|m| &m.source != source);
            if list.len() != before {
                affected.push(*stat);
            }
        }

        for stat in &affected {
            self.recalculate(*stat);
        }

        if !affected.is_empty() {
            debug!("Removed modifiers from {:?} on {} stats", source, affected.len());
        }
        !affected.is_empty()
    }

    fn recalculate(&mut self, stat: StatKind) {
        let base = self.base.get(&stat).copied().unwrap_or(0.0);
        let value = match self.modifiers.get(&stat) {
            Some(list) => aggregate(base, list),
            None => base,
        };
        self.values.insert(stat, value);
    }

    fn recalculate_all(&mut self) {
        for stat in StatKind::ALL {
            self.recalculate(stat);
        }
    }

    pub fn value(&self, stat: StatKind) -> f32 {
        self.values.get(&stat).copied().unwrap_or(0.0)
    }

    pub fn base(&self, stat: StatKind) -> f32 {
        self.base.get(&stat).copied().unwrap_or(0.0)
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn modifier_count(&self, stat: StatKind) -> usize {
        self.modifiers.get(&stat).map_or(0, Vec::len)
    }

    pub fn definition(&self) -> &Arc<HeroDefinition> {
        &self.definition
    }

    /// Damage remaining after the matching resistance stat is applied
    pub fn calculate_damage_taken(&self, incoming: f32, damage_type: DamageType) -> f32 {
        match damage_type {
            DamageType::Physical => mitigate(incoming, self.value(StatKind::PhysicalResistance)),
            DamageType::Magical => mitigate(incoming, self.value(StatKind::MagicResistance)),
            DamageType::True => incoming,
        }
    }
}
