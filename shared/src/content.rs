//! Static hero, ability and team definitions loaded once at startup from TOML.
//!
//! Definitions are immutable after loading. Hero instances share them through
//! `Arc`, so every instance of the same hero reads one template.

use crate::{AbilityId, HeroId, TeamId, Vec2, MAX_HERO_LEVEL, MIN_COOLDOWN};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Content loading error. Always fatal: the server refuses to start on one.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read content file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("No hero definitions configured")]
    NoHeroes,
    #[error("No teams configured")]
    NoTeams,
    #[error("Duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },
    #[error("Hero '{hero}' references missing ability '{ability}'")]
    MissingAbility { hero: HeroId, ability: AbilityId },
    #[error("Invalid team config for {team}: {reason}")]
    InvalidTeam { team: TeamId, reason: String },
    #[error("Obstacle {index} needs a positive finite radius")]
    InvalidObstacle { index: usize },
    #[error("Invalid match setting: {0}")]
    InvalidSetting(String),
}

/// `max(min, base + per_level * (level - 1))`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearScaling {
    pub base: f32,
    #[serde(default)]
    pub per_level: f32,
    #[serde(default)]
    pub min: f32,
}

impl LinearScaling {
    pub fn new(base: f32, per_level: f32) -> Self {
        Self {
            base,
            per_level,
            min: 0.0,
        }
    }

    pub fn value(&self, level: u32) -> f32 {
        let steps = level.clamp(1, MAX_HERO_LEVEL) - 1;
        (self.base + self.per_level * steps as f32).max(self.min)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    MaxHealth,
    MaxMana,
    AttackDamage,
    AttackSpeed,
    MovementSpeed,
    HealthRegen,
    ManaRegen,
    PhysicalResistance,
    MagicResistance,
}

impl StatKind {
    pub const ALL: [StatKind; 9] = [
        StatKind::MaxHealth,
        StatKind::MaxMana,
        StatKind::AttackDamage,
        StatKind::AttackSpeed,
        StatKind::MovementSpeed,
        StatKind::HealthRegen,
        StatKind::ManaRegen,
        StatKind::PhysicalResistance,
        StatKind::MagicResistance,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Flat,
    PercentAdd,
    PercentMultiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Tank,
    Fighter,
    Mage,
    Marksman,
    Support,
    Assassin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroDefinition {
    pub id: HeroId,
    pub display_name: String,
    pub archetype: Archetype,
    pub max_health: LinearScaling,
    pub max_mana: LinearScaling,
    pub attack_damage: LinearScaling,
    pub attack_speed: LinearScaling,
    pub movement_speed: LinearScaling,
    pub health_regen: LinearScaling,
    pub mana_regen: LinearScaling,
    #[serde(default)]
    pub physical_resistance: LinearScaling,
    #[serde(default)]
    pub magic_resistance: LinearScaling,
    /// Ability ids in slot order.
    #[serde(default)]
    pub abilities: Vec<AbilityId>,
}

impl HeroDefinition {
    pub fn scaling(&self, stat: StatKind) -> &LinearScaling {
        match stat {
            StatKind::MaxHealth => &self.max_health,
            StatKind::MaxMana => &self.max_mana,
            StatKind::AttackDamage => &self.attack_damage,
            StatKind::AttackSpeed => &self.attack_speed,
            StatKind::MovementSpeed => &self.movement_speed,
            StatKind::HealthRegen => &self.health_regen,
            StatKind::ManaRegen => &self.mana_regen,
            StatKind::PhysicalResistance => &self.physical_resistance,
            StatKind::MagicResistance => &self.magic_resistance,
        }
    }

    pub fn base_stat(&self, stat: StatKind, level: u32) -> f32 {
        self.scaling(stat).value(level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityType {
    Active,
    Passive,
    Ultimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingMode {
    SelfCast,
    Ally,
    Enemy,
    Any,
    Ground,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Physical,
    Magical,
    True,
}

fn default_damage_type() -> DamageType {
    DamageType::Magical
}

/// What an ability does once validation, mana and cooldown are settled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectSpec {
    Damage,
    Heal,
    StatBuff {
        stat: StatKind,
        modifier: ModifierKind,
        value: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDefinition {
    pub id: AbilityId,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub ability_type: AbilityType,
    pub targeting: TargetingMode,
    #[serde(default)]
    pub range: f32,
    #[serde(default = "default_damage_type")]
    pub damage_type: DamageType,
    #[serde(default)]
    pub damage: LinearScaling,
    #[serde(default)]
    pub healing: LinearScaling,
    #[serde(default)]
    pub duration: LinearScaling,
    #[serde(default)]
    pub mana_cost: LinearScaling,
    pub base_cooldown: f32,
    #[serde(default)]
    pub cooldown_reduction_per_level: f32,
    #[serde(default)]
    pub effect: Option<EffectSpec>,
}

impl AbilityDefinition {
    /// `max(0.5, base_cooldown - reduction * (level - 1))`
    pub fn cooldown(&self, level: u32) -> f32 {
        let steps = level.clamp(1, MAX_HERO_LEVEL) - 1;
        (self.base_cooldown - self.cooldown_reduction_per_level * steps as f32).max(MIN_COOLDOWN)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamConfig {
    pub id: TeamId,
    pub name: String,
    #[serde(default)]
    pub color: String,
    /// Falls back to the match-wide team size limit when absent.
    #[serde(default)]
    pub max_players: Option<usize>,
    pub spawn_points: Vec<Vec2>,
}

/// Circular line-of-sight blocker on the arena floor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleConfig {
    pub center: Vec2,
    pub radius: f32,
}

#[derive(Debug, Deserialize)]
struct ContentFile {
    #[serde(default)]
    teams: Vec<TeamConfig>,
    #[serde(default)]
    obstacles: Vec<ObstacleConfig>,
    #[serde(default)]
    heroes: Vec<HeroDefinition>,
    #[serde(default)]
    abilities: Vec<AbilityDefinition>,
}

/// Validated, read-only game content.
#[derive(Debug, Clone)]
pub struct GameContent {
    heroes: Vec<Arc<HeroDefinition>>,
    abilities: HashMap<AbilityId, Arc<AbilityDefinition>>,
    teams: Vec<TeamConfig>,
    obstacles: Vec<ObstacleConfig>,
}

impl GameContent {
    /// Load and validate a TOML content file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a TOML content string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ContentFile = toml::from_str(content)?;
        Self::from_definitions(file.heroes, file.abilities, file.teams)?
            .with_obstacles(file.obstacles)
    }

    /// Content bundled with the game
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::parse(include_str!("../content/default.toml"))
    }

    pub fn from_definitions(
        heroes: Vec<HeroDefinition>,
        abilities: Vec<AbilityDefinition>,
        teams: Vec<TeamConfig>,
    ) -> Result<Self, ConfigError> {
        if heroes.is_empty() {
            return Err(ConfigError::NoHeroes);
        }
        if teams.is_empty() {
            return Err(ConfigError::NoTeams);
        }

        let mut ability_map = HashMap::new();
        for ability in abilities {
            let id = ability.id.clone();
            if ability_map.insert(id.clone(), Arc::new(ability)).is_some() {
                return Err(ConfigError::DuplicateId {
                    kind: "ability",
                    id: id.0,
                });
            }
        }

        let mut seen_heroes = HashSet::new();
        for hero in &heroes {
            if !seen_heroes.insert(hero.id.clone()) {
                return Err(ConfigError::DuplicateId {
                    kind: "hero",
                    id: hero.id.0.clone(),
                });
            }
            if let Some(missing) = hero.abilities.iter().find(|a| !ability_map.contains_key(*a)) {
                return Err(ConfigError::MissingAbility {
                    hero: hero.id.clone(),
                    ability: missing.clone(),
                });
            }
        }

        let mut seen_teams = HashSet::new();
        for team in &teams {
            if !seen_teams.insert(team.id) {
                return Err(ConfigError::DuplicateId {
                    kind: "team",
                    id: team.id.0.to_string(),
                });
            }
            if team.spawn_points.is_empty() {
                return Err(ConfigError::InvalidTeam {
                    team: team.id,
                    reason: "no spawn points".to_string(),
                });
            }
            if team.max_players == Some(0) {
                return Err(ConfigError::InvalidTeam {
                    team: team.id,
                    reason: "max_players must be at least 1".to_string(),
                });
            }
        }

        Ok(Self {
            heroes: heroes.into_iter().map(Arc::new).collect(),
            abilities: ability_map,
            teams,
            obstacles: Vec::new(),
        })
    }

    /// Adds line-of-sight blockers to validated content
    pub fn with_obstacles(mut self, obstacles: Vec<ObstacleConfig>) -> Result<Self, ConfigError> {
        if let Some(index) = obstacles
            .iter()
            .position(|o| !o.radius.is_finite() || o.radius <= 0.0)
        {
            return Err(ConfigError::InvalidObstacle { index });
        }
        self.obstacles = obstacles;
        Ok(self)
    }

    pub fn hero(&self, id: &HeroId) -> Option<&Arc<HeroDefinition>> {
        self.heroes.iter().find(|h| &h.id == id)
    }

    pub fn ability(&self, id: &AbilityId) -> Option<&Arc<AbilityDefinition>> {
        self.abilities.get(id)
    }

    /// Hero ids in configuration order
    pub fn hero_ids(&self) -> Vec<HeroId> {
        self.heroes.iter().map(|h| h.id.clone()).collect()
    }

    pub fn heroes(&self) -> &[Arc<HeroDefinition>] {
        &self.heroes
    }

    pub fn teams(&self) -> &[TeamConfig] {
        &self.teams
    }

    pub fn obstacles(&self) -> &[ObstacleConfig] {
        &self.obstacles
    }

    /// Abilities of a hero in slot order
    pub fn abilities_for(&self, hero: &HeroDefinition) -> Vec<Arc<AbilityDefinition>> {
        hero.abilities
            .iter()
            .filter_map(|id| self.abilities.get(id).cloned())
            .collect()
    }
}
