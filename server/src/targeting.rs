//! Target and line-of-sight predicates for ability casts.
//!
//! These checks never mutate anything. Effects consult them before applying
//! damage, healing or buffs.

use crate::hero::Combatant;
use shared::content::{AbilityDefinition, ObstacleConfig, TargetingMode};
use shared::{ParticipantId, TeamId, Vec2};

/// Occupancy layer of a potential target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Hero,
    Terrain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetInfo {
    pub participant: Option<ParticipantId>,
    pub team: Option<TeamId>,
    pub position: Vec2,
    pub layer: Layer,
    pub alive: bool,
}

impl TargetInfo {
    pub fn of(combatant: &dyn Combatant) -> Self {
        Self {
            participant: Some(combatant.participant()),
            team: Some(combatant.team()),
            position: combatant.position(),
            layer: Layer::Hero,
            alive: combatant.is_alive(),
        }
    }

    pub fn ground(position: Vec2) -> Self {
        Self {
            participant: None,
            team: None,
            position,
            layer: Layer::Terrain,
            alive: true,
        }
    }
}

/// The world's obstruction test between two points
pub trait ObstructionQuery {
    fn is_obstructed(&self, from: Vec2, to: Vec2) -> bool;
}

/// Circular blockers on an otherwise open map
#[derive(Debug, Clone, Default)]
pub struct ObstacleMap {
    obstacles: Vec<(Vec2, f32)>,
}

impl ObstacleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The arena floor as declared in content
    pub fn from_config(obstacles: &[ObstacleConfig]) -> Self {
        Self {
            obstacles: obstacles.iter().map(|o| (o.center, o.radius)).collect(),
        }
    }

    pub fn with_obstacle(mut self, center: Vec2, radius: f32) -> Self {
        self.obstacles.push((center, radius));
        self
    }
}

impl ObstructionQuery for ObstacleMap {
    fn is_obstructed(&self, from: Vec2, to: Vec2) -> bool {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let length_sq = dx * dx + dy * dy;

        self.obstacles.iter().any(|(center, radius)| {
            // Closest point on the segment to the obstacle center
            let t = if length_sq > 0.0 {
                (((center.x - from.x) * dx + (center.y - from.y) * dy) / length_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let closest = Vec2::new(from.x + dx * t, from.y + dy * t);
            closest.distance(center) < *radius
        })
    }
}

/// Layer, liveness, range and team relation check for one cast
pub fn is_valid_target(
    ability: &AbilityDefinition,
    caster: &dyn Combatant,
    target: &TargetInfo,
) -> bool {
    if ability.range > 0.0 && caster.position().distance(&target.position) > ability.range {
        return false;
    }

    if ability.targeting == TargetingMode::Ground {
        return true;
    }

    if target.layer == Layer::Terrain || !target.alive {
        return false;
    }

    match ability.targeting {
        TargetingMode::SelfCast => target.participant == Some(caster.participant()),
        TargetingMode::Ally => target.team == Some(caster.team()),
        TargetingMode::Enemy => matches!(target.team, Some(team) if team != caster.team()),
        TargetingMode::Any | TargetingMode::Ground => true,
    }
}

pub fn has_line_of_sight(from: Vec2, to: Vec2, world: &dyn ObstructionQuery) -> bool {
    !world.is_obstructed(from, to)
}
