//! Match rules chosen at server startup

use crate::selection::SelectionRules;
use shared::READY_GRACE_SECONDS;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Hero selection phase length in seconds
    pub selection_duration: f32,
    pub unique_picks: bool,
    pub randomize_if_unselected: bool,
    /// Used for teams that do not set their own `max_players`
    pub max_team_size: usize,
    pub auto_balance_teams: bool,
    pub ready_grace: f32,
    /// Seed for hero substitution; entropy when absent
    pub rng_seed: Option<u64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            selection_duration: 60.0,
            unique_picks: true,
            randomize_if_unselected: true,
            max_team_size: 5,
            auto_balance_teams: true,
            ready_grace: READY_GRACE_SECONDS,
            rng_seed: None,
        }
    }
}

impl MatchConfig {
    pub fn selection_rules(&self) -> SelectionRules {
        SelectionRules {
            unique_picks: self.unique_picks,
            randomize_if_unselected: self.randomize_if_unselected,
            ready_grace: self.ready_grace,
        }
    }
}
