#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Immutable level data and the stochastic transition model for BeeBot.
//!
//! A [`LevelDefinition`] is validated once by [`load_environment`] into an
//! [`Environment`]. The environment never changes afterwards; callers feed
//! [`GameState`] values through [`apply`] to obtain explicit outcome
//! distributions, or through [`step`] to resolve a single primitive action.

mod definition;
mod sampling;
mod transition;

use beebot_core::{Action, ActionTable, CellCoord, GameState, HexGrid};
use serde::{Deserialize, Serialize};

pub use definition::{
    load_environment, ActionParameters, ActionSettings, DefinitionError, LevelDefinition,
    WidgetPlacement,
};
pub use sampling::sample_outcome;
pub use transition::{apply, step, CollisionKind, Outcome, OutcomeDistribution, Step};

/// Static contents of a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Terrain {
    /// Open cell.
    Free,
    /// Impassable cell.
    Obstacle,
    /// Impassable cell with a heavier collision penalty.
    Thorn,
}

impl Terrain {
    const fn label(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Obstacle => "obstacle",
            Self::Thorn => "thorn",
        }
    }
}

/// Rule used to fold the rewards of every primitive step executed by one
/// noisy action into a single reward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RewardAggregation {
    /// Report the most negative primitive reward.
    #[default]
    Minimum,
    /// Report the sum of all primitive rewards.
    Sum,
}

impl RewardAggregation {
    /// Folds one more primitive reward into the running total.
    #[must_use]
    pub fn combine(self, total: Option<f64>, reward: f64) -> f64 {
        match (self, total) {
            (_, None) => reward,
            (Self::Minimum, Some(total)) => total.min(reward),
            (Self::Sum, Some(total)) => total + reward,
        }
    }
}

/// Validated, immutable level data.
#[derive(Clone, Debug)]
pub struct Environment {
    grid: HexGrid,
    terrain: Vec<Terrain>,
    targets: Vec<CellCoord>,
    initial: GameState,
    actions: ActionTable<ActionSettings>,
    obstacle_penalty: f64,
    thorn_penalty: f64,
    discount: f64,
    tolerance: f64,
    reward_aggregation: RewardAggregation,
}

impl Environment {
    /// Dimensions of the hex grid.
    #[must_use]
    pub const fn grid(&self) -> &HexGrid {
        &self.grid
    }

    /// Static contents of the cell, or `None` outside the grid.
    #[must_use]
    pub fn terrain(&self, cell: CellCoord) -> Option<Terrain> {
        self.grid.index(cell).map(|index| self.terrain[index])
    }

    /// Distinct target cells in ascending order.
    #[must_use]
    pub fn targets(&self) -> &[CellCoord] {
        &self.targets
    }

    /// Starting state of the level.
    #[must_use]
    pub const fn initial_state(&self) -> &GameState {
        &self.initial
    }

    /// Cost and noise parameters of the provided action.
    #[must_use]
    pub const fn action(&self, action: Action) -> ActionSettings {
        self.actions.get(action)
    }

    /// Penalty magnitude for the boundary, obstacles, widgets and invalid pulls.
    #[must_use]
    pub const fn obstacle_penalty(&self) -> f64 {
        self.obstacle_penalty
    }

    /// Penalty magnitude for thorns.
    #[must_use]
    pub const fn thorn_penalty(&self) -> f64 {
        self.thorn_penalty
    }

    /// Discount factor the level suggests for solving.
    #[must_use]
    pub const fn discount(&self) -> f64 {
        self.discount
    }

    /// Convergence tolerance the level suggests for solving.
    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Rule folding the rewards of multi-step outcomes.
    #[must_use]
    pub const fn reward_aggregation(&self) -> RewardAggregation {
        self.reward_aggregation
    }
}

/// Query functions that provide read-only access to level progress.
pub mod query {
    use std::collections::HashSet;

    use beebot_core::{CellCoord, GameState};

    use super::Environment;

    /// Starting state of the level.
    #[must_use]
    pub fn initial_state(environment: &Environment) -> GameState {
        environment.initial_state().clone()
    }

    /// Union of all cells covered by the state's widgets.
    #[must_use]
    pub fn covered_cells(environment: &Environment, state: &GameState) -> HashSet<CellCoord> {
        state
            .widgets()
            .iter()
            .filter_map(|widget| widget.occupied_cells(environment.grid()))
            .flatten()
            .collect()
    }

    /// Reports whether every target is covered by some widget cell.
    #[must_use]
    pub fn is_solved(environment: &Environment, state: &GameState) -> bool {
        let covered = covered_cells(environment, state);
        environment.targets().iter().all(|target| covered.contains(target))
    }

    /// Number of targets not yet covered by any widget cell.
    #[must_use]
    pub fn uncovered_targets(environment: &Environment, state: &GameState) -> usize {
        let covered = covered_cells(environment, state);
        environment
            .targets()
            .iter()
            .filter(|target| !covered.contains(target))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::RewardAggregation;

    #[test]
    fn minimum_aggregation_keeps_worst_reward() {
        let folded = [-1.0, -10.0, -0.1]
            .into_iter()
            .fold(None, |total, reward| Some(RewardAggregation::Minimum.combine(total, reward)));
        assert_eq!(folded, Some(-10.0));
    }

    #[test]
    fn sum_aggregation_accumulates_rewards() {
        let folded = [-1.0, -0.5]
            .into_iter()
            .fold(None, |total, reward| Some(RewardAggregation::Sum.combine(total, reward)));
        assert_eq!(folded, Some(-1.5));
    }
}
