#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tabular MDP solvers for BeeBot levels.
//!
//! Both solvers explore the level with [`StateSpace::explore`], then sweep
//! the compiled transition table with strictly double-buffered Bellman
//! backups: every sweep reads only the previous table and writes a fresh
//! one, so the per-state work runs in parallel through `rayon` without
//! changing results. Rewards are maximized; solved states are absorbing with
//! value zero.

mod policy_iteration;
mod value_iteration;

use beebot_core::{Action, GameState};
use beebot_environment::Environment;
use beebot_system_state_space::{StateSpace, Successor};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use policy_iteration::{policy_iteration, PolicyIteration};
pub use value_iteration::{value_iteration, ValueIteration};

/// Tuning knobs shared by both solvers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Discount factor applied to successor values, in `(0, 1]`.
    pub discount: f64,
    /// Largest value change accepted as converged.
    pub tolerance: f64,
    /// Cap on value-iteration sweeps or policy-iteration rounds.
    pub max_iterations: usize,
    /// Cap on evaluation sweeps within one policy-iteration round.
    pub max_evaluation_sweeps: usize,
    /// Cap on the number of explored states.
    pub max_states: usize,
    /// Spread each sweep across the rayon thread pool.
    pub parallel: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            discount: 0.99,
            tolerance: 1e-4,
            max_iterations: 1_000,
            max_evaluation_sweeps: 100,
            max_states: 10_000,
            parallel: true,
        }
    }
}

impl SolverConfig {
    /// Default configuration using the discount and tolerance the level suggests.
    #[must_use]
    pub fn for_environment(environment: &Environment) -> Self {
        Self {
            discount: environment.discount(),
            tolerance: environment.tolerance(),
            ..Self::default()
        }
    }

    /// Checks that every parameter lies in its valid range.
    ///
    /// # Errors
    ///
    /// Returns the first [`SolverError`] found.
    pub fn validate(&self) -> Result<(), SolverError> {
        if !(self.discount > 0.0 && self.discount <= 1.0) {
            return Err(SolverError::InvalidDiscount(self.discount));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(SolverError::InvalidTolerance(self.tolerance));
        }
        if self.max_iterations == 0 {
            return Err(SolverError::ZeroCap("max_iterations"));
        }
        if self.max_evaluation_sweeps == 0 {
            return Err(SolverError::ZeroCap("max_evaluation_sweeps"));
        }
        if self.max_states == 0 {
            return Err(SolverError::ZeroCap("max_states"));
        }
        Ok(())
    }
}

/// Reasons a solver refuses to start.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SolverError {
    /// The discount factor lies outside `(0, 1]`.
    #[error("discount must lie in (0, 1], got {0}")]
    InvalidDiscount(f64),
    /// The tolerance is not a positive finite number.
    #[error("tolerance must be a positive finite number, got {0}")]
    InvalidTolerance(f64),
    /// An iteration or state cap is zero.
    #[error("{0} must be greater than zero")]
    ZeroCap(&'static str),
}

/// Terminal status of a solver run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SolverStatus {
    /// The convergence test passed.
    Converged {
        /// Sweeps or rounds performed.
        iterations: usize,
    },
    /// The iteration cap was reached first.
    NonConvergence {
        /// Sweeps or rounds performed.
        iterations: usize,
        /// Largest value change in the final sweep.
        residual: f64,
    },
}

impl SolverStatus {
    /// Number of sweeps or rounds performed.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        match self {
            Self::Converged { iterations } | Self::NonConvergence { iterations, .. } => *iterations,
        }
    }
}

/// Value function and policy produced by a solver.
#[derive(Clone, Debug)]
pub struct Solution {
    space: StateSpace,
    values: Vec<f64>,
    policy: Vec<Action>,
    discount: f64,
    status: SolverStatus,
}

impl Solution {
    /// Value of the state; zero for states outside the explored space.
    #[must_use]
    pub fn value(&self, state: &GameState) -> f64 {
        self.space
            .index_of(state)
            .map_or(0.0, |index| self.values[index])
    }

    /// Policy action for the state; [`Action::Forward`] outside the explored space.
    #[must_use]
    pub fn action(&self, state: &GameState) -> Action {
        self.space
            .index_of(state)
            .map_or(Action::Forward, |index| self.policy[index])
    }

    /// Expected discounted return of taking `action` in `state` and then
    /// following this solution's values.
    #[must_use]
    pub fn expected_return(&self, state: &GameState, action: Action) -> Option<f64> {
        let index = self.space.index_of(state)?;
        if self.space.is_terminal(index) {
            return Some(0.0);
        }
        Some(q_value(&self.space, &self.values, self.discount, index, action))
    }

    /// Terminal status of the run.
    #[must_use]
    pub const fn status(&self) -> SolverStatus {
        self.status
    }

    /// Reports whether the run met its convergence test.
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        matches!(self.status, SolverStatus::Converged { .. })
    }

    /// Explored state space the solution is indexed by.
    #[must_use]
    pub const fn space(&self) -> &StateSpace {
        &self.space
    }

    /// Values in state-index order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Policy actions in state-index order.
    #[must_use]
    pub fn policy(&self) -> &[Action] {
        &self.policy
    }
}

fn successor_value(values: &[f64], successor: Successor) -> f64 {
    match successor {
        Successor::Explored(index) => values[index],
        Successor::Unexplored => 0.0,
    }
}

/// Expected reward plus discounted successor value of one action.
fn q_value(space: &StateSpace, values: &[f64], discount: f64, index: usize, action: Action) -> f64 {
    space
        .branches(index, action)
        .iter()
        .map(|branch| {
            let future = discount * successor_value(values, branch.successor);
            branch.probability * (branch.reward + future)
        })
        .sum()
}

/// Best action and its value; earlier actions in [`Action::ALL`] win ties.
fn greedy(space: &StateSpace, values: &[f64], discount: f64, index: usize) -> (Action, f64) {
    let mut best = (Action::Forward, f64::NEG_INFINITY);
    for action in Action::ALL {
        let value = q_value(space, values, discount, index, action);
        if value > best.1 {
            best = (action, value);
        }
    }
    best
}

/// Evaluates `backup` for every state index, in parallel when requested.
fn sweep<T, F>(len: usize, parallel: bool, backup: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    if parallel {
        (0..len).into_par_iter().map(backup).collect()
    } else {
        (0..len).map(backup).collect()
    }
}

fn max_change(old: &[f64], new: &[f64]) -> f64 {
    old.iter()
        .zip(new)
        .map(|(before, after)| (before - after).abs())
        .fold(0.0, f64::max)
}
