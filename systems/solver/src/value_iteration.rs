//! Synchronous value iteration.

use beebot_core::Action;
use beebot_environment::Environment;
use beebot_system_state_space::StateSpace;

use crate::{greedy, max_change, sweep, Solution, SolverConfig, SolverError, SolverStatus};

/// Step-wise value-iteration driver over an explored state space.
#[derive(Clone, Debug)]
pub struct ValueIteration {
    config: SolverConfig,
    space: StateSpace,
    values: Vec<f64>,
    iterations: usize,
    residual: f64,
}

impl ValueIteration {
    /// Explores the level and prepares an all-zero value table.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if the configuration is out of range.
    pub fn new(environment: &Environment, config: &SolverConfig) -> Result<Self, SolverError> {
        config.validate()?;
        let space = StateSpace::explore(environment, config.max_states);
        Ok(Self {
            config: *config,
            values: vec![0.0; space.len()],
            space,
            iterations: 0,
            residual: f64::INFINITY,
        })
    }

    /// Performs one full Bellman optimality sweep and returns the largest
    /// value change.
    pub fn iterate(&mut self) -> f64 {
        let Self { config, space, values, .. } = &*self;
        let next = sweep(space.len(), config.parallel, |index| {
            if space.is_terminal(index) {
                0.0
            } else {
                greedy(space, values, config.discount, index).1
            }
        });
        self.residual = max_change(&self.values, &next);
        self.values = next;
        self.iterations += 1;
        tracing::debug!(
            iteration = self.iterations,
            residual = self.residual,
            "value iteration sweep"
        );
        self.residual
    }

    /// Reports whether the last sweep changed no value by `tolerance` or more.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.residual < self.config.tolerance
    }

    /// Sweeps performed so far.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Current value table in state-index order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Sweeps until convergence or the iteration cap, then extracts the
    /// greedy policy.
    #[must_use]
    pub fn run(mut self) -> Solution {
        while !self.is_converged() && self.iterations < self.config.max_iterations {
            let _ = self.iterate();
        }
        let status = if self.is_converged() {
            tracing::info!(
                iterations = self.iterations,
                states = self.space.len(),
                "value iteration converged"
            );
            SolverStatus::Converged {
                iterations: self.iterations,
            }
        } else {
            tracing::warn!(
                iterations = self.iterations,
                residual = self.residual,
                "value iteration stopped at its iteration cap"
            );
            SolverStatus::NonConvergence {
                iterations: self.iterations,
                residual: self.residual,
            }
        };
        self.into_solution(status)
    }

    fn into_solution(self, status: SolverStatus) -> Solution {
        let Self { config, space, values, .. } = self;
        let policy = sweep(space.len(), config.parallel, |index| {
            if space.is_terminal(index) {
                Action::Forward
            } else {
                greedy(&space, &values, config.discount, index).0
            }
        });
        Solution {
            space,
            values,
            policy,
            discount: config.discount,
            status,
        }
    }
}

/// Solves the level with value iteration.
///
/// # Errors
///
/// Returns a [`SolverError`] if the configuration is out of range.
pub fn value_iteration(
    environment: &Environment,
    config: &SolverConfig,
) -> Result<Solution, SolverError> {
    Ok(ValueIteration::new(environment, config)?.run())
}
