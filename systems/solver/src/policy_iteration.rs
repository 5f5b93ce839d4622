//! Policy iteration with capped iterative evaluation.

use beebot_core::Action;
use beebot_environment::Environment;
use beebot_system_state_space::StateSpace;

use crate::{greedy, max_change, q_value, sweep, Solution, SolverConfig, SolverError, SolverStatus};

/// Margin by which a challenger must beat the current action to replace it.
const IMPROVEMENT_MARGIN: f64 = 1e-9;

/// Step-wise policy-iteration driver over an explored state space.
#[derive(Clone, Debug)]
pub struct PolicyIteration {
    config: SolverConfig,
    space: StateSpace,
    values: Vec<f64>,
    policy: Vec<Action>,
    iterations: usize,
    residual: f64,
    stable: bool,
}

impl PolicyIteration {
    /// Explores the level and starts from an all-forward policy.
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
            policy: vec![Action::Forward; space.len()],
            space,
            iterations: 0,
            residual: f64::INFINITY,
            stable: false,
        })
    }

    /// Evaluates the current policy by repeated sweeps, stopping once the
    /// values settle within tolerance or the sweep cap is hit. Returns the
    /// last sweep's largest value change.
    pub fn evaluate(&mut self) -> f64 {
        let mut residual = f64::INFINITY;
        for _ in 0..self.config.max_evaluation_sweeps {
            let Self {
                config,
                space,
                values,
                policy,
                ..
            } = &*self;
            let next = sweep(space.len(), config.parallel, |index| {
                if space.is_terminal(index) {
                    0.0
                } else {
                    q_value(space, values, config.discount, index, policy[index])
                }
            });
            residual = max_change(&self.values, &next);
            self.values = next;
            if residual < self.config.tolerance {
                break;
            }
        }
        if residual >= self.config.tolerance {
            tracing::debug!(residual, "policy evaluation stopped at its sweep cap");
        }
        self.residual = residual;
        residual
    }

    /// Replaces each action with the greedy one when it is strictly better.
    /// Returns `true` when no action changed.
    pub fn improve(&mut self) -> bool {
        let Self {
            config,
            space,
            values,
            policy,
            ..
        } = &*self;
        let next = sweep(space.len(), config.parallel, |index| {
            let current = policy[index];
            if space.is_terminal(index) {
                return current;
            }
            let (best, best_value) = greedy(space, values, config.discount, index);
            let current_value = q_value(space, values, config.discount, index, current);
            if best_value > current_value + IMPROVEMENT_MARGIN {
                best
            } else {
                current
            }
        });
        let changed = self
            .policy
            .iter()
            .zip(&next)
            .filter(|(before, after)| before != after)
            .count();
        self.policy = next;
        self.stable = changed == 0;
        tracing::debug!(changed, "policy improvement");
        self.stable
    }

    /// Runs one evaluate-then-improve round. Returns `true` once the policy
    /// is stable and its evaluation settled within tolerance.
    pub fn iterate(&mut self) -> bool {
        let residual = self.evaluate();
        let stable = self.improve();
        self.iterations += 1;
        tracing::debug!(iteration = self.iterations, residual, stable, "policy iteration round");
        self.is_converged()
    }

    /// Reports whether the last improvement step left every action in place
    /// after an evaluation that settled within tolerance.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.stable && self.residual < self.config.tolerance
    }

    /// Largest value change in the most recent evaluation sweep.
    #[must_use]
    pub const fn residual(&self) -> f64 {
        self.residual
    }

    /// Rounds performed so far.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Current policy in state-index order.
    #[must_use]
    pub fn policy(&self) -> &[Action] {
        &self.policy
    }

    /// Rounds until the policy is stable and its values settled, or until the
    /// iteration cap is hit. A stable policy whose evaluation stopped at the
    /// sweep cap keeps being evaluated in further rounds.
    #[must_use]
    pub fn run(mut self) -> Solution {
        while !self.is_converged() && self.iterations < self.config.max_iterations {
            let _ = self.iterate();
        }
        let status = if self.is_converged() {
            tracing::info!(
                iterations = self.iterations,
                states = self.space.len(),
                "policy iteration converged"
            );
            SolverStatus::Converged {
                iterations: self.iterations,
            }
        } else {
            tracing::warn!(
                iterations = self.iterations,
                residual = self.residual,
                "policy iteration stopped at its iteration cap"
            );
            SolverStatus::NonConvergence {
                iterations: self.iterations,
                residual: self.residual,
            }
        };
        Solution {
            space: self.space,
            values: self.values,
            policy: self.policy,
            discount: self.config.discount,
            status,
        }
    }
}

/// Solves the level with policy iteration.
///
/// # Errors
///
/// Returns a [`SolverError`] if the configuration is out of range.
pub fn policy_iteration(
    environment: &Environment,
    config: &SolverConfig,
) -> Result<Solution, SolverError> {
    Ok(PolicyIteration::new(environment, config)?.run())
}
