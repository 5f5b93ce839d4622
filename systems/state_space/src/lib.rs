#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Enumeration of the states reachable from a level's starting configuration.
//!
//! Exploration is a breadth-first closure over all four actions. Every
//! discovered state receives a stable index in discovery order, and the
//! outcome distribution of each `(state, action)` pair is compiled into a
//! table of index-addressed branches so solvers never call the transition
//! model inside their sweeps. Solved states are absorbing and are not
//! expanded.

use std::collections::{HashMap, VecDeque};

use beebot_core::{Action, GameState};
use beebot_environment::{apply, query, Environment};

/// Where a compiled branch leads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Successor {
    /// An indexed state inside the explored space.
    Explored(usize),
    /// A state beyond the exploration cap; solvers value it at zero.
    Unexplored,
}

/// One outcome of a `(state, action)` pair, addressed by state index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Branch {
    /// Destination of the branch.
    pub successor: Successor,
    /// Probability of the branch.
    pub probability: f64,
    /// Reward collected on the branch.
    pub reward: f64,
}

/// Explored states with stable indices and compiled transitions.
#[derive(Clone, Debug, Default)]
pub struct StateSpace {
    states: Vec<GameState>,
    lookup: HashMap<GameState, usize>,
    terminal: Vec<bool>,
    transitions: Vec<[Vec<Branch>; 4]>,
    truncated: bool,
}

impl StateSpace {
    /// Explores every state reachable from the environment's starting state.
    ///
    /// At most `max_states` states are admitted; branches leading past the
    /// cap are recorded as [`Successor::Unexplored`].
    #[must_use]
    pub fn explore(environment: &Environment, max_states: usize) -> Self {
        let mut space = Self::default();
        let mut frontier = VecDeque::new();
        if max_states > 0 {
            frontier.push_back(space.admit(environment, environment.initial_state().clone()));
        }

        while let Some(index) = frontier.pop_front() {
            if space.terminal[index] {
                continue;
            }
            let state = space.states[index].clone();
            let mut rows: [Vec<Branch>; 4] = Default::default();
            for action in Action::ALL {
                for outcome in apply(environment, &state, action).into_vec() {
                    let successor = match space.lookup.get(&outcome.state) {
                        Some(&known) => Successor::Explored(known),
                        None if space.states.len() < max_states => {
                            let admitted = space.admit(environment, outcome.state);
                            frontier.push_back(admitted);
                            Successor::Explored(admitted)
                        }
                        None => {
                            space.truncated = true;
                            Successor::Unexplored
                        }
                    };
                    rows[action.index()].push(Branch {
                        successor,
                        probability: outcome.probability,
                        reward: outcome.reward,
                    });
                }
            }
            space.transitions[index] = rows;
        }

        if space.truncated {
            tracing::warn!(
                max_states,
                "state exploration reached its cap; unexplored states are valued at zero"
            );
        }
        tracing::debug!(
            states = space.len(),
            terminal = space.terminal_count(),
            "explored state space"
        );
        space
    }

    fn admit(&mut self, environment: &Environment, state: GameState) -> usize {
        let index = self.states.len();
        self.terminal.push(query::is_solved(environment, &state));
        self.transitions.push(Default::default());
        let _ = self.lookup.insert(state.clone(), index);
        self.states.push(state);
        index
    }

    /// Number of explored states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Reports whether nothing was explored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Explored states in index order. The starting state has index zero.
    #[must_use]
    pub fn states(&self) -> &[GameState] {
        &self.states
    }

    /// State stored at the provided index.
    #[must_use]
    pub fn state(&self, index: usize) -> Option<&GameState> {
        self.states.get(index)
    }

    /// Index assigned to the provided state, if it was explored.
    #[must_use]
    pub fn index_of(&self, state: &GameState) -> Option<usize> {
        self.lookup.get(state).copied()
    }

    /// Reports whether the indexed state is solved.
    #[must_use]
    pub fn is_terminal(&self, index: usize) -> bool {
        self.terminal.get(index).copied().unwrap_or(false)
    }

    /// Number of solved states.
    #[must_use]
    pub fn terminal_count(&self) -> usize {
        self.terminal.iter().filter(|&&terminal| terminal).count()
    }

    /// Compiled branches of the indexed state under the provided action.
    ///
    /// Terminal states have no branches.
    #[must_use]
    pub fn branches(&self, index: usize, action: Action) -> &[Branch] {
        self.transitions
            .get(index)
            .map(|rows| rows[action.index()].as_slice())
            .unwrap_or(&[])
    }

    /// Reports whether exploration stopped at its cap.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}
