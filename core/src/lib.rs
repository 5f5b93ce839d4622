#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the BeeBot engine.
//!
//! This crate defines the value types that connect the environment, the
//! state-space enumeration and the solvers: hex cells and orientations,
//! widget shapes, the four bee actions and the [`GameState`] used as the key
//! of every value and policy table. Everything here is an immutable value
//! with structural equality and hashing.

mod hex;
mod widget;

use serde::{Deserialize, Serialize};

pub use hex::{CellCoord, HexGrid, Orientation};
pub use widget::{Spin, WidgetFacing, WidgetState, WidgetType};

/// Actions the bee may select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    /// Move one cell along the current heading, pushing any widget ahead.
    Forward,
    /// Move one cell against the current heading, pulling any widget ahead.
    Reverse,
    /// Turn one step counterclockwise in place.
    SpinLeft,
    /// Turn one step clockwise in place.
    SpinRight,
}

impl Action {
    /// Every action, ordered by tie-break priority.
    pub const ALL: [Action; 4] = [Self::Forward, Self::Reverse, Self::SpinLeft, Self::SpinRight];

    /// Dense index of the action in `0..4`, matching [`Action::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Forward => 0,
            Self::Reverse => 1,
            Self::SpinLeft => 2,
            Self::SpinRight => 3,
        }
    }
}

/// Fixed-size lookup table holding one value per [`Action`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionTable<T> {
    values: [T; 4],
}

impl<T: Copy> ActionTable<T> {
    /// Creates a table from values listed in [`Action::ALL`] order.
    #[must_use]
    pub const fn new(forward: T, reverse: T, spin_left: T, spin_right: T) -> Self {
        Self {
            values: [forward, reverse, spin_left, spin_right],
        }
    }

    /// Value recorded for the provided action.
    #[must_use]
    pub const fn get(&self, action: Action) -> T {
        self.values[action.index()]
    }

    /// Iterator over `(action, value)` pairs in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (Action, T)> + '_ {
        Action::ALL.into_iter().map(|action| (action, self.get(action)))
    }
}

/// Position and heading of the bee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeeState {
    /// Cell occupied by the bee.
    pub cell: CellCoord,
    /// Direction the bee faces.
    pub orientation: Orientation,
}

impl BeeState {
    /// Creates a new bee placement.
    #[must_use]
    pub const fn new(cell: CellCoord, orientation: Orientation) -> Self {
        Self { cell, orientation }
    }
}

/// Complete configuration of a level at one instant.
///
/// Widget identity is the position in [`GameState::widgets`], fixed for the
/// level. Equality and hashing respect each widget's rotational symmetry
/// because [`WidgetState`] stores canonical orientations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameState {
    bee: BeeState,
    widgets: Vec<WidgetState>,
}

impl GameState {
    /// Creates a state from a bee placement and the ordered widget placements.
    #[must_use]
    pub fn new(bee: BeeState, widgets: Vec<WidgetState>) -> Self {
        Self { bee, widgets }
    }

    /// Placement of the bee.
    #[must_use]
    pub const fn bee(&self) -> BeeState {
        self.bee
    }

    /// Widget placements in level order.
    #[must_use]
    pub fn widgets(&self) -> &[WidgetState] {
        &self.widgets
    }

    /// Copy of the state with the bee replaced.
    #[must_use]
    pub fn with_bee(&self, bee: BeeState) -> Self {
        Self {
            bee,
            widgets: self.widgets.clone(),
        }
    }

    /// Copy of the state with the bee and one widget replaced.
    ///
    /// Indices outside the widget list leave the widgets untouched.
    #[must_use]
    pub fn with_bee_and_widget(&self, bee: BeeState, index: usize, widget: WidgetState) -> Self {
        let mut widgets = self.widgets.clone();
        if let Some(slot) = widgets.get_mut(index) {
            *slot = widget;
        }
        Self { bee, widgets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_table_indexes_by_action() {
        let table = ActionTable::new(1.0, 9.0, 3.0, 4.0);
        assert_eq!(table.get(Action::SpinLeft), 3.0);
        let collected: Vec<_> = table.iter().collect();
        assert_eq!(
            collected,
            vec![
                (Action::Forward, 1.0),
                (Action::Reverse, 9.0),
                (Action::SpinLeft, 3.0),
                (Action::SpinRight, 4.0),
            ]
        );
    }

    #[test]
    fn symmetric_widget_orientations_give_equal_states() {
        let bee = BeeState::new(CellCoord::new(0, 0), Orientation::Down);
        let a = GameState::new(
            bee,
            vec![WidgetState::new(WidgetType::Widget4, CellCoord::new(2, 2), Orientation::UpRight)],
        );
        let b = GameState::new(
            bee,
            vec![WidgetState::new(WidgetType::Widget4, CellCoord::new(2, 2), Orientation::Down)],
        );
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        assert!(set.insert(a));
        assert!(!set.insert(b));
    }

    #[test]
    fn game_state_round_trips_through_bincode() {
        let state = GameState::new(
            BeeState::new(CellCoord::new(1, 2), Orientation::UpLeft),
            vec![WidgetState::new(
                WidgetType::Widget3,
                CellCoord::new(3, 3),
                Orientation::DownRight,
            )],
        );
        let bytes = bincode::serialize(&state).expect("serialize");
        let restored: GameState = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, state);
    }

    #[test]
    fn with_bee_and_widget_replaces_only_the_indexed_widget() {
        let bee = BeeState::new(CellCoord::new(0, 0), Orientation::Up);
        let first = WidgetState::new(WidgetType::Widget3, CellCoord::new(2, 1), Orientation::Up);
        let second = WidgetState::new(WidgetType::Widget5, CellCoord::new(2, 4), Orientation::Up);
        let state = GameState::new(bee, vec![first, second]);
        let moved = first.spun(Spin::Clockwise);
        let bee = BeeState::new(CellCoord::new(1, 0), Orientation::Up);
        let next = state.with_bee_and_widget(bee, 0, moved);
        assert_eq!(next.widgets(), &[moved, second]);
        assert_eq!(next.bee().cell, CellCoord::new(1, 0));
    }
}
