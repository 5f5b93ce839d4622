//! Level definitions and the validation that turns them into an [`Environment`].

use beebot_core::{
    Action, ActionTable, BeeState, CellCoord, GameState, HexGrid, WidgetFacing, WidgetState,
    WidgetType,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Environment, RewardAggregation, Terrain};

const PROBABILITY_SLACK: f64 = 1e-12;

/// Raw level data as produced by a level-file parser or a configuration file.
///
/// A definition is inert until [`load_environment`] validates it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelDefinition {
    /// Number of rows in the hex grid.
    pub rows: u32,
    /// Number of columns in the hex grid.
    pub columns: u32,
    /// Cells the bee and widgets can never enter.
    #[serde(default)]
    pub obstacles: Vec<CellCoord>,
    /// Cells that punish any attempt to enter them more harshly than obstacles.
    #[serde(default)]
    pub thorns: Vec<CellCoord>,
    /// Cells that must all be covered by widgets to solve the level.
    pub targets: Vec<CellCoord>,
    /// Starting placement of the bee.
    pub bee: BeeState,
    /// Widget types and starting placements, in identity order.
    pub widgets: Vec<WidgetPlacement>,
    /// Cost and noise parameters for every action.
    #[serde(default)]
    pub actions: ActionParameters,
    /// Magnitude of the penalty for hitting the boundary, an obstacle or a widget.
    #[serde(default = "default_obstacle_penalty")]
    pub obstacle_penalty: f64,
    /// Magnitude of the penalty for hitting a thorn.
    #[serde(default = "default_thorn_penalty")]
    pub thorn_penalty: f64,
    /// Discount factor suggested for solving the level.
    #[serde(default = "default_discount")]
    pub discount: f64,
    /// Convergence tolerance suggested for solving the level.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// How rewards of a multi-step outcome are folded together.
    #[serde(default)]
    pub reward_aggregation: RewardAggregation,
}

fn default_obstacle_penalty() -> f64 {
    10.0
}

fn default_thorn_penalty() -> f64 {
    20.0
}

fn default_discount() -> f64 {
    0.99
}

fn default_tolerance() -> f64 {
    1e-4
}

/// Type and starting placement of one widget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetPlacement {
    /// Shape family of the widget.
    pub kind: WidgetType,
    /// Cell the widget rotates around.
    pub center: CellCoord,
    /// Named facing of the widget.
    pub facing: WidgetFacing,
}

/// Cost and noise parameters attached to one action.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ActionSettings {
    /// Cost paid whenever the action completes.
    pub base_cost: f64,
    /// Extra cost paid when the action pushes or pulls a widget.
    pub push_cost: f64,
    /// Probability of an unintended clockwise turn before the action.
    pub drift_cw: f64,
    /// Probability of an unintended counterclockwise turn before the action.
    pub drift_ccw: f64,
    /// Probability that the action is performed twice.
    pub double_move: f64,
}

impl ActionSettings {
    /// Noise-free settings with the provided costs.
    #[must_use]
    pub const fn with_costs(base_cost: f64, push_cost: f64) -> Self {
        Self {
            base_cost,
            push_cost,
            drift_cw: 0.0,
            drift_ccw: 0.0,
            double_move: 0.0,
        }
    }

    /// Probability that no drift happens.
    ///
    /// Residue below the probability slack left by the subtraction counts as zero.
    #[must_use]
    pub fn no_drift(&self) -> f64 {
        settled(1.0 - self.drift_cw - self.drift_ccw)
    }

    /// Probability that the action is performed exactly once.
    #[must_use]
    pub fn single_move(&self) -> f64 {
        settled(1.0 - self.double_move)
    }
}

fn settled(probability: f64) -> f64 {
    if probability <= PROBABILITY_SLACK {
        0.0
    } else {
        probability
    }
}

/// One `[actions.<name>]` table as written in a level file; omitted keys
/// fall back to that action's defaults.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActionOverrides {
    base_cost: Option<f64>,
    push_cost: Option<f64>,
    drift_cw: Option<f64>,
    drift_ccw: Option<f64>,
    double_move: Option<f64>,
}

impl ActionOverrides {
    fn over(self, defaults: ActionSettings) -> ActionSettings {
        ActionSettings {
            base_cost: self.base_cost.unwrap_or(defaults.base_cost),
            push_cost: self.push_cost.unwrap_or(defaults.push_cost),
            drift_cw: self.drift_cw.unwrap_or(defaults.drift_cw),
            drift_ccw: self.drift_ccw.unwrap_or(defaults.drift_ccw),
            double_move: self.double_move.unwrap_or(defaults.double_move),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActionSections {
    #[serde(default)]
    forward: ActionOverrides,
    #[serde(default)]
    reverse: ActionOverrides,
    #[serde(default)]
    spin_left: ActionOverrides,
    #[serde(default)]
    spin_right: ActionOverrides,
}

/// Per-action parameter sections of a level definition.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "ActionSections")]
pub struct ActionParameters {
    /// Parameters of [`Action::Forward`].
    pub forward: ActionSettings,
    /// Parameters of [`Action::Reverse`].
    pub reverse: ActionSettings,
    /// Parameters of [`Action::SpinLeft`].
    pub spin_left: ActionSettings,
    /// Parameters of [`Action::SpinRight`].
    pub spin_right: ActionSettings,
}

impl ActionParameters {
    /// Settings rearranged into a lookup table keyed by action.
    #[must_use]
    pub const fn to_table(&self) -> ActionTable<ActionSettings> {
        ActionTable::new(self.forward, self.reverse, self.spin_left, self.spin_right)
    }
}

impl Default for ActionParameters {
    fn default() -> Self {
        Self {
            forward: ActionSettings::with_costs(1.0, 0.8),
            reverse: ActionSettings::with_costs(1.0, 0.5),
            spin_left: ActionSettings::with_costs(0.1, 0.0),
            spin_right: ActionSettings::with_costs(0.11, 0.0),
        }
    }
}

impl From<ActionSections> for ActionParameters {
    fn from(sections: ActionSections) -> Self {
        let defaults = Self::default();
        Self {
            forward: sections.forward.over(defaults.forward),
            reverse: sections.reverse.over(defaults.reverse),
            spin_left: sections.spin_left.over(defaults.spin_left),
            spin_right: sections.spin_right.over(defaults.spin_right),
        }
    }
}

/// Reasons a level definition is rejected.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DefinitionError {
    /// The grid has no cells.
    #[error("grid must have at least one row and one column, got {rows}x{columns}")]
    EmptyGrid {
        /// Requested number of rows.
        rows: u32,
        /// Requested number of columns.
        columns: u32,
    },
    /// A listed cell lies outside the grid.
    #[error("{role} cell {cell:?} lies outside the grid")]
    CellOutOfBounds {
        /// List the cell came from.
        role: &'static str,
        /// Offending cell.
        cell: CellCoord,
    },
    /// A cell was given two incompatible roles.
    #[error("cell {cell:?} is listed as both {first} and {second}")]
    ConflictingTerrain {
        /// Offending cell.
        cell: CellCoord,
        /// First role of the cell.
        first: &'static str,
        /// Second role of the cell.
        second: &'static str,
    },
    /// The bee starts outside the grid or on an obstacle or thorn.
    #[error("bee cannot start on {cell:?}")]
    BeeBlocked {
        /// Starting cell of the bee.
        cell: CellCoord,
    },
    /// A widget was given a facing its type cannot take.
    #[error("widget {index} of type {kind:?} has no {facing:?} facing")]
    UnsupportedFacing {
        /// Position of the widget in the definition.
        index: usize,
        /// Type of the widget.
        kind: WidgetType,
        /// Requested facing.
        facing: WidgetFacing,
    },
    /// A widget starts partly outside the grid, on blocked terrain, or on another entity.
    #[error("widget {index} cannot be placed at {center:?}")]
    WidgetBlocked {
        /// Position of the widget in the definition.
        index: usize,
        /// Requested center of the widget.
        center: CellCoord,
    },
    /// There are more targets than widget cells to cover them.
    #[error("{targets} targets cannot be covered by {widget_cells} widget cells")]
    TooManyTargets {
        /// Number of distinct targets.
        targets: usize,
        /// Total number of cells across all widgets.
        widget_cells: usize,
    },
    /// A cost is negative or not finite.
    #[error("{action:?} {name} must be a finite non-negative number, got {value}")]
    InvalidCost {
        /// Action the cost belongs to.
        action: Action,
        /// Name of the cost field.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// A probability lies outside `[0, 1]`.
    #[error("{action:?} {name} must lie in [0, 1], got {value}")]
    ProbabilityOutOfRange {
        /// Action the probability belongs to.
        action: Action,
        /// Name of the probability field.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// Clockwise and counterclockwise drift together exceed certainty.
    #[error("{action:?} drift probabilities sum to {total}, which exceeds 1")]
    DriftProbabilityOverflow {
        /// Action the probabilities belong to.
        action: Action,
        /// Sum of both drift probabilities.
        total: f64,
    },
    /// A collision penalty is negative or not finite.
    #[error("{name} must be a finite non-negative number, got {value}")]
    InvalidPenalty {
        /// Name of the penalty field.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// The discount factor lies outside `(0, 1]`.
    #[error("discount must lie in (0, 1], got {0}")]
    InvalidDiscount(f64),
    /// The tolerance is not a positive finite number.
    #[error("tolerance must be a positive finite number, got {0}")]
    InvalidTolerance(f64),
}

/// Validates level data and builds the immutable [`Environment`].
///
/// # Errors
///
/// Returns a [`DefinitionError`] describing the first malformed part of the
/// definition.
pub fn load_environment(definition: &LevelDefinition) -> Result<Environment, DefinitionError> {
    if definition.rows == 0 || definition.columns == 0 {
        return Err(DefinitionError::EmptyGrid {
            rows: definition.rows,
            columns: definition.columns,
        });
    }
    let grid = HexGrid::new(definition.rows, definition.columns);

    let mut terrain = vec![Terrain::Free; grid.cell_count()];
    mark_terrain(&grid, &mut terrain, &definition.obstacles, Terrain::Obstacle, "obstacle")?;
    mark_terrain(&grid, &mut terrain, &definition.thorns, Terrain::Thorn, "thorn")?;

    let mut targets = definition.targets.clone();
    targets.sort_unstable();
    targets.dedup();
    for &cell in &targets {
        match grid.index(cell).map(|index| terrain[index]) {
            None => return Err(DefinitionError::CellOutOfBounds { role: "target", cell }),
            Some(Terrain::Free) => {}
            Some(other) => {
                return Err(DefinitionError::ConflictingTerrain {
                    cell,
                    first: other.label(),
                    second: "target",
                })
            }
        }
    }

    let actions = definition.actions.to_table();
    for (action, settings) in actions.iter() {
        validate_action(action, &settings)?;
    }
    validate_penalty("obstacle_penalty", definition.obstacle_penalty)?;
    validate_penalty("thorn_penalty", definition.thorn_penalty)?;
    if !(definition.discount > 0.0 && definition.discount <= 1.0) {
        return Err(DefinitionError::InvalidDiscount(definition.discount));
    }
    if !(definition.tolerance.is_finite() && definition.tolerance > 0.0) {
        return Err(DefinitionError::InvalidTolerance(definition.tolerance));
    }

    let bee = definition.bee;
    if grid.index(bee.cell).map_or(true, |index| terrain[index] != Terrain::Free) {
        return Err(DefinitionError::BeeBlocked { cell: bee.cell });
    }

    let mut claimed = vec![false; grid.cell_count()];
    if let Some(index) = grid.index(bee.cell) {
        claimed[index] = true;
    }
    let mut widgets = Vec::with_capacity(definition.widgets.len());
    for (index, placement) in definition.widgets.iter().enumerate() {
        let orientation = placement.kind.orientation_of(placement.facing).ok_or(
            DefinitionError::UnsupportedFacing {
                index,
                kind: placement.kind,
                facing: placement.facing,
            },
        )?;
        let widget = WidgetState::new(placement.kind, placement.center, orientation);
        let blocked = DefinitionError::WidgetBlocked {
            index,
            center: placement.center,
        };
        let cells = widget.occupied_cells(&grid).ok_or_else(|| blocked.clone())?;
        for cell in cells {
            let Some(slot) = grid.index(cell) else {
                return Err(blocked);
            };
            if claimed[slot] || terrain[slot] != Terrain::Free {
                return Err(blocked);
            }
            claimed[slot] = true;
        }
        widgets.push(widget);
    }

    let widget_cells: usize = widgets.iter().map(|widget| widget.kind().cell_count()).sum();
    if targets.len() > widget_cells {
        return Err(DefinitionError::TooManyTargets {
            targets: targets.len(),
            widget_cells,
        });
    }

    Ok(Environment {
        grid,
        terrain,
        targets,
        initial: GameState::new(bee, widgets),
        actions,
        obstacle_penalty: definition.obstacle_penalty,
        thorn_penalty: definition.thorn_penalty,
        discount: definition.discount,
        tolerance: definition.tolerance,
        reward_aggregation: definition.reward_aggregation,
    })
}

fn mark_terrain(
    grid: &HexGrid,
    terrain: &mut [Terrain],
    cells: &[CellCoord],
    kind: Terrain,
    role: &'static str,
) -> Result<(), DefinitionError> {
    for &cell in cells {
        let index = grid
            .index(cell)
            .ok_or(DefinitionError::CellOutOfBounds { role, cell })?;
        match terrain[index] {
            Terrain::Free => terrain[index] = kind,
            existing if existing == kind => {}
            existing => {
                return Err(DefinitionError::ConflictingTerrain {
                    cell,
                    first: existing.label(),
                    second: role,
                })
            }
        }
    }
    Ok(())
}

fn validate_action(action: Action, settings: &ActionSettings) -> Result<(), DefinitionError> {
    for (name, value) in [("base_cost", settings.base_cost), ("push_cost", settings.push_cost)] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(DefinitionError::InvalidCost { action, name, value });
        }
    }
    for (name, value) in [
        ("drift_cw", settings.drift_cw),
        ("drift_ccw", settings.drift_ccw),
        ("double_move", settings.double_move),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(DefinitionError::ProbabilityOutOfRange { action, name, value });
        }
    }
    let total = settings.drift_cw + settings.drift_ccw;
    if total > 1.0 + PROBABILITY_SLACK {
        return Err(DefinitionError::DriftProbabilityOverflow { action, total });
    }
    Ok(())
}

fn validate_penalty(name: &'static str, value: f64) -> Result<(), DefinitionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DefinitionError::InvalidPenalty { name, value })
    }
}
