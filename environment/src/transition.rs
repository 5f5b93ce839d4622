//! Primitive action resolution and composition of noisy outcomes.

use beebot_core::{Action, BeeState, CellCoord, GameState, HexGrid, Orientation, Spin, WidgetState};

use crate::{Environment, Terrain};

/// Reason a primitive action left the bee in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollisionKind {
    /// The bee or a widget would leave the grid.
    Boundary,
    /// The bee or a widget would enter an obstacle.
    Obstacle,
    /// The bee or a widget would enter a thorn.
    Thorn,
    /// A widget would overlap another widget or the bee, or the bee backed into a widget.
    Widget,
    /// A reverse move tried to pull a widget off its axis.
    InvalidPull,
}

impl CollisionKind {
    /// Penalty magnitude the environment charges for this collision.
    #[must_use]
    pub fn penalty(self, environment: &Environment) -> f64 {
        match self {
            Self::Thorn => environment.thorn_penalty(),
            _ => environment.obstacle_penalty(),
        }
    }
}

/// Result of one primitive action application.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// State after the action; unchanged on collision.
    pub state: GameState,
    /// Negative cost of the action, or the negative collision penalty.
    pub reward: f64,
    /// Collision that stopped the action, if any.
    pub collision: Option<CollisionKind>,
}

/// One resolved outcome of a noisy action.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    /// Resulting state.
    pub state: GameState,
    /// Reward reported for the outcome.
    pub reward: f64,
    /// Probability of the outcome.
    pub probability: f64,
}

/// Discrete distribution over `(state, reward)` pairs.
///
/// Identical pairs are merged by summing their probabilities and
/// zero-probability outcomes are never stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutcomeDistribution {
    outcomes: Vec<Outcome>,
}

impl OutcomeDistribution {
    fn add(&mut self, state: GameState, reward: f64, probability: f64) {
        if probability <= 0.0 {
            return;
        }
        let existing = self
            .outcomes
            .iter_mut()
            .find(|outcome| outcome.reward == reward && outcome.state == state);
        match existing {
            Some(outcome) => outcome.probability += probability,
            None => self.outcomes.push(Outcome {
                state,
                reward,
                probability,
            }),
        }
    }

    /// Iterator over the outcomes in the order they were first produced.
    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter()
    }

    /// Number of distinct outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Reports whether the distribution holds no outcomes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Sum of all outcome probabilities.
    #[must_use]
    pub fn total_probability(&self) -> f64 {
        self.outcomes.iter().map(|outcome| outcome.probability).sum()
    }

    /// Consumes the distribution, yielding the outcomes.
    #[must_use]
    pub fn into_vec(self) -> Vec<Outcome> {
        self.outcomes
    }
}

/// Resolves a nominal action into its distribution of outcomes.
///
/// Drift turns the bee once before the nominal action; a double move repeats
/// the nominal action with the drifted heading. The two noise sources are
/// independent. A branch stops at its first collision and its reward is
/// folded with the environment's [`crate::RewardAggregation`].
#[must_use]
pub fn apply(environment: &Environment, state: &GameState, action: Action) -> OutcomeDistribution {
    let settings = environment.action(action);
    let drifts = [
        (None, settings.no_drift()),
        (Some(Action::SpinRight), settings.drift_cw),
        (Some(Action::SpinLeft), settings.drift_ccw),
    ];
    let repeats = [(1, settings.single_move()), (2, settings.double_move)];

    let mut distribution = OutcomeDistribution::default();
    for (drift, drift_probability) in drifts {
        if drift_probability <= 0.0 {
            continue;
        }
        for (repetitions, repeat_probability) in repeats {
            let probability = drift_probability * repeat_probability;
            if probability <= 0.0 {
                continue;
            }
            let primitives = drift
                .into_iter()
                .chain(std::iter::repeat(action).take(repetitions));
            let (next, reward) = run_branch(environment, state, primitives);
            distribution.add(next, reward, probability);
        }
    }
    distribution
}

fn run_branch(
    environment: &Environment,
    state: &GameState,
    primitives: impl Iterator<Item = Action>,
) -> (GameState, f64) {
    let aggregation = environment.reward_aggregation();
    let mut current = state.clone();
    let mut total = None;
    for primitive in primitives {
        let outcome = step(environment, &current, primitive);
        total = Some(aggregation.combine(total, outcome.reward));
        current = outcome.state;
        if outcome.collision.is_some() {
            break;
        }
    }
    (current, total.unwrap_or(0.0))
}

/// Applies a single primitive action with no noise.
#[must_use]
pub fn step(environment: &Environment, state: &GameState, action: Action) -> Step {
    match action {
        Action::SpinLeft => {
            let heading = state.bee().orientation.counter_clockwise();
            turn(environment, state, action, heading)
        }
        Action::SpinRight => turn(environment, state, action, state.bee().orientation.clockwise()),
        Action::Forward => push(environment, state),
        Action::Reverse => pull(environment, state),
    }
}

fn turn(
    environment: &Environment,
    state: &GameState,
    action: Action,
    orientation: Orientation,
) -> Step {
    let bee = state.bee();
    Step {
        state: state.with_bee(BeeState::new(bee.cell, orientation)),
        reward: -environment.action(action).base_cost,
        collision: None,
    }
}

fn push(environment: &Environment, state: &GameState) -> Step {
    let grid = environment.grid();
    let bee = state.bee();
    let heading = bee.orientation;
    let destination = match enter(environment, bee.cell, heading) {
        Ok(cell) => cell,
        Err(kind) => return collide(environment, state, kind),
    };
    let moved = BeeState::new(destination, heading);
    let occupancy = Occupancy::of(environment, state);

    let Some(index) = occupancy.widget_at(destination) else {
        return walk(environment, state, Action::Forward, moved);
    };
    let widget = state.widgets()[index];
    let candidate = if points_at_center(grid, &widget, destination, heading) {
        widget.translated(grid, heading)
    } else {
        grid.direction_between(widget.center(), destination)
            .map(|arm| widget.spun(spin_for(arm, heading)))
    };
    manipulate(environment, state, &occupancy, index, candidate, moved, Action::Forward)
}

fn pull(environment: &Environment, state: &GameState) -> Step {
    let grid = environment.grid();
    let bee = state.bee();
    let heading = bee.orientation.opposite();
    let destination = match enter(environment, bee.cell, heading) {
        Ok(cell) => cell,
        Err(kind) => return collide(environment, state, kind),
    };
    let moved = BeeState::new(destination, bee.orientation);
    let occupancy = Occupancy::of(environment, state);
    if occupancy.widget_at(destination).is_some() {
        return collide(environment, state, CollisionKind::Widget);
    }

    let grabbed = grid
        .neighbor(bee.cell, bee.orientation)
        .and_then(|front| occupancy.widget_at(front).map(|index| (front, index)));
    let Some((front, index)) = grabbed else {
        return walk(environment, state, Action::Reverse, moved);
    };
    let widget = state.widgets()[index];
    if !points_at_center(grid, &widget, front, bee.orientation) {
        return collide(environment, state, CollisionKind::InvalidPull);
    }
    let candidate = widget.translated(grid, heading);
    manipulate(environment, state, &occupancy, index, candidate, moved, Action::Reverse)
}

/// Cell the bee would enter, or the terrain collision that stops it.
fn enter(
    environment: &Environment,
    from: CellCoord,
    heading: Orientation,
) -> Result<CellCoord, CollisionKind> {
    let cell = environment
        .grid()
        .neighbor(from, heading)
        .ok_or(CollisionKind::Boundary)?;
    match environment.terrain(cell) {
        Some(Terrain::Free) => Ok(cell),
        Some(Terrain::Obstacle) => Err(CollisionKind::Obstacle),
        Some(Terrain::Thorn) => Err(CollisionKind::Thorn),
        None => Err(CollisionKind::Boundary),
    }
}

/// Reports whether a move along `heading` through `cell` drives into the widget's center.
fn points_at_center(
    grid: &HexGrid,
    widget: &WidgetState,
    cell: CellCoord,
    heading: Orientation,
) -> bool {
    cell == widget.center() || grid.neighbor(cell, heading) == Some(widget.center())
}

/// Rotation produced by pushing the arm at `arm` (seen from the center) along `heading`.
fn spin_for(arm: Orientation, heading: Orientation) -> Spin {
    match heading.steps_from(arm) {
        1 | 2 => Spin::Clockwise,
        _ => Spin::CounterClockwise,
    }
}

fn walk(environment: &Environment, state: &GameState, action: Action, moved: BeeState) -> Step {
    Step {
        state: state.with_bee(moved),
        reward: -environment.action(action).base_cost,
        collision: None,
    }
}

fn manipulate(
    environment: &Environment,
    state: &GameState,
    occupancy: &Occupancy,
    index: usize,
    candidate: Option<WidgetState>,
    moved: BeeState,
    action: Action,
) -> Step {
    let Some(widget) = candidate else {
        return collide(environment, state, CollisionKind::Boundary);
    };
    if let Some(kind) = placement_conflict(environment, occupancy, index, &widget, moved.cell) {
        return collide(environment, state, kind);
    }
    let settings = environment.action(action);
    Step {
        state: state.with_bee_and_widget(moved, index, widget),
        reward: -(settings.base_cost + settings.push_cost),
        collision: None,
    }
}

/// Most severe conflict between a moved widget and its surroundings.
///
/// Thorns outrank every other conflict.
fn placement_conflict(
    environment: &Environment,
    occupancy: &Occupancy,
    index: usize,
    widget: &WidgetState,
    bee_cell: CellCoord,
) -> Option<CollisionKind> {
    let mut conflict = None;
    for cell in widget.footprint(environment.grid()) {
        let Some(cell) = cell else {
            conflict = conflict.or(Some(CollisionKind::Boundary));
            continue;
        };
        match environment.terrain(cell) {
            Some(Terrain::Thorn) => return Some(CollisionKind::Thorn),
            Some(Terrain::Obstacle) => conflict = conflict.or(Some(CollisionKind::Obstacle)),
            Some(Terrain::Free) => {}
            None => conflict = conflict.or(Some(CollisionKind::Boundary)),
        }
        let foreign = occupancy.widget_at(cell).is_some_and(|other| other != index);
        if cell == bee_cell || foreign {
            conflict = conflict.or(Some(CollisionKind::Widget));
        }
    }
    conflict
}

fn collide(environment: &Environment, state: &GameState, kind: CollisionKind) -> Step {
    Step {
        state: state.clone(),
        reward: -kind.penalty(environment),
        collision: Some(kind),
    }
}

/// Dense map from cell to the index of the widget covering it.
#[derive(Debug)]
struct Occupancy {
    grid: HexGrid,
    cells: Vec<Option<usize>>,
}

impl Occupancy {
    fn of(environment: &Environment, state: &GameState) -> Self {
        let grid = *environment.grid();
        let mut cells = vec![None; grid.cell_count()];
        for (index, widget) in state.widgets().iter().enumerate() {
            for cell in widget.footprint(&grid).into_iter().flatten() {
                if let Some(slot) = grid.index(cell) {
                    cells[slot] = Some(index);
                }
            }
        }
        Self { grid, cells }
    }

    fn widget_at(&self, cell: CellCoord) -> Option<usize> {
        self.grid.index(cell).and_then(|slot| self.cells[slot])
    }
}
