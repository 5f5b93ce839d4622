use beebot_core::{
    Action, BeeState, CellCoord, GameState, Orientation, WidgetFacing, WidgetState, WidgetType,
};
use beebot_environment::{
    load_environment, query, step, ActionParameters, Environment, LevelDefinition,
    RewardAggregation, WidgetPlacement,
};
use beebot_system_solver::{
    policy_iteration, value_iteration, PolicyIteration, SolverConfig, SolverError, SolverStatus,
    ValueIteration,
};

fn level(
    rows: u32,
    columns: u32,
    targets: Vec<CellCoord>,
    bee: BeeState,
    widget: WidgetPlacement,
    actions: ActionParameters,
) -> LevelDefinition {
    LevelDefinition {
        rows,
        columns,
        obstacles: Vec::new(),
        thorns: Vec::new(),
        targets,
        bee,
        widgets: vec![widget],
        actions,
        obstacle_penalty: 10.0,
        thorn_penalty: 20.0,
        discount: 0.9,
        tolerance: 1e-6,
        reward_aggregation: RewardAggregation::Minimum,
    }
}

/// Single-column corridor: the bee faces away from a vertical widget that
/// must be pushed up twice to cover the top cell.
fn corridor() -> Environment {
    let definition = level(
        6,
        1,
        vec![CellCoord::new(0, 0)],
        BeeState::new(CellCoord::new(5, 0), Orientation::Down),
        WidgetPlacement {
            kind: WidgetType::Widget3,
            center: CellCoord::new(3, 0),
            facing: WidgetFacing::Vertical,
        },
        ActionParameters::default(),
    );
    load_environment(&definition).expect("valid corridor")
}

fn noisy_level() -> Environment {
    let mut actions = ActionParameters::default();
    actions.forward.drift_cw = 0.1;
    actions.forward.drift_ccw = 0.05;
    actions.forward.double_move = 0.15;
    actions.reverse.double_move = 0.1;
    let mut definition = level(
        4,
        4,
        vec![CellCoord::new(1, 3)],
        BeeState::new(CellCoord::new(3, 1), Orientation::Up),
        WidgetPlacement {
            kind: WidgetType::Widget3,
            center: CellCoord::new(2, 2),
            facing: WidgetFacing::Vertical,
        },
        actions,
    );
    definition.obstacles = vec![CellCoord::new(0, 0)];
    definition.thorns = vec![CellCoord::new(3, 3)];
    load_environment(&definition).expect("valid noisy level")
}

fn bundled_level() -> Environment {
    let definition: LevelDefinition =
        toml::from_str(include_str!("../../../levels/hive.toml")).expect("parse level");
    load_environment(&definition).expect("valid level")
}

fn precise(discount: f64) -> SolverConfig {
    SolverConfig {
        discount,
        tolerance: 1e-9,
        max_iterations: 5_000,
        max_evaluation_sweeps: 10_000,
        ..SolverConfig::default()
    }
}

#[test]
fn value_iteration_recovers_minimum_cost_route() {
    let environment = corridor();
    let solution = value_iteration(&environment, &precise(1.0)).expect("valid config");
    assert!(solution.is_converged());

    let start = environment.initial_state();
    // three cheap left spins to face up, then two pushes
    let expected = -(3.0 * 0.1 + 2.0 * 1.8);
    assert!((solution.value(start) - expected).abs() < 1e-9, "value {}", solution.value(start));
    assert_eq!(solution.action(start), Action::SpinLeft);
}

#[test]
fn greedy_policy_walks_the_route() {
    let environment = corridor();
    let solution = value_iteration(&environment, &precise(1.0)).expect("valid config");

    let mut state = environment.initial_state().clone();
    let mut taken = Vec::new();
    while !query::is_solved(&environment, &state) && taken.len() < 10 {
        let action = solution.action(&state);
        taken.push(action);
        state = step(&environment, &state, action).state;
    }
    assert_eq!(
        taken,
        [
            Action::SpinLeft,
            Action::SpinLeft,
            Action::SpinLeft,
            Action::Forward,
            Action::Forward
        ]
    );
    assert_eq!(solution.value(&state), 0.0);
}

#[test]
fn policy_iteration_matches_value_iteration() {
    let environment = noisy_level();
    let config = precise(0.9);
    let by_value = value_iteration(&environment, &config).expect("valid config");
    let by_policy = policy_iteration(&environment, &config).expect("valid config");
    assert!(by_value.is_converged());
    assert!(by_policy.is_converged());
    assert_eq!(by_value.space().len(), by_policy.space().len());

    for state in by_value.space().states() {
        let optimal = by_value.value(state);
        assert!(
            (optimal - by_policy.value(state)).abs() < 1e-4,
            "values differ for {state:?}"
        );
        let policy_return = by_value
            .expected_return(state, by_policy.action(state))
            .expect("explored state");
        assert!(
            (policy_return - optimal).abs() < 1e-4,
            "policy iteration action is suboptimal for {state:?}"
        );
        let value_return = by_policy
            .expected_return(state, by_value.action(state))
            .expect("explored state");
        assert!((value_return - by_policy.value(state)).abs() < 1e-4);
    }
}

#[test]
fn solved_states_hold_zero_value() {
    let environment = noisy_level();
    let solution = value_iteration(&environment, &precise(0.9)).expect("valid config");
    let space = solution.space();
    assert!(space.terminal_count() > 0);
    for (index, state) in space.states().iter().enumerate() {
        if space.is_terminal(index) {
            assert_eq!(solution.value(state), 0.0);
        } else {
            assert!(solution.value(state) < 0.0);
        }
    }
}

#[test]
fn already_solved_level_converges_immediately() {
    let definition = level(
        5,
        3,
        vec![CellCoord::new(1, 1)],
        BeeState::new(CellCoord::new(4, 1), Orientation::Up),
        WidgetPlacement {
            kind: WidgetType::Widget3,
            center: CellCoord::new(2, 1),
            facing: WidgetFacing::Vertical,
        },
        ActionParameters::default(),
    );
    let environment = load_environment(&definition).expect("valid level");
    let config = SolverConfig::for_environment(&environment);

    for solution in [
        value_iteration(&environment, &config).expect("valid config"),
        policy_iteration(&environment, &config).expect("valid config"),
    ] {
        assert_eq!(solution.status(), SolverStatus::Converged { iterations: 1 });
        assert_eq!(solution.space().len(), 1);
        assert_eq!(solution.value(environment.initial_state()), 0.0);
    }
}

#[test]
fn iteration_cap_reports_non_convergence() {
    let environment = noisy_level();
    let config = SolverConfig {
        max_iterations: 1,
        ..precise(0.9)
    };
    let solution = value_iteration(&environment, &config).expect("valid config");
    match solution.status() {
        SolverStatus::NonConvergence { iterations, residual } => {
            assert_eq!(iterations, 1);
            assert!(residual >= config.tolerance);
        }
        status => panic!("expected non-convergence, got {status:?}"),
    }
    assert!(!solution.is_converged());
}

#[test]
fn invalid_configs_are_rejected() {
    let environment = corridor();
    let config = SolverConfig {
        discount: 1.5,
        ..SolverConfig::default()
    };
    assert_eq!(
        value_iteration(&environment, &config).err(),
        Some(SolverError::InvalidDiscount(1.5))
    );
    let config = SolverConfig {
        tolerance: -1.0,
        ..SolverConfig::default()
    };
    assert_eq!(
        policy_iteration(&environment, &config).err(),
        Some(SolverError::InvalidTolerance(-1.0))
    );
    let config = SolverConfig {
        max_iterations: 0,
        ..SolverConfig::default()
    };
    assert!(ValueIteration::new(&environment, &config).is_err());
}

#[test]
fn repeated_runs_are_identical() {
    let environment = noisy_level();
    let parallel = precise(0.9);
    let sequential = SolverConfig {
        parallel: false,
        ..parallel
    };
    let first = value_iteration(&environment, &parallel).expect("valid config");
    let second = value_iteration(&environment, &sequential).expect("valid config");
    assert_eq!(first.values(), second.values());
    assert_eq!(first.policy(), second.policy());
    assert_eq!(first.status(), second.status());

    let first = policy_iteration(&environment, &parallel).expect("valid config");
    let second = policy_iteration(&environment, &parallel).expect("valid config");
    assert_eq!(first.values(), second.values());
    assert_eq!(first.policy(), second.policy());
}

#[test]
fn unknown_states_fall_back_to_defaults() {
    let environment = corridor();
    let solution = value_iteration(&environment, &precise(1.0)).expect("valid config");
    let stray = GameState::new(
        BeeState::new(CellCoord::new(9, 9), Orientation::Up),
        vec![WidgetState::new(WidgetType::Widget3, CellCoord::new(8, 8), Orientation::Up)],
    );
    assert_eq!(solution.value(&stray), 0.0);
    assert_eq!(solution.action(&stray), Action::Forward);
    assert_eq!(solution.expected_return(&stray, Action::Reverse), None);
}

#[test]
fn truncated_exploration_still_solves() {
    let environment = noisy_level();
    let config = SolverConfig {
        max_states: 8,
        ..precise(0.9)
    };
    let solution = value_iteration(&environment, &config).expect("valid config");
    assert!(solution.space().is_truncated());
    assert_eq!(solution.space().len(), 8);
    assert!(solution.values().iter().all(|value| value.is_finite()));
}

#[test]
fn step_wise_drivers_expose_progress() {
    let environment = corridor();
    let config = precise(1.0);

    let mut values = ValueIteration::new(&environment, &config).expect("valid config");
    assert!(!values.is_converged());
    let first = values.iterate();
    assert!(first > 0.0);
    assert_eq!(values.iterations(), 1);
    while !values.is_converged() {
        let _ = values.iterate();
    }
    assert!(values.values().iter().all(|value| *value <= 0.0));

    let mut policy = PolicyIteration::new(&environment, &config).expect("valid config");
    assert!(policy.policy().iter().all(|action| *action == Action::Forward));
    let _ = policy.evaluate();
    let stable = policy.improve();
    assert!(!stable);
    assert_ne!(policy.policy()[0], Action::Forward);
}

#[test]
fn bundled_level_solves_with_both_methods() {
    let environment = bundled_level();
    let config = SolverConfig {
        max_evaluation_sweeps: 1_000,
        ..SolverConfig::for_environment(&environment)
    };
    let by_value = value_iteration(&environment, &config).expect("valid config");
    let by_policy = policy_iteration(&environment, &config).expect("valid config");
    assert!(by_value.is_converged());
    assert!(by_policy.is_converged());
    assert!(by_value.space().terminal_count() > 0);

    let start = environment.initial_state();
    assert!(by_value.value(start) < 0.0);
    assert!((by_value.value(start) - by_policy.value(start)).abs() < 1e-2);
}

#[test]
fn policy_iteration_settles_values_at_default_sweep_cap() {
    let environment = bundled_level();
    let config = SolverConfig {
        discount: 0.99,
        max_iterations: 10_000,
        ..SolverConfig::for_environment(&environment)
    };
    assert_eq!(config.max_evaluation_sweeps, SolverConfig::default().max_evaluation_sweeps);

    let by_value = value_iteration(&environment, &config).expect("valid config");
    let by_policy = policy_iteration(&environment, &config).expect("valid config");
    assert!(by_value.is_converged());
    assert!(by_policy.is_converged());
    assert!(by_policy.status().iterations() > 1);

    let largest_gap = by_value
        .values()
        .iter()
        .zip(by_policy.values())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    assert!(largest_gap < 1e-3, "largest value gap {largest_gap}");
}

#[test]
fn stable_policy_with_unsettled_values_is_not_converged() {
    let environment = noisy_level();
    let config = SolverConfig {
        discount: 0.99,
        tolerance: 1e-9,
        max_evaluation_sweeps: 1,
        max_iterations: 3,
        ..SolverConfig::default()
    };
    let mut driver = PolicyIteration::new(&environment, &config).expect("valid config");
    while driver.iterations() < 3 {
        let _ = driver.iterate();
    }
    assert!(driver.residual() >= config.tolerance);
    assert!(!driver.is_converged());

    let solution = policy_iteration(&environment, &config).expect("valid config");
    assert!(matches!(
        solution.status(),
        SolverStatus::NonConvergence { iterations: 3, .. }
    ));
}
