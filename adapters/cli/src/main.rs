#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that loads BeeBot levels, solves them and replays
//! the resulting policy.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use beebot_environment::{
    apply, load_environment, query, sample_outcome, Environment, LevelDefinition,
};
use beebot_system_solver::{policy_iteration, value_iteration, Solution, SolverConfig, SolverStatus};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "beebot", about = "Solve BeeBot hex-grid puzzles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve a level and print the value and action of its starting state.
    Solve(SolveArgs),
    /// Solve a level, then follow the policy through sampled outcomes.
    Play {
        #[command(flatten)]
        solve: SolveArgs,
        /// Seed for outcome sampling.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Stop after this many actions even if the level is unsolved.
        #[arg(long, default_value_t = 100)]
        max_steps: usize,
    },
}

#[derive(Args, Debug)]
struct SolveArgs {
    /// TOML level file.
    level: PathBuf,
    #[arg(long, value_enum, default_value_t = Method::Value)]
    method: Method,
    /// Overrides the level's discount factor.
    #[arg(long)]
    discount: Option<f64>,
    /// Overrides the level's convergence tolerance.
    #[arg(long)]
    tolerance: Option<f64>,
    #[arg(long)]
    max_iterations: Option<usize>,
    #[arg(long)]
    max_states: Option<usize>,
    /// Run sweeps on a single thread.
    #[arg(long)]
    sequential: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Method {
    Value,
    Policy,
}

impl SolveArgs {
    fn config(&self, environment: &Environment) -> SolverConfig {
        let mut config = SolverConfig::for_environment(environment);
        if let Some(discount) = self.discount {
            config.discount = discount;
        }
        if let Some(tolerance) = self.tolerance {
            config.tolerance = tolerance;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(max_states) = self.max_states {
            config.max_states = max_states;
        }
        config.parallel = !self.sequential;
        config
    }

    fn solve(&self) -> Result<(Environment, Solution)> {
        let environment = read_level(&self.level)?;
        let config = self.config(&environment);
        let solution = match self.method {
            Method::Value => value_iteration(&environment, &config),
            Method::Policy => policy_iteration(&environment, &config),
        }
        .context("invalid solver configuration")?;
        Ok((environment, solution))
    }
}

fn read_level(path: &Path) -> Result<Environment> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read level {}", path.display()))?;
    let definition: LevelDefinition =
        toml::from_str(&text).with_context(|| format!("failed to parse level {}", path.display()))?;
    load_environment(&definition).with_context(|| format!("invalid level {}", path.display()))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn print_report(method: Method, environment: &Environment, solution: &Solution) {
    let start = environment.initial_state();
    let space = solution.space();
    println!("method: {method:?} iteration");
    println!(
        "states: {} ({} solved){}",
        space.len(),
        space.terminal_count(),
        if space.is_truncated() { ", truncated" } else { "" }
    );
    match solution.status() {
        SolverStatus::Converged { iterations } => {
            println!("status: converged after {iterations} iterations");
        }
        SolverStatus::NonConvergence {
            iterations,
            residual,
        } => {
            println!(
                "status: not converged after {iterations} iterations (residual {residual:.3e})"
            );
        }
    }
    println!("start value: {:.4}", solution.value(start));
    println!("start action: {:?}", solution.action(start));
}

fn play(environment: &Environment, solution: &Solution, seed: u64, max_steps: usize) -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut state = environment.initial_state().clone();
    let mut total = 0.0;
    for turn in 1..=max_steps {
        if query::is_solved(environment, &state) {
            println!("solved after {} actions, total reward {total:.2}", turn - 1);
            return Ok(());
        }
        let action = solution.action(&state);
        let outcomes = apply(environment, &state, action);
        let Some(outcome) = sample_outcome(&outcomes, &mut rng) else {
            bail!("no outcome available for {action:?}");
        };
        total += outcome.reward;
        println!(
            "{turn:>3}: {action:?} -> bee {:?} facing {:?}, reward {:.2}",
            outcome.state.bee().cell,
            outcome.state.bee().orientation,
            outcome.reward
        );
        state = outcome.state.clone();
    }
    if query::is_solved(environment, &state) {
        println!("solved after {max_steps} actions, total reward {total:.2}");
    } else {
        tracing::warn!(max_steps, "level still unsolved when the step limit was reached");
    }
    Ok(())
}

/// Entry point for the BeeBot command-line interface.
fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Command::Solve(args) => {
            let (environment, solution) = args.solve()?;
            print_report(args.method, &environment, &solution);
        }
        Command::Play {
            solve,
            seed,
            max_steps,
        } => {
            let (environment, solution) = solve.solve()?;
            print_report(solve.method, &environment, &solution);
            play(&environment, &solution, seed, max_steps)?;
        }
    }
    Ok(())
}
