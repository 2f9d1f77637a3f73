//! Benchmarking CLI for the primal simplex and the SLP loops.

mod solver_choice;
mod test_problems;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use primal_core::{solve, solve_with_constraints, SolveResult, SolverSettings};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use solver_choice::ModeChoice;
use test_problems::{
    generate_random_lp, generate_random_qp, generate_separable, synthetic_test_problems,
    BenchProblem,
};

#[derive(Parser, Debug)]
#[command(name = "primal-bench", version, about = "Primal simplex benchmarks")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    solver: SolverArgs,
}

#[derive(Args, Debug)]
struct SolverArgs {
    /// Simplex iteration limit per solve.
    #[arg(long, global = true)]
    max_iter: Option<usize>,

    /// Direction mode for nonlinear objectives.
    #[arg(long, value_enum, global = true, default_value = "cg")]
    mode: ModeChoice,

    /// Log every status check.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Random feasible LPs.
    Lp {
        #[arg(short, long, default_value = "200")]
        n: usize,
        #[arg(short, long, default_value = "100")]
        m: usize,
        #[arg(long, default_value = "0.05")]
        density: f64,
        #[arg(long, default_value = "1")]
        seed: u64,
        #[arg(long, default_value = "5")]
        trials: u64,
    },
    /// Random convex QPs.
    Qp {
        #[arg(short, long, default_value = "100")]
        n: usize,
        #[arg(short, long, default_value = "50")]
        m: usize,
        #[arg(long, default_value = "0.05")]
        density: f64,
        #[arg(long, default_value = "1")]
        seed: u64,
    },
    /// Separable nonlinear problem solved by SLP.
    Slp {
        #[arg(short, long, default_value = "20")]
        n: usize,
        #[arg(long, default_value = "1")]
        seed: u64,
    },
    /// Named synthetic problems.
    Suite {
        /// Only run problems whose name contains this string.
        #[arg(long)]
        filter: Option<String>,
        /// Write a JSON summary to this file.
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

/// One row of the run summary.
#[derive(Debug, Serialize)]
struct RunSummary {
    name: String,
    status: String,
    expected: Option<String>,
    objective: f64,
    iterations: usize,
    refactorizations: usize,
    slp_passes: usize,
    primal_infeasibility: f64,
    time_ms: f64,
}

impl RunSummary {
    fn new(name: &str, result: &SolveResult, time_ms: f64) -> Self {
        let status = match result.secondary {
            primal_core::SecondaryStatus::None => result.status.to_string(),
            secondary => format!("{} ({})", result.status, secondary),
        };
        Self {
            name: name.to_string(),
            status,
            expected: None,
            objective: result.obj_val,
            iterations: result.info.iterations,
            refactorizations: result.info.refactorizations,
            slp_passes: result.info.slp_passes,
            primal_infeasibility: result.info.primal_infeasibility,
            time_ms,
        }
    }

    fn print(&self) {
        println!(
            "{:<20} {:<32} obj={:>14.6e} iters={:>6} refac={:>4} passes={:>4} pinf={:>9.2e} {:>9.2}ms",
            self.name,
            self.status,
            self.objective,
            self.iterations,
            self.refactorizations,
            self.slp_passes,
            self.primal_infeasibility,
            self.time_ms,
        );
    }
}

fn settings_from(args: &SolverArgs) -> SolverSettings {
    let mut settings = SolverSettings {
        verbose: args.verbose,
        nonlinear_mode: args.mode.into(),
        ..Default::default()
    };
    if let Some(max_iter) = args.max_iter {
        settings.max_iter = max_iter;
    }
    settings
}

fn run(name: &str, bench: BenchProblem, settings: &SolverSettings) -> anyhow::Result<RunSummary> {
    let start = Instant::now();
    let result = if bench.constraints.is_empty() {
        solve(bench.problem, settings)
    } else {
        solve_with_constraints(bench.problem, &bench.constraints, settings)
    }
    .with_context(|| format!("solving {}", name))?;
    let time_ms = start.elapsed().as_secs_f64() * 1000.0;
    let summary = RunSummary::new(name, &result, time_ms);
    summary.print();
    Ok(summary)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = settings_from(&cli.solver);

    match cli.command {
        Command::Lp {
            n,
            m,
            density,
            seed,
            trials,
        } => {
            for trial in 0..trials {
                let prob = generate_random_lp(n, m, density, seed + trial);
                run(&format!("lp-{}x{}-s{}", m, n, seed + trial), prob.into(), &settings)?;
            }
        }
        Command::Qp {
            n,
            m,
            density,
            seed,
        } => {
            let prob = generate_random_qp(n, m, density, seed);
            run(&format!("qp-{}x{}-s{}", m, n, seed), prob.into(), &settings)?;
        }
        Command::Slp { n, seed } => {
            let prob = generate_separable(n, seed);
            run(&format!("slp-{}-s{}", n, seed), prob.into(), &settings)?;
        }
        Command::Suite { filter, json } => {
            let mut summaries = Vec::new();
            let mut mismatches = 0;
            for problem in synthetic_test_problems() {
                if let Some(ref f) = filter {
                    if !problem.name.contains(f.as_str()) {
                        continue;
                    }
                }
                tracing::debug!(name = problem.name, class = problem.problem_class, "running");
                let mut summary = run(problem.name, (problem.builder)(), &settings)?;
                if !summary.status.starts_with(problem.expected_status) {
                    tracing::warn!(
                        name = problem.name,
                        expected = problem.expected_status,
                        got = %summary.status,
                        "unexpected status"
                    );
                    mismatches += 1;
                }
                summary.expected = Some(problem.expected_status.to_string());
                summaries.push(summary);
            }
            if let Some(path) = json {
                let text = serde_json::to_string_pretty(&summaries)?;
                std::fs::write(&path, text)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            if mismatches > 0 {
                bail!("{} problem(s) ended with an unexpected status", mismatches);
            }
        }
    }
    Ok(())
}
