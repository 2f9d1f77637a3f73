//! End-to-end tests for the primal simplex and the SLP loops.

use primal_core::linalg::sparse;
use primal_core::simplex::variables::VarStatus;
use primal_core::{
    solve, solve_with_constraints, Constraint, FnConstraint, FnObjective, PrimalSimplex,
    ProblemData, QuadraticObjective, SecondaryStatus, SolveStatus, SolverSettings,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const INF: f64 = f64::INFINITY;

fn assert_feasible(simplex: &PrimalSimplex, tol: f64) {
    let x = simplex.primal_values();
    for (j, &v) in x.iter().enumerate() {
        let (lo, up) = simplex.column_bounds(j);
        assert!(v >= lo - tol && v <= up + tol, "column {} = {} outside [{}, {}]", j, v, lo, up);
    }
    for (i, &r) in simplex.row_activity().iter().enumerate() {
        let (lo, up) = simplex.row_bounds(i);
        assert!(r >= lo - tol && r <= up + tol, "row {} = {} outside [{}, {}]", i, r, lo, up);
    }
}

#[test]
fn test_simple_lp() {
    // min x + y  s.t.  x + y >= 4,  x, y >= 0
    let prob = ProblemData::linear(
        sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]),
        vec![1.0, 1.0],
        vec![0.0, 0.0],
        vec![INF, INF],
        vec![4.0],
        vec![INF],
    );
    let mut simplex = PrimalSimplex::new(prob, SolverSettings::default()).unwrap();
    let status = simplex.solve_primal();

    assert_eq!(status.status, SolveStatus::Optimal);
    let x = simplex.primal_values();
    assert!((x[0] + x[1] - 4.0).abs() < 1e-7);
    assert!((simplex.objective_value() - 4.0).abs() < 1e-7);
    assert_feasible(&simplex, 1e-7);
    assert!(simplex.basis_is_consistent());
}

#[test]
fn test_resolve_at_optimum_is_idle() {
    let prob = ProblemData::linear(
        sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]),
        vec![1.0, 1.0],
        vec![0.0, 0.0],
        vec![INF, INF],
        vec![4.0],
        vec![INF],
    );
    let mut simplex = PrimalSimplex::new(prob, SolverSettings::default()).unwrap();
    assert!(simplex.solve_primal().is_optimal());
    let x = simplex.primal_values().to_vec();

    let status = simplex.solve_primal();
    assert_eq!(status.status, SolveStatus::Optimal);
    assert_eq!(simplex.last_solve_iterations(), 0);
    assert_eq!(simplex.primal_values(), x.as_slice());
}

#[test]
fn test_unbounded_lp() {
    // min x - y  s.t.  x + y >= 4,  x, y >= 0
    let prob = ProblemData::linear(
        sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]),
        vec![1.0, -1.0],
        vec![0.0, 0.0],
        vec![INF, INF],
        vec![4.0],
        vec![INF],
    );
    let result = solve(prob, &SolverSettings::default()).unwrap();

    assert_eq!(result.status, SolveStatus::Unbounded);
    let ray = result.ray.expect("unbounded direction");
    assert!(ray[1] > 0.0);
    assert!(ray[0] - ray[1] < 0.0);
}

#[test]
fn test_crossed_bounds_are_infeasible() {
    // x <= 1 and x >= 2 on the same column
    let prob = ProblemData::linear(
        sparse::from_triplets(0, 1, Vec::new()),
        vec![1.0],
        vec![2.0],
        vec![1.0],
        Vec::new(),
        Vec::new(),
    );
    let result = solve(prob, &SolverSettings::default()).unwrap();
    assert_eq!(result.status, SolveStatus::Infeasible);
    assert_eq!(result.secondary, SecondaryStatus::InconsistentBounds);
}

#[test]
fn test_conflicting_rows_are_infeasible() {
    // x <= 1 and x >= 2 as two rows
    let prob = ProblemData::linear(
        sparse::from_triplets(2, 1, vec![(0, 0, 1.0), (1, 0, 1.0)]),
        vec![1.0],
        vec![f64::NEG_INFINITY],
        vec![INF],
        vec![f64::NEG_INFINITY, 2.0],
        vec![1.0, INF],
    );
    let mut simplex = PrimalSimplex::new(prob, SolverSettings::default()).unwrap();
    let status = simplex.solve_primal();
    assert_eq!(status.status, SolveStatus::Infeasible);
    assert!(simplex.sum_primal_infeasibilities() > 0.5);
    assert!(simplex.basis_is_consistent());
}

#[test]
fn test_maximize_reports_callers_sense() {
    // max x + 2y  s.t.  x + y <= 3,  0 <= x, y <= 2
    let mut prob = ProblemData::linear(
        sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]),
        vec![1.0, 2.0],
        vec![0.0, 0.0],
        vec![2.0, 2.0],
        vec![f64::NEG_INFINITY],
        vec![3.0],
    );
    prob.maximize = true;
    let result = solve(prob, &SolverSettings::default()).unwrap();

    assert_eq!(result.status, SolveStatus::Optimal);
    assert!((result.x[0] - 1.0).abs() < 1e-7);
    assert!((result.x[1] - 2.0).abs() < 1e-7);
    assert!((result.obj_val - 5.0).abs() < 1e-7);
}

#[test]
fn test_qp_interior_minimizer() {
    // min (x - 1)^2 = x^2 - 2x + 1, x in [-5, 5]
    let q = sparse::from_triplets_symmetric(1, vec![(0, 0, 2.0)]);
    let objective = QuadraticObjective::new(vec![-2.0], q);
    let prob = ProblemData::new(
        sparse::from_triplets(0, 1, Vec::new()),
        Box::new(objective),
        vec![-5.0],
        vec![5.0],
        Vec::new(),
        Vec::new(),
    );
    let mut simplex = PrimalSimplex::new(prob, SolverSettings::default()).unwrap();
    let status = simplex.solve_primal();

    assert_eq!(status.status, SolveStatus::Optimal);
    assert!((simplex.primal_values()[0] - 1.0).abs() < 1e-7);
    assert_eq!(simplex.variable_status(0), VarStatus::SuperBasic);
}

#[test]
fn test_slp_square_from_ten() {
    let objective = FnObjective::new(1, |x| x[0] * x[0], |x, g| g[0] = 2.0 * x[0]);
    let prob = ProblemData::new(
        sparse::from_triplets(0, 1, Vec::new()),
        Box::new(objective),
        vec![f64::NEG_INFINITY],
        vec![INF],
        Vec::new(),
        Vec::new(),
    )
    .with_initial_x(vec![10.0]);
    let mut settings = SolverSettings::default();
    settings.trust_region.initial_width = 5.0;

    let mut simplex = PrimalSimplex::new(prob, settings).unwrap();
    let status = simplex.solve_slp(100, 1e-8);

    assert_eq!(status.status, SolveStatus::Optimal);
    assert!(simplex.primal_values()[0].abs() < 1e-6);
    let history = simplex.slp_objective_history();
    assert!(history.windows(2).all(|w| w[1] < w[0]), "{:?}", history);
}

#[test]
fn test_solve_routes_general_objectives_to_slp() {
    // min (x - 2)^2 + (y + 1)^2 over the box [0, 3] x [0, 3]
    let objective = FnObjective::new(
        2,
        |x| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
        |x, g| {
            g[0] = 2.0 * (x[0] - 2.0);
            g[1] = 2.0 * (x[1] + 1.0);
        },
    );
    let prob = ProblemData::new(
        sparse::from_triplets(0, 2, Vec::new()),
        Box::new(objective),
        vec![0.0, 0.0],
        vec![3.0, 3.0],
        Vec::new(),
        Vec::new(),
    );
    let result = solve(prob, &SolverSettings::default()).unwrap();

    assert!(matches!(
        result.status,
        SolveStatus::Optimal | SolveStatus::IterationLimit
    ));
    assert!(result.info.slp_passes > 0);
    assert!((result.x[0] - 2.0).abs() < 1e-3);
    assert!(result.x[1].abs() < 1e-6);
}

#[test]
fn test_constrained_slp_projects_onto_disc() {
    // min (x - 2)^2 + (y - 1)^2  s.t.  x^2 + y^2 <= 1
    let objective = FnObjective::new(
        2,
        |x| (x[0] - 2.0).powi(2) + (x[1] - 1.0).powi(2),
        |x, g| {
            g[0] = 2.0 * (x[0] - 2.0);
            g[1] = 2.0 * (x[1] - 1.0);
        },
    );
    let prob = ProblemData::new(
        sparse::from_triplets(1, 2, Vec::new()),
        Box::new(objective),
        vec![f64::NEG_INFINITY; 2],
        vec![INF; 2],
        vec![f64::NEG_INFINITY],
        vec![1.0],
    );
    let disc: Box<dyn Constraint> = Box::new(FnConstraint::new(
        0,
        2,
        vec![0, 1],
        |x| x[0] * x[0] + x[1] * x[1],
        |x, g| {
            g[0] = 2.0 * x[0];
            g[1] = 2.0 * x[1];
        },
    ));
    let result = solve_with_constraints(prob, &[disc], &SolverSettings::default()).unwrap();

    assert!(matches!(
        result.status,
        SolveStatus::Optimal | SolveStatus::IterationLimit
    ));
    let r2 = result.x[0] * result.x[0] + result.x[1] * result.x[1];
    assert!(r2 < 1.0 + 1e-2, "violation {}", r2 - 1.0);
    assert!((result.row_activity[0] - r2).abs() < 1e-12);
    assert!((result.obj_val - 1.5279).abs() < 0.05, "objective {}", result.obj_val);
}

#[test]
fn test_abort_hook_abandons_solve() {
    let prob = ProblemData::linear(
        sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]),
        vec![1.0, 1.0],
        vec![0.0, 0.0],
        vec![INF, INF],
        vec![4.0],
        vec![INF],
    );
    let mut simplex = PrimalSimplex::new(prob, SolverSettings::default()).unwrap();
    simplex.set_abort_check(|| true);
    let status = simplex.solve_primal();
    assert_eq!(status.status, SolveStatus::Abandoned);
    assert_eq!(status.secondary, SecondaryStatus::UserAbort);
    assert!(simplex.basis_is_consistent());

    simplex.clear_abort_check();
    assert!(simplex.solve_primal().is_optimal());
}

/// Random 3x5 LP with rows built around a known feasible point. Also returns
/// the objective at that point.
fn random_feasible_lp(rng: &mut ChaCha8Rng) -> (ProblemData, f64) {
    let (m, n) = (3, 5);
    let mut triplets = Vec::new();
    for i in 0..m {
        for j in 0..n {
            if rng.gen::<f64>() < 0.6 {
                triplets.push((i, j, rng.gen_range(-2.0..2.0)));
            }
        }
    }
    let a = sparse::from_triplets(m, n, triplets.clone());

    let x_star: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();
    let mut activity = vec![0.0; m];
    for &(i, j, v) in &triplets {
        activity[i] += v * x_star[j];
    }
    let row_lower: Vec<f64> = activity.iter().map(|r| r - rng.gen_range(0.0..1.0)).collect();
    let row_upper: Vec<f64> = activity.iter().map(|r| r + rng.gen_range(0.0..1.0)).collect();
    let c: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let bound = c.iter().zip(&x_star).map(|(c, x)| c * x).sum::<f64>();

    let prob = ProblemData::linear(a, c, vec![0.0; n], vec![2.0; n], row_lower, row_upper);
    (prob, bound)
}

#[test]
fn test_random_feasible_lps() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for trial in 0..10 {
        let (prob, bound) = random_feasible_lp(&mut rng);
        let mut simplex = PrimalSimplex::new(prob, SolverSettings::default()).unwrap();
        let status = simplex.solve_primal();

        assert_eq!(status.status, SolveStatus::Optimal, "trial {}", trial);
        assert!(simplex.basis_is_consistent(), "trial {}", trial);
        assert_feasible(&simplex, 1e-6);
        assert!(
            simplex.objective_value() <= bound + 1e-7,
            "trial {}: {} > {}",
            trial,
            simplex.objective_value(),
            bound
        );
    }
}

#[test]
fn test_basis_consistent_at_every_iteration() {
    for seed in 0..5 {
        for limit in 1..=60 {
            let mut rng = ChaCha8Rng::seed_from_u64(100 + seed);
            let (prob, _) = random_feasible_lp(&mut rng);
            let settings = SolverSettings {
                max_iter: limit,
                ..Default::default()
            };
            let mut simplex = PrimalSimplex::new(prob, settings).unwrap();
            let status = simplex.solve_primal();
            assert!(
                simplex.basis_is_consistent(),
                "seed {} after {} iteration(s)",
                seed,
                simplex.iterations()
            );
            if status.status != SolveStatus::IterationLimit {
                assert_eq!(status.status, SolveStatus::Optimal, "seed {}", seed);
                break;
            }
        }
    }
}
