//! Test problem generators and the named synthetic registry.

use primal_core::linalg::sparse;
use primal_core::{Constraint, FnConstraint, FnObjective, ProblemData, QuadraticObjective};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A problem plus the nonlinear constraints that own some of its rows.
pub struct BenchProblem {
    pub problem: ProblemData,
    pub constraints: Vec<Box<dyn Constraint>>,
}

impl From<ProblemData> for BenchProblem {
    fn from(problem: ProblemData) -> Self {
        Self {
            problem,
            constraints: Vec::new(),
        }
    }
}

/// Registry entry.
#[derive(Clone)]
pub struct TestProblem {
    pub name: &'static str,
    pub problem_class: &'static str,
    pub builder: fn() -> BenchProblem,
    pub expected_status: &'static str,
}

/// Random sparse matrix with at least one entry per row.
fn random_matrix(
    rng: &mut ChaCha8Rng,
    m: usize,
    n: usize,
    density: f64,
) -> Vec<(usize, usize, f64)> {
    let mut triplets = Vec::new();
    for i in 0..m {
        for j in 0..n {
            if rng.gen::<f64>() < density {
                triplets.push((i, j, rng.gen_range(-1.0..1.0)));
            }
        }
        let j = rng.gen_range(0..n);
        triplets.push((i, j, rng.gen_range(0.5..1.5)));
    }
    triplets
}

/// Row ranges around `A x_feas`, so the problem is feasible by construction.
fn rows_around_point(
    rng: &mut ChaCha8Rng,
    triplets: &[(usize, usize, f64)],
    m: usize,
    x_feas: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    let mut activity = vec![0.0; m];
    for &(i, j, v) in triplets {
        activity[i] += v * x_feas[j];
    }
    let lower = activity.iter().map(|r| r - rng.gen_range(0.0..1.0)).collect();
    let upper = activity
        .iter()
        .map(|r| {
            if rng.gen::<f64>() < 0.3 {
                f64::INFINITY
            } else {
                r + rng.gen_range(0.0..1.0)
            }
        })
        .collect();
    (lower, upper)
}

/// Random LP:
///   minimize    c^T x
///   subject to  row_lower <= A x <= row_upper
///               0 <= x <= 10
pub fn generate_random_lp(n: usize, m: usize, density: f64, seed: u64) -> ProblemData {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let triplets = random_matrix(&mut rng, m, n, density);
    let x_feas: Vec<f64> = (0..n).map(|_| rng.gen_range(0.1..1.1)).collect();
    let (row_lower, row_upper) = rows_around_point(&mut rng, &triplets, m, &x_feas);
    let c: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();

    ProblemData::linear(
        sparse::from_triplets(m, n, triplets),
        c,
        vec![0.0; n],
        vec![10.0; n],
        row_lower,
        row_upper,
    )
}

/// Random convex QP with a diagonally dominant Hessian over the same
/// constraints as [`generate_random_lp`].
pub fn generate_random_qp(n: usize, m: usize, density: f64, seed: u64) -> ProblemData {
    let lp = generate_random_lp(n, m, density, seed);
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x9e37_79b9);
    let mut q_triplets = Vec::new();
    for j in 0..n {
        q_triplets.push((j, j, rng.gen_range(1.0..2.0) + 1.0));
        if j + 1 < n && rng.gen::<f64>() < density {
            q_triplets.push((j, j + 1, rng.gen_range(-0.5..0.5)));
        }
    }
    let q = sparse::from_triplets_symmetric(n, q_triplets);
    let c: Vec<f64> = (0..n).map(|_| rng.gen_range(-5.0..5.0)).collect();

    ProblemData::new(
        lp.A,
        Box::new(QuadraticObjective::new(c, q)),
        lp.col_lower,
        lp.col_upper,
        lp.row_lower,
        lp.row_upper,
    )
}

/// Separable nonlinear problem:
///   minimize    Σ (x_j - t_j)^4 + x_j^2
///   subject to  Σ x_j <= n / 2
///               -5 <= x <= 5
pub fn generate_separable(n: usize, seed: u64) -> ProblemData {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let targets: Vec<f64> = (0..n).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let t_value = targets.clone();
    let objective = FnObjective::new(
        n,
        move |x| {
            x.iter()
                .zip(&t_value)
                .map(|(x, t)| (x - t).powi(4) + x * x)
                .sum()
        },
        move |x, g| {
            for ((g, x), t) in g.iter_mut().zip(x).zip(&targets) {
                *g = 4.0 * (x - t).powi(3) + 2.0 * x;
            }
        },
    );
    ProblemData::new(
        sparse::from_triplets(1, n, (0..n).map(|j| (0, j, 1.0))),
        Box::new(objective),
        vec![-5.0; n],
        vec![5.0; n],
        vec![f64::NEG_INFINITY],
        vec![n as f64 / 2.0],
    )
}

// ============================================================================
// Synthetic problems
// ============================================================================

fn build_lp_cover() -> BenchProblem {
    // min x + y  s.t.  x + y >= 4
    ProblemData::linear(
        sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]),
        vec![1.0, 1.0],
        vec![0.0, 0.0],
        vec![f64::INFINITY; 2],
        vec![4.0],
        vec![f64::INFINITY],
    )
    .into()
}

fn build_lp_unbounded() -> BenchProblem {
    // min x - y  s.t.  x + y >= 4
    ProblemData::linear(
        sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]),
        vec![1.0, -1.0],
        vec![0.0, 0.0],
        vec![f64::INFINITY; 2],
        vec![4.0],
        vec![f64::INFINITY],
    )
    .into()
}

fn build_lp_infeasible() -> BenchProblem {
    // x <= 1 and x >= 2
    ProblemData::linear(
        sparse::from_triplets(2, 1, vec![(0, 0, 1.0), (1, 0, 1.0)]),
        vec![1.0],
        vec![f64::NEG_INFINITY],
        vec![f64::INFINITY],
        vec![f64::NEG_INFINITY, 2.0],
        vec![1.0, f64::INFINITY],
    )
    .into()
}

fn build_qp_box() -> BenchProblem {
    // min (x - 1)^2 + (y + 2)^2 over [-5, 5]^2
    let q = sparse::from_triplets_symmetric(2, vec![(0, 0, 2.0), (1, 1, 2.0)]);
    ProblemData::new(
        sparse::from_triplets(0, 2, Vec::new()),
        Box::new(QuadraticObjective::new(vec![-2.0, 4.0], q)),
        vec![-5.0; 2],
        vec![5.0; 2],
        Vec::new(),
        Vec::new(),
    )
    .into()
}

fn build_slp_square() -> BenchProblem {
    // min x^2 from x = 10
    let objective = FnObjective::new(1, |x| x[0] * x[0], |x, g| g[0] = 2.0 * x[0]);
    ProblemData::new(
        sparse::from_triplets(0, 1, Vec::new()),
        Box::new(objective),
        vec![f64::NEG_INFINITY],
        vec![f64::INFINITY],
        Vec::new(),
        Vec::new(),
    )
    .with_initial_x(vec![10.0])
    .into()
}

fn build_slp_disc() -> BenchProblem {
    // min (x - 2)^2 + (y - 1)^2  s.t.  x^2 + y^2 <= 1
    let objective = FnObjective::new(
        2,
        |x| (x[0] - 2.0).powi(2) + (x[1] - 1.0).powi(2),
        |x, g| {
            g[0] = 2.0 * (x[0] - 2.0);
            g[1] = 2.0 * (x[1] - 1.0);
        },
    );
    let disc = FnConstraint::new(
        0,
        2,
        vec![0, 1],
        |x| x[0] * x[0] + x[1] * x[1],
        |x, g| {
            g[0] = 2.0 * x[0];
            g[1] = 2.0 * x[1];
        },
    );
    BenchProblem {
        problem: ProblemData::new(
            sparse::from_triplets(1, 2, Vec::new()),
            Box::new(objective),
            vec![f64::NEG_INFINITY; 2],
            vec![f64::INFINITY; 2],
            vec![f64::NEG_INFINITY],
            vec![1.0],
        ),
        constraints: vec![Box::new(disc)],
    }
}

fn build_lp_random_small() -> BenchProblem {
    generate_random_lp(20, 10, 0.3, 7).into()
}

fn build_qp_random_small() -> BenchProblem {
    generate_random_qp(10, 5, 0.3, 11).into()
}

// ============================================================================
// Problem registry
// ============================================================================

pub fn synthetic_test_problems() -> Vec<TestProblem> {
    vec![
        TestProblem {
            name: "SYN_LP_COVER",
            problem_class: "LP",
            builder: build_lp_cover,
            expected_status: "Optimal",
        },
        TestProblem {
            name: "SYN_LP_UNBOUNDED",
            problem_class: "LP",
            builder: build_lp_unbounded,
            expected_status: "Unbounded",
        },
        TestProblem {
            name: "SYN_LP_INFEASIBLE",
            problem_class: "LP",
            builder: build_lp_infeasible,
            expected_status: "Infeasible",
        },
        TestProblem {
            name: "SYN_LP_RANDOM",
            problem_class: "LP",
            builder: build_lp_random_small,
            expected_status: "Optimal",
        },
        TestProblem {
            name: "SYN_QP_BOX",
            problem_class: "QP",
            builder: build_qp_box,
            expected_status: "Optimal",
        },
        TestProblem {
            name: "SYN_QP_RANDOM",
            problem_class: "QP",
            builder: build_qp_random_small,
            expected_status: "Optimal",
        },
        TestProblem {
            name: "SYN_SLP_SQUARE",
            problem_class: "NLP",
            builder: build_slp_square,
            expected_status: "Optimal",
        },
        TestProblem {
            name: "SYN_SLP_DISC",
            problem_class: "NLP-C",
            builder: build_slp_disc,
            expected_status: "Optimal",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds() {
        for p in synthetic_test_problems() {
            let built = (p.builder)();
            assert!(built.problem.validate().is_ok(), "{}", p.name);
        }
    }

    #[test]
    fn test_random_lp_is_seeded() {
        let a = generate_random_lp(8, 4, 0.5, 3);
        let b = generate_random_lp(8, 4, 0.5, 3);
        assert_eq!(a.row_lower, b.row_lower);
        assert_eq!(a.A.nnz(), b.A.nnz());
    }
}
