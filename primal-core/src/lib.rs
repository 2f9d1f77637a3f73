//! Primal: a bounded primal simplex for nonlinear objectives
//!
//! This library minimizes an objective over linear constraints with column
//! and row bounds. It supports:
//!
//! - **Linear Programming (LP)**: classic pivoting on the largest reduced cost
//! - **Quadratic Programming (QP)**: exact step lengths along reduced-gradient
//!   directions, leaving superbasic variables between their bounds
//! - **General smooth objectives**: trust-region sequential linear programming
//!   (SLP) on top of the simplex
//! - **Nonlinear constraint rows**: SLP with elastic artificial columns and an
//!   exact-penalty merit
//!
//! # Algorithm
//!
//! Every row gets a logical variable so that iterates satisfy
//! `[A | -I] z = 0`. Bound violations are priced into the objective with a
//! growing weight, so a single phase reaches feasibility and optimality.
//! Key features:
//!
//! - **Composite pricing** with a piecewise infeasibility ladder
//! - **Conjugate-gradient directions** over superbasic variables
//! - **Harris ratio test** with randomized tie-breaking
//! - **Flagging and a progress window** against cycling
//! - **Dense LU with an eta file**, pluggable through [`linalg::Factorization`]
//!
//! # Example
//!
//! ```ignore
//! use primal_core::{ProblemData, SolverSettings, solve};
//! use primal_core::linalg::sparse;
//!
//! // min x + y  s.t.  x + y >= 4,  x, y >= 0
//! let prob = ProblemData::linear(
//!     sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]),
//!     vec![1.0, 1.0],
//!     vec![0.0, 0.0],
//!     vec![f64::INFINITY; 2],
//!     vec![4.0],
//!     vec![f64::INFINITY],
//! );
//!
//! let result = solve(prob, &SolverSettings::default())?;
//! println!("Status: {}", result.status);
//! println!("Optimal value: {}", result.obj_val);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod constraint;
pub mod error;
pub mod linalg;
pub mod objective;
pub mod problem;
pub mod simplex;
pub mod slp;

// Re-export main types
pub use constraint::{Constraint, FnConstraint, Linearization};
pub use error::{PrimalResult, SolveError};
pub use objective::{FnObjective, LinearObjective, Objective, ObjectiveKind, QuadraticObjective};
pub use problem::{
    ArtificialPenaltySettings, PenaltySettings, ProblemData, SecondaryStatus, SolveInfo,
    SolveResult, SolveStatus, SolverSettings, TerminationStatus, TrustRegionSettings,
};
pub use simplex::direction::DirectionMode;
pub use simplex::PrimalSimplex;

/// Main solve entry point.
///
/// Linear and quadratic objectives go straight to the primal simplex;
/// general objectives run the trust-region SLP loop with the pass budget of
/// `settings.trust_region`.
///
/// # Errors
///
/// Only malformed input is an error. Every other outcome, including
/// infeasibility, is reported through [`SolveResult::status`].
pub fn solve(problem: ProblemData, settings: &SolverSettings) -> PrimalResult<SolveResult> {
    let general = problem.objective.kind() == ObjectiveKind::General;
    let mut simplex = PrimalSimplex::new(problem, settings.clone())?;
    if general {
        let trust = &settings.trust_region;
        simplex.solve_slp(trust.max_passes, trust.delta_tolerance);
    } else {
        simplex.solve_primal();
    }
    Ok(simplex.result())
}

/// Solve with nonlinear constraint rows by constrained SLP.
///
/// Each constraint owns one row of `problem`; the row bounds apply to the
/// constraint's function value.
pub fn solve_with_constraints(
    problem: ProblemData,
    constraints: &[Box<dyn Constraint>],
    settings: &SolverSettings,
) -> PrimalResult<SolveResult> {
    let mut simplex = PrimalSimplex::new(problem, settings.clone())?;
    let trust = &settings.trust_region;
    simplex.solve_slp_with_constraints(constraints, trust.max_passes, trust.delta_tolerance);
    Ok(simplex.result())
}
