//! Problem data structures, settings, and solve results.
//!
//! The solver works with the bounded form:
//!
//! ```text
//! minimize    f(x)
//! subject to  row_lower <= A x <= row_upper
//!             col_lower <=  x  <= col_upper
//! ```
//!
//! where `f` is any [`Objective`]. Infinite bounds are `±f64::INFINITY`;
//! magnitudes at or above [`INFINITE_BOUND`] are treated the same way.

use std::fmt;

use crate::error::{PrimalResult, SolveError};
use crate::linalg::sparse::SparseCsc;
use crate::objective::{LinearObjective, NegatedObjective, Objective};
use crate::simplex::direction::DirectionMode;
use crate::simplex::nonlinear_cost::{PenaltyLadder, PenaltySegment};

/// Bounds at or beyond this magnitude are infinite.
pub const INFINITE_BOUND: f64 = 1e30;

/// Normalize a bound so that huge magnitudes become true infinities.
#[inline]
pub fn normalize_bound(v: f64) -> f64 {
    if v >= INFINITE_BOUND {
        f64::INFINITY
    } else if v <= -INFINITE_BOUND {
        f64::NEG_INFINITY
    } else {
        v
    }
}

/// Optimization problem in bounded form.
///
/// # Dimensions
///
/// - `n`: number of columns (length of x)
/// - `m`: number of rows (rows of A)
/// - A: m × n
#[allow(non_snake_case)] // A is standard mathematical notation
pub struct ProblemData {
    /// Constraint matrix A (m × n, CSC format)
    pub A: SparseCsc,

    /// Objective over the n columns
    pub objective: Box<dyn Objective>,

    /// Column lower bounds (length n)
    pub col_lower: Vec<f64>,

    /// Column upper bounds (length n)
    pub col_upper: Vec<f64>,

    /// Row lower bounds (length m)
    pub row_lower: Vec<f64>,

    /// Row upper bounds (length m)
    pub row_upper: Vec<f64>,

    /// Optional starting point (length n); clamped into the column bounds
    pub initial_x: Option<Vec<f64>>,

    /// Maximize instead of minimize
    pub maximize: bool,
}

impl fmt::Debug for ProblemData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProblemData")
            .field("n", &self.num_vars())
            .field("m", &self.num_constraints())
            .field("nnz", &self.A.nnz())
            .field("objective", &self.objective)
            .field("maximize", &self.maximize)
            .finish()
    }
}

impl ProblemData {
    #[allow(non_snake_case)]
    pub fn new(
        A: SparseCsc,
        objective: Box<dyn Objective>,
        col_lower: Vec<f64>,
        col_upper: Vec<f64>,
        row_lower: Vec<f64>,
        row_upper: Vec<f64>,
    ) -> Self {
        Self {
            A,
            objective,
            col_lower,
            col_upper,
            row_lower,
            row_upper,
            initial_x: None,
            maximize: false,
        }
    }

    /// Linear program with cost vector `c`.
    #[allow(non_snake_case)]
    pub fn linear(
        A: SparseCsc,
        c: Vec<f64>,
        col_lower: Vec<f64>,
        col_upper: Vec<f64>,
        row_lower: Vec<f64>,
        row_upper: Vec<f64>,
    ) -> Self {
        Self::new(
            A,
            Box::new(LinearObjective::new(c)),
            col_lower,
            col_upper,
            row_lower,
            row_upper,
        )
    }

    pub fn with_initial_x(mut self, x: Vec<f64>) -> Self {
        self.initial_x = Some(x);
        self
    }

    /// Get the number of columns (n)
    pub fn num_vars(&self) -> usize {
        self.A.cols()
    }

    /// Get the number of rows (m)
    pub fn num_constraints(&self) -> usize {
        self.A.rows()
    }

    /// Objective to minimize (negated when maximizing).
    pub(crate) fn into_minimization(self) -> (Self, bool) {
        if !self.maximize {
            return (self, false);
        }
        let Self {
            A,
            objective,
            col_lower,
            col_upper,
            row_lower,
            row_upper,
            initial_x,
            ..
        } = self;
        let negated = Self {
            A,
            objective: Box::new(NegatedObjective::new(objective)),
            col_lower,
            col_upper,
            row_lower,
            row_upper,
            initial_x,
            maximize: false,
        };
        (negated, true)
    }

    /// Validate dimensions and bound values.
    ///
    /// Crossed bounds (`lower > upper`) are not an input error; the solve
    /// reports them as infeasible.
    pub fn validate(&self) -> PrimalResult<()> {
        let n = self.num_vars();
        let m = self.num_constraints();

        let checks: [(&'static str, usize, usize); 5] = [
            ("col_lower", self.col_lower.len(), n),
            ("col_upper", self.col_upper.len(), n),
            ("row_lower", self.row_lower.len(), m),
            ("row_upper", self.row_upper.len(), m),
            ("objective", self.objective.num_vars(), n),
        ];
        for (what, got, expected) in checks {
            if got != expected {
                return Err(SolveError::DimensionMismatch { what, got, expected });
            }
        }

        if let Some(ref x) = self.initial_x {
            if x.len() != n {
                return Err(SolveError::DimensionMismatch {
                    what: "initial_x",
                    got: x.len(),
                    expected: n,
                });
            }
            if x.iter().any(|v| !v.is_finite()) {
                return Err(SolveError::InvalidProblem(
                    "initial_x contains non-finite values".to_string(),
                ));
            }
        }

        let bounds = self
            .col_lower
            .iter()
            .chain(&self.col_upper)
            .chain(&self.row_lower)
            .chain(&self.row_upper);
        if bounds.into_iter().any(|v| v.is_nan()) {
            return Err(SolveError::InvalidProblem("bound is NaN".to_string()));
        }

        if self.A.data().iter().any(|v| !v.is_finite()) {
            return Err(SolveError::InvalidProblem(
                "A contains non-finite entries".to_string(),
            ));
        }

        Ok(())
    }
}

/// Infeasibility-weight configuration for the nonlinear cost tracker.
#[derive(Debug, Clone)]
pub struct PenaltySettings {
    /// Weight applied to bound violations at the start of a solve
    pub initial_weight: f64,

    /// Weight used once the iterate first becomes feasible
    pub feasible_weight: f64,

    /// Weights above this are saturated; reaching it means infeasible
    pub max_weight: f64,

    /// Growth when the infeasibility stalls between status checks
    pub stall_growth: f64,

    /// Stall growth is only applied below this weight
    pub stall_cap: f64,

    /// Growth when the working problem looks optimal or unbounded while infeasible
    pub escalation_growth: f64,

    /// Piecewise multiplier of the weight by violation distance
    pub ladder: PenaltyLadder,
}

impl Default for PenaltySettings {
    fn default() -> Self {
        Self {
            initial_weight: 1e10,
            feasible_weight: 1e6,
            max_weight: 1e20,
            stall_growth: 1.5,
            stall_cap: 1e14,
            escalation_growth: 5.0,
            ladder: PenaltyLadder::uniform(),
        }
    }
}

/// Trust-region constants for the SLP loop.
#[derive(Debug, Clone)]
pub struct TrustRegionSettings {
    /// Starting half-width for every nonlinear column
    pub initial_width: f64,

    /// Upper limit on any half-width
    pub max_width: f64,

    /// Factor applied when a move agrees with the two preceding moves
    pub grow: f64,

    /// Factor applied when a move reverses the previous one
    pub shrink: f64,

    /// Factor applied to every half-width when a pass is rejected
    pub reject_shrink: f64,

    /// Minimum actual/predicted drop ratio for accepting a full step
    pub accept_ratio: f64,

    /// Try a line search on the true objective before rejecting a step
    pub line_search: bool,

    /// Drop below which a small move ends the loop
    pub drop_tolerance: f64,

    /// Passes before the linearized target drop may end the loop
    pub target_drop_after: usize,

    /// Pass budget used by the top-level `solve`
    pub max_passes: usize,

    /// Largest column move under which a pass counts as converged
    pub delta_tolerance: f64,
}

impl Default for TrustRegionSettings {
    fn default() -> Self {
        Self {
            initial_width: 0.5,
            max_width: 1e6,
            grow: 1.5,
            shrink: 0.5,
            reject_shrink: 0.5,
            accept_ratio: 1e-4,
            line_search: true,
            drop_tolerance: 1e-4,
            target_drop_after: 3,
            max_passes: 200,
            delta_tolerance: 1e-6,
        }
    }
}

/// Elastic-penalty configuration for the constrained SLP loop.
#[derive(Debug, Clone)]
pub struct ArtificialPenaltySettings {
    /// Segments (width, cost) used until the iterate is first feasible
    pub ladder: PenaltyLadder,

    /// Segments used after the iterate is first feasible
    pub feasible_ladder: PenaltyLadder,

    /// Segment cost floor above the row dual once feasible
    pub dual_margin: f64,

    /// Growth applied when the artificial sum stalls
    pub growth: f64,

    /// Stall growth is only applied while the first segment cost is below this
    pub growth_cap: f64,

    /// Number of passes in the stall window
    pub stall_window: usize,

    /// Artificial sum below which the iterate counts as feasible
    pub feasible_sum: f64,

    /// Step halvings tried before a pass is rejected
    pub max_backtracks: usize,
}

impl Default for ArtificialPenaltySettings {
    fn default() -> Self {
        Self {
            ladder: PenaltyLadder::new(vec![
                PenaltySegment::new(1e-2, 1e7),
                PenaltySegment::new(1e2, 1e8),
                PenaltySegment::new(f64::INFINITY, 1e9),
            ]),
            feasible_ladder: PenaltyLadder::new(vec![
                PenaltySegment::new(1e-2, 1e-3),
                PenaltySegment::new(1e2, 1e6),
                PenaltySegment::new(f64::INFINITY, 1e9),
            ]),
            dual_margin: 1e-3,
            growth: 1.5,
            growth_cap: 1e7,
            stall_window: 5,
            feasible_sum: 1e-3,
            max_backtracks: 4,
        }
    }
}

/// Solver settings and parameters.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Maximum number of simplex iterations per `solve_primal` call
    pub max_iter: usize,

    /// Enable verbose logging
    pub verbose: bool,

    /// Primal feasibility tolerance
    pub primal_tolerance: f64,

    /// Reduced-cost (dual feasibility) tolerance
    pub dual_tolerance: f64,

    /// Smallest basic direction entry accepted in the ratio test
    pub acceptable_pivot: f64,

    /// Relative pivot threshold for basis updates
    pub pivot_tolerance: f64,

    /// Absolute zero threshold for the factorization
    pub zero_tolerance: f64,

    /// Basis updates between refactorizations
    pub refactor_interval: usize,

    /// Initial eta-file capacity of the factorization
    pub eta_capacity: usize,

    /// Direction mode for nonlinear objectives
    pub nonlinear_mode: DirectionMode,

    /// Conjugate-gradient restart after this many multiples of the superbasic count
    pub cg_restart_multiple: usize,

    /// Consecutive degenerate pivots before the entering variable is flagged
    pub degenerate_flag_after: usize,

    /// Iterations between bulk unflagging
    pub unflag_interval: usize,

    /// Interior moves without a pivot before bulk unflagging
    pub interior_unflag_after: usize,

    /// Optimality re-checks with flagged variables before accepting optimality
    pub max_times_optimal: usize,

    /// Seed for the leaving-variable tie-break
    pub seed: u64,

    /// Infeasibility weight configuration
    pub penalty: PenaltySettings,

    /// SLP trust region configuration
    pub trust_region: TrustRegionSettings,

    /// Constrained SLP elastic penalties
    pub artificial: ArtificialPenaltySettings,
}

impl Default for SolverSettings {
    fn default() -> Self {
        // PRIMAL_MAX_ITER caps simplex iterations per solve.
        let max_iter = std::env::var("PRIMAL_MAX_ITER")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(20_000);

        let refactor_interval = std::env::var("PRIMAL_REFACTOR_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(100);

        Self {
            max_iter,
            verbose: false,
            primal_tolerance: 1e-7,
            dual_tolerance: 1e-7,
            acceptable_pivot: 1e-7,
            pivot_tolerance: 1e-8,
            zero_tolerance: 1e-11,
            refactor_interval,
            eta_capacity: 2 * refactor_interval,
            nonlinear_mode: DirectionMode::ConjugateGradient,
            cg_restart_multiple: 2,
            degenerate_flag_after: 50,
            unflag_interval: 507,
            interior_unflag_after: 5,
            max_times_optimal: 4,
            seed: 0x5eed_cafe,
            penalty: PenaltySettings::default(),
            trust_region: TrustRegionSettings::default(),
            artificial: ArtificialPenaltySettings::default(),
        }
    }
}

/// Primary termination status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Optimal solution found
    Optimal,

    /// No point satisfies the bounds (dual ray available when proven by pricing)
    Infeasible,

    /// Objective decreases without bound along a feasible ray
    Unbounded,

    /// Iteration or pass limit reached
    IterationLimit,

    /// Stopped by the cancellation hook or unrecoverable numerical trouble
    Abandoned,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::Infeasible => write!(f, "Infeasible"),
            SolveStatus::Unbounded => write!(f, "Unbounded"),
            SolveStatus::IterationLimit => write!(f, "Iteration Limit"),
            SolveStatus::Abandoned => write!(f, "Abandoned"),
        }
    }
}

/// Secondary diagnostic code attached to a termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecondaryStatus {
    #[default]
    None,
    /// A variable has `lower > upper`
    InconsistentBounds,
    /// Infeasibility weight reached its ceiling
    WeightSaturated,
    /// Progress window detected looping; the feasible iterate was accepted
    LoopingDetected,
    /// Optimality accepted after repeated re-checks with flagged variables
    FlaggedAtOptimum,
    /// SLP pass budget exhausted
    PassLimit,
    /// Cancellation hook requested a stop
    UserAbort,
    /// Basis could not be factorized
    FactorizationFailed,
    /// Factorization workspace could not grow
    OutOfMemory,
    /// Constraint descriptor refers to a missing or repeated row
    InvalidConstraint,
}

impl fmt::Display for SecondaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SecondaryStatus::None => "none",
            SecondaryStatus::InconsistentBounds => "inconsistent bounds",
            SecondaryStatus::WeightSaturated => "infeasibility weight saturated",
            SecondaryStatus::LoopingDetected => "looping detected",
            SecondaryStatus::FlaggedAtOptimum => "flagged variables at optimum",
            SecondaryStatus::PassLimit => "pass limit",
            SecondaryStatus::UserAbort => "user abort",
            SecondaryStatus::FactorizationFailed => "factorization failed",
            SecondaryStatus::OutOfMemory => "out of memory",
            SecondaryStatus::InvalidConstraint => "invalid constraint",
        };
        write!(f, "{}", s)
    }
}

/// Status returned by every solve entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationStatus {
    pub status: SolveStatus,
    pub secondary: SecondaryStatus,
}

impl TerminationStatus {
    pub fn new(status: SolveStatus) -> Self {
        Self {
            status,
            secondary: SecondaryStatus::None,
        }
    }

    pub fn with_secondary(status: SolveStatus, secondary: SecondaryStatus) -> Self {
        Self { status, secondary }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.secondary {
            SecondaryStatus::None => write!(f, "{}", self.status),
            secondary => write!(f, "{} ({})", self.status, secondary),
        }
    }
}

/// Solve result with solution and diagnostics.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Solution status
    pub status: SolveStatus,

    /// Secondary diagnostic code
    pub secondary: SecondaryStatus,

    /// Column values (length n)
    pub x: Vec<f64>,

    /// Row activities (length m)
    pub row_activity: Vec<f64>,

    /// Row duals (length m)
    pub duals: Vec<f64>,

    /// Column reduced costs (length n)
    pub reduced_costs: Vec<f64>,

    /// Objective value at `x`
    pub obj_val: f64,

    /// Unbounded direction over columns, or infeasibility ray over rows
    pub ray: Option<Vec<f64>>,

    /// Detailed solve information and diagnostics
    pub info: SolveInfo,
}

/// Detailed solve information and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SolveInfo {
    /// Simplex iterations (pivots plus value-only moves)
    pub iterations: usize,

    /// Number of refactorizations
    pub refactorizations: usize,

    /// Completed SLP passes (0 for pure simplex solves)
    pub slp_passes: usize,

    /// Total solve time (milliseconds)
    pub solve_time_ms: u64,

    /// Sum of primal bound violations
    pub primal_infeasibility: f64,

    /// Sum of reduced-cost violations
    pub dual_infeasibility: f64,

    /// Final infeasibility weight
    pub infeasibility_weight: f64,

    /// Variables still flagged at termination
    pub flagged: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::from_triplets;

    fn small_problem() -> ProblemData {
        ProblemData::linear(
            from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]),
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![f64::INFINITY; 2],
            vec![4.0],
            vec![f64::INFINITY],
        )
    }

    #[test]
    fn test_validate_ok() {
        assert!(small_problem().validate().is_ok());
    }

    #[test]
    fn test_validate_dimension_mismatch() {
        let mut prob = small_problem();
        prob.row_upper.push(1.0);
        match prob.validate() {
            Err(SolveError::DimensionMismatch { what, got, expected }) => {
                assert_eq!(what, "row_upper");
                assert_eq!(got, 2);
                assert_eq!(expected, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_crossed_bounds_are_not_an_input_error() {
        let mut prob = small_problem();
        prob.col_lower[0] = 2.0;
        prob.col_upper[0] = 1.0;
        assert!(prob.validate().is_ok());
    }

    #[test]
    fn test_normalize_bound() {
        assert_eq!(normalize_bound(1e31), f64::INFINITY);
        assert_eq!(normalize_bound(-1e30), f64::NEG_INFINITY);
        assert_eq!(normalize_bound(5.0), 5.0);
    }

    #[test]
    fn test_status_display() {
        let s = TerminationStatus::with_secondary(
            SolveStatus::Infeasible,
            SecondaryStatus::InconsistentBounds,
        );
        assert_eq!(s.to_string(), "Infeasible (inconsistent bounds)");
        assert_eq!(TerminationStatus::new(SolveStatus::Optimal).to_string(), "Optimal");
    }
}
