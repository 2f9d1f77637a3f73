//! Primal simplex over `[A | -I] z = 0` with bounded variables.
//!
//! Infeasibility is priced into the objective by the
//! [`NonlinearCostTracker`](nonlinear_cost::NonlinearCostTracker), so one
//! phase handles both feasibility and optimality. For nonlinear objectives
//! the direction generator moves several non-basic variables at once and the
//! step stops wherever the objective stops decreasing, leaving superbasic
//! variables strictly between their bounds.

pub mod diagnostics;
pub mod direction;
pub mod nonlinear_cost;
pub mod progress;
pub mod step;
pub mod variables;
pub mod workspace;

mod controller;
mod iterate;
mod pivot;

use std::fmt;

use tracing::warn;

use crate::error::{PrimalResult, SolveError};
use crate::linalg::{AugmentedMatrix, DenseLu, Factorization, FactorizationError, SparseCsc};
use crate::objective::Objective;
use crate::problem::{
    normalize_bound, ProblemData, SolveInfo, SolveResult, SolveStatus, SolverSettings,
    TerminationStatus,
};

use diagnostics::DiagnosticsConfig;
use direction::DirectionGenerator;
use nonlinear_cost::NonlinearCostTracker;
use progress::ProgressTracker;
use step::StepLengthEvaluator;
use variables::{BasisMap, VarStatus, VariableStore};
use workspace::SimplexWorkspace;

/// Cancellation hook; returning `true` stops the solve.
pub type AbortCheck = Box<dyn FnMut() -> bool>;

/// Values, statuses, basis and duals at one moment of a solve.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    value: Vec<f64>,
    status: Vec<VarStatus>,
    basis: BasisMap,
    duals: Vec<f64>,
}

/// Solver state for one problem. Everything the solve touches is owned here.
pub struct PrimalSimplex {
    n: usize,
    m: usize,
    maximize: bool,
    matrix: AugmentedMatrix,
    objective: Box<dyn Objective>,
    settings: SolverSettings,
    vars: VariableStore,
    basis: BasisMap,
    factor: Box<dyn Factorization>,
    tracker: NonlinearCostTracker,
    work: SimplexWorkspace,
    generator: DirectionGenerator,
    evaluator: StepLengthEvaluator,
    progress: ProgressTracker,
    diagnostics: DiagnosticsConfig,

    iterations: usize,
    solve_iterations: usize,
    refactorizations: usize,
    slp_passes: usize,
    /// True objective after each accepted SLP pass.
    slp_history: Vec<f64>,
    solve_time_ms: u64,
    flagged_at_exit: usize,
    status: TerminationStatus,
    ray: Option<Vec<f64>>,
    snapshot: Option<Checkpoint>,
    abort_check: Option<AbortCheck>,
    /// Function values reported as row activity for nonlinear rows.
    nonlinear_rows: Vec<Option<f64>>,
}

impl fmt::Debug for PrimalSimplex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimalSimplex")
            .field("n", &self.n)
            .field("m", &self.m)
            .field("objective", &self.objective)
            .field("status", &self.status)
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl PrimalSimplex {
    /// Load a problem with the dense LU factorization.
    pub fn new(problem: ProblemData, settings: SolverSettings) -> PrimalResult<Self> {
        let m = problem.num_constraints();
        let mut factor = DenseLu::new(m, settings.eta_capacity);
        factor.set_pivot_tolerance(settings.pivot_tolerance);
        factor.set_zero_tolerance(settings.zero_tolerance);
        Self::with_factorization(problem, settings, Box::new(factor))
    }

    /// Load a problem with a caller-supplied factorization.
    pub fn with_factorization(
        problem: ProblemData,
        settings: SolverSettings,
        factor: Box<dyn Factorization>,
    ) -> PrimalResult<Self> {
        problem.validate()?;
        let (problem, maximize) = problem.into_minimization();
        let n = problem.num_vars();
        let m = problem.num_constraints();

        let mut vars = VariableStore::new(n, m);
        for j in 0..n {
            vars.lower[j] = normalize_bound(problem.col_lower[j]);
            vars.upper[j] = normalize_bound(problem.col_upper[j]);
        }
        for i in 0..m {
            vars.lower[n + i] = normalize_bound(problem.row_lower[i]);
            vars.upper[n + i] = normalize_bound(problem.row_upper[i]);
        }

        let tol = settings.primal_tolerance;
        for j in 0..n {
            match problem.initial_x {
                Some(ref x) => {
                    let (l, u) = (vars.lower[j], vars.upper[j]);
                    vars.value[j] = if l <= u { x[j].clamp(l, u) } else { x[j] };
                    vars.settle_nonbasic(j, tol);
                }
                None => vars.place_at_bound(j),
            }
        }
        for i in 0..m {
            vars.set_status(n + i, VarStatus::Basic);
        }

        let matrix = AugmentedMatrix::new(problem.A);
        if matrix.num_rows() != m {
            return Err(SolveError::DimensionMismatch {
                what: "A",
                got: matrix.num_rows(),
                expected: m,
            });
        }

        let tracker = NonlinearCostTracker::new(settings.penalty.clone(), n + m, tol);
        let generator = DirectionGenerator::new(n + m, settings.cg_restart_multiple);
        let evaluator = StepLengthEvaluator::new(settings.acceptable_pivot, tol, settings.seed);

        let mut simplex = Self {
            n,
            m,
            maximize,
            matrix,
            objective: problem.objective,
            vars,
            basis: BasisMap::slack(n, m),
            factor,
            tracker,
            work: SimplexWorkspace::new(n, m),
            generator,
            evaluator,
            progress: ProgressTracker::default(),
            diagnostics: DiagnosticsConfig::from_env(),
            iterations: 0,
            solve_iterations: 0,
            refactorizations: 0,
            slp_passes: 0,
            slp_history: Vec::new(),
            solve_time_ms: 0,
            flagged_at_exit: 0,
            status: TerminationStatus::new(SolveStatus::IterationLimit),
            ray: None,
            snapshot: None,
            abort_check: None,
            nonlinear_rows: vec![None; m],
            settings,
        };
        simplex.refactorize()?;
        simplex.compute_primal();
        Ok(simplex)
    }

    /// Install a cancellation hook, checked once per iteration and SLP pass.
    pub fn set_abort_check<F>(&mut self, check: F)
    where
        F: FnMut() -> bool + 'static,
    {
        self.abort_check = Some(Box::new(check));
    }

    pub fn clear_abort_check(&mut self) {
        self.abort_check = None;
    }

    pub(crate) fn take_abort_check(&mut self) -> Option<AbortCheck> {
        self.abort_check.take()
    }

    pub(crate) fn put_abort_check(&mut self, check: Option<AbortCheck>) {
        self.abort_check = check;
    }

    pub(crate) fn abort_requested(&mut self) -> bool {
        match self.abort_check.as_mut() {
            Some(check) => check(),
            None => false,
        }
    }

    pub fn num_vars(&self) -> usize {
        self.n
    }

    pub fn num_rows(&self) -> usize {
        self.m
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SolverSettings {
        &mut self.settings
    }

    pub fn objective(&self) -> &dyn Objective {
        self.objective.as_ref()
    }

    /// Swap the objective; returns the previous one.
    pub fn replace_objective(&mut self, objective: Box<dyn Objective>) -> Box<dyn Objective> {
        std::mem::replace(&mut self.objective, objective)
    }

    pub fn termination(&self) -> TerminationStatus {
        self.status
    }

    pub(crate) fn set_termination(&mut self, status: TerminationStatus) {
        self.status = status;
    }

    /// Simplex iterations over the lifetime of this value.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Simplex iterations of the most recent `solve_primal` call.
    pub fn last_solve_iterations(&self) -> usize {
        self.solve_iterations
    }

    pub fn refactorizations(&self) -> usize {
        self.refactorizations
    }

    /// Fold in the work of a solver that ran on this problem's behalf.
    pub(crate) fn add_counts(&mut self, iterations: usize, refactorizations: usize) {
        self.iterations += iterations;
        self.refactorizations += refactorizations;
    }

    pub(crate) fn add_slp_pass(&mut self) {
        self.slp_passes += 1;
    }

    pub(crate) fn begin_slp(&mut self) {
        self.slp_passes = 0;
        self.slp_history.clear();
    }

    pub(crate) fn record_accepted(&mut self, objective: f64) {
        self.slp_history.push(objective);
    }

    /// Objective after each accepted pass of the last SLP run.
    pub fn slp_objective_history(&self) -> &[f64] {
        &self.slp_history
    }

    /// Structural values.
    pub fn primal_values(&self) -> &[f64] {
        self.vars.structural_values()
    }

    /// Row activities; nonlinear rows report their function value.
    pub fn row_activity(&self) -> Vec<f64> {
        (0..self.m)
            .map(|i| self.nonlinear_rows[i].unwrap_or(self.vars.value[self.n + i]))
            .collect()
    }

    /// Row duals of the last pricing.
    pub fn duals(&self) -> &[f64] {
        &self.work.duals
    }

    pub fn reduced_costs(&self) -> &[f64] {
        &self.vars.dj[..self.n]
    }

    pub fn variable_status(&self, j: usize) -> VarStatus {
        self.vars.status(j)
    }

    pub fn column_bounds(&self, j: usize) -> (f64, f64) {
        (self.vars.lower[j], self.vars.upper[j])
    }

    pub fn row_bounds(&self, i: usize) -> (f64, f64) {
        (self.vars.lower[self.n + i], self.vars.upper[self.n + i])
    }

    pub fn constraint_matrix(&self) -> &SparseCsc {
        self.matrix.structural()
    }

    /// Unbounded direction (columns) or infeasibility ray (rows).
    pub fn ray(&self) -> Option<&[f64]> {
        self.ray.as_deref()
    }

    pub fn objective_value(&self) -> f64 {
        self.objective.value(self.vars.structural_values())
    }

    /// Check that the basis map is a bijection consistent with the statuses.
    pub fn basis_is_consistent(&self) -> bool {
        self.basis.is_consistent(self.vars.statuses())
    }

    pub fn num_flagged(&self) -> usize {
        self.vars.num_flagged()
    }

    pub fn infeasibility_weight(&self) -> f64 {
        self.tracker.weight()
    }

    /// Sum of bound violations over columns and rows at the current values.
    /// Nonlinear rows are measured by their function value.
    pub fn sum_primal_infeasibilities(&self) -> f64 {
        let tol = self.settings.primal_tolerance;
        let columns: f64 = (0..self.n).map(|j| self.vars.violation(j, tol)).sum();
        let rows: f64 = (0..self.m)
            .map(|i| {
                let k = self.n + i;
                match self.nonlinear_rows[i] {
                    Some(v) if v < self.vars.lower[k] - tol => self.vars.lower[k] - v,
                    Some(v) if v > self.vars.upper[k] + tol => v - self.vars.upper[k],
                    Some(_) => 0.0,
                    None => self.vars.violation(k, tol),
                }
            })
            .sum();
        columns + rows
    }

    /// Change the bounds of a structural column. A non-basic column is moved
    /// inside the new bounds.
    pub fn set_column_bounds(&mut self, j: usize, lower: f64, upper: f64) {
        self.set_variable_bounds(j, lower, upper);
    }

    /// Change the bounds of row `i`.
    pub fn set_row_bounds(&mut self, i: usize, lower: f64, upper: f64) {
        self.set_variable_bounds(self.n + i, lower, upper);
    }

    fn set_variable_bounds(&mut self, j: usize, lower: f64, upper: f64) {
        let lower = normalize_bound(lower);
        let upper = normalize_bound(upper);
        self.vars.lower[j] = lower;
        self.vars.upper[j] = upper;
        if self.vars.is_basic(j) || lower > upper {
            return;
        }
        let v = self.vars.value[j];
        if v < lower || v > upper || !v.is_finite() {
            self.vars.value[j] = v.clamp(lower, upper);
            if !self.vars.value[j].is_finite() {
                self.vars.place_at_bound(j);
                return;
            }
        }
        let tol = self.settings.primal_tolerance;
        self.vars.settle_nonbasic(j, tol);
    }

    /// Move to a new structural point. Logical values follow from `A x`;
    /// non-basic variables strictly inside their bounds become superbasic.
    pub fn set_point(&mut self, x: &[f64]) -> PrimalResult<()> {
        if x.len() != self.n {
            return Err(SolveError::DimensionMismatch {
                what: "point",
                got: x.len(),
                expected: self.n,
            });
        }
        self.load_point(x);
        Ok(())
    }

    /// [`set_point`](Self::set_point) for callers that own a point of the
    /// right length.
    pub(crate) fn load_point(&mut self, x: &[f64]) {
        let n = self.n;
        self.vars.value[..n].copy_from_slice(x);
        let mut activity = vec![0.0; self.m];
        self.matrix.row_activity(x, &mut activity);
        self.vars.value[n..].copy_from_slice(&activity);
        let tol = self.settings.primal_tolerance;
        for j in 0..n + self.m {
            if !self.vars.is_basic(j) {
                self.vars.settle_nonbasic(j, tol);
            }
        }
    }

    /// Replace the structural matrix, keeping shape and basis. Returns an
    /// error when the current basis becomes singular; the caller decides how
    /// to recover (the next solve repairs the basis).
    pub fn replace_matrix(&mut self, a: SparseCsc) -> Result<(), FactorizationError> {
        if a.rows() != self.m || a.cols() != self.n {
            return Err(FactorizationError::DimensionMismatch {
                expected: self.m,
                got: a.rows(),
            });
        }
        self.matrix.replace_structural(a);
        self.refactorize()?;
        self.compute_primal();
        Ok(())
    }

    pub(crate) fn set_nonlinear_row_value(&mut self, i: usize, value: Option<f64>) {
        self.nonlinear_rows[i] = value;
    }

    pub(crate) fn clear_nonlinear_rows(&mut self) {
        self.nonlinear_rows.fill(None);
    }

    pub(crate) fn set_duals(&mut self, duals: &[f64]) {
        self.work.duals.copy_from_slice(duals);
    }

    pub(crate) fn set_reduced_costs(&mut self, reduced_costs: &[f64]) {
        self.vars.dj[..self.n].copy_from_slice(reduced_costs);
    }

    pub(crate) fn set_ray(&mut self, ray: Option<Vec<f64>>) {
        self.ray = ray;
    }

    /// Move to `x` with every row logical basic and every column non-basic.
    pub(crate) fn reset_to_slack_basis(&mut self, x: &[f64]) {
        let (n, m) = (self.n, self.m);
        for j in 0..n {
            self.vars.set_status(j, VarStatus::SuperBasic);
        }
        for i in 0..m {
            self.vars.set_status(n + i, VarStatus::Basic);
        }
        self.basis = BasisMap::slack(n, m);
        self.generator.reset();
        self.load_point(x);
        if let Err(err) = self.refactorize() {
            warn!(error = %err, "slack basis failed to factorize");
        }
    }

    /// Copy of the current values, statuses, basis and duals.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            value: self.vars.value.clone(),
            status: self.vars.statuses().to_vec(),
            basis: self.basis.clone(),
            duals: self.work.duals.clone(),
        }
    }

    /// Return to `checkpoint`. Returns `false` when its basis no longer
    /// factorizes.
    pub fn restore_checkpoint(&mut self, checkpoint: &Checkpoint) -> bool {
        self.vars.value.copy_from_slice(&checkpoint.value);
        for (j, &s) in checkpoint.status.iter().enumerate() {
            self.vars.set_status(j, s);
        }
        self.basis = checkpoint.basis.clone();
        self.work.duals.copy_from_slice(&checkpoint.duals);
        self.generator.reset();
        self.refactorize().is_ok()
    }

    /// Remember the current state for recovery from a failed factorization.
    pub fn save_snapshot(&mut self) {
        self.snapshot = Some(self.checkpoint());
    }

    /// Go back to the last snapshot. Returns `false` when there is none or
    /// its basis no longer factorizes.
    pub fn restore_snapshot(&mut self) -> bool {
        match self.snapshot.take() {
            Some(snap) => {
                let ok = self.restore_checkpoint(&snap);
                self.snapshot = Some(snap);
                ok
            }
            None => false,
        }
    }

    /// Solution and diagnostics in the caller's sense (maximization undone).
    pub fn result(&self) -> SolveResult {
        let sign = if self.maximize { -1.0 } else { 1.0 };
        let x = self.primal_values().to_vec();
        let obj_val = sign * self.objective_value();
        let duals = self.work.duals.iter().map(|y| sign * y).collect();
        let reduced_costs = self.reduced_costs().iter().map(|d| sign * d).collect();
        let tol = self.settings.dual_tolerance;
        let (dual_infeasibility, _) = direction::price(&self.vars, tol);

        SolveResult {
            status: self.status.status,
            secondary: self.status.secondary,
            x,
            row_activity: self.row_activity(),
            duals,
            reduced_costs,
            obj_val,
            ray: self.ray.clone(),
            info: SolveInfo {
                iterations: self.iterations,
                refactorizations: self.refactorizations,
                slp_passes: self.slp_passes,
                solve_time_ms: self.solve_time_ms,
                primal_infeasibility: self.sum_primal_infeasibilities(),
                dual_infeasibility: dual_infeasibility.sqrt(),
                infeasibility_weight: self.tracker.weight(),
                flagged: self.flagged_at_exit,
            },
        }
    }

    pub(crate) fn refactorize(&mut self) -> Result<(), FactorizationError> {
        self.refactorizations += 1;
        self.factor.refactorize(&self.matrix, self.basis.variables())
    }

    /// Basic values from the non-basic ones: `z_B = -B⁻¹ N z_N`.
    pub(crate) fn compute_primal(&mut self) {
        let rhs = &mut self.work.rhs;
        rhs.fill(0.0);
        for j in 0..self.n + self.m {
            let v = self.vars.value[j];
            if !self.vars.is_basic(j) && v != 0.0 {
                self.matrix.add_column(j, v, rhs);
            }
        }
        self.factor.ftran(rhs);
        for (pos, &v) in rhs.iter().enumerate() {
            self.vars.value[self.basis.variable(pos)] = -v;
        }
    }

    /// Objective gradient plus infeasibility slopes.
    pub(crate) fn compute_costs(&mut self) {
        let n = self.n;
        self.objective
            .gradient(&self.vars.value[..n], &mut self.work.gradient);
        for j in 0..n + self.m {
            let g = if j < n { self.work.gradient[j] } else { 0.0 };
            self.work.cost[j] = g + self.tracker.cost_slope(j);
        }
    }

    /// Row duals `Bᵀ y = c_B` and reduced costs `c_j - y · a_j`.
    pub(crate) fn compute_duals(&mut self) {
        let duals = &mut self.work.duals;
        for (pos, d) in duals.iter_mut().enumerate() {
            *d = self.work.cost[self.basis.variable(pos)];
        }
        self.factor.btran(duals);
        for j in 0..self.n + self.m {
            self.vars.dj[j] = if self.vars.is_basic(j) {
                0.0
            } else {
                self.work.cost[j] - self.matrix.column_dot(j, &self.work.duals)
            };
        }
    }

    /// Refresh infeasibilities, costs and duals at the current values.
    pub(crate) fn price_current(&mut self) {
        self.tracker.check_infeasibilities(&self.vars);
        self.compute_costs();
        self.compute_duals();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::from_triplets;

    fn problem() -> ProblemData {
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
    fn test_initial_slack_basis() {
        let simplex = PrimalSimplex::new(problem(), SolverSettings::default()).unwrap();
        assert!(simplex.basis_is_consistent());
        assert_eq!(simplex.variable_status(0), VarStatus::AtLower);
        assert_eq!(simplex.variable_status(2), VarStatus::Basic);
        assert_eq!(simplex.row_activity(), vec![0.0]);
    }

    #[test]
    fn test_initial_point_is_clamped() {
        let prob = problem().with_initial_x(vec![-3.0, 2.5]);
        let simplex = PrimalSimplex::new(prob, SolverSettings::default()).unwrap();
        assert_eq!(simplex.primal_values(), &[0.0, 2.5]);
        assert_eq!(simplex.variable_status(1), VarStatus::SuperBasic);
        assert!((simplex.row_activity()[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_set_point_classifies_nonbasics() {
        let mut simplex = PrimalSimplex::new(problem(), SolverSettings::default()).unwrap();
        simplex.set_point(&[1.0, 0.0]).unwrap();
        assert_eq!(simplex.variable_status(0), VarStatus::SuperBasic);
        assert_eq!(simplex.variable_status(1), VarStatus::AtLower);
        assert_eq!(simplex.row_activity(), vec![1.0]);
    }

    #[test]
    fn test_set_point_rejects_wrong_length() {
        let mut simplex = PrimalSimplex::new(problem(), SolverSettings::default()).unwrap();
        let err = simplex.set_point(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            SolveError::DimensionMismatch {
                got: 1,
                expected: 2,
                ..
            }
        ));
        assert_eq!(simplex.primal_values(), &[0.0, 0.0]);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut simplex = PrimalSimplex::new(problem(), SolverSettings::default()).unwrap();
        simplex.save_snapshot();
        simplex.set_point(&[2.0, 3.0]).unwrap();
        assert!(simplex.restore_snapshot());
        assert_eq!(simplex.primal_values(), &[0.0, 0.0]);
        assert_eq!(simplex.variable_status(0), VarStatus::AtLower);
    }

    #[test]
    fn test_set_column_bounds_moves_nonbasic() {
        let mut simplex = PrimalSimplex::new(problem(), SolverSettings::default()).unwrap();
        simplex.set_column_bounds(0, 1.0, 2.0);
        assert_eq!(simplex.primal_values()[0], 1.0);
        assert_eq!(simplex.variable_status(0), VarStatus::AtLower);
    }
}
