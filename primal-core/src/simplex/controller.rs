//! Status controller: refactorization, status checks and termination.

use std::time::Instant;

use tracing::{info, warn};

use super::direction;
use super::iterate::{InnerExit, LoopState};
use super::progress::Progress;
use super::variables::VarStatus;
use super::PrimalSimplex;
use crate::linalg::FactorizationError;
use crate::problem::{SecondaryStatus, SolveStatus, TerminationStatus};

/// Result of a status check.
enum Check {
    Continue,
    Done(TerminationStatus),
}

fn done(status: SolveStatus, secondary: SecondaryStatus) -> Check {
    Check::Done(TerminationStatus::with_secondary(status, secondary))
}

impl PrimalSimplex {
    /// Run the primal simplex from the current state.
    ///
    /// Warm starts from the current basis and values. Every outcome is
    /// reported through the returned status; the state stays valid for a
    /// further call.
    pub fn solve_primal(&mut self) -> TerminationStatus {
        let start = Instant::now();
        self.solve_iterations = 0;
        self.ray = None;
        self.clear_nonlinear_rows();
        self.progress.reset();
        self.generator.reset();
        self.tracker.reset_weight();
        self.tracker.set_tolerance(self.settings.primal_tolerance);
        self.evaluator.primal_tolerance = self.settings.primal_tolerance;
        self.evaluator.acceptable_pivot = self.settings.acceptable_pivot;

        let status = self.run_primal();

        self.flagged_at_exit = self.vars.num_flagged();
        self.vars.unflag_all();
        self.solve_time_ms = start.elapsed().as_millis() as u64;
        self.status = status;

        if self.settings.verbose {
            info!(
                status = %status,
                iterations = self.solve_iterations,
                refactorizations = self.refactorizations,
                objective = self.objective_value(),
                "primal simplex finished"
            );
        }
        status
    }

    fn run_primal(&mut self) -> TerminationStatus {
        let tol = self.settings.primal_tolerance;
        if let Some(j) = self.vars.crossed_bounds(tol) {
            warn!(
                var = j,
                lower = self.vars.lower[j],
                upper = self.vars.upper[j],
                "inconsistent bounds"
            );
            return TerminationStatus::with_secondary(
                SolveStatus::Infeasible,
                SecondaryStatus::InconsistentBounds,
            );
        }

        let mut state = LoopState::default();
        loop {
            if let Err(status) = self.refactorize_with_recovery() {
                return status;
            }
            state.refactor_at = None;
            self.compute_primal();
            self.price_current();

            if let Check::Done(status) = self.check_status(&mut state) {
                return status;
            }
            self.save_snapshot();

            match self.while_iterating(&mut state) {
                InnerExit::Refactorize | InnerExit::LooksOptimal => {}
                InnerExit::LooksUnbounded => {
                    if self.tracker.number_infeasibilities() == 0 {
                        return TerminationStatus::new(SolveStatus::Unbounded);
                    }
                    self.ray = None;
                    if !self.tracker.escalate() {
                        warn!("infeasibility weight saturated on an unbounded direction");
                        return TerminationStatus::with_secondary(
                            SolveStatus::Infeasible,
                            SecondaryStatus::WeightSaturated,
                        );
                    }
                    self.progress.reset();
                }
                InnerExit::IterationLimit => {
                    return TerminationStatus::new(SolveStatus::IterationLimit);
                }
                InnerExit::Aborted => {
                    return TerminationStatus::with_secondary(
                        SolveStatus::Abandoned,
                        SecondaryStatus::UserAbort,
                    );
                }
                InnerExit::OutOfMemory => {
                    warn!("factorization workspace cannot grow");
                    return TerminationStatus::with_secondary(
                        SolveStatus::Abandoned,
                        SecondaryStatus::OutOfMemory,
                    );
                }
            }
        }
    }

    /// Decide whether to continue, given freshly priced values.
    fn check_status(&mut self, state: &mut LoopState) -> Check {
        let infeasible = self.tracker.number_infeasibilities() > 0;
        if !infeasible && self.tracker.note_feasible() {
            self.compute_costs();
            self.compute_duals();
        }

        let sum = self.tracker.sum_infeasibilities();
        let objective = self.objective_value();
        let previous = self.progress.last_infeasibility();
        match self.progress.update(objective, sum, self.solve_iterations) {
            Progress::Looping if !infeasible => {
                return done(SolveStatus::Optimal, SecondaryStatus::LoopingDetected);
            }
            Progress::Looping => {
                warn!(sum_inf = sum, "looping while infeasible, raising weight");
                if !self.tracker.escalate() {
                    return done(SolveStatus::Infeasible, SecondaryStatus::WeightSaturated);
                }
                self.progress.reset();
                self.price_current();
            }
            Progress::Stalled if infeasible => {
                if previous.map_or(false, |p| sum >= p) && self.tracker.grow_on_stall() {
                    self.price_current();
                }
            }
            _ => {}
        }

        if self.settings.verbose {
            info!(
                iter = self.solve_iterations,
                obj = objective,
                sum_inf = sum,
                num_inf = self.tracker.number_infeasibilities(),
                weight = self.tracker.weight(),
                flagged = self.vars.num_flagged(),
                "status check"
            );
        }

        let (unflagged, flagged) = direction::price(&self.vars, self.settings.dual_tolerance);
        if unflagged > 0.0 {
            return Check::Continue;
        }
        if flagged > 0.0 {
            state.times_optimal += 1;
            self.vars.unflag_all();
            if state.times_optimal <= self.settings.max_times_optimal {
                return Check::Continue;
            }
            if !infeasible {
                return done(SolveStatus::Optimal, SecondaryStatus::FlaggedAtOptimum);
            }
        }
        if !infeasible {
            return Check::Done(TerminationStatus::new(SolveStatus::Optimal));
        }

        // Dual feasible for the weighted problem but still infeasible.
        let candidate = self.generator.phase_one_candidate(
            &self.vars,
            &self.basis,
            &self.tracker,
            &self.matrix,
            self.factor.as_ref(),
            self.settings.dual_tolerance,
            &mut self.work.phase_one_duals,
        );
        match candidate {
            None => {
                self.ray = Some(self.work.phase_one_duals.clone());
                done(SolveStatus::Infeasible, SecondaryStatus::None)
            }
            Some(mover) => {
                // Force the mover while it keeps lowering the infeasibility.
                let tol = self.settings.primal_tolerance;
                let stuck = state.phase_one_sum.map_or(false, |p| sum >= p - tol);
                if !stuck {
                    state.phase_one = Some(mover);
                    state.phase_one_sum = Some(sum);
                    return Check::Continue;
                }
                state.phase_one_sum = None;
                if !self.tracker.escalate() {
                    warn!("infeasibility weight saturated");
                    self.ray = Some(self.work.phase_one_duals.clone());
                    return done(SolveStatus::Infeasible, SecondaryStatus::WeightSaturated);
                }
                self.progress.reset();
                self.price_current();
                Check::Continue
            }
        }
    }

    /// Refactorize, repairing a singular basis with logical variables.
    fn refactorize_with_recovery(&mut self) -> Result<(), TerminationStatus> {
        let abandon = TerminationStatus::with_secondary(
            SolveStatus::Abandoned,
            SecondaryStatus::FactorizationFailed,
        );
        match self.refactorize() {
            Ok(()) => Ok(()),
            Err(FactorizationError::Singular {
                dependent,
                free_rows,
            }) => {
                warn!(dependent = dependent.len(), "singular basis, substituting logicals");
                self.patch_singular(&dependent, &free_rows);
                if self.refactorize().is_ok() {
                    return Ok(());
                }
                if self.restore_snapshot() {
                    warn!("restored last good basis");
                    return Ok(());
                }
                Err(abandon)
            }
            Err(err) => {
                warn!(error = %err, "factorization failed");
                Err(abandon)
            }
        }
    }

    /// Put the logical of each free row where a dependent column was, and
    /// flag the variable it replaces.
    fn patch_singular(&mut self, dependent: &[usize], free_rows: &[usize]) {
        let tol = self.settings.primal_tolerance;
        for (&position, &row) in dependent.iter().zip(free_rows) {
            let logical = self.n + row;
            if self.vars.status(logical) == VarStatus::Basic {
                continue;
            }
            let out = self.basis.replace(position, logical);
            self.vars.set_status(logical, VarStatus::Basic);
            self.vars.settle_nonbasic(out, tol);
            self.vars.set_flagged(out);
        }
        self.generator.reset();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::linalg::sparse::from_triplets;
    use crate::linalg::{AugmentedMatrix, DenseLu, Factorization, UpdateQuality};
    use crate::problem::{ProblemData, SolverSettings};

    /// min cost * x  s.t.  row_lower <= x <= row_upper,  0 <= x.
    fn one_row(cost: f64, row_lower: f64, row_upper: f64) -> ProblemData {
        ProblemData::linear(
            from_triplets(1, 1, vec![(0, 0, 1.0)]),
            vec![cost],
            vec![0.0],
            vec![10.0],
            vec![row_lower],
            vec![row_upper],
        )
    }

    #[test]
    fn test_phase_one_mover_restores_feasibility() {
        // With weight 1 the weighted problem prefers x = 0, below the row.
        let mut settings = SolverSettings::default();
        settings.penalty.initial_weight = 1.0;
        settings.penalty.feasible_weight = 1.0;
        settings.penalty.max_weight = 2.0;
        let mut simplex =
            PrimalSimplex::new(one_row(1000.0, 1.0, f64::INFINITY), settings).unwrap();

        let status = simplex.solve_primal();
        assert_eq!(status.status, SolveStatus::Optimal);
        assert_eq!(status.secondary, SecondaryStatus::None);
        assert!((simplex.primal_values()[0] - 1.0).abs() < 1e-9);
        assert_eq!(simplex.iterations(), 1);
        assert_eq!(simplex.infeasibility_weight(), 1.0);
    }

    /// Dense LU whose update storage is always full.
    struct FullEtaFile {
        inner: DenseLu,
        grows: Rc<Cell<usize>>,
    }

    impl Factorization for FullEtaFile {
        fn refactorize(
            &mut self,
            matrix: &AugmentedMatrix,
            basis: &[usize],
        ) -> Result<(), FactorizationError> {
            self.inner.refactorize(matrix, basis)
        }

        fn ftran(&self, rhs: &mut [f64]) {
            self.inner.ftran(rhs);
        }

        fn btran(&self, rhs: &mut [f64]) {
            self.inner.btran(rhs);
        }

        fn replace_column(&mut self, _position: usize, _column: &[f64]) -> UpdateQuality {
            UpdateQuality::OutOfMemory
        }

        fn pivots(&self) -> usize {
            self.inner.pivots()
        }

        fn pivot_tolerance(&self) -> f64 {
            self.inner.pivot_tolerance()
        }

        fn set_pivot_tolerance(&mut self, value: f64) {
            self.inner.set_pivot_tolerance(value);
        }

        fn zero_tolerance(&self) -> f64 {
            self.inner.zero_tolerance()
        }

        fn set_zero_tolerance(&mut self, value: f64) {
            self.inner.set_zero_tolerance(value);
        }

        fn grow_workspace(&mut self) -> bool {
            self.grows.set(self.grows.get() + 1);
            true
        }
    }

    #[test]
    fn test_workspace_grows_once_then_abandons() {
        let grows = Rc::new(Cell::new(0));
        let factor = FullEtaFile {
            inner: DenseLu::new(1, 4),
            grows: Rc::clone(&grows),
        };
        let mut simplex = PrimalSimplex::with_factorization(
            one_row(-1.0, f64::NEG_INFINITY, 1.0),
            SolverSettings::default(),
            Box::new(factor),
        )
        .unwrap();

        let status = simplex.solve_primal();
        assert_eq!(status.status, SolveStatus::Abandoned);
        assert_eq!(status.secondary, SecondaryStatus::OutOfMemory);
        assert_eq!(grows.get(), 1);
    }
}
