//! Sequential linear programming.
//!
//! Each pass replaces the objective by its gradient at the incumbent, boxes
//! the nonlinear columns into their trust regions and re-solves warm. The
//! step is kept when the true objective drops by a fair share of what the
//! linearization predicted; otherwise a line search along the step is tried
//! before the pass is undone and the trust regions shrink.

mod constrained;
mod trust;

pub use trust::TrustRegionState;

use tracing::{debug, info};

use crate::objective::{dot, LinearObjective, Objective};
use crate::problem::{SecondaryStatus, SolveStatus, TerminationStatus};
use crate::simplex::PrimalSimplex;

/// Relative predicted drop under which the linearization has nothing left.
const NO_PREDICTED_DROP: f64 = 1e-12;

pub(crate) fn finished(status: SolveStatus, secondary: SecondaryStatus) -> TerminationStatus {
    TerminationStatus::with_secondary(status, secondary)
}

/// Drop target below which the loop stops once enough passes have run.
fn target_tolerance(objective: f64) -> f64 {
    (1e-6 * objective.abs()).min(1e-6).max(1e-8)
}

impl PrimalSimplex {
    /// Minimize the current (nonlinear) objective over the constraints by
    /// trust-region SLP, starting from the current point.
    ///
    /// Linear objectives are solved directly. A start that violates the rows
    /// is first made feasible with a zero objective. When the pass budget
    /// runs out the incumbent is kept and `IterationLimit` is reported.
    pub fn solve_slp(&mut self, max_passes: usize, delta_tolerance: f64) -> TerminationStatus {
        self.begin_slp();
        let n = self.num_vars();
        let mut mask = vec![false; n];
        let count = self.objective().mark_nonlinear(&mut mask);
        if !self.objective().is_nonlinear() || count == 0 {
            return self.solve_primal();
        }

        let columns: Vec<usize> = (0..n).filter(|&j| mask[j]).collect();
        let mut trust = TrustRegionState::new(self, columns, self.settings().trust_region.clone());
        let true_objective = self.replace_objective(Box::new(LinearObjective::zeros(n)));

        let status =
            self.run_slp(true_objective.as_ref(), &mut trust, max_passes, delta_tolerance);

        trust.restore_bounds(self);
        self.replace_objective(true_objective);
        self.set_termination(status);
        if self.settings().verbose {
            info!(
                status = %status,
                passes = self.slp_objective_history().len(),
                objective = self.objective_value(),
                "slp finished"
            );
        }
        status
    }

    fn run_slp(
        &mut self,
        objective: &dyn Objective,
        trust: &mut TrustRegionState,
        max_passes: usize,
        delta_tolerance: f64,
    ) -> TerminationStatus {
        let n = self.num_vars();
        let settings = self.settings().trust_region.clone();
        let mut gradient = vec![0.0; n];

        // Reach the linear rows with the true bounds before any trust box.
        let status = self.solve_primal();
        if matches!(status.status, SolveStatus::Infeasible | SolveStatus::Abandoned) {
            return status;
        }

        for pass in 0..max_passes {
            if self.abort_requested() {
                return finished(SolveStatus::Abandoned, SecondaryStatus::UserAbort);
            }
            self.add_slp_pass();

            let x_old = self.primal_values().to_vec();
            let f_old = objective.value(&x_old);
            objective.gradient(&x_old, &mut gradient);
            self.replace_objective(Box::new(LinearObjective::new(gradient.clone())));
            trust.apply(self, &x_old);
            let checkpoint = self.checkpoint();

            let status = self.solve_primal();
            match status.status {
                SolveStatus::Optimal | SolveStatus::IterationLimit => {}
                SolveStatus::Abandoned => {
                    self.restore_checkpoint(&checkpoint);
                    return status;
                }
                SolveStatus::Infeasible | SolveStatus::Unbounded => return status,
            }

            let x_new = self.primal_values().to_vec();
            let predicted = dot(&gradient, &x_old) - dot(&gradient, &x_new);
            if predicted <= NO_PREDICTED_DROP * f_old.abs().max(1.0) {
                self.restore_checkpoint(&checkpoint);
                return TerminationStatus::new(SolveStatus::Optimal);
            }
            let f_new = objective.value(&x_new);
            let actual = f_old - f_new;

            let max_delta = if actual > 0.0 && actual >= settings.accept_ratio * predicted {
                trust.record_moves(&x_old, &x_new)
            } else {
                match self.slp_line_search(objective, &x_old, &x_new, f_old) {
                    Some(x_ls) => {
                        trust.shrink_moved(&x_old, &x_ls, settings.shrink);
                        x_old
                            .iter()
                            .zip(&x_ls)
                            .map(|(a, b)| (a - b).abs())
                            .fold(0.0, f64::max)
                    }
                    None => {
                        debug!(pass, predicted, actual, "slp pass rejected");
                        self.restore_checkpoint(&checkpoint);
                        trust.shrink_all(settings.reject_shrink);
                        continue;
                    }
                }
            };

            let f_accepted = objective.value(self.primal_values());
            self.record_accepted(f_accepted);
            let drop = f_old - f_accepted;
            debug!(pass, f = f_accepted, drop, max_delta, "slp pass accepted");

            if max_delta < delta_tolerance && drop < settings.drop_tolerance {
                return TerminationStatus::new(SolveStatus::Optimal);
            }
            if pass + 1 >= settings.target_drop_after {
                let x = self.primal_values().to_vec();
                let target = trust.target_drop(&x, self.reduced_costs());
                if target < target_tolerance(f_accepted) {
                    return TerminationStatus::new(SolveStatus::Optimal);
                }
            }
        }
        finished(SolveStatus::IterationLimit, SecondaryStatus::PassLimit)
    }

    /// Minimize the true objective along `x_new - x_old`. On success the
    /// interpolated point becomes the current point.
    fn slp_line_search(
        &mut self,
        objective: &dyn Objective,
        x_old: &[f64],
        x_new: &[f64],
        f_old: f64,
    ) -> Option<Vec<f64>> {
        if !self.settings().trust_region.line_search {
            return None;
        }
        let change: Vec<f64> = x_new.iter().zip(x_old).map(|(a, b)| a - b).collect();
        let step = objective.step_length(x_old, &change, 1.0);
        if !(step.theta > 0.0 && step.predicted < f_old) {
            return None;
        }
        let x_ls: Vec<f64> = x_old
            .iter()
            .zip(&change)
            .map(|(x, d)| x + step.theta * d)
            .collect();
        self.load_point(&x_ls);
        Some(x_ls)
    }
}
