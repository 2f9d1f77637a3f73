//! Inner iteration loop: price, build a direction, step, pivot.

use tracing::{debug, warn};

use super::direction::DirectionMode;
use super::pivot::PivotOutcome;
use super::step::StepKind;
use super::PrimalSimplex;

/// Steps shorter than this count as degenerate.
const DEGENERATE_THETA: f64 = 1e-12;

/// Non-basic bound hits shorter than this flag the mover in nonlinear mode.
const SHORT_BOUND_STEP: f64 = 1e-5;

/// Why the inner loop handed control back to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InnerExit {
    Refactorize,
    LooksOptimal,
    LooksUnbounded,
    IterationLimit,
    Aborted,
    OutOfMemory,
}

/// Counters that live for one `solve_primal` call.
#[derive(Debug, Default)]
pub(crate) struct LoopState {
    pub degenerate: usize,
    pub interior: usize,
    pub force_single: bool,
    pub refactor_at: Option<usize>,
    pub times_optimal: usize,
    /// Phase-one mover and its sign, taken alone on the next iteration.
    pub phase_one: Option<(usize, f64)>,
    /// Infeasibility sum when the last phase-one mover was chosen.
    pub phase_one_sum: Option<f64>,
    /// Set once the factorization workspace has been grown.
    pub grown: bool,
}

impl PrimalSimplex {
    pub(crate) fn while_iterating(&mut self, state: &mut LoopState) -> InnerExit {
        let nonlinear = self.objective.is_nonlinear();
        let dual_tol = self.settings.dual_tolerance;
        let n = self.n;

        loop {
            if self.abort_requested() {
                return InnerExit::Aborted;
            }
            if self.solve_iterations >= self.settings.max_iter {
                return InnerExit::IterationLimit;
            }
            let pivots = self.factor.pivots();
            if pivots >= self.settings.refactor_interval
                || state.refactor_at.map_or(false, |at| pivots >= at)
            {
                return InnerExit::Refactorize;
            }

            self.price_current();

            if let Some((q, sign)) = state.phase_one.take() {
                if let Some(exit) = self.phase_one_step(q, sign, state) {
                    return exit;
                }
                continue;
            }

            let mode = if state.force_single || !nonlinear {
                DirectionMode::LargestSingleDj
            } else {
                self.settings.nonlinear_mode
            };
            state.force_single = false;

            let summary = self
                .generator
                .generate(mode, &self.vars, dual_tol, &mut self.work.direction);
            if summary.movers == 0 {
                return InnerExit::LooksOptimal;
            }
            self.generator.complete_basic(
                &self.matrix,
                &self.basis,
                self.factor.as_ref(),
                &mut self.work.rhs,
                &mut self.work.direction,
            );

            let boundary =
                self.evaluator
                    .boundary(&self.vars, &self.basis, &self.tracker, &self.work.direction);
            let shift: f64 = self
                .work
                .direction
                .iter()
                .enumerate()
                .filter(|(_, d)| **d != 0.0)
                .map(|(k, d)| self.tracker.cost_slope(k) * d)
                .sum();
            let max_theta = if boundary.is_finite() {
                boundary.theta
            } else {
                f64::INFINITY
            };
            let objective = self.objective.step_length_shifted(
                &self.vars.value[..n],
                &self.work.direction[..n],
                max_theta,
                shift,
            );
            let decision = self.evaluator.reconcile(boundary, objective);

            if decision.kind == StepKind::Unbounded {
                self.ray = Some(self.work.direction[..n].to_vec());
                return InnerExit::LooksUnbounded;
            }

            self.iterations += 1;
            self.solve_iterations += 1;

            if decision.kind == StepKind::Interior && decision.theta <= DEGENERATE_THETA {
                // No descent along this direction at machine precision.
                state.degenerate += 1;
                match summary.single {
                    Some(q) => self.vars.set_flagged(q),
                    None => {
                        self.generator.reset();
                        state.force_single = true;
                    }
                }
                continue;
            }

            let outcome = self.apply_step(&decision, &summary);
            match outcome {
                PivotOutcome::Exchanged {
                    entering, slight, ..
                } => {
                    state.interior = 0;
                    if decision.theta <= DEGENERATE_THETA {
                        state.degenerate += 1;
                        if state.degenerate >= self.settings.degenerate_flag_after {
                            self.vars.set_flagged(entering);
                            state.degenerate = 0;
                        }
                    } else {
                        state.degenerate = 0;
                    }
                    if slight && state.refactor_at.is_none() {
                        state.refactor_at = Some(self.factor.pivots() + 3);
                    }
                }
                PivotOutcome::Moved => match decision.kind {
                    StepKind::Interior => {
                        state.degenerate = 0;
                        state.interior += 1;
                        if state.interior >= self.settings.interior_unflag_after {
                            self.vars.unflag_all();
                            state.interior = 0;
                        }
                    }
                    StepKind::NonbasicBound { var } => {
                        state.interior = 0;
                        if nonlinear && decision.theta < SHORT_BOUND_STEP {
                            self.vars.set_flagged(var);
                        }
                    }
                    _ => {}
                },
                PivotOutcome::NoEntering => {
                    state.force_single = true;
                }
                PivotOutcome::Rejected { entering } => {
                    warn!(entering, "basis update rejected, refactorizing");
                    self.vars.set_flagged(entering);
                    let current = self.evaluator.acceptable_pivot;
                    self.evaluator.acceptable_pivot = (current * 10.0).min(1e-4).max(current);
                    return InnerExit::Refactorize;
                }
                PivotOutcome::OutOfMemory => return self.out_of_memory(state),
            }

            if self.solve_iterations % self.settings.unflag_interval.max(1) == 0 {
                self.vars.unflag_all();
            }

            if self.diagnostics.should_log(self.solve_iterations) {
                debug!(
                    iter = self.solve_iterations,
                    obj = self.objective.value(&self.vars.value[..n]),
                    sum_inf = self.tracker.sum_infeasibilities(),
                    theta = decision.theta,
                    kind = ?decision.kind,
                    movers = summary.movers,
                    "iteration"
                );
            }
        }
    }

    /// Move the phase-one candidate `q` alone, up to the first bound it
    /// meets. Returns an exit when control must go back to the controller.
    fn phase_one_step(
        &mut self,
        q: usize,
        sign: f64,
        state: &mut LoopState,
    ) -> Option<InnerExit> {
        let n = self.n;
        let summary = self.generator.single_mover(q, sign, &mut self.work.direction);
        self.generator.complete_basic(
            &self.matrix,
            &self.basis,
            self.factor.as_ref(),
            &mut self.work.rhs,
            &mut self.work.direction,
        );
        let boundary =
            self.evaluator
                .boundary(&self.vars, &self.basis, &self.tracker, &self.work.direction);
        let current = self.objective.value(&self.vars.value[..n]);
        let decision = self.evaluator.to_boundary(boundary, current)?;

        self.iterations += 1;
        self.solve_iterations += 1;
        match self.apply_step(&decision, &summary) {
            PivotOutcome::Rejected { entering } => {
                warn!(entering, "phase-one update rejected, refactorizing");
                self.vars.set_flagged(entering);
                Some(InnerExit::Refactorize)
            }
            PivotOutcome::OutOfMemory => Some(self.out_of_memory(state)),
            PivotOutcome::Exchanged { .. } | PivotOutcome::Moved | PivotOutcome::NoEntering => {
                debug!(var = q, theta = decision.theta, "phase-one step");
                None
            }
        }
    }

    /// Grow the update storage once per solve, then give up.
    fn out_of_memory(&mut self, state: &mut LoopState) -> InnerExit {
        if !state.grown && self.factor.grow_workspace() {
            state.grown = true;
            warn!("factorization update storage exhausted, growing");
            return InnerExit::Refactorize;
        }
        InnerExit::OutOfMemory
    }
}
