//! Value updates and basis exchanges.

use super::direction::DirectionSummary;
use super::nonlinear_cost::BoundSide;
use super::step::{StepDecision, StepKind};
use super::variables::VarStatus;
use super::PrimalSimplex;
use crate::linalg::UpdateQuality;

/// What a step did to the basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PivotOutcome {
    /// Values moved, basis unchanged.
    Moved,
    /// `entering` replaced `leaving` in the basis; `slight` marks a small
    /// update pivot.
    Exchanged {
        entering: usize,
        leaving: usize,
        slight: bool,
    },
    /// A basic variable reached a bound but nothing could replace it.
    NoEntering,
    /// The update was rejected; `entering` is a candidate to flag.
    Rejected { entering: usize },
    /// The factorization has no room for the update.
    OutOfMemory,
}

impl PrimalSimplex {
    /// Move along the direction by `decision.theta` and change the basis when
    /// a basic variable blocks.
    pub(crate) fn apply_step(
        &mut self,
        decision: &StepDecision,
        summary: &DirectionSummary,
    ) -> PivotOutcome {
        let theta = decision.theta;
        let tol = self.settings.primal_tolerance;

        // Bound the blocking basic variable lands on, read before the move.
        let landing = match decision.kind {
            StepKind::BasicBound { var, .. } => {
                let d = self.work.direction[var];
                let bound = match (self.tracker.side(var), d > 0.0) {
                    (BoundSide::Below, _) => self.vars.lower[var],
                    (BoundSide::Above, _) => self.vars.upper[var],
                    (BoundSide::Feasible, true) => self.vars.upper[var],
                    (BoundSide::Feasible, false) => self.vars.lower[var],
                };
                Some((var, bound))
            }
            _ => None,
        };

        if theta > 0.0 {
            for (j, &d) in self.work.direction.iter().enumerate() {
                if d != 0.0 {
                    self.vars.value[j] += theta * d;
                }
            }
        }

        match decision.kind {
            StepKind::NonbasicBound { var } => {
                let d = self.work.direction[var];
                self.vars.value[var] = if d > 0.0 {
                    self.vars.upper[var]
                } else {
                    self.vars.lower[var]
                };
            }
            StepKind::BasicBound { .. } => {
                if let Some((var, bound)) = landing {
                    self.vars.value[var] = bound;
                }
            }
            _ => {}
        }

        for j in 0..self.n + self.m {
            let d = self.work.direction[j];
            if d == 0.0 {
                continue;
            }
            if !self.vars.is_basic(j) {
                self.vars.settle_nonbasic(j, tol);
            }
            let (lo, up, v) = (self.vars.lower[j], self.vars.upper[j], self.vars.value[j]);
            self.tracker.set_one(j, lo, up, v);
        }

        let StepKind::BasicBound { row, var: leaving } = decision.kind else {
            return PivotOutcome::Moved;
        };

        let entering = match summary.single {
            Some(q) => Some(q),
            None => self.choose_entering(row),
        };
        match entering {
            Some(q) => self.exchange(row, q, leaving),
            None => PivotOutcome::NoEntering,
        }
    }

    /// Non-basic variable to replace the basic variable of `row`.
    ///
    /// Needs a usable pivot `(B⁻¹ a_j)[row]`; prefers variables that moved
    /// in this step, then more room to their bounds, then larger pivots.
    pub(crate) fn choose_entering(&mut self, row: usize) -> Option<usize> {
        let rho = &mut self.work.row;
        rho.fill(0.0);
        rho[row] = 1.0;
        self.factor.btran(rho);

        let acceptable = self.evaluator.acceptable_pivot;
        let mut best: Option<(usize, bool, f64, f64)> = None;
        for j in 0..self.n + self.m {
            let status = self.vars.status(j);
            if matches!(status, VarStatus::Basic | VarStatus::Fixed) || self.vars.is_flagged(j) {
                continue;
            }
            let alpha = self.matrix.column_dot(j, &self.work.row).abs();
            if alpha < acceptable {
                continue;
            }
            let mover = self.work.direction[j] != 0.0;
            let room = self.vars.distance_to_bound(j);
            let better = match best {
                None => true,
                Some((_, b_mover, b_room, b_alpha)) => {
                    (mover, room, alpha) > (b_mover, b_room, b_alpha)
                }
            };
            if better {
                best = Some((j, mover, room, alpha));
            }
        }
        best.map(|(j, ..)| j)
    }

    /// Replace the basic variable of `row` by `entering`.
    fn exchange(&mut self, row: usize, entering: usize, leaving: usize) -> PivotOutcome {
        let column = &mut self.work.column;
        self.matrix.column_into(entering, column);
        self.factor.ftran(column);

        match self.factor.replace_column(row, &self.work.column) {
            quality @ (UpdateQuality::Ok | UpdateQuality::SlightError) => {
                let out = self.basis.replace(row, entering);
                debug_assert_eq!(out, leaving);
                self.vars.set_status(entering, VarStatus::Basic);
                let tol = self.settings.primal_tolerance;
                self.vars.settle_nonbasic(leaving, tol);
                self.generator.reset();
                PivotOutcome::Exchanged {
                    entering,
                    leaving,
                    slight: quality == UpdateQuality::SlightError,
                }
            }
            UpdateQuality::MajorError => PivotOutcome::Rejected { entering },
            UpdateQuality::OutOfMemory => PivotOutcome::OutOfMemory,
        }
    }
}
