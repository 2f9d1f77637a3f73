//! SLP with nonlinear constraint rows.
//!
//! Each nonlinear row is replaced by its linearization, made elastic with
//! artificial columns priced by a piecewise penalty. The sub-model carries
//! the structural columns followed by the artificials and is re-solved warm
//! every pass; steps are judged on the exact-penalty merit
//! `f(x) + Σ penalty(violation)`.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::{finished, TrustRegionState, NO_PREDICTED_DROP};
use crate::constraint::{Constraint, Linearization};
use crate::linalg::sparse::{from_triplets, triplets, SparseCsc};
use crate::objective::{dot, LinearObjective, Objective};
use crate::problem::{
    ArtificialPenaltySettings, ProblemData, SecondaryStatus, SolveStatus, TerminationStatus,
};
use crate::simplex::nonlinear_cost::{PenaltyLadder, PenaltySegment};
use crate::simplex::PrimalSimplex;

/// Relative improvement that resets the stall counter.
const STALL_IMPROVEMENT: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Lower,
    Upper,
}

/// One elastic column: a segment of the penalty on one side of one row.
#[derive(Debug, Clone, Copy)]
struct Artificial {
    constraint: usize,
    row: usize,
    side: Side,
    segment: usize,
    column: usize,
}

/// Segment `s` of `ladder`, or an empty segment priced like the last one.
fn segment(ladder: &PenaltyLadder, s: usize) -> PenaltySegment {
    match ladder.segments().get(s) {
        Some(seg) => *seg,
        None => PenaltySegment::new(0.0, ladder.segments().last().map_or(0.0, |l| l.penalty)),
    }
}

fn violations(value: f64, lower: f64, upper: f64) -> (f64, f64) {
    ((lower - value).max(0.0), (value - upper).max(0.0))
}

/// Elastic penalties of the nonlinear rows and their escalation state.
#[derive(Debug)]
struct ElasticPenalties {
    settings: ArtificialPenaltySettings,
    ladders: Vec<PenaltyLadder>,
    multiplier: f64,
    ever_feasible: bool,
    best_violation: f64,
    stalled: usize,
}

impl ElasticPenalties {
    fn new(settings: ArtificialPenaltySettings, count: usize) -> Self {
        Self {
            ladders: vec![settings.ladder.clone(); count],
            settings,
            multiplier: 1.0,
            ever_feasible: false,
            best_violation: f64::INFINITY,
            stalled: 0,
        }
    }

    fn num_segments(settings: &ArtificialPenaltySettings) -> usize {
        settings
            .ladder
            .segments()
            .len()
            .max(settings.feasible_ladder.segments().len())
    }

    /// Rebuild the ladders for this pass. Once feasible, each segment costs
    /// at least the row dual plus the margin.
    fn refresh(&mut self, duals: &[f64], rows: &[usize]) {
        for (k, ladder) in self.ladders.iter_mut().enumerate() {
            let mut next = if self.ever_feasible {
                self.settings.feasible_ladder.clone()
            } else {
                self.settings.ladder.clone()
            };
            next.scale(self.multiplier);
            if self.ever_feasible {
                let floor = duals[rows[k]].abs() + self.settings.dual_margin;
                for seg in next.segments_mut() {
                    seg.penalty = seg.penalty.max(floor);
                }
            }
            *ladder = next;
        }
    }

    fn first_cost(&self) -> f64 {
        self.ladders
            .iter()
            .filter_map(|l| l.segments().first())
            .map(|s| s.penalty)
            .fold(0.0, f64::max)
    }

    /// Grow every penalty. Returns `false` once the cap is reached.
    fn escalate(&mut self) -> bool {
        if self.first_cost() >= self.settings.growth_cap {
            return false;
        }
        self.multiplier *= self.settings.growth;
        for ladder in &mut self.ladders {
            ladder.scale(self.settings.growth);
        }
        true
    }

    fn is_feasible(&self, violation: f64) -> bool {
        violation <= self.settings.feasible_sum
    }

    /// Track the violation of an accepted point; escalate on a stall.
    fn note_violation(&mut self, violation: f64) {
        if self.is_feasible(violation) {
            if !self.ever_feasible {
                debug!(violation, "constrained slp reached feasibility");
            }
            self.ever_feasible = true;
            self.stalled = 0;
            return;
        }
        if violation < self.best_violation * (1.0 - STALL_IMPROVEMENT) {
            self.best_violation = violation;
            self.stalled = 0;
            return;
        }
        self.stalled += 1;
        if self.stalled >= self.settings.stall_window {
            self.stalled = 0;
            if self.escalate() {
                debug!(cost = self.first_cost(), "artificial costs raised");
            }
        }
    }
}

/// Where the linear entries, nonlinear rows and artificials sit in the
/// sub-model.
#[derive(Debug)]
struct ElasticLayout {
    n: usize,
    m: usize,
    linear_entries: Vec<(usize, usize, f64)>,
    artificials: Vec<Artificial>,
    /// Rows owned by the constraints, in constraint order.
    rows: Vec<usize>,
    row_lower: Vec<f64>,
    row_upper: Vec<f64>,
}

impl ElasticLayout {
    fn num_cols(&self) -> usize {
        self.n + self.artificials.len()
    }

    fn matrix(&self, lins: &[Linearization]) -> SparseCsc {
        let mut entries = self.linear_entries.clone();
        for (k, lin) in lins.iter().enumerate() {
            let row = self.rows[k];
            entries.extend(
                lin.coefficients
                    .iter()
                    .enumerate()
                    .filter(|(_, g)| **g != 0.0)
                    .map(|(j, &g)| (row, j, g)),
            );
        }
        for a in &self.artificials {
            let coef = match a.side {
                Side::Lower => 1.0,
                Side::Upper => -1.0,
            };
            entries.push((a.row, a.column, coef));
        }
        from_triplets(self.m, self.num_cols(), entries)
    }

    /// Row bounds of the linearized rows: `lower - offset <= g · x <= upper - offset`.
    fn shifted_bounds(&self, k: usize, lin: &Linearization) -> (f64, f64) {
        let row = self.rows[k];
        (self.row_lower[row] - lin.offset, self.row_upper[row] - lin.offset)
    }

    /// Sum of bound violations of the constraint function values.
    fn violation(&self, values: &[f64]) -> f64 {
        values
            .iter()
            .enumerate()
            .map(|(k, &v)| {
                let row = self.rows[k];
                let (lo, up) = violations(v, self.row_lower[row], self.row_upper[row]);
                lo + up
            })
            .sum()
    }

    fn merit(
        &self,
        objective: &dyn Objective,
        constraints: &[Box<dyn Constraint>],
        penalties: &ElasticPenalties,
        x: &[f64],
    ) -> f64 {
        let values: Vec<f64> = constraints.iter().map(|c| c.function_value(x)).collect();
        objective.value(x) + self.penalty(penalties, &values)
    }

    fn penalty(&self, penalties: &ElasticPenalties, values: &[f64]) -> f64 {
        values
            .iter()
            .enumerate()
            .map(|(k, &v)| {
                let row = self.rows[k];
                let (lo, up) = violations(v, self.row_lower[row], self.row_upper[row]);
                let ladder = &penalties.ladders[k];
                ladder.penalty(lo) + ladder.penalty(up)
            })
            .sum()
    }
}

/// The LP sub-model of the constrained loop.
struct SubModel {
    simplex: PrimalSimplex,
    layout: ElasticLayout,
}

impl SubModel {
    /// Linearize every constraint at `x` and load the rows.
    fn relinearize(
        &mut self,
        constraints: &[Box<dyn Constraint>],
        x: &[f64],
    ) -> Vec<Linearization> {
        let lins: Vec<Linearization> = constraints.iter().map(|c| c.gradient(x)).collect();
        if let Err(err) = self.simplex.replace_matrix(self.layout.matrix(&lins)) {
            debug!(error = %err, "linearized basis is singular, repaired on solve");
        }
        for (k, lin) in lins.iter().enumerate() {
            let (lo, up) = self.layout.shifted_bounds(k, lin);
            self.simplex.set_row_bounds(self.layout.rows[k], lo, up);
        }
        lins
    }

    /// Bounds and costs of the artificial columns from the current ladders.
    fn price_artificials(&mut self, penalties: &ElasticPenalties) -> Vec<f64> {
        let mut costs = Vec::with_capacity(self.layout.artificials.len());
        for a in &self.layout.artificials {
            let seg = segment(&penalties.ladders[a.constraint], a.segment);
            self.simplex.set_column_bounds(a.column, 0.0, seg.width);
            costs.push(seg.penalty);
        }
        costs
    }
}

impl PrimalSimplex {
    /// SLP with nonlinear constraint rows.
    ///
    /// Each constraint owns one row; the row bounds apply to its function
    /// value. Row activities of the result report function values for those
    /// rows, and the duals are those of the last LP sub-model.
    pub fn solve_slp_with_constraints(
        &mut self,
        constraints: &[Box<dyn Constraint>],
        max_passes: usize,
        delta_tolerance: f64,
    ) -> TerminationStatus {
        if constraints.is_empty() {
            return self.solve_slp(max_passes, delta_tolerance);
        }
        self.begin_slp();

        let m = self.num_rows();
        let mut seen = HashSet::new();
        for c in constraints {
            let row = c.row_index();
            if row >= m || !seen.insert(row) {
                warn!(row, rows = m, "constraint row is missing or repeated");
                let status = finished(SolveStatus::Abandoned, SecondaryStatus::InvalidConstraint);
                self.set_termination(status);
                return status;
            }
        }

        let Some(mut sub) = self.build_sub_model(constraints) else {
            let status = finished(SolveStatus::Abandoned, SecondaryStatus::InvalidConstraint);
            self.set_termination(status);
            return status;
        };

        let n = self.num_vars();
        let objective = self.replace_objective(Box::new(LinearObjective::zeros(n)));
        sub.simplex.put_abort_check(self.take_abort_check());

        let mut mask = vec![false; n];
        objective.mark_nonlinear(&mut mask);
        for c in constraints {
            c.mark_nonlinear(&mut mask);
        }
        let columns: Vec<usize> = (0..n).filter(|&j| mask[j]).collect();
        let mut trust =
            TrustRegionState::new(&sub.simplex, columns, self.settings().trust_region.clone());

        let status = self.run_constrained(
            objective.as_ref(),
            constraints,
            &mut sub,
            &mut trust,
            max_passes,
            delta_tolerance,
        );

        trust.restore_bounds(&mut sub.simplex);
        self.put_abort_check(sub.simplex.take_abort_check());
        self.replace_objective(objective);
        self.adopt_sub_solution(&sub, constraints, status);
        self.set_termination(status);
        if self.settings().verbose {
            info!(
                status = %status,
                passes = self.slp_objective_history().len(),
                objective = self.objective_value(),
                violation = self.sum_primal_infeasibilities(),
                "constrained slp finished"
            );
        }
        status
    }

    /// Structural columns of this problem followed by the artificials, with
    /// the nonlinear rows linearized at the current point.
    fn build_sub_model(&self, constraints: &[Box<dyn Constraint>]) -> Option<SubModel> {
        let n = self.num_vars();
        let m = self.num_rows();
        let rows: Vec<usize> = constraints.iter().map(|c| c.row_index()).collect();
        let nonlinear: HashSet<usize> = rows.iter().copied().collect();

        let linear_entries: Vec<(usize, usize, f64)> = triplets(self.constraint_matrix())
            .into_iter()
            .filter(|(i, _, _)| !nonlinear.contains(i))
            .collect();
        let (row_lower, row_upper): (Vec<f64>, Vec<f64>) =
            (0..m).map(|i| self.row_bounds(i)).unzip();

        let settings = &self.settings().artificial;
        let segments = ElasticPenalties::num_segments(settings);
        let mut artificials = Vec::new();
        for (k, &row) in rows.iter().enumerate() {
            for (side, bound) in [(Side::Lower, row_lower[row]), (Side::Upper, row_upper[row])] {
                if !bound.is_finite() {
                    continue;
                }
                for s in 0..segments {
                    artificials.push(Artificial {
                        constraint: k,
                        row,
                        side,
                        segment: s,
                        column: n + artificials.len(),
                    });
                }
            }
        }

        let layout = ElasticLayout {
            n,
            m,
            linear_entries,
            artificials,
            rows,
            row_lower,
            row_upper,
        };

        let x = self.primal_values().to_vec();
        let lins: Vec<Linearization> = constraints.iter().map(|c| c.gradient(&x)).collect();
        let mut sub_row_lower = layout.row_lower.clone();
        let mut sub_row_upper = layout.row_upper.clone();
        for (k, lin) in lins.iter().enumerate() {
            let (lo, up) = layout.shifted_bounds(k, lin);
            sub_row_lower[layout.rows[k]] = lo;
            sub_row_upper[layout.rows[k]] = up;
        }

        let cols = layout.num_cols();
        let mut col_lower = Vec::with_capacity(cols);
        let mut col_upper = Vec::with_capacity(cols);
        for j in 0..n {
            let (lo, up) = self.column_bounds(j);
            col_lower.push(lo);
            col_upper.push(up);
        }
        for a in &layout.artificials {
            col_lower.push(0.0);
            col_upper.push(segment(&settings.ladder, a.segment).width);
        }
        let mut initial_x = x;
        initial_x.resize(cols, 0.0);

        let problem = ProblemData::new(
            layout.matrix(&lins),
            Box::new(LinearObjective::zeros(cols)),
            col_lower,
            col_upper,
            sub_row_lower,
            sub_row_upper,
        )
        .with_initial_x(initial_x);

        match PrimalSimplex::new(problem, self.settings().clone()) {
            Ok(simplex) => Some(SubModel { simplex, layout }),
            Err(err) => {
                warn!(error = %err, "cannot build the linearized sub-model");
                None
            }
        }
    }

    fn run_constrained(
        &mut self,
        objective: &dyn Objective,
        constraints: &[Box<dyn Constraint>],
        sub: &mut SubModel,
        trust: &mut TrustRegionState,
        max_passes: usize,
        delta_tolerance: f64,
    ) -> TerminationStatus {
        let n = self.num_vars();
        let settings = self.settings().trust_region.clone();
        let max_backtracks = self.settings().artificial.max_backtracks;
        let mut penalties =
            ElasticPenalties::new(self.settings().artificial.clone(), constraints.len());
        let mut gradient = vec![0.0; n];

        // Reach the linear rows first; the nonlinear rows stay free until the
        // first linearization.
        for &row in &sub.layout.rows {
            sub.simplex.set_row_bounds(row, f64::NEG_INFINITY, f64::INFINITY);
        }
        let status = sub.simplex.solve_primal();
        if matches!(status.status, SolveStatus::Infeasible | SolveStatus::Abandoned) {
            return status;
        }

        for pass in 0..max_passes {
            if sub.simplex.abort_requested() {
                return finished(SolveStatus::Abandoned, SecondaryStatus::UserAbort);
            }
            self.add_slp_pass();

            let x_old = sub.simplex.primal_values()[..n].to_vec();
            let lins = sub.relinearize(constraints, &x_old);
            penalties.refresh(sub.simplex.duals(), &sub.layout.rows);
            let costs = sub.price_artificials(&penalties);

            objective.gradient(&x_old, &mut gradient);
            let mut cost = gradient.clone();
            cost.extend_from_slice(&costs);
            sub.simplex
                .replace_objective(Box::new(LinearObjective::new(cost)));
            trust.apply(&mut sub.simplex, &x_old);

            let f_old = objective.value(&x_old);
            let values_old: Vec<f64> = lins.iter().map(|l| l.function_value).collect();
            let penalty_old = sub.layout.penalty(&penalties, &values_old);
            let merit_old = f_old + penalty_old;
            let violation_old = sub.layout.violation(&values_old);
            let z_start = sub.simplex.primal_values().to_vec();
            let checkpoint = sub.simplex.checkpoint();

            let status = sub.simplex.solve_primal();
            match status.status {
                SolveStatus::Optimal | SolveStatus::IterationLimit => {}
                SolveStatus::Abandoned => {
                    sub.simplex.restore_checkpoint(&checkpoint);
                    return status;
                }
                SolveStatus::Infeasible | SolveStatus::Unbounded => return status,
            }

            let z_new = sub.simplex.primal_values().to_vec();
            let predicted = dot(&gradient, &x_old) + penalty_old - sub.simplex.objective_value();
            if predicted <= NO_PREDICTED_DROP * merit_old.abs().max(1.0) {
                let duals = sub.simplex.duals().to_vec();
                sub.simplex.restore_checkpoint(&checkpoint);
                sub.simplex.set_duals(&duals);
                if penalties.is_feasible(violation_old) {
                    return TerminationStatus::new(SolveStatus::Optimal);
                }
                if !penalties.escalate() {
                    warn!(violation = violation_old, "no progress toward feasibility");
                    return finished(SolveStatus::Infeasible, SecondaryStatus::WeightSaturated);
                }
                continue;
            }

            let merit_new = sub
                .layout
                .merit(objective, constraints, &penalties, &z_new[..n]);
            let actual = merit_old - merit_new;

            let (max_delta, merit_accepted) =
                if actual > 0.0 && actual >= settings.accept_ratio * predicted {
                    (trust.record_moves(&x_old, &z_new), merit_new)
                } else {
                    let backtracked = backtrack(
                        sub,
                        objective,
                        constraints,
                        &penalties,
                        (z_start.as_slice(), z_new.as_slice()),
                        merit_old,
                        settings.accept_ratio * predicted,
                        max_backtracks,
                    );
                    match backtracked {
                        Some((z, merit)) => {
                            sub.simplex.load_point(&z);
                            trust.shrink_moved(&x_old, &z, settings.shrink);
                            let delta = x_old
                                .iter()
                                .zip(&z)
                                .map(|(a, b)| (a - b).abs())
                                .fold(0.0, f64::max);
                            (delta, merit)
                        }
                        None => {
                            debug!(pass, predicted, actual, "constrained pass rejected");
                            sub.simplex.restore_checkpoint(&checkpoint);
                            trust.shrink_all(settings.reject_shrink);
                            continue;
                        }
                    }
                };

            let x = sub.simplex.primal_values()[..n].to_vec();
            let values: Vec<f64> = constraints.iter().map(|c| c.function_value(&x)).collect();
            let violation = sub.layout.violation(&values);
            penalties.note_violation(violation);
            let f_accepted = objective.value(&x);
            self.record_accepted(f_accepted);
            let drop = merit_old - merit_accepted;
            debug!(
                pass,
                f = f_accepted,
                violation,
                drop,
                max_delta,
                "constrained pass accepted"
            );

            if max_delta < delta_tolerance
                && drop < settings.drop_tolerance
                && penalties.is_feasible(violation)
            {
                return TerminationStatus::new(SolveStatus::Optimal);
            }
        }
        finished(SolveStatus::IterationLimit, SecondaryStatus::PassLimit)
    }

    /// Take the sub-model's point, duals and counters as this problem's
    /// solution.
    fn adopt_sub_solution(
        &mut self,
        sub: &SubModel,
        constraints: &[Box<dyn Constraint>],
        status: TerminationStatus,
    ) {
        let n = self.num_vars();
        let x = sub.simplex.primal_values()[..n].to_vec();
        self.reset_to_slack_basis(&x);
        for c in constraints {
            self.set_nonlinear_row_value(c.row_index(), Some(c.function_value(&x)));
        }
        self.set_duals(sub.simplex.duals());
        self.set_reduced_costs(&sub.simplex.reduced_costs()[..n]);
        self.add_counts(sub.simplex.iterations(), sub.simplex.refactorizations());
        let ray = match status.status {
            SolveStatus::Unbounded => sub.simplex.ray().map(|r| r[..n.min(r.len())].to_vec()),
            SolveStatus::Infeasible => sub.simplex.ray().map(<[f64]>::to_vec),
            _ => None,
        };
        self.set_ray(ray);
    }
}

/// Halve the step from `z_start` toward `z_new` until the merit drops by a
/// share of the predicted drop.
#[allow(clippy::too_many_arguments)]
fn backtrack(
    sub: &SubModel,
    objective: &dyn Objective,
    constraints: &[Box<dyn Constraint>],
    penalties: &ElasticPenalties,
    (z_start, z_new): (&[f64], &[f64]),
    merit_old: f64,
    required: f64,
    max_backtracks: usize,
) -> Option<(Vec<f64>, f64)> {
    let n = sub.layout.n;
    let mut alpha = 0.5;
    for _ in 0..max_backtracks {
        let z: Vec<f64> = z_start
            .iter()
            .zip(z_new)
            .map(|(a, b)| a + alpha * (b - a))
            .collect();
        let merit = sub.layout.merit(objective, constraints, penalties, &z[..n]);
        if merit < merit_old && merit_old - merit >= alpha * required {
            return Some((z, merit));
        }
        alpha *= 0.5;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::FnConstraint;
    use crate::objective::FnObjective;
    use crate::problem::SolverSettings;

    /// min (x - 3)^2 subject to x <= 1 written as a constraint on row 0.
    fn capped_square() -> (PrimalSimplex, Vec<Box<dyn Constraint>>) {
        let objective = FnObjective::new(
            1,
            |x| (x[0] - 3.0).powi(2),
            |x, g| g[0] = 2.0 * (x[0] - 3.0),
        );
        let prob = ProblemData::new(
            from_triplets(1, 1, Vec::new()),
            Box::new(objective),
            vec![f64::NEG_INFINITY],
            vec![f64::INFINITY],
            vec![f64::NEG_INFINITY],
            vec![1.0],
        )
        .with_initial_x(vec![0.0]);
        let simplex = PrimalSimplex::new(prob, SolverSettings::default()).unwrap();
        let cap: Box<dyn Constraint> =
            Box::new(FnConstraint::new(0, 1, vec![0], |x| x[0], |_, g| g[0] = 1.0));
        (simplex, vec![cap])
    }

    #[test]
    fn test_rejects_missing_row() {
        let (mut simplex, _) = capped_square();
        let bad: Vec<Box<dyn Constraint>> =
            vec![Box::new(FnConstraint::new(3, 1, vec![0], |x| x[0], |_, g| g[0] = 1.0))];
        let status = simplex.solve_slp_with_constraints(&bad, 10, 1e-6);
        assert_eq!(status.status, SolveStatus::Abandoned);
        assert_eq!(status.secondary, SecondaryStatus::InvalidConstraint);
    }

    #[test]
    fn test_rejects_repeated_row() {
        let (mut simplex, mut constraints) = capped_square();
        constraints.push(Box::new(FnConstraint::new(
            0,
            1,
            vec![0],
            |x| 2.0 * x[0],
            |_, g| g[0] = 2.0,
        )));
        let status = simplex.solve_slp_with_constraints(&constraints, 10, 1e-6);
        assert_eq!(status.secondary, SecondaryStatus::InvalidConstraint);
    }

    #[test]
    fn test_constraint_caps_the_minimizer() {
        let (mut simplex, constraints) = capped_square();
        let status = simplex.solve_slp_with_constraints(&constraints, 50, 1e-6);
        assert_eq!(status.status, SolveStatus::Optimal);
        assert!((simplex.primal_values()[0] - 1.0).abs() < 1e-6);
        assert!((simplex.row_activity()[0] - 1.0).abs() < 1e-6);
        assert!((simplex.duals()[0].abs() - 4.0).abs() < 1e-6);
        assert!(simplex.sum_primal_infeasibilities() < 1e-6);

        let history = simplex.slp_objective_history();
        assert!(history.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_infeasible_start_reaches_linear_rows() {
        // min x^2 with a linear row x >= 20 and a nonlinear row x <= 30,
        // started at x = 0.
        let objective = FnObjective::new(1, |x| x[0] * x[0], |x, g| g[0] = 2.0 * x[0]);
        let prob = ProblemData::new(
            from_triplets(2, 1, vec![(0, 0, 1.0)]),
            Box::new(objective),
            vec![f64::NEG_INFINITY],
            vec![f64::INFINITY],
            vec![20.0, f64::NEG_INFINITY],
            vec![f64::INFINITY, 30.0],
        )
        .with_initial_x(vec![0.0]);
        let mut simplex = PrimalSimplex::new(prob, SolverSettings::default()).unwrap();
        let cap: Vec<Box<dyn Constraint>> =
            vec![Box::new(FnConstraint::new(1, 1, vec![0], |x| x[0], |_, g| g[0] = 1.0))];

        let status = simplex.solve_slp_with_constraints(&cap, 50, 1e-6);
        assert_eq!(status.status, SolveStatus::Optimal);
        assert!((simplex.primal_values()[0] - 20.0).abs() < 1e-6);
        let activity = simplex.row_activity();
        assert!((activity[0] - 20.0).abs() < 1e-6);
        assert!((activity[1] - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_violation_helpers() {
        assert_eq!(violations(0.5, 1.0, 2.0), (0.5, 0.0));
        assert_eq!(violations(2.5, 1.0, 2.0), (0.0, 0.5));
        let ladder = PenaltyLadder::new(vec![PenaltySegment::new(1.0, 2.0)]);
        assert_eq!(segment(&ladder, 0).width, 1.0);
        assert_eq!(segment(&ladder, 3), PenaltySegment::new(0.0, 2.0));
    }
}
