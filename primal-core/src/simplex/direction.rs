//! Search directions from reduced costs.
//!
//! The non-basic part of a direction is built from the reduced costs of the
//! admissible variables; the basic part follows from keeping
//! `[A | -I] z = 0`, i.e. `B d_B = -N d_N`, one FTRAN per direction.

use super::nonlinear_cost::NonlinearCostTracker;
use super::variables::{BasisMap, VarStatus, VariableStore};
use crate::linalg::{AugmentedMatrix, Factorization};

/// How the non-basic part of a direction is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionMode {
    /// Every admissible non-basic variable moves against its reduced cost.
    FullReducedGradient,
    /// Only the variable with the largest reduced cost moves (classical pivot).
    LargestSingleDj,
    /// Superbasic variables move along a conjugate-gradient direction; a
    /// single at-bound variable is released when its reduced cost dominates.
    ConjugateGradient,
    /// Only superbasic and free variables move.
    SuperBasicOnly,
}

/// Move of a non-basic variable with reduced cost `dj`, or `None` when moving
/// it cannot decrease the objective.
#[inline]
pub fn admissible_move(status: VarStatus, dj: f64, tolerance: f64) -> Option<f64> {
    match status {
        VarStatus::AtLower if dj < -tolerance => Some(-dj),
        VarStatus::AtUpper if dj > tolerance => Some(-dj),
        VarStatus::Free | VarStatus::SuperBasic if dj.abs() > tolerance => Some(-dj),
        _ => None,
    }
}

/// Squared norms of the admissible reduced costs over unflagged and flagged
/// variables, without building a direction.
pub fn price(vars: &VariableStore, tolerance: f64) -> (f64, f64) {
    let mut unflagged = 0.0;
    let mut flagged = 0.0;
    for j in 0..vars.len() {
        let dj = vars.dj[j];
        if admissible_move(vars.status(j), dj, tolerance).is_some() {
            if vars.is_flagged(j) {
                flagged += dj * dj;
            } else {
                unflagged += dj * dj;
            }
        }
    }
    (unflagged, flagged)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionSummary {
    /// Sum of squared admissible reduced costs over unflagged variables
    pub norm_unflagged: f64,
    /// Same over flagged variables
    pub norm_flagged: f64,
    /// Number of non-basic variables in the direction
    pub movers: usize,
    /// Set when one variable moves alone
    pub single: Option<usize>,
    /// Mode actually used
    pub mode: DirectionMode,
}

impl DirectionSummary {
    fn empty(mode: DirectionMode) -> Self {
        Self {
            norm_unflagged: 0.0,
            norm_flagged: 0.0,
            movers: 0,
            single: None,
            mode,
        }
    }
}

/// Direction generator with conjugate-gradient memory.
#[derive(Debug, Clone)]
pub struct DirectionGenerator {
    previous: Vec<f64>,
    previous_norm: f64,
    since_reset: usize,
    active: bool,
    restart_multiple: usize,
}

impl DirectionGenerator {
    pub fn new(num_vars: usize, restart_multiple: usize) -> Self {
        Self {
            previous: vec![0.0; num_vars],
            previous_norm: 0.0,
            since_reset: 0,
            active: false,
            restart_multiple: restart_multiple.max(1),
        }
    }

    /// Forget the previous direction.
    pub fn reset(&mut self) {
        if self.active {
            self.previous.fill(0.0);
        }
        self.previous_norm = 0.0;
        self.since_reset = 0;
        self.active = false;
    }

    pub fn resize(&mut self, num_vars: usize) {
        self.previous = vec![0.0; num_vars];
        self.previous_norm = 0.0;
        self.since_reset = 0;
        self.active = false;
    }

    /// Fill the non-basic part of `direction` (everything else zero).
    pub fn generate(
        &mut self,
        mode: DirectionMode,
        vars: &VariableStore,
        tolerance: f64,
        direction: &mut [f64],
    ) -> DirectionSummary {
        direction.fill(0.0);
        let mut summary = DirectionSummary::empty(mode);

        let mut best_single: Option<(usize, f64)> = None;
        let mut best_bound: Option<(usize, f64)> = None;
        let mut superbasic_sum = 0.0;
        let mut superbasic_count = 0usize;

        for j in 0..vars.len() {
            let status = vars.status(j);
            let dj = vars.dj[j];
            let Some(mv) = admissible_move(status, dj, tolerance) else {
                continue;
            };
            if vars.is_flagged(j) {
                summary.norm_flagged += dj * dj;
                continue;
            }
            summary.norm_unflagged += dj * dj;
            let size = mv.abs();
            if best_single.map_or(true, |(_, s)| size > s) {
                best_single = Some((j, size));
            }
            match status {
                VarStatus::Free | VarStatus::SuperBasic => {
                    superbasic_sum += size;
                    superbasic_count += 1;
                }
                _ => {
                    if best_bound.map_or(true, |(_, s)| size > s) {
                        best_bound = Some((j, size));
                    }
                }
            }
        }

        let mut single = |j: usize, summary: &mut DirectionSummary, mode: DirectionMode| {
            direction[j] = if vars.dj[j] > 0.0 { -1.0 } else { 1.0 };
            summary.movers = 1;
            summary.single = Some(j);
            summary.mode = mode;
        };

        match mode {
            DirectionMode::LargestSingleDj => {
                self.reset();
                if let Some((j, _)) = best_single {
                    single(j, &mut summary, mode);
                }
            }
            DirectionMode::FullReducedGradient => {
                self.reset();
                for j in 0..vars.len() {
                    if vars.is_flagged(j) {
                        continue;
                    }
                    if let Some(mv) = admissible_move(vars.status(j), vars.dj[j], tolerance) {
                        direction[j] = mv;
                        summary.movers += 1;
                    }
                }
            }
            DirectionMode::SuperBasicOnly => {
                self.reset();
                if superbasic_count == 0 {
                    if let Some((j, _)) = best_single {
                        single(j, &mut summary, DirectionMode::LargestSingleDj);
                    }
                } else {
                    summary.movers = fill_superbasic(vars, tolerance, direction);
                }
            }
            DirectionMode::ConjugateGradient => {
                let release_bound = match best_bound {
                    Some((_, size)) => superbasic_count == 0 || size > superbasic_sum,
                    None => false,
                };
                if release_bound {
                    self.reset();
                    if let Some((j, _)) = best_bound {
                        single(j, &mut summary, DirectionMode::LargestSingleDj);
                    }
                } else if superbasic_count > 0 {
                    summary.movers = fill_superbasic(vars, tolerance, direction);
                    self.blend(vars, superbasic_count, direction);
                }
            }
        }
        summary
    }

    /// Conjugate-gradient correction of a steepest-descent direction over the
    /// superbasic set.
    fn blend(&mut self, vars: &VariableStore, superbasic_count: usize, direction: &mut [f64]) {
        let norm: f64 = direction
            .iter()
            .enumerate()
            .filter(|(_, d)| **d != 0.0)
            .map(|(j, _)| vars.dj[j] * vars.dj[j])
            .sum();

        let mut restart = !self.active
            || self.previous_norm <= 0.0
            || self.since_reset >= self.restart_multiple * superbasic_count;

        // Superbasic set changed: previous entries outside the current set.
        if !restart {
            restart = self
                .previous
                .iter()
                .zip(direction.iter())
                .any(|(&p, &d)| p != 0.0 && d == 0.0);
        }

        if !restart {
            let beta = norm / self.previous_norm;
            if beta.is_finite() {
                let mut slope = 0.0;
                for (j, d) in direction.iter_mut().enumerate() {
                    if *d != 0.0 {
                        *d += beta * self.previous[j];
                        slope += vars.dj[j] * *d;
                    }
                }
                if !(slope < 0.0) {
                    // Not a descent direction; fall back to steepest descent.
                    for (j, d) in direction.iter_mut().enumerate() {
                        if *d != 0.0 {
                            *d = -vars.dj[j];
                        }
                    }
                    restart = true;
                }
            } else {
                restart = true;
            }
        }

        if restart {
            self.since_reset = 0;
        }
        self.previous.copy_from_slice(direction);
        self.previous_norm = norm;
        self.since_reset += 1;
        self.active = true;
    }

    /// Basic part of the direction: `d_B = -B⁻¹ [A | -I]_N d_N`.
    pub fn complete_basic(
        &self,
        matrix: &AugmentedMatrix,
        basis: &BasisMap,
        factor: &dyn Factorization,
        rhs: &mut [f64],
        direction: &mut [f64],
    ) {
        rhs.fill(0.0);
        for (j, &d) in direction.iter().enumerate() {
            if d != 0.0 {
                matrix.add_column(j, d, rhs);
            }
        }
        factor.ftran(rhs);
        for (row, &v) in rhs.iter().enumerate() {
            direction[basis.variable(row)] = -v;
        }
    }

    /// Search driven by the infeasible basic variables.
    ///
    /// Prices every non-basic variable against the unweighted infeasibility
    /// sum and returns the one with the best merit
    /// `min(1e-2, room) * |reduced cost|`, with the sign of its move. `None`
    /// means no move can reduce the infeasibility; the phase-one duals are
    /// left in `duals`.
    #[allow(clippy::too_many_arguments)]
    pub fn phase_one_candidate(
        &self,
        vars: &VariableStore,
        basis: &BasisMap,
        tracker: &NonlinearCostTracker,
        matrix: &AugmentedMatrix,
        factor: &dyn Factorization,
        tolerance: f64,
        duals: &mut [f64],
    ) -> Option<(usize, f64)> {
        for (row, d) in duals.iter_mut().enumerate() {
            *d = tracker.phase_one_slope(basis.variable(row));
        }
        factor.btran(duals);

        let mut best: Option<(usize, f64, f64)> = None;
        for j in 0..vars.len() {
            let status = vars.status(j);
            if matches!(status, VarStatus::Basic | VarStatus::Fixed) {
                continue;
            }
            let dj = tracker.phase_one_slope(j) - matrix.column_dot(j, duals);
            let Some(mv) = admissible_move(status, dj, tolerance) else {
                continue;
            };
            let room = vars.room(j, mv).min(1e-2);
            let merit = room * dj.abs();
            if merit > 0.0 && best.map_or(true, |(_, b, _)| merit > b) {
                best = Some((j, merit, mv.signum()));
            }
        }
        best.map(|(j, _, sign)| (j, sign))
    }

    /// Direction that moves `var` alone by `sign`, basic part still to be
    /// completed.
    pub fn single_mover(
        &mut self,
        var: usize,
        sign: f64,
        direction: &mut [f64],
    ) -> DirectionSummary {
        self.reset();
        direction.fill(0.0);
        direction[var] = sign;
        DirectionSummary {
            movers: 1,
            single: Some(var),
            ..DirectionSummary::empty(DirectionMode::LargestSingleDj)
        }
    }
}

fn fill_superbasic(vars: &VariableStore, tolerance: f64, direction: &mut [f64]) -> usize {
    let mut movers = 0;
    for j in 0..vars.len() {
        let status = vars.status(j);
        if !matches!(status, VarStatus::Free | VarStatus::SuperBasic) || vars.is_flagged(j) {
            continue;
        }
        if let Some(mv) = admissible_move(status, vars.dj[j], tolerance) {
            direction[j] = mv;
            movers += 1;
        }
    }
    movers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VariableStore {
        let mut vars = VariableStore::new(4, 0);
        vars.lower = vec![0.0, 0.0, 0.0, f64::NEG_INFINITY];
        vars.upper = vec![10.0, 10.0, 10.0, f64::INFINITY];
        vars.value = vec![0.0, 10.0, 5.0, 1.0];
        vars.set_status(0, VarStatus::AtLower);
        vars.set_status(1, VarStatus::AtUpper);
        vars.set_status(2, VarStatus::SuperBasic);
        vars.set_status(3, VarStatus::Free);
        vars
    }

    #[test]
    fn test_admissibility() {
        assert_eq!(admissible_move(VarStatus::AtLower, -2.0, 1e-7), Some(2.0));
        assert_eq!(admissible_move(VarStatus::AtLower, 2.0, 1e-7), None);
        assert_eq!(admissible_move(VarStatus::AtUpper, 2.0, 1e-7), Some(-2.0));
        assert_eq!(admissible_move(VarStatus::SuperBasic, 2.0, 1e-7), Some(-2.0));
        assert_eq!(admissible_move(VarStatus::Basic, 2.0, 1e-7), None);
        assert_eq!(admissible_move(VarStatus::Fixed, -2.0, 1e-7), None);
    }

    #[test]
    fn test_largest_single_dj() {
        let mut vars = store();
        vars.dj = vec![-1.0, 3.0, 0.5, 0.0];
        let mut gen = DirectionGenerator::new(4, 2);
        let mut d = vec![0.0; 4];
        let s = gen.generate(DirectionMode::LargestSingleDj, &vars, 1e-7, &mut d);
        assert_eq!(s.single, Some(1));
        assert_eq!(d, vec![0.0, -1.0, 0.0, 0.0]);
        assert!((s.norm_unflagged - (1.0 + 9.0 + 0.25)).abs() < 1e-12);
    }

    #[test]
    fn test_flagged_excluded() {
        let mut vars = store();
        vars.dj = vec![-1.0, 3.0, 0.0, 0.0];
        vars.set_flagged(1);
        let mut gen = DirectionGenerator::new(4, 2);
        let mut d = vec![0.0; 4];
        let s = gen.generate(DirectionMode::FullReducedGradient, &vars, 1e-7, &mut d);
        assert_eq!(d, vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(s.norm_flagged, 9.0);
        assert_eq!(s.movers, 1);
    }

    #[test]
    fn test_conjugate_gradient_prefers_superbasics() {
        let mut vars = store();
        vars.dj = vec![-0.5, 0.0, 2.0, -1.0];
        let mut gen = DirectionGenerator::new(4, 2);
        let mut d = vec![0.0; 4];
        let s = gen.generate(DirectionMode::ConjugateGradient, &vars, 1e-7, &mut d);
        assert_eq!(s.single, None);
        assert_eq!(d, vec![0.0, 0.0, -2.0, 1.0]);

        // A dominating at-bound reduced cost is released alone.
        vars.dj = vec![-10.0, 0.0, 2.0, -1.0];
        let s = gen.generate(DirectionMode::ConjugateGradient, &vars, 1e-7, &mut d);
        assert_eq!(s.single, Some(0));
        assert_eq!(d, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_conjugate_gradient_blends_previous() {
        let mut vars = store();
        vars.dj = vec![0.0, 0.0, 2.0, -2.0];
        let mut gen = DirectionGenerator::new(4, 4);
        let mut d = vec![0.0; 4];
        gen.generate(DirectionMode::ConjugateGradient, &vars, 1e-7, &mut d);
        assert_eq!(d, vec![0.0, 0.0, -2.0, 2.0]);

        // beta = (1 + 1) / (4 + 4) = 0.25
        vars.dj = vec![0.0, 0.0, 1.0, 1.0];
        gen.generate(DirectionMode::ConjugateGradient, &vars, 1e-7, &mut d);
        assert!((d[2] - (-1.0 - 0.5)).abs() < 1e-12);
        assert!((d[3] - (-1.0 + 0.5)).abs() < 1e-12);
    }
}
