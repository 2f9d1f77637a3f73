//! Per-column trust regions for the SLP loop.

use crate::problem::TrustRegionSettings;
use crate::simplex::PrimalSimplex;

/// Relative slack under which a move counts as reaching the trust bound.
const HIT_TOLERANCE: f64 = 1e-6;

/// Moves smaller than this are no move.
const MOVE_EPS: f64 = 1e-12;

/// Trust half-widths, recent move history and saved true bounds of the
/// nonlinear columns.
#[derive(Debug, Clone)]
pub struct TrustRegionState {
    columns: Vec<usize>,
    width: Vec<f64>,
    /// Last three move codes per column, most recent first. `±1` means the
    /// move reached the trust bound, `±2` that it stopped inside.
    moves: Vec<[i8; 3]>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    settings: TrustRegionSettings,
}

impl TrustRegionState {
    /// Trust regions on `columns`, remembering their current bounds.
    pub fn new(
        simplex: &PrimalSimplex,
        columns: Vec<usize>,
        settings: TrustRegionSettings,
    ) -> Self {
        let (lower, upper): (Vec<f64>, Vec<f64>) =
            columns.iter().map(|&j| simplex.column_bounds(j)).unzip();
        let k = columns.len();
        Self {
            width: vec![settings.initial_width; k],
            moves: vec![[0; 3]; k],
            columns,
            lower,
            upper,
            settings,
        }
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn widths(&self) -> &[f64] {
        &self.width
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Intersect each column's true bounds with `[x - t, x + t]`.
    pub fn apply(&self, simplex: &mut PrimalSimplex, x: &[f64]) {
        for (k, &j) in self.columns.iter().enumerate() {
            let t = self.width[k];
            let lo = (x[j] - t).max(self.lower[k]);
            let up = (x[j] + t).min(self.upper[k]);
            simplex.set_column_bounds(j, lo, up.max(lo));
        }
    }

    /// Put the true bounds back.
    pub fn restore_bounds(&self, simplex: &mut PrimalSimplex) {
        for (k, &j) in self.columns.iter().enumerate() {
            simplex.set_column_bounds(j, self.lower[k], self.upper[k]);
        }
    }

    /// Record an accepted move and adapt the widths. Returns the largest
    /// absolute change over the trust columns.
    pub fn record_moves(&mut self, x_old: &[f64], x_new: &[f64]) -> f64 {
        let mut max_delta: f64 = 0.0;
        for (k, &j) in self.columns.iter().enumerate() {
            let delta = x_new[j] - x_old[j];
            max_delta = max_delta.max(delta.abs());
            let t = self.width[k];
            let code: i8 = if delta.abs() <= MOVE_EPS {
                0
            } else {
                let magnitude = if delta.abs() >= t * (1.0 - HIT_TOLERANCE) { 1 } else { 2 };
                if delta > 0.0 {
                    magnitude
                } else {
                    -magnitude
                }
            };

            let history = &mut self.moves[k];
            history[2] = history[1];
            history[1] = history[0];
            history[0] = code;

            if i16::from(history[0]) * i16::from(history[1]) < 0 {
                self.width[k] = t * self.settings.shrink;
            } else if code != 0 && history[1] == code && history[2] == code {
                self.width[k] = (t * self.settings.grow).min(self.settings.max_width);
            }
        }
        max_delta
    }

    /// Shrink every width (rejected pass).
    pub fn shrink_all(&mut self, factor: f64) {
        for w in &mut self.width {
            *w *= factor;
        }
    }

    /// Shrink the widths of columns that changed between `x_old` and `x_new`.
    pub fn shrink_moved(&mut self, x_old: &[f64], x_new: &[f64], factor: f64) {
        for (k, &j) in self.columns.iter().enumerate() {
            if (x_new[j] - x_old[j]).abs() > MOVE_EPS {
                self.width[k] *= factor;
            }
        }
    }

    pub fn max_width(&self) -> f64 {
        self.width.iter().copied().fold(0.0, f64::max)
    }

    /// Drop the linearization still promises: reduced cost times the room
    /// left toward the true bound, capped by the trust width.
    pub fn target_drop(&self, x: &[f64], reduced_costs: &[f64]) -> f64 {
        let mut total = 0.0;
        for (k, &j) in self.columns.iter().enumerate() {
            let dj = reduced_costs[j];
            let room = if dj < 0.0 {
                self.upper[k] - x[j]
            } else if dj > 0.0 {
                x[j] - self.lower[k]
            } else {
                0.0
            };
            total += dj.abs() * room.max(0.0).min(self.width[k]);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::from_triplets;
    use crate::problem::{ProblemData, SolverSettings};

    fn simplex() -> PrimalSimplex {
        let prob = ProblemData::linear(
            from_triplets(0, 2, Vec::new()),
            vec![0.0, 0.0],
            vec![-10.0, 0.0],
            vec![10.0, 1.0],
            Vec::new(),
            Vec::new(),
        );
        PrimalSimplex::new(prob, SolverSettings::default()).unwrap()
    }

    fn settings() -> TrustRegionSettings {
        TrustRegionSettings {
            initial_width: 1.0,
            ..TrustRegionSettings::default()
        }
    }

    #[test]
    fn test_apply_clamps_to_true_bounds() {
        let mut s = simplex();
        let trust = TrustRegionState::new(&s, vec![0, 1], settings());
        trust.apply(&mut s, &[9.5, 0.5]);
        assert_eq!(s.column_bounds(0), (8.5, 10.0));
        assert_eq!(s.column_bounds(1), (0.0, 1.0));
        trust.restore_bounds(&mut s);
        assert_eq!(s.column_bounds(0), (-10.0, 10.0));
    }

    #[test]
    fn test_reversal_shrinks_and_agreement_grows() {
        let s = simplex();
        let mut trust = TrustRegionState::new(&s, vec![0], settings());

        // Three moves to the trust bound in the same direction.
        trust.record_moves(&[0.0, 0.0], &[1.0, 0.0]);
        trust.record_moves(&[1.0, 0.0], &[2.0, 0.0]);
        assert_eq!(trust.widths()[0], 1.0);
        let delta = trust.record_moves(&[2.0, 0.0], &[3.0, 0.0]);
        assert_eq!(delta, 1.0);
        assert_eq!(trust.widths()[0], 1.5);

        // Reversal.
        trust.record_moves(&[3.0, 0.0], &[2.5, 0.0]);
        assert_eq!(trust.widths()[0], 0.75);
    }

    #[test]
    fn test_target_drop() {
        let s = simplex();
        let trust = TrustRegionState::new(&s, vec![0, 1], settings());
        // Column 0 wants to go up with room 10 capped at 1; column 1 sits at
        // its lower bound and wants to go down.
        let drop = trust.target_drop(&[0.0, 0.0], &[-2.0, 3.0]);
        assert_eq!(drop, 2.0);
    }
}
