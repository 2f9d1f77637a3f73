//! Infeasibility costing.
//!
//! Bound violations are priced into the objective with a weight, so the
//! simplex never needs a separate feasibility phase. A variable below its
//! lower bound carries cost slope `-weight * ladder slope`, one above its upper
//! bound `+weight * ladder slope`. The controller grows the weight when
//! infeasibility persists; a saturated weight means the problem is infeasible.

use super::variables::VariableStore;
use crate::problem::PenaltySettings;

/// One piece of a piecewise-linear penalty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltySegment {
    /// Violation width covered by this piece
    pub width: f64,
    /// Cost per unit of violation inside this piece
    pub penalty: f64,
}

impl PenaltySegment {
    pub fn new(width: f64, penalty: f64) -> Self {
        Self { width, penalty }
    }
}

/// Piecewise-linear penalty of a violation distance.
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyLadder {
    segments: Vec<PenaltySegment>,
}

impl PenaltyLadder {
    pub fn new(segments: Vec<PenaltySegment>) -> Self {
        if segments.is_empty() {
            return Self::uniform();
        }
        Self { segments }
    }

    /// Single unbounded piece with unit penalty.
    pub fn uniform() -> Self {
        Self {
            segments: vec![PenaltySegment::new(f64::INFINITY, 1.0)],
        }
    }

    pub fn segments(&self) -> &[PenaltySegment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [PenaltySegment] {
        &mut self.segments
    }

    /// Total penalty of a violation of `distance`.
    pub fn penalty(&self, distance: f64) -> f64 {
        let mut remaining = distance.max(0.0);
        let mut total = 0.0;
        for seg in &self.segments {
            if remaining <= 0.0 {
                break;
            }
            let used = remaining.min(seg.width);
            total += used * seg.penalty;
            remaining -= used;
        }
        if remaining > 0.0 {
            if let Some(last) = self.segments.last() {
                total += remaining * last.penalty;
            }
        }
        total
    }

    /// Marginal penalty at `distance`.
    pub fn slope(&self, distance: f64) -> f64 {
        let mut start = 0.0;
        for seg in &self.segments {
            if distance < start + seg.width {
                return seg.penalty;
            }
            start += seg.width;
        }
        self.segments.last().map_or(0.0, |s| s.penalty)
    }

    pub fn scale(&mut self, factor: f64) {
        for seg in &mut self.segments {
            seg.penalty *= factor;
        }
    }
}

/// Side of its bounds a variable currently sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Below,
    Feasible,
    Above,
}

#[derive(Debug, Clone)]
pub struct NonlinearCostTracker {
    settings: PenaltySettings,
    weight: f64,
    tolerance: f64,
    side: Vec<BoundSide>,
    distance: Vec<f64>,
    sum: f64,
    count: usize,
    reached_feasible: bool,
}

impl NonlinearCostTracker {
    pub fn new(settings: PenaltySettings, num_vars: usize, tolerance: f64) -> Self {
        let weight = settings.initial_weight;
        Self {
            settings,
            weight,
            tolerance,
            side: vec![BoundSide::Feasible; num_vars],
            distance: vec![0.0; num_vars],
            sum: 0.0,
            count: 0,
            reached_feasible: false,
        }
    }

    /// Record the value of one variable. Returns its penalty and whether it
    /// is infeasible.
    pub fn set_one(&mut self, j: usize, lower: f64, upper: f64, value: f64) -> (f64, bool) {
        let (side, dist) = if value < lower - self.tolerance {
            (BoundSide::Below, lower - value)
        } else if value > upper + self.tolerance {
            (BoundSide::Above, value - upper)
        } else {
            (BoundSide::Feasible, 0.0)
        };

        if self.side[j] != BoundSide::Feasible {
            self.sum -= self.distance[j];
            self.count -= 1;
        }
        if side != BoundSide::Feasible {
            self.sum += dist;
            self.count += 1;
        }
        self.side[j] = side;
        self.distance[j] = dist;

        let infeasible = side != BoundSide::Feasible;
        let penalty = if infeasible {
            self.weight * self.settings.ladder.penalty(dist)
        } else {
            0.0
        };
        (penalty, infeasible)
    }

    /// Recompute the state of every variable.
    pub fn check_infeasibilities(&mut self, vars: &VariableStore) {
        self.sum = 0.0;
        self.count = 0;
        self.side.fill(BoundSide::Feasible);
        self.distance.fill(0.0);
        for j in 0..vars.len() {
            self.set_one(j, vars.lower[j], vars.upper[j], vars.value[j]);
        }
    }

    /// Cost slope the penalty adds to variable `j`.
    #[inline]
    pub fn cost_slope(&self, j: usize) -> f64 {
        match self.side[j] {
            BoundSide::Feasible => 0.0,
            BoundSide::Below => -self.weight * self.settings.ladder.slope(self.distance[j]),
            BoundSide::Above => self.weight * self.settings.ladder.slope(self.distance[j]),
        }
    }

    /// Unweighted slope of the infeasibility sum for variable `j`.
    #[inline]
    pub fn phase_one_slope(&self, j: usize) -> f64 {
        match self.side[j] {
            BoundSide::Feasible => 0.0,
            BoundSide::Below => -1.0,
            BoundSide::Above => 1.0,
        }
    }

    #[inline]
    pub fn side(&self, j: usize) -> BoundSide {
        self.side[j]
    }

    /// Weighted penalty summed over all variables.
    pub fn total_penalty(&self) -> f64 {
        self.distance
            .iter()
            .filter(|&&d| d > 0.0)
            .map(|&d| self.weight * self.settings.ladder.penalty(d))
            .sum()
    }

    pub fn sum_infeasibilities(&self) -> f64 {
        self.sum.max(0.0)
    }

    pub fn number_infeasibilities(&self) -> usize {
        self.count
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn is_saturated(&self) -> bool {
        self.weight >= self.settings.max_weight
    }

    /// Multiply the weight, clamped at the ceiling. Returns `false` when the
    /// weight was already saturated.
    pub fn scale_weight(&mut self, factor: f64) -> bool {
        if self.is_saturated() {
            return false;
        }
        self.weight = (self.weight * factor).min(self.settings.max_weight);
        true
    }

    /// Growth when the infeasibility failed to decrease.
    pub fn grow_on_stall(&mut self) -> bool {
        if self.weight < self.settings.stall_cap {
            self.weight *= self.settings.stall_growth;
            true
        } else {
            false
        }
    }

    /// Growth when the weighted problem looks solved while still infeasible.
    pub fn escalate(&mut self) -> bool {
        let growth = self.settings.escalation_growth;
        self.scale_weight(growth)
    }

    /// Called when the iterate is feasible. The first call drops the weight to
    /// the feasible constant.
    pub fn note_feasible(&mut self) -> bool {
        if self.reached_feasible {
            return false;
        }
        self.reached_feasible = true;
        self.weight = self.settings.feasible_weight;
        true
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    /// Resize for a different variable count; resets the state.
    pub fn resize(&mut self, num_vars: usize) {
        self.side = vec![BoundSide::Feasible; num_vars];
        self.distance = vec![0.0; num_vars];
        self.sum = 0.0;
        self.count = 0;
    }

    /// Back to the initial weight.
    pub fn reset_weight(&mut self) {
        self.weight = self.settings.initial_weight;
        self.reached_feasible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(n: usize) -> NonlinearCostTracker {
        NonlinearCostTracker::new(PenaltySettings::default(), n, 1e-7)
    }

    #[test]
    fn test_set_one_tracks_sum() {
        let mut t = tracker(3);
        let (p, infeasible) = t.set_one(0, 0.0, 1.0, -2.0);
        assert!(infeasible);
        assert_eq!(p, 2.0 * t.weight());
        t.set_one(1, 0.0, 1.0, 3.0);
        assert_eq!(t.number_infeasibilities(), 2);
        assert!((t.sum_infeasibilities() - 4.0).abs() < 1e-12);
        assert_eq!(t.cost_slope(0), -t.weight());
        assert_eq!(t.cost_slope(1), t.weight());

        let (p, infeasible) = t.set_one(0, 0.0, 1.0, 0.5);
        assert!(!infeasible);
        assert_eq!(p, 0.0);
        assert_eq!(t.number_infeasibilities(), 1);
        assert!((t.sum_infeasibilities() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_weight_saturates() {
        let mut t = tracker(1);
        let mut steps = 0;
        while t.escalate() {
            steps += 1;
            assert!(steps < 100);
        }
        assert!(t.is_saturated());
        assert_eq!(t.weight(), PenaltySettings::default().max_weight);
    }

    #[test]
    fn test_first_feasibility_resets_weight_once() {
        let mut t = tracker(1);
        assert!(t.note_feasible());
        assert_eq!(t.weight(), PenaltySettings::default().feasible_weight);
        t.escalate();
        let w = t.weight();
        assert!(!t.note_feasible());
        assert_eq!(t.weight(), w);
    }

    #[test]
    fn test_ladder_penalty_and_slope() {
        let ladder = PenaltyLadder::new(vec![
            PenaltySegment::new(1.0, 1.0),
            PenaltySegment::new(2.0, 10.0),
            PenaltySegment::new(f64::INFINITY, 100.0),
        ]);
        assert_eq!(ladder.penalty(0.5), 0.5);
        assert_eq!(ladder.penalty(2.0), 1.0 + 10.0);
        assert_eq!(ladder.penalty(4.0), 1.0 + 20.0 + 100.0);
        assert_eq!(ladder.slope(0.5), 1.0);
        assert_eq!(ladder.slope(2.5), 10.0);
        assert_eq!(ladder.slope(10.0), 100.0);
    }
}
