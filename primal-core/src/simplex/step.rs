//! Step length along a search direction.
//!
//! The boundary step is the ratio test over every moving variable; the
//! objective step is the minimizer of the (penalized) objective along the
//! direction. The evaluator reconciles the two into one decision.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::nonlinear_cost::{BoundSide, NonlinearCostTracker};
use super::variables::{BasisMap, VariableStore};
use crate::objective::{StepLength, UNBOUNDED_STEP};

/// What stops a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// The objective minimum lies strictly before every bound.
    Interior,
    /// A non-basic mover reaches one of its own bounds.
    NonbasicBound { var: usize },
    /// The basic variable in `row` reaches a bound and must leave.
    BasicBound { row: usize, var: usize },
    /// Nothing blocks and the objective decreases without limit.
    Unbounded,
}

/// Ratio-test result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub theta: f64,
    /// `None` when no variable blocks.
    pub kind: Option<StepKind>,
}

impl Boundary {
    pub fn is_finite(&self) -> bool {
        self.kind.is_some() && self.theta < UNBOUNDED_STEP
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDecision {
    pub theta: f64,
    pub kind: StepKind,
    pub boundary_theta: f64,
    pub objective: StepLength,
}

/// Ratio test with Harris relaxation and a seeded tie-break.
#[derive(Debug, Clone)]
pub struct StepLengthEvaluator {
    pub acceptable_pivot: f64,
    pub primal_tolerance: f64,
    rng: ChaCha8Rng,
}

struct Candidate {
    row: usize,
    var: usize,
    distance: f64,
    alpha: f64,
}

impl StepLengthEvaluator {
    pub fn new(acceptable_pivot: f64, primal_tolerance: f64, seed: u64) -> Self {
        Self {
            acceptable_pivot,
            primal_tolerance,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Width of the Harris band for basic variables.
    #[inline]
    pub fn basic_tolerance(&self) -> f64 {
        1e-4 * self.primal_tolerance
    }

    /// Largest step before some variable hits a bound.
    pub fn boundary(
        &mut self,
        vars: &VariableStore,
        basis: &BasisMap,
        tracker: &NonlinearCostTracker,
        direction: &[f64],
    ) -> Boundary {
        let mut nonbasic = Boundary {
            theta: f64::INFINITY,
            kind: None,
        };
        for (j, &d) in direction.iter().enumerate() {
            if d == 0.0 || vars.is_basic(j) {
                continue;
            }
            let room = vars.room(j, d);
            if !room.is_finite() {
                continue;
            }
            let theta = room / d.abs();
            if theta < nonbasic.theta {
                nonbasic = Boundary {
                    theta,
                    kind: Some(StepKind::NonbasicBound { var: j }),
                };
            }
        }

        let basic = self.basic_ratio_test(vars, basis, tracker, direction);
        match basic {
            Some(b) if b.theta < nonbasic.theta => b,
            _ => nonbasic,
        }
    }

    fn basic_ratio_test(
        &mut self,
        vars: &VariableStore,
        basis: &BasisMap,
        tracker: &NonlinearCostTracker,
        direction: &[f64],
    ) -> Option<Boundary> {
        let mut candidates = Vec::new();
        for row in 0..basis.num_rows() {
            let var = basis.variable(row);
            let alpha = direction[var];
            if alpha.abs() < self.acceptable_pivot {
                continue;
            }
            let value = vars.value[var];
            let distance = match tracker.side(var) {
                BoundSide::Below if alpha > 0.0 => vars.lower[var] - value,
                BoundSide::Above if alpha < 0.0 => value - vars.upper[var],
                BoundSide::Below | BoundSide::Above => continue,
                BoundSide::Feasible if alpha > 0.0 => vars.upper[var] - value,
                BoundSide::Feasible => value - vars.lower[var],
            };
            if !distance.is_finite() {
                continue;
            }
            candidates.push(Candidate {
                row,
                var,
                distance: distance.max(0.0),
                alpha: alpha.abs(),
            });
        }
        if candidates.is_empty() {
            return None;
        }

        // Pass 1: relaxed step limit.
        let tol = self.basic_tolerance();
        let limit = candidates
            .iter()
            .map(|c| (c.distance + tol) / c.alpha)
            .fold(f64::INFINITY, f64::min);

        // Pass 2: largest pivot inside the relaxed limit.
        let mut best: Option<&Candidate> = None;
        for c in candidates.iter().filter(|c| c.distance / c.alpha <= limit) {
            let replace = match best {
                None => true,
                Some(b) => {
                    if c.alpha > b.alpha * (1.0 + 1e-12) {
                        true
                    } else if c.alpha * (1.0 + 1e-12) < b.alpha {
                        false
                    } else if c.distance < b.distance {
                        true
                    } else if c.distance > b.distance {
                        false
                    } else {
                        self.rng.gen_bool(0.5)
                    }
                }
            };
            if replace {
                best = Some(c);
            }
        }

        best.map(|c| Boundary {
            theta: c.distance / c.alpha,
            kind: Some(StepKind::BasicBound {
                row: c.row,
                var: c.var,
            }),
        })
    }

    /// Step all the way to the first blocking bound, ignoring the objective.
    /// `None` when nothing blocks.
    pub fn to_boundary(&self, boundary: Boundary, current: f64) -> Option<StepDecision> {
        let blocking = boundary.kind.filter(|_| boundary.is_finite())?;
        Some(StepDecision {
            theta: boundary.theta,
            kind: blocking,
            boundary_theta: boundary.theta,
            objective: StepLength {
                current,
                theta: boundary.theta,
                predicted: current,
                at_max: current,
            },
        })
    }

    /// Combine the ratio test with the objective's own step.
    pub fn reconcile(&self, boundary: Boundary, objective: StepLength) -> StepDecision {
        let Some(blocking) = boundary.kind.filter(|_| boundary.is_finite()) else {
            let kind = if objective.theta >= UNBOUNDED_STEP || !objective.theta.is_finite() {
                StepKind::Unbounded
            } else {
                StepKind::Interior
            };
            return StepDecision {
                theta: objective.theta,
                kind,
                boundary_theta: f64::INFINITY,
                objective,
            };
        };

        let boundary_better = objective.at_max < objective.current - 1e-12;
        let coincide = objective.theta + 1e-10 > boundary.theta;
        let interior = objective.theta < boundary.theta && !(boundary_better && coincide);

        if interior {
            StepDecision {
                theta: objective.theta.max(0.0),
                kind: StepKind::Interior,
                boundary_theta: boundary.theta,
                objective,
            }
        } else {
            StepDecision {
                theta: boundary.theta,
                kind: blocking,
                boundary_theta: boundary.theta,
                objective,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::PenaltySettings;
    use crate::simplex::variables::VarStatus;

    /// Two structurals (0 non-basic mover, 1 basic) and one logical (basic).
    fn setup() -> (VariableStore, BasisMap, NonlinearCostTracker) {
        let mut vars = VariableStore::new(2, 1);
        vars.lower = vec![0.0, 0.0, f64::NEG_INFINITY];
        vars.upper = vec![100.0, 10.0, f64::INFINITY];
        vars.value = vec![0.0, 4.0, 0.0];
        vars.set_status(0, VarStatus::AtLower);
        vars.set_status(1, VarStatus::Basic);
        vars.set_status(2, VarStatus::Basic);
        let mut basis = BasisMap::slack(2, 1);
        basis.replace(0, 1);
        let mut tracker = NonlinearCostTracker::new(PenaltySettings::default(), 3, 1e-7);
        tracker.check_infeasibilities(&vars);
        (vars, basis, tracker)
    }

    #[test]
    fn test_single_blocking_variable_theta() {
        let (vars, basis, tracker) = setup();
        let mut eval = StepLengthEvaluator::new(1e-7, 1e-7, 1);
        // Variable 1 sits 4 above its lower bound and decreases at rate 2.
        let direction = vec![1.0, -2.0, 0.0];
        let b = eval.boundary(&vars, &basis, &tracker, &direction);
        assert!((b.theta - 2.0).abs() < 1e-12);
        assert_eq!(b.kind, Some(StepKind::BasicBound { row: 0, var: 1 }));
    }

    #[test]
    fn test_nonbasic_bound_wins_when_closer() {
        let (vars, basis, tracker) = setup();
        let mut eval = StepLengthEvaluator::new(1e-7, 1e-7, 1);
        let direction = vec![-1.0, 0.0, 0.0];
        let b = eval.boundary(&vars, &basis, &tracker, &direction);
        assert_eq!(b.theta, 0.0);
        assert_eq!(b.kind, Some(StepKind::NonbasicBound { var: 0 }));
    }

    #[test]
    fn test_infeasible_basic_blocks_at_approached_bound() {
        let (mut vars, basis, mut tracker) = setup();
        vars.value[1] = -3.0;
        tracker.check_infeasibilities(&vars);
        let mut eval = StepLengthEvaluator::new(1e-7, 1e-7, 1);

        // Moving up toward feasibility: blocks at the lower bound.
        let b = eval.boundary(&vars, &basis, &tracker, &[1.0, 1.5, 0.0]);
        assert!((b.theta - 2.0).abs() < 1e-12);

        // Moving further away: does not block.
        let b = eval.boundary(&vars, &basis, &tracker, &[1.0, -1.5, 0.0]);
        assert_eq!(b.kind, Some(StepKind::NonbasicBound { var: 0 }));
        assert_eq!(b.theta, 100.0);
    }

    #[test]
    fn test_reconcile() {
        let eval = StepLengthEvaluator::new(1e-7, 1e-7, 1);
        let boundary = Boundary {
            theta: 2.0,
            kind: Some(StepKind::NonbasicBound { var: 0 }),
        };
        let interior = StepLength {
            current: 1.0,
            theta: 1.0,
            predicted: 0.5,
            at_max: 1.0,
        };
        let d = eval.reconcile(boundary, interior);
        assert_eq!(d.kind, StepKind::Interior);
        assert_eq!(d.theta, 1.0);

        let at_bound = StepLength {
            current: 1.0,
            theta: 2.0,
            predicted: 0.0,
            at_max: 0.0,
        };
        let d = eval.reconcile(boundary, at_bound);
        assert_eq!(d.kind, StepKind::NonbasicBound { var: 0 });
        assert_eq!(d.theta, 2.0);

        let unbounded = Boundary {
            theta: f64::INFINITY,
            kind: None,
        };
        let ray = StepLength {
            current: 1.0,
            theta: f64::INFINITY,
            predicted: f64::NEG_INFINITY,
            at_max: f64::NEG_INFINITY,
        };
        assert_eq!(eval.reconcile(unbounded, ray).kind, StepKind::Unbounded);
    }
}
