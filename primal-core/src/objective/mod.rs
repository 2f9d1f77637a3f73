//! Objective descriptors.
//!
//! The simplex asks an objective for its value and gradient at a point and
//! for the best step along a search direction. Linear and quadratic objectives
//! answer the step question in closed form; general objectives fall back to a
//! derivative-based line search.

mod general;
mod linear;
mod quadratic;

pub use general::FnObjective;
pub use linear::LinearObjective;
pub use quadratic::QuadraticObjective;

use std::fmt;

/// Step lengths at or above this are treated as unbounded.
pub const UNBOUNDED_STEP: f64 = 1e20;

/// Result of a one-dimensional search along a direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLength {
    /// Objective at the starting point.
    pub current: f64,
    /// Minimizing step, clipped to `[0, max_theta]`.
    pub theta: f64,
    /// Objective at `theta`.
    pub predicted: f64,
    /// Objective at `max_theta` (infinite when `max_theta` is).
    pub at_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveKind {
    Linear,
    Quadratic,
    General,
}

/// Objective function over the structural columns.
pub trait Objective: fmt::Debug {
    /// Number of columns the objective is defined over.
    fn num_vars(&self) -> usize;

    fn kind(&self) -> ObjectiveKind;

    fn is_nonlinear(&self) -> bool {
        self.kind() != ObjectiveKind::Linear
    }

    fn value(&self, x: &[f64]) -> f64;

    /// Gradient at `x`, written into `grad` (length `num_vars`).
    fn gradient(&self, x: &[f64], grad: &mut [f64]);

    /// Best step along `direction` from `x`, at most `max_theta`.
    fn step_length(&self, x: &[f64], direction: &[f64], max_theta: f64) -> StepLength {
        self.step_length_shifted(x, direction, max_theta, 0.0)
    }

    /// Like [`Objective::step_length`] for `f(x + t d) + slope_shift * t`.
    ///
    /// The shift carries linear terms the objective does not know about,
    /// such as infeasibility penalties.
    fn step_length_shifted(
        &self,
        x: &[f64],
        direction: &[f64],
        max_theta: f64,
        slope_shift: f64,
    ) -> StepLength {
        line_search(self, x, direction, max_theta, slope_shift)
    }

    /// Set `mask[j] = true` for every column entering the objective
    /// nonlinearly. Returns the number of such columns.
    fn mark_nonlinear(&self, mask: &mut [bool]) -> usize;
}

struct LineSearch<'a, O: Objective + ?Sized> {
    objective: &'a O,
    x: &'a [f64],
    d: &'a [f64],
    shift: f64,
    trial: Vec<f64>,
    grad: Vec<f64>,
}

impl<'a, O: Objective + ?Sized> LineSearch<'a, O> {
    fn move_to(&mut self, t: f64) {
        for ((p, &x), &d) in self.trial.iter_mut().zip(self.x).zip(self.d) {
            *p = x + t * d;
        }
    }

    fn value(&mut self, t: f64) -> f64 {
        self.move_to(t);
        self.objective.value(&self.trial) + self.shift * t
    }

    fn slope(&mut self, t: f64) -> f64 {
        self.move_to(t);
        self.objective.gradient(&self.trial, &mut self.grad);
        dot(&self.grad, self.d) + self.shift
    }
}

/// Bracketing and bisection on the directional derivative.
///
/// Finds a stationary point of `f(x + t d) + shift * t` on `[0, max_theta]`,
/// then halves the step until the value does not exceed the starting value.
pub fn line_search<O: Objective + ?Sized>(
    objective: &O,
    x: &[f64],
    direction: &[f64],
    max_theta: f64,
    slope_shift: f64,
) -> StepLength {
    let n = x.len();
    let mut line = LineSearch {
        objective,
        x,
        d: direction,
        shift: slope_shift,
        trial: vec![0.0; n],
        grad: vec![0.0; n],
    };
    let current = objective.value(x);
    let bounded = max_theta.is_finite() && max_theta < UNBOUNDED_STEP;

    if !(line.slope(0.0) < 0.0) || max_theta <= 0.0 {
        let at_max = if bounded { line.value(max_theta) } else { f64::INFINITY };
        return StepLength {
            current,
            theta: 0.0,
            predicted: current,
            at_max,
        };
    }

    let (mut lo, mut hi) = if bounded {
        if line.slope(max_theta) <= 0.0 {
            let v = line.value(max_theta);
            return StepLength {
                current,
                theta: max_theta,
                predicted: v,
                at_max: v,
            };
        }
        (0.0, max_theta)
    } else {
        let mut hi = 1.0;
        while line.slope(hi) < 0.0 {
            hi *= 2.0;
            if hi >= UNBOUNDED_STEP {
                return StepLength {
                    current,
                    theta: f64::INFINITY,
                    predicted: f64::NEG_INFINITY,
                    at_max: f64::NEG_INFINITY,
                };
            }
        }
        (if hi > 1.0 { 0.5 * hi } else { 0.0 }, hi)
    };

    for _ in 0..200 {
        if hi - lo <= 1e-13 * (1.0 + hi) {
            break;
        }
        let mid = 0.5 * (lo + hi);
        if line.slope(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let mut theta = 0.5 * (lo + hi);
    let mut predicted = line.value(theta);
    while predicted > current && theta > 0.0 {
        theta *= 0.5;
        if theta < 1e-16 {
            theta = 0.0;
            predicted = current;
            break;
        }
        predicted = line.value(theta);
    }

    let at_max = if bounded { line.value(max_theta) } else { f64::INFINITY };
    StepLength {
        current,
        theta,
        predicted,
        at_max,
    }
}

/// Objective negated, used to turn maximization into minimization.
#[derive(Debug)]
pub struct NegatedObjective {
    inner: Box<dyn Objective>,
}

impl NegatedObjective {
    pub fn new(inner: Box<dyn Objective>) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> Box<dyn Objective> {
        self.inner
    }
}

impl Objective for NegatedObjective {
    fn num_vars(&self) -> usize {
        self.inner.num_vars()
    }

    fn kind(&self) -> ObjectiveKind {
        self.inner.kind()
    }

    fn value(&self, x: &[f64]) -> f64 {
        -self.inner.value(x)
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        self.inner.gradient(x, grad);
        for g in grad.iter_mut() {
            *g = -*g;
        }
    }

    fn step_length_shifted(
        &self,
        x: &[f64],
        direction: &[f64],
        max_theta: f64,
        slope_shift: f64,
    ) -> StepLength {
        if self.kind() == ObjectiveKind::Linear {
            let mut grad = vec![0.0; x.len()];
            self.gradient(x, &mut grad);
            linear_step(self.value(x), dot(&grad, direction) + slope_shift, max_theta)
        } else {
            line_search(self, x, direction, max_theta, slope_shift)
        }
    }

    fn mark_nonlinear(&self, mask: &mut [bool]) -> usize {
        self.inner.mark_nonlinear(mask)
    }
}

/// Closed-form step for a function that is linear along the direction.
pub(crate) fn linear_step(current: f64, slope: f64, max_theta: f64) -> StepLength {
    let bounded = max_theta.is_finite() && max_theta < UNBOUNDED_STEP;
    if slope < 0.0 {
        let value = if bounded {
            current + slope * max_theta
        } else {
            f64::NEG_INFINITY
        };
        StepLength {
            current,
            theta: if bounded { max_theta } else { f64::INFINITY },
            predicted: value,
            at_max: value,
        }
    } else {
        let at_max = if bounded {
            current + slope * max_theta
        } else if slope > 0.0 {
            f64::INFINITY
        } else {
            current
        };
        StepLength {
            current,
            theta: 0.0,
            predicted: current,
            at_max,
        }
    }
}

#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_search_quartic() {
        // f(x) = (x - 1)^4 along d = 1 from 0: minimizer at t = 1
        let obj = FnObjective::new(
            1,
            |x: &[f64]| (x[0] - 1.0).powi(4),
            |x: &[f64], g: &mut [f64]| g[0] = 4.0 * (x[0] - 1.0).powi(3),
        );
        let step = obj.step_length(&[0.0], &[1.0], f64::INFINITY);
        assert!((step.theta - 1.0).abs() < 1e-3, "theta = {}", step.theta);
        assert!(step.predicted < 1e-9);
        assert_eq!(step.current, 1.0);
    }

    #[test]
    fn test_line_search_clips_at_max() {
        let obj = FnObjective::new(
            1,
            |x: &[f64]| x[0] * x[0],
            |x: &[f64], g: &mut [f64]| g[0] = 2.0 * x[0],
        );
        let step = obj.step_length(&[10.0], &[-1.0], 4.0);
        assert_eq!(step.theta, 4.0);
        assert_eq!(step.predicted, 36.0);
        assert_eq!(step.at_max, 36.0);
    }

    #[test]
    fn test_line_search_ascent_direction() {
        let obj = FnObjective::new(
            1,
            |x: &[f64]| x[0] * x[0],
            |x: &[f64], g: &mut [f64]| g[0] = 2.0 * x[0],
        );
        let step = obj.step_length(&[1.0], &[1.0], 2.0);
        assert_eq!(step.theta, 0.0);
        assert_eq!(step.predicted, 1.0);
        assert_eq!(step.at_max, 9.0);
    }

    #[test]
    fn test_negated_linear() {
        let obj = NegatedObjective::new(Box::new(LinearObjective::new(vec![1.0, 2.0])));
        assert_eq!(obj.value(&[1.0, 1.0]), -3.0);
        let step = obj.step_length(&[0.0, 0.0], &[1.0, 0.0], 5.0);
        assert_eq!(step.theta, 5.0);
        assert_eq!(step.predicted, -5.0);
    }
}
