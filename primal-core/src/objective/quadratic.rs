use super::{dot, Objective, ObjectiveKind, StepLength, UNBOUNDED_STEP};
use crate::linalg::sparse::{symv_upper, SparseSymmetricCsc};

/// `c · x + ½ xᵀ Q x` with `Q` stored as its upper triangle.
#[derive(Debug, Clone)]
pub struct QuadraticObjective {
    cost: Vec<f64>,
    q: SparseSymmetricCsc,
}

impl QuadraticObjective {
    pub fn new(cost: Vec<f64>, q: SparseSymmetricCsc) -> Self {
        Self { cost, q }
    }

    pub fn hessian(&self) -> &SparseSymmetricCsc {
        &self.q
    }

    fn quad_form(&self, u: &[f64], v: &[f64]) -> f64 {
        let mut qv = vec![0.0; v.len()];
        symv_upper(&self.q, v, &mut qv);
        dot(u, &qv)
    }
}

impl Objective for QuadraticObjective {
    fn num_vars(&self) -> usize {
        self.cost.len()
    }

    fn kind(&self) -> ObjectiveKind {
        if self.q.nnz() == 0 {
            ObjectiveKind::Linear
        } else {
            ObjectiveKind::Quadratic
        }
    }

    fn value(&self, x: &[f64]) -> f64 {
        dot(&self.cost, x) + 0.5 * self.quad_form(x, x)
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        symv_upper(&self.q, x, grad);
        for (g, c) in grad.iter_mut().zip(&self.cost) {
            *g += c;
        }
    }

    /// Along `x + t d` the objective is `current + b t + a t²` with
    /// `a = ½ dᵀQd` and `b = (c + Qx) · d`.
    fn step_length_shifted(
        &self,
        x: &[f64],
        direction: &[f64],
        max_theta: f64,
        slope_shift: f64,
    ) -> StepLength {
        let current = self.value(x);
        let mut grad = vec![0.0; x.len()];
        self.gradient(x, &mut grad);
        let a = 0.5 * self.quad_form(direction, direction);
        let b = dot(&grad, direction) + slope_shift;
        let bounded = max_theta.is_finite() && max_theta < UNBOUNDED_STEP;
        let eval = |t: f64| current + b * t + a * t * t;

        let at_max = if bounded {
            eval(max_theta)
        } else if a > 0.0 {
            f64::INFINITY
        } else if b < 0.0 || a < 0.0 {
            f64::NEG_INFINITY
        } else {
            current
        };

        let theta = if a > 1e-300 {
            if b < 0.0 {
                (-0.5 * b / a).min(max_theta)
            } else {
                0.0
            }
        } else if b < 0.0 {
            max_theta
        } else {
            0.0
        };

        let predicted = if theta.is_finite() && theta < UNBOUNDED_STEP {
            eval(theta)
        } else {
            f64::NEG_INFINITY
        };
        StepLength {
            current,
            theta,
            predicted,
            at_max,
        }
    }

    fn mark_nonlinear(&self, mask: &mut [bool]) -> usize {
        for (col, col_view) in self.q.outer_iterator().enumerate() {
            for (row, &val) in col_view.iter() {
                if val != 0.0 {
                    mask[row] = true;
                    mask[col] = true;
                }
            }
        }
        mask.iter().filter(|&&m| m).count()
    }
}
