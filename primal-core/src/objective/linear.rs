use super::{dot, linear_step, Objective, ObjectiveKind, StepLength};

/// `c · x`.
#[derive(Debug, Clone)]
pub struct LinearObjective {
    cost: Vec<f64>,
}

impl LinearObjective {
    pub fn new(cost: Vec<f64>) -> Self {
        Self { cost }
    }

    pub fn zeros(n: usize) -> Self {
        Self { cost: vec![0.0; n] }
    }

    pub fn cost(&self) -> &[f64] {
        &self.cost
    }

    pub fn cost_mut(&mut self) -> &mut [f64] {
        &mut self.cost
    }
}

impl Objective for LinearObjective {
    fn num_vars(&self) -> usize {
        self.cost.len()
    }

    fn kind(&self) -> ObjectiveKind {
        ObjectiveKind::Linear
    }

    fn value(&self, x: &[f64]) -> f64 {
        dot(&self.cost, x)
    }

    fn gradient(&self, _x: &[f64], grad: &mut [f64]) {
        grad.copy_from_slice(&self.cost);
    }

    fn step_length_shifted(
        &self,
        x: &[f64],
        direction: &[f64],
        max_theta: f64,
        slope_shift: f64,
    ) -> StepLength {
        linear_step(self.value(x), dot(&self.cost, direction) + slope_shift, max_theta)
    }

    fn mark_nonlinear(&self, _mask: &mut [bool]) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_step_goes_to_max() {
        let obj = LinearObjective::new(vec![1.0, -1.0]);
        let step = obj.step_length(&[0.0, 0.0], &[0.0, 1.0], 3.0);
        assert_eq!(step.theta, 3.0);
        assert_eq!(step.predicted, -3.0);

        let unbounded = obj.step_length(&[0.0, 0.0], &[0.0, 1.0], f64::INFINITY);
        assert!(unbounded.theta.is_infinite());
    }

    #[test]
    fn test_linear_step_uphill_is_zero() {
        let obj = LinearObjective::new(vec![1.0, -1.0]);
        let step = obj.step_length(&[0.0, 0.0], &[1.0, 0.0], 3.0);
        assert_eq!(step.theta, 0.0);
        assert_eq!(step.at_max, 3.0);
    }
}
