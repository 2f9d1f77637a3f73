use std::fmt;

use super::{Objective, ObjectiveKind};

type ValueFn = Box<dyn Fn(&[f64]) -> f64>;
type GradientFn = Box<dyn Fn(&[f64], &mut [f64])>;

/// General smooth objective supplied as closures.
///
/// Step lengths come from the default derivative-based line search.
pub struct FnObjective {
    n: usize,
    value: ValueFn,
    gradient: GradientFn,
    nonlinear: Option<Vec<usize>>,
}

impl FnObjective {
    pub fn new<V, G>(n: usize, value: V, gradient: G) -> Self
    where
        V: Fn(&[f64]) -> f64 + 'static,
        G: Fn(&[f64], &mut [f64]) + 'static,
    {
        Self {
            n,
            value: Box::new(value),
            gradient: Box::new(gradient),
            nonlinear: None,
        }
    }

    /// Restrict the nonlinear columns; by default every column is nonlinear.
    pub fn with_nonlinear_columns(mut self, columns: Vec<usize>) -> Self {
        self.nonlinear = Some(columns);
        self
    }
}

impl fmt::Debug for FnObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObjective")
            .field("n", &self.n)
            .field("nonlinear", &self.nonlinear)
            .finish_non_exhaustive()
    }
}

impl Objective for FnObjective {
    fn num_vars(&self) -> usize {
        self.n
    }

    fn kind(&self) -> ObjectiveKind {
        ObjectiveKind::General
    }

    fn value(&self, x: &[f64]) -> f64 {
        (self.value)(&x[..self.n])
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        (self.gradient)(&x[..self.n], &mut grad[..self.n]);
    }

    fn mark_nonlinear(&self, mask: &mut [bool]) -> usize {
        match &self.nonlinear {
            Some(cols) => {
                for &j in cols {
                    if j < mask.len() {
                        mask[j] = true;
                    }
                }
            }
            None => {
                for m in mask.iter_mut().take(self.n) {
                    *m = true;
                }
            }
        }
        mask.iter().filter(|&&m| m).count()
    }
}
