//! Nonlinear constraint descriptors for the constrained SLP loop.
//!
//! A nonlinear constraint owns one row of the problem. The row bounds of the
//! problem apply to the constraint's function value; at each pass the row is
//! replaced by its linearization `g · x + offset`.

use std::fmt;

/// Linearization of a constraint at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct Linearization {
    /// Gradient with respect to every structural column.
    pub coefficients: Vec<f64>,
    /// `function_value - coefficients · x`.
    pub offset: f64,
    pub function_value: f64,
}

pub trait Constraint: fmt::Debug {
    /// Row of the problem this constraint occupies.
    fn row_index(&self) -> usize;

    fn function_value(&self, x: &[f64]) -> f64;

    /// Gradient and offset at `x`.
    fn gradient(&self, x: &[f64]) -> Linearization;

    /// Set `mask[j] = true` for columns that may have a nonzero gradient.
    fn mark_nonzero(&self, mask: &mut [bool]) -> usize;

    /// Set `mask[j] = true` for columns entering nonlinearly.
    fn mark_nonlinear(&self, mask: &mut [bool]) -> usize {
        self.mark_nonzero(mask)
    }
}

type ValueFn = Box<dyn Fn(&[f64]) -> f64>;
type GradientFn = Box<dyn Fn(&[f64], &mut [f64])>;

/// Constraint supplied as closures.
pub struct FnConstraint {
    row: usize,
    n: usize,
    columns: Vec<usize>,
    value: ValueFn,
    gradient: GradientFn,
}

impl FnConstraint {
    /// `columns` lists the columns the function depends on.
    pub fn new<V, G>(row: usize, n: usize, columns: Vec<usize>, value: V, gradient: G) -> Self
    where
        V: Fn(&[f64]) -> f64 + 'static,
        G: Fn(&[f64], &mut [f64]) + 'static,
    {
        Self {
            row,
            n,
            columns,
            value: Box::new(value),
            gradient: Box::new(gradient),
        }
    }
}

impl fmt::Debug for FnConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConstraint")
            .field("row", &self.row)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl Constraint for FnConstraint {
    fn row_index(&self) -> usize {
        self.row
    }

    fn function_value(&self, x: &[f64]) -> f64 {
        (self.value)(&x[..self.n])
    }

    fn gradient(&self, x: &[f64]) -> Linearization {
        let x = &x[..self.n];
        let mut coefficients = vec![0.0; self.n];
        (self.gradient)(x, &mut coefficients);
        let function_value = (self.value)(x);
        let offset = function_value
            - coefficients
                .iter()
                .zip(x)
                .map(|(g, xi)| g * xi)
                .sum::<f64>();
        Linearization {
            coefficients,
            offset,
            function_value,
        }
    }

    fn mark_nonzero(&self, mask: &mut [bool]) -> usize {
        let mut count = 0;
        for &j in &self.columns {
            if j < mask.len() && !mask[j] {
                mask[j] = true;
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linearization_of_circle() {
        let c = FnConstraint::new(
            0,
            2,
            vec![0, 1],
            |x: &[f64]| x[0] * x[0] + x[1] * x[1],
            |x: &[f64], g: &mut [f64]| {
                g[0] = 2.0 * x[0];
                g[1] = 2.0 * x[1];
            },
        );
        let lin = c.gradient(&[1.0, 2.0]);
        assert_eq!(lin.coefficients, vec![2.0, 4.0]);
        assert_eq!(lin.function_value, 5.0);
        // 5 - (2 + 8)
        assert_eq!(lin.offset, -5.0);

        let mut mask = vec![false; 3];
        assert_eq!(c.mark_nonlinear(&mut mask), 2);
    }
}
