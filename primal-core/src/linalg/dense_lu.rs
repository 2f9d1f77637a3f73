//! Dense LU factorization of the basis with a product-form eta file.
//!
//! The basis is factorized column by column with partial (row) pivoting:
//! `L⁻¹ B = U` where the pivot of column `k` sits in row `pivot_row[k]`.
//! Multipliers are kept in place of the eliminated entries. Column
//! replacements append an eta vector instead of refactorizing; the
//! controller refactorizes from scratch every few dozen pivots.

use nalgebra::DMatrix;

use super::factor::{Factorization, FactorizationError, UpdateQuality};
use super::sparse::AugmentedMatrix;

/// Hard limit for `grow_workspace`.
const MAX_ETA_CAPACITY: usize = 1 << 14;

#[derive(Debug, Clone)]
struct Eta {
    position: usize,
    pivot: f64,
    entries: Vec<(usize, f64)>,
}

#[derive(Debug, Clone)]
pub struct DenseLu {
    m: usize,
    lu: DMatrix<f64>,
    /// Row holding the pivot of basis position `k`.
    pivot_row: Vec<usize>,
    /// Elimination step at which row `i` was chosen as pivot row.
    row_step: Vec<usize>,
    etas: Vec<Eta>,
    eta_capacity: usize,
    pivot_tolerance: f64,
    zero_tolerance: f64,
    column: Vec<f64>,
}

impl DenseLu {
    pub fn new(m: usize, eta_capacity: usize) -> Self {
        Self {
            m,
            lu: DMatrix::zeros(m, m),
            pivot_row: (0..m).collect(),
            row_step: (0..m).collect(),
            etas: Vec::new(),
            eta_capacity: eta_capacity.max(1),
            pivot_tolerance: 1e-8,
            zero_tolerance: 1e-11,
            column: vec![0.0; m],
        }
    }

    pub fn eta_capacity(&self) -> usize {
        self.eta_capacity
    }
}

impl Factorization for DenseLu {
    fn refactorize(
        &mut self,
        matrix: &AugmentedMatrix,
        basis: &[usize],
    ) -> Result<(), FactorizationError> {
        let m = self.m;
        if basis.len() != m || matrix.num_rows() != m {
            return Err(FactorizationError::DimensionMismatch {
                expected: m,
                got: basis.len(),
            });
        }

        self.etas.clear();
        self.lu.fill(0.0);
        let mut column_scale = vec![0.0f64; m];
        for (k, &var) in basis.iter().enumerate() {
            matrix.column_into(var, &mut self.column);
            for (i, &v) in self.column.iter().enumerate() {
                self.lu[(i, k)] = v;
                column_scale[k] = column_scale[k].max(v.abs());
            }
        }

        let mut used = vec![false; m];
        let mut dependent = Vec::new();
        for k in 0..m {
            let mut best_row = None;
            let mut best_abs = 0.0;
            for i in 0..m {
                if used[i] {
                    continue;
                }
                let v = self.lu[(i, k)].abs();
                if v > best_abs {
                    best_abs = v;
                    best_row = Some(i);
                }
            }

            let threshold = self.zero_tolerance * column_scale[k].max(1.0);
            let p = match best_row {
                Some(p) if best_abs > threshold => p,
                _ => {
                    dependent.push(k);
                    continue;
                }
            };

            used[p] = true;
            self.pivot_row[k] = p;
            self.row_step[p] = k;

            let piv = self.lu[(p, k)];
            for i in 0..m {
                if used[i] {
                    continue;
                }
                let l = self.lu[(i, k)] / piv;
                self.lu[(i, k)] = l;
                if l != 0.0 {
                    for j in (k + 1)..m {
                        let upj = self.lu[(p, j)];
                        if upj != 0.0 {
                            self.lu[(i, j)] -= l * upj;
                        }
                    }
                }
            }
        }

        if dependent.is_empty() {
            Ok(())
        } else {
            let free_rows: Vec<usize> = (0..m).filter(|&i| !used[i]).collect();
            Err(FactorizationError::Singular {
                dependent,
                free_rows,
            })
        }
    }

    fn ftran(&self, rhs: &mut [f64]) {
        let m = self.m;
        for k in 0..m {
            let bp = rhs[self.pivot_row[k]];
            if bp == 0.0 {
                continue;
            }
            for i in 0..m {
                if self.row_step[i] > k {
                    rhs[i] -= self.lu[(i, k)] * bp;
                }
            }
        }

        let mut x = vec![0.0; m];
        for k in (0..m).rev() {
            let p = self.pivot_row[k];
            let mut s = rhs[p];
            for j in (k + 1)..m {
                s -= self.lu[(p, j)] * x[j];
            }
            x[k] = s / self.lu[(p, k)];
        }

        for eta in &self.etas {
            let xr = x[eta.position] / eta.pivot;
            x[eta.position] = xr;
            if xr != 0.0 {
                for &(i, a) in &eta.entries {
                    x[i] -= a * xr;
                }
            }
        }
        rhs.copy_from_slice(&x);
    }

    fn btran(&self, rhs: &mut [f64]) {
        let m = self.m;
        for eta in self.etas.iter().rev() {
            let mut s = rhs[eta.position];
            for &(i, a) in &eta.entries {
                s -= a * rhs[i];
            }
            rhs[eta.position] = s / eta.pivot;
        }

        // Uᵀ w = c, w indexed by row
        let mut w = vec![0.0; m];
        for j in 0..m {
            let mut s = rhs[j];
            for k in 0..j {
                let p = self.pivot_row[k];
                s -= self.lu[(p, j)] * w[p];
            }
            let pj = self.pivot_row[j];
            w[pj] = s / self.lu[(pj, j)];
        }

        // y = L⁻ᵀ w
        for k in (0..m).rev() {
            let mut s = 0.0;
            for i in 0..m {
                if self.row_step[i] > k {
                    s += self.lu[(i, k)] * w[i];
                }
            }
            w[self.pivot_row[k]] -= s;
        }
        rhs.copy_from_slice(&w);
    }

    fn replace_column(&mut self, position: usize, column: &[f64]) -> UpdateQuality {
        if self.etas.len() >= self.eta_capacity {
            return UpdateQuality::OutOfMemory;
        }
        let pivot = column[position];
        let largest = column.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        let ratio = if largest > 0.0 { pivot.abs() / largest } else { 0.0 };
        if pivot.abs() <= self.zero_tolerance || ratio < self.pivot_tolerance * 1e-3 {
            return UpdateQuality::MajorError;
        }

        let entries = column
            .iter()
            .enumerate()
            .filter(|&(i, &a)| i != position && a != 0.0)
            .map(|(i, &a)| (i, a))
            .collect();
        self.etas.push(Eta {
            position,
            pivot,
            entries,
        });

        if ratio < self.pivot_tolerance {
            UpdateQuality::SlightError
        } else {
            UpdateQuality::Ok
        }
    }

    fn pivots(&self) -> usize {
        self.etas.len()
    }

    fn pivot_tolerance(&self) -> f64 {
        self.pivot_tolerance
    }

    fn set_pivot_tolerance(&mut self, value: f64) {
        self.pivot_tolerance = value.clamp(1e-12, 0.5);
    }

    fn zero_tolerance(&self) -> f64 {
        self.zero_tolerance
    }

    fn set_zero_tolerance(&mut self, value: f64) {
        self.zero_tolerance = value.clamp(1e-20, 1e-3);
    }

    fn grow_workspace(&mut self) -> bool {
        if self.eta_capacity >= MAX_ETA_CAPACITY {
            return false;
        }
        self.eta_capacity = (self.eta_capacity * 2).min(MAX_ETA_CAPACITY);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::{from_triplets, AugmentedMatrix};

    fn matrix() -> AugmentedMatrix {
        // A = [[2, 1, 0], [1, 3, 1], [0, 1, 4]]
        AugmentedMatrix::new(from_triplets(
            3,
            3,
            vec![
                (0, 0, 2.0),
                (0, 1, 1.0),
                (1, 0, 1.0),
                (1, 1, 3.0),
                (1, 2, 1.0),
                (2, 1, 1.0),
                (2, 2, 4.0),
            ],
        ))
    }

    fn basis_times(aug: &AugmentedMatrix, basis: &[usize], x: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; aug.num_rows()];
        for (k, &var) in basis.iter().enumerate() {
            aug.add_column(var, x[k], &mut out);
        }
        out
    }

    fn basis_transpose_times(aug: &AugmentedMatrix, basis: &[usize], y: &[f64]) -> Vec<f64> {
        basis.iter().map(|&var| aug.column_dot(var, y)).collect()
    }

    #[test]
    fn test_ftran_btran_solve() {
        let aug = matrix();
        let basis = [0, 4, 2];
        let mut lu = DenseLu::new(3, 10);
        lu.refactorize(&aug, &basis).unwrap();

        let b = vec![1.0, -2.0, 3.0];
        let mut x = b.clone();
        lu.ftran(&mut x);
        let bx = basis_times(&aug, &basis, &x);
        for i in 0..3 {
            assert!((bx[i] - b[i]).abs() < 1e-12, "ftran residual at {}", i);
        }

        let c = vec![0.5, 1.0, -1.0];
        let mut y = c.clone();
        lu.btran(&mut y);
        let bty = basis_transpose_times(&aug, &basis, &y);
        for k in 0..3 {
            assert!((bty[k] - c[k]).abs() < 1e-12, "btran residual at {}", k);
        }
    }

    #[test]
    fn test_replace_column_matches_refactorization() {
        let aug = matrix();
        let mut basis = vec![3, 4, 5];
        let mut lu = DenseLu::new(3, 10);
        lu.refactorize(&aug, &basis).unwrap();

        // Bring column 1 in at position 1.
        let mut alpha = vec![0.0; 3];
        aug.column_into(1, &mut alpha);
        lu.ftran(&mut alpha);
        assert_eq!(lu.replace_column(1, &alpha), UpdateQuality::Ok);
        basis[1] = 1;
        assert_eq!(lu.pivots(), 1);

        let b = vec![1.0, 2.0, 3.0];
        let mut x = b.clone();
        lu.ftran(&mut x);
        let bx = basis_times(&aug, &basis, &x);
        for i in 0..3 {
            assert!((bx[i] - b[i]).abs() < 1e-12);
        }

        let mut y = vec![1.0, -1.0, 2.0];
        let c = y.clone();
        lu.btran(&mut y);
        let bty = basis_transpose_times(&aug, &basis, &y);
        for k in 0..3 {
            assert!((bty[k] - c[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_singular_basis_reports_dependent_columns() {
        // Columns 0 and 1 are identical.
        let aug = AugmentedMatrix::new(from_triplets(
            2,
            2,
            vec![(0, 0, 1.0), (1, 0, 1.0), (0, 1, 1.0), (1, 1, 1.0)],
        ));
        let mut lu = DenseLu::new(2, 10);
        match lu.refactorize(&aug, &[0, 1]) {
            Err(FactorizationError::Singular { dependent, free_rows }) => {
                assert_eq!(dependent, vec![1]);
                assert_eq!(free_rows.len(), 1);
            }
            other => panic!("expected singular basis, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_out_of_memory_and_growth() {
        let aug = matrix();
        let mut lu = DenseLu::new(3, 1);
        lu.refactorize(&aug, &[3, 4, 5]).unwrap();

        let mut alpha = vec![0.0; 3];
        aug.column_into(0, &mut alpha);
        lu.ftran(&mut alpha);
        assert_eq!(lu.replace_column(0, &alpha), UpdateQuality::Ok);

        let mut alpha = vec![0.0; 3];
        aug.column_into(2, &mut alpha);
        lu.ftran(&mut alpha);
        assert_eq!(lu.replace_column(2, &alpha), UpdateQuality::OutOfMemory);
        assert!(lu.grow_workspace());
        assert_eq!(lu.eta_capacity(), 2);
    }

    #[test]
    fn test_tiny_pivot_is_major_error() {
        let aug = matrix();
        let mut lu = DenseLu::new(3, 10);
        lu.refactorize(&aug, &[3, 4, 5]).unwrap();
        let alpha = vec![1.0, 1e-14, 0.0];
        assert_eq!(lu.replace_column(1, &alpha), UpdateQuality::MajorError);
        assert_eq!(lu.pivots(), 0);
    }
}
