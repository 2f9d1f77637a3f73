//! Sparse matrix types and operations.
//!
//! The constraint matrix is stored column-wise (CSC) through `sprs`. The
//! simplex works on the augmented matrix `[A | -I]`, where column `n + i` is
//! the logical variable of row `i`; [`AugmentedMatrix`] provides column access
//! over both parts without materializing the identity block.

use sprs::{CsMat, TriMat};

/// Sparse matrix in CSC format (general, not necessarily symmetric).
pub type SparseCsc = CsMat<f64>;

/// Sparse symmetric matrix in CSC format (upper triangle only).
pub type SparseSymmetricCsc = CsMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// Duplicate entries are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Build a symmetric sparse CSC matrix from upper triangle triplets.
///
/// Entries below the diagonal are mirrored into the upper triangle.
pub fn from_triplets_symmetric<I>(n: usize, triplets: I) -> SparseSymmetricCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((n, n));
    for (i, j, v) in triplets {
        if j >= i {
            tri.add_triplet(i, j, v);
        } else {
            tri.add_triplet(j, i, v);
        }
    }
    tri.to_csc()
}

/// Collect the entries of a CSC matrix as (row, col, value) triplets.
pub fn triplets(a: &SparseCsc) -> Vec<(usize, usize, f64)> {
    let mut out = Vec::with_capacity(a.nnz());
    for (col, col_view) in a.outer_iterator().enumerate() {
        for (row, &val) in col_view.iter() {
            out.push((row, col, val));
        }
    }
    out
}

/// Sparse matrix-vector product: y = alpha * A * x + beta * y
pub fn spmv(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.cols(), x.len());
    assert_eq!(a.rows(), y.len());

    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }

    if alpha != 0.0 {
        for (col, col_view) in a.outer_iterator().enumerate() {
            let xc = x[col];
            if xc == 0.0 {
                continue;
            }
            for (row, &val) in col_view.iter() {
                y[row] += alpha * val * xc;
            }
        }
    }
}

/// Symmetric product `y = P x` where only the upper triangle of P is stored.
pub fn symv_upper(p: &SparseSymmetricCsc, x: &[f64], y: &mut [f64]) {
    y.fill(0.0);
    for (col, col_view) in p.outer_iterator().enumerate() {
        for (row, &val) in col_view.iter() {
            if row == col {
                y[row] += val * x[col];
            } else {
                y[row] += val * x[col];
                y[col] += val * x[row];
            }
        }
    }
}

/// Constraint matrix augmented with one logical column per row.
///
/// Variable `j < n` is column `j` of `A`; variable `n + i` has the column
/// `-e_i`. Every simplex iterate satisfies `[A | -I] z = 0`.
#[derive(Debug, Clone)]
pub struct AugmentedMatrix {
    a: SparseCsc,
}

impl AugmentedMatrix {
    pub fn new(a: SparseCsc) -> Self {
        // Column access below relies on CSC storage.
        let a = if a.is_csc() { a } else { a.to_csc() };
        Self { a }
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.a.rows()
    }

    #[inline]
    pub fn num_cols(&self) -> usize {
        self.a.cols()
    }

    /// Total number of variables (structural + logical).
    #[inline]
    pub fn num_vars(&self) -> usize {
        self.a.rows() + self.a.cols()
    }

    pub fn structural(&self) -> &SparseCsc {
        &self.a
    }

    /// Replace the structural block, keeping the shape.
    pub fn replace_structural(&mut self, a: SparseCsc) {
        debug_assert_eq!(a.rows(), self.a.rows());
        debug_assert_eq!(a.cols(), self.a.cols());
        self.a = if a.is_csc() { a } else { a.to_csc() };
    }

    /// `out += scale * column(var)`.
    pub fn add_column(&self, var: usize, scale: f64, out: &mut [f64]) {
        let n = self.a.cols();
        if var < n {
            if let Some(col) = self.a.outer_view(var) {
                for (row, &val) in col.iter() {
                    out[row] += scale * val;
                }
            }
        } else {
            out[var - n] -= scale;
        }
    }

    /// Dense copy of column `var` into `out` (overwritten).
    pub fn column_into(&self, var: usize, out: &mut [f64]) {
        out.fill(0.0);
        self.add_column(var, 1.0, out);
    }

    /// `y · column(var)` for a row-indexed vector `y`.
    pub fn column_dot(&self, var: usize, y: &[f64]) -> f64 {
        let n = self.a.cols();
        if var < n {
            match self.a.outer_view(var) {
                Some(col) => col.iter().map(|(row, &val)| val * y[row]).sum(),
                None => 0.0,
            }
        } else {
            -y[var - n]
        }
    }

    /// Row activities `A x` of the structural part.
    pub fn row_activity(&self, x: &[f64], out: &mut [f64]) {
        spmv(&self.a, &x[..self.a.cols()], out, 1.0, 0.0);
    }

    /// Residual `[A | -I] z`; zero for a consistent iterate.
    pub fn residual(&self, z: &[f64], out: &mut [f64]) {
        let n = self.a.cols();
        spmv(&self.a, &z[..n], out, 1.0, 0.0);
        for (i, r) in out.iter_mut().enumerate() {
            *r -= z[n + i];
        }
    }
}
