//! Basis factorization interface.
//!
//! The simplex only needs an invertible representation of the basis matrix
//! `B` (the columns of `[A | -I]` selected by the basis map) supporting
//! forward solves (`B x = b`), backward solves (`Bᵀ y = c`) and in-place
//! column replacement after a pivot.

use super::sparse::AugmentedMatrix;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FactorizationError {
    /// Basis is numerically singular. `dependent` lists basis positions whose
    /// columns found no acceptable pivot; `free_rows` lists the rows left
    /// without a pivot (same length).
    #[error("singular basis: {} dependent column(s)", dependent.len())]
    Singular {
        dependent: Vec<usize>,
        free_rows: Vec<usize>,
    },

    /// Basis does not match the factorization dimension.
    #[error("basis has {got} entries, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Outcome of a column replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateQuality {
    /// Update applied.
    Ok,
    /// Update applied, but the pivot was small; refactorize soon.
    SlightError,
    /// Update rejected; refactorize now.
    MajorError,
    /// No room left for the update; grow the workspace and refactorize.
    OutOfMemory,
}

/// Invertible representation of the current basis.
pub trait Factorization {
    /// Factorize the columns `basis[0..m]` of the augmented matrix.
    fn refactorize(
        &mut self,
        matrix: &AugmentedMatrix,
        basis: &[usize],
    ) -> Result<(), FactorizationError>;

    /// Solve `B x = rhs` in place. `rhs` is row-indexed on input and indexed
    /// by basis position on output.
    fn ftran(&self, rhs: &mut [f64]);

    /// Solve `Bᵀ y = rhs` in place. `rhs` is indexed by basis position on
    /// input and row-indexed on output.
    fn btran(&self, rhs: &mut [f64]);

    /// Replace the column at basis position `position`. `column` must be the
    /// FTRAN of the incoming column through the current factorization.
    fn replace_column(&mut self, position: usize, column: &[f64]) -> UpdateQuality;

    /// Number of column replacements since the last refactorization.
    fn pivots(&self) -> usize;

    fn pivot_tolerance(&self) -> f64;
    fn set_pivot_tolerance(&mut self, value: f64);
    fn zero_tolerance(&self) -> f64;
    fn set_zero_tolerance(&mut self, value: f64);

    /// Enlarge the update storage. Returns `false` when it cannot grow.
    fn grow_workspace(&mut self) -> bool;
}
