//! Linear algebra layer.
//!
//! Sparse matrix helpers, the augmented constraint matrix, and the basis
//! factorization service.

pub mod sparse;
pub mod factor;
pub mod dense_lu;

pub use dense_lu::DenseLu;
pub use factor::{Factorization, FactorizationError, UpdateQuality};
pub use sparse::{AugmentedMatrix, SparseCsc, SparseSymmetricCsc};
