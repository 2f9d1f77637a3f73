//! Error types for problem construction.
//!
//! Solves never fail with an error; every outcome is a
//! [`TerminationStatus`](crate::TerminationStatus). Errors are limited to
//! malformed input caught before the first iteration.

use thiserror::Error;

use crate::linalg::FactorizationError;

/// Errors raised while loading a problem.
#[derive(Error, Debug)]
pub enum SolveError {
    /// Problem validation failed
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// A vector or matrix has the wrong length
    #[error("Dimension mismatch for {what}: got {got}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    /// The starting basis could not be factorized
    #[error("Factorization failed: {0}")]
    Factorization(#[from] FactorizationError),
}

/// Result type for problem construction.
pub type PrimalResult<T> = Result<T, SolveError>;
