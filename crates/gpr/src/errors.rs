use thiserror::Error;

/// A result type for GP regression algorithm
pub type Result<T> = std::result::Result<T, GprError>;

/// An error when using [`Gpr`](crate::Gpr) model or one of its components
#[derive(Error, Debug)]
pub enum GprError {
    /// When a covariance matrix stays non positive definite even after jitter escalation
    #[error("Numerical instability: matrix not positive definite after {tries} tries (last jitter = {jitter:e})")]
    NumericalInstability {
        /// Number of decomposition attempts made with a jitter added on the diagonal
        tries: usize,
        /// Last jitter value tried
        jitter: f64,
    },
    /// When array dimensions are not consistent
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    /// When error due to a bad value
    #[error("InvalidValue error: {0}")]
    InvalidValue(String),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
}
