//! Cholesky decomposition with diagonal jitter escalation.
//!
//! Covariance matrices computed from kernel functions are frequently
//! close to singular (duplicated or very close training inputs, large lengthscales, etc.)
//! and a standard Cholesky decomposition fails due to floating point rounding.
//! [`jitchol`] first tries the plain decomposition then adds an increasing
//! jitter on the diagonal until the decomposition succeeds or a bounded number
//! of attempts is reached.

use crate::errors::{GprError, Result};
use linfa::Float;
use linfa_linalg::{cholesky::*, triangular::*, LinalgError};
use log::{debug, warn};
use ndarray::{Array2, ArrayBase, Data, Ix2};
use ndarray_stats::QuantileExt;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Parameters of the jitter escalation used by [`jitchol`]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct JitterParams<F: Float> {
    /// Jitter added to the diagonal before the first attempt (0 means plain Cholesky)
    pub(crate) initial: F,
    /// First retry jitter expressed relatively to the mean of the matrix diagonal
    pub(crate) relative: F,
    /// Multiplicative growth of the jitter between two retries
    pub(crate) factor: F,
    /// Maximum number of retries once the first attempt failed
    pub(crate) max_tries: usize,
}

impl<F: Float> Default for JitterParams<F> {
    fn default() -> Self {
        JitterParams {
            initial: F::zero(),
            relative: F::cast(Self::DEFAULT_RELATIVE),
            factor: F::cast(Self::DEFAULT_FACTOR),
            max_tries: Self::DEFAULT_MAX_TRIES,
        }
    }
}

impl<F: Float> JitterParams<F> {
    /// Default first retry jitter relatively to the mean of the diagonal
    pub const DEFAULT_RELATIVE: f64 = 1e-6;
    /// Default jitter growth factor
    pub const DEFAULT_FACTOR: f64 = 10.;
    /// Default maximum number of retries
    pub const DEFAULT_MAX_TRIES: usize = 5;

    /// Set jitter added before the first decomposition attempt
    pub fn initial(mut self, initial: F) -> Self {
        self.initial = initial;
        self
    }

    /// Set first retry jitter relatively to the mean of the diagonal
    pub fn relative(mut self, relative: F) -> Self {
        self.relative = relative;
        self
    }

    /// Set jitter growth factor between retries
    pub fn factor(mut self, factor: F) -> Self {
        self.factor = factor;
        self
    }

    /// Set maximum number of retries
    pub fn max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Get jitter added before the first attempt
    pub fn get_initial(&self) -> F {
        self.initial
    }

    /// Get relative jitter of the first retry
    pub fn get_relative(&self) -> F {
        self.relative
    }

    /// Get jitter growth factor
    pub fn get_factor(&self) -> F {
        self.factor
    }

    /// Get maximum number of retries
    pub fn get_max_tries(&self) -> usize {
        self.max_tries
    }

    /// Check parameters consistency
    pub fn check(&self) -> Result<()> {
        if !(self.initial >= F::zero() && self.initial.is_finite()) {
            return Err(GprError::InvalidValue(format!(
                "initial jitter should be a positive or zero finite value, got {}",
                self.initial
            )));
        }
        if !(self.relative > F::zero() && self.relative.is_finite()) {
            return Err(GprError::InvalidValue(format!(
                "relative jitter should be strictly positive, got {}",
                self.relative
            )));
        }
        if !(self.factor > F::one() && self.factor.is_finite()) {
            return Err(GprError::InvalidValue(format!(
                "jitter growth factor should be greater than 1, got {}",
                self.factor
            )));
        }
        Ok(())
    }
}

/// Lower triangular factor `L` of a decomposed matrix `M + jitter * I = L.L^t`
#[derive(Clone, Debug)]
pub struct CholeskyFactor<F: Float> {
    lower: Array2<F>,
    jitter: F,
}

impl<F: Float> CholeskyFactor<F> {
    /// Lower triangular factor
    pub fn lower(&self) -> &Array2<F> {
        &self.lower
    }

    /// Total jitter added to the diagonal to get a successful decomposition
    pub fn jitter(&self) -> F {
        self.jitter
    }

    /// Consume the factor and returns the lower triangular matrix
    pub fn into_lower(self) -> Array2<F> {
        self.lower
    }

    /// Solve `L.X = B` by forward substitution
    pub fn solve_lower(&self, b: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        solve_lower(&self.lower, b)
    }
}

/// Solve the triangular system `L.X = B` where `L` is lower triangular
pub fn solve_lower<F: Float>(
    l: &ArrayBase<impl Data<Elem = F>, Ix2>,
    b: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array2<F>> {
    if l.nrows() != b.nrows() {
        return Err(GprError::ShapeMismatch(format!(
            "triangular solve: factor has {} rows while right hand side has {} rows",
            l.nrows(),
            b.nrows()
        )));
    }
    Ok(l.solve_triangular(b, UPLO::Lower)?)
}

/// Cholesky decomposition of the given symmetric matrix `m` adding
/// an increasing jitter on the diagonal when the matrix is not numerically
/// positive definite.
///
/// The decomposition is first attempted on `m + initial * I`. On failure, the jitter
/// is set to `relative * mean(diag(m))` then multiplied by `factor` after each failed
/// attempt, at most `max_tries` times.
///
/// Returns [`GprError::NumericalInstability`] when no attempt succeeds.
pub fn jitchol<F: Float>(
    m: &ArrayBase<impl Data<Elem = F>, Ix2>,
    params: &JitterParams<F>,
) -> Result<CholeskyFactor<F>> {
    if m.nrows() != m.ncols() {
        return Err(GprError::ShapeMismatch(format!(
            "cholesky: expected square matrix, got ({}, {})",
            m.nrows(),
            m.ncols()
        )));
    }
    if m.is_empty() {
        return Err(GprError::InvalidValue("cholesky: empty matrix".to_string()));
    }

    if let Some(lower) = try_cholesky(m, params.initial)? {
        return Ok(CholeskyFactor {
            lower,
            jitter: params.initial,
        });
    }

    let diag = m.diag();
    let min_diag = *diag.min().map_err(|_| instability(0, params.initial))?;
    if min_diag <= F::zero() || diag.iter().any(|v| !v.is_finite()) {
        debug!("cholesky: non positive diagonal element {min_diag}, no jitter retry");
        return Err(instability(0, params.initial));
    }

    let n = F::cast(diag.len());
    let mut jitter = diag.sum() / n * params.relative;
    for tries in 1..=params.max_tries {
        if !jitter.is_finite() {
            return Err(instability(tries - 1, jitter));
        }
        debug!("cholesky: try #{tries} with jitter = {jitter:e}");
        if let Some(lower) = try_cholesky(m, params.initial + jitter)? {
            warn!(
                "Added jitter of {:e} to the diagonal to get a positive definite matrix",
                params.initial + jitter
            );
            return Ok(CholeskyFactor {
                lower,
                jitter: params.initial + jitter,
            });
        }
        if tries < params.max_tries {
            jitter *= params.factor;
        }
    }
    Err(instability(params.max_tries, params.initial + jitter))
}

/// Attempt a single decomposition of `m + jitter * I`.
/// Returns `None` when the matrix is not numerically positive definite.
fn try_cholesky<F: Float>(
    m: &ArrayBase<impl Data<Elem = F>, Ix2>,
    jitter: F,
) -> Result<Option<Array2<F>>> {
    let mut a = m.to_owned();
    if jitter > F::zero() {
        a.diag_mut().mapv_inplace(|v| v + jitter);
    }
    match a.cholesky() {
        Ok(mut l) => {
            for ((i, j), v) in l.indexed_iter_mut() {
                if j > i {
                    *v = F::zero();
                }
            }
            // a zero or non finite pivot makes later triangular solves meaningless
            if l.diag().iter().all(|v| v.is_finite() && *v > F::zero()) {
                Ok(Some(l))
            } else {
                Ok(None)
            }
        }
        Err(LinalgError::NotPositiveDefinite) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn instability<F: Float>(tries: usize, jitter: F) -> GprError {
    GprError::NumericalInstability {
        tries,
        jitter: jitter.to_f64().unwrap_or(f64::NAN),
    }
}
