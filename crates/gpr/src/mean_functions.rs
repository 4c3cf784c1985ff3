//! A module for mean functions modeling the prior mean of the GP model.
//!
//! A mean function maps a (n, nx) matrix of points to a (n, q) matrix where
//! q is either 1 (the same prior mean is used for every output) or
//! the number of outputs of the model.
//!
//! The following mean functions are implemented:
//! * zero (default),
//! * constant,
//! * linear

use crate::errors::{GprError, Result};
use linfa::Float;
use ndarray::{array, Array1, Array2, ArrayBase, Data, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trait for mean functions used in GP regression
pub trait MeanFunction<F: Float>: Clone + fmt::Display + Sync {
    /// Compute the prior mean at the given `x` data points specified as (n, nx) matrix.
    /// Returns a (n, q) matrix.
    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F>;

    /// Input dimension the mean function is bound to if any
    fn input_dim(&self) -> Option<usize> {
        None
    }
}

/// A zero function as mean of the GP
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ZeroMean();

impl<F: Float> MeanFunction<F> for ZeroMean {
    /// mean(x) = [0, ..., 0].T
    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        Array2::<F>::zeros((x.nrows(), 1))
    }
}

impl fmt::Display for ZeroMean {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ZeroMean")
    }
}

/// A constant function as mean of the GP, one constant per output or one shared by all outputs
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ConstantMean<F: Float> {
    c: Array1<F>,
}

impl<F: Float> ConstantMean<F> {
    /// Constructor given the constants (q,)
    pub fn new(c: Array1<F>) -> Result<Self> {
        if c.is_empty() {
            return Err(GprError::InvalidValue(
                "constant mean should have at least one value".to_string(),
            ));
        }
        Ok(ConstantMean { c })
    }

    /// Constant values
    pub fn c(&self) -> &Array1<F> {
        &self.c
    }
}

impl<F: Float> Default for ConstantMean<F> {
    fn default() -> Self {
        ConstantMean {
            c: array![F::zero()],
        }
    }
}

impl<F: Float> MeanFunction<F> for ConstantMean<F> {
    /// mean(x) = [c, ..., c].T
    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        Array2::from_shape_fn((x.nrows(), self.c.len()), |(_, j)| self.c[j])
    }
}

impl<F: Float> fmt::Display for ConstantMean<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConstantMean(c={})", self.c)
    }
}

/// An affine function `x.A + b` as mean of the GP
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct LinearMean<F: Float> {
    a: Array2<F>,
    b: Array1<F>,
}

impl<F: Float> LinearMean<F> {
    /// Constructor given `a` (nx, q) matrix and `b` (q,) vector
    pub fn new(a: Array2<F>, b: Array1<F>) -> Result<Self> {
        if a.ncols() != b.len() {
            return Err(GprError::ShapeMismatch(format!(
                "linear mean: A has {} columns while b has {} values",
                a.ncols(),
                b.len()
            )));
        }
        if b.is_empty() {
            return Err(GprError::InvalidValue(
                "linear mean should have at least one output".to_string(),
            ));
        }
        Ok(LinearMean { a, b })
    }

    /// Coefficients matrix (nx, q)
    pub fn a(&self) -> &Array2<F> {
        &self.a
    }

    /// Offset vector (q,)
    pub fn b(&self) -> &Array1<F> {
        &self.b
    }
}

impl<F: Float> MeanFunction<F> for LinearMean<F> {
    /// mean(x) = x.A + b
    ///
    /// x is expected to have as many columns as A rows, see [MeanFunction::input_dim]
    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        x.dot(&self.a) + &self.b
    }

    fn input_dim(&self) -> Option<usize> {
        Some(self.a.nrows())
    }
}

impl<F: Float> fmt::Display for LinearMean<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LinearMean(A={}, b={})", self.a, self.b)
    }
}
