//! A module for covariance kernels used to build the prior covariance of the GP model.
//!
//! The following stationary kernels are implemented:
//! * squared exponential,
//! * exponential (matern 1/2),
//! * matern 3/2,
//! * matern 5/2.
//!
//! They are parameterized by a signal `variance` and `lengthscales` given either as a
//! single value shared by all input components or one value per component
//! (automatic relevance determination).
//!
//! A [White] noise kernel and the [Sum] of two kernels are also available.

use crate::errors::{GprError, Result};
use crate::utils::scaled_sq_distances;
use linfa::Float;
use ndarray::{array, Array1, Array2, ArrayBase, Data, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trait for covariance functions used in GP regression
pub trait Kernel<F: Float>: Clone + fmt::Display + Sync {
    /// Compute the cross covariance matrix `K(a, b)` of shape (a.nrows(), b.nrows())
    /// between two sets of points given as (n, nx) matrices.
    fn k(
        &self,
        a: &ArrayBase<impl Data<Elem = F>, Ix2>,
        b: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F>;

    /// Compute the covariance matrix `K(a)` of a set of points given as (n, nx) matrix.
    fn k_sym(&self, a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        self.k(a, a)
    }

    /// Compute the diagonal of `K(a)` as a (n,) vector.
    fn k_diag(&self, a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F>;

    /// Input dimension the kernel is bound to if any (ex: one lengthscale per input component)
    fn input_dim(&self) -> Option<usize> {
        None
    }
}

fn check_stationary<F: Float>(variance: F, lengthscales: &Array1<F>) -> Result<()> {
    if !(variance > F::zero() && variance.is_finite()) {
        return Err(GprError::InvalidValue(format!(
            "kernel variance should be strictly positive, got {variance}"
        )));
    }
    if lengthscales.is_empty() {
        return Err(GprError::InvalidValue(
            "kernel lengthscales should not be empty".to_string(),
        ));
    }
    if lengthscales.iter().any(|l| !(*l > F::zero() && l.is_finite())) {
        return Err(GprError::InvalidValue(format!(
            "kernel lengthscales should be strictly positive, got {lengthscales}"
        )));
    }
    Ok(())
}

macro_rules! declare_stationary_kernel {
    ($(#[$doc:meta])* $kernel:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq)]
        #[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
        pub struct $kernel<F: Float> {
            variance: F,
            lengthscales: Array1<F>,
        }

        impl<F: Float> $kernel<F> {
            /// Constructor given the signal variance and the lengthscales
            /// (either one shared value or one per input component)
            pub fn new(variance: F, lengthscales: Array1<F>) -> Result<Self> {
                check_stationary(variance, &lengthscales)?;
                Ok(Self {
                    variance,
                    lengthscales,
                })
            }

            /// Signal variance
            pub fn variance(&self) -> F {
                self.variance
            }

            /// Lengthscales
            pub fn lengthscales(&self) -> &Array1<F> {
                &self.lengthscales
            }
        }

        impl<F: Float> Default for $kernel<F> {
            fn default() -> Self {
                Self {
                    variance: F::one(),
                    lengthscales: array![F::one()],
                }
            }
        }

        impl<F: Float> fmt::Display for $kernel<F> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    f,
                    "{}(variance={}, lengthscales={})",
                    stringify!($kernel),
                    self.variance,
                    self.lengthscales
                )
            }
        }
    };
}

fn ard_dim<F: Float>(lengthscales: &Array1<F>) -> Option<usize> {
    if lengthscales.len() > 1 {
        Some(lengthscales.len())
    } else {
        None
    }
}

declare_stationary_kernel!(
    /// Squared exponential kernel
    SquaredExponential
);

impl<F: Float> Kernel<F> for SquaredExponential<F> {
    /// variance * exp( - r^2 / 2 )
    fn k(
        &self,
        a: &ArrayBase<impl Data<Elem = F>, Ix2>,
        b: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let r2 = scaled_sq_distances(a, b, &self.lengthscales);
        let half = F::cast(0.5);
        r2.mapv(|v| self.variance * F::exp(-half * v))
    }

    fn k_diag(&self, a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        Array1::from_elem(a.nrows(), self.variance)
    }

    fn input_dim(&self) -> Option<usize> {
        ard_dim(&self.lengthscales)
    }
}

declare_stationary_kernel!(
    /// Exponential kernel also known as Matern 1/2
    Exponential
);

impl<F: Float> Kernel<F> for Exponential<F> {
    /// variance * exp( - r )
    fn k(
        &self,
        a: &ArrayBase<impl Data<Elem = F>, Ix2>,
        b: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let r2 = scaled_sq_distances(a, b, &self.lengthscales);
        r2.mapv(|v| self.variance * F::exp(-v.sqrt()))
    }

    fn k_diag(&self, a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        Array1::from_elem(a.nrows(), self.variance)
    }

    fn input_dim(&self) -> Option<usize> {
        ard_dim(&self.lengthscales)
    }
}

declare_stationary_kernel!(
    /// Matern 3/2 kernel
    Matern32
);

impl<F: Float> Kernel<F> for Matern32<F> {
    /// variance * (1 + sqrt(3) * r) * exp( - sqrt(3) * r )
    fn k(
        &self,
        a: &ArrayBase<impl Data<Elem = F>, Ix2>,
        b: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let sqrt3 = F::cast(3.).sqrt();
        let r2 = scaled_sq_distances(a, b, &self.lengthscales);
        r2.mapv(|v| {
            let s = sqrt3 * v.sqrt();
            self.variance * (F::one() + s) * F::exp(-s)
        })
    }

    fn k_diag(&self, a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        Array1::from_elem(a.nrows(), self.variance)
    }

    fn input_dim(&self) -> Option<usize> {
        ard_dim(&self.lengthscales)
    }
}

declare_stationary_kernel!(
    /// Matern 5/2 kernel
    Matern52
);

impl<F: Float> Kernel<F> for Matern52<F> {
    /// variance * (1 + sqrt(5) * r + 5/3 * r^2) * exp( - sqrt(5) * r )
    fn k(
        &self,
        a: &ArrayBase<impl Data<Elem = F>, Ix2>,
        b: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let sqrt5 = F::cast(5.).sqrt();
        let third = F::cast(1. / 3.);
        let r2 = scaled_sq_distances(a, b, &self.lengthscales);
        r2.mapv(|v| {
            let s = sqrt5 * v.sqrt();
            self.variance * (F::one() + s + third * s * s) * F::exp(-s)
        })
    }

    fn k_diag(&self, a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        Array1::from_elem(a.nrows(), self.variance)
    }

    fn input_dim(&self) -> Option<usize> {
        ard_dim(&self.lengthscales)
    }
}

/// White noise kernel: `variance * I` for a set of points with itself,
/// zero cross covariance between two distinct sets of points.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct White<F: Float> {
    variance: F,
}

impl<F: Float> White<F> {
    /// Constructor given the noise variance
    pub fn new(variance: F) -> Result<Self> {
        if !(variance > F::zero() && variance.is_finite()) {
            return Err(GprError::InvalidValue(format!(
                "white kernel variance should be strictly positive, got {variance}"
            )));
        }
        Ok(White { variance })
    }

    /// Noise variance
    pub fn variance(&self) -> F {
        self.variance
    }
}

impl<F: Float> Default for White<F> {
    fn default() -> Self {
        White {
            variance: F::one(),
        }
    }
}

impl<F: Float> Kernel<F> for White<F> {
    fn k(
        &self,
        a: &ArrayBase<impl Data<Elem = F>, Ix2>,
        b: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        Array2::zeros((a.nrows(), b.nrows()))
    }

    fn k_sym(&self, a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        Array2::from_diag(&self.k_diag(a))
    }

    fn k_diag(&self, a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        Array1::from_elem(a.nrows(), self.variance)
    }
}

impl<F: Float> fmt::Display for White<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "White(variance={})", self.variance)
    }
}

/// Sum of two kernels
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Sum<K1, K2> {
    first: K1,
    second: K2,
}

impl<K1, K2> Sum<K1, K2> {
    /// Constructor of `first + second` kernel.
    ///
    /// Both kernels have to agree on the input dimension when they are bound to one.
    pub fn new<F: Float>(first: K1, second: K2) -> Result<Self>
    where
        K1: Kernel<F>,
        K2: Kernel<F>,
    {
        if let (Some(d1), Some(d2)) = (first.input_dim(), second.input_dim()) {
            if d1 != d2 {
                return Err(GprError::ShapeMismatch(format!(
                    "summed kernels have different input dimensions ({d1} vs {d2})"
                )));
            }
        }
        Ok(Sum { first, second })
    }

    /// First term
    pub fn first(&self) -> &K1 {
        &self.first
    }

    /// Second term
    pub fn second(&self) -> &K2 {
        &self.second
    }
}

impl<F: Float, K1: Kernel<F>, K2: Kernel<F>> Kernel<F> for Sum<K1, K2> {
    fn k(
        &self,
        a: &ArrayBase<impl Data<Elem = F>, Ix2>,
        b: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        self.first.k(a, b) + self.second.k(a, b)
    }

    fn k_sym(&self, a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        self.first.k_sym(a) + self.second.k_sym(a)
    }

    fn k_diag(&self, a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        self.first.k_diag(a) + self.second.k_diag(a)
    }

    fn input_dim(&self) -> Option<usize> {
        self.first.input_dim().or(self.second.input_dim())
    }
}

impl<K1: fmt::Display, K2: fmt::Display> fmt::Display for Sum<K1, K2> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} + {}", self.first, self.second)
    }
}
