//! Likelihoods relating latent function values to observations.
//!
//! Only the [Gaussian] likelihood is available: it allows the exact
//! computation of the posterior of a GP regression model.

use crate::errors::{GprError, Result};
use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trait for likelihoods `p(y | f)` working elementwise on (n, r) matrices
pub trait Likelihood<F: Float>: Clone + fmt::Display + Sync {
    /// Observation noise variance
    fn variance(&self) -> F;

    /// Given the marginal `f` distribution given as mean and variance,
    /// compute mean and variance of the observations `y`.
    fn predict_mean_and_var(
        &self,
        fmean: &ArrayBase<impl Data<Elem = F>, Ix2>,
        fvar: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> (Array2<F>, Array2<F>);

    /// Given the marginal `f` distribution given as mean and variance,
    /// compute the log density of the observations `y`.
    fn predict_density(
        &self,
        fmean: &ArrayBase<impl Data<Elem = F>, Ix2>,
        fvar: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F>;
}

/// Gaussian likelihood `y = f + e` with `e ~ N(0, variance)`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Gaussian<F: Float> {
    variance: F,
}

impl<F: Float> Default for Gaussian<F> {
    fn default() -> Self {
        Gaussian {
            variance: F::one(),
        }
    }
}

impl<F: Float> Gaussian<F> {
    /// Constructor given the noise variance, which should be positive or zero
    pub fn new(variance: F) -> Result<Self> {
        if !(variance >= F::zero() && variance.is_finite()) {
            return Err(GprError::InvalidValue(format!(
                "noise variance should be a positive or zero finite value, got {variance}"
            )));
        }
        Ok(Gaussian { variance })
    }

    pub(crate) fn set_variance(&mut self, variance: F) -> Result<()> {
        *self = Self::new(variance)?;
        Ok(())
    }
}

impl<F: Float> Likelihood<F> for Gaussian<F> {
    fn variance(&self) -> F {
        self.variance
    }

    fn predict_mean_and_var(
        &self,
        fmean: &ArrayBase<impl Data<Elem = F>, Ix2>,
        fvar: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> (Array2<F>, Array2<F>) {
        (fmean.to_owned(), fvar.mapv(|v| v + self.variance))
    }

    /// log N(y | fmean, max(fvar, 0) + variance)
    ///
    /// Negative latent variances coming from rounding are clipped to zero.
    /// When the total variance is zero the density is the one of a point mass at `fmean`:
    /// `+inf` where `y == fmean` and `-inf` elsewhere.
    fn predict_density(
        &self,
        fmean: &ArrayBase<impl Data<Elem = F>, Ix2>,
        fvar: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let half = F::cast(0.5);
        let log_2pi = F::cast(2. * std::f64::consts::PI).ln();
        Zip::from(fmean)
            .and(fvar)
            .and(y)
            .map_collect(|&mu, &var, &y| {
                let v = var.max(F::zero()) + self.variance;
                if v > F::zero() {
                    -half * (log_2pi + v.ln() + (y - mu) * (y - mu) / v)
                } else if y == mu {
                    F::infinity()
                } else {
                    F::neg_infinity()
                }
            })
    }
}

impl<F: Float> fmt::Display for Gaussian<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Gaussian(variance={})", self.variance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_gaussian() {
        let lik = Gaussian::<f64>::new(0.5).unwrap();
        let fmean = array![[1., 2.]];
        let fvar = array![[0.1, 0.2]];
        let (ymean, yvar) = lik.predict_mean_and_var(&fmean, &fvar);
        assert_eq!(fmean, ymean);
        assert_abs_diff_eq!(array![[0.6, 0.7]], yvar, epsilon = 1e-12);
    }

    #[test]
    fn test_gaussian_density() {
        let lik = Gaussian::<f64>::new(0.5).unwrap();
        let fmean = array![[0.]];
        let fvar = array![[0.5]];
        // standard normal density at 1: -0.5 * ln(2pi) - 0.5
        let density = lik.predict_density(&fmean, &fvar, &array![[1.]]);
        assert_abs_diff_eq!(array![[-1.4189385332046727]], density, epsilon = 1e-12);
    }

    #[test]
    fn test_gaussian_density_negative_variance() {
        let lik = Gaussian::<f64>::new(1.).unwrap();
        let fmean = array![[0., 0.]];
        let fvar = array![[-1e-14, 0.]];
        let density = lik.predict_density(&fmean, &fvar, &array![[1., 1.]]);
        assert_abs_diff_eq!(
            array![[-1.4189385332046727, -1.4189385332046727]],
            density,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_gaussian_density_point_mass() {
        let lik = Gaussian::<f64>::new(0.).unwrap();
        let fmean = array![[1., 1., 1.]];
        let fvar = array![[0., -1e-15, 0.]];
        let density: Array2<f64> = lik.predict_density(&fmean, &fvar, &array![[1., 1., 2.]]);
        assert!(!density.iter().any(|v| v.is_nan()));
        assert_eq!(f64::INFINITY, density[[0, 0]]);
        assert_eq!(f64::INFINITY, density[[0, 1]]);
        assert_eq!(f64::NEG_INFINITY, density[[0, 2]]);
    }

    #[test]
    fn test_gaussian_invalid() {
        assert!(Gaussian::<f64>::new(-1.).is_err());
        assert!(Gaussian::<f64>::new(f64::NAN).is_err());
        assert!(Gaussian::<f64>::new(0.).is_ok());
        assert_eq!(1., Gaussian::<f64>::default().variance());
    }
}
