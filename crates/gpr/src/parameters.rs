use crate::cholesky::JitterParams;
use crate::errors::{GprError, Result};
use crate::kernels::Kernel;
use crate::mean_functions::{MeanFunction, ZeroMean};
use linfa::{Float, ParamGuard};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A set of validated GP regression parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, K: Serialize, M: Serialize",
        deserialize = "F: Deserialize<'de>, K: Deserialize<'de>, M: Deserialize<'de>"
    ))
)]
pub struct GprValidParams<F: Float, K: Kernel<F>, M: MeanFunction<F>> {
    /// Covariance function k(x, x')
    pub(crate) kernel: K,
    /// Prior mean function m(x)
    pub(crate) mean: M,
    /// Gaussian observation noise variance
    pub(crate) noise_variance: F,
    /// Jitter escalation used when decomposing covariance matrices
    pub(crate) jitter: JitterParams<F>,
}

impl<F: Float, K: Kernel<F>, M: MeanFunction<F>> GprValidParams<F, K, M> {
    /// Get kernel
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Get mean function
    pub fn mean_function(&self) -> &M {
        &self.mean
    }

    /// Get noise variance
    pub fn noise_variance(&self) -> F {
        self.noise_variance
    }

    /// Get jitter parameters
    pub fn jitter(&self) -> &JitterParams<F> {
        &self.jitter
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the execution of
/// the [GP regression algorithm](crate::Gpr).
pub struct GprParams<F: Float, K: Kernel<F>, M: MeanFunction<F>>(GprValidParams<F, K, M>);

impl<F: Float, K: Kernel<F>> GprParams<F, K, ZeroMean> {
    /// A constructor for GP regression parameters given the kernel.
    ///
    /// Defaults to a zero mean function and a unit noise variance.
    pub fn new(kernel: K) -> GprParams<F, K, ZeroMean> {
        Self(GprValidParams {
            kernel,
            mean: ZeroMean(),
            noise_variance: F::one(),
            jitter: JitterParams::default(),
        })
    }
}

impl<F: Float, K: Kernel<F>, M: MeanFunction<F>> GprParams<F, K, M> {
    /// A constructor for GP regression parameters from validated parameters
    pub fn new_from_valid(params: &GprValidParams<F, K, M>) -> Self {
        Self(params.clone())
    }

    /// Set mean function.
    pub fn mean_function<M2: MeanFunction<F>>(self, mean: M2) -> GprParams<F, K, M2> {
        GprParams(GprValidParams {
            kernel: self.0.kernel,
            mean,
            noise_variance: self.0.noise_variance,
            jitter: self.0.jitter,
        })
    }

    /// Set kernel.
    pub fn kernel(mut self, kernel: K) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set noise variance of the Gaussian likelihood.
    ///
    /// Should be positive or zero (noiseless interpolation).
    pub fn noise_variance(mut self, noise_variance: F) -> Self {
        self.0.noise_variance = noise_variance;
        self
    }

    /// Set jitter escalation parameters
    pub fn jitter(mut self, jitter: JitterParams<F>) -> Self {
        self.0.jitter = jitter;
        self
    }
}

impl<F: Float, K: Kernel<F>, M: MeanFunction<F>> From<GprValidParams<F, K, M>>
    for GprParams<F, K, M>
{
    fn from(valid: GprValidParams<F, K, M>) -> Self {
        GprParams(valid)
    }
}

impl<F: Float, K: Kernel<F>, M: MeanFunction<F>> ParamGuard for GprParams<F, K, M> {
    type Checked = GprValidParams<F, K, M>;
    type Error = GprError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let noise = self.0.noise_variance;
        if !(noise >= F::zero() && noise.is_finite()) {
            return Err(GprError::InvalidValue(format!(
                "noise variance should be a positive or zero finite value, got {noise}"
            )));
        }
        self.0.jitter.check()?;
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
