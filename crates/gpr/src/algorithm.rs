use crate::cholesky::{jitchol, CholeskyFactor, JitterParams};
use crate::densities::multivariate_normal;
use crate::errors::{GprError, Result};
use crate::kernels::Kernel;
use crate::likelihoods::{Gaussian, Likelihood};
use crate::mean_functions::{MeanFunction, ZeroMean};
use crate::parameters::{GprParams, GprValidParams};
use crate::utils::{broadcast_columns, tile_columns};

use linfa::prelude::{DatasetBase, Fit, Float, PredictInplace};
use linfa_linalg::eigh::*;
use ndarray::{Array, Array2, Array3, ArrayBase, Axis, Data, Ix1, Ix2};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;

use log::debug;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Variance of the latent function predicted at n points for r outputs
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum PredictiveVariance<F: Float> {
    /// Marginal variances as a (n, r) matrix
    Diagonal(Array2<F>),
    /// Full covariances as a (n, n, r) array, the (n, n) covariance is shared by all outputs
    Full(Array3<F>),
}

impl<F: Float> PredictiveVariance<F> {
    /// Marginal variances as a (n, r) matrix whatever the variant
    pub fn diagonal(&self) -> Array2<F> {
        match self {
            PredictiveVariance::Diagonal(var) => var.to_owned(),
            PredictiveVariance::Full(cov) => {
                let (n, _, r) = cov.dim();
                Array2::from_shape_fn((n, r), |(i, j)| cov[[i, i, j]])
            }
        }
    }
}

/// Predictive distribution of the latent function
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Prediction<F: Float> {
    /// Predictive mean as a (n, r) matrix
    pub mean: Array2<F>,
    /// Predictive variance
    pub variance: PredictiveVariance<F>,
}

/// Gaussian Process Regression model
///
/// A GP regression models the `r` outputs of a function `f` as independent draws
/// of a Gaussian process `GP(m(x), k(x, x'))` observed with a Gaussian noise of variance `sigma2`.
/// The posterior is computed exactly from the Cholesky decomposition of
/// the `K(X, X) + sigma2 * I` training covariance matrix which is shared by all outputs.
///
/// * Based on [ndarray](https://github.com/rust-ndarray/ndarray)
///   and [linfa](https://github.com/rust-ml/linfa) and strive to follow [linfa guidelines](https://github.com/rust-ml/linfa/blob/master/CONTRIBUTE.md)
/// * Kernel can be squared exponential, exponential, matern 3/2, matern 5/2,
///   white noise or a sum of those.
/// * Mean function can be zero, constant or linear.
/// * When the covariance matrix is numerically not positive definite
///   (duplicated training points, noiseless data), a jitter is added on its diagonal
///   with a bounded number of retries (see [`jitchol`](crate::jitchol)).
/// * GP models can be saved and loaded using [serde](https://serde.rs/).
///   See `serializable` feature section below.
///
/// Hyperparameters (kernel parameters, noise variance) are not optimized by the model,
/// they can be changed with [`Gpr::set_kernel`] and [`Gpr::set_noise_variance`]
/// by an external optimization loop maximizing [`Gpr::log_marginal_likelihood`].
///
/// # Features
///
/// ## serializable
///
/// The `serializable` feature enables the serialization of GP models using the [`serde crate`](https://serde.rs/).
///
/// # Example
///
/// ```no_run
/// use gpr::{kernels::*, Gpr};
/// use linfa::prelude::*;
/// use ndarray::{arr2, Array, Array2, Axis};
///
/// // one-dimensional test function to approximate
/// fn xsinx(x: &Array2<f64>) -> Array2<f64> {
///     (x - 3.5) * ((x - 3.5) / std::f64::consts::PI).mapv(|v| v.sin())
/// }
///
/// // training data
/// let xt = arr2(&[[0.0], [5.0], [10.0], [15.0], [18.0], [20.0], [25.0]]);
/// let yt = xsinx(&xt);
///
/// // GP with zero mean and squared exponential kernel
/// let gp = Gpr::params(SquaredExponential::new(10., ndarray::array![3.]).unwrap())
///     .noise_variance(1e-4)
///     .fit(&Dataset::new(xt, yt))
///     .expect("GP fitted");
///
/// println!("log marginal likelihood = {}", gp.log_marginal_likelihood().unwrap());
///
/// // Use fitted model for making predictions
/// let xtest = Array::linspace(0., 25., 26).insert_axis(Axis(1));
/// let (ypred, yvariances) = gp.predict_valvar(&xtest).expect("GP prediction");
///```
///
/// # Reference:
///
/// Rasmussen, Carl Edward and Williams, Christopher K. I.,
/// [Gaussian Processes for Machine Learning](http://gaussianprocess.org/gpml/chapters/RW2.pdf),
/// MIT Press, 2006, Algorithm 2.1.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, K: Serialize, M: Serialize",
        deserialize = "F: Deserialize<'de>, K: Deserialize<'de>, M: Deserialize<'de>"
    ))
)]
pub struct Gpr<F: Float, K: Kernel<F>, M: MeanFunction<F>> {
    /// Training inputs (n, nx)
    x: Array2<F>,
    /// Training outputs (n, r)
    y: Array2<F>,
    /// Covariance function
    kernel: K,
    /// Prior mean function
    mean: M,
    /// Observation noise model
    likelihood: Gaussian<F>,
    /// Jitter escalation used to decompose covariance matrices
    jitter: JitterParams<F>,
}

impl<F: Float, K: Kernel<F>> Gpr<F, K, ZeroMean> {
    /// GP regression parameters constructor given the kernel
    pub fn params(kernel: K) -> GprParams<F, K, ZeroMean> {
        GprParams::new(kernel)
    }
}

impl<F: Float, K: Kernel<F>, M: MeanFunction<F>> fmt::Display for Gpr<F, K, M> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "GPR(kernel={}, mean={}, likelihood={})",
            self.kernel, self.mean, self.likelihood
        )
    }
}

impl<F: Float, K: Kernel<F>, M: MeanFunction<F>> Gpr<F, K, M> {
    /// Number of training points
    pub fn num_data(&self) -> usize {
        self.x.nrows()
    }

    /// Number of outputs (latent functions)
    pub fn num_latent(&self) -> usize {
        self.y.ncols()
    }

    /// Covariance function
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Prior mean function
    pub fn mean_function(&self) -> &M {
        &self.mean
    }

    /// Gaussian likelihood
    pub fn likelihood(&self) -> &Gaussian<F> {
        &self.likelihood
    }

    /// Training dataset (inputs, outputs)
    pub fn training_data(&self) -> (&Array2<F>, &Array2<F>) {
        (&self.x, &self.y)
    }

    /// Jitter escalation parameters
    pub fn jitter(&self) -> &JitterParams<F> {
        &self.jitter
    }

    /// Replace the kernel, training data are kept
    pub fn set_kernel(&mut self, kernel: K) -> Result<()> {
        check_input_dim(&kernel, self.x.ncols())?;
        self.kernel = kernel;
        Ok(())
    }

    /// Replace the noise variance of the Gaussian likelihood
    pub fn set_noise_variance(&mut self, noise_variance: F) -> Result<()> {
        self.likelihood.set_variance(noise_variance)
    }

    /// Log marginal likelihood of the training outputs `log p(Y | X)`
    ///
    /// Outputs are independent given the shared covariance so their log densities are summed.
    pub fn log_marginal_likelihood(&self) -> Result<F> {
        let chol = self.training_cholesky()?;
        let m = self.prior_mean(&self.x)?;
        let lml = multivariate_normal(&self.y, &m, chol.lower())?;
        debug!("GPR log marginal likelihood = {lml}");
        Ok(lml)
    }

    /// Predict the latent function distribution at n given `x` points of nx components
    /// specified as a (n, nx) matrix.
    ///
    /// When `full_cov` is true, the variance is the (n, n) posterior covariance
    /// repeated for each output, otherwise only marginal variances are computed.
    /// Variances are not clipped and may be slightly negative due to rounding.
    pub fn predict_f(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        full_cov: bool,
    ) -> Result<Prediction<F>> {
        let (mean, a) = self.conditional(x)?;
        let variance = if full_cov {
            let cov = self.posterior_cov(x, &a)?;
            let r = self.num_latent();
            PredictiveVariance::Full(Array3::from_shape_fn(
                (cov.nrows(), cov.ncols(), r),
                |(i, j, _)| cov[[i, j]],
            ))
        } else {
            PredictiveVariance::Diagonal(self.posterior_var(x, &a)?)
        };
        Ok(Prediction { mean, variance })
    }

    /// Predict output values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns a (n, r) matrix.
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        Ok(self.conditional(x)?.0)
    }

    /// Predict variance values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns a (n, r) matrix.
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        let (_, a) = self.conditional(x)?;
        self.posterior_var(x, &a)
    }

    /// Predict both output values and variances at n given `x` points of nx components
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array2<F>, Array2<F>)> {
        let (mean, a) = self.conditional(x)?;
        let var = self.posterior_var(x, &a)?;
        Ok((mean, var))
    }

    /// Predict mean and marginal variance of noisy observations `y = f(x) + e`
    /// at n given `x` points of nx components
    pub fn predict_y(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array2<F>, Array2<F>)> {
        let (fmean, fvar) = self.predict_valvar(x)?;
        Ok(self.likelihood.predict_mean_and_var(&fmean, &fvar))
    }

    /// Log density of the (n, r) observations `y` at the n given `x` points
    /// under the predictive distribution of noisy observations.
    /// Returns a (n, r) matrix.
    pub fn predict_density(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        let expected = (x.nrows(), self.num_latent());
        if y.dim() != expected {
            return Err(GprError::ShapeMismatch(format!(
                "observations should be a {:?} matrix, got {:?}",
                expected,
                y.dim()
            )));
        }
        let (fmean, fvar) = self.predict_valvar(x)?;
        Ok(self.likelihood.predict_density(&fmean, &fvar, y))
    }

    /// Draw `n_samples` functions from the posterior distribution at n given `x` points
    /// using the given random generator.
    /// Returns a (n_samples, n, r) array.
    pub fn sample_f<R: Rng + ?Sized>(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        n_samples: usize,
        rng: &mut R,
    ) -> Result<Array3<F>> {
        let (mean, a) = self.conditional(x)?;
        let (n, r) = mean.dim();
        let mut samples = Array3::zeros((n_samples, n, r));
        if n == 0 {
            return Ok(samples);
        }

        // Posterior covariance is only semi-definite (singular at noiseless training points),
        // its square root is taken from its eigendecomposition with negative eigenvalues clipped.
        let cov = self.posterior_cov(x, &a)?;
        let half = F::cast(0.5);
        let cov = (&cov + &cov.t()).mapv(|v| v * half);
        let (vals, vecs) = cov.eigh_into()?;
        let sqrt_vals = vals.mapv(|v| if v > F::zero() { v.sqrt() } else { F::zero() });
        let c = vecs.dot(&Array2::from_diag(&sqrt_vals));

        let z = Array::<f64, _>::random_using((n_samples, n, r), StandardNormal, rng)
            .mapv(|v: f64| F::cast(v));
        samples
            .outer_iter_mut()
            .zip(z.outer_iter())
            .for_each(|(mut sample, z)| sample.assign(&(&mean + &c.dot(&z))));
        Ok(samples)
    }

    /// Cholesky factor of `K(X, X) + sigma2 * I`
    fn training_cholesky(&self) -> Result<CholeskyFactor<F>> {
        let n = self.num_data();
        let mut k = self.kernel.k_sym(&self.x);
        check_dim("kernel covariance", k.dim(), (n, n))?;
        let noise = self.likelihood.variance();
        k.diag_mut().mapv_inplace(|v| v + noise);
        jitchol(&k, &self.jitter)
    }

    /// Prior mean at `x` broadcast to the r outputs
    fn prior_mean(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        broadcast_columns(&self.mean.value(x), x.nrows(), self.num_latent())
    }

    /// Posterior mean at `x` and `A = L^-1.K(X, x)`
    fn conditional(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array2<F>, Array2<F>)> {
        if x.ncols() != self.x.ncols() {
            return Err(GprError::ShapeMismatch(format!(
                "prediction points should have {} components, got {}",
                self.x.ncols(),
                x.ncols()
            )));
        }
        if x.nrows() == 0 {
            return Ok((
                Array2::zeros((0, self.num_latent())),
                Array2::zeros((self.num_data(), 0)),
            ));
        }
        let chol = self.training_cholesky()?;
        let kx = self.kernel.k(&self.x, x);
        check_dim("kernel cross covariance", kx.dim(), (self.num_data(), x.nrows()))?;

        let a = chol.solve_lower(&kx)?;
        let v = chol.solve_lower(&(&self.y - &self.prior_mean(&self.x)?))?;
        let mean = a.t().dot(&v) + self.prior_mean(x)?;
        Ok((mean, a))
    }

    /// Posterior covariance `K(x, x) - A^t.A` (n, n)
    fn posterior_cov(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        a: &Array2<F>,
    ) -> Result<Array2<F>> {
        let kss = self.kernel.k_sym(x);
        check_dim("kernel covariance", kss.dim(), (x.nrows(), x.nrows()))?;
        Ok(kss - a.t().dot(a))
    }

    /// Posterior marginal variances `diag(K(x, x)) - sum(A^2)` repeated for each output (n, r)
    fn posterior_var(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        a: &Array2<F>,
    ) -> Result<Array2<F>> {
        let kdiag = self.kernel.k_diag(x);
        check_dim("kernel diagonal", (kdiag.len(), 1), (x.nrows(), 1))?;
        let var = kdiag - a.mapv(|v| v * v).sum_axis(Axis(0));
        Ok(tile_columns(&var, self.num_latent()))
    }
}

fn check_dim(what: &str, actual: (usize, usize), expected: (usize, usize)) -> Result<()> {
    if actual != expected {
        return Err(GprError::ShapeMismatch(format!(
            "{what} should be a {expected:?} matrix, got {actual:?}"
        )));
    }
    Ok(())
}

fn check_input_dim<F: Float>(kernel: &impl Kernel<F>, nx: usize) -> Result<()> {
    match kernel.input_dim() {
        Some(d) if d != nx => Err(GprError::ShapeMismatch(format!(
            "kernel {kernel} expects {d}-dimensional inputs, got {nx} components"
        ))),
        _ => Ok(()),
    }
}

fn check_mean_input_dim<F: Float>(mean: &impl MeanFunction<F>, nx: usize) -> Result<()> {
    match mean.input_dim() {
        Some(d) if d != nx => Err(GprError::ShapeMismatch(format!(
            "mean function {mean} expects {d}-dimensional inputs, got {nx} components"
        ))),
        _ => Ok(()),
    }
}

impl<F, D, K, M> PredictInplace<ArrayBase<D, Ix2>, Array2<F>> for Gpr<F, K, M>
where
    F: Float,
    D: Data<Elem = F>,
    K: Kernel<F>,
    M: MeanFunction<F>,
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array2<F>) {
        assert_eq!(
            (x.nrows(), self.num_latent()),
            y.dim(),
            "The number of data points must match the number of output targets."
        );

        let values = self.predict(x).expect("GPR Prediction");
        *y = values;
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array2<F> {
        Array2::zeros((x.nrows(), self.num_latent()))
    }
}

impl<F: Float, K: Kernel<F>, M: MeanFunction<F>> GprValidParams<F, K, M> {
    fn fit_gpr(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: Array2<F>,
    ) -> Result<Gpr<F, K, M>> {
        if x.nrows() != y.nrows() {
            return Err(GprError::ShapeMismatch(format!(
                "training inputs have {} rows while training outputs have {} rows",
                x.nrows(),
                y.nrows()
            )));
        }
        if x.is_empty() || y.is_empty() {
            return Err(GprError::InvalidValue(format!(
                "training data should not be empty, got inputs {:?} and outputs {:?}",
                x.dim(),
                y.dim()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(GprError::InvalidValue(
                "training data should only contain finite values".to_string(),
            ));
        }
        check_input_dim(&self.kernel, x.ncols())?;
        check_mean_input_dim(&self.mean, x.ncols())?;
        broadcast_columns(&self.mean.value(x), x.nrows(), y.ncols())?;

        debug!(
            "GPR fit on {} points of dim {} with {} output(s)",
            x.nrows(),
            x.ncols(),
            y.ncols()
        );
        Ok(Gpr {
            x: x.to_owned(),
            y,
            kernel: self.kernel.clone(),
            mean: self.mean.clone(),
            likelihood: Gaussian::new(self.noise_variance)?,
            jitter: self.jitter,
        })
    }
}

impl<F: Float, K: Kernel<F>, M: MeanFunction<F>, D: Data<Elem = F>>
    Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix2>, GprError> for GprValidParams<F, K, M>
{
    type Object = Gpr<F, K, M>;

    /// Condition the GP on the training dataset with (n, r) outputs
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix2>>,
    ) -> Result<Self::Object> {
        self.fit_gpr(dataset.records(), dataset.targets().to_owned())
    }
}

impl<F: Float, K: Kernel<F>, M: MeanFunction<F>, D: Data<Elem = F>>
    Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GprError> for GprValidParams<F, K, M>
{
    type Object = Gpr<F, K, M>;

    /// Condition the GP on the training dataset with (n,) outputs
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let y = dataset.targets().to_owned().insert_axis(Axis(1));
        self.fit_gpr(dataset.records(), y)
    }
}
