//! This library implements exact [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process) regression
//! with Gaussian observation noise.
//!
//! The GP posterior relies on the Cholesky decomposition of the training covariance matrix.
//! As such matrices are frequently ill-conditioned, the decomposition is made robust by adding an
//! increasing jitter on the diagonal when needed (see [jitchol]).
//!
//! Several outputs can be modeled at once: they are considered as independent functions
//! sharing the same kernel, hence the same training covariance matrix.
//!
//! GP regression is implemented by [Gpr] parameterized by [GprParams].
//! Kernels are available in the [kernels] module and prior mean functions in the [mean_functions] module.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
pub mod cholesky;
pub mod densities;
mod errors;
pub mod kernels;
pub mod likelihoods;
pub mod mean_functions;

mod parameters;
mod utils;

pub use algorithm::*;
pub use cholesky::{jitchol, CholeskyFactor, JitterParams};
pub use errors::*;
pub use parameters::*;
pub use utils::scaled_sq_distances;
