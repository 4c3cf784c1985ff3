use gpr::kernels::SquaredExponential;
use gpr::Gpr;
use linfa::prelude::*;
use ndarray::{arr2, array, concatenate, Array, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn xsinx(x: &Array2<f64>) -> Array2<f64> {
    (x - 3.5) * ((x - 3.5) / std::f64::consts::PI).mapv(|v| v.sin())
}

fn main() {
    env_logger::init();

    let xt = arr2(&[[0.0], [5.0], [10.0], [15.0], [18.0], [20.0], [25.0]]);
    let yt = xsinx(&xt);

    println!("Train GP regression of 'xsinx' at {}", xt.column(0));
    let mut gp = Gpr::params(SquaredExponential::new(1., array![1.]).expect("valid kernel"))
        .noise_variance(1e-6)
        .fit(&Dataset::new(xt, yt))
        .expect("GPR fitting");

    // crude lengthscale and variance search maximizing the log marginal likelihood
    let mut best = (f64::NEG_INFINITY, 1., 1.);
    for variance in [1., 10., 100.] {
        for lengthscale in [1., 2., 3., 5., 8.] {
            let kernel = SquaredExponential::new(variance, array![lengthscale]).expect("valid kernel");
            gp.set_kernel(kernel).expect("kernel update");
            let lml = gp.log_marginal_likelihood().expect("GPR likelihood");
            if lml > best.0 {
                best = (lml, variance, lengthscale);
            }
        }
    }
    println!(
        "Best log marginal likelihood = {} with variance = {} and lengthscale = {}",
        best.0, best.1, best.2
    );
    gp.set_kernel(SquaredExponential::new(best.1, array![best.2]).expect("valid kernel"))
        .expect("kernel update");
    println!("{gp}");

    let xtest = Array::linspace(0., 25., 26).insert_axis(Axis(1));
    let ytest = xsinx(&xtest);
    // predict values and standard deviation
    let (ypred, yvar) = gp.predict_valvar(&xtest).expect("GPR prediction");
    let ysigma = yvar.mapv(|v| v.max(0.).sqrt());

    println!("Compute prediction errors (x, err(x), sigma(x))");
    println!("{}", concatenate![Axis(1), xtest, ypred - ytest, ysigma]);

    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let samples = gp.sample_f(&xtest, 3, &mut rng).expect("GPR sampling");
    println!("Posterior samples at x = 12.5: {}", samples.slice(ndarray::s![.., 12, 0]));
}
