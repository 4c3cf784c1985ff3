//! Log densities of multivariate normal distributions given a Cholesky factor of their covariance.

use crate::cholesky::solve_lower;
use crate::errors::{GprError, Result};
use linfa::Float;
use ndarray::{Array1, ArrayBase, Axis, Data, Ix2};

/// Log density of each column of `x` (n, r) under `N(mu, L.L^t)` where `mu` is (n, r)
/// and `l` is the (n, n) lower Cholesky factor of the covariance.
///
/// Returns a (r,) vector.
pub fn multivariate_normal_columns<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    mu: &ArrayBase<impl Data<Elem = F>, Ix2>,
    l: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array1<F>> {
    if x.shape() != mu.shape() {
        return Err(GprError::ShapeMismatch(format!(
            "multivariate normal: x is {:?} while mean is {:?}",
            x.shape(),
            mu.shape()
        )));
    }
    let n = x.nrows();
    let d = x.to_owned() - mu;
    let alpha = solve_lower(l, &d)?;

    let half = F::cast(0.5);
    let log_2pi = F::cast(2. * std::f64::consts::PI).ln();
    let log_det_half = l.diag().mapv(|v| v.ln()).sum();
    let cst = -half * F::cast(n) * log_2pi - log_det_half;

    Ok(alpha
        .map_axis(Axis(0), |col| col.mapv(|v| v * v).sum())
        .mapv(|sq| cst - half * sq))
}

/// Log density of the (n, r) matrix `x` whose columns are independent draws of
/// `N(mu_j, L.L^t)`, `mu` being (n, r) and `l` the (n, n) lower Cholesky factor
/// of the covariance shared by all columns.
///
/// `-0.5 * n * r * log(2pi) - r * sum(log(diag(L))) - 0.5 * sum(alpha^2)` with `alpha = L^-1.(x - mu)`
pub fn multivariate_normal<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    mu: &ArrayBase<impl Data<Elem = F>, Ix2>,
    l: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<F> {
    Ok(multivariate_normal_columns(x, mu, l)?.sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_standard_normal() {
        let l: Array2<f64> = array![[1., 0.], [0., 1.]];
        let x = array![[1.], [0.]];
        let mu = array![[0.], [0.]];
        let expected = -(2. * std::f64::consts::PI).ln() - 0.5;
        assert_abs_diff_eq!(
            expected,
            multivariate_normal(&x, &mu, &l).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_correlated() {
        // covariance [[4, 2], [2, 2]] with determinant 4
        let l: Array2<f64> = array![[2., 0.], [1., 1.]];
        let x = array![[2.], [1.]];
        let mu = array![[0.], [0.]];
        // alpha = [1, 0]
        let expected = -(2. * std::f64::consts::PI).ln() - 0.5 * 4f64.ln() - 0.5;
        assert_abs_diff_eq!(
            expected,
            multivariate_normal(&x, &mu, &l).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_columns_sum() {
        let l: Array2<f64> = array![[2., 0.], [1., 1.]];
        let x = array![[2., 0.5], [1., -1.]];
        let mu = array![[0., 0.5], [0., 0.]];
        let cols = multivariate_normal_columns(&x, &mu, &l).unwrap();
        assert_eq!(2, cols.len());
        let first = multivariate_normal(&x.column(0).insert_axis(Axis(1)), &array![[0.], [0.]], &l)
            .unwrap();
        assert_abs_diff_eq!(first, cols[0], epsilon = 1e-12);
        assert_abs_diff_eq!(
            cols.sum(),
            multivariate_normal(&x, &mu, &l).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let l: Array2<f64> = array![[1.]];
        assert!(matches!(
            multivariate_normal(&array![[1.]], &array![[1., 2.]], &l),
            Err(GprError::ShapeMismatch(_))
        ));
        assert!(matches!(
            multivariate_normal(&array![[1.], [2.]], &array![[1.], [2.]], &l),
            Err(GprError::ShapeMismatch(_))
        ));
    }
}
