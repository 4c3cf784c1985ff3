use crate::errors::{GprError, Result};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2, Zip};
use rayon::prelude::*;

/// Computes squared distances between each row of `a` and each row of `b`
/// once each component is divided by its lengthscale:
///
/// `r2[i, j] = sum_d ((a[i, d] - b[j, d]) / lengthscales[d])^2`
///
/// `lengthscales` is either a single value shared by all components or
/// one value per component.
/// *Panics* if a and b have not the same column numbers
pub fn scaled_sq_distances<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix2>,
    b: &ArrayBase<impl Data<Elem = F>, Ix2>,
    lengthscales: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Array2<F> {
    assert!(a.ncols() == b.ncols());
    let inv_l = expand_lengthscales(lengthscales, a.ncols()).mapv(|l| F::one() / l);
    let a = a.to_owned() * &inv_l;
    let b = b.to_owned() * &inv_l;

    let mut r2 = Array2::<F>::zeros((a.nrows(), b.nrows()));
    r2.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(a.axis_iter(Axis(0)))
        .for_each(|(mut r2_i, a_i)| {
            Zip::from(&mut r2_i).and(b.rows()).for_each(|r2_ij, b_j| {
                *r2_ij = Zip::from(&a_i)
                    .and(&b_j)
                    .fold(F::zero(), |acc, &u, &v| acc + (u - v) * (u - v));
            });
        });
    r2
}

/// Lengthscales given as a single value are repeated `dim` times
pub(crate) fn expand_lengthscales<F: Float>(
    lengthscales: &ArrayBase<impl Data<Elem = F>, Ix1>,
    dim: usize,
) -> Array1<F> {
    if lengthscales.len() == 1 {
        Array1::from_elem(dim, lengthscales[0])
    } else {
        lengthscales.to_owned()
    }
}

/// Broadcast a (n, 1) or (n, r) matrix to a (n, r) matrix.
/// Used to apply a mean function value to every output column.
pub(crate) fn broadcast_columns<F: Float>(
    m: &ArrayBase<impl Data<Elem = F>, Ix2>,
    nrows: usize,
    ncols: usize,
) -> Result<Array2<F>> {
    if m.nrows() != nrows || (m.ncols() != 1 && m.ncols() != ncols) {
        return Err(GprError::ShapeMismatch(format!(
            "expected ({nrows}, 1) or ({nrows}, {ncols}) matrix, got ({}, {})",
            m.nrows(),
            m.ncols()
        )));
    }
    if m.ncols() == ncols {
        Ok(m.to_owned())
    } else {
        Ok(Array2::from_shape_fn((nrows, ncols), |(i, _)| m[[i, 0]]))
    }
}

/// Repeat a (n,) vector as the `ncols` columns of a (n, ncols) matrix
pub(crate) fn tile_columns<F: Float>(
    v: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ncols: usize,
) -> Array2<F> {
    Array2::from_shape_fn((v.len(), ncols), |(i, _)| v[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_scaled_sq_distances() {
        let a: Array2<f64> = array![[0., 0.], [1., 2.]];
        let b = array![[0., 0.], [3., 4.], [1., 0.]];
        let r2 = scaled_sq_distances(&a, &b, &array![1.]);
        let expected = array![[0., 25., 1.], [5., 8., 4.]];
        assert_abs_diff_eq!(expected, r2, epsilon = 1e-12);
    }

    #[test]
    fn test_scaled_sq_distances_ard() {
        let a: Array2<f64> = array![[0., 0.], [1., 2.]];
        let b = array![[2., 4.]];
        let r2 = scaled_sq_distances(&a, &b, &array![2., 4.]);
        let expected = array![[2.], [0.5]];
        assert_abs_diff_eq!(expected, r2, epsilon = 1e-12);
    }

    #[test]
    fn test_broadcast_columns() {
        let m: Array2<f64> = array![[1.], [2.]];
        let expected = array![[1., 1., 1.], [2., 2., 2.]];
        assert_eq!(expected, broadcast_columns(&m, 2, 3).unwrap());
        assert_eq!(expected, broadcast_columns(&expected, 2, 3).unwrap());
        assert!(matches!(
            broadcast_columns(&array![[1., 2.], [3., 4.]], 2, 3),
            Err(GprError::ShapeMismatch(_))
        ));
        assert!(broadcast_columns(&m, 3, 1).is_err());
    }

    #[test]
    fn test_tile_columns() {
        let v: Array1<f64> = array![1., 2.];
        assert_eq!(array![[1., 1.], [2., 2.]], tile_columns(&v, 2));
    }
}
