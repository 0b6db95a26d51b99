use crate::error::{PcaError, Result};
use ndarray::{Array2, ArrayView2};

/// Sample covariance `Xᵀ X / (n - 1)` of an already centered matrix.
///
/// The result is symmetrised as `(C + Cᵀ) / 2` so the eigen-decomposition
/// sees an exactly symmetric input.
pub fn covariance_matrix(centered: ArrayView2<f64>) -> Result<Array2<f64>> {
    let n_samples = centered.nrows();
    if n_samples < 2 {
        return Err(PcaError::InsufficientSamples { required: 2, found: n_samples });
    }
    if centered.ncols() == 0 {
        return Err(PcaError::EmptyInput);
    }

    let mut cov = centered.t().dot(&centered);
    cov /= (n_samples - 1) as f64;

    let symmetric = (&cov + &cov.t()) * 0.5;
    Ok(symmetric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standardize::Standardizer;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn covariance_of_centered_data() {
        let centered = array![[-1.0, -2.0], [0.0, 0.0], [1.0, 2.0]];
        let cov = covariance_matrix(centered.view()).unwrap();
        assert_abs_diff_eq!(cov[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[0, 1]], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[1, 0]], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[1, 1]], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn standardized_covariance_diagonal_is_n_over_n_minus_one() {
        let data = array![[1.0, 4.0, 2.0], [2.0, 1.0, 7.0], [5.0, 3.0, 1.0], [0.0, 9.0, 3.0]];
        let (_, z) = Standardizer::fit_transform(data.view()).unwrap();
        let cov = covariance_matrix(z.view()).unwrap();
        let n = data.nrows() as f64;
        for i in 0..3 {
            assert_abs_diff_eq!(cov[[i, i]], n / (n - 1.0), epsilon = 1e-12);
            for j in 0..3 {
                assert_eq!(cov[[i, j]], cov[[j, i]]);
            }
        }
    }

    #[test]
    fn single_row_is_rejected() {
        let centered = array![[0.0, 0.0]];
        assert!(matches!(
            covariance_matrix(centered.view()),
            Err(PcaError::InsufficientSamples { .. })
        ));
    }
}
