// Column standardization: zero mean, unit variance

use crate::error::{PcaError, Result};
use log::debug;
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Standard deviations at or below this many ulps of the column magnitude
/// (`EPSILON * max(|mean|, 1)`) are treated as zero.
pub const ZERO_VARIANCE_ULPS: f64 = 8.0;

/// Per-column mean and population standard deviation learned from a
/// reference dataset.
///
/// Fit once (e.g. on a training split) and reuse the same parameters for any
/// other dataset. `transform` never refits.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Standardizer {
    pub(crate) mean: Array1<f64>,
    pub(crate) std_dev: Array1<f64>,
}

/// Returns the first non-finite entry as a `MissingValue` error.
pub(crate) fn check_finite(data: ArrayView2<f64>) -> Result<()> {
    for ((row, column), value) in data.indexed_iter() {
        if !value.is_finite() {
            return Err(PcaError::MissingValue { row, column });
        }
    }
    Ok(())
}

impl Standardizer {
    /// Learns column means and standard deviations (ddof = 0).
    ///
    /// # Errors
    /// `EmptyInput` for zero columns, `InsufficientSamples` for fewer than two
    /// rows, `MissingValue` for NaN or infinite entries and `ZeroVariance` for
    /// constant columns.
    pub fn fit(data: ArrayView2<f64>) -> Result<Self> {
        let (n_samples, n_features) = data.dim();
        if n_features == 0 {
            return Err(PcaError::EmptyInput);
        }
        if n_samples < 2 {
            return Err(PcaError::InsufficientSamples { required: 2, found: n_samples });
        }
        check_finite(data)?;

        let mean = data.mean_axis(Axis(0)).ok_or(PcaError::EmptyInput)?;
        let std_dev = data.std_axis(Axis(0), 0.0);

        for (column, (&s, &m)) in std_dev.iter().zip(mean.iter()).enumerate() {
            if s <= ZERO_VARIANCE_ULPS * f64::EPSILON * m.abs().max(1.0) {
                return Err(PcaError::ZeroVariance { column });
            }
        }
        debug!("Fitted standardizer on {} samples x {} features", n_samples, n_features);

        Ok(Self { mean, std_dev })
    }

    /// Builds a standardizer from previously stored parameters.
    pub fn with_parameters(mean: Array1<f64>, std_dev: Array1<f64>) -> Result<Self> {
        if mean.len() != std_dev.len() {
            return Err(PcaError::ShapeMismatch { expected: mean.len(), found: std_dev.len() });
        }
        if mean.is_empty() {
            return Err(PcaError::EmptyInput);
        }
        if let Some(column) = mean.iter().position(|m| !m.is_finite()) {
            return Err(PcaError::MissingValue { row: 0, column });
        }
        if let Some(column) = std_dev.iter().position(|&s| !s.is_finite() || s <= 0.0) {
            return Err(PcaError::ZeroVariance { column });
        }
        Ok(Self { mean, std_dev })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn std_dev(&self) -> &Array1<f64> {
        &self.std_dev
    }

    fn check_width(&self, n_columns: usize) -> Result<()> {
        if n_columns != self.n_features() {
            return Err(PcaError::ShapeMismatch { expected: self.n_features(), found: n_columns });
        }
        Ok(())
    }

    /// Applies `(x - mean) / std` with the fitted parameters.
    pub fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_width(data.ncols())?;
        check_finite(data)?;

        let mut out = data.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            Zip::from(row.view_mut())
                .and(&self.mean)
                .and(&self.std_dev)
                .for_each(|x, &m, &s| *x = (*x - m) / s);
        }
        Ok(out)
    }

    /// Maps standardized values back to the original units.
    pub fn inverse_transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_width(data.ncols())?;

        let mut out = data.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            Zip::from(row.view_mut())
                .and(&self.mean)
                .and(&self.std_dev)
                .for_each(|x, &m, &s| *x = *x * s + m);
        }
        Ok(out)
    }

    pub fn fit_transform(data: ArrayView2<f64>) -> Result<(Self, Array2<f64>)> {
        let standardizer = Self::fit(data)?;
        let standardized = standardizer.transform(data)?;
        Ok((standardizer, standardized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn standardized_columns_have_zero_mean_unit_variance() {
        let data = array![
            [1.0, 10.0, -3.0],
            [2.0, 20.0, 0.5],
            [3.0, 35.0, 7.0],
            [4.0, 41.0, 2.0],
            [10.0, 12.0, -1.0]
        ];
        let (_, z) = Standardizer::fit_transform(data.view()).unwrap();
        for column in z.columns() {
            assert_abs_diff_eq!(column.mean().unwrap(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(column.var(0.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn transform_reuses_fitted_parameters() {
        let train = array![[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]];
        let standardizer = Standardizer::fit(train.view()).unwrap();
        let test = array![[2.0, 3.0], [6.0, 3.0]];
        let z = standardizer.transform(test.view()).unwrap();

        // Train mean is [2, 3]; std is sqrt(8/3) for both columns.
        let s = (8.0f64 / 3.0).sqrt();
        assert_abs_diff_eq!(z[[0, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[[0, 1]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[[1, 0]], 4.0 / s, epsilon = 1e-12);
        assert_abs_diff_eq!(z[[1, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn inverse_transform_recovers_input() {
        let data = array![[1.5, -2.0], [3.0, 4.0], [0.0, 9.0]];
        let (standardizer, z) = Standardizer::fit_transform(data.view()).unwrap();
        let back = standardizer.inverse_transform(z.view()).unwrap();
        for (a, b) in data.iter().zip(back.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_column_is_zero_variance() {
        let data = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        match Standardizer::fit(data.view()) {
            Err(PcaError::ZeroVariance { column }) => assert_eq!(column, 1),
            other => panic!("expected ZeroVariance, got {:?}", other),
        }
    }

    #[test]
    fn large_offset_column_keeps_its_spread() {
        let offset = 1e12;
        let data = array![
            [1.0, offset],
            [2.0, offset + 0.5],
            [3.0, offset + 1.0],
            [4.0, offset + 0.25]
        ];
        let (standardizer, z) = Standardizer::fit_transform(data.view()).unwrap();
        assert!(standardizer.std_dev()[1] > 0.3);
        for column in z.columns() {
            assert_abs_diff_eq!(column.mean().unwrap(), 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(column.var(0.0), 1.0, epsilon = 1e-9);
        }

        let flat = array![[1.0, offset], [2.0, offset], [3.0, offset]];
        assert!(matches!(Standardizer::fit(flat.view()), Err(PcaError::ZeroVariance { column: 1 })));
    }

    #[test]
    fn nan_is_missing_value() {
        let data = array![[1.0, 5.0], [f64::NAN, 6.0], [3.0, 7.0]];
        match Standardizer::fit(data.view()) {
            Err(PcaError::MissingValue { row, column }) => assert_eq!((row, column), (1, 0)),
            other => panic!("expected MissingValue, got {:?}", other),
        }
    }

    #[test]
    fn transform_rejects_wrong_width() {
        let data = array![[1.0, 5.0], [2.0, 6.0], [3.0, 8.0]];
        let standardizer = Standardizer::fit(data.view()).unwrap();
        let wide = array![[1.0, 2.0, 3.0]];
        match standardizer.transform(wide.view()) {
            Err(PcaError::ShapeMismatch { expected, found }) => assert_eq!((expected, found), (2, 3)),
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn single_sample_is_rejected() {
        let data = array![[1.0, 2.0]];
        assert!(matches!(
            Standardizer::fit(data.view()),
            Err(PcaError::InsufficientSamples { required: 2, found: 1 })
        ));
    }

    #[test]
    fn with_parameters_rejects_non_positive_scale() {
        assert!(Standardizer::with_parameters(array![0.0, 1.0], array![1.0, 0.0]).is_err());
        assert!(Standardizer::with_parameters(array![0.0], array![1.0, 2.0]).is_err());
        assert!(Standardizer::with_parameters(array![0.0, 1.0], array![1.0, 2.0]).is_ok());
    }
}
