// Ordinary least squares on principal component scores

use crate::error::{PcaError, Result};
use log::debug;
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::LeastSquaresSvd;
use serde::{Deserialize, Serialize};

/// Linear model `y = intercept + x · coefficients`, solved by SVD least squares.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LinearRegression {
    intercept: f64,
    coefficients: Array1<f64>,
}

impl LinearRegression {
    /// Fits the model with an intercept.
    ///
    /// Rank-deficient designs are solved in the minimum-norm sense.
    ///
    /// # Errors
    /// `ShapeMismatch` if `x` and `y` have different row counts,
    /// `InsufficientSamples` for empty input, `MissingValue` for non-finite
    /// entries, `NumericalInstability` if the SVD fails.
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<Self> {
        let n = x.nrows();
        if y.len() != n {
            return Err(PcaError::ShapeMismatch { expected: n, found: y.len() });
        }
        if n == 0 {
            return Err(PcaError::InsufficientSamples { required: 1, found: 0 });
        }
        crate::standardize::check_finite(x)?;
        if let Some(row) = y.iter().position(|v| !v.is_finite()) {
            return Err(PcaError::MissingValue { row, column: x.ncols() });
        }

        let ones = Array2::<f64>::ones((n, 1));
        let design = concatenate(Axis(1), &[ones.view(), x.view()])
            .map_err(|e| PcaError::NumericalInstability(e.to_string()))?;
        let rhs = y.to_owned();
        let solved = design
            .least_squares(&rhs)
            .map_err(|e| PcaError::NumericalInstability(format!("least squares solve failed: {}", e)))?;
        debug!("Least squares design rank {} of {}", solved.rank, design.ncols());

        let solution = solved.solution;
        Ok(Self {
            intercept: solution[0],
            coefficients: solution.slice(ndarray::s![1..]).to_owned(),
        })
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(PcaError::ShapeMismatch { expected: self.coefficients.len(), found: x.ncols() });
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

pub fn mean_squared_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(PcaError::ShapeMismatch { expected: y_true.len(), found: y_pred.len() });
    }
    if y_true.is_empty() {
        return Err(PcaError::InsufficientSamples { required: 1, found: 0 });
    }
    let residual = &y_true - &y_pred;
    Ok(residual.dot(&residual) / y_true.len() as f64)
}

/// Coefficient of determination. 1.0 is a perfect fit; a constant `y_true`
/// gives `NumericalInstability`.
pub fn r2_score(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    let mse = mean_squared_error(y_true, y_pred)?;
    let mean = y_true.mean().ok_or(PcaError::InsufficientSamples { required: 1, found: 0 })?;
    let variance = y_true.mapv(|v| (v - mean).powi(2)).mean().unwrap_or(0.0);
    if variance <= 0.0 {
        return Err(PcaError::NumericalInstability("R^2 is undefined for a constant target".into()));
    }
    Ok(1.0 - mse / variance)
}
