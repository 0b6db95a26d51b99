// src/linalg_backends.rs

use crate::error::{PcaError, Result};
use ndarray::{Array1, Array2};
use ndarray_linalg::{Eigh, UPLO};

/// Output of a symmetric eigendecomposition.
#[derive(Debug)]
pub struct EighOutput {
    /// Eigenvalues in the order the backend produced them (LAPACK: ascending).
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors as columns of the matrix.
    /// eigenvectors.column(i) corresponds to eigenvalues[i].
    pub eigenvectors: Array2<f64>,
}

/// Trait for symmetric eigendecomposition (LAPACK's DSYEVD family).
/// Implementers may read only the upper triangle of `matrix`.
pub trait BackendEigh {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput>;
}

/// `ndarray-linalg` backend. The LAPACK provider (OpenBLAS or MKL, static or
/// system) is picked by the crate's `backend_*` cargo features.
#[derive(Debug, Default, Copy, Clone)]
pub struct NdarrayLinAlgBackend;

impl BackendEigh for NdarrayLinAlgBackend {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput> {
        if matrix.is_empty() {
            return Ok(EighOutput { eigenvalues: Array1::zeros(0), eigenvectors: Array2::zeros((0, 0)) });
        }
        let (eigenvalues, eigenvectors) = matrix.eigh(UPLO::Upper).map_err(|e| {
            PcaError::NumericalInstability(format!("Eigen decomposition of covariance matrix failed: {}", e))
        })?;
        Ok(EighOutput { eigenvalues, eigenvectors })
    }
}
