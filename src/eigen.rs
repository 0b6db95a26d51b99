// Eigen-decomposition of a symmetric covariance matrix

use crate::error::{PcaError, Result};
use crate::linalg_backends::{BackendEigh, NdarrayLinAlgBackend};
use log::{debug, warn};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Largest tolerated `|C[i,j] - C[j,i]|`, relative to the largest entry.
pub const SYMMETRY_TOLERANCE: f64 = 1e-8;

/// Negative eigenvalues down to `-NEGATIVE_EIGENVALUE_TOLERANCE * max(λ_max, 1)`
/// are rounding noise of a positive semi-definite matrix and are clamped to 0.
pub const NEGATIVE_EIGENVALUE_TOLERANCE: f64 = 1e-9;

/// Eigenpairs of a covariance matrix ranked by descending eigenvalue.
///
/// `eigenvectors.column(i)` is the unit eigenvector for `eigenvalues[i]`.
/// The sign of each eigenvector is normalised so that its largest-magnitude
/// entry is positive. LAPACK itself makes no promise about the sign, so two
/// builds linked against different providers can still disagree on exact
/// ties; compare eigenvectors up to sign.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EigenpairSet {
    eigenvalues: Array1<f64>,
    eigenvectors: Array2<f64>,
}

impl EigenpairSet {
    pub fn eigenvalues(&self) -> &Array1<f64> {
        &self.eigenvalues
    }

    pub fn eigenvectors(&self) -> &Array2<f64> {
        &self.eigenvectors
    }

    /// Number of eigenpairs, equal to the feature count.
    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }

    /// Sum of all eigenvalues (the trace of the covariance matrix).
    pub fn total_variance(&self) -> f64 {
        self.eigenvalues.sum()
    }
}

/// Computes ranked, unit-normalised eigenpairs of a symmetric matrix.
#[derive(Debug, Default, Clone, Copy)]
pub struct EigenDecomposer<B: BackendEigh = NdarrayLinAlgBackend> {
    backend: B,
}

impl EigenDecomposer<NdarrayLinAlgBackend> {
    pub fn new() -> Self {
        Self { backend: NdarrayLinAlgBackend }
    }
}

impl<B: BackendEigh> EigenDecomposer<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Decomposes `matrix` into eigenpairs sorted by descending eigenvalue.
    ///
    /// A singular matrix is fine: its eigenvalues near zero are kept (and
    /// clamped at zero when slightly negative).
    ///
    /// # Errors
    /// `ShapeMismatch` if `matrix` is not square. `NumericalInstability` if it
    /// holds non-finite values, is not symmetric, has a clearly negative
    /// eigenvalue, or the backend fails to converge.
    pub fn decompose(&self, matrix: &Array2<f64>) -> Result<EigenpairSet> {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            return Err(PcaError::ShapeMismatch { expected: rows, found: cols });
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(PcaError::NumericalInstability(
                "Covariance matrix contains non-finite values.".into(),
            ));
        }

        let scale = matrix.iter().fold(0.0f64, |acc, v| acc.max(v.abs())).max(1.0);
        for i in 0..rows {
            for j in (i + 1)..cols {
                if (matrix[[i, j]] - matrix[[j, i]]).abs() > SYMMETRY_TOLERANCE * scale {
                    return Err(PcaError::NumericalInstability(format!(
                        "Matrix is not symmetric at ({}, {}): {} vs {}",
                        i, j, matrix[[i, j]], matrix[[j, i]]
                    )));
                }
            }
        }

        let raw = self.backend.eigh_upper(matrix)?;

        let mut order: Vec<usize> = (0..raw.eigenvalues.len()).collect();
        order.sort_by(|&a, &b| {
            raw.eigenvalues[b]
                .partial_cmp(&raw.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let largest = order.first().map_or(0.0, |&i| raw.eigenvalues[i]);
        let negative_floor = -NEGATIVE_EIGENVALUE_TOLERANCE * largest.max(1.0);

        let mut eigenvalues = Array1::<f64>::zeros(rows);
        let mut eigenvectors = Array2::<f64>::zeros((rows, rows));
        for (rank, &source) in order.iter().enumerate() {
            let value = raw.eigenvalues[source];
            if value < negative_floor {
                return Err(PcaError::NumericalInstability(format!(
                    "Eigenvalue {} is negative beyond tolerance; the matrix is not positive semi-definite.",
                    value
                )));
            }
            if value < 0.0 {
                warn!("Clamping slightly negative eigenvalue {:e} to 0", value);
            }
            eigenvalues[rank] = value.max(0.0);

            let mut vector = raw.eigenvectors.column(source).to_owned();
            let norm = vector.dot(&vector).sqrt();
            if norm < 1e-12 {
                return Err(PcaError::NumericalInstability(format!(
                    "Eigenvector {} has zero norm.",
                    rank
                )));
            }
            vector /= norm;
            orient(&mut vector);
            eigenvectors.column_mut(rank).assign(&vector);
        }

        debug!("Eigenvalue spectrum: {:?}", eigenvalues.to_vec());
        if let Some(&smallest) = eigenvalues.iter().last() {
            if largest > 0.0 && smallest / largest < 1e-10 {
                warn!("Covariance matrix is (near) singular; smallest eigenvalue is {:e}", smallest);
            }
        }

        Ok(EigenpairSet { eigenvalues, eigenvectors })
    }
}

/// Flips `vector` so its largest-magnitude entry is positive (first on ties).
fn orient(vector: &mut Array1<f64>) {
    let mut pivot = 0.0f64;
    for &v in vector.iter() {
        if v.abs() > pivot.abs() {
            pivot = v;
        }
    }
    if pivot < 0.0 {
        vector.mapv_inplace(|v| -v);
    }
}

/// Checks that the columns of `vectors` are orthonormal within `tolerance`.
pub fn is_orthonormal(vectors: &Array2<f64>, tolerance: f64) -> bool {
    let gram = vectors.t().dot(vectors);
    gram.indexed_iter().all(|((i, j), &g)| {
        let target = if i == j { 1.0 } else { 0.0 };
        (g - target).abs() <= tolerance
    })
}

/// Reassembles `V diag(λ) Vᵀ`, for checking a decomposition.
pub fn reconstruct(pairs: &EigenpairSet) -> Array2<f64> {
    let scaled = &pairs.eigenvectors * &pairs.eigenvalues.view().insert_axis(Axis(0));
    scaled.dot(&pairs.eigenvectors.t())
}
