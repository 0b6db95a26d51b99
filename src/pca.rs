// Principal component analysis (PCA)

use crate::covariance::covariance_matrix;
use crate::eigen::EigenDecomposer;
use crate::error::{PcaError, Result};
use crate::linalg_backends::BackendEigh;
use crate::scree::{scree_points, ScreePoint};
use crate::selection::{cumulative, select_components, ComponentSelection};
use crate::standardize::{check_finite, Standardizer};
use log::info;
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Principal component analysis (PCA) structure.
///
/// This struct holds the results of a PCA fit (the standardization
/// parameters and the retained eigenvectors) and projects data into the
/// principal component space. The fitted parameters are the only state that
/// outlives a fit; they are reused unchanged for every later `transform`.
/// Models can also be loaded from/saved to files.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PCA {
    /// Per-feature mean and standard deviation of the training data.
    pub(crate) standardizer: Option<Standardizer>,
    /// The rotation matrix (retained unit eigenvectors as columns).
    /// Shape: (n_features, k_components)
    pub(crate) rotation: Option<Array2<f64>>,
    /// Eigenvalues of the retained components, descending.
    /// Shape: (k_components)
    pub(crate) explained_variance: Option<Array1<f64>>,
    /// Share of the total variance per retained component.
    /// Shape: (k_components)
    pub(crate) explained_variance_ratio: Option<Array1<f64>>,
    /// Every eigenvalue of the covariance matrix, retained or not.
    /// Shape: (n_features)
    pub(crate) eigenvalue_spectrum: Option<Array1<f64>>,
}

impl Default for PCA {
    fn default() -> Self {
        Self::new()
    }
}

impl PCA {
    /// Creates a new, empty PCA struct.
    ///
    /// The PCA model is not fitted and needs to be computed using `fit`,
    /// or loaded using `load_model` or `with_model`.
    ///
    /// # Examples
    ///
    /// ```
    /// use eigen_pca::PCA;
    /// let pca = PCA::new();
    /// assert!(pca.rotation().is_none());
    /// ```
    pub fn new() -> Self {
        Self {
            standardizer: None,
            rotation: None,
            explained_variance: None,
            explained_variance_ratio: None,
            eigenvalue_spectrum: None,
        }
    }

    /// Creates a PCA instance from a pre-computed model.
    ///
    /// * `rotation` - Principal components as columns, shape (d_features, k_components).
    /// * `mean` - Mean vector of the data the rotation was derived from, shape (d_features).
    /// * `std_dev` - Standard deviations of that data, shape (d_features). Must be positive.
    ///
    /// Variance information is not available on a model built this way.
    ///
    /// # Errors
    /// `ShapeMismatch` if the feature dimensions disagree, `ZeroVariance` if a
    /// standard deviation is not strictly positive and finite.
    pub fn with_model(rotation: Array2<f64>, mean: Array1<f64>, std_dev: Array1<f64>) -> Result<Self> {
        if rotation.nrows() != mean.len() {
            return Err(PcaError::ShapeMismatch { expected: mean.len(), found: rotation.nrows() });
        }
        if rotation.iter().any(|v| !v.is_finite()) {
            return Err(PcaError::NumericalInstability("rotation matrix contains non-finite values".into()));
        }
        let standardizer = Standardizer::with_parameters(mean, std_dev)?;
        Ok(Self {
            standardizer: Some(standardizer),
            rotation: Some(rotation),
            ..Self::new()
        })
    }

    /// Returns the mean vector of the training data, if fitted.
    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.standardizer.as_ref().map(Standardizer::mean)
    }

    /// Returns the standard deviations used for scaling, if fitted.
    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.standardizer.as_ref().map(Standardizer::std_dev)
    }

    pub fn standardizer(&self) -> Option<&Standardizer> {
        self.standardizer.as_ref()
    }

    /// Returns the rotation matrix (principal components as columns), if fitted.
    ///
    /// Shape (n_features, k_components).
    pub fn rotation(&self) -> Option<&Array2<f64>> {
        self.rotation.as_ref()
    }

    /// Returns the eigenvalues of the retained components, largest first.
    pub fn explained_variance(&self) -> Option<&Array1<f64>> {
        self.explained_variance.as_ref()
    }

    /// Returns `eigenvalue_i / sum(all eigenvalues)` for each retained component.
    pub fn explained_variance_ratio(&self) -> Option<&Array1<f64>> {
        self.explained_variance_ratio.as_ref()
    }

    pub fn cumulative_explained_variance_ratio(&self) -> Option<Array1<f64>> {
        self.explained_variance_ratio.as_ref().map(cumulative)
    }

    /// Returns all eigenvalues of the covariance matrix, including discarded ones.
    pub fn eigenvalue_spectrum(&self) -> Option<&Array1<f64>> {
        self.eigenvalue_spectrum.as_ref()
    }

    /// Sum of every eigenvalue, retained or not.
    pub fn total_variance(&self) -> Option<f64> {
        self.eigenvalue_spectrum.as_ref().map(|spectrum| spectrum.sum())
    }

    pub fn n_components(&self) -> Option<usize> {
        self.rotation.as_ref().map(|r| r.ncols())
    }

    pub fn n_features(&self) -> Option<usize> {
        self.standardizer.as_ref().map(Standardizer::n_features)
    }

    /// Scree data over the full eigenvalue spectrum.
    ///
    /// Empty if the model was not fitted here (e.g. built with `with_model`).
    pub fn scree(&self) -> Vec<ScreePoint> {
        self.eigenvalue_spectrum.as_ref().map(scree_points).unwrap_or_default()
    }

    /// Fits the PCA model by eigen-decomposition of the covariance matrix of
    /// the standardized data.
    ///
    /// Standardizes each column to zero mean and unit variance, builds the
    /// covariance matrix, decomposes it, ranks the eigenpairs by descending
    /// eigenvalue and keeps the components chosen by `selection`.
    ///
    /// * `data_matrix` - Input data, shape (n_samples, n_features).
    /// * `selection` - Fixed count, variance threshold, or all components.
    ///
    /// # Errors
    /// `MissingValue`, `ZeroVariance`, `InsufficientSamples`, `EmptyInput`,
    /// `InvalidComponentCount` or `NumericalInstability`. On error the model
    /// is left unchanged.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ndarray::array;
    /// use eigen_pca::{ComponentSelection, PCA};
    ///
    /// let data = array![[2.0, 0.0], [0.0, 2.0], [-2.0, 0.0], [0.0, -2.0]];
    /// let mut pca = PCA::new();
    /// pca.fit(data.view(), ComponentSelection::Count(1)).unwrap();
    /// assert_eq!(pca.n_components(), Some(1));
    /// ```
    pub fn fit(&mut self, data_matrix: ArrayView2<f64>, selection: ComponentSelection) -> Result<()> {
        self.fit_with_decomposer(data_matrix, selection, &EigenDecomposer::new())
    }

    /// Same as [`PCA::fit`] with a caller-supplied eigen backend.
    pub fn fit_with_decomposer<B: BackendEigh>(
        &mut self,
        data_matrix: ArrayView2<f64>,
        selection: ComponentSelection,
        decomposer: &EigenDecomposer<B>,
    ) -> Result<()> {
        let (n_samples, n_features) = data_matrix.dim();
        info!("Fitting PCA on {} samples x {} features", n_samples, n_features);
        selection.validate(n_features)?;

        let (standardizer, standardized) = Standardizer::fit_transform(data_matrix)?;
        let cov = covariance_matrix(standardized.view())?;
        let pairs = decomposer.decompose(&cov)?;
        let selected = select_components(&pairs, selection)?;

        self.standardizer = Some(standardizer);
        self.rotation = Some(selected.eigenvectors);
        self.explained_variance = Some(selected.eigenvalues);
        self.explained_variance_ratio = Some(selected.explained_variance_ratio);
        self.eigenvalue_spectrum = Some(pairs.eigenvalues().clone());
        Ok(())
    }

    /// Fits the model and returns the principal component scores of `data_matrix`.
    pub fn fit_transform(
        &mut self,
        data_matrix: ArrayView2<f64>,
        selection: ComponentSelection,
    ) -> Result<Array2<f64>> {
        self.fit(data_matrix, selection)?;
        self.transform(data_matrix)
    }

    fn fitted(&self) -> Result<(&Standardizer, &Array2<f64>)> {
        match (self.standardizer.as_ref(), self.rotation.as_ref()) {
            (Some(s), Some(r)) => Ok((s, r)),
            _ => Err(PcaError::NotFitted),
        }
    }

    /// Applies the PCA transformation to new data.
    ///
    /// The data is standardized with the parameters learned during fitting
    /// (never refitted) and projected onto the retained components.
    ///
    /// * `x` - Input data, shape (m_samples, d_features). Zero rows yield a
    ///         (0, k_components) result.
    ///
    /// # Errors
    /// `NotFitted` if no model is present, `ShapeMismatch` if the feature
    /// count differs from the fitted one, `MissingValue` on non-finite input.
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (standardizer, rotation) = self.fitted()?;
        if x.ncols() != standardizer.n_features() {
            return Err(PcaError::ShapeMismatch { expected: standardizer.n_features(), found: x.ncols() });
        }
        if x.nrows() == 0 {
            return Ok(Array2::zeros((0, rotation.ncols())));
        }
        let standardized = standardizer.transform(x)?;
        Ok(standardized.dot(rotation))
    }

    /// Projects rows that were already standardized with this model's
    /// parameters: each output column is the dot product with one retained
    /// eigenvector. Standardizing with other parameters is the caller's error
    /// and is not detected.
    pub fn project(&self, standardized: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (_, rotation) = self.fitted()?;
        if standardized.ncols() != rotation.nrows() {
            return Err(PcaError::ShapeMismatch { expected: rotation.nrows(), found: standardized.ncols() });
        }
        check_finite(standardized)?;
        Ok(standardized.dot(rotation))
    }

    /// Maps scores back to the standardized feature space (`scores · rotationᵀ`).
    ///
    /// Exact when all components were retained; otherwise the best
    /// rank-k approximation.
    pub fn inverse_project(&self, scores: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (_, rotation) = self.fitted()?;
        if scores.ncols() != rotation.ncols() {
            return Err(PcaError::ShapeMismatch { expected: rotation.ncols(), found: scores.ncols() });
        }
        Ok(scores.dot(&rotation.t()))
    }

    /// Maps scores back to the original feature units.
    pub fn inverse_transform(&self, scores: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (standardizer, _) = self.fitted()?;
        let standardized = self.inverse_project(scores)?;
        standardizer.inverse_transform(standardized.view())
    }

    /// Saves the current PCA model to a file using bincode.
    ///
    /// # Errors
    /// `NotFitted` if the model has no rotation or standardization
    /// parameters, `Io`/`Serialization` on write failure.
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.fitted()?;
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        info!("Saved PCA model to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads a PCA model from a file previously saved with `save_model`.
    ///
    /// # Errors
    /// `Io`/`Serialization` on read failure; `NotFitted`, `ShapeMismatch`,
    /// `ZeroVariance` or `NumericalInstability` if the stored model is
    /// incomplete or internally inconsistent.
    pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let model: PCA = bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
        model.validate()?;
        info!("Loaded PCA model from {:?}", path.as_ref());
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        let (standardizer, rotation) = self.fitted()?;
        // Re-run the parameter checks on the deserialized values.
        Standardizer::with_parameters(standardizer.mean().clone(), standardizer.std_dev().clone())?;

        if rotation.nrows() != standardizer.n_features() {
            return Err(PcaError::ShapeMismatch { expected: standardizer.n_features(), found: rotation.nrows() });
        }
        if rotation.iter().any(|v| !v.is_finite()) {
            return Err(PcaError::NumericalInstability("stored rotation matrix contains non-finite values".into()));
        }
        let k = rotation.ncols();
        for stored in [&self.explained_variance, &self.explained_variance_ratio].into_iter().flatten() {
            if stored.len() != k {
                return Err(PcaError::ShapeMismatch { expected: k, found: stored.len() });
            }
            if stored.iter().any(|&v| !v.is_finite() || v < 0.0) {
                return Err(PcaError::NumericalInstability(
                    "stored explained variance contains negative or non-finite values".into(),
                ));
            }
        }
        if let Some(spectrum) = &self.eigenvalue_spectrum {
            if spectrum.len() != standardizer.n_features() {
                return Err(PcaError::ShapeMismatch { expected: standardizer.n_features(), found: spectrum.len() });
            }
        }
        Ok(())
    }
}
