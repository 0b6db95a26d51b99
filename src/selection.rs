// Component selection by fixed count or cumulative variance threshold

use crate::eigen::EigenpairSet;
use crate::error::{PcaError, Result};
use log::info;
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};

/// Slack on the cumulative ratio so that a threshold of exactly 1.0 is
/// reachable despite rounding in the eigenvalue sum.
const CUMULATIVE_RATIO_SLACK: f64 = 1e-12;

/// How many ranked components to retain.
///
/// `Count` and `VarianceThreshold` are mutually exclusive policies.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSelection {
    /// Keep every component.
    #[default]
    All,
    /// Keep the top-k components, `1 <= k <= n_features`.
    Count(usize),
    /// Keep the smallest prefix whose cumulative explained variance ratio
    /// reaches `t`, `t` in (0, 1].
    VarianceThreshold(f64),
}

impl ComponentSelection {
    /// Checks the policy against a feature count without selecting anything.
    pub fn validate(&self, n_features: usize) -> Result<()> {
        match *self {
            ComponentSelection::All => Ok(()),
            ComponentSelection::Count(k) => {
                if k == 0 || k > n_features {
                    Err(PcaError::InvalidComponentCount(format!(
                        "requested {} components but the data has {} features",
                        k, n_features
                    )))
                } else {
                    Ok(())
                }
            }
            ComponentSelection::VarianceThreshold(t) => {
                if !(t > 0.0 && t <= 1.0) {
                    Err(PcaError::InvalidComponentCount(format!(
                        "variance threshold {} is outside (0, 1]",
                        t
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Retained components and their share of the total variance.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedComponents {
    /// Retained eigenvalues, descending.
    pub eigenvalues: Array1<f64>,
    /// Retained unit eigenvectors as columns, shape (n_features, k).
    pub eigenvectors: Array2<f64>,
    /// `eigenvalue_i / sum(all eigenvalues)` for each retained component.
    pub explained_variance_ratio: Array1<f64>,
    /// Sum of all eigenvalues, retained or not.
    pub total_variance: f64,
}

impl SelectedComponents {
    pub fn n_components(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Running sum of `explained_variance_ratio`.
    pub fn cumulative_explained_variance_ratio(&self) -> Array1<f64> {
        cumulative(&self.explained_variance_ratio)
    }
}

pub(crate) fn cumulative(ratios: &Array1<f64>) -> Array1<f64> {
    let mut running = 0.0;
    ratios.mapv(|r| {
        running += r;
        running
    })
}

/// Explained variance ratio of every eigenpair; sums to 1.
pub fn explained_variance_ratios(pairs: &EigenpairSet) -> Result<Array1<f64>> {
    let total = pairs.total_variance();
    if !(total > 0.0) {
        return Err(PcaError::NumericalInstability(format!(
            "total variance is {}; explained variance ratios are undefined",
            total
        )));
    }
    Ok(pairs.eigenvalues().mapv(|v| v / total))
}

/// Applies `selection` to ranked eigenpairs.
///
/// # Errors
/// `InvalidComponentCount` if the policy is out of range for the feature
/// count, `NumericalInstability` if the total variance is not positive.
pub fn select_components(pairs: &EigenpairSet, selection: ComponentSelection) -> Result<SelectedComponents> {
    let n_features = pairs.len();
    selection.validate(n_features)?;
    let ratios = explained_variance_ratios(pairs)?;

    let k = match selection {
        ComponentSelection::All => n_features,
        ComponentSelection::Count(k) => k,
        ComponentSelection::VarianceThreshold(t) => {
            let running = cumulative(&ratios);
            running
                .iter()
                .position(|&c| c + CUMULATIVE_RATIO_SLACK >= t)
                .map_or(n_features, |i| i + 1)
        }
    };

    info!(
        "Retaining {} of {} components ({:.2}% of variance)",
        k,
        n_features,
        100.0 * ratios.slice(s![..k]).sum()
    );

    Ok(SelectedComponents {
        eigenvalues: pairs.eigenvalues().slice(s![..k]).to_owned(),
        eigenvectors: pairs.eigenvectors().slice(s![.., ..k]).to_owned(),
        explained_variance_ratio: ratios.slice(s![..k]).to_owned(),
        total_variance: pairs.total_variance(),
    })
}
