// Principal component analysis (PCA)

#![doc = include_str!("../README.md")]

pub mod config;
pub mod covariance;
pub mod dataset;
pub mod eigen;
pub mod error;
pub mod linalg_backends;
pub mod pca;
pub mod regression;
pub mod scree;
pub mod selection;
pub mod standardize;

pub use config::PcaConfig;
pub use dataset::{train_test_split, MissingValuePolicy, Table, TrainTestSplit};
pub use eigen::{EigenDecomposer, EigenpairSet};
pub use error::{PcaError, Result};
pub use pca::PCA;
pub use regression::LinearRegression;
pub use scree::ScreePoint;
pub use selection::ComponentSelection;
pub use standardize::Standardizer;
