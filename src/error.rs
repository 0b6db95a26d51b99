use thiserror::Error;

/// Errors produced while loading data, fitting, or applying a PCA model.
///
/// Every failure is surfaced to the caller immediately. The computation is
/// pure, so there are no retries and no partially fitted models.
#[derive(Error, Debug)]
pub enum PcaError {
    #[error("Missing or non-finite value at row {row}, column {column}. Impute or drop it before standardizing.")]
    MissingValue { row: usize, column: usize },

    #[error("Column {column} has zero variance and cannot be standardized.")]
    ZeroVariance { column: usize },

    #[error("Shape mismatch: expected {expected} columns, found {found}.")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("Invalid component selection: {0}")]
    InvalidComponentCount(String),

    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    #[error("PCA model is not fitted. Call `fit` or load a model first.")]
    NotFitted,

    #[error("At least {required} samples are required, found {found}.")]
    InsufficientSamples { required: usize, found: usize },

    #[error("Input has zero features.")]
    EmptyInput,

    #[error("Column '{0}' not found in table header.")]
    UnknownColumn(String),

    #[error("Invalid train/test split: {0}")]
    InvalidSplit(String),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read or write file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize model: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, PcaError>;

impl From<bincode::error::EncodeError> for PcaError {
    fn from(e: bincode::error::EncodeError) -> Self {
        PcaError::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for PcaError {
    fn from(e: bincode::error::DecodeError) -> Self {
        PcaError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for PcaError {
    fn from(e: toml::de::Error) -> Self {
        PcaError::Config(e.to_string())
    }
}
