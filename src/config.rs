use crate::dataset::MissingValuePolicy;
use crate::error::{PcaError, Result};
use crate::selection::ComponentSelection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings for a load → split → fit → project run.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// target_column = "mpg"
/// missing_values = "drop_rows"
/// selection = { variance_threshold = 0.95 }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PcaConfig {
    pub selection: ComponentSelection,
    pub missing_values: MissingValuePolicy,
    /// Fraction of rows held out for evaluation, in (0, 1).
    pub test_fraction: f64,
    /// Seed for the train/test shuffle.
    pub seed: u64,
    pub delimiter: String,
    /// Column removed from the features before analysis.
    pub target_column: Option<String>,
}

impl Default for PcaConfig {
    fn default() -> Self {
        PcaConfig {
            selection: ComponentSelection::All,
            missing_values: MissingValuePolicy::Reject,
            test_fraction: 0.25,
            seed: 2025,
            delimiter: ",".to_string(),
            target_column: None,
        }
    }
}

impl PcaConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PcaConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks ranges that do not depend on the data.
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PcaError::Config(format!("test_fraction {} is outside (0, 1)", self.test_fraction)));
        }
        if self.delimiter.is_empty() {
            return Err(PcaError::Config("delimiter must not be empty".into()));
        }
        match self.selection {
            ComponentSelection::Count(0) => Err(PcaError::InvalidComponentCount("component count must be at least 1".into())),
            ComponentSelection::VarianceThreshold(_) => self.selection.validate(usize::MAX),
            _ => Ok(()),
        }
    }
}
