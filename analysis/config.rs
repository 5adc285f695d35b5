use crate::select::DEFAULT_COLLINEARITY_THRESHOLD;
use crate::validation::DEFAULT_FOLDS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What to do with rows that have a missing feature value after coercion.
/// Rows with a missing target are always dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Drop the row entirely.
    #[default]
    Drop,
    /// Replace each missing feature cell with the column mean over kept rows.
    ImputeMean,
}

/// The assessment disaggregation stratum retained by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratumFilter {
    pub grade: i64,
    /// Reserved code that marks a subgroup flag as "all students".
    pub all_students_code: i64,
}

impl Default for StratumFilter {
    fn default() -> Self {
        Self {
            grade: 4,
            all_students_code: 99,
        }
    }
}

/// Every setting of one analysis run. Any field missing from a TOML file
/// takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory of per-year assessment CSV files.
    pub assessments_dir: PathBuf,
    /// Wide-format district finance/demographic export.
    pub profile_path: PathBuf,
    pub output_dir: PathBuf,
    pub folds: usize,
    pub collinearity_threshold: f64,
    /// Fraction of rows held out by the diagnostic train/test split.
    pub test_fraction: f64,
    /// Seed for the diagnostic split; unseeded runs differ from run to run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_seed: Option<u64>,
    pub missing_policy: MissingPolicy,
    /// Any cell containing one of these tokens is treated as missing.
    pub sentinel_tokens: Vec<String>,
    pub stratum: StratumFilter,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            assessments_dir: PathBuf::from("raw_data/assessments"),
            profile_path: PathBuf::from("raw_data/elsi/elsi_export.csv"),
            output_dir: PathBuf::from("."),
            folds: DEFAULT_FOLDS,
            collinearity_threshold: DEFAULT_COLLINEARITY_THRESHOLD,
            test_fraction: 0.2,
            split_seed: None,
            missing_policy: MissingPolicy::Drop,
            sentinel_tokens: default_sentinel_tokens(),
            stratum: StratumFilter::default(),
        }
    }
}

/// The markers the ELSi export writes in place of suppressed or
/// not-applicable values, plus the mangled forms they take after a lossy
/// re-encoding. The loader turns undecodable bytes into U+FFFD.
pub fn default_sentinel_tokens() -> Vec<String> {
    ["†", "‡", "–", "???", "\u{FFFD}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML config file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Cross-validation needs at least 2 folds, but {0} were requested.")]
    InvalidFoldCount(usize),
    #[error("Collinearity threshold must lie in (0, 1], but was {0}.")]
    InvalidThreshold(f64),
    #[error("Test fraction must lie strictly between 0 and 1, but was {0}.")]
    InvalidTestFraction(f64),
}

impl RunConfig {
    /// Loads a run configuration from a TOML file and validates it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file without validating it, for callers that apply
    /// overrides first.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        Ok(toml::from_str(&toml_string)?)
    }

    /// Saves the configuration in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.folds < 2 {
            return Err(ConfigError::InvalidFoldCount(self.folds));
        }
        if !(self.collinearity_threshold > 0.0 && self.collinearity_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.collinearity_threshold));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigError::InvalidTestFraction(self.test_fraction));
        }
        Ok(())
    }
}
