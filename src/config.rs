//! Application configuration
//!
//! Defaults, overridden by an optional JSON file, overridden in turn by
//! environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RascalError, Result};
use crate::importer::bulk::{DEFAULT_BULK_IN, DEFAULT_BULK_OUT};

/// Overrides the folder holding the bundled example projects.
pub const EXAMPLES_PATH_ENV: &str = "RASCAL_EXAMPLES_PATH";
/// Overrides the folder example projects are copied to before loading.
pub const EXAMPLES_TEMP_PATH_ENV: &str = "RASCAL_EXAMPLES_TEMP_PATH";

/// Knobs for seeding parameters during ORSO import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Relative half width of new layer parameter ranges.
    pub range_fraction: f64,
    /// Relative half width of new bulk parameter ranges.
    pub bulk_band: f64,
    /// Half width of the range seeded for a zero value.
    pub near_zero_half_width: f64,
    pub bulk_in_fallback: String,
    pub bulk_out_fallback: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            range_fraction: 0.25,
            bulk_band: 0.05,
            near_zero_half_width: 1e-6,
            bulk_in_fallback: DEFAULT_BULK_IN.to_string(),
            bulk_out_fallback: DEFAULT_BULK_OUT.to_string(),
        }
    }
}

impl ImportOptions {
    pub fn validate(&self) -> Result<()> {
        let fractions = [
            ("range_fraction", self.range_fraction),
            ("bulk_band", self.bulk_band),
        ];
        for (setting, value) in fractions {
            if !(0.0..1.0).contains(&value) {
                return Err(RascalError::InvalidSetting {
                    setting: setting.to_string(),
                    reason: format!("{value} is not in [0, 1)"),
                });
            }
        }
        if self.near_zero_half_width.is_nan() || self.near_zero_half_width <= 0.0 {
            return Err(RascalError::InvalidSetting {
                setting: "near_zero_half_width".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub examples_path: PathBuf,
    pub examples_temp_path: PathBuf,
    pub import: ImportOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            examples_path: PathBuf::from("examples"),
            examples_temp_path: env::temp_dir().join("rascal2-examples"),
            import: ImportOptions::default(),
        }
    }
}

impl AppConfig {
    /// Read a JSON config file; missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| RascalError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.import.validate()?;
        Ok(config)
    }

    /// Apply environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Some(path) = env::var_os(EXAMPLES_PATH_ENV) {
            self.examples_path = PathBuf::from(path);
        }
        if let Some(path) = env::var_os(EXAMPLES_TEMP_PATH_ENV) {
            self.examples_temp_path = PathBuf::from(path);
        }
        self
    }

    /// Defaults, then `file` if given, then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env())
    }
}
