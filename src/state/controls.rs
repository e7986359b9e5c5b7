//! Fit controls
//!
//! Settings for a calculation or fit run, stored as `controls.json` next to
//! the project. Procedure-specific settings this crate does not interpret
//! are kept in [`Controls::extra`] and written back unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RascalError, Result};
use crate::state::project::CONTROLS_FILE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Procedure {
    #[default]
    Calculate,
    Simplex,
    #[serde(rename = "de")]
    DifferentialEvolution,
    #[serde(rename = "ns")]
    NestedSampler,
    Dream,
}

impl Procedure {
    /// Name as written in `controls.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Procedure::Calculate => "calculate",
            Procedure::Simplex => "simplex",
            Procedure::DifferentialEvolution => "de",
            Procedure::NestedSampler => "ns",
            Procedure::Dream => "dream",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parallel {
    #[default]
    Single,
    Points,
    Contrasts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Display {
    Off,
    #[default]
    Iter,
    Notify,
    Final,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    #[serde(default)]
    pub procedure: Procedure,

    #[serde(default)]
    pub parallel: Parallel,

    #[serde(default)]
    pub display: Display,

    #[serde(default)]
    pub calc_sld_during_fit: bool,

    #[serde(default = "default_resample_min_angle")]
    pub resample_min_angle: f64,

    #[serde(default = "default_resample_n_points")]
    pub resample_n_points: u32,

    /// Procedure-specific settings, preserved as read.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_resample_min_angle() -> f64 {
    0.9
}

fn default_resample_n_points() -> u32 {
    50
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            procedure: Procedure::default(),
            parallel: Parallel::default(),
            display: Display::default(),
            calc_sld_during_fit: false,
            resample_min_angle: default_resample_min_angle(),
            resample_n_points: default_resample_n_points(),
            extra: BTreeMap::new(),
        }
    }
}

impl Controls {
    /// Load `controls.json` from a project folder.
    pub fn load(folder: &Path) -> Result<Self> {
        let path = folder.join(CONTROLS_FILE);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RascalError::ProjectNotFound {
                path: folder.to_path_buf(),
            },
            _ => RascalError::FileReadError {
                path: path.clone(),
                source: e,
            },
        })?;

        let invalid = |reason: String| RascalError::InvalidProjectFile {
            file: CONTROLS_FILE,
            reason,
        };
        let controls: Controls =
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        controls.validate().map_err(|e| invalid(e.to_string()))?;
        Ok(controls)
    }

    /// Write `controls.json` into a project folder.
    pub fn save(&self, folder: &Path) -> Result<()> {
        let path = folder.join(CONTROLS_FILE);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|e| RascalError::FileWriteError { path, source: e })
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.resample_min_angle > 0.0 && self.resample_min_angle <= 1.0) {
            return Err(RascalError::InvalidSetting {
                setting: "resampleMinAngle".to_string(),
                reason: format!("{} is not in (0, 1]", self.resample_min_angle),
            });
        }
        if self.resample_n_points == 0 {
            return Err(RascalError::InvalidSetting {
                setting: "resampleNPoints".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Copy of these controls with `setting` changed to `value`.
    ///
    /// `setting` is the name used in `controls.json`. Unknown settings and
    /// values of the wrong type are rejected.
    pub fn with_setting(&self, setting: &str, value: serde_json::Value) -> Result<Self> {
        let invalid = |reason: String| RascalError::InvalidSetting {
            setting: setting.to_string(),
            reason,
        };

        let mut fields = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            _ => return Err(invalid("controls are not an object".to_string())),
        };
        match fields.get_mut(setting) {
            Some(slot) => *slot = value,
            None => return Err(invalid("unknown setting".to_string())),
        }

        let updated: Self = serde_json::from_value(serde_json::Value::Object(fields))
            .map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_round_trip() {
        let controls = Controls::default();
        let text = serde_json::to_string(&controls).unwrap();
        assert!(text.contains("\"procedure\":\"calculate\""));
        assert!(text.contains("\"resampleNPoints\":50"));
        let back: Controls = serde_json::from_str(&text).unwrap();
        assert_eq!(back, controls);
    }

    #[test]
    fn test_extra_settings_preserved() {
        let controls: Controls =
            serde_json::from_value(json!({"procedure": "dream", "nSamples": 20000})).unwrap();
        assert_eq!(controls.procedure, Procedure::Dream);
        assert_eq!(controls.extra["nSamples"], json!(20000));

        let value = serde_json::to_value(&controls).unwrap();
        assert_eq!(value["nSamples"], json!(20000));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join(CONTROLS_FILE), r#"{"resampleNPoints": 0}"#).unwrap();
        let err = Controls::load(dir.path()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PROJECT_FILE");
        assert!(err.to_string().contains("controls.json"));
    }

    #[test]
    fn test_with_setting() {
        let controls = Controls::default();
        let updated = controls.with_setting("procedure", json!("de")).unwrap();
        assert_eq!(updated.procedure, Procedure::DifferentialEvolution);
        assert_eq!(controls.procedure, Procedure::Calculate);
    }

    #[test]
    fn test_with_setting_rejects_bad_values() {
        let controls = Controls::default();
        assert!(controls.with_setting("procedure", json!("magic")).is_err());
        assert!(controls.with_setting("resampleMinAngle", json!(2.0)).is_err());
        let err = controls.with_setting("noSuchThing", json!(1)).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SETTING");
    }
}
