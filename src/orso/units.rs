//! Physical units used by ORSO headers and sample models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unit assumed for lengths when a sample model does not name one.
pub const DEFAULT_LENGTH_UNIT: &str = "nm";

/// Unit conversion failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unsupported unit '{unit}'")]
pub struct UnitError {
    pub unit: String,
}

/// A length-valued quantity as written in the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub magnitude: f64,
    pub unit: String,
}

impl Length {
    pub fn new(magnitude: f64, unit: impl Into<String>) -> Self {
        Self {
            magnitude,
            unit: unit.into(),
        }
    }

    /// A zero length, used for the semi-infinite media.
    pub fn zero() -> Self {
        Self::new(0.0, "angstrom")
    }

    /// Convert to angstrom.
    pub fn as_angstrom(&self) -> Result<f64, UnitError> {
        Ok(self.magnitude * angstrom_per(&self.unit)?)
    }
}

/// Number of angstrom in one `unit`.
fn angstrom_per(unit: &str) -> Result<f64, UnitError> {
    let factor = match unit.trim() {
        "angstrom" | "Angstrom" | "Å" | "A" | "AA" => 1.0,
        "pm" => 1e-2,
        "nm" => 10.0,
        "um" | "µm" | "μm" | "micron" => 1e4,
        "mm" => 1e7,
        "cm" => 1e8,
        "m" => 1e10,
        other => {
            return Err(UnitError {
                unit: other.to_string(),
            })
        }
    };
    Ok(factor)
}

/// Factor converting a wavevector transfer in `unit` to 1/angstrom.
///
/// A missing unit means 1/angstrom, the ORSO default for Qz.
pub fn q_to_inverse_angstrom(unit: Option<&str>) -> Result<f64, UnitError> {
    match unit.map(str::trim) {
        None | Some("") | Some("1/angstrom") | Some("1/Angstrom") | Some("1/Å") | Some("1/A") => {
            Ok(1.0)
        }
        Some("1/nm") => Ok(0.1),
        Some(other) => Err(UnitError {
            unit: other.to_string(),
        }),
    }
}

/// Factor converting an SLD in `unit` to 1/angstrom^2.
pub fn sld_to_inverse_angstrom_sq(unit: Option<&str>) -> Result<f64, UnitError> {
    match unit.map(str::trim) {
        None | Some("") | Some("1/angstrom^2") | Some("1/Å^2") | Some("1/A^2") => Ok(1.0),
        Some("1/nm^2") => Ok(1e-2),
        Some("1e-6/angstrom^2") | Some("10^-6/angstrom^2") => Ok(1e-6),
        Some(other) => Err(UnitError {
            unit: other.to_string(),
        }),
    }
}

/// Factor converting a mass density in `unit` to g/cm^3.
pub fn mass_density_to_g_per_cm3(unit: Option<&str>) -> Result<f64, UnitError> {
    match unit.map(str::trim) {
        None | Some("") | Some("g/cm^3") | Some("g/cm3") => Ok(1.0),
        Some("kg/m^3") | Some("kg/m3") => Ok(1e-3),
        Some(other) => Err(UnitError {
            unit: other.to_string(),
        }),
    }
}

/// Factor converting a number density in `unit` to 1/angstrom^3.
pub fn number_density_to_inverse_angstrom_cubed(unit: Option<&str>) -> Result<f64, UnitError> {
    match unit.map(str::trim) {
        None | Some("") | Some("1/nm^3") => Ok(1e-3),
        Some("1/angstrom^3") | Some("1/Å^3") => Ok(1.0),
        Some("1/cm^3") => Ok(1e-24),
        Some(other) => Err(UnitError {
            unit: other.to_string(),
        }),
    }
}
