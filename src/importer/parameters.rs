//! Merging imported values into the project's parameter collections.
//!
//! Re-importing must never narrow a range the user has already set up, so
//! existing parameters are only widened. A parameter whose value is unknown
//! is left exactly as it was.

use tracing::debug;

use crate::error::{RascalError, Result};
use crate::state::project::{NamedList, Parameter};

const SLD_PREFIX: &str = "SLD ";

/// Values this close to zero get a symmetric seed range.
const NEAR_ZERO: f64 = 1e-12;

/// Name of the bulk parameter for a medium, e.g. `SLD D2O`.
pub fn bulk_reference(name: &str) -> String {
    if name.starts_with(SLD_PREFIX) {
        name.to_string()
    } else {
        format!("{SLD_PREFIX}{name}")
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn require_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RascalError::InvalidParameter {
            name: name.to_string(),
            reason: format!("imported value {value} is not a finite number"),
        })
    }
}

fn widen(param: &mut Parameter, value: f64) {
    param.min = param.min.min(value);
    param.max = param.max.max(value);
    param.value = value;
}

/// Make sure the bulk parameter for `name` reflects `sld`; returns its reference.
///
/// An unknown or zero SLD leaves an existing parameter untouched. An absent
/// parameter with unknown SLD is not created, but the reference is still
/// returned so the contrast can point at it.
pub fn ensure_bulk_parameter(
    list: &mut NamedList<Parameter>,
    name: &str,
    sld: Option<f64>,
    band: f64,
) -> Result<String> {
    let reference = bulk_reference(name);
    if let Some(v) = sld {
        require_finite(&reference, v)?;
    }

    match (list.get_mut(&reference), sld) {
        (Some(_), None) => {}
        (Some(_), Some(v)) if v == 0.0 => {}
        (Some(param), Some(v)) => {
            widen(param, v);
            debug!(parameter = %reference, value = v, "widened bulk parameter");
        }
        (None, None) => {
            debug!(parameter = %reference, "SLD unknown, bulk parameter not created");
        }
        (None, Some(v)) => {
            let (min, max) = ordered(v * (1.0 - band), v * (1.0 + band));
            list.push(Parameter::new(reference.clone(), min, v, max, false))?;
            debug!(parameter = %reference, value = v, "created bulk parameter");
        }
    }

    Ok(reference)
}

/// Make sure the layer parameter `name` holds `value`; returns its name.
///
/// New parameters span `value * (1 -/+ frac)`, or `[-half_width, half_width]`
/// for a near-zero value, and are clipped below by `floor`.
pub fn ensure_layer_parameter(
    list: &mut NamedList<Parameter>,
    name: &str,
    value: f64,
    frac: f64,
    half_width: f64,
    floor: Option<f64>,
) -> Result<String> {
    require_finite(name, value)?;
    if let Some(param) = list.get_mut(name) {
        widen(param, value);
        return Ok(name.to_string());
    }

    let (mut min, mut max) = if value.abs() < NEAR_ZERO {
        (-half_width, half_width)
    } else {
        ordered(value * (1.0 - frac), value * (1.0 + frac))
    };
    if let Some(floor) = floor {
        min = min.max(floor);
        max = max.max(floor);
    }
    let value = value.clamp(min, max);

    list.push(Parameter::new(name, min, value, max, true))?;
    Ok(name.to_string())
}
