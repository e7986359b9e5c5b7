//! One contrast per ORSO data set.

use tracing::{debug, warn};

use super::bulk::{infer_bulk_name, match_bulk_catalogue, sld_estimate};
use super::parameters::ensure_bulk_parameter;
use super::sanitize::sanitize_name;
use crate::config::ImportOptions;
use crate::error::{RascalError, Result};
use crate::orso::units::q_to_inverse_angstrom;
use crate::orso::{ModelError, OrsoDataset, ResolvedLayer};
use crate::state::project::{
    BackgroundAction, Contrast, Data, Project, DEFAULT_BACKGROUND, DEFAULT_RESOLUTION,
    DEFAULT_SCALEFACTOR,
};

/// Smallest error assigned to a reflectivity point without one.
const MIN_ERROR: f64 = 1e-12;
/// Relative error assigned to a reflectivity point without one.
const RELATIVE_ERROR: f64 = 0.05;

/// Settings shared by every contrast of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContext {
    /// Bulk-in parameter reference.
    pub bulk_in: String,
    /// Bulk-out medium used when a data set gives no better hint.
    pub default_bulk_out: String,
    /// Layer names of the shared model.
    pub model: Vec<String>,
}

/// Resolve a data set's stack, logging instead of failing.
pub fn resolve_stack(dataset: &OrsoDataset) -> Option<Vec<ResolvedLayer>> {
    match dataset.resolve_to_layers() {
        Ok(layers) => Some(layers),
        Err(ModelError::NoModel) => {
            debug!(dataset = dataset.index, "data set has no sample model");
            None
        }
        Err(e) => {
            warn!(dataset = dataset.index, "ignoring sample model: {}", e);
            None
        }
    }
}

/// Sanitized sample name, made unique among existing contrasts.
pub fn contrast_name(project: &Project, dataset: &OrsoDataset) -> String {
    let fallback = format!("Contrast {}", dataset.index);
    let base = sanitize_name(dataset.sample_name.as_deref().unwrap_or_default(), &fallback);

    let taken = |name: &str| project.contrasts.contains(name) || project.data.contains(name);
    if !taken(&base) {
        return base;
    }

    let mut candidate = format!("{base} ({})", dataset.index);
    let mut n = 2;
    while taken(&candidate) {
        candidate = format!("{base} ({}-{n})", dataset.index);
        n += 1;
    }
    candidate
}

/// Convert raw rows to (Q, R, dR), adding dR when absent.
pub fn prepare_rows(contrast: &str, dataset: &OrsoDataset) -> Result<Vec<[f64; 3]>> {
    let columns = dataset.column_count();
    if columns < 2 || dataset.rows.is_empty() {
        return Err(RascalError::InvalidDataShape {
            contrast: contrast.to_string(),
            columns,
        });
    }

    let q_factor =
        q_to_inverse_angstrom(dataset.q_unit()).map_err(|e| RascalError::UnitConversion {
            quantity: "Q",
            context: contrast.to_string(),
            unit: e.unit,
            target: "1/angstrom",
        })?;

    if columns > 3 {
        debug!(contrast, columns, "dropping columns beyond the third");
    }

    Ok(dataset
        .rows
        .iter()
        .map(|row| {
            let q = row[0] * q_factor;
            let r = row[1];
            let dr = match row.get(2) {
                Some(dr) => *dr,
                None => MIN_ERROR.max(RELATIVE_ERROR * r.abs()),
            };
            [q, r, dr]
        })
        .collect())
}

/// Bulk-out reference for one data set.
///
/// Its own model's last layer wins, then a catalogue match on the contrast
/// name, then the file-wide default.
pub fn resolve_bulk_out(
    project: &mut Project,
    stack: Option<&[ResolvedLayer]>,
    contrast: &str,
    ctx: &FileContext,
    options: &ImportOptions,
) -> Result<String> {
    let stack = stack.filter(|stack| stack.len() >= 2);
    if let Some(last) = stack.and_then(<[_]>::last) {
        let name = infer_bulk_name(last, &ctx.default_bulk_out);
        let sld = sld_estimate(&last.material);
        return ensure_bulk_parameter(&mut project.bulk_out, &name, sld, options.bulk_band);
    }

    let name = match_bulk_catalogue(contrast).unwrap_or(ctx.default_bulk_out.as_str());
    ensure_bulk_parameter(&mut project.bulk_out, name, None, options.bulk_band)
}

/// Register the data set's data and contrast; returns the contrast name.
///
/// `stack` is the data set's own resolved model, if it has one.
pub fn add_contrast(
    project: &mut Project,
    dataset: &OrsoDataset,
    stack: Option<&[ResolvedLayer]>,
    ctx: &FileContext,
    options: &ImportOptions,
) -> Result<String> {
    let name = contrast_name(project, dataset);
    let rows = prepare_rows(&name, dataset)?;
    let bulk_out = resolve_bulk_out(project, stack, &name, ctx, options)?;

    let data = Data::measured(name.clone(), rows);
    debug!(
        contrast = %name,
        points = data.data.len(),
        range = ?data.data_range,
        bulk_out = %bulk_out,
        "adding contrast"
    );
    project.data.push(data)?;
    project.contrasts.push(Contrast {
        name: name.clone(),
        data: name.clone(),
        background: DEFAULT_BACKGROUND.to_string(),
        background_action: BackgroundAction::Add,
        bulk_in: ctx.bulk_in.clone(),
        bulk_out,
        scalefactor: DEFAULT_SCALEFACTOR.to_string(),
        resolution: DEFAULT_RESOLUTION.to_string(),
        resample: false,
        model: ctx.model.clone(),
    })?;

    Ok(name)
}
