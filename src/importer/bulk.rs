//! Bulk-medium identification.
//!
//! The first and last layers of a resolved stack are the semi-infinite
//! incident and substrate/solvent media. Their identity is guessed from names
//! and formulas against a small catalogue. This is best-effort: an exotic
//! medium may be misclassified or fall back to the default, which is an
//! accepted approximation rather than an error.

use tracing::debug;

use crate::orso::{ResolvedLayer, ResolvedMaterial};

/// Known bulk media, matched in this order.
pub const BULK_CATALOGUE: &[&str] = &["D2O", "H2O", "AuMW", "SiMW", "SMW", "Si", "Air"];

/// Default incident medium.
pub const DEFAULT_BULK_IN: &str = "Air";

/// Default substrate/solvent medium.
pub const DEFAULT_BULK_OUT: &str = "D2O";

/// First catalogue entry contained (case-insensitively) in `text`.
pub fn match_bulk_catalogue(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    BULK_CATALOGUE
        .iter()
        .copied()
        .find(|known| lower.contains(&known.to_lowercase()))
}

fn match_formula(formula: &str) -> Option<&'static str> {
    let lower = formula.to_lowercase();
    if lower.contains("d2o") {
        Some("D2O")
    } else if lower.contains("h2o") {
        Some("H2O")
    } else {
        None
    }
}

/// Name of the bulk medium a layer represents, or `fallback`.
pub fn infer_bulk_name(layer: &ResolvedLayer, fallback: &str) -> String {
    let from_material = layer.material.name.as_deref().and_then(match_bulk_catalogue);
    let from_original = || layer.original_name.as_deref().and_then(match_bulk_catalogue);
    let from_formula = || layer.material.formula.as_deref().and_then(match_formula);

    from_material
        .or_else(from_original)
        .or_else(from_formula)
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Real part of the material SLD when it can be determined.
pub fn sld_estimate(material: &ResolvedMaterial) -> Option<f64> {
    match material.sld() {
        Ok(sld) => Some(sld.real),
        Err(e) => {
            debug!(
                material = material.name.as_deref().or(material.formula.as_deref()),
                "SLD unknown: {}",
                e
            );
            None
        }
    }
}

/// Real part of the material SLD, 0.0 when unknown.
pub fn get_sld(material: &ResolvedMaterial) -> f64 {
    sld_estimate(material).unwrap_or(0.0)
}
