//! Layer entities from a resolved sample stack.

use tracing::debug;

use super::bulk::get_sld;
use super::parameters::ensure_layer_parameter;
use super::sanitize::sanitize_name;
use crate::config::ImportOptions;
use crate::error::{RascalError, Result};
use crate::orso::{Length, ResolvedLayer};
use crate::state::project::{HydrateWith, Layer, Project, SUBSTRATE_ROUGHNESS};

const FALLBACK_LAYER_NAME: &str = "Layer";

/// Display name of a layer: its original name, then its material name.
pub fn layer_name(layer: &ResolvedLayer) -> String {
    [layer.original_name.as_deref(), layer.material.name.as_deref()]
        .into_iter()
        .flatten()
        .map(|raw| sanitize_name(raw, ""))
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_LAYER_NAME.to_string())
}

fn to_angstrom(length: &Length, quantity: &'static str, context: &str) -> Result<f64> {
    length
        .as_angstrom()
        .map_err(|e| RascalError::UnitConversion {
            quantity,
            context: context.to_string(),
            unit: e.unit,
            target: "angstrom",
        })
}

/// Add layers and their parameters for the finite part of `stack`.
///
/// Returns the model as an ordered list of layer names; a layer that occurs
/// several times in the stack appears several times in the model but is
/// only created once. Stacks with fewer than two entries have no finite
/// layers and no substrate, so nothing is added.
pub fn build_layer_stack(
    project: &mut Project,
    stack: &[ResolvedLayer],
    options: &ImportOptions,
) -> Result<Vec<String>> {
    let [_, finite @ .., substrate] = stack else {
        return Ok(Vec::new());
    };

    let mut model = Vec::with_capacity(finite.len());
    for layer in finite {
        let name = layer_name(layer);
        let thickness = to_angstrom(&layer.thickness, "thickness", &name)?;
        let roughness = to_angstrom(&layer.roughness, "roughness", &name)?;
        let sld = get_sld(&layer.material);

        let params = &mut project.parameters;
        let frac = options.range_fraction;
        let half_width = options.near_zero_half_width;
        let thickness_ref = ensure_layer_parameter(
            params,
            &format!("{name} Thickness"),
            thickness,
            frac,
            half_width,
            Some(0.0),
        )?;
        let roughness_ref = ensure_layer_parameter(
            params,
            &format!("{name} Roughness"),
            roughness,
            frac,
            half_width,
            Some(0.0),
        )?;
        let sld_ref =
            ensure_layer_parameter(params, &format!("{name} SLD"), sld, frac, half_width, None)?;

        if !project.layers.contains(&name) {
            project.layers.push(Layer {
                name: name.clone(),
                thickness: thickness_ref,
                sld: sld_ref,
                roughness: roughness_ref,
                hydration: String::new(),
                hydrate_with: HydrateWith::BulkOut,
            })?;
            debug!(layer = %name, thickness, roughness, sld, "added layer");
        }
        model.push(name);
    }

    let substrate_roughness = to_angstrom(&substrate.roughness, "roughness", "substrate")?;
    ensure_layer_parameter(
        &mut project.parameters,
        SUBSTRATE_ROUGHNESS,
        substrate_roughness,
        options.range_fraction,
        options.near_zero_half_width,
        Some(0.0),
    )?;

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orso::ResolvedMaterial;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn layer(name: &str, sld: f64, thickness: f64) -> ResolvedLayer {
        ResolvedLayer {
            material: ResolvedMaterial::with_sld(Some(name), None, sld),
            original_name: Some(name.to_string()),
            thickness: Length::new(thickness, "angstrom"),
            roughness: Length::new(3.0, "angstrom"),
        }
    }

    #[test]
    fn test_layer_name_priority() {
        let mut l = layer("Ni", 9.4e-6, 10.0);
        assert_eq!(layer_name(&l), "Ni");

        l.original_name = Some("   ".to_string());
        assert_eq!(layer_name(&l), "Ni");

        l.material.name = None;
        l.original_name = None;
        assert_eq!(layer_name(&l), "Layer");
    }

    #[test]
    fn test_repeated_layers_created_once() {
        let mut project = Project::new("Test");
        let stack = vec![
            layer("air", 0.0, 0.0),
            layer("Ni", 9.4e-6, 70.0),
            layer("Ti", -1.9e-6, 70.0),
            layer("Ni", 9.4e-6, 70.0),
            layer("Ti", -1.9e-6, 70.0),
            layer("Si", 2.07e-6, 0.0),
        ];

        let model = build_layer_stack(&mut project, &stack, &ImportOptions::default()).unwrap();
        assert_eq!(model, vec!["Ni", "Ti", "Ni", "Ti"]);
        assert_eq!(project.layers.names(), vec!["Ni", "Ti"]);

        let ti = project.layers.get("Ti").unwrap();
        assert_eq!(ti.sld, "Ti SLD");
        let ti_sld = project.parameters.get("Ti SLD").unwrap();
        assert_relative_eq!(ti_sld.min, -1.9e-6 * 1.25);
        assert_relative_eq!(ti_sld.max, -1.9e-6 * 0.75);
        assert!(project.dangling_references().is_empty());
    }

    #[test]
    fn test_substrate_roughness_is_merged() {
        let mut project = Project::new("Test");
        let mut substrate = layer("Si", 2.07e-6, 0.0);
        substrate.roughness = Length::new(8.0, "angstrom");
        let stack = vec![layer("air", 0.0, 0.0), layer("Ni", 9.4e-6, 10.0), substrate];

        build_layer_stack(&mut project, &stack, &ImportOptions::default()).unwrap();
        let p = project.parameters.get(SUBSTRATE_ROUGHNESS).unwrap();
        assert_eq!((p.min, p.value, p.max), (1.0, 8.0, 8.0));
    }

    #[test]
    fn test_unit_failure_names_layer() {
        let mut project = Project::new("Test");
        let mut bad = layer("Ni", 9.4e-6, 10.0);
        bad.thickness = Length::new(1.0, "furlong");
        let stack = vec![layer("air", 0.0, 0.0), bad, layer("Si", 2.07e-6, 0.0)];

        let err = build_layer_stack(&mut project, &stack, &ImportOptions::default()).unwrap_err();
        assert_eq!(err.error_code(), "UNIT_CONVERSION");
        assert!(err.to_string().contains("'Ni'"));
    }

    #[test]
    fn test_short_stack_adds_nothing() {
        let mut project = Project::new("Test");
        let before = project.clone();
        let model =
            build_layer_stack(&mut project, &[layer("Si", 2.07e-6, 0.0)], &ImportOptions::default())
                .unwrap();
        assert!(model.is_empty());
        assert_eq!(project, before);
    }
}
