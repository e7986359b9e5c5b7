//! ORSO simple sample model.
//!
//! A sample model describes the physical layer stack as a one-line `stack`
//! string (e.g. `air | 10 ( Ni 7 | Ti 7 ) | SiO2 1.5 | Si`) together with
//! optional tables of named layers, sub-stacks and materials. Resolving a
//! model expands repetitions and sub-stacks and yields the layers in optical
//! path order, from the incident medium to the substrate.

use std::cell::Cell;
use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::take_till1,
    character::complete::{char, digit1, multispace0, multispace1, one_of},
    combinator::{all_consuming, map_res, opt, recognize},
    multi::separated_list1,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};
use serde::Deserialize;
use thiserror::Error;

use crate::orso::formula::{Formula, FormulaError};
use crate::orso::units::{
    mass_density_to_g_per_cm3, number_density_to_inverse_angstrom_cubed,
    sld_to_inverse_angstrom_sq, Length, UnitError, DEFAULT_LENGTH_UNIT,
};

/// Maximum nesting of sub-stacks and repetition blocks.
pub const MAX_NESTING: usize = 16;

/// Maximum number of layers a model may expand to.
pub const MAX_LAYERS: usize = 10_000;

/// Maximum number of stack items visited while expanding repetitions.
pub const MAX_STEPS: usize = 1_000_000;

/// Default interface roughness when neither the layer nor the globals set one.
const DEFAULT_ROUGHNESS_NM: f64 = 0.3;

/// Why a sample model could not be turned into a layer stack.
///
/// These are expected outcomes for files without a usable model; callers
/// fall back to heuristics instead of failing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("data set has no sample model")]
    NoModel,

    #[error("sample model does not follow the ORSO schema: {0}")]
    Schema(String),

    #[error("cannot parse stack '{0}'")]
    Syntax(String),

    #[error("unknown stack token '{0}'")]
    UnknownToken(String),

    #[error("sample model nests deeper than {MAX_NESTING} levels")]
    TooDeep,

    #[error("sample model expands to more than {MAX_LAYERS} layers")]
    TooLarge,

    #[error("sample model needs more than {MAX_STEPS} expansion steps")]
    TooComplex,
}

/// Why the SLD of a material could not be determined.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SldError {
    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error("no density known for formula '{0}'")]
    MissingDensity(String),

    #[error("material has neither an SLD nor a formula")]
    Undetermined,

    #[error("formula '{0}' has no mass")]
    Massless(String),

    #[error("SLD evaluates to {0}")]
    NotFinite(f64),
}

/// Complex scattering length density in 1/angstrom^2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sld {
    pub real: f64,
    pub imag: f64,
}

impl Sld {
    pub fn real(real: f64) -> Self {
        Self { real, imag: 0.0 }
    }
}

/// A scalar with an optional unit; bare numbers use the model's default unit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(f64),
    Value {
        magnitude: f64,
        #[serde(default)]
        unit: Option<String>,
    },
}

impl Quantity {
    fn magnitude(&self) -> f64 {
        match self {
            Quantity::Number(v) => *v,
            Quantity::Value { magnitude, .. } => *magnitude,
        }
    }

    fn unit(&self) -> Option<&str> {
        match self {
            Quantity::Number(_) => None,
            Quantity::Value { unit, .. } => unit.as_deref(),
        }
    }

    fn to_length(&self, default_unit: &str) -> Length {
        Length::new(self.magnitude(), self.unit().unwrap_or(default_unit))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SldSpec {
    Number(f64),
    Complex {
        real: f64,
        #[serde(default)]
        imag: f64,
        #[serde(default)]
        unit: Option<String>,
    },
    Value {
        magnitude: f64,
        #[serde(default)]
        unit: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MaterialSpec {
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub mass_density: Option<Quantity>,
    #[serde(default)]
    pub number_density: Option<Quantity>,
    #[serde(default)]
    pub sld: Option<SldSpec>,
    #[serde(default)]
    pub original_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MaterialRef {
    Name(String),
    Inline(MaterialSpec),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LayerSpec {
    #[serde(default)]
    pub material: Option<MaterialRef>,
    #[serde(default)]
    pub thickness: Option<Quantity>,
    #[serde(default)]
    pub roughness: Option<Quantity>,
    #[serde(default)]
    pub original_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubStackSpec {
    pub stack: String,
    #[serde(default = "one")]
    pub repetitions: u32,
}

fn one() -> u32 {
    1
}

/// Model-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModelGlobals {
    #[serde(default)]
    pub roughness: Option<Quantity>,
    #[serde(default)]
    pub length_unit: Option<String>,
    #[serde(default)]
    pub mass_density_unit: Option<String>,
    #[serde(default)]
    pub number_density_unit: Option<String>,
    #[serde(default)]
    pub sld_unit: Option<String>,
}

/// The `sample.model` entry of an ORSO header.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SampleModel {
    pub stack: String,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub sub_stacks: BTreeMap<String, SubStackSpec>,
    #[serde(default)]
    pub layers: BTreeMap<String, LayerSpec>,
    #[serde(default)]
    pub materials: BTreeMap<String, MaterialSpec>,
    #[serde(default)]
    pub globals: ModelGlobals,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Default units a material was declared with.
#[derive(Debug, Clone, PartialEq)]
struct MaterialUnits {
    sld: Option<String>,
    mass_density: Option<String>,
    number_density: Option<String>,
}

/// A material after name lookup, with its SLD computed on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMaterial {
    pub name: Option<String>,
    pub formula: Option<String>,
    sld: Option<SldSpec>,
    mass_density: Option<Quantity>,
    number_density: Option<Quantity>,
    vacuum: bool,
    units: MaterialUnits,
}

impl ResolvedMaterial {
    /// A material with a known SLD and nothing else.
    pub fn with_sld(name: Option<&str>, formula: Option<&str>, sld: f64) -> Self {
        Self {
            name: name.map(str::to_string),
            formula: formula.map(str::to_string),
            sld: Some(SldSpec::Number(sld)),
            mass_density: None,
            number_density: None,
            vacuum: false,
            units: MaterialUnits {
                sld: None,
                mass_density: None,
                number_density: None,
            },
        }
    }

    /// A material identified only by name/formula, with no SLD information.
    pub fn unknown(name: Option<&str>, formula: Option<&str>) -> Self {
        let mut material = Self::with_sld(name, formula, 0.0);
        material.sld = None;
        material
    }

    pub fn sld(&self) -> Result<Sld, SldError> {
        let sld = self.compute_sld()?;
        match (sld.real.is_finite(), sld.imag.is_finite()) {
            (true, true) => Ok(sld),
            (false, _) => Err(SldError::NotFinite(sld.real)),
            (_, false) => Err(SldError::NotFinite(sld.imag)),
        }
    }

    fn compute_sld(&self) -> Result<Sld, SldError> {
        if self.vacuum {
            return Ok(Sld::real(0.0));
        }

        if let Some(spec) = &self.sld {
            let (real, imag, unit) = match spec {
                SldSpec::Number(v) => (*v, 0.0, None),
                SldSpec::Complex { real, imag, unit } => (*real, *imag, unit.as_deref()),
                SldSpec::Value { magnitude, unit } => (*magnitude, 0.0, unit.as_deref()),
            };
            let factor = sld_to_inverse_angstrom_sq(unit.or(self.units.sld.as_deref()))?;
            return Ok(Sld {
                real: real * factor,
                imag: imag * factor,
            });
        }

        let text = self.formula.as_deref().ok_or(SldError::Undetermined)?;
        let formula = Formula::parse(text)?;

        if let Some(density) = &self.number_density {
            let factor = number_density_to_inverse_angstrom_cubed(
                density.unit().or(self.units.number_density.as_deref()),
            )?;
            return Ok(Sld::real(
                formula.sld_at_number_density(density.magnitude() * factor),
            ));
        }

        let g_per_cm3 = match &self.mass_density {
            Some(density) => {
                density.magnitude()
                    * mass_density_to_g_per_cm3(
                        density.unit().or(self.units.mass_density.as_deref()),
                    )?
            }
            None => formula
                .known_density()
                .ok_or_else(|| SldError::MissingDensity(text.to_string()))?,
        };
        if formula.molar_mass() <= 0.0 {
            return Err(SldError::Massless(text.to_string()));
        }
        Ok(Sld::real(formula.sld_at_mass_density(g_per_cm3)))
    }
}

/// One element of a resolved stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayer {
    pub material: ResolvedMaterial,
    pub original_name: Option<String>,
    pub thickness: Length,
    pub roughness: Length,
}

// Stack grammar

#[derive(Debug, Clone, PartialEq)]
enum StackItem {
    Layer { name: String, thickness: Option<f64> },
    Repeat { count: u32, items: Vec<StackItem> },
}

fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
        str::parse::<f64>,
    )
    .parse(input)
}

fn token_name(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace() || matches!(c, '|' | '(' | ')')).parse(input)
}

fn layer_token(input: &str) -> IResult<&str, StackItem> {
    let (input, (name, thickness)) =
        (token_name, opt(preceded(multispace1, number))).parse(input)?;
    Ok((
        input,
        StackItem::Layer {
            name: name.to_string(),
            thickness,
        },
    ))
}

fn repeat_block(input: &str) -> IResult<&str, StackItem> {
    let (input, (count, _, items)) = (
        map_res(digit1, str::parse::<u32>),
        multispace0,
        delimited(char('('), stack_items, char(')')),
    )
        .parse(input)?;
    Ok((input, StackItem::Repeat { count, items }))
}

fn stack_item(input: &str) -> IResult<&str, StackItem> {
    delimited(multispace0, alt((repeat_block, layer_token)), multispace0).parse(input)
}

fn stack_items(input: &str) -> IResult<&str, Vec<StackItem>> {
    separated_list1(char('|'), stack_item).parse(input)
}

fn parse_stack(stack: &str) -> Result<Vec<StackItem>, ModelError> {
    all_consuming(stack_items)
        .parse(stack)
        .map(|(_, items)| items)
        .map_err(|_| ModelError::Syntax(stack.to_string()))
}

fn is_vacuum(name: &str) -> bool {
    name.eq_ignore_ascii_case("air") || name.eq_ignore_ascii_case("vacuum")
}

struct Resolver<'a> {
    model: &'a SampleModel,
    length_unit: String,
    default_roughness: Length,
    units: MaterialUnits,
    sub_stacks: BTreeMap<&'a str, (u32, Result<Vec<StackItem>, ModelError>)>,
    steps: Cell<usize>,
}

impl<'a> Resolver<'a> {
    fn new(model: &'a SampleModel) -> Self {
        let length_unit = model
            .globals
            .length_unit
            .clone()
            .unwrap_or_else(|| DEFAULT_LENGTH_UNIT.to_string());
        let default_roughness = model
            .globals
            .roughness
            .as_ref()
            .map(|q| q.to_length(&length_unit))
            .unwrap_or_else(|| Length::new(DEFAULT_ROUGHNESS_NM, "nm"));
        let sub_stacks = model
            .sub_stacks
            .iter()
            .map(|(name, sub)| (name.as_str(), (sub.repetitions, parse_stack(&sub.stack))))
            .collect();
        Self {
            model,
            length_unit,
            default_roughness,
            units: MaterialUnits {
                sld: model.globals.sld_unit.clone(),
                mass_density: model.globals.mass_density_unit.clone(),
                number_density: model.globals.number_density_unit.clone(),
            },
            sub_stacks,
            steps: Cell::new(0),
        }
    }

    fn material_from_spec(&self, name: Option<&str>, spec: &MaterialSpec) -> ResolvedMaterial {
        ResolvedMaterial {
            name: spec
                .original_name
                .clone()
                .or_else(|| name.map(str::to_string)),
            formula: spec.formula.clone(),
            sld: spec.sld.clone(),
            mass_density: spec.mass_density.clone(),
            number_density: spec.number_density.clone(),
            vacuum: false,
            units: self.units.clone(),
        }
    }

    fn material_named(&self, name: &str) -> Result<ResolvedMaterial, ModelError> {
        if let Some(spec) = self.model.materials.get(name) {
            return Ok(self.material_from_spec(Some(name), spec));
        }
        if is_vacuum(name) {
            let mut material = ResolvedMaterial::unknown(Some(name), None);
            material.vacuum = true;
            return Ok(material);
        }
        match Formula::parse(name) {
            Ok(_) => {
                let mut material = ResolvedMaterial::unknown(None, Some(name));
                material.units = self.units.clone();
                Ok(material)
            }
            Err(_) => Err(ModelError::UnknownToken(name.to_string())),
        }
    }

    fn stack_thickness(&self, thickness: Option<f64>) -> Option<Length> {
        thickness.map(|t| Length::new(t, self.length_unit.clone()))
    }

    fn push(&self, out: &mut Vec<ResolvedLayer>, layer: ResolvedLayer) -> Result<(), ModelError> {
        if out.len() >= MAX_LAYERS {
            return Err(ModelError::TooLarge);
        }
        out.push(layer);
        Ok(())
    }

    fn resolve(
        &self,
        items: &[StackItem],
        depth: usize,
        out: &mut Vec<ResolvedLayer>,
    ) -> Result<(), ModelError> {
        if depth > MAX_NESTING {
            return Err(ModelError::TooDeep);
        }

        for item in items {
            let steps = self.steps.get() + 1;
            if steps > MAX_STEPS {
                return Err(ModelError::TooComplex);
            }
            self.steps.set(steps);

            match item {
                StackItem::Repeat { count, items } => {
                    for _ in 0..*count {
                        self.resolve(items, depth + 1, out)?;
                    }
                }
                StackItem::Layer { name, thickness } => {
                    if let Some((repetitions, parsed)) = self.sub_stacks.get(name.as_str()) {
                        let sub_items = parsed.as_ref().map_err(Clone::clone)?;
                        for _ in 0..*repetitions {
                            self.resolve(sub_items, depth + 1, out)?;
                        }
                    } else if let Some(spec) = self.model.layers.get(name) {
                        let material = match &spec.material {
                            Some(MaterialRef::Name(m)) => self.material_named(m)?,
                            Some(MaterialRef::Inline(m)) => self.material_from_spec(None, m),
                            None => self.material_named(name)?,
                        };
                        let thickness = self
                            .stack_thickness(*thickness)
                            .or_else(|| {
                                spec.thickness
                                    .as_ref()
                                    .map(|q| q.to_length(&self.length_unit))
                            })
                            .unwrap_or_else(Length::zero);
                        let roughness = spec
                            .roughness
                            .as_ref()
                            .map(|q| q.to_length(&self.length_unit))
                            .unwrap_or_else(|| self.default_roughness.clone());
                        let layer = ResolvedLayer {
                            material,
                            original_name: spec.original_name.clone().or(Some(name.clone())),
                            thickness,
                            roughness,
                        };
                        self.push(out, layer)?;
                    } else {
                        let layer = ResolvedLayer {
                            material: self.material_named(name)?,
                            original_name: Some(name.clone()),
                            thickness: self
                                .stack_thickness(*thickness)
                                .unwrap_or_else(Length::zero),
                            roughness: self.default_roughness.clone(),
                        };
                        self.push(out, layer)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl SampleModel {
    /// Decode the raw `sample.model` header entry.
    pub fn from_yaml(value: &serde_yml::Value) -> Result<Self, ModelError> {
        serde_yml::from_value(value.clone()).map_err(|e| ModelError::Schema(e.to_string()))
    }

    /// Expand the stack into layers, incident medium first.
    pub fn resolve_to_layers(&self) -> Result<Vec<ResolvedLayer>, ModelError> {
        let items = parse_stack(&self.stack)?;
        let resolver = Resolver::new(self);
        let mut layers = Vec::new();
        resolver.resolve(&items, 0, &mut layers)?;
        Ok(layers)
    }
}
