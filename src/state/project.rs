//! Project Schema
//!
//! The fitting project: parameters, layers, data and the contrasts tying them
//! together. Entities refer to each other by name, so every collection is a
//! [`NamedList`] with unique names.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RascalError, Result};

/// Project file name inside a project folder.
pub const PROJECT_FILE: &str = "project.json";
/// Controls file name inside a project folder.
pub const CONTROLS_FILE: &str = "controls.json";

/// Default background every imported contrast refers to.
pub const DEFAULT_BACKGROUND: &str = "Background 1";
/// Default resolution every imported contrast refers to.
pub const DEFAULT_RESOLUTION: &str = "Resolution 1";
/// Default scalefactor every imported contrast refers to.
pub const DEFAULT_SCALEFACTOR: &str = "Scalefactor 1";
/// Parameter holding the roughness of the substrate interface.
pub const SUBSTRATE_ROUGHNESS: &str = "Substrate Roughness";
/// Data entry used for simulation-only contrasts.
pub const SIMULATION_DATA: &str = "Simulation";

/// Something stored in a [`NamedList`].
pub trait Named {
    /// Collection label used in error messages.
    const KIND: &'static str;

    fn name(&self) -> &str;
}

/// Ordered collection with unique names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedList<T> {
    items: Vec<T>,
}

impl<T> Default for NamedList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Named> NamedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.items.iter().find(|item| item.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append an item; names must be unique.
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.contains(item.name()) {
            return Err(RascalError::DuplicateName {
                collection: T::KIND,
                name: item.name().to_string(),
            });
        }
        self.items.push(item);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(Named::name).collect()
    }

    /// First name that occurs more than once (lists read from disk are not checked on load).
    pub fn first_duplicate(&self) -> Option<&str> {
        self.items.iter().enumerate().find_map(|(i, item)| {
            self.items[..i]
                .iter()
                .any(|earlier| earlier.name() == item.name())
                .then(|| item.name())
        })
    }
}

impl<T: Named> FromIterator<T> for NamedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a, T> IntoIterator for &'a NamedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A scalar fit parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub min: f64,
    pub value: f64,
    pub max: f64,
    pub fit: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, min: f64, value: f64, max: f64, fit: bool) -> Self {
        Self {
            name: name.into(),
            min,
            value,
            max,
            fit,
        }
    }

    /// Whether `min <= value <= max`.
    pub fn is_consistent(&self) -> bool {
        self.min <= self.value && self.value <= self.max
    }
}

impl Named for Parameter {
    const KIND: &'static str = "parameters";

    fn name(&self) -> &str {
        &self.name
    }
}

/// What a layer is hydrated with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HydrateWith {
    BulkIn,
    #[default]
    BulkOut,
}

/// A finite layer; parameter fields hold parameter names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub thickness: String,
    #[serde(rename = "SLD")]
    pub sld: String,
    pub roughness: String,
    #[serde(default)]
    pub hydration: String,
    #[serde(default)]
    pub hydrate_with: HydrateWith,
}

impl Named for Layer {
    const KIND: &'static str = "layers";

    fn name(&self) -> &str {
        &self.name
    }
}

/// Measured or simulated reflectivity as (Q, R, dR) rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Data {
    pub name: String,
    #[serde(default)]
    pub data: Vec<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_range: Option<[f64; 2]>,
    pub simulation_range: [f64; 2],
}

impl Data {
    /// Data entry without measurements.
    pub fn simulation(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Vec::new(),
            data_range: None,
            simulation_range: [0.005, 0.7],
        }
    }

    /// Data entry for measured rows; ranges span the Q values.
    pub fn measured(name: impl Into<String>, data: Vec<[f64; 3]>) -> Self {
        let (lo, hi) = data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), row| {
            (lo.min(row[0]), hi.max(row[0]))
        });
        let range = if data.is_empty() { [0.0, 0.0] } else { [lo, hi] };
        Self {
            name: name.into(),
            data,
            data_range: Some(range),
            simulation_range: range,
        }
    }
}

impl Named for Data {
    const KIND: &'static str = "data";

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    #[default]
    Constant,
    Data,
    Function,
}

/// A background, driven by a background parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: SignalKind,
    pub source: String,
}

impl Named for Background {
    const KIND: &'static str = "backgrounds";

    fn name(&self) -> &str {
        &self.name
    }
}

/// An instrument resolution, driven by a resolution parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: SignalKind,
    pub source: String,
}

impl Named for Resolution {
    const KIND: &'static str = "resolutions";

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundAction {
    #[default]
    Add,
    Subtract,
}

/// One dataset paired with a model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contrast {
    pub name: String,
    pub data: String,
    pub background: String,
    #[serde(default)]
    pub background_action: BackgroundAction,
    pub bulk_in: String,
    pub bulk_out: String,
    pub scalefactor: String,
    pub resolution: String,
    #[serde(default)]
    pub resample: bool,
    #[serde(default)]
    pub model: Vec<String>,
}

impl Named for Contrast {
    const KIND: &'static str = "contrasts";

    fn name(&self) -> &str {
        &self.name
    }
}

/// Where an imported project came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub original_filename: String,
    pub original_path: PathBuf,
    /// Copy kept inside the project folder.
    pub copied_to: PathBuf,
    pub sha256: String,
    pub imported_at: DateTime<Utc>,
}

/// A reference to a name that does not exist in the target collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    /// Entity holding the reference, e.g. `contrast 'D2O'`.
    pub owner: String,
    pub field: &'static str,
    pub target: String,
}

impl std::fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} refers to missing {} '{}'", self.owner, self.field, self.target)
    }
}

fn default_calculation() -> String {
    "normal".to_string()
}

fn default_model() -> String {
    "standard layers".to_string()
}

fn default_geometry() -> String {
    "air/substrate".to_string()
}

/// Main project state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    #[serde(default = "default_calculation")]
    pub calculation: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_geometry")]
    pub geometry: String,

    #[serde(default)]
    pub absorption: bool,

    /// Layer parameters and the substrate roughness.
    #[serde(default)]
    pub parameters: NamedList<Parameter>,

    #[serde(default)]
    pub bulk_in: NamedList<Parameter>,

    #[serde(default)]
    pub bulk_out: NamedList<Parameter>,

    #[serde(default)]
    pub scalefactors: NamedList<Parameter>,

    #[serde(default)]
    pub background_parameters: NamedList<Parameter>,

    #[serde(default)]
    pub backgrounds: NamedList<Background>,

    #[serde(default)]
    pub resolution_parameters: NamedList<Parameter>,

    #[serde(default)]
    pub resolutions: NamedList<Resolution>,

    #[serde(default)]
    pub data: NamedList<Data>,

    #[serde(default)]
    pub layers: NamedList<Layer>,

    #[serde(default)]
    pub contrasts: NamedList<Contrast>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub unknown_fields: BTreeMap<String, serde_json::Value>,
}

impl Project {
    /// A project holding only the default entities.
    pub fn new(name: impl Into<String>) -> Self {
        let one = |p: Parameter| NamedList::from_iter([p]);
        Self {
            name: name.into(),
            calculation: default_calculation(),
            model: default_model(),
            geometry: default_geometry(),
            absorption: false,
            parameters: one(Parameter::new(SUBSTRATE_ROUGHNESS, 1.0, 3.0, 5.0, true)),
            bulk_in: one(Parameter::new("SLD Air", 0.0, 0.0, 0.0, false)),
            bulk_out: one(Parameter::new("SLD D2O", 6.2e-6, 6.35e-6, 6.35e-6, false)),
            scalefactors: one(Parameter::new(DEFAULT_SCALEFACTOR, 0.02, 0.23, 0.25, false)),
            background_parameters: one(Parameter::new(
                "Background Param 1",
                1e-7,
                1e-6,
                1e-5,
                false,
            )),
            backgrounds: NamedList::from_iter([Background {
                name: DEFAULT_BACKGROUND.to_string(),
                kind: SignalKind::Constant,
                source: "Background Param 1".to_string(),
            }]),
            resolution_parameters: one(Parameter::new(
                "Resolution Param 1",
                0.01,
                0.03,
                0.05,
                false,
            )),
            resolutions: NamedList::from_iter([Resolution {
                name: DEFAULT_RESOLUTION.to_string(),
                kind: SignalKind::Constant,
                source: "Resolution Param 1".to_string(),
            }]),
            data: NamedList::from_iter([Data::simulation(SIMULATION_DATA)]),
            layers: NamedList::new(),
            contrasts: NamedList::new(),
            provenance: None,
            unknown_fields: BTreeMap::new(),
        }
    }

    /// Load `project.json` from a project folder.
    pub fn load(folder: &Path) -> Result<Self> {
        let path = folder.join(PROJECT_FILE);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RascalError::ProjectNotFound {
                path: folder.to_path_buf(),
            },
            _ => RascalError::FileReadError {
                path: path.clone(),
                source: e,
            },
        })?;

        let project: Project =
            serde_json::from_str(&content).map_err(|e| RascalError::InvalidProjectFile {
                file: PROJECT_FILE,
                reason: e.to_string(),
            })?;
        project
            .validate()
            .map_err(|e| RascalError::InvalidProjectFile {
                file: PROJECT_FILE,
                reason: e.to_string(),
            })?;
        Ok(project)
    }

    /// Write `project.json` into a project folder.
    pub fn save(&self, folder: &Path) -> Result<()> {
        let path = folder.join(PROJECT_FILE);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|e| RascalError::FileWriteError { path, source: e })
    }

    fn parameter_lists(&self) -> [(&'static str, &NamedList<Parameter>); 6] {
        [
            ("parameters", &self.parameters),
            ("bulk_in", &self.bulk_in),
            ("bulk_out", &self.bulk_out),
            ("scalefactors", &self.scalefactors),
            ("background_parameters", &self.background_parameters),
            ("resolution_parameters", &self.resolution_parameters),
        ]
    }

    /// Check name uniqueness and parameter bounds.
    pub fn validate(&self) -> Result<()> {
        for (collection, list) in self.parameter_lists() {
            if let Some(name) = list.first_duplicate() {
                return Err(RascalError::DuplicateName {
                    collection,
                    name: name.to_string(),
                });
            }
            if let Some(p) = list.iter().find(|p| !p.is_consistent()) {
                return Err(RascalError::InvalidParameter {
                    name: p.name.clone(),
                    reason: format!(
                        "value {} is outside [{}, {}]",
                        p.value, p.min, p.max
                    ),
                });
            }
        }

        let duplicate = self
            .backgrounds
            .first_duplicate()
            .map(|n| (Background::KIND, n))
            .or_else(|| self.resolutions.first_duplicate().map(|n| (Resolution::KIND, n)))
            .or_else(|| self.data.first_duplicate().map(|n| (Data::KIND, n)))
            .or_else(|| self.layers.first_duplicate().map(|n| (Layer::KIND, n)))
            .or_else(|| self.contrasts.first_duplicate().map(|n| (Contrast::KIND, n)));
        if let Some((collection, name)) = duplicate {
            return Err(RascalError::DuplicateName {
                collection,
                name: name.to_string(),
            });
        }

        Ok(())
    }

    /// Every reference to a name that does not resolve.
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();
        let mut check = |owner: &str, field: &'static str, target: &str, exists: bool| {
            if !exists {
                dangling.push(DanglingReference {
                    owner: owner.to_string(),
                    field,
                    target: target.to_string(),
                });
            }
        };

        for b in &self.backgrounds {
            let owner = format!("background '{}'", b.name);
            if b.kind == SignalKind::Constant {
                check(
                    &owner,
                    "background parameter",
                    &b.source,
                    self.background_parameters.contains(&b.source),
                );
            }
        }
        for r in &self.resolutions {
            let owner = format!("resolution '{}'", r.name);
            if r.kind == SignalKind::Constant {
                check(
                    &owner,
                    "resolution parameter",
                    &r.source,
                    self.resolution_parameters.contains(&r.source),
                );
            }
        }
        for l in &self.layers {
            let owner = format!("layer '{}'", l.name);
            check(
                &owner,
                "thickness parameter",
                &l.thickness,
                self.parameters.contains(&l.thickness),
            );
            check(&owner, "SLD parameter", &l.sld, self.parameters.contains(&l.sld));
            check(
                &owner,
                "roughness parameter",
                &l.roughness,
                self.parameters.contains(&l.roughness),
            );
        }
        for c in &self.contrasts {
            let owner = format!("contrast '{}'", c.name);
            check(&owner, "data", &c.data, self.data.contains(&c.data));
            check(&owner, "background", &c.background, self.backgrounds.contains(&c.background));
            check(&owner, "resolution", &c.resolution, self.resolutions.contains(&c.resolution));
            check(
                &owner,
                "scalefactor",
                &c.scalefactor,
                self.scalefactors.contains(&c.scalefactor),
            );
            check(&owner, "bulk in", &c.bulk_in, self.bulk_in.contains(&c.bulk_in));
            check(&owner, "bulk out", &c.bulk_out, self.bulk_out.contains(&c.bulk_out));
            for layer in &c.model {
                check(&owner, "layer", layer, self.layers.contains(layer));
            }
        }

        dangling
    }
}
