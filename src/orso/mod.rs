//! ORSO reflectivity file reader
//!
//! An `.ort` file is a sequence of data sets. Each data set has a header of
//! `# `-prefixed YAML lines followed by whitespace-separated numeric rows.
//! The first header is complete; later headers only carry the keys that
//! differ and are merged recursively onto the first one.
//!
//! This module is the only place that knows about the ORSO layout. The
//! importer works with the typed [`OrsoDataset`] it produces.

pub mod formula;
pub mod model;
pub mod units;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use serde_yml::Value;
use tracing::debug;

use crate::error::{RascalError, Result};

pub use model::{ModelError, ResolvedLayer, ResolvedMaterial, SampleModel, Sld, SldError};
pub use units::{Length, UnitError};

/// Every ORSO file starts with this marker.
pub const ORSO_MAGIC: &str = "# # ORSO";

/// A parsed `.ort` file.
#[derive(Debug, Clone)]
pub struct OrsoFile {
    /// Version from the first line, e.g. `1.1`.
    pub version: Option<String>,
    pub datasets: Vec<OrsoDataset>,
}

/// Column description from the header.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Column {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub physical_quantity: Option<String>,
}

/// One data set with its (merged) header.
#[derive(Debug, Clone)]
pub struct OrsoDataset {
    /// 1-based position in the file.
    pub index: usize,
    /// Value of the `data_set` header key.
    pub label: Option<String>,
    pub sample_name: Option<String>,
    /// Raw `sample.model` entry, decoded lazily by [`OrsoDataset::resolve_to_layers`].
    pub model: Option<Value>,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<f64>>,
}

impl OrsoDataset {
    /// Number of numeric columns; 0 for a data set without rows.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// Unit of the first (Q) column.
    pub fn q_unit(&self) -> Option<&str> {
        self.columns.first().and_then(|c| c.unit.as_deref())
    }

    /// Resolve the sample model into layers, incident medium first.
    pub fn resolve_to_layers(&self) -> std::result::Result<Vec<ResolvedLayer>, ModelError> {
        let value = self.model.as_ref().ok_or(ModelError::NoModel)?;
        SampleModel::from_yaml(value)?.resolve_to_layers()
    }
}

#[derive(Debug, Default, Deserialize)]
struct HeaderSchema {
    #[serde(default)]
    data_source: Option<DataSourceSchema>,
    #[serde(default)]
    columns: Vec<Column>,
    #[serde(default)]
    data_set: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct DataSourceSchema {
    #[serde(default)]
    sample: Option<SampleSchema>,
}

#[derive(Debug, Default, Deserialize)]
struct SampleSchema {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    model: Option<Value>,
}

struct Block {
    header: String,
    rows: Vec<Vec<f64>>,
}

impl Block {
    fn new() -> Self {
        Self {
            header: String::new(),
            rows: Vec::new(),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Merge `overlay` into `base`: mappings merge key by key, anything else replaces.
fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_yaml(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn parse_version(first_line: &str) -> Option<String> {
    first_line
        .split('|')
        .map(str::trim)
        .find(|part| part.ends_with("standard"))
        .and_then(|part| part.split_whitespace().next())
        .map(str::to_string)
}

fn split_blocks(text: &str) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    let mut current = Block::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim_start();
        if line.trim().is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('#') {
            if !current.rows.is_empty() {
                blocks.push(std::mem::replace(&mut current, Block::new()));
            }
            current.header.push_str(rest.strip_prefix(' ').unwrap_or(rest));
            current.header.push('\n');
            continue;
        }

        let row = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RascalError::InvalidOrso {
                reason: format!("line {}: {}", lineno + 1, e),
            })?;

        if let Some(first) = current.rows.first() {
            if first.len() != row.len() {
                return Err(RascalError::InvalidOrso {
                    reason: format!(
                        "line {}: expected {} columns, found {}",
                        lineno + 1,
                        first.len(),
                        row.len()
                    ),
                });
            }
        }
        current.rows.push(row);
    }

    if !current.header.is_empty() || !current.rows.is_empty() {
        blocks.push(current);
    }
    Ok(blocks)
}

/// Parse the text of an `.ort` file.
pub fn parse_orso(text: &str) -> Result<OrsoFile> {
    let first_line = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default();
    if !first_line.trim_start().starts_with(ORSO_MAGIC) {
        return Err(RascalError::InvalidOrso {
            reason: "missing '# # ORSO' header line".to_string(),
        });
    }
    let version = parse_version(first_line);

    let mut base: Option<Value> = None;
    let mut datasets = Vec::new();

    for (i, block) in split_blocks(text)?.into_iter().enumerate() {
        let overlay: Value =
            serde_yml::from_str(&block.header).map_err(|source| RascalError::InvalidOrsoHeader {
                dataset: i + 1,
                source,
            })?;

        // Trailing comment-only blocks carry neither header keys nor data.
        if block.rows.is_empty() && overlay.is_null() && base.is_some() {
            continue;
        }

        let merged = match &base {
            None => overlay,
            Some(first) => {
                let mut merged = first.clone();
                if !overlay.is_null() {
                    merge_yaml(&mut merged, overlay);
                }
                merged
            }
        };
        if base.is_none() {
            base = Some(merged.clone());
        }

        let index = datasets.len() + 1;
        let schema: HeaderSchema = if merged.is_null() {
            HeaderSchema::default()
        } else {
            serde_yml::from_value(merged)
                .map_err(|source| RascalError::InvalidOrsoHeader { dataset: index, source })?
        };

        let sample = schema.data_source.and_then(|d| d.sample).unwrap_or_default();
        let dataset = OrsoDataset {
            index,
            label: schema.data_set.as_ref().and_then(scalar_to_string),
            sample_name: sample.name.as_ref().and_then(scalar_to_string),
            model: sample.model,
            columns: schema.columns,
            rows: block.rows,
        };
        debug!(
            index,
            rows = dataset.rows.len(),
            columns = dataset.column_count(),
            has_model = dataset.model.is_some(),
            "parsed ORSO data set"
        );
        datasets.push(dataset);
    }

    if datasets.is_empty() {
        return Err(RascalError::InvalidOrso {
            reason: "file contains no data sets".to_string(),
        });
    }

    Ok(OrsoFile { version, datasets })
}

/// Read and parse an `.ort` file.
pub fn load_orso(path: &Path) -> Result<OrsoFile> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RascalError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => RascalError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    parse_orso(&text)
}
