//! ORSO import
//!
//! Turns an `.ort` file into a project: one contrast per data set, sharing
//! a single layer model built from the first data set's sample description.
//!
//! The import works on a copy of the base project and returns the finished
//! project, so a failure part way through leaves the caller's project as it
//! was.

pub mod bulk;
pub mod contrasts;
pub mod layers;
pub mod parameters;
pub mod sanitize;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::ImportOptions;
use crate::error::{RascalError, Result};
use crate::orso::{load_orso, OrsoFile};
use crate::state::project::{Project, Provenance};

use bulk::{infer_bulk_name, sld_estimate};
use contrasts::{add_contrast, resolve_stack, FileContext};
use layers::build_layer_stack;
use parameters::ensure_bulk_parameter;

/// Project name used when the file name gives nothing usable.
pub const DEFAULT_IMPORT_NAME: &str = "ORSO Import";

/// Folder inside the project that receives the imported file.
pub const DATA_FOLDER: &str = "data";

/// Assembles an imported project from a base project.
pub struct ProjectBuilder<'a> {
    project: Project,
    options: &'a ImportOptions,
}

impl<'a> ProjectBuilder<'a> {
    /// Start from a copy of `base` without contrasts, data or layers.
    pub fn new(base: &Project, options: &'a ImportOptions) -> Self {
        let mut project = base.clone();
        project.contrasts.clear();
        project.data.clear();
        project.layers.clear();
        Self { project, options }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.project.provenance = Some(provenance);
        self
    }

    /// Add the layers and contrasts of `file`.
    pub fn add_file(&mut self, file: &OrsoFile) -> Result<()> {
        let options = self.options;
        let stacks: Vec<_> = file.datasets.iter().map(resolve_stack).collect();
        // a model needs at least the two bulk media
        let first = stacks
            .first()
            .and_then(Option::as_deref)
            .filter(|stack| stack.len() >= 2)
            .unwrap_or_default();

        let model = build_layer_stack(&mut self.project, first, options)?;

        let bulk_in = match first.first() {
            Some(layer) => ensure_bulk_parameter(
                &mut self.project.bulk_in,
                &infer_bulk_name(layer, &options.bulk_in_fallback),
                sld_estimate(&layer.material),
                options.bulk_band,
            )?,
            None => ensure_bulk_parameter(
                &mut self.project.bulk_in,
                &options.bulk_in_fallback,
                None,
                options.bulk_band,
            )?,
        };
        let default_bulk_out = match first.last() {
            Some(layer) => infer_bulk_name(layer, &options.bulk_out_fallback),
            None => options.bulk_out_fallback.clone(),
        };

        let ctx = FileContext {
            bulk_in,
            default_bulk_out,
            model,
        };
        for (dataset, stack) in file.datasets.iter().zip(&stacks) {
            add_contrast(&mut self.project, dataset, stack.as_deref(), &ctx, options)?;
        }
        Ok(())
    }

    /// Finish the import; dangling references are logged, not repaired.
    pub fn build(self) -> Project {
        for dangling in self.project.dangling_references() {
            warn!("{}", dangling);
        }
        self.project
    }
}

fn canonical_source(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RascalError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => RascalError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

fn sha256_of(path: &Path) -> Result<String> {
    let content = fs::read(path).map_err(|e| RascalError::FileReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(format!("{:x}", Sha256::digest(&content)))
}

/// Import `source` into a copy of `base`, keeping a copy of the file in
/// `<project_folder>/data/`.
pub fn import_ort_to_project(
    source: &Path,
    base: &Project,
    project_folder: &Path,
    options: &ImportOptions,
) -> Result<Project> {
    let source = canonical_source(source)?;

    let data_dir = project_folder.join(DATA_FOLDER);
    fs::create_dir_all(&data_dir).map_err(|e| RascalError::DirectoryCreateError {
        path: data_dir.clone(),
        source: e,
    })?;
    let data_dir = fs::canonicalize(&data_dir).map_err(|e| RascalError::FileReadError {
        path: data_dir.clone(),
        source: e,
    })?;

    let file = load_orso(&source)?;
    info!(
        source = %source.display(),
        datasets = file.datasets.len(),
        version = file.version.as_deref().unwrap_or("unknown"),
        "importing ORSO file"
    );

    let file_name = source
        .file_name()
        .ok_or_else(|| RascalError::InvalidOrso {
            reason: format!("{} has no file name", source.display()),
        })?
        .to_owned();
    let copied_to = data_dir.join(&file_name);
    let provenance = Provenance {
        original_filename: file_name.to_string_lossy().into_owned(),
        original_path: source.clone(),
        copied_to: copied_to.clone(),
        sha256: sha256_of(&source)?,
        imported_at: Utc::now(),
    };

    let mut builder = ProjectBuilder::new(base, options).with_provenance(provenance);
    builder.add_file(&file)?;
    let project = builder.build();

    // only a successful import leaves a copy behind
    if copied_to != source {
        fs::copy(&source, &copied_to).map_err(|e| RascalError::FileWriteError {
            path: copied_to.clone(),
            source: e,
        })?;
    }

    info!(
        contrasts = project.contrasts.len(),
        layers = project.layers.len(),
        "import complete"
    );
    Ok(project)
}

/// Project name derived from an `.ort` file name.
pub fn import_project_name(path: &Path) -> String {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().replace('_', " "))
        .unwrap_or_default();
    let name = name.trim();
    if name.is_empty() {
        DEFAULT_IMPORT_NAME.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orso::parse_orso;
    use crate::state::project::SUBSTRATE_ROUGHNESS;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const FILM: &str = "\
# # ORSO reflectivity data file | 1.1 standard | YAML encoding | https://www.reflectometry.org/
# data_source:
#   sample:
#     name: Ni film
#     model:
#       stack: air | Ni 10 | Si
# columns:
# - {name: Qz, unit: 1/angstrom}
# - {name: R}
0.01 0.9
0.02 0.5
";

    #[test]
    fn test_import_project_name() {
        assert_eq!(import_project_name(Path::new("/tmp/ni_film_d2o.ort")), "ni film d2o");
        assert_eq!(import_project_name(Path::new("/tmp/___.ort")), DEFAULT_IMPORT_NAME);
        assert_eq!(import_project_name(Path::new("/")), DEFAULT_IMPORT_NAME);
    }

    #[test]
    fn test_builder_leaves_base_untouched() {
        let base = Project::new("Base");
        let options = ImportOptions::default();
        let file = parse_orso(FILM).unwrap();

        let mut builder = ProjectBuilder::new(&base, &options);
        builder.add_file(&file).unwrap();
        let project = builder.build();

        assert_eq!(base, Project::new("Base"));
        assert_eq!(project.layers.names(), vec!["Ni"]);
        assert_eq!(project.contrasts.names(), vec!["Ni film"]);
        assert!(project.parameters.contains("Ni Thickness"));
        assert!(project.parameters.contains(SUBSTRATE_ROUGHNESS));

        let contrast = project.contrasts.get("Ni film").unwrap();
        assert_eq!(contrast.bulk_in, "SLD Air");
        assert_eq!(contrast.bulk_out, "SLD Si");
        assert!(project.bulk_out.contains("SLD Si"));
    }

    fn film_with_model(sample: &str, model: &str) -> OrsoFile {
        let model: String = model.lines().map(|line| format!("#       {line}\n")).collect();
        let text = FILM
            .replace("#     name: Ni film\n", &format!("#     name: {sample}\n"))
            .replace("#       stack: air | Ni 10 | Si\n", &model);
        parse_orso(&text).unwrap()
    }

    #[test]
    fn test_single_layer_stack_uses_fallback_media() {
        let base = Project::new("Base");
        let options = ImportOptions::default();
        let file = film_with_model("bare substrate", "stack: Si");

        let mut builder = ProjectBuilder::new(&base, &options);
        builder.add_file(&file).unwrap();
        let project = builder.build();

        let contrast = project.contrasts.get("bare substrate").unwrap();
        assert_eq!(contrast.bulk_in, "SLD Air");
        assert_eq!(contrast.bulk_out, "SLD D2O");
        assert!(contrast.model.is_empty());
        assert_eq!(project.bulk_in, base.bulk_in);
        assert_eq!(project.bulk_out, base.bulk_out);
        assert!(project.layers.is_empty());
    }

    #[test]
    fn test_massless_formula_gets_zero_sld() {
        let base = Project::new("Base");
        let options = ImportOptions::default();
        let file = film_with_model(
            "odd film",
            "stack: air | odd 10 | Si\n\
             layers:\n  odd: {material: {formula: Ni0, mass_density: 1.0}}",
        );

        let mut builder = ProjectBuilder::new(&base, &options);
        builder.add_file(&file).unwrap();
        let project = builder.build();

        let sld = project.parameters.get("odd SLD").unwrap();
        assert_eq!((sld.min, sld.value, sld.max), (-1e-6, 0.0, 1e-6));
        assert!(project.parameters.iter().all(|p| p.is_consistent()));
    }

    #[test]
    fn test_failed_import_returns_error() {
        let base = Project::new("Base");
        let options = ImportOptions::default();
        let file = parse_orso(&FILM.replace("0.01 0.9\n0.02 0.5\n", "0.01\n0.02\n")).unwrap();

        let mut builder = ProjectBuilder::new(&base, &options);
        let err = builder.add_file(&file).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA_SHAPE");
    }

    #[test]
    fn test_import_copies_file_with_provenance() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("ni_film.ort");
        fs::write(&source, FILM).unwrap();
        let folder = dir.path().join("project");

        let project = import_ort_to_project(
            &source,
            &Project::new("Base"),
            &folder,
            &ImportOptions::default(),
        )
        .unwrap();

        let provenance = project.provenance.unwrap();
        assert_eq!(provenance.original_filename, "ni_film.ort");
        assert_eq!(fs::read_to_string(&provenance.copied_to).unwrap(), FILM);
        assert!(provenance.copied_to.starts_with(fs::canonicalize(&folder).unwrap()));
        assert_eq!(provenance.sha256.len(), 64);
    }

    #[test]
    fn test_failed_import_leaves_no_copy() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.ort");
        fs::write(&source, FILM.replace("0.01 0.9\n0.02 0.5\n", "0.01\n0.02\n")).unwrap();
        let folder = dir.path().join("project");

        let err = import_ort_to_project(
            &source,
            &Project::new("Base"),
            &folder,
            &ImportOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA_SHAPE");
        assert!(!folder.join(DATA_FOLDER).join("broken.ort").exists());
    }

    #[test]
    fn test_import_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = import_ort_to_project(
            &dir.path().join("missing.ort"),
            &Project::new("Base"),
            dir.path(),
            &ImportOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }
}
