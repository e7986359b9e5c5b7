//! End-to-end tests for ORSO import.

use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use rascal2::config::ImportOptions;
use rascal2::state::project::{Project, SUBSTRATE_ROUGHNESS};
use rascal2::state::session::ProjectSession;
use rascal2::{import_ort_to_project, RascalError};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn import(name: &str, base: &Project, folder: &Path) -> rascal2::Result<Project> {
    import_ort_to_project(&fixture(name), base, folder, &ImportOptions::default())
}

#[test]
fn test_two_dataset_bilayer() {
    let dir = TempDir::new().unwrap();
    let project =
        import("bilayer_two_contrasts.ort", &Project::new("Bilayer"), dir.path()).unwrap();

    assert_eq!(project.contrasts.names(), vec!["bilayer D2O", "bilayer H2O"]);
    assert_eq!(project.data.names(), vec!["bilayer D2O", "bilayer H2O"]);
    assert_eq!(project.layers.names(), vec!["L1", "L2"]);
    assert_eq!(
        project.parameters.names(),
        vec![
            SUBSTRATE_ROUGHNESS,
            "L1 Thickness",
            "L1 Roughness",
            "L1 SLD",
            "L2 Thickness",
            "L2 Roughness",
            "L2 SLD",
        ]
    );

    let thickness = project.parameters.get("L1 Thickness").unwrap();
    assert_relative_eq!(thickness.value, 50.0);
    assert_relative_eq!(thickness.min, 37.5);
    assert_relative_eq!(thickness.max, 62.5);
    assert!(thickness.fit);

    let roughness = project.parameters.get("L1 Roughness").unwrap();
    assert_relative_eq!(roughness.value, 4.0);

    let sld = project.parameters.get("L2 SLD").unwrap();
    assert_relative_eq!(sld.value, 3.5e-6, max_relative = 1e-12);
    assert_relative_eq!(sld.min, 2.625e-6, max_relative = 1e-12);
    assert_relative_eq!(sld.max, 4.375e-6, max_relative = 1e-12);

    // polystyrene
    let sld = project.parameters.get("L1 SLD").unwrap();
    assert_relative_eq!(sld.value, 1.41e-6, max_relative = 0.02);

    let substrate = project.parameters.get(SUBSTRATE_ROUGHNESS).unwrap();
    assert_eq!((substrate.min, substrate.max), (1.0, 5.0));
    assert_relative_eq!(substrate.value, 3.0);

    let first = project.contrasts.get("bilayer D2O").unwrap();
    assert_eq!(first.bulk_in, "SLD Air");
    assert_eq!(first.bulk_out, "SLD D2O");
    assert_eq!(first.model, vec!["L1", "L2"]);

    let second = project.contrasts.get("bilayer H2O").unwrap();
    assert_eq!(second.bulk_in, "SLD Air");
    assert_eq!(second.bulk_out, "SLD H2O");
    assert_eq!(second.model, vec!["L1", "L2"]);

    // SLD Air is untouched by a zero SLD, SLD D2O only widened
    let air = project.bulk_in.get("SLD Air").unwrap();
    assert_eq!((air.min, air.value, air.max), (0.0, 0.0, 0.0));
    let d2o = project.bulk_out.get("SLD D2O").unwrap();
    assert_eq!(d2o.min, 6.2e-6);
    assert!(d2o.max >= 6.35e-6);
    assert!(d2o.min <= d2o.value && d2o.value <= d2o.max);

    let data = project.data.get("bilayer H2O").unwrap();
    assert_eq!(data.data.len(), 4);
    assert_eq!(data.data_range, Some([0.012, 0.04]));
    assert_eq!(data.simulation_range, [0.012, 0.04]);

    // H2O has no SLD information in the second data set
    let dangling: Vec<String> = project
        .dangling_references()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        dangling,
        vec!["contrast 'bilayer H2O' refers to missing bulk out 'SLD H2O'"]
    );
}

#[test]
fn test_two_column_data_gets_errors() {
    let dir = TempDir::new().unwrap();
    let project = import("two_column_nm.ort", &Project::new("Ni"), dir.path()).unwrap();

    let data = project.data.get("Ni on Si").unwrap();
    let q: Vec<f64> = data.data.iter().map(|row| row[0]).collect();
    assert_relative_eq!(q[0], 0.01);
    assert_relative_eq!(q[2], 0.04);

    assert_relative_eq!(data.data[0][2], 0.045);
    assert_relative_eq!(data.data[1][2], 0.02);
    assert_eq!(data.data[2][2], 1e-12);
    assert!(data.data.iter().all(|row| row[2] > 0.0));

    let contrast = project.contrasts.get("Ni on Si").unwrap();
    assert_eq!(contrast.bulk_out, "SLD Si");
    let si = project.bulk_out.get("SLD Si").unwrap();
    assert!(!si.fit);
    assert!(si.min < si.value && si.value < si.max);
    assert!(project.dangling_references().is_empty());
}

#[test]
fn test_one_column_data_is_rejected() {
    let dir = TempDir::new().unwrap();
    let err = import("one_column.ort", &Project::new("Broken"), dir.path()).unwrap_err();
    match err {
        RascalError::InvalidDataShape { contrast, columns } => {
            assert_eq!(contrast, "broken");
            assert_eq!(columns, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_fresh_imports_are_identical() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let first =
        import("bilayer_two_contrasts.ort", &Project::new("Bilayer"), first_dir.path()).unwrap();
    let second =
        import("bilayer_two_contrasts.ort", &Project::new("Bilayer"), second_dir.path()).unwrap();

    assert_eq!(second.name, first.name);
    assert_eq!(second.parameters, first.parameters);
    assert_eq!(second.bulk_in, first.bulk_in);
    assert_eq!(second.bulk_out, first.bulk_out);
    assert_eq!(second.scalefactors, first.scalefactors);
    assert_eq!(second.background_parameters, first.background_parameters);
    assert_eq!(second.backgrounds, first.backgrounds);
    assert_eq!(second.resolution_parameters, first.resolution_parameters);
    assert_eq!(second.resolutions, first.resolutions);
    assert_eq!(second.layers, first.layers);
    assert_eq!(second.contrasts, first.contrasts);
    assert_eq!(second.data, first.data);

    let (a, b) = (first.provenance.unwrap(), second.provenance.unwrap());
    assert_eq!(a.sha256, b.sha256);
    assert_eq!(a.original_filename, b.original_filename);
}

#[test]
fn test_unmatched_contrast_uses_file_bulk_out() {
    let dir = TempDir::new().unwrap();
    let project =
        import("bilayer_default_bulk_out.ort", &Project::new("Bilayer"), dir.path()).unwrap();

    let second = project.contrasts.get("bilayer mixed contrast").unwrap();
    assert_eq!(second.bulk_in, "SLD Air");
    assert_eq!(second.bulk_out, "SLD D2O");
    assert_eq!(second.model, vec!["L1", "L2"]);
    assert!(project.dangling_references().is_empty());
}

#[test]
fn test_reimport_into_imported_project_is_stable() {
    let dir = TempDir::new().unwrap();
    let first =
        import("bilayer_two_contrasts.ort", &Project::new("Bilayer"), dir.path()).unwrap();
    let second = import("bilayer_two_contrasts.ort", &first, dir.path()).unwrap();

    assert_eq!(second.parameters, first.parameters);
    assert_eq!(second.bulk_in, first.bulk_in);
    assert_eq!(second.bulk_out, first.bulk_out);
    assert_eq!(second.layers, first.layers);
    assert_eq!(second.contrasts, first.contrasts);
    assert_eq!(second.data, first.data);
    assert_eq!(
        second.provenance.as_ref().map(|p| &p.sha256),
        first.provenance.as_ref().map(|p| &p.sha256)
    );
}

#[test]
fn test_import_keeps_copy_of_source() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("project");
    let project = import("two_column_nm.ort", &Project::new("Ni"), &folder).unwrap();

    let copied = folder.join("data").join("two_column_nm.ort");
    assert_eq!(
        fs::read(&copied).unwrap(),
        fs::read(fixture("two_column_nm.ort")).unwrap()
    );
    assert_eq!(
        project.provenance.unwrap().original_filename,
        "two_column_nm.ort"
    );
}

#[test]
fn test_session_from_ort_saves_project() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("bilayer");
    let source = dir.path().join("polymer_bilayer.ort");
    fs::copy(fixture("bilayer_two_contrasts.ort"), &source).unwrap();

    let session = ProjectSession::from_ort(&source, &folder, &ImportOptions::default()).unwrap();
    assert_eq!(session.project.name, "polymer bilayer");
    assert!(!session.is_modified());
    assert!(!session.history().can_undo());

    let saved = Project::load(&folder).unwrap();
    assert_eq!(saved.contrasts, session.project.contrasts);
    assert!(folder.join("controls.json").is_file());
}

#[test]
fn test_import_into_session_is_undoable() {
    let dir = TempDir::new().unwrap();
    let mut session = ProjectSession::create("Manual", dir.path()).unwrap();
    let before = session.project.clone();

    session
        .import_ort(&fixture("two_column_nm.ort"), &ImportOptions::default())
        .unwrap();
    assert_eq!(session.project.contrasts.names(), vec!["Ni on Si"]);
    assert!(session.is_modified());

    session.undo().unwrap();
    assert_eq!(session.project, before);
}
