//! Project folder checks and example project copying.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RascalError, Result};
use crate::state::project::{CONTROLS_FILE, PROJECT_FILE};

/// Extension of ORSO reflectivity files.
pub const ORT_EXTENSION: &str = "ort";

/// Check that `folder` can receive a new project.
pub fn verify_new_project_folder(folder: &Path) -> Result<()> {
    if folder.exists() && !folder.is_dir() {
        return Err(RascalError::InvalidSelection {
            reason: format!("{} is not a folder", folder.display()),
        });
    }
    if folder.join(PROJECT_FILE).exists() {
        return Err(RascalError::ProjectAlreadyExists {
            path: folder.to_path_buf(),
        });
    }
    Ok(())
}

/// Check that `folder` holds a saved project.
pub fn verify_existing_project_folder(folder: &Path) -> Result<()> {
    let complete = [PROJECT_FILE, CONTROLS_FILE]
        .iter()
        .all(|file| folder.join(file).is_file());
    if !complete {
        return Err(RascalError::ProjectNotFound {
            path: folder.to_path_buf(),
        });
    }
    Ok(())
}

/// Check that `path` is a readable `.ort` file.
pub fn verify_ort_file(path: &Path) -> Result<()> {
    let is_ort = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ORT_EXTENSION));
    if !is_ort {
        return Err(RascalError::InvalidSelection {
            reason: format!("{} is not an .ort file", path.display()),
        });
    }
    if !path.is_file() {
        return Err(RascalError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    fs::File::open(path).map_err(|e| RascalError::FileReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| RascalError::FileReadError {
            path: e.path().unwrap_or(from).to_path_buf(),
            source: e.into(),
        })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| RascalError::DirectoryCreateError {
                path: target.clone(),
                source: e,
            })?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| RascalError::FileWriteError {
                path: target.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Copy an example project to `temp_root` so the original stays untouched.
///
/// A file inside an example folder is copied together with its folder and
/// the path of the copied file is returned. Paths outside `examples_root`
/// are returned unchanged.
pub fn copy_example_project(
    load_path: &Path,
    examples_root: &Path,
    temp_root: &Path,
) -> Result<PathBuf> {
    let (Ok(load), Ok(examples)) = (fs::canonicalize(load_path), fs::canonicalize(examples_root))
    else {
        return Ok(load_path.to_path_buf());
    };
    if !load.starts_with(&examples) || load == examples {
        return Ok(load_path.to_path_buf());
    }

    let (source_dir, file_name) = if load.is_file() {
        match (load.parent(), load.file_name()) {
            (Some(parent), Some(name)) => (parent.to_path_buf(), Some(name.to_owned())),
            _ => return Ok(load_path.to_path_buf()),
        }
    } else {
        (load.clone(), None)
    };
    let Some(dir_name) = source_dir.file_name() else {
        return Ok(load_path.to_path_buf());
    };

    let dest = temp_root.join(dir_name);
    debug!(from = %source_dir.display(), to = %dest.display(), "copying example project");
    copy_tree(&source_dir, &dest)?;

    Ok(match file_name {
        Some(name) => dest.join(name),
        None => dest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_project(folder: &Path) {
        fs::create_dir_all(folder).unwrap();
        fs::write(folder.join(PROJECT_FILE), "{}").unwrap();
        fs::write(folder.join(CONTROLS_FILE), "{}").unwrap();
    }

    #[test]
    fn test_new_folder_checks() {
        let dir = TempDir::new().unwrap();
        assert!(verify_new_project_folder(&dir.path().join("fresh")).is_ok());
        assert!(verify_new_project_folder(dir.path()).is_ok());

        write_project(dir.path());
        let err = verify_new_project_folder(dir.path()).unwrap_err();
        assert_eq!(err.error_code(), "PROJECT_ALREADY_EXISTS");
    }

    #[test]
    fn test_existing_folder_needs_both_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(PROJECT_FILE), "{}").unwrap();
        let err = verify_existing_project_folder(dir.path()).unwrap_err();
        assert_eq!(err.error_code(), "PROJECT_NOT_FOUND");

        fs::write(dir.path().join(CONTROLS_FILE), "{}").unwrap();
        assert!(verify_existing_project_folder(dir.path()).is_ok());
    }

    #[test]
    fn test_verify_ort_file() {
        let dir = TempDir::new().unwrap();
        let ort = dir.path().join("data.ORT");
        fs::write(&ort, "# # ORSO").unwrap();
        assert!(verify_ort_file(&ort).is_ok());

        let txt = dir.path().join("data.txt");
        fs::write(&txt, "").unwrap();
        assert_eq!(verify_ort_file(&txt).unwrap_err().error_code(), "INVALID_SELECTION");
        assert_eq!(
            verify_ort_file(&dir.path().join("missing.ort")).unwrap_err().error_code(),
            "FILE_NOT_FOUND"
        );
    }

    #[test]
    fn test_copy_example_folder() {
        let dir = TempDir::new().unwrap();
        let examples = dir.path().join("examples");
        let temp = dir.path().join("temp");
        let example = examples.join("bilayer");
        write_project(&example);
        fs::create_dir_all(example.join("data")).unwrap();
        fs::write(example.join("data").join("d.ort"), "x").unwrap();

        let copied = copy_example_project(&example, &examples, &temp).unwrap();
        assert_eq!(copied, temp.join("bilayer"));
        assert!(copied.join(PROJECT_FILE).is_file());
        assert!(copied.join("data").join("d.ort").is_file());
    }

    #[test]
    fn test_copy_example_file_keeps_file_name() {
        let dir = TempDir::new().unwrap();
        let examples = dir.path().join("examples");
        let temp = dir.path().join("temp");
        write_project(&examples.join("bilayer"));

        let file = examples.join("bilayer").join(PROJECT_FILE);
        let copied = copy_example_project(&file, &examples, &temp).unwrap();
        assert_eq!(copied, temp.join("bilayer").join(PROJECT_FILE));
        assert!(copied.is_file());
    }

    #[test]
    fn test_non_example_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let examples = dir.path().join("examples");
        fs::create_dir_all(&examples).unwrap();
        let mine = dir.path().join("mine");
        write_project(&mine);

        let path = copy_example_project(&mine, &examples, &dir.path().join("temp")).unwrap();
        assert_eq!(path, mine);
    }
}
