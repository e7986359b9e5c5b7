//! Project Session
//!
//! The project currently open: project, controls, where it is saved and its
//! undo history. Every edit goes through the session so it can be validated
//! and undone.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{AppConfig, ImportOptions};
use crate::error::{RascalError, Result};
use crate::importer::{import_ort_to_project, import_project_name};
use crate::state::controls::Controls;
use crate::state::folder::{
    copy_example_project, verify_existing_project_folder, verify_new_project_folder,
    verify_ort_file,
};
use crate::state::project::{
    BackgroundAction, Contrast, Project, DEFAULT_BACKGROUND, DEFAULT_RESOLUTION,
    DEFAULT_SCALEFACTOR, SIMULATION_DATA,
};
use crate::state::undo::{ActionType, Snapshot, UndoAction, UndoManager};

/// Placeholder contrast of a new project.
pub const DEFAULT_CONTRAST: &str = "Default Contrast";

/// Message shown when a project cannot be opened.
pub fn open_failure_message(folder: &Path, error: &dyn fmt::Display) -> String {
    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.display().to_string());
    let error = error.to_string().trim().replace('\n', "");
    format!("The Project ({name}) could not be opened because: {error}")
}

#[derive(Debug, Clone)]
pub struct ProjectSession {
    pub project: Project,
    pub controls: Controls,
    save_path: PathBuf,
    /// Where example projects are copied; set when loaded through the config.
    examples_temp_path: Option<PathBuf>,
    undo: UndoManager,
}

impl ProjectSession {
    /// A new project with the default entities and one placeholder contrast.
    pub fn create(name: &str, save_path: &Path) -> Result<Self> {
        let mut project = Project::new(name);
        project.contrasts.push(Contrast {
            name: DEFAULT_CONTRAST.to_string(),
            data: SIMULATION_DATA.to_string(),
            background: DEFAULT_BACKGROUND.to_string(),
            background_action: BackgroundAction::Add,
            bulk_in: "SLD Air".to_string(),
            bulk_out: "SLD D2O".to_string(),
            scalefactor: DEFAULT_SCALEFACTOR.to_string(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            resample: false,
            model: Vec::new(),
        })?;

        Ok(Self {
            project,
            controls: Controls::default(),
            save_path: save_path.to_path_buf(),
            examples_temp_path: None,
            undo: UndoManager::default(),
        })
    }

    /// Load a saved project; example projects are copied first.
    ///
    /// `path` is a project folder or a file inside one.
    pub fn load(path: &Path, config: &AppConfig) -> Result<Self> {
        let path = copy_example_project(path, &config.examples_path, &config.examples_temp_path)?;
        let folder = if path.is_file() {
            path.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            path
        };
        verify_existing_project_folder(&folder)?;

        let controls = Controls::load(&folder)?;
        let project = Project::load(&folder)?;
        info!(project = %project.name, folder = %folder.display(), "loaded project");

        Ok(Self {
            project,
            controls,
            save_path: folder,
            examples_temp_path: Some(config.examples_temp_path.clone()),
            undo: UndoManager::default(),
        })
    }

    /// Create a project in `folder` from an `.ort` file and save it there.
    pub fn from_ort(ort_path: &Path, folder: &Path, options: &ImportOptions) -> Result<Self> {
        verify_ort_file(ort_path)?;
        verify_new_project_folder(folder)?;

        let mut session = Self::create(&import_project_name(ort_path), folder)?;
        session.import_ort(ort_path, options)?;
        session.undo.clear();
        session.save(folder)?;
        Ok(session)
    }

    /// Import an `.ort` file into the current project, as one undoable action.
    pub fn import_ort(&mut self, ort_path: &Path, options: &ImportOptions) -> Result<()> {
        let imported = import_ort_to_project(ort_path, &self.project, &self.save_path, options)?;
        let description = format!(
            "Import {}",
            ort_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        self.apply(ActionType::Import, description, imported, self.controls.clone());
        Ok(())
    }

    /// Write `project.json` and `controls.json` into `folder`, which becomes the save path.
    pub fn save(&mut self, folder: &Path) -> Result<()> {
        fs::create_dir_all(folder).map_err(|e| RascalError::DirectoryCreateError {
            path: folder.to_path_buf(),
            source: e,
        })?;
        self.controls.save(folder)?;
        self.project.save(folder)?;
        self.save_path = folder.to_path_buf();
        self.undo.set_clean();
        info!(project = %self.project.name, folder = %folder.display(), "saved project");
        Ok(())
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// Whether this is a copy of a bundled example project.
    pub fn is_example(&self) -> bool {
        self.examples_temp_path
            .as_deref()
            .is_some_and(|temp| self.save_path.starts_with(temp))
    }

    /// Whether there are changes since the last save.
    pub fn is_modified(&self) -> bool {
        !self.undo.is_clean()
    }

    /// Replace top-level project fields, e.g. `{"layers": [...]}`.
    ///
    /// The updated project is validated before anything changes.
    pub fn edit_project(
        &mut self,
        updates: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let keys: Vec<String> = updates.keys().cloned().collect();
        let invalid = |reason: String| RascalError::InvalidSetting {
            setting: keys.join(", "),
            reason,
        };

        let mut fields = match serde_json::to_value(&self.project)? {
            serde_json::Value::Object(map) => map,
            _ => return Err(invalid("project is not an object".to_string())),
        };
        fields.extend(updates);
        let updated: Project = serde_json::from_value(serde_json::Value::Object(fields))
            .map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;

        let description = format!("Edit {}", keys.join(", "));
        self.apply(ActionType::EditProject, description, updated, self.controls.clone());
        Ok(())
    }

    /// Change one control setting, e.g. `("procedure", "simplex")`.
    pub fn edit_controls(&mut self, setting: &str, value: serde_json::Value) -> Result<()> {
        let updated = self.controls.with_setting(setting, value)?;
        self.apply(
            ActionType::EditControls,
            format!("Set {setting}"),
            self.project.clone(),
            updated,
        );
        Ok(())
    }

    fn apply(
        &mut self,
        action_type: ActionType,
        description: String,
        project: Project,
        controls: Controls,
    ) {
        let before = Snapshot::capture(&self.project, &self.controls);
        let after = Snapshot::capture(&project, &controls);
        self.project = project;
        self.controls = controls;
        self.undo
            .push(UndoAction::new(action_type, description, before, after));
    }

    pub fn undo(&mut self) -> Result<UndoAction> {
        self.undo.undo(&mut self.project, &mut self.controls)
    }

    pub fn redo(&mut self) -> Result<UndoAction> {
        self.undo.redo(&mut self.project, &mut self.controls)
    }

    pub fn history(&self) -> &UndoManager {
        &self.undo
    }
}
