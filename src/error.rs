//! Error handling for RasCAL-2
//!
//! Fatal errors surface as [`RascalError`]. Failures that the import pipeline
//! recovers from locally (model resolution, SLD lookup) have their own typed
//! errors in the `orso` module and never reach this type.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for RasCAL-2 operations
pub type Result<T> = std::result::Result<T, RascalError>;

/// Main error type for RasCAL-2 operations
#[derive(Error, Debug)]
pub enum RascalError {
    // File Errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read file: {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}: {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory creation failed: {path}: {source}")]
    DirectoryCreateError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ORSO Errors
    #[error("Invalid ORSO file: {reason}")]
    InvalidOrso { reason: String },

    #[error("Invalid ORSO header for data set {dataset}: {source}")]
    InvalidOrsoHeader {
        dataset: usize,
        #[source]
        source: serde_yml::Error,
    },

    #[error("Data for contrast '{contrast}' must have at least 2 columns (Q, R), found {columns}")]
    InvalidDataShape { contrast: String, columns: usize },

    #[error("Cannot convert {quantity} of '{context}' to {target}: unsupported unit '{unit}'")]
    UnitConversion {
        quantity: &'static str,
        context: String,
        unit: String,
        target: &'static str,
    },

    // Project Errors
    #[error("Project already exists: {path}")]
    ProjectAlreadyExists { path: PathBuf },

    #[error("Project not found: {path}")]
    ProjectNotFound { path: PathBuf },

    #[error("The {file} file for this project is not valid: {reason}")]
    InvalidProjectFile { file: &'static str, reason: String },

    #[error("Invalid selection: {reason}")]
    InvalidSelection { reason: String },

    #[error("Duplicate name '{name}' in {collection}")]
    DuplicateName {
        collection: &'static str,
        name: String,
    },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Invalid setting '{setting}': {reason}")]
    InvalidSetting { setting: String, reason: String },

    // Undo/Redo Errors
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    // Serialization Errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RascalError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            RascalError::FileNotFound { .. } => "FILE_NOT_FOUND",
            RascalError::FileReadError { .. } => "FILE_READ_ERROR",
            RascalError::FileWriteError { .. } => "FILE_WRITE_ERROR",
            RascalError::DirectoryCreateError { .. } => "DIRECTORY_CREATE_ERROR",
            RascalError::InvalidOrso { .. } => "INVALID_ORSO",
            RascalError::InvalidOrsoHeader { .. } => "INVALID_ORSO_HEADER",
            RascalError::InvalidDataShape { .. } => "INVALID_DATA_SHAPE",
            RascalError::UnitConversion { .. } => "UNIT_CONVERSION",
            RascalError::ProjectAlreadyExists { .. } => "PROJECT_ALREADY_EXISTS",
            RascalError::ProjectNotFound { .. } => "PROJECT_NOT_FOUND",
            RascalError::InvalidProjectFile { .. } => "INVALID_PROJECT_FILE",
            RascalError::InvalidSelection { .. } => "INVALID_SELECTION",
            RascalError::DuplicateName { .. } => "DUPLICATE_NAME",
            RascalError::InvalidParameter { .. } => "INVALID_PARAMETER",
            RascalError::InvalidSetting { .. } => "INVALID_SETTING",
            RascalError::NothingToUndo => "NOTHING_TO_UNDO",
            RascalError::NothingToRedo => "NOTHING_TO_REDO",
            RascalError::Json(_) => "JSON_ERROR",
            RascalError::Io(_) => "IO_ERROR",
        }
    }

    /// Returns a user-friendly recovery suggestion.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            RascalError::FileNotFound { .. } => Some("Check the file path and try again."),
            RascalError::InvalidOrso { .. } | RascalError::InvalidOrsoHeader { .. } => {
                Some("Check that the file is a valid ORSO .ort reflectivity file.")
            }
            RascalError::InvalidDataShape { .. } => {
                Some("Each data row needs at least Q and R columns.")
            }
            RascalError::UnitConversion { .. } => {
                Some("Use a length unit such as angstrom, nm or um in the sample model.")
            }
            RascalError::ProjectAlreadyExists { .. } => {
                Some("Choose an empty folder for the new project.")
            }
            RascalError::ProjectNotFound { .. } => {
                Some("Select a folder containing project.json and controls.json.")
            }
            RascalError::NothingToUndo => Some("There are no actions to undo."),
            RascalError::NothingToRedo => Some("There are no undone actions to redo."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = RascalError::InvalidDataShape {
            contrast: "Contrast 1".to_string(),
            columns: 1,
        };
        assert_eq!(err.error_code(), "INVALID_DATA_SHAPE");
        assert!(err.to_string().contains("Contrast 1"));
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = RascalError::FileNotFound {
            path: PathBuf::from("missing.ort"),
        };
        assert!(err.recovery_suggestion().is_some());
        assert!(RascalError::InvalidParameter {
            name: "x".to_string(),
            reason: "y".to_string()
        }
        .recovery_suggestion()
        .is_none());
    }
}
