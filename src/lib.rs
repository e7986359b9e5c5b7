//! RasCAL-2 - reflectometry analysis core
//!
//! Projects, fit controls and ORSO import for the RasCAL-2 application.
//!
//! # Architecture
//!
//! - [`orso`]: reads `.ort` files and resolves their sample models into layers
//! - [`importer`]: turns an ORSO file into project layers, parameters and contrasts
//! - [`state`]: the project schema, controls, undo history and the open session

pub mod cli;
pub mod config;
pub mod error;
pub mod importer;
pub mod orso;
pub mod runner;
pub mod state;

pub use error::{RascalError, Result};
pub use importer::{import_ort_to_project, import_project_name, ProjectBuilder};
pub use state::project::Project;
