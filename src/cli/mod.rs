//! CLI Module
//!
//! Command-line interface for RasCAL-2 projects.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// RasCAL-2 - reflectometry project tools
#[derive(Parser, Debug)]
#[command(name = "rascal2-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new project folder
    #[command(name = "create")]
    Create {
        /// Folder for the new project
        path: PathBuf,

        /// Project name (defaults to the folder name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Create a project from an ORSO .ort file
    #[command(name = "import")]
    Import {
        /// The .ort file
        ort: PathBuf,

        /// Folder for the new project
        folder: PathBuf,
    },

    /// Print a summary of a project
    #[command(name = "show")]
    Show {
        /// Project folder
        path: PathBuf,
    },

    /// Validate a project and report unresolved references
    #[command(name = "check")]
    Check {
        /// Project folder
        path: PathBuf,
    },
}
