//! CLI Command Implementations

use std::path::Path;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::Result;
use crate::state::folder::verify_new_project_folder;
use crate::state::project::Project;
use crate::state::session::ProjectSession;

/// Create a new project folder.
pub fn create(path: &Path, name: Option<&str>) -> Result<()> {
    info!("Creating new project at: {}", path.display());
    verify_new_project_folder(path)?;

    let default_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "New Project".to_string());
    let name = name.map(str::to_string).unwrap_or(default_name);

    let mut session = ProjectSession::create(&name, path)?;
    session.save(path)?;

    println!("Project '{}' created: {}", name, path.display());
    Ok(())
}

/// Create a project from an `.ort` file.
pub fn import(ort: &Path, folder: &Path, config: &AppConfig) -> Result<()> {
    info!("Importing {} into {}", ort.display(), folder.display());

    let session = ProjectSession::from_ort(ort, folder, &config.import)?;
    let project = &session.project;

    println!("Project '{}' created: {}", project.name, folder.display());
    println!("Imported contrasts: {}", project.contrasts.len());
    println!("Imported layers: {}", project.layers.len());
    println!("Imported parameters: {}", project.parameters.len());
    Ok(())
}

fn print_project(project: &Project) {
    println!("Project: {}", project.name);
    println!("Model: {} ({})", project.model, project.geometry);

    println!("\nParameters ({}):", project.parameters.len());
    for p in &project.parameters {
        let fit = if p.fit { " [fit]" } else { "" };
        println!("  {:<30} {:>12.5e} [{:.5e}, {:.5e}]{}", p.name, p.value, p.min, p.max, fit);
    }

    println!("\nBulk in: {}", project.bulk_in.names().join(", "));
    println!("Bulk out: {}", project.bulk_out.names().join(", "));

    println!("\nLayers ({}):", project.layers.len());
    for layer in &project.layers {
        println!("  {}", layer.name);
    }

    println!("\nContrasts ({}):", project.contrasts.len());
    for c in &project.contrasts {
        println!("  {} [{} -> {}] model: {}", c.name, c.bulk_in, c.bulk_out, c.model.join(" | "));
    }

    if let Some(provenance) = &project.provenance {
        println!(
            "\nImported from {} at {} (sha256 {})",
            provenance.original_filename, provenance.imported_at, provenance.sha256
        );
    }
}

/// Print a summary of a saved project.
pub fn show(path: &Path, config: &AppConfig) -> Result<()> {
    info!("Loading project: {}", path.display());

    let session = ProjectSession::load(path, config)?;
    print_project(&session.project);
    println!("\nProcedure: {}", session.controls.procedure);
    if session.is_example() {
        println!("(example project, copied to {})", session.save_path().display());
    }
    Ok(())
}

/// Validate a saved project; returns whether every reference resolves.
pub fn check(path: &Path, config: &AppConfig) -> Result<bool> {
    info!("Checking project: {}", path.display());

    let session = ProjectSession::load(path, config)?;
    let dangling = session.project.dangling_references();
    if dangling.is_empty() {
        println!("Project '{}' is consistent", session.project.name);
        return Ok(true);
    }

    for reference in &dangling {
        warn!("{}", reference);
        println!("  {}", reference);
    }
    println!("{} unresolved reference(s)", dangling.len());
    Ok(false)
}
