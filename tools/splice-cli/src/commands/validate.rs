//! Validate a Splice project document.

use std::path::PathBuf;

use splice_project_model::ProjectDocument;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let project = ProjectDocument::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    println!("  Name: {}", project.name);
    println!("  Version: {}", project.version);
    println!(
        "  Canvas: {}x{} @ {}fps",
        project.canvas.width, project.canvas.height, project.canvas.fps
    );
    println!("  Tracks: {}", project.tracks.len());

    let legacy = project
        .tracks
        .iter()
        .filter_map(|t| t.transform())
        .filter(|t| !t.is_normalized())
        .count();
    if legacy > 0 {
        println!("  Legacy transforms: {legacy} (run `splice migrate`)");
    }

    let report = project.validate();
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }

    if report.is_ok() {
        println!("\nProject is valid.");
        Ok(())
    } else {
        println!("\nValidation issues:");
        for error in &report.errors {
            println!("  - {error}");
        }
        Err(anyhow::anyhow!("{} error(s) found", report.errors.len()))
    }
}
