//! Normalize legacy pixel transforms.

use std::path::PathBuf;

use splice_common::config::EngineConfig;
use splice_project_model::geometry::Size2D;
use splice_project_model::ProjectDocument;

pub fn run(path: PathBuf, write: bool, config: &EngineConfig) -> anyhow::Result<()> {
    let mut project = ProjectDocument::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let fallback = Size2D::new(
        config.migration.fallback_width as f64,
        config.migration.fallback_height as f64,
    );
    let migrated = project.migrate_transforms(fallback);
    println!("Migrated {migrated} transform(s) in {}", path.display());

    if migrated == 0 {
        return Ok(());
    }
    if write {
        project
            .save(&path)
            .map_err(|e| anyhow::anyhow!("Failed to save project: {e}"))?;
        println!("  Saved.");
    } else {
        println!("  Dry run; pass --write to save.");
    }
    Ok(())
}
