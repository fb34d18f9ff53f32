//! Replay a gesture script against an overlay track.

use std::path::PathBuf;

use splice_common::config::EngineConfig;
use splice_playback::sim::SimMediaBackend;
use splice_project_model::event::parse_gesture_script;
use splice_project_model::geometry::Size2D;
use splice_project_model::ProjectDocument;
use splice_render_engine::TimelineEngine;
use splice_transform::{GestureKind, GestureUpdate};

pub fn run(
    path: PathBuf,
    track_id: String,
    script: PathBuf,
    kind: GestureKind,
    render_scale: f64,
    write: bool,
    config: EngineConfig,
) -> anyhow::Result<()> {
    let mut project = ProjectDocument::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let content = std::fs::read_to_string(&script)
        .map_err(|_| anyhow::anyhow!("Gesture script not found: {}", script.display()))?;
    let inputs = parse_gesture_script(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse gesture script: {e}"))?;
    println!(
        "Replaying {} input(s) as {kind:?} on '{track_id}'",
        inputs.len()
    );

    let backend = SimMediaBackend::new();
    let mut engine = TimelineEngine::from_project(
        config,
        &project,
        Box::new(backend.clone()),
        Box::new(backend.resolver()),
    )?;

    let video = project.canvas.video_size();
    let surface = Size2D::new(video.width * render_scale, video.height * render_scale);
    let ctx = engine.gesture_context(&track_id, render_scale, surface)?;

    let mut committed = false;
    for (i, input) in inputs.iter().enumerate() {
        match engine.handle_gesture_input(&track_id, kind, input, &ctx)? {
            GestureUpdate::Activated(t) => {
                println!("  [{i}] activated at ({:.4}, {:.4})", t.x, t.y);
            }
            GestureUpdate::Committed(_) => committed = true,
            GestureUpdate::Cancelled(_) => println!("  [{i}] cancelled; transform unchanged"),
            GestureUpdate::Released => println!("  [{i}] released before activation"),
            GestureUpdate::Preview(_) | GestureUpdate::None => {}
        }
    }
    if engine.gesture_track().is_some() {
        println!("  Script ended mid-gesture; cancelling.");
        engine.cancel_gesture();
    }

    if !committed {
        println!("No transform committed.");
        return Ok(());
    }

    let transform = engine
        .track(&track_id)
        .and_then(|t| t.transform())
        .ok_or_else(|| anyhow::anyhow!("Track '{track_id}' has no transform"))?;
    println!("{}", serde_json::to_string_pretty(transform)?);

    if write {
        project.tracks = engine.tracks().to_vec();
        project
            .save(&path)
            .map_err(|e| anyhow::anyhow!("Failed to save project: {e}"))?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}
