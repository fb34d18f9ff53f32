//! Show project information.

use std::path::PathBuf;

use splice_project_model::track::{Track, TrackKind};
use splice_project_model::ProjectDocument;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let project = ProjectDocument::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    println!("Project: {}", project.name);
    println!("  ID: {}", project.id);
    println!("  Version: {}", project.version);
    println!("  Created: {}", project.created_at);
    println!("  Modified: {}", project.modified_at);
    println!();

    let canvas = &project.canvas;
    let end = project.end_frame();
    println!("Canvas:");
    println!(
        "  Resolution: {}x{} @ {}fps",
        canvas.width, canvas.height, canvas.fps
    );
    println!(
        "  Duration: {end} frames ({:.2}s)",
        end as f64 / canvas.fps
    );
    println!();

    println!("Tracks:");
    for kind in TrackKind::ALL {
        let count = project.tracks.iter().filter(|t| t.kind() == kind).count();
        if count > 0 {
            println!("  {}: {count}", kind.as_str());
        }
    }
    println!();

    let mut tracks: Vec<&Track> = project.tracks.iter().collect();
    tracks.sort_by_key(|t| (t.z_index(), t.base().start_frame));
    for track in tracks {
        let base = track.base();
        let mut flags = Vec::new();
        if !base.visible {
            flags.push("hidden");
        }
        if base.locked {
            flags.push("locked");
        }
        if base.muted {
            flags.push("muted");
        }
        let source = match track {
            Track::Video(v) => v.media.source_key().to_string(),
            Track::Audio(a) => a.media.source_key().to_string(),
            Track::Image(i) => i.source.clone(),
            Track::Text(t) => format!("\"{}\"", t.content),
            Track::Subtitle(s) => format!("\"{}\"", s.text),
        };
        println!(
            "  [{}:{}] {} {}..{} {}{}",
            track.kind().as_str(),
            track.row(),
            track.id(),
            base.start_frame,
            base.end_frame,
            source,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            }
        );
    }

    Ok(())
}
