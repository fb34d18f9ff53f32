//! Write the per-frame export plan.

use std::io::Write;
use std::path::PathBuf;

use splice_project_model::track::FrameRange;
use splice_project_model::ProjectDocument;
use splice_render_engine::export::{ExportPlan, ExportProgress};

pub fn run(
    path: PathBuf,
    output: Option<PathBuf>,
    start: Option<u64>,
    end: Option<u64>,
) -> anyhow::Result<()> {
    println!("Planning export for: {}", path.display());

    let project = ProjectDocument::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let range = match (start, end) {
        (None, None) => None,
        (start, end) => Some(FrameRange::new(
            start.unwrap_or(0),
            end.unwrap_or_else(|| project.end_frame()),
        )),
    };
    let plan = ExportPlan::build(&project.tracks, project.canvas, range)?;
    let output_path = output.unwrap_or_else(|| path.with_extension("plan.jsonl"));

    println!("  Output: {}", output_path.display());
    println!(
        "  Frames: {}..{} ({})",
        plan.range().start,
        plan.range().end,
        plan.len()
    );

    let progress_cb: Box<dyn Fn(ExportProgress) + Send> = Box::new(|p| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames)  ",
            p.progress * 100.0,
            p.frames_written,
            p.total_frames,
        );
        std::io::stdout().flush().ok();
    });

    match plan.write_to_file(&output_path, Some(progress_cb)) {
        Ok(frames) => {
            println!("\nExport plan complete: {frames} frames");
            Ok(())
        }
        Err(e) => {
            println!("\nExport plan failed: {e}");
            Err(e.into())
        }
    }
}
