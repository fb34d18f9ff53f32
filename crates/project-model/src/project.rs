//! Project document: canvas settings plus the track list.
//!
//! This is the JSON adapter the engine uses at the persistence boundary.
//! Richer project management (bins, history, autosave) lives outside.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::geometry::Size2D;
use crate::track::{Track, TrackKind};
use crate::transform::MigrationOutcome;

/// Top-level project file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    /// Schema version.
    pub version: String,

    /// Human-readable project name.
    pub name: String,

    /// Unique project identifier.
    pub id: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last modified timestamp (ISO 8601).
    pub modified_at: String,

    /// Composited surface settings.
    pub canvas: CanvasConfig,

    /// Timeline tracks.
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Composited surface settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Video width in source pixels.
    pub width: u32,
    /// Video height in source pixels.
    pub height: u32,
    /// Timeline frame rate.
    pub fps: f64,
}

impl CanvasConfig {
    pub fn video_size(&self) -> Size2D {
        Size2D::new(self.width as f64, self.height as f64)
    }
}

/// Findings from [`ProjectDocument::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Problems that make a track unusable.
    pub errors: Vec<String>,
    /// Problems the engine tolerates (for example overlapping segments,
    /// resolved last-wins at render time).
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ProjectDocument {
    /// Create an empty project.
    pub fn new(name: impl Into<String>, width: u32, height: u32, fps: f64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: "1.0".to_string(),
            name: name.into(),
            id: uuid_v4(),
            created_at: now.clone(),
            modified_at: now,
            canvas: CanvasConfig { width, height, fps },
            tracks: vec![],
        }
    }

    /// Load a project document from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref().to_path_buf();
        let json = std::fs::read_to_string(&path).map_err(|e| ProjectError::IoError {
            path: path.clone(),
            source: e,
        })?;
        let doc: ProjectDocument =
            serde_json::from_str(&json).map_err(|e| ProjectError::ParseError { path, source: e })?;
        if !(doc.canvas.fps.is_finite() && doc.canvas.fps > 0.0) {
            return Err(ProjectError::ValidationError {
                message: format!("canvas fps must be > 0, got {}", doc.canvas.fps),
            });
        }
        Ok(doc)
    }

    /// Save the document, stamping `modified_at`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ProjectError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        self.modified_at = chrono::Utc::now().to_rfc3339();
        let json = serde_json::to_string_pretty(self).map_err(|e| ProjectError::ParseError {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(|e| ProjectError::IoError { path, source: e })
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    /// Last frame covered by any track (exclusive).
    pub fn end_frame(&self) -> u64 {
        self.tracks
            .iter()
            .map(|t| t.base().end_frame)
            .max()
            .unwrap_or(0)
    }

    /// Check per-track invariants and same-row overlaps.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        let mut seen = std::collections::HashSet::new();
        for track in &self.tracks {
            if !seen.insert(track.id()) {
                report
                    .errors
                    .push(format!("duplicate track id '{}'", track.id()));
            }
            if let Err(e) = track.validate() {
                report.errors.push(format!("track '{}': {e}", track.id()));
            }
        }

        for kind in TrackKind::ALL {
            let mut lane: Vec<&Track> = self.tracks.iter().filter(|t| t.kind() == kind).collect();
            lane.sort_by_key(|t| (t.row(), t.base().start_frame));
            // Longest-reaching track seen so far on the current row.
            let mut reach: Option<&Track> = None;
            for track in lane {
                let prev = reach.filter(|r| r.row() == track.row());
                if let Some(prev) = prev {
                    if track.frames().overlaps(&prev.frames()) {
                        report.warnings.push(format!(
                            "{} tracks '{}' and '{}' overlap on row {}",
                            kind.as_str(),
                            prev.id(),
                            track.id(),
                            track.row()
                        ));
                    }
                }
                if prev.map_or(true, |p| track.base().end_frame > p.base().end_frame) {
                    reach = Some(track);
                }
            }
        }

        report
    }

    /// Run the one-time legacy transform migration on every overlay.
    /// Returns how many transforms were converted.
    pub fn migrate_transforms(&mut self, fallback: Size2D) -> usize {
        let video = self.canvas.video_size();
        let mut migrated = 0;
        for track in &mut self.tracks {
            let id = track.base().id.clone();
            if let Some(transform) = track.transform_mut() {
                match transform.migrate_legacy(video, fallback) {
                    MigrationOutcome::AlreadyNormalized => {}
                    outcome => {
                        tracing::info!(track = %id, ?outcome, "Migrated legacy transform");
                        migrated += 1;
                    }
                }
            }
        }
        migrated
    }
}

/// Errors that can occur when working with project documents.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}

/// Generate a simple UUID v4 without external dependency.
fn uuid_v4() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        (seed & 0xFFFFFFFF) as u32,
        ((seed >> 32) & 0xFFFF) as u16,
        ((seed >> 48) & 0x0FFF) as u16,
        (((seed >> 60) & 0x3F) | 0x80) as u16 | (((seed >> 66) & 0x3FF) as u16) << 6,
        (seed >> 76) & 0xFFFFFFFFFFFF,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transform;

    #[test]
    fn test_project_creation() {
        let project = ProjectDocument::new("Promo", 1920, 1080, 30.0);
        assert_eq!(project.name, "Promo");
        assert_eq!(project.canvas.width, 1920);
        assert_eq!(project.end_frame(), 0);
        assert!(project.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join("splice_test_project_doc");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("project.json");

        let mut project = ProjectDocument::new("Roundtrip", 1280, 720, 25.0);
        project.tracks.push(Track::video("v1", 0, 0, 50, "a.mp4"));
        project.tracks.push(Track::text("t1", 1, 10, 40, "Title"));
        project.save(&path).unwrap();

        let loaded = ProjectDocument::load(&path).unwrap();
        assert_eq!(loaded.name, "Roundtrip");
        assert_eq!(loaded.tracks.len(), 2);
        assert_eq!(loaded.end_frame(), 50);
        assert_eq!(loaded.track("t1").map(|t| t.kind()), Some(TrackKind::Text));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = ProjectDocument::load("/nonexistent/splice/project.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/splice/project.json"));
    }

    #[test]
    fn test_validate_reports_overlap_as_warning() {
        let mut project = ProjectDocument::new("Overlap", 640, 360, 30.0);
        project.tracks.push(Track::video("a", 0, 0, 100, "a.mp4"));
        project.tracks.push(Track::video("b", 0, 50, 150, "b.mp4"));
        project.tracks.push(Track::video("c", 1, 50, 150, "c.mp4"));

        let report = project.validate();
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("'a' and 'b'"));
    }

    #[test]
    fn test_validate_compares_against_longest_track_on_row() {
        let mut project = ProjectDocument::new("Nested", 640, 360, 30.0);
        project.tracks.push(Track::video("a", 0, 0, 100, "a.mp4"));
        project.tracks.push(Track::video("b", 0, 10, 20, "b.mp4"));
        project.tracks.push(Track::video("c", 0, 30, 40, "c.mp4"));

        let report = project.validate();
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("'a' and 'b'"));
        assert!(report.warnings[1].contains("'a' and 'c'"));
    }

    #[test]
    fn test_validate_reports_bad_tracks() {
        let mut project = ProjectDocument::new("Bad", 640, 360, 30.0);
        project.tracks.push(Track::video("a", 0, 10, 5, "a.mp4"));
        project.tracks.push(Track::text("a", 1, 0, 5, "dup"));

        let report = project.validate();
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_migrate_transforms_once() {
        let mut project = ProjectDocument::new("Legacy", 640, 360, 30.0);
        let mut legacy = Transform::at(120.0, 80.0);
        legacy.coordinate_space = crate::transform::CoordinateSpace::LegacyPixels;
        project
            .tracks
            .push(Track::text("t", 0, 0, 10, "hi").with_transform(legacy));

        let fallback = Size2D::new(1920.0, 1080.0);
        assert_eq!(project.migrate_transforms(fallback), 1);
        assert_eq!(project.migrate_transforms(fallback), 0);

        let t = project.track("t").and_then(|t| t.transform()).unwrap();
        assert!((t.x - 0.375).abs() < 1e-9);
    }
}
