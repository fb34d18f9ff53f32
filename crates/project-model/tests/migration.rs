use proptest::prelude::*;

use splice_project_model::geometry::Size2D;
use splice_project_model::track::Track;
use splice_project_model::transform::{CoordinateSpace, MigrationOutcome, Transform};
use splice_project_model::ProjectDocument;

const FALLBACK: Size2D = Size2D {
    width: 1920.0,
    height: 1080.0,
};

#[test]
fn legacy_offsets_normalize_against_video_width() {
    let mut t: Transform = serde_json::from_str(r#"{"x":120.0,"y":80.0}"#).unwrap();
    let video = Size2D::new(640.0, 360.0);

    let first = t.read_normalized(video, FALLBACK);
    assert!((first.x - 0.375).abs() < 1e-12);
    assert!((first.y - 80.0 / 180.0).abs() < 1e-12);

    let second = t.read_normalized(video, FALLBACK);
    assert_eq!(first, second);
}

#[test]
fn document_migration_survives_save_and_load() {
    let dir = std::env::temp_dir().join(format!("splice-migration-{}", std::process::id()));
    let path = dir.join("project.json");

    let mut doc = ProjectDocument::new("legacy", 640, 360, 30.0);
    let mut text = Track::text("title", 1, 0, 90, "Hello");
    *text.transform_mut().unwrap() = Transform {
        coordinate_space: CoordinateSpace::LegacyPixels,
        ..Transform::at(120.0, 80.0)
    };
    doc.tracks.push(text);
    doc.tracks.push(Track::video("clip", 0, 0, 90, "clip.mp4"));

    assert_eq!(doc.migrate_transforms(FALLBACK), 1);
    assert_eq!(doc.migrate_transforms(FALLBACK), 0);
    doc.save(&path).unwrap();

    let loaded = ProjectDocument::load(&path).unwrap();
    let t = loaded.track("title").unwrap().transform().unwrap();
    assert!(t.is_normalized());
    assert!((t.x - 0.375).abs() < 1e-12);
    assert_eq!(loaded.end_frame(), 90);
    assert!(loaded.validate().is_ok());

    std::fs::remove_dir_all(&dir).ok();
}

proptest! {
    #[test]
    fn migration_runs_exactly_once(
        x in -4000.0f64..4000.0,
        y in -4000.0f64..4000.0,
        width in prop_oneof![Just(0.0), 1.0f64..4096.0],
        height in prop_oneof![Just(0.0), 1.0f64..4096.0],
    ) {
        let video = Size2D::new(width, height);
        let mut t = Transform {
            coordinate_space: CoordinateSpace::LegacyPixels,
            ..Transform::at(x, y)
        };

        let outcome = t.migrate_legacy(video, FALLBACK);
        prop_assert_ne!(outcome, MigrationOutcome::AlreadyNormalized);
        prop_assert!(t.is_normalized());
        prop_assert!(t.x.is_finite() && t.y.is_finite());

        let migrated = t;
        prop_assert_eq!(t.migrate_legacy(video, FALLBACK), MigrationOutcome::AlreadyNormalized);
        prop_assert_eq!(t, migrated);
    }
}
