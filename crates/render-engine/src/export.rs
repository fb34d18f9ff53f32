//! Export plan: what an external encoder needs per frame.
//!
//! The plan applies the live compositor's selection, ordering, overlap,
//! subtitle merging and audio rules, but without media elements: every
//! source is assumed decodable. Frames are computed on demand and can be
//! streamed as JSONL, one frame per line.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use splice_common::clock::frames_to_secs;
use splice_common::error::{SpliceError, SpliceResult};
use splice_playback::{LaneId, VirtualTimeline};
use splice_project_model::project::CanvasConfig;
use splice_project_model::track::{FrameIndex, FrameRange, Track, TrackId, TrackKind};
use splice_project_model::transform::Transform;

use crate::compositor::{
    active_tracks, compose_layers, elect_audio, owns_lane, AudioElection, Layer, SubtitleCue,
};

/// Progress callback for plan writing.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames written so far.
    pub frames_written: u64,

    /// Total frames in the range.
    pub total_frames: u64,

    pub stage: ExportStage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Writing,
    Complete,
}

/// What a layer draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportSource {
    /// Time-based media at `source_time` seconds into the source.
    Media {
        source_key: String,
        source_time: f64,
    },
    Image {
        source: String,
    },
    Text {
        content: String,
        font_size: f64,
    },
    /// Every active subtitle, under one shared transform.
    Subtitles {
        cues: Vec<SubtitleCue>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportLayer {
    pub track_id: TrackId,
    pub kind: TrackKind,
    pub z_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    pub source: ExportSource,
}

/// Bottom-to-top layers and the elected audio source for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportFrame {
    pub frame: FrameIndex,
    pub time_secs: f64,
    pub layers: Vec<ExportLayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioElection>,
}

#[derive(Debug, Clone)]
pub struct ExportPlan {
    tracks: Vec<Track>,
    canvas: CanvasConfig,
    range: FrameRange,
    timeline: VirtualTimeline,
}

impl ExportPlan {
    /// Plan `range`, or the whole timeline when `None`.
    pub fn build(
        tracks: &[Track],
        canvas: CanvasConfig,
        range: Option<FrameRange>,
    ) -> SpliceResult<Self> {
        if !(canvas.fps.is_finite() && canvas.fps > 0.0) {
            return Err(SpliceError::config(format!(
                "fps must be > 0, got {}",
                canvas.fps
            )));
        }
        let end = tracks.iter().map(|t| t.base().end_frame).max().unwrap_or(0);
        let range = range.unwrap_or(FrameRange::new(0, end));
        if range.start > range.end {
            return Err(SpliceError::config(format!(
                "export range {}..{} is reversed",
                range.start, range.end
            )));
        }

        tracing::info!(
            start = range.start,
            end = range.end,
            tracks = tracks.len(),
            "Built export plan"
        );
        Ok(Self {
            tracks: tracks.to_vec(),
            canvas,
            range,
            timeline: VirtualTimeline::build(tracks),
        })
    }

    pub fn range(&self) -> FrameRange {
        self.range
    }

    pub fn len(&self) -> u64 {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Plan for one frame; `None` outside the range.
    pub fn frame_at(&self, frame: FrameIndex) -> Option<ExportFrame> {
        if !self.range.contains(frame) {
            return None;
        }

        let active: Vec<&Track> = active_tracks(&self.tracks, frame)
            .into_iter()
            .filter(|t| owns_lane(&self.timeline, t, frame))
            .collect();
        let audio = elect_audio(&active, |_| true);

        let layers = compose_layers(&active)
            .into_iter()
            .filter_map(|layer| match layer {
                Layer::Track(track) => self.layer(track, frame),
                Layer::Subtitles {
                    anchor,
                    z_index,
                    cues,
                } => Some(ExportLayer {
                    track_id: anchor.id().to_string(),
                    kind: TrackKind::Subtitle,
                    z_index,
                    transform: anchor.transform().copied(),
                    source: ExportSource::Subtitles { cues },
                }),
            })
            .collect();

        Some(ExportFrame {
            frame,
            time_secs: frames_to_secs(frame as f64, self.canvas.fps),
            layers,
            audio,
        })
    }

    /// Every frame in the range, in order.
    pub fn frames(&self) -> impl Iterator<Item = ExportFrame> + '_ {
        (self.range.start..self.range.end).filter_map(|f| self.frame_at(f))
    }

    /// Stream the plan as JSONL.
    pub fn write_jsonl<W: Write>(
        &self,
        mut out: W,
        progress: Option<ProgressCallback>,
    ) -> SpliceResult<u64> {
        let total = self.len();
        let report = |written: u64, stage: ExportStage| {
            if let Some(cb) = &progress {
                cb(ExportProgress {
                    progress: if total == 0 {
                        1.0
                    } else {
                        written as f64 / total as f64
                    },
                    frames_written: written,
                    total_frames: total,
                    stage,
                });
            }
        };

        report(0, ExportStage::Preparing);
        let mut written = 0;
        for frame in self.frames() {
            serde_json::to_writer(&mut out, &frame)?;
            out.write_all(b"\n")?;
            written += 1;
            if written % 30 == 0 {
                report(written, ExportStage::Writing);
            }
        }
        out.flush()?;
        report(written, ExportStage::Complete);
        Ok(written)
    }

    pub fn write_to_file(
        &self,
        path: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> SpliceResult<u64> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(path)?;
        let written = self.write_jsonl(std::io::BufWriter::new(file), progress)?;
        tracing::info!(path = %path.display(), frames = written, "Wrote export plan");
        Ok(written)
    }

    fn layer(&self, track: &Track, frame: FrameIndex) -> Option<ExportLayer> {
        let source = match track {
            Track::Video(_) | Track::Audio(_) => {
                let segment = self.timeline.segment_at(&LaneId::of(track), frame)?;
                ExportSource::Media {
                    source_key: segment.source_key.clone(),
                    source_time: segment.source_time_at(frame, self.canvas.fps),
                }
            }
            Track::Image(image) => ExportSource::Image {
                source: image.source.clone(),
            },
            Track::Text(text) => ExportSource::Text {
                content: text.content.clone(),
                font_size: text.font_size,
            },
            Track::Subtitle(_) => return None,
        };
        Some(ExportLayer {
            track_id: track.id().to_string(),
            kind: track.kind(),
            z_index: track.z_index(),
            transform: track.transform().copied(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::AudioOrigin;
    use std::sync::{Arc, Mutex};

    const CANVAS: CanvasConfig = CanvasConfig {
        width: 1280,
        height: 720,
        fps: 30.0,
    };

    fn tracks() -> Vec<Track> {
        let mut video = Track::video("v", 0, 0, 60, "clip.mp4");
        if let Track::Video(v) = &mut video {
            v.media.source_start_time = 2.0;
        }
        vec![
            video,
            Track::text("title", 1, 30, 90, "Hello"),
            Track::audio("music", 0, 0, 90, "song.mp3"),
        ]
    }

    #[test]
    fn test_frame_layers_are_ordered() {
        let plan = ExportPlan::build(&tracks(), CANVAS, None).unwrap();
        assert_eq!(plan.len(), 90);

        let frame = plan.frame_at(45).unwrap();
        let ids: Vec<&str> = frame.layers.iter().map(|l| l.track_id.as_str()).collect();
        assert_eq!(ids, vec!["music", "v", "title"]);
        assert!((frame.time_secs - 1.5).abs() < 1e-9);

        let audio = frame.audio.unwrap();
        assert_eq!(audio.track_id, "music");
        assert_eq!(audio.origin, AudioOrigin::Independent);
    }

    #[test]
    fn test_media_source_time() {
        let plan = ExportPlan::build(&tracks(), CANVAS, None).unwrap();
        let frame = plan.frame_at(15).unwrap();
        let video = frame.layers.iter().find(|l| l.track_id == "v").unwrap();
        assert_eq!(
            video.source,
            ExportSource::Media {
                source_key: "clip.mp4".into(),
                source_time: 2.5,
            }
        );
    }

    #[test]
    fn test_range_limits_frames() {
        let plan = ExportPlan::build(&tracks(), CANVAS, Some(FrameRange::new(10, 20))).unwrap();
        assert!(plan.frame_at(9).is_none());
        assert!(plan.frame_at(20).is_none());
        let frames: Vec<u64> = plan.frames().map(|f| f.frame).collect();
        assert_eq!(frames, (10..20).collect::<Vec<_>>());
        assert!(ExportPlan::build(&tracks(), CANVAS, Some(FrameRange::new(20, 10))).is_err());
    }

    #[test]
    fn test_overlap_loser_is_not_exported() {
        let tracks = vec![
            Track::video("early", 0, 0, 60, "a.mp4"),
            Track::video("late", 0, 30, 90, "b.mp4"),
        ];
        let plan = ExportPlan::build(&tracks, CANVAS, None).unwrap();
        let frame = plan.frame_at(40).unwrap();
        let ids: Vec<&str> = frame.layers.iter().map(|l| l.track_id.as_str()).collect();
        assert_eq!(ids, vec!["late"]);
    }

    #[test]
    fn test_subtitles_merge_like_live_playback() {
        let tracks = vec![
            Track::subtitle("sub-lo", 0, 0, 30, "first").with_transform(Transform::at(0.0, 0.8)),
            Track::text("title", 1, 0, 30, "Title"),
            Track::subtitle("sub-hi", 2, 0, 30, "second").with_transform(Transform::at(0.0, 0.5)),
        ];
        let plan = ExportPlan::build(&tracks, CANVAS, None).unwrap();
        let frame = plan.frame_at(0).unwrap();
        assert_eq!(frame.layers.len(), 2);

        let merged = &frame.layers[1];
        assert_eq!(merged.track_id, "sub-lo");
        assert_eq!(merged.z_index, tracks[2].z_index());
        assert_eq!(merged.transform.unwrap().y, 0.8);
        let ExportSource::Subtitles { cues } = &merged.source else {
            panic!("expected merged subtitles");
        };
        let texts: Vec<&str> = cues.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_write_jsonl_reports_progress() {
        let plan = ExportPlan::build(&tracks(), CANVAS, None).unwrap();
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let mut out = Vec::new();
        let written = plan
            .write_jsonl(
                &mut out,
                Some(Box::new(move |p: ExportProgress| sink.lock().unwrap().push(p))),
            )
            .unwrap();
        assert_eq!(written, 90);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 90);
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["frame"], 0);
        assert_eq!(first["layers"][1]["source"]["type"], "media");

        let reports = reports.lock().unwrap();
        assert_eq!(reports.first().unwrap().stage, ExportStage::Preparing);
        let last = reports.last().unwrap();
        assert_eq!(last.stage, ExportStage::Complete);
        assert_eq!(last.progress, 1.0);
    }
}
