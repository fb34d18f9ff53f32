//! Timeline tracks.
//!
//! A track is a tagged union over the five kinds the compositor knows.
//! Every kind shares a [`TrackBase`] (id, frame range, row, flags); media
//! kinds add a [`MediaSource`] and overlay kinds add a [`Transform`].
//! Callers narrow by tag instead of probing optional fields.

use serde::{Deserialize, Serialize};

use crate::transform::Transform;

/// Stable track identifier.
pub type TrackId = String;

/// Frame index on the shared timeline axis.
pub type FrameIndex = u64;

/// Half-open frame interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: FrameIndex,
    pub end: FrameIndex,
}

impl FrameRange {
    pub fn new(start: FrameIndex, end: FrameIndex) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, frame: FrameIndex) -> bool {
        frame >= self.start && frame < self.end
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &FrameRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Track kind, also the compositing type priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
    Image,
    Text,
    Subtitle,
}

impl TrackKind {
    pub const ALL: [TrackKind; 5] = [
        TrackKind::Video,
        TrackKind::Audio,
        TrackKind::Image,
        TrackKind::Text,
        TrackKind::Subtitle,
    ];

    /// Stacking priority within a row. Video sits beneath image, text, and
    /// subtitle overlays; audio has no visual layer and sorts first.
    pub fn type_priority(self) -> u8 {
        match self {
            TrackKind::Audio => 0,
            TrackKind::Video => 1,
            TrackKind::Image => 2,
            TrackKind::Text => 3,
            TrackKind::Subtitle => 4,
        }
    }

    /// Decoded from a time-based media source.
    pub fn is_media(self) -> bool {
        matches!(self, TrackKind::Video | TrackKind::Audio)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
            TrackKind::Image => "image",
            TrackKind::Text => "text",
            TrackKind::Subtitle => "subtitle",
        }
    }
}

/// Fields shared by every track kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackBase {
    pub id: TrackId,
    pub start_frame: FrameIndex,
    pub end_frame: FrameIndex,
    #[serde(default)]
    pub track_row_index: usize,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub muted: bool,
}

fn default_true() -> bool {
    true
}

/// Time-based media reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Source id or path, resolved to a playable URI by the host.
    pub source: String,
    /// Lightweight proxy decoded instead of `source` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Offset into the source, in seconds, at the track's start frame.
    #[serde(default)]
    pub source_start_time: f64,
    /// Playable source duration in seconds.
    #[serde(default)]
    pub duration: f64,
}

impl MediaSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            preview_url: None,
            source_start_time: 0.0,
            duration: 0.0,
        }
    }

    /// Key identifying what a decode element must load. Two segments with
    /// the same key can share one element.
    pub fn source_key(&self) -> &str {
        self.preview_url.as_deref().unwrap_or(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTrack {
    #[serde(flatten)]
    pub base: TrackBase,
    pub media: MediaSource,
    #[serde(default)]
    pub transform: Transform,
    /// Embedded audio participates in audio election.
    #[serde(default = "default_true")]
    pub linked_audio: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    #[serde(flatten)]
    pub base: TrackBase,
    pub media: MediaSource,
    #[serde(default = "default_volume")]
    pub volume: f64,
}

fn default_volume() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTrack {
    #[serde(flatten)]
    pub base: TrackBase,
    pub source: String,
    #[serde(default)]
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextTrack {
    #[serde(flatten)]
    pub base: TrackBase,
    pub content: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default)]
    pub transform: Transform,
}

fn default_font_size() -> f64 {
    48.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    #[serde(flatten)]
    pub base: TrackBase,
    pub text: String,
    #[serde(default)]
    pub transform: Transform,
}

/// A timeline track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Track {
    Video(VideoTrack),
    Audio(AudioTrack),
    Image(ImageTrack),
    Text(TextTrack),
    Subtitle(SubtitleTrack),
}

/// Z-index slots reserved per row so type priority never crosses rows.
const Z_SLOTS_PER_ROW: i64 = 8;

impl Track {
    pub fn video(
        id: impl Into<TrackId>,
        row: usize,
        start: FrameIndex,
        end: FrameIndex,
        source: impl Into<String>,
    ) -> Self {
        Track::Video(VideoTrack {
            base: TrackBase::new(id, row, start, end),
            media: MediaSource::new(source),
            transform: Transform::default(),
            linked_audio: true,
        })
    }

    pub fn audio(
        id: impl Into<TrackId>,
        row: usize,
        start: FrameIndex,
        end: FrameIndex,
        source: impl Into<String>,
    ) -> Self {
        Track::Audio(AudioTrack {
            base: TrackBase::new(id, row, start, end),
            media: MediaSource::new(source),
            volume: 1.0,
        })
    }

    pub fn image(
        id: impl Into<TrackId>,
        row: usize,
        start: FrameIndex,
        end: FrameIndex,
        source: impl Into<String>,
    ) -> Self {
        Track::Image(ImageTrack {
            base: TrackBase::new(id, row, start, end),
            source: source.into(),
            transform: Transform::default(),
        })
    }

    pub fn text(
        id: impl Into<TrackId>,
        row: usize,
        start: FrameIndex,
        end: FrameIndex,
        content: impl Into<String>,
    ) -> Self {
        Track::Text(TextTrack {
            base: TrackBase::new(id, row, start, end),
            content: content.into(),
            font_size: default_font_size(),
            transform: Transform::default(),
        })
    }

    pub fn subtitle(
        id: impl Into<TrackId>,
        row: usize,
        start: FrameIndex,
        end: FrameIndex,
        text: impl Into<String>,
    ) -> Self {
        Track::Subtitle(SubtitleTrack {
            base: TrackBase::new(id, row, start, end),
            text: text.into(),
            transform: Transform::default(),
        })
    }

    pub fn base(&self) -> &TrackBase {
        match self {
            Track::Video(t) => &t.base,
            Track::Audio(t) => &t.base,
            Track::Image(t) => &t.base,
            Track::Text(t) => &t.base,
            Track::Subtitle(t) => &t.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut TrackBase {
        match self {
            Track::Video(t) => &mut t.base,
            Track::Audio(t) => &mut t.base,
            Track::Image(t) => &mut t.base,
            Track::Text(t) => &mut t.base,
            Track::Subtitle(t) => &mut t.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn kind(&self) -> TrackKind {
        match self {
            Track::Video(_) => TrackKind::Video,
            Track::Audio(_) => TrackKind::Audio,
            Track::Image(_) => TrackKind::Image,
            Track::Text(_) => TrackKind::Text,
            Track::Subtitle(_) => TrackKind::Subtitle,
        }
    }

    pub fn frames(&self) -> FrameRange {
        let base = self.base();
        FrameRange::new(base.start_frame, base.end_frame)
    }

    pub fn row(&self) -> usize {
        self.base().track_row_index
    }

    /// Visible and covering `frame`.
    pub fn is_active_at(&self, frame: FrameIndex) -> bool {
        self.base().visible && self.frames().contains(frame)
    }

    /// Derived stacking order: rows first, then type priority.
    pub fn z_index(&self) -> i64 {
        self.row() as i64 * Z_SLOTS_PER_ROW + self.kind().type_priority() as i64
    }

    /// Media reference for video and audio tracks.
    pub fn media(&self) -> Option<&MediaSource> {
        match self {
            Track::Video(t) => Some(&t.media),
            Track::Audio(t) => Some(&t.media),
            _ => None,
        }
    }

    /// Overlay transform for visual tracks.
    pub fn transform(&self) -> Option<&Transform> {
        match self {
            Track::Video(t) => Some(&t.transform),
            Track::Image(t) => Some(&t.transform),
            Track::Text(t) => Some(&t.transform),
            Track::Subtitle(t) => Some(&t.transform),
            Track::Audio(_) => None,
        }
    }

    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        match self {
            Track::Video(t) => Some(&mut t.transform),
            Track::Image(t) => Some(&mut t.transform),
            Track::Text(t) => Some(&mut t.transform),
            Track::Subtitle(t) => Some(&mut t.transform),
            Track::Audio(_) => None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        if let Some(t) = self.transform_mut() {
            *t = transform;
        }
        self
    }

    /// Check the structural invariants of a single track.
    pub fn validate(&self) -> Result<(), String> {
        let base = self.base();
        if base.id.is_empty() {
            return Err("track id is empty".to_string());
        }
        if base.start_frame >= base.end_frame {
            return Err(format!(
                "start_frame {} must be before end_frame {}",
                base.start_frame, base.end_frame
            ));
        }
        if let Some(media) = self.media() {
            if media.source.is_empty() {
                return Err("media source is empty".to_string());
            }
            if !media.source_start_time.is_finite() || media.source_start_time < 0.0 {
                return Err("source_start_time must be a non-negative number".to_string());
            }
        }
        if let Some(transform) = self.transform() {
            transform.validate()?;
        }
        Ok(())
    }
}

impl TrackBase {
    pub fn new(id: impl Into<TrackId>, row: usize, start: FrameIndex, end: FrameIndex) -> Self {
        Self {
            id: id.into(),
            start_frame: start,
            end_frame: end,
            track_row_index: row,
            visible: true,
            locked: false,
            muted: false,
        }
    }
}
